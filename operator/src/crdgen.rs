use kube::CustomResourceExt;

fn main() {
    match serde_yaml::to_string(&controller::Alm::crd()) {
        Ok(crd) => {
            println!("---");
            print!("{crd}");
        }
        Err(e) => {
            eprintln!("Failed to render the ALM CRD: {e}");
            std::process::exit(1);
        }
    }
}
