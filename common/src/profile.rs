use crate::{
    Alm, Result,
    release::{ReleaseManifest, ReleaseSource},
};
use serde::Serialize;
use std::fmt;

/// Sizing class of an installation
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DeploymentClass {
    Ha,
    Tiny,
    Middle,
    #[default]
    Standard,
}

impl From<&str> for DeploymentClass {
    /// Unknown classes silently fall back to `Standard`
    fn from(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "ha" => DeploymentClass::Ha,
            "tiny" => DeploymentClass::Tiny,
            "middle" => DeploymentClass::Middle,
            _ => DeploymentClass::Standard,
        }
    }
}

impl fmt::Display for DeploymentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentClass::Ha => "ha",
            DeploymentClass::Tiny => "tiny",
            DeploymentClass::Middle => "middle",
            DeploymentClass::Standard => "standard",
        };
        write!(f, "{name}")
    }
}

/// Kind of workload running a service
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Workload {
    Job,
    Deployment,
    StatefulSet,
}

/// Ingress published in front of a service
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct IngressProfile {
    pub name: &'static str,
    pub host: &'static str,
    pub tls_secret: &'static str,
}

/// Settings only some services carry
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub enum ProfileExtension {
    Themes {
        themes_config_map: String,
        locales_config_map: String,
    },
    Bootstrap {
        run: bool,
    },
}

/// Everything needed to build the resources of one service
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ServiceProfile {
    pub name: String,
    pub image: String,
    pub version: String,
    pub port: Option<i32>,
    pub workload: Workload,
    pub ingress: Option<IngressProfile>,
    pub replicas: i32,
    pub cpu_request: String,
    pub memory_request: String,
    pub heap: String,
    pub extension: Option<ProfileExtension>,
}

impl ServiceProfile {
    /// Full image reference within a registry
    #[must_use]
    pub fn image_ref(&self, docker_repo: &str) -> String {
        format!("{}/{}:{}", docker_repo, self.image, self.version)
    }
}

/// The resolved profile of every service of an installation
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct DeploymentProfile {
    pub class: DeploymentClass,
    pub services: Vec<ServiceProfile>,
}

impl DeploymentProfile {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ServiceProfile> {
        self.services.iter().find(|s| s.name == name)
    }
}

pub const CONFIGURATOR: &str = "lm-configurator";

/// Order in which the services are rolled out
pub const ROLLOUT_ORDER: [&str; 11] = [
    "conductor",
    "apollo",
    "galileo",
    "talledega",
    "daytona",
    "relay",
    "watchtower",
    "doki",
    "nimrod",
    "ishtar",
    "brent",
];

struct Base {
    name: &'static str,
    release_key: &'static str,
    port: Option<i32>,
    workload: Workload,
    ingress: Option<IngressProfile>,
}

const fn base(name: &'static str, port: i32, workload: Workload) -> Base {
    Base {
        name,
        release_key: name,
        port: Some(port),
        workload,
        ingress: None,
    }
}

const fn exposed(name: &'static str, port: i32, ingress: IngressProfile) -> Base {
    Base {
        name,
        release_key: name,
        port: Some(port),
        workload: Workload::Deployment,
        ingress: Some(ingress),
    }
}

const BASES: [Base; 12] = [
    Base {
        name: CONFIGURATOR,
        release_key: "configurator",
        port: None,
        workload: Workload::Job,
        ingress: None,
    },
    base("conductor", 8761, Workload::StatefulSet),
    base("apollo", 8282, Workload::Deployment),
    base("galileo", 8283, Workload::StatefulSet),
    base("talledega", 8287, Workload::Deployment),
    base("daytona", 8281, Workload::Deployment),
    base("relay", 8285, Workload::Deployment),
    base("watchtower", 8284, Workload::Deployment),
    base("doki", 8288, Workload::Deployment),
    exposed("nimrod", 8290, IngressProfile {
        name: "nimrod-ingress",
        host: "ui.lm",
        tls_secret: "nimrod-tls",
    }),
    exposed("ishtar", 8280, IngressProfile {
        name: "ishtar-ingress",
        host: "app.lm",
        tls_secret: "ishtar-tls",
    }),
    exposed("brent", 8291, IngressProfile {
        name: "brent-ingress",
        host: "brent.lm",
        tls_secret: "brent-tls",
    }),
];

// ── Sizing tables ─────────────────────────────────────────────────────────────

/// (service, replicas, cpu request, memory request, heap)
type Sizing = (&'static str, i32, &'static str, &'static str, &'static str);

const TINY: [Sizing; 11] = [
    ("conductor", 1, "100m", "156Mi", "128m"),
    ("apollo", 1, "100m", "156Mi", "128m"),
    ("galileo", 1, "300m", "300Mi", "256m"),
    ("talledega", 1, "300m", "300Mi", "256m"),
    ("daytona", 1, "500m", "156Mi", "128m"),
    ("nimrod", 1, "300m", "300Mi", "256m"),
    ("ishtar", 1, "200m", "156Mi", "128m"),
    ("relay", 1, "50m", "156Mi", "128m"),
    ("watchtower", 1, "500m", "412Mi", "384m"),
    ("doki", 1, "200m", "384Mi", "256m"),
    ("brent", 3, "200m", "256Mi", "256m"),
];

const MIDDLE: [Sizing; 11] = [
    ("conductor", 1, "100m", "128Mi", "128m"),
    ("apollo", 1, "100m", "512Mi", "512m"),
    ("galileo", 1, "500m", "512Mi", "512m"),
    ("talledega", 1, "500m", "512Mi", "512m"),
    ("daytona", 1, "500m", "512Mi", "512m"),
    ("nimrod", 1, "300m", "256Mi", "256m"),
    ("ishtar", 1, "300m", "256Mi", "256m"),
    ("relay", 1, "100m", "128Mi", "128m"),
    ("watchtower", 1, "500m", "512Mi", "512m"),
    ("doki", 1, "250m", "512Mi", "512m"),
    ("brent", 1, "500m", "512Mi", "512m"),
];

/// The configurator is a short batch, sized the same in every class
const CONFIGURATOR_SIZING: Sizing = (CONFIGURATOR, 1, "100m", "256Mi", "256m");

fn sizing(class: DeploymentClass, service: &str) -> Sizing {
    if service == CONFIGURATOR {
        return CONFIGURATOR_SIZING;
    }
    let table: &[Sizing] = match class {
        DeploymentClass::Tiny => &TINY,
        DeploymentClass::Middle => &MIDDLE,
        DeploymentClass::Ha => return ("", 3, "1", "1024Mi", "1G"),
        DeploymentClass::Standard => return ("", 1, "1", "1024Mi", "1G"),
    };
    table
        .iter()
        .find(|s| s.0 == service)
        .copied()
        .unwrap_or(("", 1, "1", "1024Mi", "1G"))
}

// ── Resolution ────────────────────────────────────────────────────────────────

/// Build the profile of every service from an ALM and an already fetched manifest
#[must_use]
pub fn resolve(alm: &Alm, manifest: &ReleaseManifest) -> DeploymentProfile {
    let class = DeploymentClass::from(alm.spec.deployment_type.as_str());
    let services = BASES
        .iter()
        .map(|b| {
            let (_, replicas, cpu, memory, heap) = sizing(class, b.name);
            let extension = match b.name {
                CONFIGURATOR => Some(ProfileExtension::Bootstrap {
                    run: alm.spec.configurator.run,
                }),
                "nimrod" => Some(ProfileExtension::Themes {
                    themes_config_map: alm.spec.nimrod.themes_config_map.clone(),
                    locales_config_map: alm.spec.nimrod.locales_config_map.clone(),
                }),
                _ => None,
            };
            ServiceProfile {
                name: b.name.to_string(),
                image: b.name.to_string(),
                version: manifest.version(b.release_key),
                port: b.port,
                workload: b.workload,
                ingress: b.ingress,
                replicas,
                cpu_request: cpu.to_string(),
                memory_request: memory.to_string(),
                heap: heap.to_string(),
                extension,
            }
        })
        .collect();
    DeploymentProfile { class, services }
}

/// Fetch the release manifest of an ALM then resolve its profile
pub async fn resolve_from(alm: &Alm, source: &dyn ReleaseSource) -> Result<DeploymentProfile> {
    let manifest = source.fetch(&alm.spec.release).await?;
    Ok(resolve(alm, &manifest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AlmSpec;

    fn alm(class: &str) -> Alm {
        Alm::new("demo", AlmSpec {
            deployment_type: class.to_string(),
            ..AlmSpec::default()
        })
    }

    fn manifest() -> ReleaseManifest {
        ReleaseManifest::from_yaml(
            "configurator: {version: 2.1.0}\nconductor: {version: 2.1.1}\nbrent: {version: ''}\n",
        )
        .unwrap()
    }

    // ── Totality ──────────────────────────────────────────────────────────────

    #[test]
    fn test_every_class_sizes_every_service() {
        for class in ["ha", "tiny", "middle", "standard"] {
            let profile = resolve(&alm(class), &manifest());
            assert_eq!(profile.services.len(), 12);
            for svc in &profile.services {
                assert!(svc.replicas > 0, "{class}/{}", svc.name);
                assert!(!svc.cpu_request.is_empty(), "{class}/{}", svc.name);
                assert!(!svc.memory_request.is_empty(), "{class}/{}", svc.name);
                assert!(!svc.heap.is_empty(), "{class}/{}", svc.name);
            }
        }
    }

    #[test]
    fn test_tiny_table() {
        let profile = resolve(&alm("tiny"), &manifest());
        let brent = profile.get("brent").unwrap();
        assert_eq!(brent.replicas, 3);
        assert_eq!(brent.cpu_request, "200m");
        let watchtower = profile.get("watchtower").unwrap();
        assert_eq!(watchtower.memory_request, "412Mi");
        assert_eq!(watchtower.heap, "384m");
        assert_eq!(profile.get("relay").unwrap().cpu_request, "50m");
    }

    #[test]
    fn test_ha_and_middle_tables() {
        let ha = resolve(&alm("ha"), &manifest());
        assert!(ha.services.iter().filter(|s| s.name != CONFIGURATOR).all(|s| s.replicas == 3));
        assert_eq!(ha.get("daytona").unwrap().heap, "1G");
        let middle = resolve(&alm("middle"), &manifest());
        assert_eq!(middle.get("doki").unwrap().cpu_request, "250m");
        assert_eq!(middle.get("conductor").unwrap().memory_request, "128Mi");
    }

    // ── Class parsing ─────────────────────────────────────────────────────────

    #[test]
    fn test_unknown_class_is_standard() {
        let bogus = resolve(&alm("bogus"), &manifest());
        let standard = resolve(&alm("standard"), &manifest());
        let empty = resolve(&alm(""), &manifest());
        assert_eq!(bogus, standard);
        assert_eq!(empty, standard);
        assert_eq!(standard.class, DeploymentClass::Standard);
    }

    #[test]
    fn test_class_is_case_insensitive() {
        assert_eq!(DeploymentClass::from("TiNy"), DeploymentClass::Tiny);
        assert_eq!(resolve(&alm("HA"), &manifest()), resolve(&alm("ha"), &manifest()));
    }

    #[test]
    fn test_names_and_ports_never_vary() {
        let reference = resolve(&alm("standard"), &manifest());
        for class in ["ha", "tiny", "middle"] {
            let profile = resolve(&alm(class), &manifest());
            for (a, b) in profile.services.iter().zip(reference.services.iter()) {
                assert_eq!(a.name, b.name);
                assert_eq!(a.image, b.image);
                assert_eq!(a.port, b.port);
                assert_eq!(a.workload, b.workload);
                assert_eq!(a.ingress, b.ingress);
            }
        }
        assert_eq!(reference.get("conductor").unwrap().port, Some(8761));
        assert_eq!(reference.get("ishtar").unwrap().port, Some(8280));
        assert_eq!(reference.get(CONFIGURATOR).unwrap().port, None);
    }

    // ── Versions and extensions ───────────────────────────────────────────────

    #[test]
    fn test_versions_come_from_manifest() {
        let profile = resolve(&alm("tiny"), &manifest());
        assert_eq!(profile.get(CONFIGURATOR).unwrap().version, "2.1.0");
        assert_eq!(profile.get("conductor").unwrap().version, "2.1.1");
        assert_eq!(profile.get("brent").unwrap().version, "");
        assert_eq!(profile.get("apollo").unwrap().version, "");
        assert_eq!(
            profile.get("conductor").unwrap().image_ref("registry:5000"),
            "registry:5000/conductor:2.1.1"
        );
    }

    #[test]
    fn test_extensions() {
        let mut a = alm("tiny");
        a.spec.configurator.run = true;
        a.spec.nimrod.themes_config_map = "lm-themes".to_string();
        let profile = resolve(&a, &manifest());
        assert_eq!(
            profile.get(CONFIGURATOR).unwrap().extension,
            Some(ProfileExtension::Bootstrap { run: true })
        );
        assert_eq!(
            profile.get("nimrod").unwrap().extension,
            Some(ProfileExtension::Themes {
                themes_config_map: "lm-themes".to_string(),
                locales_config_map: String::new(),
            })
        );
        assert_eq!(profile.get("apollo").unwrap().extension, None);
    }
}
