pub use controller::*;
use clap::Parser;
use common::{
    httphandler::RestClient,
    ishtar::IshtarClient,
    release::HttpReleaseSource,
    securityctrl::{SecurityCtrl, TokenCache},
};
use std::sync::Arc;
use tokio::time::Duration;
use tracing_subscriber::{EnvFilter, Registry, prelude::*};

use actix_web::{App, HttpRequest, HttpResponse, HttpServer, Responder, get, middleware, web::Data};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Parameters {
    /// Address of the metrics and diagnostics server
    #[arg(long = "listen", env = "LISTEN", value_name = "LISTEN", default_value = "0.0.0.0:9000")]
    listen: String,
    /// Base url of the LM security service
    #[arg(
        long = "security-url",
        env = "SECURITY_URL",
        value_name = "SECURITY_URL",
        default_value = "https://nimrod:8290"
    )]
    security_url: String,
    /// Base url of the ishtar API
    #[arg(
        long = "ishtar-url",
        env = "ISHTAR_URL",
        value_name = "ISHTAR_URL",
        default_value = "https://ishtar:8280"
    )]
    ishtar_url: String,
    /// LM user
    #[arg(long = "username", env = "LM_USERNAME", value_name = "LM_USERNAME", default_value = "jack")]
    username: String,
    /// LM password
    #[arg(long = "password", env = "LM_PASSWORD", value_name = "LM_PASSWORD", default_value = "jack")]
    password: String,
    /// Timeout of the LM API calls, in seconds
    #[arg(long = "http-timeout", env = "HTTP_TIMEOUT", value_name = "HTTP_TIMEOUT", default_value_t = 120)]
    http_timeout: u64,
    /// Delay before polling an unfinished installation again, in seconds
    #[arg(
        long = "requeue-seconds",
        env = "REQUEUE_SECONDS",
        value_name = "REQUEUE_SECONDS",
        default_value_t = 10
    )]
    requeue_seconds: u64,
}

impl Parameters {
    fn rest_client(&self, base: &str) -> RestClient {
        let mut rest = RestClient::new(base);
        rest.set_timeout(Duration::from_secs(self.http_timeout))
            .set_accept_invalid_certs(true);
        rest
    }
}

#[get("/metrics")]
async fn metrics(c: Data<Manager>, _req: HttpRequest) -> impl Responder {
    let metrics = c.metrics();
    HttpResponse::Ok()
        .content_type("application/openmetrics-text; version=1.0.0; charset=utf-8")
        .body(metrics)
}

#[get("/health")]
async fn health(_: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json("healthy")
}

#[get("/")]
async fn index(c: Data<Manager>, _req: HttpRequest) -> impl Responder {
    let d = c.diagnostics().await;
    HttpResponse::Ok().json(&d)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Parameters::parse();

    // Setup tracing layers
    #[cfg(feature = "telemetry")]
    let telemetry = tracing_opentelemetry::layer().with_tracer(telemetry::init_tracer().await?);
    let logger = tracing_subscriber::fmt::layer();
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| Error::Other(e.to_string()))?;

    // Decide on layers
    #[cfg(feature = "telemetry")]
    let collector = Registry::default().with(telemetry).with(logger).with(env_filter);
    #[cfg(not(feature = "telemetry"))]
    let collector = Registry::default().with(logger).with(env_filter);

    // Initialize tracing
    tracing::subscriber::set_global_default(collector).map_err(|e| Error::Other(e.to_string()))?;

    // Clients of the deployed installation
    let security = SecurityCtrl::new(args.rest_client(&args.security_url), &args.username, &args.password);
    let ishtar = IshtarClient::new(
        args.rest_client(&args.ishtar_url),
        TokenCache::new(Box::new(security)),
    );

    // Start kubernetes controller
    let client = kube::Client::try_default().await?;
    let (manager, controller) = Manager::new(
        client,
        Arc::new(HttpReleaseSource::default()),
        Arc::new(ishtar),
        Duration::from_secs(args.requeue_seconds),
    )
    .await?;

    // Start web server
    let server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(manager.clone()))
            .wrap(middleware::Logger::default().exclude("/health"))
            .service(index)
            .service(health)
            .service(metrics)
    })
    .bind(&args.listen)
    .map_err(|e| Error::Other(format!("Can not bind to {}: {e}", args.listen)))?
    .shutdown_timeout(5);

    tokio::select! {
        _ = controller => tracing::warn!("ALM controller exited"),
        _ = server.run() => tracing::info!("actix exited"),
    }
    Ok(())
}
