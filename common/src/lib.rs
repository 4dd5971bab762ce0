use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("SerializationError: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YamlError: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("K8s error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Registering template failed with error: {0}")]
    HbsTemplateError(#[from] handlebars::TemplateError),
    #[error("Renderer error: {0}")]
    HbsRenderError(#[from] handlebars::RenderError),

    #[error("Reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("{0} query failed: {1}")]
    MethodFailed(String, u16, String),

    #[error("Login as {0} failed: {1}")]
    LoginFailed(String, String),

    #[error("{0} {1}/{2} already exists")]
    AlreadyExists(String, String, String),

    #[error("Status update failed: {0}")]
    StatusUpdate(#[source] Box<Error>),

    #[error("Error: {0}")]
    Other(String),
}
impl Error {
    pub fn metric_label(&self) -> String {
        format!("{self:?}").to_lowercase()
    }

    /// Errors raised by the services the operator talks to, rather than by the cluster
    #[must_use]
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            Error::ReqwestError(_)
                | Error::YamlError(_)
                | Error::MethodFailed(..)
                | Error::LoginFailed(..)
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub mod alm;
pub mod context;
pub mod handlebarshandler;
pub mod httphandler;
pub mod ishtar;
pub mod profile;
pub mod release;
pub mod securityctrl;
pub mod templates;
pub use alm::{Alm, AlmSpec, AlmStatus};
pub use context::get_client_name;
