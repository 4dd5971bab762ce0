use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Per-service overrides of an ALM micro-service
#[derive(Serialize, Deserialize, Eq, PartialEq, Clone, Debug, JsonSchema, Default)]
pub struct ServiceDescriptor {
    /// Extra JVM options
    #[serde(rename = "JVMOptions", default)]
    pub jvm_options: String,
    /// Version requested by the user (informational, the release manifest wins)
    #[serde(rename = "Version", default)]
    pub version: String,
}

/// Overrides of the nimrod (UI) micro-service
#[derive(Serialize, Deserialize, Eq, PartialEq, Clone, Debug, JsonSchema, Default)]
pub struct NimrodDescriptor {
    /// Extra JVM options
    #[serde(rename = "JVMOptions", default)]
    pub jvm_options: String,
    /// Version requested by the user (informational, the release manifest wins)
    #[serde(rename = "Version", default)]
    pub version: String,
    /// Name of the ConfigMap holding the UI themes
    #[serde(rename = "ThemesConfigMap", default)]
    pub themes_config_map: String,
    /// Name of the ConfigMap holding the UI locales
    #[serde(rename = "LocalesConfigMap", default)]
    pub locales_config_map: String,
}

/// Overrides of the one-shot configurator Job
#[derive(Serialize, Deserialize, Eq, PartialEq, Clone, Debug, JsonSchema, Default)]
pub struct ConfiguratorDescriptor {
    /// Extra JVM options
    #[serde(rename = "JVMOptions", default)]
    pub jvm_options: String,
    /// Run the configurator Job before rolling out the services
    #[serde(rename = "Run", default)]
    pub run: bool,
}

/// Describe an ALM installation
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[kube(
    kind = "ALM",
    status = "AlmStatus",
    shortname = "alm",
    group = "com.accantosystems",
    version = "v1alpha1",
    namespaced
)]
#[kube(
    doc = "Custom resource representing an ALM installation",
    printcolumn = r#"
    {"name":"type",    "type":"string",  "description":"Deployment type", "jsonPath":".spec.deploymentType"},
    {"name":"secure",  "type":"boolean", "description":"Security enabled", "jsonPath":".spec.secure"},
    {"name":"healthy", "type":"boolean", "description":"Ishtar health", "jsonPath":".status.ishtarHealthy"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AlmSpec {
    /// Enable security on every service
    #[serde(default)]
    pub secure: bool,
    /// Label used by the spring cloud config server
    #[serde(default)]
    pub spring_cloud_config_label: String,
    /// Extra spring profiles appended to the computed ones
    #[serde(default)]
    pub spring_profiles_active: String,
    /// Sizing class: ha, tiny, middle or anything else for standard
    #[serde(default)]
    pub deployment_type: String,
    /// Docker registry prefix of every image
    #[serde(default)]
    pub docker_repo: String,
    /// URL of the release manifest listing each service version
    #[serde(default)]
    pub release: String,
    #[serde(default)]
    pub configurator: ConfiguratorDescriptor,
    #[serde(default)]
    pub conductor: ServiceDescriptor,
    #[serde(default)]
    pub apollo: ServiceDescriptor,
    #[serde(default)]
    pub galileo: ServiceDescriptor,
    #[serde(default)]
    pub talledega: ServiceDescriptor,
    #[serde(default)]
    pub daytona: ServiceDescriptor,
    #[serde(default)]
    pub nimrod: NimrodDescriptor,
    #[serde(default)]
    pub ishtar: ServiceDescriptor,
    #[serde(default)]
    pub relay: ServiceDescriptor,
    #[serde(default)]
    pub watchtower: ServiceDescriptor,
    #[serde(default)]
    pub doki: ServiceDescriptor,
    #[serde(default)]
    pub brent: ServiceDescriptor,
}

/// The generated `ALM` resource, under the name the rest of the code uses
pub type Alm = ALM;

/// The status object of `ALM`
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AlmStatus {
    /// Last health probe result of ishtar
    #[serde(default)]
    pub ishtar_healthy: bool,
}

/// Secrets produced by the configurator Job and adopted by the ALM once it succeeded
pub const BOOTSTRAP_SECRETS: [&str; 6] = [
    "lm-certs",
    "lm-client-credentials",
    "lm-keystore",
    "nimrod-tls",
    "brent-tls",
    "ishtar-tls",
];

/// The Deployment whose existence marks a completed rollout
pub const MARKER_DEPLOYMENT: &str = "daytona";

impl Alm {
    #[must_use]
    pub fn job_name(&self) -> String {
        format!("{}-lm-configurator", self.name_any())
    }

    #[must_use]
    pub fn configurator_cm_name(&self) -> String {
        format!("{}-lm-configurator-cm", self.name_any())
    }

    #[must_use]
    pub fn config_import_cm_name(&self) -> String {
        format!("{}-lm-config-import-cm", self.name_any())
    }

    /// Name of the ConfigMap feeding the environment of a service
    #[must_use]
    pub fn service_cm_name(&self, service: &str) -> String {
        format!("{}-{}-cm", self.name_any(), service)
    }
}
