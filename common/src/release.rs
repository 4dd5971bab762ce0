use crate::{Result, httphandler::RestClient};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::*;

/// Version of a single service within a release
#[derive(Serialize, Deserialize, Eq, PartialEq, Clone, Debug, Default)]
pub struct ServiceRelease {
    #[serde(default)]
    pub version: String,
}

/// A release manifest: the version of every service shipped together
#[derive(Serialize, Deserialize, Eq, PartialEq, Clone, Debug, Default)]
#[serde(transparent)]
pub struct ReleaseManifest {
    pub services: BTreeMap<String, ServiceRelease>,
}

impl ReleaseManifest {
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Version listed for a manifest key, empty when the key is missing
    #[must_use]
    pub fn version(&self, key: &str) -> String {
        self.services
            .get(key)
            .map(|s| s.version.clone())
            .unwrap_or_default()
    }
}

/// Where release manifests come from
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ReleaseManifest>;
}

/// Fetch release manifests over http(s)
#[derive(Clone, Debug, Default)]
pub struct HttpReleaseSource {}

#[async_trait]
impl ReleaseSource for HttpReleaseSource {
    async fn fetch(&self, url: &str) -> Result<ReleaseManifest> {
        info!("Getting release descriptor from {}", url);
        let text = RestClient::new(url).body_get("").await?;
        debug!("Release yaml {}", text);
        ReleaseManifest::from_yaml(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest() {
        let manifest = ReleaseManifest::from_yaml(
            "configurator:\n  version: 2.1.0\nconductor:\n  version: 2.1.0-12\nbrent: {}\n",
        )
        .unwrap();
        assert_eq!(manifest.version("configurator"), "2.1.0");
        assert_eq!(manifest.version("conductor"), "2.1.0-12");
        assert_eq!(manifest.version("brent"), "");
        assert_eq!(manifest.version("nimrod"), "");
    }

    #[test]
    fn test_parse_empty_manifest() {
        assert_eq!(ReleaseManifest::from_yaml("\n").unwrap(), ReleaseManifest::default());
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(ReleaseManifest::from_yaml("- just\n- a list\n").is_err());
    }
}
