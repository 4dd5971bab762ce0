use crate::{
    Error, Result,
    httphandler::{RestClient, failure},
    securityctrl::TokenCache,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::*;

/// Health of a deployed service
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn healthy(&self) -> Result<bool>;
}

/// Body of an assembly creation intent
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssembly {
    pub assembly_name: String,
    pub descriptor_name: String,
    pub intended_state: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// Authenticated client of the ishtar API
pub struct IshtarClient {
    rest: RestClient,
    tokens: TokenCache,
}

impl IshtarClient {
    #[must_use]
    pub fn new(rest: RestClient, tokens: TokenCache) -> Self {
        Self { rest, tokens }
    }

    async fn authorized(&self) -> Result<RestClient> {
        let token = self.tokens.access_token().await?;
        let mut rest = self.rest.clone();
        rest.add_header_json();
        rest.add_header_bearer(&token);
        Ok(rest)
    }

    /// Only a transport failure is an error: a down ishtar answers with a non-2xx status
    /// and a body that still says why, both count as unhealthy.
    pub async fn health(&self) -> Result<bool> {
        let rest = self.authorized().await?;
        let response = rest.http_get("management/health").await?;
        let status = response.status();
        let text = response.text().await?;
        let healthy = serde_json::from_str::<Value>(&text).is_ok_and(|health| is_up(&health));
        debug!("ishtar health: {} {}", status.as_u16(), text);
        Ok(healthy)
    }

    /// Request the creation of an assembly, returning the id of the process handling it
    pub async fn create_assembly(&self, request: &CreateAssembly) -> Result<String> {
        let rest = self.authorized().await?;
        let body = serde_json::to_value(request)?;
        let response = rest.json_post("api/intent/createAssembly", &body).await?;
        if response.status().as_u16() != 201 {
            return Err(failure("Post", response).await);
        }
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|l| l.to_str().ok())
            .unwrap_or_default();
        let id = process_id(location)
            .ok_or_else(|| Error::Other(format!("no process id in location '{location}'")))?;
        info!("Assembly {} is handled by process {}", request.assembly_name, id);
        Ok(id)
    }

    pub async fn assembly_status(&self, process_id: &str) -> Result<String> {
        let rest = self.authorized().await?;
        let process = rest.json_get(&format!("api/processes/{process_id}")).await?;
        process
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::Other(format!("process {process_id} has no status")))
    }
}

#[async_trait]
impl HealthProbe for IshtarClient {
    async fn healthy(&self) -> Result<bool> {
        self.health().await
    }
}

fn is_up(health: &Value) -> bool {
    health.get("status").and_then(Value::as_str) == Some("UP")
}

fn process_id(location: &str) -> Option<String> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}
