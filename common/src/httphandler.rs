use crate::{Error, Result, get_client_name};
use reqwest::{Client, Response};
use serde_json::Value;
use std::{collections::BTreeMap, time::Duration};
use tracing::*;

/// Default timeout of every request issued by a `RestClient`
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2 * 60);

#[derive(Clone, Debug)]
pub struct RestClient {
    baseurl: String,
    headers: BTreeMap<String, String>,
    timeout: Duration,
    accept_invalid_certs: bool,
}

impl RestClient {
    #[must_use]
    pub fn new(base: &str) -> Self {
        Self {
            baseurl: base.trim_end_matches('/').to_string(),
            headers: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
            accept_invalid_certs: false,
        }
    }

    #[must_use]
    pub fn get_baseurl(&self) -> &str {
        &self.baseurl
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> &mut RestClient {
        self.timeout = timeout;
        self
    }

    /// The LM services run with self-signed certificates
    pub fn set_accept_invalid_certs(&mut self, accept: bool) -> &mut RestClient {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn add_header(&mut self, key: &str, value: &str) -> &mut RestClient {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    pub fn add_header_json_content(&mut self) -> &mut RestClient {
        if self.headers.contains_key("Content-Type") {
            self
        } else {
            self.add_header("Content-Type", "application/json; charset=utf-8")
        }
    }

    pub fn add_header_json_accept(&mut self) -> &mut RestClient {
        for (key, val) in &self.headers {
            debug!("RestClient.header: {:} {:}", key, val);
        }
        if self.headers.contains_key("Accept") {
            self
        } else {
            self.add_header("Accept", "application/json")
        }
    }

    pub fn add_header_json(&mut self) {
        self.add_header_json_content().add_header_json_accept();
    }

    pub fn add_header_bearer(&mut self, token: &str) {
        self.add_header("Authorization", format!("Bearer {token}").as_str());
    }

    fn get_client(&self) -> std::result::Result<Client, reqwest::Error> {
        Client::builder()
            .user_agent(get_client_name())
            .timeout(self.timeout)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .use_rustls_tls()
            .build()
    }

    fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            self.baseurl.clone()
        } else {
            format!("{}/{}", self.baseurl, path)
        }
    }

    pub async fn http_get(&self, path: &str) -> std::result::Result<Response, reqwest::Error> {
        debug!("http_get '{}' ", self.url(path));
        match self.get_client() {
            Ok(client) => {
                let mut req = client.get(self.url(path));
                for (key, val) in &self.headers {
                    req = req.header(key, val);
                }
                req.send().await
            }
            Err(e) => {
                if e.is_builder() {
                    warn!("CLIENT: {e:?}");
                }
                Err(e)
            }
        }
    }

    pub async fn body_get(&self, path: &str) -> Result<String, Error> {
        let response = self.http_get(path).await.map_err(Error::ReqwestError)?;
        if !response.status().is_success() {
            return Err(failure("Get", response).await);
        }
        let text = response.text().await.map_err(Error::ReqwestError)?;
        Ok(text)
    }

    /// A body that is not json is reported as a failure of the remote side
    pub async fn json_get(&self, path: &str) -> Result<Value, Error> {
        let text = self.body_get(path).await?;
        serde_json::from_str(&text)
            .map_err(|e| Error::MethodFailed("Get".to_string(), 200, format!("invalid json body: {e}")))
    }

    pub async fn http_post(&self, path: &str, body: &str) -> std::result::Result<Response, reqwest::Error> {
        debug!("http_post '{}' ", self.url(path));
        match self.get_client() {
            Ok(client) => {
                let mut req = client.post(self.url(path)).body(body.to_string());
                for (key, val) in &self.headers {
                    req = req.header(key, val);
                }
                req.send().await
            }
            Err(e) => {
                if e.is_builder() {
                    warn!("CLIENT: {e:?}");
                }
                Err(e)
            }
        }
    }

    /// Post a json document and return the raw response
    pub async fn json_post(&self, path: &str, input: &Value) -> Result<Response, Error> {
        let body = serde_json::to_string(input)?;
        self.http_post(path, body.as_str())
            .await
            .map_err(Error::ReqwestError)
    }
}

/// Build a `MethodFailed` out of an unexpected response
pub async fn failure(method: &str, response: Response) -> Error {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    Error::MethodFailed(
        method.to_string(),
        status.as_u16(),
        format!(
            "The server returned the error: {} {} | {text}",
            status.as_str(),
            status.canonical_reason().unwrap_or("unknown")
        ),
    )
}
