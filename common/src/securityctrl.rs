use crate::{Error, Result, httphandler::RestClient};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{
    sync::Mutex,
    time::{Duration, Instant, sleep},
};
use tracing::*;

/// Grace period granted to a token reaching its last second of validity
pub const EXPIRY_GRACE: Duration = Duration::from_secs(2);

/// Answer of the LM security service to a successful login
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Auth {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Validity of the access token, in seconds
    pub expires_in: u64,
    #[serde(default)]
    pub scope: String,
}

/// A cached `Auth` with the instant it was obtained
#[derive(Clone, Debug)]
pub struct Credential {
    pub auth: Auth,
    pub issued_at: Instant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Freshness {
    Missing,
    Valid,
    /// Within its last second of validity
    Expiring,
    Expired,
}

impl Credential {
    #[must_use]
    pub fn freshness(&self, now: Instant) -> Freshness {
        let elapsed = now.saturating_duration_since(self.issued_at);
        let validity = Duration::from_secs(self.auth.expires_in);
        if elapsed >= validity {
            Freshness::Expired
        } else if elapsed + Duration::from_secs(1) >= validity {
            Freshness::Expiring
        } else {
            Freshness::Valid
        }
    }
}

/// Something able to obtain a fresh `Auth`
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self) -> Result<Auth>;
}

#[derive(Serialize)]
struct Login<'a> {
    username: &'a str,
    password: &'a str,
}

/// Username/password login against the LM security service
#[derive(Clone, Debug)]
pub struct SecurityCtrl {
    rest: RestClient,
    username: String,
    password: String,
}

impl SecurityCtrl {
    #[must_use]
    pub fn new(rest: RestClient, username: &str, password: &str) -> Self {
        Self {
            rest,
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

#[async_trait]
impl Authenticator for SecurityCtrl {
    async fn login(&self) -> Result<Auth> {
        info!("Login as {} on {}", self.username, self.rest.get_baseurl());
        let mut rest = self.rest.clone();
        rest.add_header_json();
        let body = serde_json::to_value(Login {
            username: &self.username,
            password: &self.password,
        })?;
        let response = rest
            .json_post("api/login", &body)
            .await
            .map_err(|e| Error::LoginFailed(self.username.clone(), e.to_string()))?;
        if response.status().as_u16() != 200 {
            let status = response.status();
            return Err(Error::LoginFailed(
                self.username.clone(),
                format!("the server answered {status}"),
            ));
        }
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| Error::LoginFailed(self.username.clone(), format!("unexpected answer: {e}")))
    }
}

/// Keeps one credential and renews it before handing out a stale token.
///
/// Callers are serialized on the cache: a renewal in progress is never raced
/// by another caller reading the credential being replaced.
pub struct TokenCache {
    authenticator: Box<dyn Authenticator>,
    credential: Mutex<Option<Credential>>,
}

impl TokenCache {
    #[must_use]
    pub fn new(authenticator: Box<dyn Authenticator>) -> Self {
        Self {
            authenticator,
            credential: Mutex::new(None),
        }
    }

    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.credential.lock().await;
        let freshness = cached
            .as_ref()
            .map_or(Freshness::Missing, |c| c.freshness(Instant::now()));
        match freshness {
            Freshness::Valid => {}
            Freshness::Expiring => {
                debug!("Access token about to expire, waiting {:?} before renewal", EXPIRY_GRACE);
                sleep(EXPIRY_GRACE).await;
                *cached = Some(self.renew().await?);
            }
            Freshness::Missing | Freshness::Expired => {
                *cached = Some(self.renew().await?);
            }
        }
        cached
            .as_ref()
            .map(|c| c.auth.access_token.clone())
            .ok_or_else(|| Error::Other("no credential after login".to_string()))
    }

    async fn renew(&self) -> Result<Credential> {
        let auth = self.authenticator.login().await?;
        debug!("New access token valid for {}s", auth.expires_in);
        Ok(Credential {
            auth,
            issued_at: Instant::now(),
        })
    }
}
