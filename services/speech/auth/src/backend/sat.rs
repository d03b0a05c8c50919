//! Service access token (SAT) authority.
//!
//! Tokens are obtained with an empty `POST` to the configured endpoint,
//! authenticated by client id and secret headers.

use crate::refresh::RefreshTask;
use crate::{AuthError, AuthSnapshot, SnapshotCell, TokenAuthority};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const CLIENT_ID_HEADER: &str = "X-Client-Id";
const CLIENT_SECRET_HEADER: &str = "X-Client-Secret";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// SAT endpoint and client credentials
#[derive(Clone)]
pub struct AuthConfig {
    /// Token endpoint URL
    pub endpoint: String,
    /// Client id sent in `X-Client-Id`
    pub client_id: String,
    /// Client secret sent in `X-Client-Secret`
    pub secret: String,
    /// Interval between background refreshes
    pub renew_interval: Duration,
}

impl AuthConfig {
    /// Check that every credential field is present
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.endpoint.trim().is_empty() {
            return Err(AuthError::NotConfigured("auth.endpoint"));
        }
        if self.client_id.trim().is_empty() {
            return Err(AuthError::NotConfigured("auth.clientId"));
        }
        if self.secret.trim().is_empty() {
            return Err(AuthError::NotConfigured("auth.secret"));
        }
        Ok(())
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("endpoint", &self.endpoint)
            .field("client_id", &self.client_id)
            .field("secret", &"<redacted>")
            .field("renew_interval", &self.renew_interval)
            .finish()
    }
}

#[derive(Deserialize)]
struct SatResponse {
    #[serde(alias = "serviceAccessToken", alias = "accessToken")]
    token: Option<String>,
}

struct SatInner {
    client: reqwest::Client,
    config: AuthConfig,
    cell: SnapshotCell,
}

impl SatInner {
    async fn fetch(&self) -> Result<Arc<AuthSnapshot>, AuthError> {
        debug!(endpoint = %self.config.endpoint, "Requesting service access token");

        let response = self
            .client
            .post(&self.config.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(CLIENT_ID_HEADER, &self.config.client_id)
            .header(CLIENT_SECRET_HEADER, &self.config.secret)
            .body(Vec::new())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        let token = serde_json::from_slice::<SatResponse>(&body)?
            .token
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::EmptyToken)?;

        let snapshot = self.cell.store(AuthSnapshot::new(token));
        info!("Service access token retrieved");
        Ok(snapshot)
    }
}

/// Authority backed by a SAT endpoint
pub struct SatAuthority {
    inner: Arc<SatInner>,
    refresh: RefreshTask,
}

impl SatAuthority {
    /// Create an authority; no request is made until [`fetch_initial`](TokenAuthority::fetch_initial)
    pub fn new(config: AuthConfig) -> Result<Self, AuthError> {
        config.validate()?;
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            inner: Arc::new(SatInner {
                client,
                config,
                cell: SnapshotCell::new(),
            }),
            refresh: RefreshTask::new("sat"),
        })
    }

    /// Configured credentials
    pub fn config(&self) -> &AuthConfig {
        &self.inner.config
    }
}

impl fmt::Debug for SatAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SatAuthority")
            .field("config", &self.inner.config)
            .field("refreshing", &self.refresh.is_running())
            .finish()
    }
}

#[async_trait]
impl TokenAuthority for SatAuthority {
    fn current(&self) -> Option<Arc<AuthSnapshot>> {
        self.inner.cell.load()
    }

    async fn fetch_initial(&self) -> Result<Arc<AuthSnapshot>, AuthError> {
        self.inner.fetch().await
    }

    async fn refresh(&self) -> Result<Arc<AuthSnapshot>, AuthError> {
        self.inner.fetch().await
    }

    fn schedule_refresh(&self, interval: Duration) -> bool {
        let inner = self.inner.clone();
        self.refresh.start(interval, move || {
            let inner = inner.clone();
            async move { inner.fetch().await }
        })
    }
}
