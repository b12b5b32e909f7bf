//! `GET /gateway/bot`

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Response of the gateway info endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayInfo {
    /// Base WebSocket URL
    pub url: String,

    /// Shard count the service recommends
    #[serde(rename = "shards")]
    pub recommended_shard_count: u32,

    pub session_start_limit: SessionStartLimit,
}

/// Session start quota
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    /// Milliseconds until `remaining` resets to `total`
    #[serde(rename = "reset_after")]
    pub reset_after_ms: u64,
    /// Identify requests allowed per window
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,
}

fn default_max_concurrency() -> u32 {
    1
}

impl SessionStartLimit {
    /// Quota that never runs out, for fixed gateway URLs
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            total: u32::MAX,
            remaining: u32::MAX,
            reset_after_ms: 0,
            max_concurrency: 1,
        }
    }

    #[must_use]
    pub fn reset_after(&self) -> Duration {
        Duration::from_millis(self.reset_after_ms)
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// Gateway info lookup errors
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway info request failed with {status}: {body}")]
    Status { status: u16, body: String },
}

impl RestError {
    /// Check if retrying the request later may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
        }
    }
}

/// Source of gateway info
#[async_trait]
pub trait GatewayInfoProvider: Send + Sync {
    async fn gateway_info(&self) -> Result<GatewayInfo, RestError>;
}

/// Fetches gateway info over HTTP
#[derive(Debug, Clone)]
pub struct HttpGatewayInfo {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpGatewayInfo {
    /// Create a client for `api_url` (for example `https://discord.com/api/v10`)
    pub fn new(api_url: &str, token: &str) -> Result<Self, RestError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(format!("pushgate/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: api_url.trim_end_matches('/').to_string(),
            token: token.strip_prefix("Bot ").unwrap_or(token).to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/gateway/bot", self.base_url)
    }
}

#[async_trait]
impl GatewayInfoProvider for HttpGatewayInfo {
    #[instrument(skip(self))]
    async fn gateway_info(&self) -> Result<GatewayInfo, RestError> {
        let response = self
            .client
            .get(self.endpoint())
            .header(AUTHORIZATION, format!("Bot {}", self.token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RestError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let info: GatewayInfo = response.json().await?;
        debug!(
            url = %info.url,
            shards = info.recommended_shard_count,
            remaining = info.session_start_limit.remaining,
            "Fetched gateway info"
        );
        Ok(info)
    }
}

/// Fixed gateway info, for a known URL or for tests
#[derive(Debug, Clone)]
pub struct StaticGatewayInfo {
    info: GatewayInfo,
}

impl StaticGatewayInfo {
    #[must_use]
    pub fn new(url: impl Into<String>, recommended_shard_count: u32) -> Self {
        Self {
            info: GatewayInfo {
                url: url.into(),
                recommended_shard_count,
                session_start_limit: SessionStartLimit::unlimited(),
            },
        }
    }

    #[must_use]
    pub fn with_session_start_limit(mut self, limit: SessionStartLimit) -> Self {
        self.info.session_start_limit = limit;
        self
    }
}

impl From<GatewayInfo> for StaticGatewayInfo {
    fn from(info: GatewayInfo) -> Self {
        Self { info }
    }
}

#[async_trait]
impl GatewayInfoProvider for StaticGatewayInfo {
    async fn gateway_info(&self) -> Result<GatewayInfo, RestError> {
        Ok(self.info.clone())
    }
}
