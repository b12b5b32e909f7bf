//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when present).

use pushgate_core::Intents;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub auth: AuthConfig,
    pub gateway: GatewaySettings,
    pub heartbeat: HeartbeatConfig,
    pub reconnect: ReconnectConfig,
    pub sharding: ShardingConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
    /// Log every gateway frame at trace level
    #[serde(default)]
    pub log_frames: bool,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Credentials sent with identify and resume
#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    pub token: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Gateway endpoint and identify settings
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    /// REST base used to look up the gateway URL
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Fixed gateway URL; skips the REST lookup when set
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_gateway_version")]
    pub version: u8,
    #[serde(default)]
    pub intents: Intents,
    #[serde(default = "default_large_threshold")]
    pub large_threshold: u16,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    #[serde(default = "default_outbound_per_minute")]
    pub outbound_per_minute: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Time from opening a connection to READY or RESUMED
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_ms: u64,
}

/// Heartbeat settings
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatConfig {
    /// Consecutive unacknowledged heartbeats before the connection is declared dead
    #[serde(default = "default_miss_tolerance")]
    pub miss_tolerance: u32,
}

/// Reconnect and resume settings
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// Connected time after which the backoff returns to its base
    #[serde(default = "default_stability")]
    pub stability_ms: u64,
    /// Recoverable attempts before a shard gives up (None = unlimited)
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Replayed dispatches tolerated before a resume is abandoned (None = unlimited)
    #[serde(default)]
    pub max_resume_replay: Option<u64>,
}

/// Sharding and startup settings
#[derive(Debug, Clone, Deserialize)]
pub struct ShardingConfig {
    /// Total shard count (None = use the recommended count)
    #[serde(default)]
    pub shard_count: Option<u32>,
    /// Subset of shard ids run by this process (None = all)
    #[serde(default)]
    pub shard_ids: Option<Vec<u32>>,
    #[serde(default = "default_identify_window")]
    pub identify_window_ms: u64,
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_ms: u64,
    #[serde(default = "default_spawn_timeout")]
    pub spawn_timeout_ms: u64,
}

// Default value functions
fn default_app_name() -> String {
    "pushgate".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_api_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_gateway_version() -> u8 {
    10
}

fn default_large_threshold() -> u16 {
    250
}

fn default_event_buffer() -> usize {
    1024
}

fn default_outbound_per_minute() -> u32 {
    115
}

fn default_connect_timeout() -> u64 {
    10_000
}

fn default_handshake_timeout() -> u64 {
    30_000
}

fn default_miss_tolerance() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1_000
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_stability() -> u64 {
    60_000
}

fn default_identify_window() -> u64 {
    5_000
}

fn default_ready_timeout() -> u64 {
    15_000
}

fn default_spawn_timeout() -> u64 {
    30_000
}

impl AppConfig {
    /// Configuration with every setting at its default and the given token
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            app: AppSettings {
                name: default_app_name(),
                env: default_env(),
                log_frames: false,
            },
            auth: AuthConfig {
                token: token.into(),
            },
            gateway: GatewaySettings {
                api_url: default_api_url(),
                url: None,
                version: default_gateway_version(),
                intents: Intents::default(),
                large_threshold: default_large_threshold(),
                event_buffer: default_event_buffer(),
                outbound_per_minute: default_outbound_per_minute(),
                connect_timeout_ms: default_connect_timeout(),
                handshake_timeout_ms: default_handshake_timeout(),
            },
            heartbeat: HeartbeatConfig {
                miss_tolerance: default_miss_tolerance(),
            },
            reconnect: ReconnectConfig {
                base_delay_ms: default_base_delay(),
                max_delay_ms: default_max_delay(),
                stability_ms: default_stability(),
                max_attempts: None,
                max_resume_replay: None,
            },
            sharding: ShardingConfig {
                shard_count: None,
                shard_ids: None,
                identify_window_ms: default_identify_window(),
                ready_timeout_ms: default_ready_timeout(),
                spawn_timeout_ms: default_spawn_timeout(),
            },
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_source(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("GATEWAY_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingVar("GATEWAY_TOKEN"))?;

        let mut config = Self::with_token(token);

        if let Some(name) = lookup("APP_NAME") {
            config.app.name = name;
        }
        config.app.env = lookup("APP_ENV")
            .and_then(|s| match s.to_lowercase().as_str() {
                "production" => Some(Environment::Production),
                "staging" => Some(Environment::Staging),
                "development" => Some(Environment::Development),
                _ => None,
            })
            .unwrap_or_default();
        set_parsed(&lookup, "LOG_FRAMES", &mut config.app.log_frames)?;

        let gateway = &mut config.gateway;
        if let Some(api_url) = lookup("API_URL") {
            gateway.api_url = api_url.trim_end_matches('/').to_string();
        }
        gateway.url = lookup("GATEWAY_URL").filter(|u| !u.is_empty());
        if let Some(raw) = lookup("GATEWAY_INTENTS") {
            gateway.intents = Intents::parse(&raw)
                .map_err(|e| ConfigError::InvalidValue("GATEWAY_INTENTS", e.to_string()))?;
        }
        set_parsed(&lookup, "GATEWAY_VERSION", &mut gateway.version)?;
        set_parsed(&lookup, "LARGE_THRESHOLD", &mut gateway.large_threshold)?;
        set_parsed(&lookup, "EVENT_BUFFER", &mut gateway.event_buffer)?;
        set_parsed(&lookup, "OUTBOUND_PER_MINUTE", &mut gateway.outbound_per_minute)?;
        set_parsed(&lookup, "CONNECT_TIMEOUT_MS", &mut gateway.connect_timeout_ms)?;
        set_parsed(&lookup, "HANDSHAKE_TIMEOUT_MS", &mut gateway.handshake_timeout_ms)?;

        set_parsed(&lookup, "HEARTBEAT_MISS_TOLERANCE", &mut config.heartbeat.miss_tolerance)?;

        let reconnect = &mut config.reconnect;
        set_parsed(&lookup, "RECONNECT_BASE_DELAY_MS", &mut reconnect.base_delay_ms)?;
        set_parsed(&lookup, "RECONNECT_MAX_DELAY_MS", &mut reconnect.max_delay_ms)?;
        set_parsed(&lookup, "RECONNECT_STABILITY_MS", &mut reconnect.stability_ms)?;
        reconnect.max_attempts = parse_var(&lookup, "RECONNECT_MAX_ATTEMPTS")?;
        reconnect.max_resume_replay = parse_var(&lookup, "RESUME_MAX_REPLAY")?;

        let sharding = &mut config.sharding;
        sharding.shard_count = parse_var(&lookup, "SHARD_COUNT")?;
        sharding.shard_ids = lookup("SHARD_IDS")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(|part| {
                        part.parse::<u32>()
                            .map_err(|e| ConfigError::InvalidValue("SHARD_IDS", e.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;
        set_parsed(&lookup, "IDENTIFY_WINDOW_MS", &mut sharding.identify_window_ms)?;
        set_parsed(&lookup, "READY_TIMEOUT_MS", &mut sharding.ready_timeout_ms)?;
        set_parsed(&lookup, "SPAWN_TIMEOUT_MS", &mut sharding.spawn_timeout_ms)?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reconnect.base_delay_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "RECONNECT_BASE_DELAY_MS",
                "must be greater than zero".to_string(),
            ));
        }
        if self.reconnect.max_delay_ms < self.reconnect.base_delay_ms {
            return Err(ConfigError::InvalidValue(
                "RECONNECT_MAX_DELAY_MS",
                "must not be below the base delay".to_string(),
            ));
        }
        if self.heartbeat.miss_tolerance == 0 {
            return Err(ConfigError::InvalidValue(
                "HEARTBEAT_MISS_TOLERANCE",
                "must be at least 1".to_string(),
            ));
        }
        if self.gateway.handshake_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "HANDSHAKE_TIMEOUT_MS",
                "must be greater than zero".to_string(),
            ));
        }
        if self.gateway.event_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "EVENT_BUFFER",
                "must be at least 1".to_string(),
            ));
        }
        if self.gateway.outbound_per_minute == 0 {
            return Err(ConfigError::InvalidValue(
                "OUTBOUND_PER_MINUTE",
                "must be at least 1".to_string(),
            ));
        }
        if self.sharding.shard_count == Some(0) {
            return Err(ConfigError::InvalidValue(
                "SHARD_COUNT",
                "must be at least 1".to_string(),
            ));
        }
        if let (Some(count), Some(ids)) = (self.sharding.shard_count, &self.sharding.shard_ids) {
            if let Some(bad) = ids.iter().find(|id| **id >= count) {
                return Err(ConfigError::InvalidValue(
                    "SHARD_IDS",
                    format!("shard id {bad} is not below SHARD_COUNT {count}"),
                ));
            }
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    lookup(key)
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidValue(key, e.to_string()))
        })
        .transpose()
}

fn set_parsed<F, T>(lookup: &F, key: &'static str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    if let Some(value) = parse_var(lookup, key)? {
        *slot = value;
    }
    Ok(())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
