//! Per-shard configuration shared by every shard of a pool

use crate::protocol::{IdentifyProperties, PresenceUpdatePayload};
use pushgate_common::AppConfig;
use pushgate_core::Intents;
use std::fmt;
use std::time::Duration;

/// Settings a shard needs to connect, identify, and recover
#[derive(Clone)]
pub struct ShardConfig {
    pub token: String,
    pub intents: Intents,
    pub properties: IdentifyProperties,
    pub large_threshold: Option<u16>,
    pub presence: Option<PresenceUpdatePayload>,
    /// Gateway protocol version sent as the `v` query parameter
    pub version: u8,

    /// Unacknowledged heartbeats tolerated before the connection is dropped
    pub heartbeat_miss_tolerance: u32,
    /// Time allowed for unavailable guilds to arrive after READY
    pub ready_timeout: Duration,
    pub connect_timeout: Duration,
    /// Time from opening a connection to READY or RESUMED, not counting
    /// the wait for the identify gate
    pub handshake_timeout: Duration,

    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    /// Connected time after which the backoff starts over
    pub stability_threshold: Duration,
    /// Consecutive reconnects before giving up; `None` retries forever
    pub max_reconnect_attempts: Option<u32>,
    /// Replayed dispatches allowed before a resume is abandoned
    pub max_resume_replay: Option<u64>,

    /// Caller-originated frames allowed per minute
    pub outbound_per_minute: u32,
    pub command_buffer: usize,
}

impl ShardConfig {
    /// Configuration with default timings
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            intents: Intents::default(),
            properties: IdentifyProperties::new(),
            large_threshold: None,
            presence: None,
            version: 10,
            heartbeat_miss_tolerance: 3,
            ready_timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(30),
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(30),
            stability_threshold: Duration::from_secs(60),
            max_reconnect_attempts: None,
            max_resume_replay: None,
            outbound_per_minute: 115,
            command_buffer: 64,
        }
    }

    /// Build from the application configuration
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            token: config.auth.token.clone(),
            intents: config.gateway.intents,
            properties: IdentifyProperties::new(),
            large_threshold: Some(config.gateway.large_threshold),
            presence: None,
            version: config.gateway.version,
            heartbeat_miss_tolerance: config.heartbeat.miss_tolerance,
            ready_timeout: Duration::from_millis(config.sharding.ready_timeout_ms),
            connect_timeout: Duration::from_millis(config.gateway.connect_timeout_ms),
            handshake_timeout: Duration::from_millis(config.gateway.handshake_timeout_ms),
            reconnect_base_delay: Duration::from_millis(config.reconnect.base_delay_ms),
            reconnect_max_delay: Duration::from_millis(config.reconnect.max_delay_ms),
            stability_threshold: Duration::from_millis(config.reconnect.stability_ms),
            max_reconnect_attempts: config.reconnect.max_attempts,
            max_resume_replay: config.reconnect.max_resume_replay,
            outbound_per_minute: config.gateway.outbound_per_minute,
            command_buffer: 64,
        }
    }

    #[must_use]
    pub fn with_intents(mut self, intents: Intents) -> Self {
        self.intents = intents;
        self
    }

    #[must_use]
    pub fn with_presence(mut self, presence: PresenceUpdatePayload) -> Self {
        self.presence = Some(presence);
        self
    }

    #[must_use]
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_reconnect_delays(mut self, base: Duration, max: Duration) -> Self {
        self.reconnect_base_delay = base;
        self.reconnect_max_delay = max;
        self
    }

    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    #[must_use]
    pub fn with_max_resume_replay(mut self, replay: u64) -> Self {
        self.max_resume_replay = Some(replay);
        self
    }

    #[must_use]
    pub fn with_heartbeat_miss_tolerance(mut self, tolerance: u32) -> Self {
        self.heartbeat_miss_tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn with_outbound_per_minute(mut self, per_minute: u32) -> Self {
        self.outbound_per_minute = per_minute;
        self
    }

    /// URL to open for a gateway base URL
    #[must_use]
    pub fn connect_url(&self, base: &str) -> String {
        format!(
            "{}/?v={}&encoding=json",
            base.trim_end_matches('/'),
            self.version
        )
    }
}

impl fmt::Debug for ShardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardConfig")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("version", &self.version)
            .field("heartbeat_miss_tolerance", &self.heartbeat_miss_tolerance)
            .field("ready_timeout", &self.ready_timeout)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("max_resume_replay", &self.max_resume_replay)
            .finish()
    }
}
