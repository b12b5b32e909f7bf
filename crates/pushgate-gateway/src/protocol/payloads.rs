//! Control payload definitions
//!
//! Payloads of the non-dispatch frames exchanged during the handshake and
//! the client-originated control frames.

use pushgate_core::{Intents, ShardInfo};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload for op 10 (Hello)
///
/// Sent by the server immediately after connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

impl HelloPayload {
    /// Create a Hello payload with the given interval
    #[must_use]
    pub fn with_interval(heartbeat_interval: u64) -> Self {
        Self { heartbeat_interval }
    }
}

/// Payload for op 2 (Identify)
///
/// Sent by the client to start a new session.
#[derive(Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    /// Authentication token
    pub token: String,

    /// Client connection properties
    pub properties: IdentifyProperties,

    /// Subscribed event groups
    pub intents: Intents,

    /// `[shard_id, shard_count]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard: Option<ShardInfo>,

    /// Member count above which offline members are not sent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_threshold: Option<u16>,

    /// Presence to start the session with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence: Option<PresenceUpdatePayload>,
}

impl fmt::Debug for IdentifyPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifyPayload")
            .field("token", &"<redacted>")
            .field("properties", &self.properties)
            .field("intents", &self.intents)
            .field("shard", &self.shard)
            .field("large_threshold", &self.large_threshold)
            .finish()
    }
}

/// Client connection properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyProperties {
    /// Operating system
    pub os: String,

    /// Library name
    pub browser: String,

    /// Library name
    pub device: String,
}

impl IdentifyProperties {
    /// Library name reported in identify
    pub const LIBRARY: &'static str = "pushgate";

    /// Properties for this process
    #[must_use]
    pub fn new() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: Self::LIBRARY.to_string(),
            device: Self::LIBRARY.to_string(),
        }
    }

    /// Set operating system
    #[must_use]
    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = os.into();
        self
    }

    /// Set browser
    #[must_use]
    pub fn with_browser(mut self, browser: impl Into<String>) -> Self {
        self.browser = browser.into();
        self
    }

    /// Set device type
    #[must_use]
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self::new()
    }
}

/// Activity shown in a presence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Payload for op 3 (Presence Update)
///
/// Also embedded in identify as the initial presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUpdatePayload {
    /// Unix time in milliseconds since the client went idle
    pub since: Option<u64>,
    #[serde(default)]
    pub activities: Vec<Activity>,
    /// New status (online, dnd, idle, invisible, offline)
    pub status: String,
    #[serde(default)]
    pub afk: bool,
}

impl PresenceUpdatePayload {
    /// Valid status values
    pub const VALID_STATUSES: &'static [&'static str] =
        &["online", "dnd", "idle", "invisible", "offline"];

    /// Presence with a status and no activities
    #[must_use]
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            since: None,
            activities: Vec::new(),
            status: status.into(),
            afk: false,
        }
    }

    /// Add an activity
    #[must_use]
    pub fn with_activity(mut self, activity: Activity) -> Self {
        self.activities.push(activity);
        self
    }

    /// Check if the status is valid
    #[must_use]
    pub fn is_valid_status(&self) -> bool {
        Self::VALID_STATUSES.contains(&self.status.as_str())
    }
}

/// Payload for op 6 (Resume)
///
/// Sent by the client to continue a disconnected session.
#[derive(Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    /// Authentication token
    pub token: String,

    /// Session ID to resume
    pub session_id: String,

    /// Last received sequence number
    pub seq: u64,
}

impl fmt::Debug for ResumePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumePayload")
            .field("token", &"<redacted>")
            .field("session_id", &self.session_id)
            .field("seq", &self.seq)
            .finish()
    }
}
