//! Event payload definitions
//!
//! Only the dispatches the shard reads for its own bookkeeping are typed here.
//! Everything else is forwarded as raw JSON.

use pushgate_core::{ShardInfo, Snowflake};
use serde::{Deserialize, Serialize};

/// READY event payload
///
/// Sent after successful Identify.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyEvent {
    /// Gateway protocol version
    #[serde(default)]
    pub v: u8,

    /// Current user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserPayload>,

    /// Guilds the user is in (initially unavailable)
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,

    /// Session ID for resuming
    pub session_id: String,

    /// Gateway URL for resuming
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_gateway_url: Option<String>,

    /// Shard this session belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<ShardInfo>,
}

impl ReadyEvent {
    /// Ids of the guilds still to arrive through GUILD_CREATE
    pub fn pending_guild_ids(&self) -> impl Iterator<Item = Snowflake> + '_ {
        self.guilds.iter().map(|g| g.id)
    }
}

/// Unavailable guild in READY event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,
    #[serde(default = "default_unavailable")]
    pub unavailable: bool,
}

fn default_unavailable() -> bool {
    true
}

impl UnavailableGuild {
    #[must_use]
    pub fn new(id: Snowflake) -> Self {
        Self {
            id,
            unavailable: true,
        }
    }
}

/// User data included in READY
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPayload {
    pub id: Snowflake,
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

/// The part of GUILD_CREATE the shard needs to drain its pending set
#[derive(Debug, Clone, Deserialize)]
pub struct GuildAvailability {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: Option<bool>,
}

impl GuildAvailability {
    /// A guild counts as arrived unless it is explicitly still unavailable
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.unavailable != Some(true)
    }
}
