//! Gateway event types
//!
//! Maps the `t` field of dispatch messages onto a closed set of names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Gateway event types
///
/// Names outside this list decode as `Unhandled`; the envelope still carries
/// the raw name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayEventType {
    // Connection events
    /// Sent after successful Identify
    Ready,
    /// Sent after successful Resume
    Resumed,

    // Guild events
    /// Guild available, joined, or created
    GuildCreate,
    /// Guild settings changed
    GuildUpdate,
    /// Left guild, kicked, or guild became unavailable
    GuildDelete,

    // Channel events
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,

    // Message events
    MessageCreate,
    MessageUpdate,
    MessageDelete,

    // Reaction events
    MessageReactionAdd,
    MessageReactionRemove,

    // Member events
    GuildMemberAdd,
    GuildMemberUpdate,
    GuildMemberRemove,
    GuildMembersChunk,

    // Presence events
    PresenceUpdate,
    TypingStart,

    // User events
    UserUpdate,

    // Voice events
    VoiceStateUpdate,
    VoiceServerUpdate,

    /// Any name not listed above
    #[serde(other)]
    Unhandled,
}

impl GatewayEventType {
    /// Get the string representation of the event type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Resumed => "RESUMED",
            Self::GuildCreate => "GUILD_CREATE",
            Self::GuildUpdate => "GUILD_UPDATE",
            Self::GuildDelete => "GUILD_DELETE",
            Self::ChannelCreate => "CHANNEL_CREATE",
            Self::ChannelUpdate => "CHANNEL_UPDATE",
            Self::ChannelDelete => "CHANNEL_DELETE",
            Self::MessageCreate => "MESSAGE_CREATE",
            Self::MessageUpdate => "MESSAGE_UPDATE",
            Self::MessageDelete => "MESSAGE_DELETE",
            Self::MessageReactionAdd => "MESSAGE_REACTION_ADD",
            Self::MessageReactionRemove => "MESSAGE_REACTION_REMOVE",
            Self::GuildMemberAdd => "GUILD_MEMBER_ADD",
            Self::GuildMemberUpdate => "GUILD_MEMBER_UPDATE",
            Self::GuildMemberRemove => "GUILD_MEMBER_REMOVE",
            Self::GuildMembersChunk => "GUILD_MEMBERS_CHUNK",
            Self::PresenceUpdate => "PRESENCE_UPDATE",
            Self::TypingStart => "TYPING_START",
            Self::UserUpdate => "USER_UPDATE",
            Self::VoiceStateUpdate => "VOICE_STATE_UPDATE",
            Self::VoiceServerUpdate => "VOICE_SERVER_UPDATE",
            Self::Unhandled => "UNHANDLED",
        }
    }

    /// Map a dispatch name onto an event type
    #[must_use]
    pub fn from_name(s: &str) -> Self {
        match s {
            "READY" => Self::Ready,
            "RESUMED" => Self::Resumed,
            "GUILD_CREATE" => Self::GuildCreate,
            "GUILD_UPDATE" => Self::GuildUpdate,
            "GUILD_DELETE" => Self::GuildDelete,
            "CHANNEL_CREATE" => Self::ChannelCreate,
            "CHANNEL_UPDATE" => Self::ChannelUpdate,
            "CHANNEL_DELETE" => Self::ChannelDelete,
            "MESSAGE_CREATE" => Self::MessageCreate,
            "MESSAGE_UPDATE" => Self::MessageUpdate,
            "MESSAGE_DELETE" => Self::MessageDelete,
            "MESSAGE_REACTION_ADD" => Self::MessageReactionAdd,
            "MESSAGE_REACTION_REMOVE" => Self::MessageReactionRemove,
            "GUILD_MEMBER_ADD" => Self::GuildMemberAdd,
            "GUILD_MEMBER_UPDATE" => Self::GuildMemberUpdate,
            "GUILD_MEMBER_REMOVE" => Self::GuildMemberRemove,
            "GUILD_MEMBERS_CHUNK" => Self::GuildMembersChunk,
            "PRESENCE_UPDATE" => Self::PresenceUpdate,
            "TYPING_START" => Self::TypingStart,
            "USER_UPDATE" => Self::UserUpdate,
            "VOICE_STATE_UPDATE" => Self::VoiceStateUpdate,
            "VOICE_SERVER_UPDATE" => Self::VoiceServerUpdate,
            _ => Self::Unhandled,
        }
    }

    /// Check if this event is consumed by the shard's own handshake
    #[must_use]
    pub const fn is_lifecycle(self) -> bool {
        matches!(self, Self::Ready | Self::Resumed)
    }
}

impl fmt::Display for GatewayEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
