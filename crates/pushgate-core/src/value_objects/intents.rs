//! Gateway intents bitflags
//!
//! Intents select which groups of dispatch events a shard subscribes to.
//! They are sent once per identify as a plain integer.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::CoreError;

bitflags! {
    /// Gateway subscription flags
    ///
    /// Serialized as an integer on the wire.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Intents: u64 {
        /// Guild lifecycle, roles, channels, threads
        const GUILDS                        = 1 << 0;
        /// Member add/update/remove (privileged)
        const GUILD_MEMBERS                 = 1 << 1;
        /// Bans and audit log entries
        const GUILD_MODERATION              = 1 << 2;
        /// Emoji, sticker, and soundboard updates
        const GUILD_EXPRESSIONS             = 1 << 3;
        const GUILD_INTEGRATIONS            = 1 << 4;
        const GUILD_WEBHOOKS                = 1 << 5;
        const GUILD_INVITES                 = 1 << 6;
        const GUILD_VOICE_STATES            = 1 << 7;
        /// Presence updates (privileged)
        const GUILD_PRESENCES               = 1 << 8;
        const GUILD_MESSAGES                = 1 << 9;
        const GUILD_MESSAGE_REACTIONS       = 1 << 10;
        const GUILD_MESSAGE_TYPING          = 1 << 11;
        const DIRECT_MESSAGES               = 1 << 12;
        const DIRECT_MESSAGE_REACTIONS      = 1 << 13;
        const DIRECT_MESSAGE_TYPING         = 1 << 14;
        /// Message content in guild messages (privileged)
        const MESSAGE_CONTENT               = 1 << 15;
        const GUILD_SCHEDULED_EVENTS        = 1 << 16;
        const AUTO_MODERATION_CONFIGURATION = 1 << 20;
        const AUTO_MODERATION_EXECUTION     = 1 << 21;
        const GUILD_MESSAGE_POLLS           = 1 << 24;
        const DIRECT_MESSAGE_POLLS          = 1 << 25;

        /// Intents that must be enabled for the application before use
        const PRIVILEGED = Self::GUILD_MEMBERS.bits()
            | Self::GUILD_PRESENCES.bits()
            | Self::MESSAGE_CONTENT.bits();
    }
}

impl Intents {
    /// Check if any privileged intent is requested
    #[inline]
    pub fn is_privileged(self) -> bool {
        self.intersects(Self::PRIVILEGED)
    }

    /// Parse from string representation (decimal number)
    ///
    /// Unknown bits are rejected rather than truncated, so a typo in
    /// configuration does not silently drop a subscription.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let bits = s
            .trim()
            .parse::<u64>()
            .map_err(|e| CoreError::InvalidIntents(e.to_string()))?;
        Self::from_bits(bits).ok_or_else(|| CoreError::InvalidIntents(format!("unknown bits in {bits}")))
    }
}

impl Default for Intents {
    fn default() -> Self {
        Intents::GUILDS
    }
}

impl fmt::Display for Intents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

impl Serialize for Intents {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.bits())
    }
}

impl<'de> Deserialize<'de> for Intents {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = u64::deserialize(deserializer)?;
        Ok(Intents::from_bits_truncate(bits))
    }
}

impl From<Intents> for u64 {
    fn from(intents: Intents) -> Self {
        intents.bits()
    }
}
