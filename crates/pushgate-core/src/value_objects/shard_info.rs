//! Shard identity and guild assignment

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Snowflake;
use crate::CoreError;

/// Map a guild to the shard responsible for it
///
/// `guild_id mod shard_count` over unsigned 64-bit ids. The gateway routes a
/// guild's events by the same formula, so any deviation means a shard never
/// sees events it is expected to handle.
///
/// A `shard_count` of zero is treated as one shard.
#[inline]
pub fn shard_for_guild(guild_id: Snowflake, shard_count: u32) -> u32 {
    let count = u64::from(shard_count.max(1));
    (guild_id.into_inner() % count) as u32
}

/// A shard's position within the account's shard set
///
/// Serializes as the `[id, count]` pair used by identify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[u32; 2]", into = "[u32; 2]")]
pub struct ShardInfo {
    id: u32,
    count: u32,
}

impl ShardInfo {
    /// Create a validated shard descriptor
    pub fn new(id: u32, count: u32) -> Result<Self, CoreError> {
        if count == 0 {
            return Err(CoreError::ZeroShardCount);
        }
        if id >= count {
            return Err(CoreError::ShardOutOfRange { id, count });
        }
        Ok(Self { id, count })
    }

    /// Descriptor for an unsharded client
    pub const fn single() -> Self {
        Self { id: 0, count: 1 }
    }

    #[inline]
    pub const fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Check if this shard receives events for the guild
    #[inline]
    pub fn owns_guild(&self, guild_id: Snowflake) -> bool {
        shard_for_guild(guild_id, self.count) == self.id
    }
}

impl TryFrom<[u32; 2]> for ShardInfo {
    type Error = CoreError;

    fn try_from([id, count]: [u32; 2]) -> Result<Self, Self::Error> {
        Self::new(id, count)
    }
}

impl From<ShardInfo> for [u32; 2] {
    fn from(info: ShardInfo) -> Self {
        [info.id, info.count]
    }
}

impl fmt::Display for ShardInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.id, self.count)
    }
}
