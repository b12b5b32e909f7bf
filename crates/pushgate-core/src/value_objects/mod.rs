//! Value objects - immutable types that represent domain concepts

mod intents;
mod shard_info;
mod snowflake;

pub use intents::Intents;
pub use shard_info::{shard_for_guild, ShardInfo};
pub use snowflake::{Snowflake, SnowflakeParseError};
