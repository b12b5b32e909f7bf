//! # pushgate-core
//!
//! Domain layer shared by the gateway client: identifiers, intent flags, and
//! the pure guild-to-shard assignment function.
//! This crate has zero dependencies on infrastructure (runtime, network, etc.).

pub mod error;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use error::CoreError;
pub use value_objects::{shard_for_guild, Intents, ShardInfo, Snowflake, SnowflakeParseError};
