//! Core errors - validation failures for shard and identifier values

use thiserror::Error;

/// Core layer errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    // =========================================================================
    // Sharding Errors
    // =========================================================================
    #[error("Shard count must be at least 1")]
    ZeroShardCount,

    #[error("Shard id {id} out of range for shard count {count}")]
    ShardOutOfRange { id: u32, count: u32 },

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Invalid snowflake: {0}")]
    InvalidSnowflake(String),

    #[error("Invalid intents: {0}")]
    InvalidIntents(String),
}

impl CoreError {
    /// Get an error code string for logs and events
    pub fn code(&self) -> &'static str {
        match self {
            Self::ZeroShardCount => "ZERO_SHARD_COUNT",
            Self::ShardOutOfRange { .. } => "SHARD_OUT_OF_RANGE",
            Self::InvalidSnowflake(_) => "INVALID_SNOWFLAKE",
            Self::InvalidIntents(_) => "INVALID_INTENTS",
        }
    }

    /// Check if this error comes from a bad shard configuration
    pub fn is_sharding(&self) -> bool {
        matches!(self, Self::ZeroShardCount | Self::ShardOutOfRange { .. })
    }
}
