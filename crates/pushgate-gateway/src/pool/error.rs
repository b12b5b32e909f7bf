//! Pool error types

use crate::rest::RestError;
use crate::shard::ShardError;
use pushgate_common::AppError;
use pushgate_core::CoreError;

/// Errors from starting or driving a shard pool
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Failed to fetch gateway info: {0}")]
    GatewayInfo(#[from] RestError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("No shards selected")]
    NoShards,

    #[error("Shard {0} is not running in this pool")]
    ShardNotRunning(u32),

    #[error("Shard {shard_id}: {source}")]
    Shard {
        shard_id: u32,
        #[source]
        source: ShardError,
    },

    #[error("Pool is shutting down")]
    ShuttingDown,
}

impl From<PoolError> for AppError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::GatewayInfo(e) => AppError::external(e),
            PoolError::Core(e) => AppError::Core(e),
            other => AppError::gateway(other),
        }
    }
}
