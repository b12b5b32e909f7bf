//! Shard error types

use super::ShardStatus;
use crate::protocol::OpCode;
use crate::transport::TransportError;
use std::time::Duration;

/// Errors reported by a shard or its handle
#[derive(Debug, thiserror::Error)]
pub enum ShardError {
    #[error("Op code {0} is managed by the shard itself")]
    ReservedOpcode(OpCode),

    #[error("Op code {0} cannot be sent by a client")]
    NotClientOpcode(OpCode),

    #[error("Shard is not connected (status: {status})")]
    NotConnected { status: ShardStatus },

    #[error("Outbound rate limit reached, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Invalid presence status: {0}")]
    InvalidPresence(String),

    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Gateway closed the connection with {code}: {reason}")]
    FatalClose { code: u16, reason: String },

    #[error("Gave up after {attempts} reconnect attempts")]
    ReconnectAttemptsExhausted { attempts: u32 },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Shard task has stopped")]
    Stopped,
}

impl ShardError {
    /// Check if the caller can retry the same request later
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotConnected { .. } | Self::RateLimited { .. } | Self::Transport(_)
        )
    }

    /// Suggested wait before retrying, if known
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}
