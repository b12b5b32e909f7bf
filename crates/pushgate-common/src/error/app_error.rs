//! Application error types
//!
//! Top-level error handling for the gateway client binary and pool startup.

use crate::config::ConfigError;
use pushgate_core::CoreError;
use std::fmt;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // Domain errors
    #[error(transparent)]
    Core(#[from] CoreError),

    // Gateway info lookup
    #[error("External service error: {0}")]
    ExternalService(String),

    // Shard or pool failure
    #[error("Gateway error: {0}")]
    Gateway(String),

    // Shard ids that ended in a terminal failure
    #[error("Shards failed permanently: {0:?}")]
    DeadShards(Vec<u32>),

    // Internal errors
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    /// Get error code for logs
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Core(e) => e.code(),
            Self::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            Self::Gateway(_) => "GATEWAY_ERROR",
            Self::DeadShards(_) => "DEAD_SHARDS",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Process exit code for the binary
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(_) => 2,
            Self::ExternalService(_) => 3,
            Self::Gateway(_) | Self::DeadShards(_) => 4,
            Self::Internal(_) => 1,
        }
    }

    /// Check if retrying the same operation later may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExternalService(_))
    }

    /// Create a gateway error
    #[must_use]
    pub fn gateway(msg: impl fmt::Display) -> Self {
        Self::Gateway(msg.to_string())
    }

    /// Create an external service error
    #[must_use]
    pub fn external(msg: impl fmt::Display) -> Self {
        Self::ExternalService(msg.to_string())
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
