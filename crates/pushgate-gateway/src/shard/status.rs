//! Shard lifecycle status

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a shard is in its connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardStatus {
    /// Not running
    Idle,
    /// Opening the transport, waiting for Hello
    Connecting,
    /// Hello received; identify or resume in flight
    Identifying,
    /// READY received; guilds still arriving
    WaitingForInitialState,
    /// Fully operational
    Connected,
    /// Waiting out the backoff delay
    Reconnecting,
    /// Stopped for good
    Dead,
}

impl ShardStatus {
    /// Check if the shard accepts outbound frames
    #[must_use]
    pub const fn can_send(self) -> bool {
        matches!(self, Self::WaitingForInitialState | Self::Connected)
    }

    /// Check if the shard has finished starting, successfully or not
    ///
    /// The pool starts the next shard once the previous one is settled.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(
            self,
            Self::WaitingForInitialState | Self::Connected | Self::Dead
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Dead)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Identifying => "identifying",
            Self::WaitingForInitialState => "waiting_for_initial_state",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Dead => "dead",
        }
    }
}

impl fmt::Display for ShardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status a shard is left in after an explicit shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownIntent {
    /// Can be started again
    #[default]
    Idle,
    /// Reported as dead
    Dead,
}

impl ShutdownIntent {
    #[must_use]
    pub const fn status(self) -> ShardStatus {
        match self {
            Self::Idle => ShardStatus::Idle,
            Self::Dead => ShardStatus::Dead,
        }
    }
}
