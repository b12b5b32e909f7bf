//! Events emitted to the consumer of a shard or pool

use super::GatewayEventType;
use crate::shard::ShardError;
use serde_json::Value;
use std::sync::Arc;

/// One decoded dispatch, in arrival order for its shard
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    /// Raw event name from the `t` field
    pub event_type: String,
    /// Known name, or `Unhandled`
    pub kind: GatewayEventType,
    pub sequence: u64,
    /// Untouched `d` field
    pub payload: Value,
}

impl EventEnvelope {
    #[must_use]
    pub fn new(event_type: impl Into<String>, sequence: u64, payload: Value) -> Self {
        let event_type = event_type.into();
        Self {
            kind: GatewayEventType::from_name(&event_type),
            event_type,
            sequence,
            payload,
        }
    }
}

/// Dispatches and lifecycle signals
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// A dispatch from the server
    Dispatch { shard_id: u32, event: EventEnvelope },
    /// A fresh session finished loading its initial state
    Established { shard_id: u32, session_id: String },
    /// A resume completed; `replayed` dispatches arrived before RESUMED
    Resumed { shard_id: u32, replayed: u64 },
    /// The connection closed
    Disconnected {
        shard_id: u32,
        code: Option<u16>,
        recoverable: bool,
    },
    Debug { shard_id: u32, message: String },
    Error {
        shard_id: u32,
        error: Arc<ShardError>,
        recoverable: bool,
    },
    /// Every shard owned by the pool reached Connected
    AllShardsReady,
}

impl GatewayEvent {
    /// Shard that produced this event, if any
    #[must_use]
    pub fn shard_id(&self) -> Option<u32> {
        match self {
            Self::Dispatch { shard_id, .. }
            | Self::Established { shard_id, .. }
            | Self::Resumed { shard_id, .. }
            | Self::Disconnected { shard_id, .. }
            | Self::Debug { shard_id, .. }
            | Self::Error { shard_id, .. } => Some(*shard_id),
            Self::AllShardsReady => None,
        }
    }

    /// Short name for logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dispatch { .. } => "dispatch",
            Self::Established { .. } => "established",
            Self::Resumed { .. } => "resumed",
            Self::Disconnected { .. } => "disconnected",
            Self::Debug { .. } => "debug",
            Self::Error { .. } => "error",
            Self::AllShardsReady => "all_shards_ready",
        }
    }
}
