//! Gateway message format
//!
//! Every frame on the socket is a JSON envelope `{op, t, s, d}`.

use super::{HelloPayload, IdentifyPayload, OpCode, PresenceUpdatePayload, ResumePayload};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gateway message envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayMessage {
    /// Operation code
    pub op: OpCode,

    /// Event name (only for op=0 Dispatch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,

    /// Sequence number (only for op=0 Dispatch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event data payload
    #[serde(default)]
    pub d: Option<Value>,
}

impl GatewayMessage {
    /// Create a frame with an arbitrary op code and payload
    #[must_use]
    pub fn new(op: OpCode, data: Value) -> Self {
        Self {
            op,
            t: None,
            s: None,
            d: Some(data),
        }
    }

    // === Client Messages ===

    /// Create a Heartbeat message (op=1)
    ///
    /// A sequence of zero means nothing has been received yet and is sent as `null`.
    #[must_use]
    pub fn heartbeat(last_sequence: u64) -> Self {
        let d = if last_sequence == 0 {
            Value::Null
        } else {
            Value::from(last_sequence)
        };
        Self::new(OpCode::Heartbeat, d)
    }

    /// Create an Identify message (op=2)
    #[must_use]
    pub fn identify(payload: &IdentifyPayload) -> Self {
        Self::new(
            OpCode::Identify,
            serde_json::to_value(payload).unwrap_or_default(),
        )
    }

    /// Create a Resume message (op=6)
    #[must_use]
    pub fn resume(payload: &ResumePayload) -> Self {
        Self::new(
            OpCode::Resume,
            serde_json::to_value(payload).unwrap_or_default(),
        )
    }

    /// Create a Presence Update message (op=3)
    #[must_use]
    pub fn presence(payload: &PresenceUpdatePayload) -> Self {
        Self::new(
            OpCode::PresenceUpdate,
            serde_json::to_value(payload).unwrap_or_default(),
        )
    }

    // === Server Messages ===

    /// Create a Dispatch message (op=0)
    #[must_use]
    pub fn dispatch(event_type: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            t: Some(event_type.into()),
            s: Some(sequence),
            d: Some(data),
        }
    }

    /// Create a Hello message (op=10)
    #[must_use]
    pub fn hello(heartbeat_interval: u64) -> Self {
        Self::new(
            OpCode::Hello,
            serde_json::to_value(HelloPayload::with_interval(heartbeat_interval))
                .unwrap_or_default(),
        )
    }

    /// Create a Heartbeat ACK message (op=11)
    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::new(OpCode::HeartbeatAck, Value::Null)
    }

    /// Create a Reconnect message (op=7)
    #[must_use]
    pub fn reconnect() -> Self {
        Self::new(OpCode::Reconnect, Value::Null)
    }

    /// Create an Invalid Session message (op=9)
    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self::new(OpCode::InvalidSession, Value::Bool(resumable))
    }

    // === Parsing ===

    /// Try to parse as a Hello payload (op=10)
    pub fn as_hello(&self) -> Option<HelloPayload> {
        if self.op != OpCode::Hello {
            return None;
        }
        self.d.as_ref().and_then(|d| serde_json::from_value(d.clone()).ok())
    }

    /// Whether an Invalid Session (op=9) allows resuming
    ///
    /// A missing or non-boolean payload counts as not resumable.
    pub fn as_invalid_session(&self) -> Option<bool> {
        if self.op != OpCode::InvalidSession {
            return None;
        }
        Some(self.d.as_ref().and_then(Value::as_bool).unwrap_or(false))
    }

    /// Try to parse as an Identify payload (op=2)
    pub fn as_identify(&self) -> Option<IdentifyPayload> {
        if self.op != OpCode::Identify {
            return None;
        }
        self.d.as_ref().and_then(|d| serde_json::from_value(d.clone()).ok())
    }

    /// Try to parse as a Resume payload (op=6)
    pub fn as_resume(&self) -> Option<ResumePayload> {
        if self.op != OpCode::Resume {
            return None;
        }
        self.d.as_ref().and_then(|d| serde_json::from_value(d.clone()).ok())
    }

    /// Try to parse the heartbeat sequence number (op=1)
    pub fn as_heartbeat_seq(&self) -> Option<Option<u64>> {
        if self.op != OpCode::Heartbeat {
            return None;
        }
        Some(self.d.as_ref().and_then(Value::as_u64))
    }

    // === Utilities ===

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Deserialize from a binary frame holding UTF-8 JSON
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl std::fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "GatewayMessage(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "GatewayMessage(op={})", self.op)
        }
    }
}
