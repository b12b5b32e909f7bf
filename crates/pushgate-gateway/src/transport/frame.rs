//! Transport-neutral frames

use std::fmt;

/// Close frame contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrameData {
    pub code: u16,
    pub reason: String,
}

impl CloseFrameData {
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// A single WebSocket data or close frame
///
/// Ping and pong are answered inside the transport and never surface here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsFrame {
    Text(String),
    Binary(Vec<u8>),
    Close(Option<CloseFrameData>),
}

impl WsFrame {
    /// Close frame with a code and reason
    #[must_use]
    pub fn close(code: u16, reason: impl Into<String>) -> Self {
        Self::Close(Some(CloseFrameData::new(code, reason)))
    }

    /// Get the frame as text, if it is text
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Close code carried by this frame, if it is a close frame with a code
    #[must_use]
    pub fn close_code(&self) -> Option<u16> {
        match self {
            Self::Close(Some(frame)) => Some(frame.code),
            _ => None,
        }
    }
}

impl fmt::Display for WsFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "text({} bytes)", text.len()),
            Self::Binary(data) => write!(f, "binary({} bytes)", data.len()),
            Self::Close(Some(frame)) => write!(f, "close({} {})", frame.code, frame.reason),
            Self::Close(None) => write!(f, "close"),
        }
    }
}

/// Transport failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("Connection closed")]
    Closed,

    #[error("WebSocket error: {0}")]
    Protocol(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error;
        match err {
            Error::ConnectionClosed | Error::AlreadyClosed => Self::Closed,
            other => Self::Protocol(other.to_string()),
        }
    }
}
