//! tokio-tungstenite backed connector

use super::{CloseFrameData, Connector, FrameSink, FrameStream, TransportError, WsFrame};
use async_trait::async_trait;
use futures_util::{future, SinkExt, StreamExt};
use std::borrow::Cow;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        protocol::{frame::coding::CloseCode, CloseFrame},
        Message,
    },
};
use tracing::debug;

/// Connects over plain or TLS WebSockets
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError> {
        let (ws_stream, response) =
            connect_async(url)
                .await
                .map_err(|e| TransportError::Connect {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
        debug!(url, status = %response.status(), "WebSocket connected");

        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(TransportError::from)
            .with(|frame: WsFrame| future::ready(Ok::<_, TransportError>(frame_to_message(frame))));

        let stream = read.filter_map(|result| {
            future::ready(match result {
                Ok(message) => message_to_frame(message).map(Ok),
                Err(e) => Some(Err(TransportError::from(e))),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

/// Convert a frame to a tungstenite message
fn frame_to_message(frame: WsFrame) -> Message {
    match frame {
        WsFrame::Text(text) => Message::Text(text),
        WsFrame::Binary(data) => Message::Binary(data),
        WsFrame::Close(close) => Message::Close(close.map(|c| CloseFrame {
            code: CloseCode::from(c.code),
            reason: Cow::Owned(c.reason),
        })),
    }
}

/// Convert a tungstenite message to a frame
///
/// Control frames other than close are handled by tungstenite itself.
fn message_to_frame(message: Message) -> Option<WsFrame> {
    match message {
        Message::Text(text) => Some(WsFrame::Text(text)),
        Message::Binary(data) => Some(WsFrame::Binary(data)),
        Message::Close(close) => Some(WsFrame::Close(close.map(|c| {
            CloseFrameData::new(u16::from(c.code), c.reason.into_owned())
        }))),
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => None,
    }
}
