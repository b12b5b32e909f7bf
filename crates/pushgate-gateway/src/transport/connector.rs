//! Connector seam between the shard and the network

use super::{TransportError, WsFrame};
use async_trait::async_trait;
use futures::{Sink, Stream};
use std::pin::Pin;

/// Outbound half of a connection
pub type FrameSink = Pin<Box<dyn Sink<WsFrame, Error = TransportError> + Send>>;

/// Inbound half of a connection
///
/// The stream ends when the peer goes away without a close frame.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<WsFrame, TransportError>> + Send>>;

/// Opens gateway connections
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection to `url`
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError>;
}
