//! Transport layer
//!
//! The shard talks to the network only through a [`Connector`], which yields
//! a frame sink and a frame stream. Production uses tokio-tungstenite; tests
//! plug in an in-memory connector.

mod connector;
mod frame;
mod tungstenite;

pub use connector::{Connector, FrameSink, FrameStream};
pub use frame::{CloseFrameData, TransportError, WsFrame};
pub use tungstenite::TungsteniteConnector;
