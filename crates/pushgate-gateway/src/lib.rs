//! # pushgate-gateway
//!
//! Sharded gateway client: connects to a push gateway, keeps each shard's
//! session alive across disconnects, and streams dispatched events.

pub mod client;
pub mod events;
pub mod identify;
pub mod pool;
pub mod protocol;
pub mod rest;
pub mod shard;
pub mod transport;

pub use client::run;
pub use events::{EventEnvelope, GatewayEvent, GatewayEventType};
pub use identify::IdentifyGate;
pub use pool::{PoolConfig, PoolError, ShardPool};
pub use protocol::{CloseAction, GatewayMessage, OpCode, PresenceUpdatePayload};
pub use rest::{GatewayInfo, GatewayInfoProvider, HttpGatewayInfo, SessionStartLimit, StaticGatewayInfo};
pub use shard::{Shard, ShardConfig, ShardError, ShardHandle, ShardStatus, ShutdownIntent};
pub use transport::{Connector, TungsteniteConnector, WsFrame};
