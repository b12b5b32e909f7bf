//! Shard connection lifecycle
//!
//! A shard is one gateway connection running as one tokio task. Everything
//! that mutates its state (inbound frames, heartbeat ticks, the identify
//! gate, commands from its handle) is a branch of a single `select!` loop.

mod backoff;
mod config;
mod error;
mod handle;
mod heartbeat;
mod metrics;
mod runner;
mod session;
mod status;

pub use backoff::Backoff;
pub use config::ShardConfig;
pub use error::ShardError;
pub use handle::ShardHandle;
pub use heartbeat::{HeartbeatAction, HeartbeatTracker};
pub use metrics::{ShardMetrics, ShardMetricsSnapshot};
pub use runner::Shard;
pub use session::Session;
pub use status::{ShardStatus, ShutdownIntent};

pub(crate) use handle::ShardCommand;
