//! Shard pool
//!
//! Owns every shard of one account, starts them one after another, and
//! routes guild traffic to the shard that owns the guild.

mod config;
mod error;
mod manager;

pub use config::PoolConfig;
pub use error::PoolError;
pub use manager::ShardPool;
