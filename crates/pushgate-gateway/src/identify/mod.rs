//! Identify rate limiting shared by every shard of one account

mod gate;

pub use gate::IdentifyGate;
