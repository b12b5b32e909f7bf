//! Gateway events
//!
//! Dispatch names, the few payloads the shard itself reads, and the event
//! stream handed to consumers.

mod event_types;
mod gateway_event;
mod payloads;

pub use event_types::GatewayEventType;
pub use gateway_event::{EventEnvelope, GatewayEvent};
pub use payloads::{GuildAvailability, ReadyEvent, UnavailableGuild, UserPayload};
