//! Gateway protocol definitions
//!
//! Defines the wire protocol: op codes, the message envelope, close codes, and
//! the client-sent payloads.

mod close_codes;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{CloseAction, CloseCode};
pub use messages::GatewayMessage;
pub use opcodes::OpCode;
pub use payloads::{
    Activity, HelloPayload, IdentifyPayload, IdentifyProperties, PresenceUpdatePayload,
    ResumePayload,
};
