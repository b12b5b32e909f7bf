//! Gateway info lookup
//!
//! The only REST call the gateway client needs: where to connect, how many
//! shards to run, and how many session starts are left.

mod gateway_info;

pub use gateway_info::{
    GatewayInfo, GatewayInfoProvider, HttpGatewayInfo, RestError, SessionStartLimit,
    StaticGatewayInfo,
};
