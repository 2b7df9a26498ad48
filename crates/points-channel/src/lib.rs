//! Push channel delivering live point balances for a registered customer.
//!
//! A [`LiveUpdateChannel`] connects to the push endpoint, binds itself to a
//! customer code with a `register` handshake, and forwards every
//! `points_update` it receives. Lost connections are retried at a fixed
//! interval for as long as the owner reports itself live.

mod channel;
mod endpoint;
mod error;
mod message;
mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

pub use channel::{
    ChannelConfig, ChannelState, LiveUpdateChannel, Liveness, DEFAULT_OPEN_DELAY,
    DEFAULT_RECONNECT_DELAY,
};
pub use endpoint::push_endpoint;
pub use error::ChannelError;
pub use message::{InboundMessage, OutboundMessage};
pub use transport::{Connector, Transport, WsConnector};
