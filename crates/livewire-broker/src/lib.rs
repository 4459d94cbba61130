//! Message broker layer for Livewire.
//!
//! Provides the pub/sub primitives the bus is built on:
//!
//! - [`Broker`]: an in-process broker actor. Several can run in one
//!   process; none is global.
//! - [`BrokerClient`]: `publish`, `subscribe`, `queue_subscribe` and
//!   `request`, either in-process or over a byte stream.
//! - [`Transport`]: accepts byte streams from outside the process
//!   ([`UnixTransport`]).
//!
//! # Delivery rules
//!
//! Subjects match exactly. Every plain subscription on a subject gets a
//! copy of each message; subscriptions that share a queue group get each
//! message round-robin, exactly one member per message. `publish` reports
//! how many subscriptions received the message, which is how `request`
//! fails fast with [`BrokerError::NoResponders`].

#![allow(async_fn_in_trait)]

mod broker;
mod client;
mod config;
mod error;
mod frame;
mod remote;
mod session;
mod transport;

pub use broker::Broker;
pub use client::{BrokerClient, INBOX_PREFIX, Message, Subscription, SubscriptionId};
pub use config::BrokerConfig;
pub use error::BrokerError;
pub use transport::UnixTransport;

use std::fmt;

use tokio::io::{AsyncRead, AsyncWrite};

/// Opaque identifier for an accepted stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(u64);

impl StreamId {
    /// Creates a new `StreamId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// Accepts byte streams that speak the broker protocol.
pub trait Transport: Send + 'static {
    /// The stream type produced by this transport.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Waits for and accepts the next incoming stream.
    async fn accept(&mut self) -> Result<(StreamId, Self::Stream), BrokerError>;

    /// Stops accepting and releases the listening resource.
    async fn shutdown(&self) -> Result<(), BrokerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_id_new_and_into_inner() {
        let id = StreamId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_stream_id_display() {
        assert_eq!(StreamId::new(7).to_string(), "stream-7");
        assert_eq!(SubscriptionId::new(3).to_string(), "sub-3");
    }

    #[test]
    fn test_stream_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(StreamId::new(1), "left");
        map.insert(StreamId::new(2), "right");
        assert_eq!(map[&StreamId::new(1)], "left");
    }
}
