//! # Livewire
//!
//! Exchange live values between processes and discover each other's
//! endpoints over a publish/subscribe bus.
//!
//! Livewire has two halves:
//!
//! - an identity-preserving, cycle-safe value codec
//!   ([`livewire_protocol::Codec`]): shared sub-collections arrive shared,
//!   and live handles travel as foreign references;
//! - a request/response bus with capability discovery: a [`Connection`]
//!   calls endpoints with [`exchange`](Connection::exchange), serves them
//!   with [`listen`](Connection::listen), and advertises and browses
//!   [`Capability`] records that a background gossip loop keeps fresh.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use livewire::prelude::*;
//!
//! # async fn run() -> Result<(), LivewireError> {
//! let bus = Bus::builder().start().await?;
//! let conn = bus.connect().await?;
//!
//! let listener = conn.listen("echo").await?;
//! tokio::spawn(listener.serve(
//!     |req: Request| async move { Ok::<_, LivewireError>(Value::vector(req.arguments)) },
//!     CancellationToken::new(),
//! ));
//!
//! let reply = conn
//!     .exchange(&Request::new("echo", "call", [Value::Int(1)]))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod bus;
mod config;
mod connection;
mod error;
mod gossip;
mod listener;
pub mod telemetry;

pub use bus::{Bus, BusBuilder};
pub use config::{BusConfig, GossipConfig};
pub use connection::{Advertisement, Connection};
pub use error::LivewireError;
pub use gossip::PRESENCE_SUBJECT;
pub use listener::{Listener, Rpc};

pub use livewire_broker as broker;
pub use livewire_presence::PresenceConfig;
pub use livewire_protocol::{Capability, CapabilityId, Codec, ProtocolError, Request, Response};
pub use livewire_value::{self as value, Value};

/// The types most programs need.
pub mod prelude {
    pub use crate::{
        Advertisement, Bus, BusConfig, Capability, CapabilityId, Connection, GossipConfig,
        Listener, LivewireError, Request, Rpc, Value,
    };
    pub use tokio_util::sync::CancellationToken;
}
