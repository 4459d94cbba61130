//! Wire protocol for Livewire.
//!
//! This crate defines what travels between connections:
//!
//! - **Codec** ([`Codec`]): turns a [`Value`](livewire_value::Value)
//!   graph into tagged CBOR and back, preserving shared structure and
//!   surviving cycles.
//! - **Envelopes** ([`Request`], [`Response`]): the integer-keyed CBOR
//!   maps that carry a call and its result.
//! - **Capabilities** ([`Capability`], [`CapabilityId`]): what a
//!   connection advertises, with a content-derived id.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding or
//!   decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between the value model and the broker. It
//! knows nothing about subjects, subscriptions or connections; it only
//! knows how to turn values and envelopes into bytes.
//!
//! ```text
//! Value → Codec → Envelope (bytes) → Broker
//! ```

mod capability;
mod cbor;
mod codec;
mod envelope;
mod error;
mod foreign;
pub mod tags;

pub use capability::{Capability, CapabilityId};
pub use codec::{Codec, CodecConfig, DecodeLimits};
pub use envelope::{Request, Response};
pub use error::ProtocolError;
pub use foreign::ForeignTable;
