//! Presence bookkeeping for Livewire.
//!
//! This crate tracks which capabilities exist on the bus:
//!
//! 1. **Local advertisements**: what this connection offers, and when
//!    each was last broadcast ([`CapabilityDirectory::advertise`])
//! 2. **Seen capabilities**: what has been heard on the presence subject,
//!    and when ([`CapabilityDirectory::observe`])
//! 3. **Aging**: re-broadcasting local entries and expiring seen ones
//!    based on [`PresenceConfig`] thresholds
//!
//! # How it fits in the stack
//!
//! ```text
//! Connection (above)  ← runs the gossip loop, owns the directory
//!     ↕
//! Presence Layer (this crate)  ← pure bookkeeping, no I/O
//!     ↕
//! Protocol Layer (below)  ← provides Capability, CapabilityId
//! ```

mod config;
mod directory;
mod error;

pub use config::PresenceConfig;
pub use directory::{CapabilityDirectory, DirectoryEntry};
pub use error::PresenceError;
