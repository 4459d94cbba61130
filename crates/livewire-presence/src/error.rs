//! Error types for the presence layer.

use livewire_protocol::ProtocolError;

/// Errors that can occur while maintaining the capability directory.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    /// A capability couldn't be encoded to compute its id.
    #[error("capability encoding failed: {0}")]
    Capability(#[from] ProtocolError),
}
