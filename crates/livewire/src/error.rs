//! Unified error type for Livewire.

use std::time::Duration;

use livewire_broker::BrokerError;
use livewire_presence::PresenceError;
use livewire_protocol::ProtocolError;
use livewire_value::ValueError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `livewire` crate, you deal with this single error type
/// instead of importing errors from each sub-crate. Broker failures that
/// callers commonly branch on (no responders, timeouts) are lifted into
/// their own variants; everything else is wrapped transparently.
#[derive(Debug, thiserror::Error)]
pub enum LivewireError {
    /// An invalid value construction.
    #[error(transparent)]
    Value(#[from] ValueError),

    /// A codec or envelope error, including a remote handler's failure
    /// ([`ProtocolError::Remote`]).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Any other broker-level error (shutdown, I/O, bad frame).
    #[error(transparent)]
    Broker(BrokerError),

    /// A presence bookkeeping error.
    #[error(transparent)]
    Presence(#[from] PresenceError),

    /// The bus's broker didn't come up.
    #[error("bus failed to start: {0}")]
    BusStartFailed(#[source] BrokerError),

    /// Nobody is listening on the endpoint.
    #[error("no responders for endpoint {0}")]
    NoResponders(String),

    /// No response arrived within the exchange window.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// A request handler panicked; the message is the panic payload.
    #[error("handler panicked: {0}")]
    HandlerPanicked(String),
}

impl LivewireError {
    /// `true` for failures that may succeed if the same request is sent
    /// again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoResponders(_) | Self::Timeout(_))
    }
}

impl From<BrokerError> for LivewireError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::NoResponders(subject) => Self::NoResponders(subject),
            BrokerError::Timeout(window) => Self::Timeout(window),
            other => Self::Broker(other),
        }
    }
}
