use std::time::Duration;

/// Errors that can occur in the broker layer.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The broker task did not signal readiness in time.
    #[error("broker did not start within {0:?}")]
    StartFailed(Duration),

    /// A request was published but no subscriber received it.
    #[error("no responders on subject {0}")]
    NoResponders(String),

    /// A request got no reply within its window.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// The broker (or the remote link to it) has shut down.
    #[error("broker shut down")]
    Shutdown,

    /// Reading or writing a stream failed.
    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A frame on a broker stream could not be encoded or decoded.
    #[error("bad frame: {0}")]
    Frame(String),
}

impl From<minicbor::decode::Error> for BrokerError {
    fn from(err: minicbor::decode::Error) -> Self {
        Self::Frame(err.to_string())
    }
}

impl From<minicbor::encode::Error<std::convert::Infallible>> for BrokerError {
    fn from(err: minicbor::encode::Error<std::convert::Infallible>) -> Self {
        Self::Frame(err.to_string())
    }
}
