//! Error types for the protocol layer.
//!
//! Every failure of the value codec, the request/response envelopes and
//! capability encoding surfaces as a [`ProtocolError`]. None of them are
//! retryable: the same bytes (or the same value) will fail the same way.

use std::convert::Infallible;

/// Errors that can occur while encoding or decoding protocol payloads.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The value has a kind this codec refuses to encode (for example a
    /// live handle when foreign references are disabled).
    #[error("cannot encode {0} values")]
    Unsupported(&'static str),

    /// The value nests collections deeper than any peer will decode.
    #[error("value nested deeper than {0} levels")]
    TooDeep(usize),

    /// The bytes are not a structurally valid payload: truncated input,
    /// an unexpected CBOR type, trailing bytes, a forward reference, or a
    /// decode limit exceeded.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// A tagged item carries a tag number this codec doesn't know.
    #[error("unknown tag {0}")]
    UnknownTag(u64),

    /// A request decoded, but its arguments are not a sequence.
    #[error("request arguments must be a list or vector, got {0}")]
    BadArguments(&'static str),

    /// A foreign reference names a token that isn't in this codec's
    /// foreign table (it was minted by another process, or released).
    #[error("unresolved foreign reference {0}")]
    UnresolvedForeignRef(String),

    /// The remote handler failed; the message is its error text.
    #[error("remote error: {0}")]
    Remote(String),

    /// The CBOR encoder failed.
    #[error("encode failed: {0}")]
    Encode(#[from] minicbor::encode::Error<Infallible>),
}

impl From<minicbor::decode::Error> for ProtocolError {
    fn from(err: minicbor::decode::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<livewire_value::ValueError> for ProtocolError {
    fn from(err: livewire_value::ValueError) -> Self {
        Self::Malformed(err.to_string())
    }
}
