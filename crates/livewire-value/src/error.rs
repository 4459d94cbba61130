//! Error types for the value model.

/// Errors raised while building or calling values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// A map was built from a flat sequence with an odd number of items,
    /// so the last key has no value.
    #[error("map needs an even number of items, got {0}")]
    OddMapArity(usize),

    /// A set holds two equal members, or a map two equal keys.
    #[error("{0} contains a duplicate member")]
    DuplicateMember(&'static str),

    /// A ratio was built with a zero denominator.
    #[error("ratio denominator must not be zero")]
    ZeroDenominator,

    /// The text is not a decimal number (`-12.5e3` style).
    #[error("invalid decimal literal: {0:?}")]
    InvalidDecimal(String),

    /// A native function rejected its arguments or failed while running.
    #[error("call to {name} failed: {reason}")]
    CallFailed { name: String, reason: String },
}
