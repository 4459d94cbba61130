//! CBOR tag numbers used on the wire.
//!
//! Every process on the bus must agree on these, so they never change
//! meaning once published. Standard IANA tags are used where one fits;
//! the rest live in a private range starting at 27001.

/// RFC 3339 date/time string (IANA).
pub const DATE_TIME: u64 = 0;
/// Positive bignum, big-endian magnitude bytes (IANA).
pub const POS_BIGNUM: u64 = 2;
/// Negative bignum, encodes `-1 - n` (IANA).
pub const NEG_BIGNUM: u64 = 3;

/// `[namespace | null, name]`.
pub const SYMBOL: u64 = 27001;
/// `[namespace | null, name]`.
pub const KEYWORD: u64 = 27002;
/// Unicode scalar value as an unsigned integer.
pub const CHAR: u64 = 27003;
/// Decimal text.
pub const BIG_FLOAT: u64 = 27004;
/// `[numerator, denominator]`, each an int or bignum.
pub const RATIO: u64 = 27005;
/// Pattern source text.
pub const REGEX: u64 = 27006;
/// Token text naming an entry in the sender's foreign table.
pub const FOREIGN_REF: u64 = 27007;
/// `[kind, index, [children...]]`.
pub const COLLECTION: u64 = 27008;
/// Index of a collection registered earlier in the same payload.
pub const REF: u64 = 27009;
