//! Small CBOR decoding helpers shared by the codec, envelopes and
//! capabilities. Each one enforces the [`DecodeLimits`] and rejects
//! indefinite-length items, which this protocol never produces.

use minicbor::Decoder;
use minicbor::data::Type;

use crate::{DecodeLimits, ProtocolError};

pub(crate) fn array_len(
    dec: &mut Decoder<'_>,
    limits: &DecodeLimits,
) -> Result<usize, ProtocolError> {
    let Some(len) = dec.array()? else {
        return Err(ProtocolError::Malformed("indefinite-length array".into()));
    };
    checked_len(len, limits, "array")
}

pub(crate) fn map_len(
    dec: &mut Decoder<'_>,
    limits: &DecodeLimits,
) -> Result<usize, ProtocolError> {
    let Some(len) = dec.map()? else {
        return Err(ProtocolError::Malformed("indefinite-length map".into()));
    };
    checked_len(len, limits, "map")
}

fn checked_len(len: u64, limits: &DecodeLimits, what: &str) -> Result<usize, ProtocolError> {
    usize::try_from(len)
        .ok()
        .filter(|len| *len <= limits.max_items)
        .ok_or_else(|| {
            ProtocolError::Malformed(format!(
                "{what} of {len} items exceeds limit {}",
                limits.max_items
            ))
        })
}

pub(crate) fn text<'b>(
    dec: &mut Decoder<'b>,
    limits: &DecodeLimits,
) -> Result<&'b str, ProtocolError> {
    if matches!(dec.datatype()?, Type::StringIndef) {
        return Err(ProtocolError::Malformed("indefinite-length string".into()));
    }
    let s = dec.str()?;
    if s.len() > limits.max_text_len {
        return Err(ProtocolError::Malformed(format!(
            "string of {} bytes exceeds limit {}",
            s.len(),
            limits.max_text_len
        )));
    }
    Ok(s)
}

pub(crate) fn bytes<'b>(
    dec: &mut Decoder<'b>,
    limits: &DecodeLimits,
) -> Result<&'b [u8], ProtocolError> {
    if matches!(dec.datatype()?, Type::BytesIndef) {
        return Err(ProtocolError::Malformed("indefinite-length bytes".into()));
    }
    let b = dec.bytes()?;
    if b.len() > limits.max_bytes_len {
        return Err(ProtocolError::Malformed(format!(
            "byte string of {} bytes exceeds limit {}",
            b.len(),
            limits.max_bytes_len
        )));
    }
    Ok(b)
}

/// Reads `null` as `None`, anything else as text.
pub(crate) fn optional_text<'b>(
    dec: &mut Decoder<'b>,
    limits: &DecodeLimits,
) -> Result<Option<&'b str>, ProtocolError> {
    if matches!(dec.datatype()?, Type::Null) {
        dec.null()?;
        return Ok(None);
    }
    text(dec, limits).map(Some)
}

/// Fails if anything follows the top-level item.
pub(crate) fn expect_end(dec: &Decoder<'_>) -> Result<(), ProtocolError> {
    if dec.position() < dec.input().len() {
        return Err(ProtocolError::Malformed("trailing bytes after payload".into()));
    }
    Ok(())
}
