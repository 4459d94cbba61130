//! The value codec: converts a [`Value`] graph to tagged CBOR and back.
//!
//! # Identity and cycles
//!
//! Every encode or decode call owns a fresh *reference table*. Encoding
//! registers each collection under the next free index the first time it
//! is met, **before** encoding its children, and writes `Ref(index)` on
//! every later encounter. Decoding registers each collection under the
//! index carried on the wire once it is built, so two `Ref`s with the same
//! index come back as the *same* `Arc`, not two equal copies.
//!
//! Scalars are never registered: equal numbers or strings are written in
//! full every time.
//!
//! A decoded set or map with two equal members is rejected, as is a value
//! nested deeper than [`DecodeLimits::max_depth`] on either side.
//!
//! # Live handles
//!
//! `Var` and `Fn` values can't be written as data. They are parked in the
//! codec's [`ForeignTable`] and replaced by a `ForeignRef(token)`. Decoding
//! resolves the token against the same table, so a live handle round-trips
//! through every connection that shares this codec, and fails with
//! [`ProtocolError::UnresolvedForeignRef`] anywhere else.
//!
//! # Wire layout
//!
//! ```text
//! nil, bool, int, double, string  → native CBOR items
//! bigint                          → tag 2/3 + magnitude bytes
//! time                            → tag 0 + RFC 3339 text
//! symbol/keyword                  → tag 27001/27002 + [ns | null, name]
//! collection                      → tag 27008 + [kind, index, [children]]
//! back-reference                  → tag 27009 + index
//! ```
//!
//! See [`crate::tags`] for the full list.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use livewire_value::{BigFloat, CollectionKind, Keyword, Symbol, Value};
use minicbor::data::{Tag, Type};
use minicbor::{Decoder, Encoder};
use num_bigint::{BigInt, Sign};

use crate::{ForeignTable, ProtocolError, cbor, tags};

pub(crate) type CborEncoder<'b> = Encoder<&'b mut Vec<u8>>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Bounds applied while decoding untrusted bytes.
///
/// Anything past these limits is rejected as [`ProtocolError::Malformed`]
/// before memory is allocated for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Maximum collection nesting depth.
    pub max_depth: usize,
    /// Maximum number of items in one CBOR array or map.
    pub max_items: usize,
    /// Maximum length of one text string, in bytes.
    pub max_text_len: usize,
    /// Maximum length of one byte string, in bytes.
    pub max_bytes_len: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_depth: 128,
            max_items: 1 << 20,
            max_text_len: 16 << 20,
            max_bytes_len: 64 << 20,
        }
    }
}

/// Codec settings.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Encode live handles as foreign references. When `false`, encoding a
    /// `Var` or `Fn` fails with [`ProtocolError::Unsupported`].
    pub foreign_refs: bool,
    /// Decode bounds.
    pub limits: DecodeLimits,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            foreign_refs: true,
            limits: DecodeLimits::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Encodes and decodes [`Value`]s.
///
/// Cheap to clone: clones share the foreign table. The codec itself holds
/// no per-call state, so one instance can serve any number of concurrent
/// calls.
#[derive(Debug, Clone, Default)]
pub struct Codec {
    foreign: ForeignTable,
    config: CodecConfig,
}

impl Codec {
    /// Creates a codec with default settings and an empty foreign table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a codec with the given settings.
    pub fn with_config(config: CodecConfig) -> Self {
        Self {
            foreign: ForeignTable::new(),
            config,
        }
    }

    /// The table live handles are parked in.
    pub fn foreign_table(&self) -> &ForeignTable {
        &self.foreign
    }

    /// The decode bounds in effect.
    pub fn limits(&self) -> &DecodeLimits {
        &self.config.limits
    }

    /// Encodes one value graph.
    ///
    /// # Errors
    /// - [`ProtocolError::Unsupported`] for a live handle when foreign
    ///   references are disabled.
    /// - [`ProtocolError::TooDeep`] if collections nest deeper than
    ///   [`DecodeLimits::max_depth`], which no peer would accept.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::new();
        let mut enc = Encoder::new(&mut buf);
        EncodeSession::new(self).encode_value(&mut enc, value, 0)?;
        Ok(buf)
    }

    /// Decodes one value graph. The whole input must be consumed.
    ///
    /// # Errors
    /// - [`ProtocolError::Malformed`] for structurally invalid input,
    ///   including forward references and trailing bytes.
    /// - [`ProtocolError::UnknownTag`] for an unrecognized tag number.
    /// - [`ProtocolError::UnresolvedForeignRef`] for a token this codec
    ///   never minted.
    pub fn decode(&self, bytes: &[u8]) -> Result<Value, ProtocolError> {
        let mut dec = Decoder::new(bytes);
        let value = DecodeSession::new(self).decode_value(&mut dec, 0)?;
        cbor::expect_end(&dec)?;
        Ok(value)
    }
}

fn kind_code(kind: CollectionKind) -> u8 {
    match kind {
        CollectionKind::List => 0,
        CollectionKind::Vector => 1,
        CollectionKind::Set => 2,
        CollectionKind::Map => 3,
    }
}

fn kind_from_code(code: u8) -> Result<CollectionKind, ProtocolError> {
    match code {
        0 => Ok(CollectionKind::List),
        1 => Ok(CollectionKind::Vector),
        2 => Ok(CollectionKind::Set),
        3 => Ok(CollectionKind::Map),
        other => Err(ProtocolError::Malformed(format!(
            "unknown collection kind {other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// State for one `encode` call.
struct EncodeSession<'c> {
    codec: &'c Codec,
    /// Collection identity → index, in first-encounter order.
    refs: HashMap<usize, u64>,
}

impl<'c> EncodeSession<'c> {
    fn new(codec: &'c Codec) -> Self {
        Self {
            codec,
            refs: HashMap::new(),
        }
    }

    fn encode_value(
        &mut self,
        enc: &mut CborEncoder<'_>,
        value: &Value,
        depth: usize,
    ) -> Result<(), ProtocolError> {
        let max_depth = self.codec.config.limits.max_depth;
        if depth > max_depth {
            return Err(ProtocolError::TooDeep(max_depth));
        }

        // The only cycle-breaking check. It must run before any child of
        // `value` is visited.
        if let Some(id) = value.identity() {
            if let Some(&index) = self.refs.get(&id) {
                enc.tag(Tag::new(tags::REF))?.u64(index)?;
                return Ok(());
            }
        }

        match value {
            Value::Nil => {
                enc.null()?;
            }
            Value::Bool(b) => {
                enc.bool(*b)?;
            }
            Value::Int(n) => {
                enc.i64(*n)?;
            }
            Value::Double(d) => {
                enc.f64(*d)?;
            }
            Value::BigInt(n) => encode_bignum(enc, n)?,
            Value::BigFloat(d) => {
                enc.tag(Tag::new(tags::BIG_FLOAT))?.str(d.as_str())?;
            }
            Value::Ratio(r) => {
                enc.tag(Tag::new(tags::RATIO))?.array(2)?;
                encode_bignum(enc, r.numer())?;
                encode_bignum(enc, r.denom())?;
            }
            Value::Char(c) => {
                enc.tag(Tag::new(tags::CHAR))?.u32(u32::from(*c))?;
            }
            Value::String(s) => {
                enc.str(s)?;
            }
            Value::Symbol(s) => encode_name(enc, tags::SYMBOL, s.namespace(), s.name())?,
            Value::Keyword(k) => encode_name(enc, tags::KEYWORD, k.namespace(), k.name())?,
            Value::Regex(r) => {
                enc.tag(Tag::new(tags::REGEX))?.str(r.source())?;
            }
            Value::Time(t) => {
                let text = t.to_rfc3339_opts(SecondsFormat::Nanos, true);
                enc.tag(Tag::new(tags::DATE_TIME))?.str(&text)?;
            }
            Value::List(items) => {
                self.encode_seq(enc, value, CollectionKind::List, items, depth)?;
            }
            Value::Vector(items) => {
                self.encode_seq(enc, value, CollectionKind::Vector, items, depth)?;
            }
            Value::Set(items) => {
                self.encode_seq(enc, value, CollectionKind::Set, items, depth)?;
            }
            Value::Map(entries) => {
                let index = self.reserve(value);
                enc.tag(Tag::new(tags::COLLECTION))?
                    .array(3)?
                    .u8(kind_code(CollectionKind::Map))?
                    .u64(index)?
                    .array(2 * entries.len() as u64)?;
                for (k, v) in entries.iter() {
                    self.encode_value(enc, k, depth + 1)?;
                    self.encode_value(enc, v, depth + 1)?;
                }
            }
            Value::Var(_) | Value::Fn(_) => {
                if !self.codec.config.foreign_refs {
                    return Err(ProtocolError::Unsupported(value.kind_name()));
                }
                let token = self.codec.foreign.register(value.clone());
                enc.tag(Tag::new(tags::FOREIGN_REF))?.str(&token)?;
            }
        }
        Ok(())
    }

    fn encode_seq(
        &mut self,
        enc: &mut CborEncoder<'_>,
        value: &Value,
        kind: CollectionKind,
        items: &[Value],
        depth: usize,
    ) -> Result<(), ProtocolError> {
        let index = self.reserve(value);
        enc.tag(Tag::new(tags::COLLECTION))?
            .array(3)?
            .u8(kind_code(kind))?
            .u64(index)?
            .array(items.len() as u64)?;
        for item in items {
            self.encode_value(enc, item, depth + 1)?;
        }
        Ok(())
    }

    /// Registers a collection under the next free index.
    fn reserve(&mut self, value: &Value) -> u64 {
        let index = self.refs.len() as u64;
        if let Some(id) = value.identity() {
            self.refs.insert(id, index);
        }
        index
    }
}

fn encode_bignum(enc: &mut CborEncoder<'_>, n: &BigInt) -> Result<(), ProtocolError> {
    let (tag, magnitude) = if n.sign() == Sign::Minus {
        (tags::NEG_BIGNUM, -n - BigInt::from(1))
    } else {
        (tags::POS_BIGNUM, n.clone())
    };
    let (_, bytes) = magnitude.to_bytes_be();
    enc.tag(Tag::new(tag))?.bytes(&bytes)?;
    Ok(())
}

fn encode_name(
    enc: &mut CborEncoder<'_>,
    tag: u64,
    namespace: Option<&str>,
    name: &str,
) -> Result<(), ProtocolError> {
    enc.tag(Tag::new(tag))?.array(2)?;
    match namespace {
        Some(ns) => {
            enc.str(ns)?;
        }
        None => {
            enc.null()?;
        }
    }
    enc.str(name)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// State for one `decode` call.
struct DecodeSession<'c> {
    codec: &'c Codec,
    /// Wire index → the instance built for it.
    refs: HashMap<u64, Value>,
}

impl<'c> DecodeSession<'c> {
    fn new(codec: &'c Codec) -> Self {
        Self {
            codec,
            refs: HashMap::new(),
        }
    }

    fn decode_value(
        &mut self,
        dec: &mut Decoder<'_>,
        depth: usize,
    ) -> Result<Value, ProtocolError> {
        let limits = self.codec.config.limits;
        if depth > limits.max_depth {
            return Err(ProtocolError::Malformed(format!(
                "nesting deeper than {}",
                limits.max_depth
            )));
        }

        match dec.datatype()? {
            Type::Null => {
                dec.null()?;
                Ok(Value::Nil)
            }
            Type::Bool => Ok(Value::Bool(dec.bool()?)),
            Type::U8
            | Type::U16
            | Type::U32
            | Type::U64
            | Type::I8
            | Type::I16
            | Type::I32
            | Type::I64 => Ok(Value::Int(dec.i64()?)),
            Type::F16 | Type::F32 | Type::F64 => Ok(Value::Double(dec.f64()?)),
            Type::String => Ok(Value::String(cbor::text(dec, &limits)?.to_owned())),
            Type::Tag => self.decode_tagged(dec, depth),
            other => Err(ProtocolError::Malformed(format!(
                "unexpected CBOR item {other:?}"
            ))),
        }
    }

    fn decode_tagged(
        &mut self,
        dec: &mut Decoder<'_>,
        depth: usize,
    ) -> Result<Value, ProtocolError> {
        let limits = self.codec.config.limits;
        let tag = dec.tag()?.as_u64();

        match tag {
            tags::DATE_TIME => {
                let text = cbor::text(dec, &limits)?;
                let time = DateTime::parse_from_rfc3339(text).map_err(|e| {
                    ProtocolError::Malformed(format!("invalid timestamp {text:?}: {e}"))
                })?;
                Ok(Value::Time(time.with_timezone(&Utc)))
            }
            tags::POS_BIGNUM | tags::NEG_BIGNUM => {
                Ok(Value::BigInt(decode_bignum_body(dec, tag, &limits)?))
            }
            tags::SYMBOL => {
                let (ns, name) = decode_name(dec, &limits)?;
                Ok(Value::Symbol(Symbol::new(ns, name)))
            }
            tags::KEYWORD => {
                let (ns, name) = decode_name(dec, &limits)?;
                Ok(Value::Keyword(Keyword::new(ns, name)))
            }
            tags::CHAR => {
                let code = dec.u32()?;
                char::from_u32(code).map(Value::Char).ok_or_else(|| {
                    ProtocolError::Malformed(format!("invalid char code {code:#x}"))
                })
            }
            tags::BIG_FLOAT => {
                let text = cbor::text(dec, &limits)?;
                Ok(Value::BigFloat(BigFloat::parse(text)?))
            }
            tags::RATIO => {
                if cbor::array_len(dec, &limits)? != 2 {
                    return Err(ProtocolError::Malformed(
                        "ratio must have 2 components".into(),
                    ));
                }
                let numerator = decode_integer(dec, &limits)?;
                let denominator = decode_integer(dec, &limits)?;
                Ok(Value::ratio(numerator, denominator)?)
            }
            tags::REGEX => Ok(Value::regex(cbor::text(dec, &limits)?)),
            tags::FOREIGN_REF => {
                let token = cbor::text(dec, &limits)?;
                self.codec
                    .foreign
                    .resolve(token)
                    .ok_or_else(|| ProtocolError::UnresolvedForeignRef(token.to_owned()))
            }
            tags::COLLECTION => self.decode_collection(dec, depth),
            tags::REF => {
                let index = dec.u64()?;
                self.refs.get(&index).cloned().ok_or_else(|| {
                    ProtocolError::Malformed(format!(
                        "reference to index {index} before it was registered"
                    ))
                })
            }
            other => Err(ProtocolError::UnknownTag(other)),
        }
    }

    fn decode_collection(
        &mut self,
        dec: &mut Decoder<'_>,
        depth: usize,
    ) -> Result<Value, ProtocolError> {
        let limits = self.codec.config.limits;
        if cbor::array_len(dec, &limits)? != 3 {
            return Err(ProtocolError::Malformed(
                "collection must have 3 fields".into(),
            ));
        }
        let kind = kind_from_code(dec.u8()?)?;
        let index = dec.u64()?;
        if self.refs.contains_key(&index) {
            return Err(ProtocolError::Malformed(format!(
                "reference index {index} registered twice"
            )));
        }

        let len = cbor::array_len(dec, &limits)?;
        let mut children = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            children.push(self.decode_value(dec, depth + 1)?);
        }

        let value = match kind {
            CollectionKind::List => Value::List(children.into()),
            CollectionKind::Vector => Value::Vector(children.into()),
            CollectionKind::Set => Value::try_set(children)?,
            CollectionKind::Map => Value::try_map_from_flat(children)?,
        };
        self.refs.insert(index, value.clone());
        Ok(value)
    }
}

fn decode_bignum_body(
    dec: &mut Decoder<'_>,
    tag: u64,
    limits: &DecodeLimits,
) -> Result<BigInt, ProtocolError> {
    let magnitude = BigInt::from_bytes_be(Sign::Plus, cbor::bytes(dec, limits)?);
    if tag == tags::NEG_BIGNUM {
        Ok(-magnitude - BigInt::from(1))
    } else {
        Ok(magnitude)
    }
}

/// An integer component of a ratio: a native int or a bignum.
fn decode_integer(dec: &mut Decoder<'_>, limits: &DecodeLimits) -> Result<BigInt, ProtocolError> {
    match dec.datatype()? {
        Type::U8 | Type::U16 | Type::U32 | Type::U64 => Ok(BigInt::from(dec.u64()?)),
        Type::I8 | Type::I16 | Type::I32 | Type::I64 => Ok(BigInt::from(dec.i64()?)),
        Type::Tag => {
            let tag = dec.tag()?.as_u64();
            if tag != tags::POS_BIGNUM && tag != tags::NEG_BIGNUM {
                return Err(ProtocolError::Malformed(format!(
                    "expected a bignum, found tag {tag}"
                )));
            }
            decode_bignum_body(dec, tag, limits)
        }
        other => Err(ProtocolError::Malformed(format!(
            "expected an integer, found {other:?}"
        ))),
    }
}

fn decode_name<'b>(
    dec: &mut Decoder<'b>,
    limits: &DecodeLimits,
) -> Result<(Option<&'b str>, &'b str), ProtocolError> {
    if cbor::array_len(dec, limits)? != 2 {
        return Err(ProtocolError::Malformed("name must have 2 fields".into()));
    }
    let namespace = cbor::optional_text(dec, limits)?;
    let name = cbor::text(dec, limits)?;
    Ok((namespace, name))
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for the reference table. Round-trips of every value
    //! kind live in `tests/codec.rs`.

    use super::*;

    /// Walks an encoded payload and returns, in wire order, every
    /// collection index (`Reg`) and back-reference (`Ref`) it contains.
    #[derive(Debug, PartialEq)]
    enum Mark {
        Reg(u64),
        Ref(u64),
    }

    fn marks(bytes: &[u8]) -> Vec<Mark> {
        fn walk(dec: &mut Decoder<'_>, out: &mut Vec<Mark>) {
            match dec.datatype().unwrap() {
                Type::Tag => match dec.tag().unwrap().as_u64() {
                    tags::COLLECTION => {
                        dec.array().unwrap();
                        dec.u8().unwrap();
                        out.push(Mark::Reg(dec.u64().unwrap()));
                        let len = dec.array().unwrap().unwrap();
                        for _ in 0..len {
                            walk(dec, out);
                        }
                    }
                    tags::REF => out.push(Mark::Ref(dec.u64().unwrap())),
                    _ => dec.skip().unwrap(),
                },
                _ => dec.skip().unwrap(),
            }
        }
        let mut out = Vec::new();
        walk(&mut Decoder::new(bytes), &mut out);
        out
    }

    #[test]
    fn test_encode_assigns_indices_in_first_encounter_order() {
        let a = Value::list([Value::Int(1)]);
        let b = Value::vector([Value::Int(2)]);
        let outer = Value::vector([a.clone(), b.clone(), a, b]);

        let bytes = Codec::new().encode(&outer).unwrap();
        assert_eq!(
            marks(&bytes),
            vec![
                Mark::Reg(0),
                Mark::Reg(1),
                Mark::Reg(2),
                Mark::Ref(1),
                Mark::Ref(2)
            ]
        );
    }

    #[test]
    fn test_encode_equal_but_distinct_collections_are_not_shared() {
        let outer = Value::vector([
            Value::list([Value::Int(1)]),
            Value::list([Value::Int(1)]),
        ]);
        let bytes = Codec::new().encode(&outer).unwrap();
        assert_eq!(marks(&bytes), vec![Mark::Reg(0), Mark::Reg(1), Mark::Reg(2)]);
    }

    #[test]
    fn test_encode_scalars_are_never_referenced() {
        let outer = Value::vector([Value::Int(47), Value::Int(47), Value::string("s"), Value::string("s")]);
        let bytes = Codec::new().encode(&outer).unwrap();
        assert_eq!(marks(&bytes), vec![Mark::Reg(0)]);
    }

    #[test]
    fn test_encode_reference_table_is_per_call() {
        let codec = Codec::new();
        let shared = Value::list([Value::symbol("+")]);
        let first = codec.encode(&shared).unwrap();
        let second = codec.encode(&shared).unwrap();
        assert_eq!(first, second, "second call must not emit a Ref");
    }

    #[test]
    fn test_decode_forward_reference_is_rejected() {
        // [kind=vector, index=0, [Ref(5)]]: index 5 is never registered.
        let mut buf = Vec::new();
        let mut enc = Encoder::new(&mut buf);
        enc.tag(Tag::new(tags::COLLECTION)).unwrap();
        enc.array(3).unwrap().u8(1).unwrap().u64(0).unwrap().array(1).unwrap();
        enc.tag(Tag::new(tags::REF)).unwrap().u64(5).unwrap();

        let err = Codec::new().decode(&buf).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)), "got {err:?}");
    }

    #[test]
    fn test_decode_self_reference_inside_collection_is_rejected() {
        // A collection referring to its own index is only registered once
        // built, so the inner Ref(0) is a forward reference.
        let mut buf = Vec::new();
        let mut enc = Encoder::new(&mut buf);
        enc.tag(Tag::new(tags::COLLECTION)).unwrap();
        enc.array(3).unwrap().u8(0).unwrap().u64(0).unwrap().array(1).unwrap();
        enc.tag(Tag::new(tags::REF)).unwrap().u64(0).unwrap();

        assert!(matches!(
            Codec::new().decode(&buf),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_duplicate_index_is_rejected() {
        let mut buf = Vec::new();
        let mut enc = Encoder::new(&mut buf);
        enc.tag(Tag::new(tags::COLLECTION)).unwrap();
        enc.array(3).unwrap().u8(1).unwrap().u64(0).unwrap().array(1).unwrap();
        enc.tag(Tag::new(tags::COLLECTION)).unwrap();
        enc.array(3).unwrap().u8(1).unwrap().u64(0).unwrap().array(0).unwrap();

        assert!(matches!(
            Codec::new().decode(&buf),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_unknown_tag() {
        let mut buf = Vec::new();
        Encoder::new(&mut buf).tag(Tag::new(31337)).unwrap().u8(0).unwrap();
        assert!(matches!(
            Codec::new().decode(&buf),
            Err(ProtocolError::UnknownTag(31337))
        ));
    }

    #[test]
    fn test_decode_depth_limit() {
        let codec = Codec::with_config(CodecConfig {
            limits: DecodeLimits {
                max_depth: 2,
                ..DecodeLimits::default()
            },
            ..CodecConfig::default()
        });
        let deep = Value::list([Value::list([Value::list([Value::list([])])])]);
        let bytes = Codec::new().encode(&deep).unwrap();
        assert!(matches!(codec.decode(&bytes), Err(ProtocolError::Malformed(_))));
    }

    fn nested(depth: usize) -> Value {
        (0..depth).fold(Value::list([]), |inner, _| Value::list([inner]))
    }

    #[test]
    fn test_encode_depth_matches_decode_limit() {
        let codec = Codec::with_config(CodecConfig {
            limits: DecodeLimits {
                max_depth: 2,
                ..DecodeLimits::default()
            },
            ..CodecConfig::default()
        });
        let bytes = codec.encode(&nested(2)).unwrap();
        assert!(codec.decode(&bytes).is_ok());

        assert!(matches!(
            codec.encode(&nested(3)),
            Err(ProtocolError::TooDeep(2))
        ));
    }

    #[test]
    fn test_encode_very_deep_value_fails_without_overflow() {
        let err = Codec::new().encode(&nested(5_000)).unwrap_err();
        assert!(matches!(err, ProtocolError::TooDeep(128)), "got {err:?}");
    }

    /// `[kind, 0, children]` as a bare collection item.
    fn collection(kind: u8, children: &[i64]) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut enc = Encoder::new(&mut buf);
        enc.tag(Tag::new(tags::COLLECTION)).unwrap();
        enc.array(3).unwrap().u8(kind).unwrap().u64(0).unwrap();
        enc.array(children.len() as u64).unwrap();
        for child in children {
            enc.i64(*child).unwrap();
        }
        buf
    }

    #[test]
    fn test_decode_set_with_duplicate_members_is_rejected() {
        let err = Codec::new().decode(&collection(2, &[1, 1])).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)), "got {err:?}");

        let set = Codec::new().decode(&collection(2, &[1, 2])).unwrap();
        assert_eq!(set, Value::set([Value::Int(2), Value::Int(1)]));
    }

    #[test]
    fn test_decode_map_with_duplicate_keys_is_rejected() {
        let err = Codec::new().decode(&collection(3, &[1, 10, 1, 20])).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)), "got {err:?}");
    }

    #[test]
    fn test_decode_large_map_is_linear() {
        let flat: Vec<i64> = (0..200_000).flat_map(|n| [n, 0]).collect();
        let bytes = collection(3, &flat);

        let started = std::time::Instant::now();
        let map = Codec::new().decode(&bytes).unwrap();
        assert_eq!(map.as_map().map(<[_]>::len), Some(200_000));
        assert!(
            started.elapsed() < std::time::Duration::from_secs(10),
            "took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn test_decode_item_limit() {
        let codec = Codec::with_config(CodecConfig {
            limits: DecodeLimits {
                max_items: 2,
                ..DecodeLimits::default()
            },
            ..CodecConfig::default()
        });
        let wide = Value::vector([Value::Int(1), Value::Int(2), Value::Int(3)]);
        let bytes = codec.encode(&wide).unwrap();
        assert!(matches!(codec.decode(&bytes), Err(ProtocolError::Malformed(_))));
    }
}
