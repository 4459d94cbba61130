//! The [`Value`] sum type and its constructors.

use std::collections::HashMap;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use num_bigint::BigInt;
use num_rational::BigRational;

use crate::{BigFloat, Keyword, NativeFn, Symbol, ValueError, Var, number};

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// The four collection shapes. Collections are the only values with
/// identity: two handles to the same allocation are the *same* collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    List,
    Vector,
    Set,
    Map,
}

/// A regular expression, carried as its pattern source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Regex(String);

impl Regex {
    /// Wraps a pattern source. The pattern is not compiled here.
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    /// The pattern source.
    pub fn source(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A value of the host language's data model.
///
/// Scalars are plain data. Collections (`List`, `Vector`, `Set`, `Map`)
/// are shared, immutable `Arc` slices: cloning a collection value clones
/// the handle, not the elements, so clones keep the same identity.
/// `Var` and `Fn` are live handles that cannot be serialized.
///
/// `==` compares by structure. Use [`Value::same_identity`] to ask
/// whether two collection values are the same instance.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Double(f64),
    BigInt(BigInt),
    BigFloat(BigFloat),
    Ratio(BigRational),
    Char(char),
    String(String),
    Symbol(Symbol),
    Keyword(Keyword),
    Regex(Regex),
    Time(DateTime<Utc>),
    List(Arc<[Value]>),
    Vector(Arc<[Value]>),
    Set(Arc<[Value]>),
    /// Entries in insertion order; keys are distinct.
    Map(Arc<[(Value, Value)]>),
    Var(Arc<Var>),
    Fn(Arc<NativeFn>),
}

impl Value {
    // -- Constructors -----------------------------------------------------

    /// Builds a list.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Builds a vector.
    pub fn vector(items: impl IntoIterator<Item = Value>) -> Self {
        Self::Vector(items.into_iter().collect())
    }

    /// Builds a set. Later duplicates of an equal item are dropped.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        let mut unique: Vec<Value> = Vec::new();
        let mut index = HashIndex::default();
        for item in items {
            let hash = item.structural_hash();
            if index.find(hash, |i| unique[i] == item).is_none() {
                index.insert(hash, unique.len());
                unique.push(item);
            }
        }
        Self::Set(unique.into())
    }

    /// Builds a set whose items must already be distinct.
    ///
    /// # Errors
    /// Returns [`ValueError::DuplicateMember`] if two items are equal.
    pub fn try_set(items: Vec<Value>) -> Result<Self, ValueError> {
        let mut index = HashIndex::default();
        for (position, item) in items.iter().enumerate() {
            let hash = item.structural_hash();
            if index.find(hash, |i| items[i] == *item).is_some() {
                return Err(ValueError::DuplicateMember("set"));
            }
            index.insert(hash, position);
        }
        Ok(Self::Set(items.into()))
    }

    /// Builds a map from key/value pairs. A repeated key keeps its first
    /// position and takes the last value.
    pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let mut out: Vec<(Value, Value)> = Vec::new();
        let mut index = HashIndex::default();
        for (key, value) in entries {
            let hash = key.structural_hash();
            match index.find(hash, |i| out[i].0 == key) {
                Some(i) => out[i].1 = value,
                None => {
                    index.insert(hash, out.len());
                    out.push((key, value));
                }
            }
        }
        Self::Map(out.into())
    }

    /// Builds a map from alternating keys and values.
    ///
    /// # Errors
    /// Returns [`ValueError::OddMapArity`] if `items` has odd length.
    pub fn map_from_flat(items: Vec<Value>) -> Result<Self, ValueError> {
        if items.len() % 2 != 0 {
            return Err(ValueError::OddMapArity(items.len()));
        }
        let mut iter = items.into_iter();
        let mut pairs = Vec::new();
        while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
            pairs.push((k, v));
        }
        Ok(Self::map(pairs))
    }

    /// Builds a map from alternating keys and values whose keys must
    /// already be distinct.
    ///
    /// # Errors
    /// - [`ValueError::OddMapArity`] if `items` has odd length.
    /// - [`ValueError::DuplicateMember`] if two keys are equal.
    pub fn try_map_from_flat(items: Vec<Value>) -> Result<Self, ValueError> {
        if items.len() % 2 != 0 {
            return Err(ValueError::OddMapArity(items.len()));
        }
        let mut pairs: Vec<(Value, Value)> = Vec::with_capacity(items.len() / 2);
        let mut index = HashIndex::default();
        let mut iter = items.into_iter();
        while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
            let hash = key.structural_hash();
            if index.find(hash, |i| pairs[i].0 == key).is_some() {
                return Err(ValueError::DuplicateMember("map"));
            }
            index.insert(hash, pairs.len());
            pairs.push((key, value));
        }
        Ok(Self::Map(pairs.into()))
    }

    /// Parses `ns/name` or `name` into a symbol.
    pub fn symbol(text: &str) -> Self {
        Self::Symbol(Symbol::parse(text))
    }

    /// Parses `:ns/name` or `:name` (colon optional) into a keyword.
    pub fn keyword(text: &str) -> Self {
        Self::Keyword(Keyword::parse(text))
    }

    /// Builds a string value.
    pub fn string(text: impl Into<String>) -> Self {
        Self::String(text.into())
    }

    /// Builds a regex value from its pattern source.
    pub fn regex(source: impl Into<String>) -> Self {
        Self::Regex(Regex::new(source))
    }

    /// Builds a big decimal from its text.
    ///
    /// # Errors
    /// See [`BigFloat::parse`].
    pub fn big_float(text: &str) -> Result<Self, ValueError> {
        BigFloat::parse(text).map(Self::BigFloat)
    }

    /// Builds a ratio.
    ///
    /// # Errors
    /// Returns [`ValueError::ZeroDenominator`] when `denominator` is zero.
    pub fn ratio(
        numerator: impl Into<BigInt>,
        denominator: impl Into<BigInt>,
    ) -> Result<Self, ValueError> {
        number::ratio(numerator.into(), denominator.into()).map(Self::Ratio)
    }

    /// Wraps a var as a live handle.
    pub fn var(var: Var) -> Self {
        Self::Var(Arc::new(var))
    }

    /// Wraps a native function as a live handle.
    pub fn native_fn(f: NativeFn) -> Self {
        Self::Fn(Arc::new(f))
    }

    // -- Classification ---------------------------------------------------

    /// Short name of this value's kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::BigInt(_) => "bigint",
            Self::BigFloat(_) => "bigfloat",
            Self::Ratio(_) => "ratio",
            Self::Char(_) => "char",
            Self::String(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Keyword(_) => "keyword",
            Self::Regex(_) => "regex",
            Self::Time(_) => "time",
            Self::List(_) => "list",
            Self::Vector(_) => "vector",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Var(_) => "var",
            Self::Fn(_) => "fn",
        }
    }

    /// The collection shape, or `None` for scalars and live handles.
    pub fn collection_kind(&self) -> Option<CollectionKind> {
        match self {
            Self::List(_) => Some(CollectionKind::List),
            Self::Vector(_) => Some(CollectionKind::Vector),
            Self::Set(_) => Some(CollectionKind::Set),
            Self::Map(_) => Some(CollectionKind::Map),
            _ => None,
        }
    }

    /// `true` for `Var` and `Fn`.
    pub fn is_live_handle(&self) -> bool {
        matches!(self, Self::Var(_) | Self::Fn(_))
    }

    /// `true` for `Nil`.
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Address of the shared allocation behind a collection.
    ///
    /// Stable for as long as any handle to the collection is alive, which
    /// makes it usable as an identity key while the value is borrowed.
    /// Scalars and live handles return `None`.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Self::List(items) | Self::Vector(items) | Self::Set(items) => {
                Some(Arc::as_ptr(items).cast::<()>() as usize)
            }
            Self::Map(entries) => Some(Arc::as_ptr(entries).cast::<()>() as usize),
            _ => None,
        }
    }

    /// `true` if both values are handles to the same collection, var or
    /// function instance. Always `false` for scalars.
    pub fn same_identity(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Var(a), Self::Var(b)) => Arc::ptr_eq(a, b),
            (Self::Fn(a), Self::Fn(b)) => Arc::ptr_eq(a, b),
            _ => match (self.identity(), other.identity()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    // -- Access -----------------------------------------------------------

    /// The items of a list or vector.
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) | Self::Vector(items) => Some(items),
            _ => None,
        }
    }

    /// The entries of a map.
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Looks up `key` in a map. `None` for non-maps and missing keys.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    /// Prepends `head` to a list, returning the new list.
    ///
    /// The result is a fresh collection; `self` is unchanged. Returns
    /// `None` if `self` is not a list.
    pub fn cons(&self, head: Value) -> Option<Value> {
        let Self::List(items) = self else {
            return None;
        };
        let mut out = Vec::with_capacity(items.len() + 1);
        out.push(head);
        out.extend(items.iter().cloned());
        Some(Self::List(out.into()))
    }
}

// ---------------------------------------------------------------------------
// Equality
// ---------------------------------------------------------------------------

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::BigInt(a), Self::BigInt(b)) => a == b,
            (Self::BigFloat(a), Self::BigFloat(b)) => a == b,
            (Self::Ratio(a), Self::Ratio(b)) => a == b,
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Symbol(a), Self::Symbol(b)) => a == b,
            (Self::Keyword(a), Self::Keyword(b)) => a == b,
            (Self::Regex(a), Self::Regex(b)) => a == b,
            (Self::Time(a), Self::Time(b)) => a == b,
            (Self::List(a), Self::List(b)) | (Self::Vector(a), Self::Vector(b)) => {
                Arc::ptr_eq(a, b) || a[..] == b[..]
            }
            (Self::Set(a), Self::Set(b)) => Arc::ptr_eq(a, b) || same_members(a, b),
            (Self::Map(a), Self::Map(b)) => Arc::ptr_eq(a, b) || same_entries(a, b),
            (Self::Var(a), Self::Var(b)) => Arc::ptr_eq(a, b),
            (Self::Fn(a), Self::Fn(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

impl Value {
    /// A hash that agrees with `==`: equal values hash alike, whatever
    /// the order of their set members or map entries.
    ///
    /// Collections hash by content, live handles by identity.
    pub fn structural_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash_into(&mut hasher);
        hasher.finish()
    }

    fn hash_into<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Nil => {}
            Self::Bool(b) => b.hash(state),
            Self::Int(n) => n.hash(state),
            // 0.0 == -0.0
            Self::Double(d) => (if *d == 0.0 { 0 } else { d.to_bits() }).hash(state),
            Self::BigInt(n) => n.hash(state),
            Self::BigFloat(d) => d.hash(state),
            Self::Ratio(r) => r.hash(state),
            Self::Char(c) => c.hash(state),
            Self::String(s) => s.hash(state),
            Self::Symbol(s) => s.hash(state),
            Self::Keyword(k) => k.hash(state),
            Self::Regex(r) => r.hash(state),
            Self::Time(t) => t.hash(state),
            Self::List(items) | Self::Vector(items) => {
                items.len().hash(state);
                for item in items.iter() {
                    item.hash_into(state);
                }
            }
            Self::Set(items) => {
                items.len().hash(state);
                items
                    .iter()
                    .fold(0u64, |acc, item| acc.wrapping_add(item.structural_hash()))
                    .hash(state);
            }
            Self::Map(entries) => {
                entries.len().hash(state);
                entries
                    .iter()
                    .fold(0u64, |acc, (k, v)| {
                        let mut pair = DefaultHasher::new();
                        k.hash_into(&mut pair);
                        v.hash_into(&mut pair);
                        acc.wrapping_add(pair.finish())
                    })
                    .hash(state);
            }
            Self::Var(v) => (Arc::as_ptr(v) as usize).hash(state),
            Self::Fn(f) => (Arc::as_ptr(f) as usize).hash(state),
        }
    }
}

/// Positions in a slice of values, bucketed by structural hash.
#[derive(Default)]
struct HashIndex {
    buckets: HashMap<u64, Vec<usize>>,
}

impl HashIndex {
    fn of<'a>(values: impl Iterator<Item = &'a Value>) -> Self {
        let mut index = Self::default();
        for (position, value) in values.enumerate() {
            index.insert(value.structural_hash(), position);
        }
        index
    }

    /// First position in the `hash` bucket accepted by `matches`.
    fn find(&self, hash: u64, mut matches: impl FnMut(usize) -> bool) -> Option<usize> {
        self.buckets.get(&hash)?.iter().copied().find(|&i| matches(i))
    }

    fn insert(&mut self, hash: u64, position: usize) {
        self.buckets.entry(hash).or_default().push(position);
    }
}

/// Below this size a nested scan beats building an index.
const SMALL_COLLECTION: usize = 16;

fn same_members(a: &[Value], b: &[Value]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    if a.len() <= SMALL_COLLECTION {
        return a.iter().all(|item| b.contains(item));
    }
    let index = HashIndex::of(b.iter());
    a.iter()
        .all(|item| index.find(item.structural_hash(), |i| b[i] == *item).is_some())
}

fn same_entries(a: &[(Value, Value)], b: &[(Value, Value)]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    if a.len() <= SMALL_COLLECTION {
        return a
            .iter()
            .all(|(k, v)| b.iter().any(|(k2, v2)| k == k2 && v == v2));
    }
    let index = HashIndex::of(b.iter().map(|(k, _)| k));
    a.iter().all(|(k, v)| {
        index
            .find(k.structural_hash(), |i| b[i].0 == *k)
            .is_some_and(|i| b[i].1 == *v)
    })
}

// ---------------------------------------------------------------------------
// Printing
// ---------------------------------------------------------------------------

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("nil"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Double(d) => write!(f, "{d:?}"),
            Self::BigInt(n) => write!(f, "{n}N"),
            Self::BigFloat(d) => write!(f, "{d}"),
            Self::Ratio(r) => write!(f, "{}/{}", r.numer(), r.denom()),
            Self::Char(c) => write!(f, "\\{c}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Symbol(s) => write!(f, "{s}"),
            Self::Keyword(k) => write!(f, "{k}"),
            Self::Regex(r) => write!(f, "#\"{}\"", r.source()),
            Self::Time(t) => {
                write!(f, "#inst \"{}\"", t.to_rfc3339_opts(SecondsFormat::Nanos, true))
            }
            Self::List(items) => write_seq(f, "(", items, ")"),
            Self::Vector(items) => write_seq(f, "[", items, "]"),
            Self::Set(items) => write_seq(f, "#{", items, "}"),
            Self::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k} {v}")?;
                }
                f.write_str("}")
            }
            Self::Var(v) => write!(f, "{v:?}"),
            Self::Fn(func) => write!(f, "{func:?}"),
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(close)
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Self::Char(c)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Self::BigInt(n)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Time(t)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_keeps_identity() {
        let list = Value::list([Value::symbol("+")]);
        let copy = list.clone();
        assert!(list.same_identity(&copy));
    }

    #[test]
    fn test_equal_collections_have_distinct_identity() {
        let a = Value::vector([Value::Int(1), Value::Int(2)]);
        let b = Value::vector([Value::Int(1), Value::Int(2)]);
        assert_eq!(a, b);
        assert!(!a.same_identity(&b));
    }

    #[test]
    fn test_scalars_never_share_identity() {
        assert_eq!(Value::Int(47).identity(), None);
        assert!(!Value::Int(47).same_identity(&Value::Int(47)));
    }

    #[test]
    fn test_list_and_vector_are_not_equal() {
        let items = [Value::Int(1)];
        assert_ne!(Value::list(items.clone()), Value::vector(items));
    }

    #[test]
    fn test_set_equality_ignores_order() {
        let a = Value::set([Value::Int(1), Value::Int(2)]);
        let b = Value::set([Value::Int(2), Value::Int(1)]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_set_drops_duplicates() {
        let s = Value::set([Value::Int(1), Value::Int(1), Value::Int(2)]);
        let Value::Set(items) = s else {
            panic!("expected a set");
        };
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_map_equality_ignores_order() {
        let a = Value::map([
            (Value::keyword("a"), Value::Int(1)),
            (Value::keyword("b"), Value::Int(2)),
        ]);
        let b = Value::map([
            (Value::keyword("b"), Value::Int(2)),
            (Value::keyword("a"), Value::Int(1)),
        ]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_map_repeated_key_takes_last_value() {
        let m = Value::map([
            (Value::keyword("a"), Value::Int(1)),
            (Value::keyword("a"), Value::Int(2)),
        ]);
        assert_eq!(m.get(&Value::keyword("a")), Some(&Value::Int(2)));
        assert_eq!(m.as_map().map(<[_]>::len), Some(1));
    }

    #[test]
    fn test_structural_hash_agrees_with_equality() {
        let a = Value::set([Value::Int(1), Value::keyword("k"), Value::Double(0.0)]);
        let b = Value::set([Value::Double(-0.0), Value::keyword("k"), Value::Int(1)]);
        assert_eq!(a, b);
        assert_eq!(a.structural_hash(), b.structural_hash());

        let m1 = Value::map([(Value::Int(1), Value::Nil), (Value::Int(2), Value::Bool(true))]);
        let m2 = Value::map([(Value::Int(2), Value::Bool(true)), (Value::Int(1), Value::Nil)]);
        assert_eq!(m1.structural_hash(), m2.structural_hash());

        assert_ne!(
            Value::list([Value::Int(1)]).structural_hash(),
            Value::vector([Value::Int(1)]).structural_hash()
        );
    }

    #[test]
    fn test_large_set_and_map_equality_ignores_order() {
        let forward: Vec<Value> = (0..200).map(Value::Int).collect();
        let backward: Vec<Value> = (0..200).rev().map(Value::Int).collect();
        assert_eq!(Value::set(forward.clone()), Value::set(backward.clone()));
        assert_ne!(Value::set(forward.clone()), Value::set((1..201).map(Value::Int)));

        let m1 = Value::map(forward.iter().map(|k| (k.clone(), Value::Nil)));
        let m2 = Value::map(backward.iter().map(|k| (k.clone(), Value::Nil)));
        assert_eq!(m1, m2);
        let m3 = Value::map(backward.into_iter().map(|k| (k, Value::Bool(true))));
        assert_ne!(m1, m3);
    }

    #[test]
    fn test_large_map_keeps_every_distinct_key() {
        let m = Value::map((0..50_000).map(|n| (Value::Int(n), Value::Nil)));
        assert_eq!(m.as_map().map(<[_]>::len), Some(50_000));
        assert_eq!(m.get(&Value::Int(49_999)), Some(&Value::Nil));
    }

    #[test]
    fn test_try_set_rejects_duplicates() {
        let err = Value::try_set(vec![Value::Int(1), Value::Int(1)]).unwrap_err();
        assert_eq!(err, ValueError::DuplicateMember("set"));

        let set = Value::try_set(vec![Value::Int(1), Value::Int(2)]).unwrap();
        assert_eq!(set, Value::set([Value::Int(2), Value::Int(1)]));
    }

    #[test]
    fn test_try_map_from_flat_rejects_duplicate_keys() {
        let items = vec![Value::keyword("a"), Value::Int(1), Value::keyword("a"), Value::Int(2)];
        assert_eq!(
            Value::try_map_from_flat(items).unwrap_err(),
            ValueError::DuplicateMember("map")
        );
        assert_eq!(
            Value::try_map_from_flat(vec![Value::Nil]).unwrap_err(),
            ValueError::OddMapArity(1)
        );
    }

    #[test]
    fn test_map_from_flat_odd_length_fails() {
        let err = Value::map_from_flat(vec![Value::Int(1)]).unwrap_err();
        assert_eq!(err, ValueError::OddMapArity(1));
    }

    #[test]
    fn test_map_from_flat_pairs_items() {
        let m = Value::map_from_flat(vec![Value::keyword("k"), Value::string("v")]).unwrap();
        assert_eq!(m.get(&Value::keyword("k")), Some(&Value::string("v")));
    }

    #[test]
    fn test_cons_prepends_and_leaves_original() {
        let l = Value::list([Value::symbol("+")]);
        let d = l.cons(l.clone()).unwrap();
        let items = d.as_seq().unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].same_identity(&l));
        assert_eq!(items[1], Value::symbol("+"));
        assert_eq!(l.as_seq().unwrap().len(), 1);
    }

    #[test]
    fn test_cons_on_vector_returns_none() {
        assert!(Value::vector([]).cons(Value::Nil).is_none());
    }

    #[test]
    fn test_live_handles_compare_by_identity() {
        let f = Value::native_fn(NativeFn::new("inc", |args| match args {
            [Value::Int(n)] => Ok(Value::Int(n + 1)),
            _ => Err(ValueError::CallFailed {
                name: "inc".into(),
                reason: "expected one int".into(),
            }),
        }));
        let g = f.clone();
        assert_eq!(f, g);
        assert!(f.is_live_handle());

        let Value::Fn(func) = &f else {
            panic!("expected a fn");
        };
        assert_eq!(func.call(&[Value::Int(1)]), Ok(Value::Int(2)));
    }

    #[test]
    fn test_display_renders_reader_syntax() {
        let v = Value::vector([
            Value::keyword("bar"),
            Value::Int(47),
            Value::list([Value::symbol("+"), Value::Nil]),
            Value::string("hi"),
            Value::Char('x'),
        ]);
        assert_eq!(v.to_string(), r#"[:bar 47 (+ nil) "hi" \x]"#);
    }

    #[test]
    fn test_var_set_and_deref() {
        let var = Var::new(Symbol::parse("user/x"), Value::Int(1));
        var.set(Value::Int(2));
        assert_eq!(var.deref(), Value::Int(2));
    }
}
