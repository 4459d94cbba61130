//! Capabilities: what a connection offers to the rest of the bus.
//!
//! A [`Capability`] names an endpoint, a method and a set of free-form
//! tags. Its [`CapabilityId`] is derived from its content alone:
//!
//! ```text
//! id = base58(sha256(canonical CBOR))
//! ```
//!
//! The canonical form is a map with integer keys in ascending order and
//! tags sorted by key, each tag's values sorted and de-duplicated. The
//! `BTreeMap`/`BTreeSet` fields keep the struct in that order at all
//! times, so two capabilities with the same content always share an id
//! no matter how they were built.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use minicbor::{Decoder, Encoder};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{DecodeLimits, ProtocolError, cbor};

const KEY_ENDPOINT: u64 = 1;
const KEY_METHOD: u64 = 2;
const KEY_TAGS: u64 = 3;

/// Content-derived identifier of a [`Capability`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityId(String);

impl CapabilityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An advertised `{endpoint, method, tags}` triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub endpoint: String,
    pub method: String,
    #[serde(default)]
    pub tags: BTreeMap<String, BTreeSet<String>>,
}

impl Capability {
    pub fn new(endpoint: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: method.into(),
            tags: BTreeMap::new(),
        }
    }

    /// Adds `value` under tag `key`. Builder style.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.entry(key.into()).or_default().insert(value.into());
        self
    }

    /// Canonical encoding. Also the presence payload.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::new();
        let mut enc = Encoder::new(&mut buf);
        enc.map(3)?;
        enc.u64(KEY_ENDPOINT)?.str(&self.endpoint)?;
        enc.u64(KEY_METHOD)?.str(&self.method)?;
        enc.u64(KEY_TAGS)?.map(self.tags.len() as u64)?;
        for (key, values) in &self.tags {
            enc.str(key)?.array(values.len() as u64)?;
            for value in values {
                enc.str(value)?;
            }
        }
        Ok(buf)
    }

    /// Decodes a capability, accepting tags in any order.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let limits = DecodeLimits::default();
        let mut dec = Decoder::new(bytes);

        let mut endpoint = None;
        let mut method = None;
        let mut tags = BTreeMap::new();

        let len = cbor::map_len(&mut dec, &limits)?;
        for _ in 0..len {
            match dec.u64()? {
                KEY_ENDPOINT => endpoint = Some(cbor::text(&mut dec, &limits)?.to_owned()),
                KEY_METHOD => method = Some(cbor::text(&mut dec, &limits)?.to_owned()),
                KEY_TAGS => tags = decode_tags(&mut dec, &limits)?,
                _ => dec.skip()?,
            }
        }
        cbor::expect_end(&dec)?;

        match (endpoint, method) {
            (Some(endpoint), Some(method)) => Ok(Self {
                endpoint,
                method,
                tags,
            }),
            _ => Err(ProtocolError::Malformed(
                "capability needs endpoint and method".into(),
            )),
        }
    }

    /// The content id.
    pub fn id(&self) -> Result<CapabilityId, ProtocolError> {
        let digest = Sha256::digest(self.encode()?);
        Ok(CapabilityId(bs58::encode(digest).into_string()))
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.endpoint, self.method)?;
        for (key, values) in &self.tags {
            let values: Vec<&str> = values.iter().map(String::as_str).collect();
            write!(f, " {key}={}", values.join(","))?;
        }
        Ok(())
    }
}

fn decode_tags(
    dec: &mut Decoder<'_>,
    limits: &DecodeLimits,
) -> Result<BTreeMap<String, BTreeSet<String>>, ProtocolError> {
    let mut tags = BTreeMap::new();
    let len = cbor::map_len(dec, limits)?;
    for _ in 0..len {
        let key = cbor::text(dec, limits)?.to_owned();
        let count = cbor::array_len(dec, limits)?;
        let mut values = BTreeSet::new();
        for _ in 0..count {
            values.insert(cbor::text(dec, limits)?.to_owned());
        }
        tags.insert(key, values);
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_ignores_tag_insertion_order() {
        let a = Capability::new("math", "add")
            .with_tag("lang", "rust")
            .with_tag("lang", "clojure")
            .with_tag("tier", "gold");
        let b = Capability::new("math", "add")
            .with_tag("tier", "gold")
            .with_tag("lang", "clojure")
            .with_tag("lang", "rust")
            .with_tag("lang", "rust");
        assert_eq!(a.id().unwrap(), b.id().unwrap());
    }

    #[test]
    fn test_id_changes_with_each_field() {
        let base = Capability::new("math", "add").with_tag("lang", "rust");
        let id = base.id().unwrap();

        let other_endpoint = Capability::new("maths", "add").with_tag("lang", "rust");
        let other_method = Capability::new("math", "sub").with_tag("lang", "rust");
        let other_tag = Capability::new("math", "add").with_tag("lang", "go");
        let extra_tag = base.clone().with_tag("tier", "gold");

        for other in [other_endpoint, other_method, other_tag, extra_tag] {
            assert_ne!(other.id().unwrap(), id, "{other} shares an id with {base}");
        }
    }

    #[test]
    fn test_decode_reverses_encode() {
        let cap = Capability::new("echo", "say").with_tag("region", "eu");
        let decoded = Capability::decode(&cap.encode().unwrap()).unwrap();
        assert_eq!(decoded, cap);
    }

    #[test]
    fn test_decode_garbage_is_malformed() {
        assert!(matches!(
            Capability::decode(b"not cbor at all"),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_serde_json_listing() {
        let cap = Capability::new("echo", "say").with_tag("region", "eu");
        let json = serde_json::to_value(&cap).unwrap();
        assert_eq!(json["endpoint"], "echo");
        assert_eq!(json["tags"]["region"][0], "eu");

        let id = cap.id().unwrap();
        assert_eq!(
            serde_json::to_value(&id).unwrap(),
            serde_json::Value::String(id.to_string())
        );
    }
}
