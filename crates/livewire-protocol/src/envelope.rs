//! Request and response envelopes.
//!
//! An envelope is a small CBOR map with integer keys. The call arguments
//! and the result value are encoded separately with the [`Codec`] and
//! carried as byte strings, so the envelope fields can be read without
//! touching the value graph.
//!
//! ```text
//! Request  = { 1: endpoint, 2: method, 3: request_id, 4: no_response, 5: arguments }
//! Response = { 1: request_id, 2: value, 3: error }
//! ```
//!
//! Unknown keys are skipped on decode, so new optional fields can be added
//! without breaking older peers.

use livewire_value::Value;
use minicbor::{Decoder, Encoder};
use uuid::Uuid;

use crate::{Codec, ProtocolError, cbor};

mod request_key {
    pub const ENDPOINT: u64 = 1;
    pub const METHOD: u64 = 2;
    pub const REQUEST_ID: u64 = 3;
    pub const NO_RESPONSE: u64 = 4;
    pub const ARGUMENTS: u64 = 5;
}

mod response_key {
    pub const REQUEST_ID: u64 = 1;
    pub const VALUE: u64 = 2;
    pub const ERROR: u64 = 3;
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A call addressed to `endpoint`/`method`.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Service name. Also the broker subject the request is published on.
    pub endpoint: String,
    /// Operation within the endpoint.
    pub method: String,
    /// Positional arguments. Encoded together in one codec call, so
    /// sharing between arguments survives the trip.
    pub arguments: Vec<Value>,
    /// Correlates the response with this request.
    pub request_id: String,
    /// Fire-and-forget: the callee sends nothing back.
    pub no_response: bool,
}

impl Request {
    /// Creates a request with a fresh UUIDv7 id.
    pub fn new(
        endpoint: impl Into<String>,
        method: impl Into<String>,
        arguments: impl IntoIterator<Item = Value>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: method.into(),
            arguments: arguments.into_iter().collect(),
            request_id: Uuid::now_v7().to_string(),
            no_response: false,
        }
    }

    /// Marks the request as fire-and-forget.
    pub fn fire_and_forget(mut self) -> Self {
        self.no_response = true;
        self
    }

    pub fn marshal(&self, codec: &Codec) -> Result<Vec<u8>, ProtocolError> {
        let arguments = codec.encode(&Value::vector(self.arguments.iter().cloned()))?;

        let mut buf = Vec::new();
        let mut enc = Encoder::new(&mut buf);
        enc.map(5)?;
        enc.u64(request_key::ENDPOINT)?.str(&self.endpoint)?;
        enc.u64(request_key::METHOD)?.str(&self.method)?;
        enc.u64(request_key::REQUEST_ID)?.str(&self.request_id)?;
        enc.u64(request_key::NO_RESPONSE)?.bool(self.no_response)?;
        enc.u64(request_key::ARGUMENTS)?.bytes(&arguments)?;
        Ok(buf)
    }

    /// Decodes a request.
    ///
    /// # Errors
    /// - [`ProtocolError::Malformed`] if a required field is missing or the
    ///   bytes are not an envelope.
    /// - [`ProtocolError::BadArguments`] if the arguments decode to
    ///   something other than a list or vector.
    pub fn unmarshal(codec: &Codec, bytes: &[u8]) -> Result<Self, ProtocolError> {
        let limits = codec.limits();
        let mut dec = Decoder::new(bytes);

        let mut endpoint = None;
        let mut method = None;
        let mut request_id = None;
        let mut no_response = false;
        let mut arguments = None;

        let len = cbor::map_len(&mut dec, limits)?;
        for _ in 0..len {
            match dec.u64()? {
                request_key::ENDPOINT => endpoint = Some(cbor::text(&mut dec, limits)?.to_owned()),
                request_key::METHOD => method = Some(cbor::text(&mut dec, limits)?.to_owned()),
                request_key::REQUEST_ID => {
                    request_id = Some(cbor::text(&mut dec, limits)?.to_owned());
                }
                request_key::NO_RESPONSE => no_response = dec.bool()?,
                request_key::ARGUMENTS => arguments = Some(cbor::bytes(&mut dec, limits)?),
                _ => dec.skip()?,
            }
        }
        cbor::expect_end(&dec)?;

        let arguments = codec.decode(required(arguments, "arguments")?)?;
        let Some(arguments) = arguments.as_seq() else {
            return Err(ProtocolError::BadArguments(arguments.kind_name()));
        };

        Ok(Self {
            endpoint: required(endpoint, "endpoint")?,
            method: required(method, "method")?,
            arguments: arguments.to_vec(),
            request_id: required(request_id, "request_id")?,
            no_response,
        })
    }

    /// Encodes the success response to this request.
    pub fn marshal_response(&self, codec: &Codec, value: &Value) -> Result<Vec<u8>, ProtocolError> {
        let value = codec.encode(value)?;
        write_response(&self.request_id, Some(&value), None)
    }

    /// Encodes the failure response to this request.
    pub fn marshal_error_response(&self, message: &str) -> Result<Vec<u8>, ProtocolError> {
        Response::marshal_error(&self.request_id, message)
    }
}

fn required<T>(field: Option<T>, name: &str) -> Result<T, ProtocolError> {
    field.ok_or_else(|| ProtocolError::Malformed(format!("envelope is missing {name}")))
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// The reply to a [`Request`].
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub request_id: String,
    /// The result. `Nil` when `error` is set.
    pub value: Value,
    /// The handler's failure message, if it failed.
    pub error: Option<String>,
}

impl Response {
    /// Encodes a failure response without needing the original request.
    ///
    /// Used when a request can't be decoded at all; `request_id` may then
    /// be empty.
    pub fn marshal_error(request_id: &str, message: &str) -> Result<Vec<u8>, ProtocolError> {
        write_response(request_id, None, Some(message))
    }

    pub fn unmarshal(codec: &Codec, bytes: &[u8]) -> Result<Self, ProtocolError> {
        let limits = codec.limits();
        let mut dec = Decoder::new(bytes);

        let mut request_id = None;
        let mut value = None;
        let mut error = None;

        let len = cbor::map_len(&mut dec, limits)?;
        for _ in 0..len {
            match dec.u64()? {
                response_key::REQUEST_ID => {
                    request_id = Some(cbor::text(&mut dec, limits)?.to_owned());
                }
                response_key::VALUE => value = Some(cbor::bytes(&mut dec, limits)?),
                response_key::ERROR => error = Some(cbor::text(&mut dec, limits)?.to_owned()),
                _ => dec.skip()?,
            }
        }
        cbor::expect_end(&dec)?;

        let value = match (value, &error) {
            (Some(bytes), _) => codec.decode(bytes)?,
            (None, Some(_)) => Value::Nil,
            (None, None) => {
                return Err(ProtocolError::Malformed(
                    "response has neither value nor error".into(),
                ));
            }
        };

        Ok(Self {
            request_id: required(request_id, "request_id")?,
            value,
            error,
        })
    }

    /// The value, or [`ProtocolError::Remote`] if the handler failed.
    pub fn into_result(self) -> Result<Value, ProtocolError> {
        match self.error {
            Some(message) => Err(ProtocolError::Remote(message)),
            None => Ok(self.value),
        }
    }
}

fn write_response(
    request_id: &str,
    value: Option<&[u8]>,
    error: Option<&str>,
) -> Result<Vec<u8>, ProtocolError> {
    let fields = 1 + u64::from(value.is_some()) + u64::from(error.is_some());

    let mut buf = Vec::new();
    let mut enc = Encoder::new(&mut buf);
    enc.map(fields)?;
    enc.u64(response_key::REQUEST_ID)?.str(request_id)?;
    if let Some(value) = value {
        enc.u64(response_key::VALUE)?.bytes(value)?;
    }
    if let Some(error) = error {
        enc.u64(response_key::ERROR)?.str(error)?;
    }
    Ok(buf)
}
