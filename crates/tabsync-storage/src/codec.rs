//! Serializer/parser pairs that turn cell values into stored text.
//!
//! A codec must round-trip: `parse(serialize(v)) == Some(v)` for every value
//! a caller stores. The stored text `null` parses as absent.
//!
//! [`JsonCodec`] cannot round-trip a value whose JSON form is `null`, such as
//! `()` or an `Option<U>` holding `None`: it reads back as absent. Store such
//! values inside a struct field, or supply a [`FnCodec`] with its own
//! encoding.

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CodecError;

pub trait Codec<T> {
    fn serialize(&self, value: &T) -> Result<String, CodecError>;

    /// Parse stored text. `Ok(None)` means the text encodes "no value".
    fn parse(&self, raw: &str) -> Result<Option<T>, CodecError>;
}

/// JSON via `serde_json`. The default codec.
///
/// `null` always parses to `Ok(None)`, including for types that serialize
/// to `null` themselves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JsonCodec;

impl<T: Serialize + DeserializeOwned> Codec<T> for JsonCodec {
    fn serialize(&self, value: &T) -> Result<String, CodecError> {
        serde_json::to_string(value).map_err(|e| CodecError::Serialize(e.to_string()))
    }

    fn parse(&self, raw: &str) -> Result<Option<T>, CodecError> {
        serde_json::from_str::<Option<T>>(raw).map_err(|e| CodecError::Parse(e.to_string()))
    }
}

/// Codec assembled from a caller-supplied function pair.
pub struct FnCodec<T, S, P> {
    serialize: S,
    parse: P,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S, P> FnCodec<T, S, P>
where
    S: Fn(&T) -> Result<String, CodecError>,
    P: Fn(&str) -> Result<Option<T>, CodecError>,
{
    pub fn new(serialize: S, parse: P) -> Self {
        Self {
            serialize,
            parse,
            _marker: PhantomData,
        }
    }
}

impl<T, S, P> Codec<T> for FnCodec<T, S, P>
where
    S: Fn(&T) -> Result<String, CodecError>,
    P: Fn(&str) -> Result<Option<T>, CodecError>,
{
    fn serialize(&self, value: &T) -> Result<String, CodecError> {
        (self.serialize)(value)
    }

    fn parse(&self, raw: &str) -> Result<Option<T>, CodecError> {
        (self.parse)(raw)
    }
}

impl<T, S, P> fmt::Debug for FnCodec<T, S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCodec").finish_non_exhaustive()
    }
}
