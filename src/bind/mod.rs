//! Declarative request binding.
//!
//! Three ways to materialize a typed record from a request, each followed by
//! the app's validator:
//!
//! | Method | Source | Failure statuses |
//! |---|---|---|
//! | [`Context::bind_query`] | query string | 400 coercion, 500 bad record type, 422 validation |
//! | [`Context::bind_path`] | router path parameters | 400 coercion, 500 bad record type, 422 validation |
//! | [`Context::bind_json`] | JSON body | 400 decode, 422 validation |
//!
//! Query and path values are always strings, so those two walk the record's
//! fields and coerce one value per field. The lookup key is the serde field
//! name: `#[serde(rename = "id")]` is the per-field tag, otherwise the Rust
//! field name is used. A JSON body already carries typed values, so it is
//! handed to `serde_json` in one pass.
//!
//! ```rust
//! use mango::json::{self, Json};
//! use mango::{Context, Result};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Page {
//!     #[serde(rename = "q")]
//!     search: String,
//!     limit: Option<u32>,
//! }
//!
//! fn list(ctx: &mut Context) -> Result<Json<serde_json::Value>> {
//!     let page: Page = ctx.bind_query()?;
//!     Ok(json::ok(serde_json::json!({ "q": page.search, "limit": page.limit })))
//! }
//! ```

mod field;

use std::any::Any;
use std::fmt;

use http::StatusCode;
use serde::de::value::StrDeserializer;
use serde::de::{self, DeserializeOwned, DeserializeSeed, IntoDeserializer, MapAccess, Visitor};
use thiserror::Error;
use tracing::debug;

use crate::abort::{Abort, Result, abort};
use crate::context::Context;
use field::FieldValue;

/// Where a bound record's values come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Query,
    Path,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Query => "query",
            Self::Path => "path",
        })
    }
}

/// Why a record could not be bound.
///
/// The variant decides the status: input problems are the client's (400),
/// record types the binder cannot fill are the programmer's (500).
#[derive(Debug, Error)]
pub enum BindError {
    #[error("malformed query string: {0}")]
    Query(#[source] serde_urlencoded::de::Error),

    #[error("invalid value {value:?} for field `{field}`: {message}")]
    Parse { field: String, value: String, message: String },

    #[error("field `{field}` has unsupported type: {kind}")]
    Unsupported { field: String, kind: &'static str },

    #[error("{origin} record must be a struct with named fields")]
    NotARecord { origin: Origin },

    #[error("{0}")]
    Custom(String),
}

impl BindError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Query(_) | Self::Parse { .. } | Self::Custom(_) => StatusCode::BAD_REQUEST,
            Self::Unsupported { .. } | Self::NotARecord { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl de::Error for BindError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::Custom(msg.to_string())
    }
}

impl From<BindError> for Abort {
    fn from(e: BindError) -> Self {
        abort(e.status(), e)
    }
}

// ── Record walk ──────────────────────────────────────────────────────────────

/// Deserializes a struct by visiting each of its declared fields and looking
/// the field's key up in a string source.
struct Record<'a> {
    origin: Origin,
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl<'de> de::Deserializer<'de> for Record<'_> {
    type Error = BindError;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, BindError> {
        Err(BindError::NotARecord { origin: self.origin })
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, BindError> {
        visitor.visit_map(Fields { fields: fields.iter(), lookup: self.lookup, pending: None })
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map enum identifier ignored_any
    }
}

/// Yields every declared field once, present in the source or not, so a
/// missing string binds as `""` and a missing number fails to parse.
struct Fields<'a> {
    fields: std::slice::Iter<'static, &'static str>,
    lookup: &'a dyn Fn(&str) -> Option<String>,
    pending: Option<&'static str>,
}

impl<'de> MapAccess<'de> for Fields<'_> {
    type Error = BindError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>, BindError> {
        let Some(&key) = self.fields.next() else {
            return Ok(None);
        };
        self.pending = Some(key);
        let key: StrDeserializer<'_, BindError> = key.into_deserializer();
        seed.deserialize(key).map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, BindError> {
        let key = self
            .pending
            .take()
            .ok_or_else(|| BindError::Custom("field value requested before its key".to_owned()))?;
        seed.deserialize(FieldValue::new(key, (self.lookup)(key)))
    }
}

fn from_source<T: DeserializeOwned>(
    origin: Origin,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<T, BindError> {
    T::deserialize(Record { origin, lookup: &lookup })
}

/// Binds a record from a raw query string. The first value wins for repeated keys.
pub(crate) fn from_query<T: DeserializeOwned>(query: &str) -> Result<T, BindError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).map_err(BindError::Query)?;
    from_source(Origin::Query, |key| {
        pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    })
}

// ── Context entry points ─────────────────────────────────────────────────────

impl Context {
    /// Binds `T` from the query string, then validates it.
    pub fn bind_query<T: DeserializeOwned + 'static>(&self) -> Result<T> {
        let value = from_query(self.request().query().unwrap_or_default()).inspect_err(log_failure)?;
        self.validated(value)
    }

    /// Binds `T` from the path parameters captured by the router, then validates it.
    pub fn bind_path<T: DeserializeOwned + 'static>(&self) -> Result<T> {
        let req = self.request();
        let value = from_source(Origin::Path, |key| req.param(key).map(str::to_owned))
            .inspect_err(log_failure)?;
        self.validated(value)
    }

    /// Decodes the request body as JSON into `T`, then validates it.
    pub fn bind_json<T: DeserializeOwned + 'static>(&self) -> Result<T> {
        let value = serde_json::from_slice(self.request().body()).map_err(|e| {
            debug!(error = %e, "request body is not valid JSON for the target type");
            abort(StatusCode::BAD_REQUEST, e)
        })?;
        self.validated(value)
    }

    fn validated<T: 'static>(&self, value: T) -> Result<T> {
        match self.validate(&value as &dyn Any) {
            Ok(()) => Ok(value),
            Err(e) => {
                debug!(error = %e, "bound value rejected by validator");
                Err(abort(StatusCode::UNPROCESSABLE_ENTITY, e))
            }
        }
    }
}

fn log_failure(e: &BindError) {
    debug!(error = %e, status = %e.status(), "request binding failed");
}
