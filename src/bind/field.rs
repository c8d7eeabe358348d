//! Coerces one raw string into the scalar type a record field declares.
//!
//! The field's declared type drives which `deserialize_*` method serde calls,
//! so dispatch happens on the field kind: strings are taken verbatim, integers
//! and floats are parsed at their declared width, and every other kind is
//! rejected as unsupported.

use std::fmt::Display;
use std::str::FromStr;

use serde::de::{self, Visitor};

use super::BindError;

/// The raw value found for one field, `None` when the source had no entry.
pub(crate) struct FieldValue {
    key: &'static str,
    raw: Option<String>,
}

impl FieldValue {
    pub(crate) fn new(key: &'static str, raw: Option<String>) -> Self {
        Self { key, raw }
    }

    /// Absent values read as the empty string.
    fn text(&self) -> &str {
        self.raw.as_deref().unwrap_or_default()
    }

    fn parse<T>(&self) -> Result<T, BindError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.text().parse().map_err(|e: T::Err| BindError::Parse {
            field: self.key.to_owned(),
            value: self.text().to_owned(),
            message: e.to_string(),
        })
    }

    fn unsupported(&self, kind: &'static str) -> BindError {
        BindError::Unsupported { field: self.key.to_owned(), kind }
    }
}

macro_rules! parse_scalars {
    ($($method:ident => $ty:ty, $visit:ident;)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
                visitor.$visit(self.parse::<$ty>()?)
            }
        )*
    };
}

macro_rules! reject {
    ($($method:ident => $kind:literal;)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, BindError> {
                Err(self.unsupported($kind))
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for FieldValue {
    type Error = BindError;

    parse_scalars! {
        deserialize_i8   => i8,   visit_i8;
        deserialize_i16  => i16,  visit_i16;
        deserialize_i32  => i32,  visit_i32;
        deserialize_i64  => i64,  visit_i64;
        deserialize_i128 => i128, visit_i128;
        deserialize_u8   => u8,   visit_u8;
        deserialize_u16  => u16,  visit_u16;
        deserialize_u32  => u32,  visit_u32;
        deserialize_u64  => u64,  visit_u64;
        deserialize_u128 => u128, visit_u128;
        deserialize_f32  => f32,  visit_f32;
        deserialize_f64  => f64,  visit_f64;
    }

    reject! {
        deserialize_any      => "without a declared kind";
        deserialize_bool     => "bool";
        deserialize_char     => "char";
        deserialize_bytes    => "bytes";
        deserialize_byte_buf => "bytes";
        deserialize_unit     => "unit";
        deserialize_seq      => "sequence";
        deserialize_map      => "map";
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        self.deserialize_string(visitor)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_string(self.raw.unwrap_or_default())
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        self.deserialize_string(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        match self.raw {
            None => visitor.visit_none(),
            Some(_) => visitor.visit_some(self),
        }
    }

    /// `struct UserId(u64)` binds like the `u64` it wraps.
    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, BindError> {
        Err(self.unsupported("unit struct"))
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, BindError> {
        Err(self.unsupported("tuple"))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, BindError> {
        Err(self.unsupported("tuple struct"))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, BindError> {
        Err(self.unsupported("struct"))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, BindError> {
        Err(self.unsupported("enum"))
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_unit()
    }
}
