//! Scalar values exchanged with the store.
//!
//! [`Value`] covers the storage classes a relational row can hold. It is
//! used both for bound query parameters and for decoded column values.
//! Equality and hashing are bit-exact so that a [`Value`] can take part in
//! a cache key: reals compare by their IEEE-754 bit pattern.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::error::DataGateError;

/// A single column value or bound parameter.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Name of the storage class, used in decode errors.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Real(a), Self::Real(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Blob(a), Self::Blob(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Integer(v) => v.hash(state),
            Self::Real(v) => v.to_bits().hash(state),
            Self::Text(v) => v.hash(state),
            Self::Blob(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "'{v}'"),
            Self::Blob(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Conversion from a column [`Value`] into a Rust type.
///
/// Implemented for the scalar types a row is usually read into. The
/// `column` argument only feeds error messages.
pub trait FromValue: Sized {
    /// Converts `value` read from `column`.
    ///
    /// # Errors
    ///
    /// Returns [`DataGateError::Decode`] if the value's storage class is
    /// not convertible to `Self`.
    fn from_value(column: &str, value: &Value) -> Result<Self, DataGateError>;
}

fn mismatch(column: &str, expected: &str, value: &Value) -> DataGateError {
    DataGateError::Decode {
        column: column.to_string(),
        message: format!("expected {expected}, found {}", value.kind()),
    }
}

impl FromValue for i64 {
    fn from_value(column: &str, value: &Value) -> Result<Self, DataGateError> {
        match value {
            Value::Integer(v) => Ok(*v),
            // NUMERIC affinity hands back text for some declared types.
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| mismatch(column, "integer", value)),
            _ => Err(mismatch(column, "integer", value)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(column: &str, value: &Value) -> Result<Self, DataGateError> {
        match value {
            Value::Real(v) => Ok(*v),
            #[allow(clippy::cast_precision_loss)]
            Value::Integer(v) => Ok(*v as f64),
            Value::Text(s) => s.trim().parse().map_err(|_| mismatch(column, "real", value)),
            _ => Err(mismatch(column, "real", value)),
        }
    }
}

impl FromValue for bool {
    fn from_value(column: &str, value: &Value) -> Result<Self, DataGateError> {
        match value {
            Value::Integer(v) => Ok(*v != 0),
            _ => Err(mismatch(column, "boolean", value)),
        }
    }
}

impl FromValue for String {
    fn from_value(column: &str, value: &Value) -> Result<Self, DataGateError> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            _ => Err(mismatch(column, "text", value)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(column: &str, value: &Value) -> Result<Self, DataGateError> {
        match value {
            Value::Blob(b) => Ok(b.clone()),
            _ => Err(mismatch(column, "blob", value)),
        }
    }
}

impl FromValue for Value {
    fn from_value(_column: &str, value: &Value) -> Result<Self, DataGateError> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(column: &str, value: &Value) -> Result<Self, DataGateError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(column, value).map(Some)
        }
    }
}
