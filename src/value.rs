use crate::record::Fields;
use chrono::{DateTime, Utc};
use serde::ser::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Typed value carried by an attribute.
///
/// The set is closed so every encoder can match on it exhaustively.
/// Values that have no natural variant are coerced to [`Value::String`]
/// through [`Value::display`] or [`Attr::debug`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Duration(Duration),
    Timestamp(DateTime<Utc>),
    Group(Fields),
}

impl Value {
    /// Coerce anything printable into a string value.
    pub fn display(value: impl fmt::Display) -> Value {
        Value::String(value.to_string())
    }

    pub fn as_group(&self) -> Option<&Fields> {
        match self {
            Value::Group(fields) => Some(fields),
            _ => None,
        }
    }
}

/// Seconds since the Unix epoch with sub-second precision.
pub(crate) fn epoch_seconds(ts: &DateTime<Utc>) -> f64 {
    ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_nanos()) / 1e9
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::String(s) => serializer.serialize_str(s),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) if f.is_nan() => serializer.serialize_str("NaN"),
            Value::Float(f) if f.is_infinite() => {
                serializer.serialize_str(if *f > 0.0 { "+Inf" } else { "-Inf" })
            }
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Duration(d) => serializer.serialize_f64(d.as_secs_f64()),
            Value::Timestamp(ts) => serializer.serialize_f64(epoch_seconds(ts)),
            Value::Group(fields) => fields.serialize(serializer),
        }
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::String(v.to_string()),
        }
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::from(v as u64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self {
        Value::Duration(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Fields> for Value {
    fn from(v: Fields) -> Self {
        Value::Group(v)
    }
}

/// A single named attribute attached to a log record.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub key: String,
    pub value: Value,
}

impl Attr {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Attr { key: key.into(), value: value.into() }
    }

    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Attr::new(key, Value::String(value.into()))
    }

    pub fn int(key: impl Into<String>, value: i64) -> Self {
        Attr::new(key, Value::Int(value))
    }

    pub fn float(key: impl Into<String>, value: f64) -> Self {
        Attr::new(key, Value::Float(value))
    }

    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Attr::new(key, Value::Bool(value))
    }

    pub fn duration(key: impl Into<String>, value: Duration) -> Self {
        Attr::new(key, Value::Duration(value))
    }

    pub fn timestamp(key: impl Into<String>, value: DateTime<Utc>) -> Self {
        Attr::new(key, Value::Timestamp(value))
    }

    /// Build a nested group attribute. Duplicate keys inside the group
    /// follow last-write-wins.
    pub fn group(key: impl Into<String>, attrs: impl IntoIterator<Item = Attr>) -> Self {
        let mut fields = Fields::new();
        fields.extend(attrs);
        Attr::new(key, Value::Group(fields))
    }

    /// Coerce a value without a dedicated variant into its `Debug` string.
    pub fn debug(key: impl Into<String>, value: &impl fmt::Debug) -> Self {
        Attr::new(key, Value::String(format!("{:?}", value)))
    }
}
