use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

/// Values as a document-store driver hands them back.
///
/// Drivers keep integer widths, identifier types and key order that the
/// calling evaluator does not understand; `crate::normalize` flattens these
/// into plain JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Null,
    Bool(bool),
    String(String),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    /// Arbitrary-precision decimal kept in its textual form.
    Decimal(String),
    ObjectId([u8; 12]),
    DateTime(DateTime<Utc>),
    /// Ordered document (field order is significant to the driver).
    Document(Vec<(String, NativeValue)>),
    /// Unordered mapping.
    Map(HashMap<String, NativeValue>),
    Array(Vec<NativeValue>),
    /// A value the driver already decoded to JSON.
    Json(Value),
}

impl NativeValue {
    /// Build an ordered document from `(key, value)` pairs.
    pub fn document<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, NativeValue)>,
    {
        NativeValue::Document(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Look up a top-level field of a document or map.
    pub fn field(&self, name: &str) -> Option<&NativeValue> {
        match self {
            NativeValue::Document(fields) => {
                fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
            }
            NativeValue::Map(map) => map.get(name),
            _ => None,
        }
    }

    /// Convert a decoded JSON value into the driver's representation.
    ///
    /// Integers become `Int64` (or `UInt64` above `i64::MAX`), objects become
    /// ordered documents. Used by in-memory stores and tests.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => NativeValue::Null,
            Value::Bool(b) => NativeValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    NativeValue::Int64(i)
                } else if let Some(u) = n.as_u64() {
                    NativeValue::UInt64(u)
                } else {
                    NativeValue::Float64(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => NativeValue::String(s.clone()),
            Value::Array(arr) => NativeValue::Array(arr.iter().map(Self::from_json).collect()),
            Value::Object(obj) => NativeValue::Document(
                obj.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Equality used by `$match`: numbers compare by value across widths.
    pub(crate) fn matches_json(&self, expected: &Value) -> bool {
        match (self, expected) {
            (_, Value::Number(n)) => match (self.as_f64(), n.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            (NativeValue::Null, Value::Null) => true,
            (NativeValue::Bool(a), Value::Bool(b)) => a == b,
            (NativeValue::String(a), Value::String(b)) => a == b,
            (NativeValue::Json(a), b) => a == b,
            (NativeValue::Array(items), Value::Array(expected)) => {
                items.len() == expected.len()
                    && items.iter().zip(expected).all(|(a, b)| a.matches_json(b))
            }
            _ => false,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            NativeValue::Int8(v) => Some(*v as f64),
            NativeValue::Int16(v) => Some(*v as f64),
            NativeValue::Int32(v) => Some(*v as f64),
            NativeValue::Int64(v) => Some(*v as f64),
            NativeValue::UInt8(v) => Some(*v as f64),
            NativeValue::UInt16(v) => Some(*v as f64),
            NativeValue::UInt32(v) => Some(*v as f64),
            NativeValue::UInt64(v) => Some(*v as f64),
            NativeValue::Float32(v) => Some(*v as f64),
            NativeValue::Float64(v) => Some(*v),
            NativeValue::Json(v) => v.as_f64(),
            _ => None,
        }
    }
}
