//! Conversion of store-native results into plain JSON values.
//!
//! The calling evaluator only knows one numeric kind, so every numeric
//! scalar is widened to `f64` whatever its source width or signedness.
//! Integers above 2^53 lose precision in the process.
//!
//! Object identifiers are rendered as bare lowercase hex, not the driver's
//! `ObjectID("...")` debug form, so they can be fed back into queries.

use chrono::SecondsFormat;
use serde_json::{Map, Number, Value};

use crate::store::NativeValue;

/// Convert one store-native value.
pub fn normalize(value: NativeValue) -> Value {
    match value {
        NativeValue::Null => Value::Null,
        NativeValue::Bool(b) => Value::Bool(b),
        NativeValue::String(s) => Value::String(s),
        NativeValue::Int8(v) => widen(v as f64),
        NativeValue::Int16(v) => widen(v as f64),
        NativeValue::Int32(v) => widen(v as f64),
        NativeValue::Int64(v) => widen(v as f64),
        NativeValue::UInt8(v) => widen(v as f64),
        NativeValue::UInt16(v) => widen(v as f64),
        NativeValue::UInt32(v) => widen(v as f64),
        NativeValue::UInt64(v) => widen(v as f64),
        NativeValue::Float32(v) => widen(v as f64),
        NativeValue::Float64(v) => widen(v),
        NativeValue::Decimal(text) => match text.parse::<f64>() {
            Ok(v) => widen(v),
            Err(_) => Value::String(text),
        },
        NativeValue::ObjectId(bytes) => Value::String(hex::encode(bytes)),
        NativeValue::DateTime(at) => Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        NativeValue::Document(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .collect::<Map<String, Value>>(),
        ),
        NativeValue::Map(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .collect::<Map<String, Value>>(),
        ),
        NativeValue::Array(items) => normalize_all(items),
        NativeValue::Json(v) => widen_json(v),
    }
}

fn widen_json(value: Value) -> Value {
    match value {
        Value::Number(n) => n.as_f64().map(widen).unwrap_or(Value::Null),
        Value::Array(items) => Value::Array(items.into_iter().map(widen_json).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, widen_json(v)))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

/// Convert a result set into a JSON array.
pub fn normalize_all(items: Vec<NativeValue>) -> Value {
    Value::Array(items.into_iter().map(normalize).collect())
}

// NaN and infinities have no JSON form.
fn widen(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_nested_numbers_are_widened() {
        let native = NativeValue::document([(
            "a",
            NativeValue::Array(vec![
                NativeValue::Int32(1),
                NativeValue::String("x".to_string()),
                NativeValue::document([("b", NativeValue::Float64(2.5))]),
            ]),
        )]);

        let normalized = normalize(native);
        assert_eq!(normalized, json!({"a": [1.0, "x", {"b": 2.5}]}));
        assert!(normalized["a"][0].is_f64());
    }

    #[test]
    fn test_every_width_becomes_f64() {
        let values = vec![
            NativeValue::Int8(-8),
            NativeValue::Int16(16),
            NativeValue::Int64(-64),
            NativeValue::UInt8(8),
            NativeValue::UInt16(16),
            NativeValue::UInt32(32),
            NativeValue::UInt64(64),
            NativeValue::Float32(0.5),
            NativeValue::Decimal("12.25".to_string()),
        ];
        let normalized = normalize_all(values);
        for item in normalized.as_array().unwrap() {
            assert!(item.is_f64(), "{} is not f64", item);
        }
        assert_eq!(normalized[0], json!(-8.0));
        assert_eq!(normalized[8], json!(12.25));
    }

    #[test]
    fn test_precision_loss_above_2_pow_53() {
        let big = (1i64 << 53) + 1;
        let normalized = normalize(NativeValue::Int64(big));
        assert_eq!(normalized.as_f64().unwrap(), (1i64 << 53) as f64);
    }

    #[test]
    fn test_non_finite_becomes_null() {
        assert_eq!(normalize(NativeValue::Float64(f64::NAN)), Value::Null);
        assert_eq!(normalize(NativeValue::Float32(f32::INFINITY)), Value::Null);
    }

    #[test]
    fn test_identifiers_and_dates_become_strings() {
        let id = [0x65, 0x0a, 0x1b, 0x2c, 0x3d, 0x4e, 0x5f, 0x60, 0x71, 0x82, 0x93, 0xa4];
        assert_eq!(
            normalize(NativeValue::ObjectId(id)),
            json!("650a1b2c3d4e5f60718293a4")
        );

        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(
            normalize(NativeValue::DateTime(at)),
            json!("2024-03-01T12:30:00.000Z")
        );
    }

    #[test]
    fn test_map_and_embedded_json() {
        let mut map = HashMap::new();
        map.insert("n".to_string(), NativeValue::UInt8(3));
        map.insert(
            "raw".to_string(),
            NativeValue::Json(json!({"keep": 1, "tags": ["a", 2]})),
        );
        let normalized = normalize(NativeValue::Map(map));
        assert_eq!(
            normalized,
            json!({"n": 3.0, "raw": {"keep": 1.0, "tags": ["a", 2.0]}})
        );
        assert!(normalized["raw"]["keep"].is_f64());
    }

    #[test]
    fn test_unparseable_decimal_stays_text() {
        assert_eq!(
            normalize(NativeValue::Decimal("NaN-ish".to_string())),
            json!("NaN-ish")
        );
    }
}
