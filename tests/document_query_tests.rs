//! Document Query Tests
//!
//! Tests for the DOCUMENT_QUERY function: templated pipelines, result
//! normalization and error reporting.

mod common;

use common::{seeded_fixture, DOCS, KV};
use query_connectors::{FunctionError, FunctionTable, StoreError};
use serde_json::{json, Value};

fn query(table: &FunctionTable, collection: &str, template: &str, data: Value) -> Result<Value, FunctionError> {
    table.call(
        "DOCUMENT_QUERY",
        &[json!(DOCS), json!("shop"), json!(collection), json!(template), data],
    )
}

// ============================================================================
// Pipeline Tests
// ============================================================================

#[test]
fn test_empty_pipeline_returns_collection() {
    let f = seeded_fixture();
    let result = query(&f.table, "orders", "[]", json!(null)).unwrap();
    assert_eq!(result.as_array().unwrap().len(), 3);
}

#[test]
fn test_templated_match_and_project() {
    let f = seeded_fixture();
    let template = r#"[
        {"$match": {"status": "{{ .status }}"}},
        {"$project": {"sku": 1, "qty": 1}},
        {"$limit": {{ .limit }}}
    ]"#;
    let result = query(&f.table, "orders", template, json!({"status": "open", "limit": 1})).unwrap();
    assert_eq!(result, json!([{"sku": "widget", "qty": 2.0}]));
}

#[test]
fn test_nested_template_data() {
    let f = seeded_fixture();
    let template = r#"[{"$match": {"qty": {{ .filter.qty }}}}, {"$project": {"sku": true}}]"#;
    let result = query(&f.table, "orders", template, json!({"filter": {"qty": 5}})).unwrap();
    assert_eq!(result, json!([{"sku": "gadget"}]));
}

#[test]
fn test_count_stage() {
    let f = seeded_fixture();
    let result = query(
        &f.table,
        "orders",
        r#"[{"$match": {"status": "open"}}, {"$count": "total"}]"#,
        json!({}),
    )
    .unwrap();
    assert_eq!(result, json!([{"total": 2.0}]));
    assert!(result[0]["total"].is_f64());
}

#[test]
fn test_empty_result_is_empty_array() {
    let f = seeded_fixture();
    let result = query(&f.table, "orders", r#"[{"$match": {"sku": "none"}}]"#, json!({})).unwrap();
    assert_eq!(result, json!([]));

    let result = query(&f.table, "unknown_collection", "[]", json!({})).unwrap();
    assert_eq!(result, json!([]));
}

// ============================================================================
// Normalization Tests
// ============================================================================

#[test]
fn test_typed_results_are_normalized() {
    let f = seeded_fixture();
    let result = query(&f.table, "typed", "[]", json!(null)).unwrap();
    assert_eq!(
        result,
        json!([{
            "_id": "650a1b2c3d4e5f60718293a4",
            "small": -3.0,
            "count": 7.0,
            "ratio": 0.5
        }])
    );
}

#[test]
fn test_every_number_is_f64() {
    fn check(value: &Value) {
        match value {
            Value::Number(n) => assert!(n.is_f64(), "{} is not f64", n),
            Value::Array(items) => items.iter().for_each(check),
            Value::Object(map) => map.values().for_each(check),
            _ => {}
        }
    }

    let f = seeded_fixture();
    check(&query(&f.table, "orders", "[]", json!(null)).unwrap());
    check(&query(&f.table, "typed", "[]", json!(null)).unwrap());
}

// ============================================================================
// Error Tests
// ============================================================================

#[test]
fn test_arity_is_exact() {
    let f = seeded_fixture();
    assert_eq!(
        f.table.call("DOCUMENT_QUERY", &[json!(DOCS), json!("shop"), json!("orders"), json!("[]")]),
        Err(FunctionError::TooFewArgs)
    );
    assert_eq!(
        f.table.call(
            "DOCUMENT_QUERY",
            &[json!(DOCS), json!("shop"), json!("orders"), json!("[]"), json!({}), json!({})]
        ),
        Err(FunctionError::TooManyArgs)
    );
}

#[test]
fn test_template_must_be_string() {
    let f = seeded_fixture();
    let err = f
        .table
        .call(
            "DOCUMENT_QUERY",
            &[json!(DOCS), json!("shop"), json!("orders"), json!([]), json!({})],
        )
        .unwrap_err();
    assert_eq!(
        err,
        FunctionError::TypeMismatch {
            position: 3,
            expected: "string",
            actual: "array"
        }
    );
}

#[test]
fn test_missing_template_value() {
    let f = seeded_fixture();
    let err = query(&f.table, "orders", r#"[{"$match": {"sku": "{{ .sku }}"}}]"#, json!({})).unwrap_err();
    assert!(matches!(err, FunctionError::Template(_)));
}

#[test]
fn test_rendered_query_must_be_array() {
    let f = seeded_fixture();
    let err = query(&f.table, "orders", r#"{"$match": {}}"#, json!({})).unwrap_err();
    assert!(matches!(err, FunctionError::InvalidQuery(_)));
}

#[test]
fn test_unsupported_stage_passes_store_error() {
    let f = seeded_fixture();
    let err = query(&f.table, "orders", r#"[{"$lookup": {}}]"#, json!({})).unwrap_err();
    assert!(matches!(err, FunctionError::Store(StoreError::Unsupported(_))));
}

#[test]
fn test_unregistered_connection() {
    let f = seeded_fixture();
    let err = f
        .table
        .call(
            "DOCUMENT_QUERY",
            &[json!(KV), json!("shop"), json!("orders"), json!("[]"), json!({})],
        )
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "the given connection `cache` has not been registered"
    );
}
