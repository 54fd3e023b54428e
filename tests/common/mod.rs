//! Common test utilities for connector tests
//!
//! Provides shared helpers for:
//! - Installing a tracing subscriber once per test binary
//! - Building connection registries seeded with in-memory stores
//! - Building formula argument pairs

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::{Arc, Once};
use std::time::Duration;

use query_connectors::store::{MemoryDocumentStore, MemoryKeyValueStore};
use query_connectors::{
    Connections, DocumentStore, FunctionTable, KeyValueStore, NativeValue, StoreError,
    StoreResult,
};

pub const KV: &str = "cache";
pub const DOCS: &str = "main";

static TRACING: Once = Once::new();

/// Send crate events to the test output, filtered by `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub struct Fixture {
    pub connections: Arc<Connections>,
    pub table: FunctionTable,
    pub kv: Arc<MemoryKeyValueStore>,
    pub docs: Arc<MemoryDocumentStore>,
}

/// A function table with `cache` (key-value) and `main` (document)
/// registered over empty in-memory stores.
pub fn fixture() -> Fixture {
    init_tracing();

    let kv = Arc::new(MemoryKeyValueStore::new());
    let docs = Arc::new(MemoryDocumentStore::new());
    let connections = Arc::new(Connections::new());

    let kv_handle: Arc<dyn KeyValueStore> = kv.clone();
    connections
        .register_key_value(KV, || Ok::<_, StoreError>(kv_handle))
        .unwrap();
    let docs_handle: Arc<dyn DocumentStore> = docs.clone();
    connections
        .register_document(DOCS, || Ok::<_, StoreError>(docs_handle))
        .unwrap();

    let table = FunctionTable::standard(connections.clone()).unwrap();
    Fixture {
        connections,
        table,
        kv,
        docs,
    }
}

/// Like [`fixture`] with a `shop.orders` collection.
pub fn seeded_fixture() -> Fixture {
    let fixture = fixture();
    for doc in [
        json!({"sku": "widget", "qty": 2, "price": 29.99, "status": "open"}),
        json!({"sku": "gadget", "qty": 5, "price": 49.99, "status": "open"}),
        json!({"sku": "thing", "qty": 1, "price": 19.99, "status": "closed"}),
    ] {
        fixture.docs.insert_json("shop", "orders", &doc);
    }
    fixture.docs.insert(
        "shop",
        "typed",
        NativeValue::document([
            (
                "_id",
                NativeValue::ObjectId([0x65, 0x0a, 0x1b, 0x2c, 0x3d, 0x4e, 0x5f, 0x60, 0x71, 0x82, 0x93, 0xa4]),
            ),
            ("small", NativeValue::Int8(-3)),
            ("count", NativeValue::UInt32(7)),
            ("ratio", NativeValue::Float32(0.5)),
        ]),
    );
    fixture
}

pub fn pair(title: &str, value: Value) -> Value {
    json!({"_title": title, "_value": value})
}

/// Key-value store whose writes fail for one key.
pub struct FailingWrites {
    pub inner: MemoryKeyValueStore,
    pub failing_key: String,
}

impl FailingWrites {
    pub fn new(failing_key: &str) -> Self {
        Self {
            inner: MemoryKeyValueStore::new(),
            failing_key: failing_key.to_string(),
        }
    }
}

impl KeyValueStore for FailingWrites {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        if key == self.failing_key {
            return Err(StoreError::Backend(format!("write to {} refused", key)));
        }
        self.inner.set(key, value, ttl)
    }

    fn del(&self, key: &str) -> StoreResult<u64> {
        self.inner.del(key)
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        self.inner.exists(key)
    }

    fn incr(&self, key: &str) -> StoreResult<i64> {
        self.inner.incr(key)
    }
}
