//! Client seams for the external stores the functions talk to.
//!
//! The functions never speak a wire protocol themselves. A host registers
//! something implementing [`KeyValueStore`] or [`DocumentStore`] (a real
//! driver, or the in-memory stores in [`memory`]) and every call is a
//! blocking round-trip through these traits.

pub mod memory;
mod native;

pub use memory::{MemoryDocumentStore, MemoryKeyValueStore};
pub use native::NativeValue;

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a store client. Passed to the caller untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("store connection error: {0}")]
    Connection(String),

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("operation not supported by store: {0}")]
    Unsupported(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A key-value cache client.
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value stored at `key`, `None` when the key is absent.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value` under `key`. A zero `ttl` keeps the value forever.
    fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Delete `key`, returning how many keys were removed.
    fn del(&self, key: &str) -> StoreResult<u64>;

    fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Atomically add one to the integer stored at `key` and return the result.
    fn incr(&self, key: &str) -> StoreResult<i64>;
}

/// A document database client able to run aggregation pipelines.
pub trait DocumentStore: Send + Sync {
    /// Run `pipeline` against `database.collection` and return every
    /// resulting document in store-native form.
    fn aggregate(
        &self,
        database: &str,
        collection: &str,
        pipeline: &[Value],
    ) -> StoreResult<Vec<NativeValue>>;
}
