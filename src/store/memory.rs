//! In-memory stores for tests and hosts without a real backend.

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::{DocumentStore, KeyValueStore, NativeValue, StoreError, StoreResult};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Key-value store backed by a `HashMap`. Expired keys are dropped lazily
/// on access.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining time-to-live of `key`, `None` when absent or persistent.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Some(Instant::now() + ttl)
        };
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    fn del(&self, key: &str) -> StoreResult<u64> {
        let now = Instant::now();
        match self.entries.lock().remove(key) {
            Some(entry) if entry.is_live(now) => Ok(1),
            _ => Ok(0),
        }
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn incr(&self, key: &str) -> StoreResult<i64> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry {
                value: "0".to_string(),
                expires_at: None,
            });
        if !entry.is_live(now) {
            entry.value = "0".to_string();
            entry.expires_at = None;
        }

        let current: i64 = entry.value.parse().map_err(|_| {
            StoreError::Backend("value is not an integer or out of range".to_string())
        })?;
        let next = current
            .checked_add(1)
            .ok_or_else(|| StoreError::Backend("increment would overflow".to_string()))?;
        entry.value = next.to_string();
        Ok(next)
    }
}

/// Document store holding `database -> collection -> documents` in memory.
///
/// Supports a small pipeline subset: `$match` (top-level equality), `$skip`,
/// `$limit`, `$project` (top-level inclusion) and `$count`.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<(String, String), Vec<NativeValue>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a document to `database.collection`.
    pub fn insert(&self, database: &str, collection: &str, doc: NativeValue) {
        self.collections
            .write()
            .entry((database.to_string(), collection.to_string()))
            .or_default()
            .push(doc);
    }

    /// Append a JSON document, converted with [`NativeValue::from_json`].
    pub fn insert_json(&self, database: &str, collection: &str, doc: &Value) {
        self.insert(database, collection, NativeValue::from_json(doc));
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn aggregate(
        &self,
        database: &str,
        collection: &str,
        pipeline: &[Value],
    ) -> StoreResult<Vec<NativeValue>> {
        let mut docs = self
            .collections
            .read()
            .get(&(database.to_string(), collection.to_string()))
            .cloned()
            .unwrap_or_default();

        for stage in pipeline {
            let (op, spec) = stage
                .as_object()
                .filter(|obj| obj.len() == 1)
                .and_then(|obj| obj.iter().next())
                .ok_or_else(|| {
                    StoreError::Backend(format!(
                        "pipeline stage must be an object with a single operator: {}",
                        stage
                    ))
                })?;
            docs = apply_stage(docs, op, spec)?;
        }

        Ok(docs)
    }
}

fn apply_stage(docs: Vec<NativeValue>, op: &str, spec: &Value) -> StoreResult<Vec<NativeValue>> {
    match op {
        "$match" => {
            let filter = spec
                .as_object()
                .ok_or_else(|| StoreError::Backend("$match requires an object".to_string()))?;
            Ok(docs
                .into_iter()
                .filter(|doc| {
                    filter.iter().all(|(field, expected)| {
                        doc.field(field)
                            .map_or(expected.is_null(), |v| v.matches_json(expected))
                    })
                })
                .collect())
        }
        "$skip" => {
            let n = stage_count(op, spec)?;
            Ok(docs.into_iter().skip(n).collect())
        }
        "$limit" => {
            let n = stage_count(op, spec)?;
            Ok(docs.into_iter().take(n).collect())
        }
        "$project" => {
            let projection = spec
                .as_object()
                .ok_or_else(|| StoreError::Backend("$project requires an object".to_string()))?;
            Ok(docs
                .into_iter()
                .map(|doc| {
                    NativeValue::Document(
                        projection
                            .iter()
                            .filter(|(_, include)| is_truthy(include))
                            .filter_map(|(field, _)| {
                                doc.field(field).map(|v| (field.clone(), v.clone()))
                            })
                            .collect(),
                    )
                })
                .collect())
        }
        "$count" => {
            let field = spec
                .as_str()
                .ok_or_else(|| StoreError::Backend("$count requires a field name".to_string()))?;
            if docs.is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![NativeValue::document([(
                field,
                NativeValue::Int64(docs.len() as i64),
            )])])
        }
        other => Err(StoreError::Unsupported(format!(
            "pipeline stage {}",
            other
        ))),
    }
}

fn stage_count(op: &str, spec: &Value) -> StoreResult<usize> {
    spec.as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| StoreError::Backend(format!("{} requires a non-negative integer", op)))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kv_set_get_del() {
        let kv = MemoryKeyValueStore::new();
        kv.set("a", "1", Duration::ZERO).unwrap();
        assert_eq!(kv.get("a").unwrap(), Some("1".to_string()));
        assert!(kv.exists("a").unwrap());
        assert_eq!(kv.ttl("a"), None);

        assert_eq!(kv.del("a").unwrap(), 1);
        assert_eq!(kv.del("a").unwrap(), 0);
        assert_eq!(kv.get("a").unwrap(), None);
        assert!(kv.is_empty());
    }

    #[test]
    fn test_kv_ttl_expiry() {
        let kv = MemoryKeyValueStore::new();
        kv.set("short", "x", Duration::from_millis(10)).unwrap();
        kv.set("long", "y", Duration::from_secs(60)).unwrap();
        assert!(kv.ttl("long").unwrap() > Duration::from_secs(50));

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(kv.get("short").unwrap(), None);
        assert_eq!(kv.get("long").unwrap(), Some("y".to_string()));
        assert_eq!(kv.len(), 1);
    }

    #[test]
    fn test_kv_incr() {
        let kv = MemoryKeyValueStore::new();
        assert_eq!(kv.incr("n").unwrap(), 1);
        assert_eq!(kv.incr("n").unwrap(), 2);

        kv.set("text", "abc", Duration::ZERO).unwrap();
        assert!(matches!(kv.incr("text"), Err(StoreError::Backend(_))));
    }

    fn seeded() -> MemoryDocumentStore {
        let store = MemoryDocumentStore::new();
        store.insert_json("app", "users", &json!({"name": "Alice", "dept": "eng", "age": 30}));
        store.insert_json("app", "users", &json!({"name": "Bob", "dept": "eng", "age": 25}));
        store.insert_json("app", "users", &json!({"name": "Carol", "dept": "sales", "age": 35}));
        store
    }

    #[test]
    fn test_aggregate_match_and_limit() {
        let store = seeded();
        let docs = store
            .aggregate(
                "app",
                "users",
                &[json!({"$match": {"dept": "eng"}}), json!({"$limit": 1})],
            )
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(
            docs[0].field("name"),
            Some(&NativeValue::String("Alice".to_string()))
        );
    }

    #[test]
    fn test_aggregate_project_skip_count() {
        let store = seeded();
        let docs = store
            .aggregate(
                "app",
                "users",
                &[json!({"$skip": 1}), json!({"$project": {"name": 1, "age": 0}})],
            )
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].field("age"), None);

        let counted = store
            .aggregate("app", "users", &[json!({"$count": "total"})])
            .unwrap();
        assert_eq!(counted[0].field("total"), Some(&NativeValue::Int64(3)));
    }

    #[test]
    fn test_aggregate_unknown_collection_is_empty() {
        let store = seeded();
        let docs = store.aggregate("app", "missing", &[]).unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn test_aggregate_rejects_unknown_stage() {
        let store = seeded();
        let err = store
            .aggregate("app", "users", &[json!({"$lookup": {}})])
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::Unsupported("pipeline stage $lookup".to_string())
        );
    }
}
