//! Named connection registry shared by every function invocation.
//!
//! Registration takes the write lock, lookups take the read lock, so any
//! number of evaluator threads can resolve connections concurrently while
//! a registration waits for them to finish. Entries are never removed.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use crate::error::{FunctionError, FunctionResult};
use crate::store::{DocumentStore, KeyValueStore};

/// Logical connection name to client handle, for one store kind.
pub struct ConnectionRegistry<C: ?Sized> {
    kind: &'static str,
    connections: RwLock<HashMap<String, Arc<C>>>,
}

impl<C: ?Sized> ConnectionRegistry<C> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Open a client with `factory` and store it under `name`, replacing any
    /// previous entry. The factory runs outside the lock; when it fails the
    /// error is returned and the registry is left untouched.
    pub fn register<F, E>(&self, name: &str, factory: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<Arc<C>, E>,
        E: Display,
    {
        let client = match factory() {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("Failed to open {} connection '{}': {}", self.kind, name, e);
                return Err(e);
            }
        };

        let replaced = self
            .connections
            .write()
            .insert(name.to_string(), client)
            .is_some();
        if replaced {
            tracing::info!("Replaced {} connection '{}'", self.kind, name);
        } else {
            tracing::info!("Registered {} connection '{}'", self.kind, name);
        }
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> FunctionResult<Arc<C>> {
        self.connections
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| FunctionError::ConnectionNotRegistered(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.connections.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connections.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The registries for every store kind, built once at startup and shared
/// (usually behind an `Arc`) with each function family.
pub struct Connections {
    documents: ConnectionRegistry<dyn DocumentStore>,
    key_values: ConnectionRegistry<dyn KeyValueStore>,
}

impl Default for Connections {
    fn default() -> Self {
        Self::new()
    }
}

impl Connections {
    pub fn new() -> Self {
        Self {
            documents: ConnectionRegistry::new("document"),
            key_values: ConnectionRegistry::new("key-value"),
        }
    }

    pub fn documents(&self) -> &ConnectionRegistry<dyn DocumentStore> {
        &self.documents
    }

    pub fn key_values(&self) -> &ConnectionRegistry<dyn KeyValueStore> {
        &self.key_values
    }

    pub fn register_document<F, E>(&self, name: &str, factory: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<Arc<dyn DocumentStore>, E>,
        E: Display,
    {
        self.documents.register(name, factory)
    }

    pub fn register_key_value<F, E>(&self, name: &str, factory: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<Arc<dyn KeyValueStore>, E>,
        E: Display,
    {
        self.key_values.register(name, factory)
    }
}
