//! Store-backed functions for an embedded expression evaluator.
//!
//! The evaluator calls functions by name with positional arguments:
//!
//! - `DOCUMENT_QUERY(connection, database, collection, query, data)` runs a
//!   templated aggregation pipeline against a document store.
//! - `KEY_VALUE(connection, command, payload, key?, ttl?)` reads and writes a
//!   key-value cache.
//! - `FORMULA([{_title, _value}, ...])` evaluates a small arithmetic formula.
//!
//! Hosts register store clients under logical names in [`Connections`],
//! usually from a [`ConnectorsConfig`], then dispatch through a
//! [`FunctionTable`].

pub mod args;
pub mod config;
pub mod error;
pub mod formula;
pub mod functions;
pub mod normalize;
pub mod registry;
pub mod store;
pub mod template;

pub use args::{ArgBinder, ArgSchema, ArgType, FieldSpec, FromArgs};
pub use config::{register_all, ConnectionKind, ConnectionOpener, ConnectionSpec, ConnectorsConfig, MemoryOpener};
pub use error::{FunctionError, FunctionResult};
pub use functions::{FunctionTable, StoreFunction};
pub use registry::{ConnectionRegistry, Connections};
pub use store::{DocumentStore, KeyValueStore, NativeValue, StoreError, StoreResult};
