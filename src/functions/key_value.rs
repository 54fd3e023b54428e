//! The key-value connector.
//!
//! Arguments: `[connection, command, payload, key?, ttl_seconds?]`.
//!
//! | command       | key used          | returns                          |
//! |---------------|-------------------|----------------------------------|
//! | `cache`       | fresh UUID        | the generated key                |
//! | `set`         | `key`             | the payload                      |
//! | `get`         | `key`             | the stored payload               |
//! | `changekey`   | `key` -> payload  | the raw relocated value          |
//! | `incr`        | `key`             | the incremented counter          |
//! | `incr/base64` | `key`             | the counter as a compact token   |
//!
//! Values are stored as JSON text of the form `{"data": payload}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::StoreFunction;
use crate::args::{type_name, ArgBinder, ArgType, BoundArgs, FieldSpec, FromArgs};
use crate::error::{FunctionError, FunctionResult};
use crate::registry::Connections;
use crate::store::KeyValueStore;

/// Symbols of the compact counter encoding, indexed by digit value.
const DICTIONARY: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Bound arguments of one key-value call.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValueArgs {
    pub connection: String,
    pub command: String,
    pub payload: Value,
    pub key: String,
    pub ttl: Duration,
}

impl FromArgs for KeyValueArgs {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("connection", ArgType::String),
        FieldSpec::required("command", ArgType::String),
        FieldSpec::required("payload", ArgType::Any),
        FieldSpec::optional("key", ArgType::String, 3),
        FieldSpec::optional("ttl", ArgType::Seconds, 4),
    ];

    fn from_bound(mut bound: BoundArgs) -> FunctionResult<Self> {
        Ok(Self {
            connection: bound.take_string("connection")?,
            command: bound.take_string("command")?,
            payload: bound.take_value("payload")?,
            key: bound.take_string("key")?,
            ttl: bound.take_duration("ttl")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyValueCommand {
    Cache,
    Set,
    ChangeKey,
    Get,
    Incr,
    IncrBase64,
}

impl KeyValueCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyValueCommand::Cache => "cache",
            KeyValueCommand::Set => "set",
            KeyValueCommand::ChangeKey => "changekey",
            KeyValueCommand::Get => "get",
            KeyValueCommand::Incr => "incr",
            KeyValueCommand::IncrBase64 => "incr/base64",
        }
    }
}

impl FromStr for KeyValueCommand {
    type Err = FunctionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cache" => Ok(KeyValueCommand::Cache),
            "set" => Ok(KeyValueCommand::Set),
            "changekey" => Ok(KeyValueCommand::ChangeKey),
            "get" => Ok(KeyValueCommand::Get),
            "incr" => Ok(KeyValueCommand::Incr),
            "incr/base64" => Ok(KeyValueCommand::IncrBase64),
            _ => Err(FunctionError::UnknownCommand(s.to_string())),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    data: &'a Value,
}

#[derive(Deserialize)]
struct StoredEnvelope {
    #[serde(default)]
    data: Value,
}

pub struct KeyValueFunction {
    connections: Arc<Connections>,
    binder: ArgBinder<KeyValueArgs>,
}

impl KeyValueFunction {
    pub const NAME: &'static str = "KEY_VALUE";

    pub fn new(connections: Arc<Connections>) -> FunctionResult<Self> {
        Ok(Self {
            connections,
            binder: ArgBinder::new()?,
        })
    }

    /// Run one bound call against its registered connection.
    pub fn execute(&self, args: KeyValueArgs) -> FunctionResult<Value> {
        let conn = self.connections.key_values().lookup(&args.connection)?;
        let command: KeyValueCommand = args.command.parse()?;
        tracing::debug!(
            "KEY_VALUE {} on '{}' (key '{}')",
            command.as_str(),
            args.connection,
            args.key
        );

        let conn = conn.as_ref();
        match command {
            KeyValueCommand::Cache => cache(conn, &args.payload, args.ttl),
            KeyValueCommand::Set => set(conn, &args.key, args.payload, args.ttl),
            KeyValueCommand::ChangeKey => change_key(conn, &args.key, &args.payload, args.ttl),
            KeyValueCommand::Get => get(conn, &args.key),
            KeyValueCommand::Incr => Ok(Value::from(incr(conn, &args.key)?)),
            KeyValueCommand::IncrBase64 => {
                let n = incr(conn, &args.key)?;
                let n = u64::try_from(n).map_err(|_| {
                    FunctionError::InvalidPayload(format!(
                        "counter `{}` holds negative value {}",
                        args.key, n
                    ))
                })?;
                Ok(Value::String(encode_base64(n)))
            }
        }
    }
}

impl StoreFunction for KeyValueFunction {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn call(&self, args: &[Value]) -> FunctionResult<Value> {
        self.execute(self.binder.bind(args)?)
    }
}

fn wrap(payload: &Value) -> FunctionResult<String> {
    Ok(serde_json::to_string(&Envelope { data: payload })?)
}

fn cache(conn: &dyn KeyValueStore, payload: &Value, ttl: Duration) -> FunctionResult<Value> {
    let raw = wrap(payload)?;
    let key = Uuid::new_v4().to_string();
    conn.set(&key, &raw, ttl)?;
    Ok(Value::String(key))
}

fn set(conn: &dyn KeyValueStore, key: &str, payload: Value, ttl: Duration) -> FunctionResult<Value> {
    let raw = wrap(&payload)?;
    conn.set(key, &raw, ttl)?;
    Ok(payload)
}

/// Move the raw value at `key` to the key named by `payload`.
///
/// Read, delete and write are three separate store calls. If the write
/// fails after the delete, the value is gone from both keys.
fn change_key(
    conn: &dyn KeyValueStore,
    key: &str,
    payload: &Value,
    ttl: Duration,
) -> FunctionResult<Value> {
    let Value::String(new_key) = payload else {
        return Err(FunctionError::TypeMismatch {
            position: 2,
            expected: "string",
            actual: type_name(payload),
        });
    };

    let raw = conn
        .get(key)?
        .ok_or_else(|| FunctionError::KeyNotFound(key.to_string()))?;
    conn.del(key)?;
    if let Err(e) = conn.set(new_key, &raw, ttl) {
        tracing::warn!(
            "changekey: value deleted from '{}' but not written to '{}': {}",
            key,
            new_key,
            e
        );
        return Err(e.into());
    }
    Ok(Value::String(raw))
}

fn get(conn: &dyn KeyValueStore, key: &str) -> FunctionResult<Value> {
    let raw = conn
        .get(key)?
        .ok_or_else(|| FunctionError::KeyNotFound(key.to_string()))?;
    let stored: StoredEnvelope = serde_json::from_str(&raw).map_err(|e| {
        FunctionError::InvalidPayload(format!("value at `{}` cannot be unwrapped: {}", key, e))
    })?;
    Ok(stored.data)
}

fn incr(conn: &dyn KeyValueStore, key: &str) -> FunctionResult<i64> {
    if !conn.exists(key)? {
        conn.set(key, "0", Duration::ZERO)?;
    }
    Ok(conn.incr(key)?)
}

/// Encode `n` in the 64-symbol dictionary, least-significant digit first.
/// Zero encodes to the empty string.
pub fn encode_base64(mut n: u64) -> String {
    let mut out = String::new();
    while n != 0 {
        out.push(DICTIONARY[(n % 64) as usize] as char);
        n /= 64;
    }
    out
}
