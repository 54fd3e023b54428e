//! Configuration of named store connections.
//!
//! Connections are declared in `query-connectors.toml`:
//!
//! ```toml
//! [[connections]]
//! name = "cache"
//! kind = "key_value"
//! url = "memory://"
//! ```
//!
//! ## Environment Variables
//!
//! - `QUERY_CONNECTORS_CONFIG` - path of the config file, instead of
//!   `<dir>/query-connectors.toml`
//! - `QUERY_CONNECTORS_<NAME>_URL` - URL of the connection `<name>`
//!   (upper-cased, `-` replaced by `_`)
//!
//! These can be set in a `.env` file in the config directory.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{FunctionError, FunctionResult};
use crate::registry::Connections;
use crate::store::{
    DocumentStore, KeyValueStore, MemoryDocumentStore, MemoryKeyValueStore, StoreError,
    StoreResult,
};

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "query-connectors.toml";

/// Overrides the config file location
pub const ENV_CONFIG_PATH: &str = "QUERY_CONNECTORS_CONFIG";

const ENV_PREFIX: &str = "QUERY_CONNECTORS_";

/// URL scheme served by [`MemoryOpener`]
pub const MEMORY_SCHEME: &str = "memory://";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    Document,
    KeyValue,
}

/// One `[[connections]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    pub name: String,
    pub kind: ConnectionKind,
    #[serde(default = "default_url")]
    pub url: String,
}

fn default_url() -> String {
    MEMORY_SCHEME.to_string()
}

impl ConnectionSpec {
    pub fn new(name: &str, kind: ConnectionKind, url: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            url: url.to_string(),
        }
    }

    /// Name of the variable overriding this connection's URL.
    pub fn url_env_var(&self) -> String {
        format!(
            "{}{}_URL",
            ENV_PREFIX,
            self.name.to_uppercase().replace('-', "_")
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectorsConfig {
    #[serde(default)]
    pub connections: Vec<ConnectionSpec>,
}

impl ConnectorsConfig {
    /// Load configuration from a directory
    ///
    /// Loads `<dir>/.env` if present, reads the file named by
    /// `QUERY_CONNECTORS_CONFIG` (or `<dir>/query-connectors.toml`) and
    /// applies environment variable overrides.
    pub fn load(dir: &Path) -> FunctionResult<Self> {
        let env_path = dir.join(".env");
        if env_path.exists() {
            // Variables already set in the process win over the file.
            let _ = dotenvy::from_path(&env_path);
        }

        let config_path = match std::env::var(ENV_CONFIG_PATH) {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => dir.join(CONFIG_FILE_NAME),
        };
        Self::load_file(&config_path)
    }

    /// Load a specific config file, then apply environment overrides.
    pub fn load_file(path: &Path) -> FunctionResult<Self> {
        if !path.exists() {
            return Err(FunctionError::Configuration(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            FunctionError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config = Self::parse(&content)
            .map_err(|e| FunctionError::Configuration(format!("{}: {}", path.display(), e)))?;
        config.apply_env_overrides();
        config.validate()?;

        tracing::info!(
            "Loaded {} connection(s) from {}",
            config.connections.len(),
            path.display()
        );
        Ok(config)
    }

    /// Parse TOML text without consulting the environment.
    pub fn from_toml(content: &str) -> FunctionResult<Self> {
        let config = Self::parse(content).map_err(|e| FunctionError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml(&self) -> FunctionResult<String> {
        toml::to_string_pretty(self).map_err(|e| FunctionError::Configuration(e.to_string()))
    }

    /// Save configuration to a directory
    pub fn save(&self, dir: &Path) -> FunctionResult<()> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, self.to_toml()?).map_err(|e| {
            FunctionError::Configuration(format!("cannot write {}: {}", config_path.display(), e))
        })
    }

    fn apply_env_overrides(&mut self) {
        for spec in &mut self.connections {
            if let Ok(url) = std::env::var(spec.url_env_var()) {
                if !url.is_empty() {
                    spec.url = url;
                }
            }
        }
    }

    /// Names must be non-empty and unique.
    pub fn validate(&self) -> FunctionResult<()> {
        let mut seen = HashSet::new();
        for spec in &self.connections {
            if spec.name.trim().is_empty() {
                return Err(FunctionError::Configuration(
                    "connection name must not be empty".to_string(),
                ));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(FunctionError::Configuration(format!(
                    "connection `{}` is declared more than once",
                    spec.name
                )));
            }
        }
        Ok(())
    }

    pub fn connection(&self, name: &str) -> Option<&ConnectionSpec> {
        self.connections.iter().find(|spec| spec.name == name)
    }
}

/// Opens store clients for configured connections. Real drivers live
/// behind this trait.
pub trait ConnectionOpener {
    fn open_document(&self, spec: &ConnectionSpec) -> StoreResult<Arc<dyn DocumentStore>>;

    fn open_key_value(&self, spec: &ConnectionSpec) -> StoreResult<Arc<dyn KeyValueStore>>;
}

/// Opens `memory://` connections as fresh in-memory stores.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryOpener;

impl MemoryOpener {
    fn check_scheme(spec: &ConnectionSpec) -> StoreResult<()> {
        if spec.url.starts_with(MEMORY_SCHEME) {
            Ok(())
        } else {
            Err(StoreError::Connection(format!(
                "unsupported url `{}` for connection `{}`",
                spec.url, spec.name
            )))
        }
    }
}

impl ConnectionOpener for MemoryOpener {
    fn open_document(&self, spec: &ConnectionSpec) -> StoreResult<Arc<dyn DocumentStore>> {
        Self::check_scheme(spec)?;
        Ok(Arc::new(MemoryDocumentStore::new()))
    }

    fn open_key_value(&self, spec: &ConnectionSpec) -> StoreResult<Arc<dyn KeyValueStore>> {
        Self::check_scheme(spec)?;
        Ok(Arc::new(MemoryKeyValueStore::new()))
    }
}

/// Open and register every configured connection. Stops at the first
/// failure; connections registered before it stay registered.
pub fn register_all(
    connections: &Connections,
    config: &ConnectorsConfig,
    opener: &dyn ConnectionOpener,
) -> FunctionResult<()> {
    for spec in &config.connections {
        match spec.kind {
            ConnectionKind::Document => {
                connections.register_document(&spec.name, || opener.open_document(spec))?
            }
            ConnectionKind::KeyValue => {
                connections.register_key_value(&spec.name, || opener.open_key_value(spec))?
            }
        }
    }
    Ok(())
}
