//! Callable functions exposed to the host expression evaluator.

mod document;
mod formula;
mod key_value;

pub use document::{DocumentQueryArgs, DocumentQueryFunction};
pub use formula::{FormulaArgs, FormulaFunction};
pub use key_value::{encode_base64, KeyValueArgs, KeyValueCommand, KeyValueFunction};

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{FunctionError, FunctionResult};
use crate::registry::Connections;

/// A function the evaluator can invoke with positional arguments.
pub trait StoreFunction: Send + Sync {
    fn name(&self) -> &'static str;

    fn call(&self, args: &[Value]) -> FunctionResult<Value>;
}

/// Functions by upper-cased name.
#[derive(Default, Clone)]
pub struct FunctionTable {
    functions: HashMap<String, Arc<dyn StoreFunction>>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// `DOCUMENT_QUERY`, `KEY_VALUE` and `FORMULA`, sharing `connections`.
    pub fn standard(connections: Arc<Connections>) -> FunctionResult<Self> {
        let mut table = Self::new();
        table.register(Arc::new(DocumentQueryFunction::new(connections.clone())?));
        table.register(Arc::new(KeyValueFunction::new(connections)?));
        table.register(Arc::new(FormulaFunction::new()?));
        Ok(table)
    }

    pub fn register(&mut self, function: Arc<dyn StoreFunction>) {
        self.functions
            .insert(function.name().to_uppercase(), function);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn StoreFunction>> {
        self.functions.get(&name.to_uppercase()).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn call(&self, name: &str, args: &[Value]) -> FunctionResult<Value> {
        let function = self
            .get(name)
            .ok_or_else(|| FunctionError::UnknownFunction(name.to_string()))?;
        let result = function.call(args);
        if let Err(e) = &result {
            tracing::debug!("{} failed: {}", function.name(), e);
        }
        result
    }
}
