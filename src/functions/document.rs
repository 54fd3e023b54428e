//! The document-query connector.
//!
//! Arguments: `[connection, database, collection, query_template, data]`.
//! The template is rendered against `data`, parsed as a JSON array of
//! pipeline stages, and run as an aggregation. Results come back as an
//! array of normalized documents.

use serde_json::Value;
use std::sync::Arc;

use super::StoreFunction;
use crate::args::{ArgBinder, ArgType, BoundArgs, FieldSpec, FromArgs};
use crate::error::{FunctionError, FunctionResult};
use crate::normalize::normalize_all;
use crate::registry::Connections;
use crate::template;

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQueryArgs {
    pub connection: String,
    pub database: String,
    pub collection: String,
    pub query: String,
    pub data: Value,
}

impl FromArgs for DocumentQueryArgs {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("connection", ArgType::String),
        FieldSpec::required("database", ArgType::String),
        FieldSpec::required("collection", ArgType::String),
        FieldSpec::required("query", ArgType::String),
        FieldSpec::required("data", ArgType::Any),
    ];

    fn from_bound(mut bound: BoundArgs) -> FunctionResult<Self> {
        Ok(Self {
            connection: bound.take_string("connection")?,
            database: bound.take_string("database")?,
            collection: bound.take_string("collection")?,
            query: bound.take_string("query")?,
            data: bound.take_value("data")?,
        })
    }
}

pub struct DocumentQueryFunction {
    connections: Arc<Connections>,
    binder: ArgBinder<DocumentQueryArgs>,
}

impl DocumentQueryFunction {
    pub const NAME: &'static str = "DOCUMENT_QUERY";

    pub fn new(connections: Arc<Connections>) -> FunctionResult<Self> {
        Ok(Self {
            connections,
            binder: ArgBinder::new()?,
        })
    }

    pub fn execute(&self, args: DocumentQueryArgs) -> FunctionResult<Value> {
        let rendered = template::render(&args.query, &args.data)?;
        let pipeline = parse_pipeline(&rendered)?;
        let conn = self.connections.documents().lookup(&args.connection)?;

        tracing::debug!(
            "DOCUMENT_QUERY on '{}' {}.{} ({} stages)",
            args.connection,
            args.database,
            args.collection,
            pipeline.len()
        );

        let docs = conn.aggregate(&args.database, &args.collection, &pipeline)?;
        Ok(normalize_all(docs))
    }
}

impl StoreFunction for DocumentQueryFunction {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn call(&self, args: &[Value]) -> FunctionResult<Value> {
        self.execute(self.binder.bind(args)?)
    }
}

/// A rendered query must be a JSON array of stage objects.
fn parse_pipeline(rendered: &str) -> FunctionResult<Vec<Value>> {
    let parsed: Value = serde_json::from_str(rendered)
        .map_err(|e| FunctionError::InvalidQuery(format!("rendered query is not JSON: {}", e)))?;
    match parsed {
        Value::Array(stages) => Ok(stages),
        other => Err(FunctionError::InvalidQuery(format!(
            "expected a pipeline array, found {}",
            crate::args::type_name(&other)
        ))),
    }
}
