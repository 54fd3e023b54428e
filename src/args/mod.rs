//! Positional argument schemas.
//!
//! Every function family declares its arguments as a static table of
//! [`FieldSpec`]s. [`ArgSchema::analyze`] checks the table once at startup
//! and [`ArgBinder`] then maps each raw argument list onto the family's
//! typed record.
//!
//! Required fields occupy the leading positions in declaration order.
//! Optional fields are resolved by their declared absolute position, not
//! by declaration order, and fall back to their type's zero value when the
//! list is too short or the slot holds `null`.

mod binder;

pub use binder::{ArgValue, BoundArgs};

use serde_json::Value;
use std::collections::HashMap;
use std::marker::PhantomData;

use crate::error::{FunctionError, FunctionResult};

/// Declared runtime type of an argument slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    String,
    /// A number of seconds; fractional input is truncated.
    Seconds,
    Sequence,
    /// Any decoded value, `null` included. Threaded through untouched.
    Any,
}

impl ArgType {
    pub fn name(self) -> &'static str {
        match self {
            ArgType::String => "string",
            ArgType::Seconds => "number",
            ArgType::Sequence => "array",
            ArgType::Any => "any",
        }
    }
}

/// One entry of a function family's argument table.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: ArgType,
    pub optional: bool,
    /// Absolute argument index. Mandatory for optional fields, ignored for
    /// required ones.
    pub position: Option<usize>,
}

impl FieldSpec {
    pub const fn required(name: &'static str, ty: ArgType) -> Self {
        Self {
            name,
            ty,
            optional: false,
            position: None,
        }
    }

    pub const fn optional(name: &'static str, ty: ArgType, position: usize) -> Self {
        Self {
            name,
            ty,
            optional: true,
            position: Some(position),
        }
    }
}

/// The analyzed, immutable form of a field table.
#[derive(Debug, Clone)]
pub struct ArgSchema {
    fields: &'static [FieldSpec],
    required: usize,
    optional: HashMap<&'static str, usize>,
    max_arity: usize,
}

impl ArgSchema {
    /// Classify `fields` into required and optional slots.
    ///
    /// Fails with [`FunctionError::Configuration`] when an optional field
    /// has no position, when its position overlaps a required slot, or when
    /// two optional fields claim the same position.
    pub fn analyze(fields: &'static [FieldSpec]) -> FunctionResult<Self> {
        let required = fields.iter().filter(|f| !f.optional).count();
        let mut optional = HashMap::new();
        let mut max_arity = required;

        for field in fields.iter().filter(|f| f.optional) {
            let position = field.position.ok_or_else(|| {
                FunctionError::Configuration(format!(
                    "position is required for optional field `{}`",
                    field.name
                ))
            })?;
            if position < required {
                return Err(FunctionError::Configuration(format!(
                    "optional field `{}` at position {} overlaps the {} required fields",
                    field.name, position, required
                )));
            }
            if let Some((other, _)) = optional.iter().find(|(_, p)| **p == position) {
                return Err(FunctionError::Configuration(format!(
                    "optional fields `{}` and `{}` both claim position {}",
                    other, field.name, position
                )));
            }
            optional.insert(field.name, position);
            max_arity = max_arity.max(position + 1);
        }

        Ok(Self {
            fields,
            required,
            optional,
            max_arity,
        })
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// Number of leading arguments every call must supply.
    pub fn required_count(&self) -> usize {
        self.required
    }

    /// Optional field name to its absolute argument position.
    pub fn optional_positions(&self) -> &HashMap<&'static str, usize> {
        &self.optional
    }

    /// Longest argument list the schema accepts.
    pub fn max_arity(&self) -> usize {
        self.max_arity
    }
}

/// A typed argument record built from a bound argument list.
pub trait FromArgs: Sized {
    /// The family's argument table.
    const FIELDS: &'static [FieldSpec];

    fn from_bound(bound: BoundArgs) -> FunctionResult<Self>;
}

/// Binds raw argument lists onto `T` using `T::FIELDS`, analyzed once.
pub struct ArgBinder<T> {
    schema: ArgSchema,
    _record: PhantomData<fn() -> T>,
}

impl<T: FromArgs> ArgBinder<T> {
    pub fn new() -> FunctionResult<Self> {
        Ok(Self {
            schema: ArgSchema::analyze(T::FIELDS)?,
            _record: PhantomData,
        })
    }

    pub fn schema(&self) -> &ArgSchema {
        &self.schema
    }

    pub fn bind(&self, args: &[Value]) -> FunctionResult<T> {
        T::from_bound(self.schema.bind(args)?)
    }
}

/// JSON type name used in type-mismatch errors.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
