use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use super::{type_name, ArgSchema, ArgType, FieldSpec};
use crate::error::{FunctionError, FunctionResult};

/// A single bound argument, already checked against its declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    String(String),
    Seconds(Duration),
    Sequence(Vec<Value>),
    Any(Value),
}

impl ArgValue {
    fn zero(ty: ArgType) -> Self {
        match ty {
            ArgType::String => ArgValue::String(String::new()),
            ArgType::Seconds => ArgValue::Seconds(Duration::ZERO),
            ArgType::Sequence => ArgValue::Sequence(Vec::new()),
            ArgType::Any => ArgValue::Any(Value::Null),
        }
    }

    fn convert(ty: ArgType, position: usize, value: &Value) -> FunctionResult<Self> {
        let mismatch = |expected: &'static str| FunctionError::TypeMismatch {
            position,
            expected,
            actual: type_name(value),
        };

        match (ty, value) {
            (ArgType::Any, v) => Ok(ArgValue::Any(v.clone())),
            (ArgType::String, Value::String(s)) => Ok(ArgValue::String(s.clone())),
            (ArgType::Sequence, Value::Array(items)) => Ok(ArgValue::Sequence(items.clone())),
            (ArgType::Seconds, Value::Number(n)) => {
                let secs = n.as_f64().unwrap_or(f64::NAN);
                if !secs.is_finite() || secs < 0.0 {
                    return Err(mismatch("non-negative number"));
                }
                Ok(ArgValue::Seconds(Duration::from_secs(secs.trunc() as u64)))
            }
            (ty, _) => Err(mismatch(ty.name())),
        }
    }
}

/// Arguments of one call, keyed by field name. Every declared field is
/// present; absent optional fields hold their type's zero value.
#[derive(Debug, Default)]
pub struct BoundArgs {
    values: HashMap<&'static str, ArgValue>,
}

impl BoundArgs {
    fn take(&mut self, name: &str) -> FunctionResult<ArgValue> {
        self.values.remove(name).ok_or_else(|| {
            FunctionError::Configuration(format!("field `{}` is not part of the schema", name))
        })
    }

    fn wrong_kind(name: &str, expected: ArgType) -> FunctionError {
        FunctionError::Configuration(format!(
            "field `{}` is not declared as {}",
            name,
            expected.name()
        ))
    }

    pub fn take_string(&mut self, name: &str) -> FunctionResult<String> {
        match self.take(name)? {
            ArgValue::String(s) => Ok(s),
            _ => Err(Self::wrong_kind(name, ArgType::String)),
        }
    }

    pub fn take_duration(&mut self, name: &str) -> FunctionResult<Duration> {
        match self.take(name)? {
            ArgValue::Seconds(d) => Ok(d),
            _ => Err(Self::wrong_kind(name, ArgType::Seconds)),
        }
    }

    pub fn take_sequence(&mut self, name: &str) -> FunctionResult<Vec<Value>> {
        match self.take(name)? {
            ArgValue::Sequence(items) => Ok(items),
            _ => Err(Self::wrong_kind(name, ArgType::Sequence)),
        }
    }

    pub fn take_value(&mut self, name: &str) -> FunctionResult<Value> {
        match self.take(name)? {
            ArgValue::Any(v) => Ok(v),
            _ => Err(Self::wrong_kind(name, ArgType::Any)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }
}

impl ArgSchema {
    /// Check `args` against the schema and bind every field.
    pub fn bind(&self, args: &[Value]) -> FunctionResult<BoundArgs> {
        if args.len() < self.required {
            return Err(FunctionError::TooFewArgs);
        }
        if args.len() > self.max_arity {
            return Err(FunctionError::TooManyArgs);
        }

        let mut bound = BoundArgs::default();
        let mut next_required = 0;
        for field in self.fields {
            let value = if field.optional {
                self.bind_optional(field, args)?
            } else {
                let position = next_required;
                next_required += 1;
                ArgValue::convert(field.ty, position, &args[position])?
            };
            bound.values.insert(field.name, value);
        }

        Ok(bound)
    }

    fn bind_optional(&self, field: &FieldSpec, args: &[Value]) -> FunctionResult<ArgValue> {
        let position = self.optional[field.name];
        match args.get(position) {
            None | Some(Value::Null) => Ok(ArgValue::zero(field.ty)),
            Some(value) => ArgValue::convert(field.ty, position, value),
        }
    }
}
