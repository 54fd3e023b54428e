//! The formula-execution function.
//!
//! Takes one sequence of `{"_title": name, "_value": value}` pairs. The pair
//! titled `formula` holds the expression text; every other pair becomes a
//! variable visible to it.

use serde_json::Value;

use super::StoreFunction;
use crate::args::{type_name, ArgBinder, ArgType, BoundArgs, FieldSpec, FromArgs};
use crate::error::{FunctionError, FunctionResult};
use crate::formula::{Formula, Variables};

const FORMULA_TITLE: &str = "formula";

#[derive(Debug, Clone, PartialEq)]
pub struct FormulaArgs {
    pub entries: Vec<Value>,
}

impl FromArgs for FormulaArgs {
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::required("entries", ArgType::Sequence)];

    fn from_bound(mut bound: BoundArgs) -> FunctionResult<Self> {
        Ok(Self {
            entries: bound.take_sequence("entries")?,
        })
    }
}

pub struct FormulaFunction {
    binder: ArgBinder<FormulaArgs>,
}

impl FormulaFunction {
    pub const NAME: &'static str = "FORMULA";

    pub fn new() -> FunctionResult<Self> {
        Ok(Self {
            binder: ArgBinder::new()?,
        })
    }

    pub fn execute(&self, args: FormulaArgs) -> FunctionResult<Value> {
        let (source, vars) = split_entries(args.entries)?;
        tracing::debug!("FORMULA `{}` with {} variables", source, vars.len());
        Formula::parse(&source)?.evaluate(&vars)
    }
}

impl StoreFunction for FormulaFunction {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn call(&self, args: &[Value]) -> FunctionResult<Value> {
        self.execute(self.binder.bind(args)?)
    }
}

/// Separate the formula text from the variable pairs. A later pair with the
/// same title overrides an earlier one.
fn split_entries(entries: Vec<Value>) -> FunctionResult<(String, Variables)> {
    let mut source = None;
    let mut vars = Variables::new();

    for (index, entry) in entries.into_iter().enumerate() {
        let Value::Object(mut pair) = entry else {
            return Err(FunctionError::InvalidPayload(format!(
                "entry {} must be an object, found {}",
                index,
                type_name(&entry)
            )));
        };
        let title = match pair.remove("_title") {
            Some(Value::String(title)) => title,
            _ => {
                return Err(FunctionError::InvalidPayload(format!(
                    "entry {} has no string `_title`",
                    index
                )))
            }
        };
        let value = pair.remove("_value").unwrap_or(Value::Null);

        if title == FORMULA_TITLE {
            match value {
                Value::String(text) => source = Some(text),
                other => {
                    return Err(FunctionError::InvalidPayload(format!(
                        "`formula` must be a string, found {}",
                        type_name(&other)
                    )))
                }
            }
        } else {
            vars.insert(title, value);
        }
    }

    let source = source.ok_or(FunctionError::MissingFormula)?;
    Ok((source, vars))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pair(title: &str, value: Value) -> Value {
        json!({"_title": title, "_value": value})
    }

    #[test]
    fn test_evaluates_with_variables() {
        let function = FormulaFunction::new().unwrap();
        let entries = json!([
            pair("price", json!(4)),
            pair("qty", json!(3)),
            pair("formula", json!("price * qty")),
        ]);
        assert_eq!(function.call(&[entries]).unwrap(), json!(12.0));
    }

    #[test]
    fn test_missing_formula() {
        let function = FormulaFunction::new().unwrap();
        let err = function.call(&[json!([pair("a", json!(1))])]).unwrap_err();
        assert_eq!(err, FunctionError::MissingFormula);
    }

    #[test]
    fn test_malformed_entries() {
        assert!(matches!(
            split_entries(vec![json!(5)]),
            Err(FunctionError::InvalidPayload(_))
        ));
        assert!(matches!(
            split_entries(vec![json!({"_value": 1})]),
            Err(FunctionError::InvalidPayload(_))
        ));
        assert!(matches!(
            split_entries(vec![pair("formula", json!(1))]),
            Err(FunctionError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_argument_must_be_sequence() {
        let function = FormulaFunction::new().unwrap();
        let err = function.call(&[json!("1 + 1")]).unwrap_err();
        assert!(matches!(err, FunctionError::TypeMismatch { position: 0, .. }));
    }

    #[test]
    fn test_missing_value_is_null() {
        let (source, vars) = split_entries(vec![
            json!({"_title": "x"}),
            pair("formula", json!("x")),
        ])
        .unwrap();
        assert_eq!(source, "x");
        assert_eq!(vars.get("x"), Some(&Value::Null));
    }
}
