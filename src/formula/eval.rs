use serde_json::{Number, Value};
use std::collections::HashMap;

use super::ast::{BinaryOperator, Expression, UnaryOperator};
use crate::args::type_name;
use crate::error::{FunctionError, FunctionResult};

/// Named variables visible to a formula.
pub type Variables = HashMap<String, Value>;

pub fn evaluate(expr: &Expression, vars: &Variables) -> FunctionResult<Value> {
    match expr {
        Expression::Literal(v) => Ok(v.clone()),
        Expression::Variable(name) => vars
            .get(name)
            .cloned()
            .ok_or_else(|| FunctionError::Formula(format!("unknown variable `{}`", name))),
        Expression::FieldAccess(base, field) => match evaluate(base, vars)? {
            Value::Object(mut map) => Ok(map.remove(field).unwrap_or(Value::Null)),
            Value::Null => Ok(Value::Null),
            other => Err(FunctionError::Formula(format!(
                "cannot read field `{}` of {}",
                field,
                type_name(&other)
            ))),
        },
        Expression::IndexAccess(base, index) => {
            let base = evaluate(base, vars)?;
            let index = evaluate(index, vars)?;
            index_value(base, &index)
        }
        Expression::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|item| evaluate(item, vars))
                .collect::<FunctionResult<Vec<_>>>()?,
        )),
        Expression::Unary { op, operand } => {
            let value = evaluate(operand, vars)?;
            match op {
                UnaryOperator::Not => Ok(Value::Bool(!to_bool(&value))),
                UnaryOperator::Negate => number(-get_number(&value, "-")?),
            }
        }
        Expression::Binary { left, op, right } => evaluate_binary(left, *op, right, vars),
        Expression::FunctionCall { name, args } => call_function(name, args, vars),
    }
}

fn evaluate_binary(
    left: &Expression,
    op: BinaryOperator,
    right: &Expression,
    vars: &Variables,
) -> FunctionResult<Value> {
    // Short-circuit before evaluating the right side.
    match op {
        BinaryOperator::And => {
            let l = evaluate(left, vars)?;
            return Ok(Value::Bool(to_bool(&l) && to_bool(&evaluate(right, vars)?)));
        }
        BinaryOperator::Or => {
            let l = evaluate(left, vars)?;
            return Ok(Value::Bool(to_bool(&l) || to_bool(&evaluate(right, vars)?)));
        }
        _ => {}
    }

    let l = evaluate(left, vars)?;
    let r = evaluate(right, vars)?;
    match op {
        BinaryOperator::Equal => Ok(Value::Bool(values_equal(&l, &r))),
        BinaryOperator::NotEqual => Ok(Value::Bool(!values_equal(&l, &r))),
        BinaryOperator::LessThan => compare(&l, &r, "<", |o| o.is_lt()),
        BinaryOperator::LessThanOrEqual => compare(&l, &r, "<=", |o| o.is_le()),
        BinaryOperator::GreaterThan => compare(&l, &r, ">", |o| o.is_gt()),
        BinaryOperator::GreaterThanOrEqual => compare(&l, &r, ">=", |o| o.is_ge()),
        BinaryOperator::Add => {
            if l.is_string() || r.is_string() {
                Ok(Value::String(format!("{}{}", to_text(&l), to_text(&r))))
            } else {
                number(get_number(&l, "+")? + get_number(&r, "+")?)
            }
        }
        BinaryOperator::Subtract => number(get_number(&l, "-")? - get_number(&r, "-")?),
        BinaryOperator::Multiply => number(get_number(&l, "*")? * get_number(&r, "*")?),
        BinaryOperator::Divide => {
            let divisor = get_number(&r, "/")?;
            if divisor == 0.0 {
                return Err(FunctionError::Formula("division by zero".to_string()));
            }
            number(get_number(&l, "/")? / divisor)
        }
        BinaryOperator::Modulus => {
            let divisor = get_number(&r, "%")?;
            if divisor == 0.0 {
                return Err(FunctionError::Formula("division by zero".to_string()));
            }
            number(get_number(&l, "%")? % divisor)
        }
        BinaryOperator::And | BinaryOperator::Or => unreachable!("handled above"),
    }
}

fn index_value(base: Value, index: &Value) -> FunctionResult<Value> {
    match (base, index) {
        (Value::Array(mut items), Value::Number(n)) => {
            let i = n.as_f64().unwrap_or(-1.0);
            if i < 0.0 || i.fract() != 0.0 || i as usize >= items.len() {
                return Ok(Value::Null);
            }
            Ok(items.swap_remove(i as usize))
        }
        (Value::Object(mut map), Value::String(key)) => Ok(map.remove(key).unwrap_or(Value::Null)),
        (Value::Null, _) => Ok(Value::Null),
        (base, index) => Err(FunctionError::Formula(format!(
            "cannot index {} with {}",
            type_name(&base),
            type_name(index)
        ))),
    }
}

fn call_function(name: &str, args: &[Expression], vars: &Variables) -> FunctionResult<Value> {
    let upper = name.to_uppercase();

    // IF only evaluates the branch it takes.
    if upper == "IF" {
        if args.len() != 3 {
            return Err(FunctionError::Formula(
                "IF requires 3 arguments: condition, then, else".to_string(),
            ));
        }
        let branch = if to_bool(&evaluate(&args[0], vars)?) {
            &args[1]
        } else {
            &args[2]
        };
        return evaluate(branch, vars);
    }

    let values = args
        .iter()
        .map(|arg| evaluate(arg, vars))
        .collect::<FunctionResult<Vec<_>>>()?;
    call_builtin(&upper, &values)
}

fn call_builtin(name: &str, args: &[Value]) -> FunctionResult<Value> {
    match name {
        "ABS" => {
            check_args(name, args, 1)?;
            number(get_number(&args[0], name)?.abs())
        }
        "FLOOR" => {
            check_args(name, args, 1)?;
            number(get_number(&args[0], name)?.floor())
        }
        "CEIL" | "CEILING" => {
            check_args(name, args, 1)?;
            number(get_number(&args[0], name)?.ceil())
        }
        "ROUND" => {
            if args.is_empty() || args.len() > 2 {
                return Err(FunctionError::Formula(
                    "ROUND requires 1-2 arguments".to_string(),
                ));
            }
            let num = get_number(&args[0], name)?;
            let digits = match args.get(1) {
                Some(d) => get_number(d, name)? as i32,
                None => 0,
            };
            let multiplier = 10f64.powi(digits);
            number((num * multiplier).round() / multiplier)
        }
        "SQRT" => {
            check_args(name, args, 1)?;
            let num = get_number(&args[0], name)?;
            if num < 0.0 {
                return Err(FunctionError::Formula(
                    "SQRT: argument must be non-negative".to_string(),
                ));
            }
            number(num.sqrt())
        }
        "POW" | "POWER" => {
            check_args(name, args, 2)?;
            number(get_number(&args[0], name)?.powf(get_number(&args[1], name)?))
        }
        "MIN" | "MAX" | "SUM" | "AVG" => aggregate(name, args),
        "LEN" | "LENGTH" => {
            check_args(name, args, 1)?;
            let len = match &args[0] {
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                Value::Null => 0,
                other => {
                    return Err(FunctionError::Formula(format!(
                        "LEN: unsupported {}",
                        type_name(other)
                    )))
                }
            };
            number(len as f64)
        }
        "UPPER" => {
            check_args(name, args, 1)?;
            Ok(Value::String(to_text(&args[0]).to_uppercase()))
        }
        "LOWER" => {
            check_args(name, args, 1)?;
            Ok(Value::String(to_text(&args[0]).to_lowercase()))
        }
        "CONCAT" => Ok(Value::String(args.iter().map(to_text).collect())),
        "COALESCE" => Ok(args
            .iter()
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or(Value::Null)),
        _ => Err(FunctionError::Formula(format!("unknown function: {}", name))),
    }
}

/// MIN/MAX/SUM/AVG over their arguments, or over a single array argument.
fn aggregate(name: &str, args: &[Value]) -> FunctionResult<Value> {
    let items: &[Value] = match args {
        [Value::Array(items)] => items,
        _ => args,
    };
    let nums = items
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| get_number(v, name))
        .collect::<FunctionResult<Vec<f64>>>()?;

    if nums.is_empty() {
        return match name {
            "SUM" => number(0.0),
            _ => Ok(Value::Null),
        };
    }
    let result = match name {
        "MIN" => nums.iter().copied().fold(f64::INFINITY, f64::min),
        "MAX" => nums.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        "SUM" => nums.iter().sum(),
        _ => nums.iter().sum::<f64>() / nums.len() as f64,
    };
    number(result)
}

fn check_args(name: &str, args: &[Value], expected: usize) -> FunctionResult<()> {
    if args.len() != expected {
        return Err(FunctionError::Formula(format!(
            "{} requires {} argument{}",
            name,
            expected,
            if expected == 1 { "" } else { "s" }
        )));
    }
    Ok(())
}

fn get_number(value: &Value, context: &str) -> FunctionResult<f64> {
    value.as_f64().ok_or_else(|| {
        FunctionError::Formula(format!(
            "{}: expected number, found {}",
            context,
            type_name(value)
        ))
    })
}

fn number(n: f64) -> FunctionResult<Value> {
    Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| FunctionError::Formula(format!("result {} is not a finite number", n)))
}

fn to_bool(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) => f.to_string(),
            None => n.to_string(),
        },
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(
    a: &Value,
    b: &Value,
    op: &str,
    accept: fn(std::cmp::Ordering) -> bool,
) -> FunctionResult<Value> {
    let ordering = match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    };
    ordering.map(|o| Value::Bool(accept(o))).ok_or_else(|| {
        FunctionError::Formula(format!(
            "cannot compare {} {} {}",
            type_name(a),
            op,
            type_name(b)
        ))
    })
}
