//! A small expression language for the formula-execution function.
//!
//! ```text
//! price * qty - discount
//! if(total > 100, 'large', 'small')
//! round(avg(order.items[0].scores), 2)
//! ```
//!
//! Numbers are `f64`. `+` concatenates when either side is a string.
//! Function names are case-insensitive.

mod ast;
mod eval;
mod lexer;
mod parser;

pub use ast::{BinaryOperator, Expression, UnaryOperator};
pub use eval::Variables;

use serde_json::Value;

use crate::error::FunctionResult;

/// A parsed formula, reusable across evaluations.
#[derive(Debug, Clone)]
pub struct Formula {
    expr: Expression,
}

impl Formula {
    pub fn parse(source: &str) -> FunctionResult<Self> {
        let expr = parser::Parser::new(source)?.parse()?;
        Ok(Self { expr })
    }

    pub fn expression(&self) -> &Expression {
        &self.expr
    }

    pub fn evaluate(&self, vars: &Variables) -> FunctionResult<Value> {
        eval::evaluate(&self.expr, vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_once_evaluate_many() {
        let formula = Formula::parse("base * rate").unwrap();
        let mut vars = Variables::new();
        vars.insert("rate".to_string(), json!(2));

        for (base, expected) in [(1, 2.0), (5, 10.0)] {
            vars.insert("base".to_string(), json!(base));
            assert_eq!(formula.evaluate(&vars).unwrap(), json!(expected));
        }
    }

    #[test]
    fn test_expression_is_exposed() {
        let formula = Formula::parse("x").unwrap();
        assert_eq!(formula.expression(), &Expression::Variable("x".to_string()));
    }
}
