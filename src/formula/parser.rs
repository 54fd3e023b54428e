//! Recursive-descent parser for formula expressions.
//!
//! Precedence, lowest first: `or`, `and`, equality, comparison, additive,
//! multiplicative, unary, postfix (`.field`, `[index]`), primary.
//!
//! Both the nesting of the source and the height of the resulting tree are
//! capped at [`MAX_DEPTH`], so neither parsing nor evaluation can exhaust
//! the stack.

use serde_json::{Number, Value};

use super::ast::{BinaryOperator, Expression, UnaryOperator};
use super::lexer::{Lexer, Token};
use crate::error::{FunctionError, FunctionResult};

/// Deepest nesting, and tallest expression tree, a formula may have.
pub const MAX_DEPTH: usize = 128;

/// A parsed subtree and its height.
type Parsed = (Expression, usize);

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    pub fn new(input: &str) -> FunctionResult<Self> {
        let tokens = Lexer::new(input).tokenize()?;
        Ok(Self {
            tokens,
            position: 0,
            depth: 0,
        })
    }

    fn current_token(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn expect(&mut self, expected: Token) -> FunctionResult<()> {
        if self.current_token() == &expected {
            self.advance();
            Ok(())
        } else {
            Err(FunctionError::Formula(format!(
                "expected {:?}, got {:?}",
                expected,
                self.current_token()
            )))
        }
    }

    fn too_deep() -> FunctionError {
        FunctionError::Formula("formula nested too deeply".to_string())
    }

    fn enter(&mut self) -> FunctionResult<()> {
        if self.depth >= MAX_DEPTH {
            return Err(Self::too_deep());
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn node(expr: Expression, height: usize) -> FunctionResult<Parsed> {
        if height > MAX_DEPTH {
            return Err(Self::too_deep());
        }
        Ok((expr, height))
    }

    /// Parse a complete formula; trailing tokens are an error.
    pub fn parse(&mut self) -> FunctionResult<Expression> {
        if matches!(self.current_token(), Token::Eof) {
            return Err(FunctionError::Formula("empty formula".to_string()));
        }
        let (expr, _) = self.parse_expression()?;
        if !matches!(self.current_token(), Token::Eof) {
            return Err(FunctionError::Formula(format!(
                "unexpected token {:?}",
                self.current_token()
            )));
        }
        Ok(expr)
    }

    fn parse_expression(&mut self) -> FunctionResult<Parsed> {
        self.enter()?;
        let parsed = self.parse_or();
        self.leave();
        parsed
    }

    fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Expression {
        Expression::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    fn fold_binary(left: Parsed, op: BinaryOperator, right: Parsed) -> FunctionResult<Parsed> {
        let height = left.1.max(right.1) + 1;
        Self::node(Self::binary(left.0, op, right.0), height)
    }

    fn parse_or(&mut self) -> FunctionResult<Parsed> {
        let mut left = self.parse_and()?;
        while matches!(self.current_token(), Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Self::fold_binary(left, BinaryOperator::Or, right)?;
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> FunctionResult<Parsed> {
        let mut left = self.parse_equality()?;
        while matches!(self.current_token(), Token::And) {
            self.advance();
            let right = self.parse_equality()?;
            left = Self::fold_binary(left, BinaryOperator::And, right)?;
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> FunctionResult<Parsed> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.current_token() {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = Self::fold_binary(left, op, right)?;
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> FunctionResult<Parsed> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current_token() {
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessThanEq => BinaryOperator::LessThanOrEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterThanEq => BinaryOperator::GreaterThanOrEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Self::fold_binary(left, op, right)?;
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> FunctionResult<Parsed> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Self::fold_binary(left, op, right)?;
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FunctionResult<Parsed> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::Percent => BinaryOperator::Modulus,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Self::fold_binary(left, op, right)?;
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> FunctionResult<Parsed> {
        let op = match self.current_token() {
            Token::Not => Some(UnaryOperator::Not),
            Token::Minus => Some(UnaryOperator::Negate),
            Token::Plus => None,
            _ => return self.parse_postfix(),
        };
        self.advance();

        self.enter()?;
        let operand = self.parse_unary();
        self.leave();
        let (operand, height) = operand?;

        match op {
            Some(op) => Self::node(
                Expression::Unary {
                    op,
                    operand: Box::new(operand),
                },
                height + 1,
            ),
            None => Ok((operand, height)),
        }
    }

    fn parse_postfix(&mut self) -> FunctionResult<Parsed> {
        let (mut expr, mut height) = self.parse_primary()?;
        loop {
            match self.current_token() {
                Token::Dot => {
                    self.advance();
                    let Token::Identifier(field) = self.current_token().clone() else {
                        return Err(FunctionError::Formula(
                            "expected field name after '.'".to_string(),
                        ));
                    };
                    self.advance();
                    (expr, height) =
                        Self::node(Expression::FieldAccess(Box::new(expr), field), height + 1)?;
                }
                Token::LeftBracket => {
                    self.advance();
                    let (index, index_height) = self.parse_expression()?;
                    self.expect(Token::RightBracket)?;
                    (expr, height) = Self::node(
                        Expression::IndexAccess(Box::new(expr), Box::new(index)),
                        height.max(index_height) + 1,
                    )?;
                }
                _ => break,
            }
        }
        Ok((expr, height))
    }

    fn parse_primary(&mut self) -> FunctionResult<Parsed> {
        let token = self.current_token().clone();
        match token {
            Token::Number(n) => {
                self.advance();
                let number = Number::from_f64(n).ok_or_else(|| {
                    FunctionError::Formula(format!("invalid number literal {}", n))
                })?;
                Ok((Expression::Literal(Value::Number(number)), 1))
            }
            Token::String(s) => {
                self.advance();
                Ok((Expression::Literal(Value::String(s)), 1))
            }
            Token::True => {
                self.advance();
                Ok((Expression::Literal(Value::Bool(true)), 1))
            }
            Token::False => {
                self.advance();
                Ok((Expression::Literal(Value::Bool(false)), 1))
            }
            Token::Null => {
                self.advance();
                Ok((Expression::Literal(Value::Null), 1))
            }
            Token::Identifier(name) => {
                self.advance();
                if matches!(self.current_token(), Token::LeftParen) {
                    self.advance();
                    let (args, height) = self.parse_list(Token::RightParen)?;
                    Self::node(Expression::FunctionCall { name, args }, height + 1)
                } else {
                    Ok((Expression::Variable(name), 1))
                }
            }
            Token::LeftParen => {
                self.advance();
                let parsed = self.parse_expression()?;
                self.expect(Token::RightParen)?;
                Ok(parsed)
            }
            Token::LeftBracket => {
                self.advance();
                let (items, height) = self.parse_list(Token::RightBracket)?;
                Self::node(Expression::Array(items), height + 1)
            }
            other => Err(FunctionError::Formula(format!(
                "unexpected token {:?}",
                other
            ))),
        }
    }

    /// Comma-separated expressions up to and including `close`, with the
    /// height of the tallest one.
    fn parse_list(&mut self, close: Token) -> FunctionResult<(Vec<Expression>, usize)> {
        let mut items = Vec::new();
        let mut height = 0;
        if self.current_token() == &close {
            self.advance();
            return Ok((items, height));
        }
        loop {
            let (item, item_height) = self.parse_expression()?;
            items.push(item);
            height = height.max(item_height);
            if matches!(self.current_token(), Token::Comma) {
                self.advance();
            } else {
                self.expect(close)?;
                return Ok((items, height));
            }
        }
    }
}
