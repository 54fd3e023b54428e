use crate::error::{FunctionError, FunctionResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    True,
    False,
    Null,
    And,
    Or,
    Not,

    // Identifiers and literals
    Identifier(String),
    Number(f64),
    String(String),

    // Operators
    Equal,         // == or =
    NotEqual,      // !=
    LessThan,      // <
    LessThanEq,    // <=
    GreaterThan,   // >
    GreaterThanEq, // >=
    Plus,          // +
    Minus,         // -
    Star,          // *
    Slash,         // /
    Percent,       // %

    // Delimiters
    Dot,          // .
    Comma,        // ,
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]

    Eof,
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Self {
            input: chars,
            position: 0,
            current_char,
        }
    }

    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> FunctionResult<Token> {
        let mut num_str = String::new();
        let mut has_dot = false;

        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() {
                num_str.push(ch);
                self.advance();
            } else if ch == '.' && !has_dot && self.peek_char().is_some_and(|c| c.is_ascii_digit())
            {
                has_dot = true;
                num_str.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        num_str
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| FunctionError::Formula(format!("invalid number: {}", num_str)))
    }

    fn read_string(&mut self, quote: char) -> FunctionResult<Token> {
        self.advance(); // opening quote

        let mut string = String::new();
        while let Some(ch) = self.current_char {
            if ch == quote {
                self.advance();
                return Ok(Token::String(string));
            } else if ch == '\\' {
                self.advance();
                if let Some(escaped) = self.current_char {
                    string.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        _ => escaped,
                    });
                    self.advance();
                }
            } else {
                string.push(ch);
                self.advance();
            }
        }

        Err(FunctionError::Formula("unterminated string".to_string()))
    }

    /// `name with spaces` style identifiers, for variables whose titles are
    /// not plain words.
    fn read_quoted_identifier(&mut self) -> FunctionResult<Token> {
        self.advance(); // opening backtick

        let mut ident = String::new();
        while let Some(ch) = self.current_char {
            if ch == '`' {
                self.advance();
                return Ok(Token::Identifier(ident));
            }
            ident.push(ch);
            self.advance();
        }

        Err(FunctionError::Formula("unterminated quoted identifier".to_string()))
    }

    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match ident.to_uppercase().as_str() {
            "TRUE" => Token::True,
            "FALSE" => Token::False,
            "NULL" => Token::Null,
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            _ => Token::Identifier(ident),
        }
    }

    /// Emit `double` when `second` follows the current char, else `single`.
    fn one_or_two(&mut self, second: char, single: Token, double: Token) -> Token {
        if self.peek_char() == Some(second) {
            self.advance();
            self.advance();
            double
        } else {
            self.advance();
            single
        }
    }

    pub fn next_token(&mut self) -> FunctionResult<Token> {
        self.skip_whitespace();

        let Some(ch) = self.current_char else {
            return Ok(Token::Eof);
        };

        if ch.is_ascii_digit() {
            return self.read_number();
        }
        if ch.is_alphabetic() || ch == '_' {
            return Ok(self.read_identifier());
        }

        let token = match ch {
            '"' | '\'' => return self.read_string(ch),
            '`' => return self.read_quoted_identifier(),
            '=' => self.one_or_two('=', Token::Equal, Token::Equal),
            '!' => self.one_or_two('=', Token::Not, Token::NotEqual),
            '<' => self.one_or_two('=', Token::LessThan, Token::LessThanEq),
            '>' => self.one_or_two('=', Token::GreaterThan, Token::GreaterThanEq),
            '&' | '|' if self.peek_char() == Some(ch) => {
                self.advance();
                self.advance();
                if ch == '&' {
                    Token::And
                } else {
                    Token::Or
                }
            }
            _ => {
                let token = match ch {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '.' => Token::Dot,
                    ',' => Token::Comma,
                    '(' => Token::LeftParen,
                    ')' => Token::RightParen,
                    '[' => Token::LeftBracket,
                    ']' => Token::RightBracket,
                    other => {
                        return Err(FunctionError::Formula(format!(
                            "unexpected character '{}'",
                            other
                        )))
                    }
                };
                self.advance();
                token
            }
        };
        Ok(token)
    }

    pub fn tokenize(&mut self) -> FunctionResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            if token == Token::Eof {
                tokens.push(token);
                break;
            }
            tokens.push(token);
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(input).tokenize().unwrap()
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            tokens("a >= 1.5 && !b || c != 'x'"),
            vec![
                Token::Identifier("a".to_string()),
                Token::GreaterThanEq,
                Token::Number(1.5),
                Token::And,
                Token::Not,
                Token::Identifier("b".to_string()),
                Token::Or,
                Token::Identifier("c".to_string()),
                Token::NotEqual,
                Token::String("x".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            tokens("TRUE and Not null"),
            vec![Token::True, Token::And, Token::Not, Token::Null, Token::Eof]
        );
    }

    #[test]
    fn test_field_access_after_number_is_not_decimal() {
        assert_eq!(
            tokens("items[0].price"),
            vec![
                Token::Identifier("items".to_string()),
                Token::LeftBracket,
                Token::Number(0.0),
                Token::RightBracket,
                Token::Dot,
                Token::Identifier("price".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_quoted_identifier_and_escapes() {
        assert_eq!(
            tokens(r#"`unit price` + "a\"b""#),
            vec![
                Token::Identifier("unit price".to_string()),
                Token::Plus,
                Token::String("a\"b".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_errors() {
        assert!(Lexer::new("'open").tokenize().is_err());
        assert!(Lexer::new("a # b").tokenize().is_err());
        assert!(Lexer::new("a & b").tokenize().is_err());
    }
}
