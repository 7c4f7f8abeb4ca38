//! Restricted expression parser for conditions.
//!
//! Accepts exactly the whitelist of syntax the evaluator can represent:
//!
//! ```text
//! state['oxygen'] < 95 and state['emotional_bond'] >= 70
//! not (state['phase'] == 2 or 'fuel' in state)
//! ```
//!
//! The whitelist is a security boundary. Any function call, attribute
//! access, or identifier other than `state` (and the `and`/`or`/`not`/`in`
//! keywords) is rejected with a [`ConditionParseError`]. Parsing builds a
//! [`Condition`] tree and nothing else; no part of the input is ever
//! executed.

use thiserror::Error;

use super::{CompareOp, Condition};

/// Errors raised when an expression falls outside the whitelist.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionParseError {
    #[error("expression is empty")]
    Empty,

    #[error("unexpected character `{0}` in expression")]
    UnexpectedCharacter(char),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("invalid numeric literal `{0}`")]
    InvalidNumber(String),

    #[error("identifier `{0}` is not allowed; only the `state` mapping may be referenced")]
    ForbiddenIdentifier(String),

    #[error("{0} is not allowed in conditions")]
    ForbiddenSyntax(&'static str),

    #[error("expected {expected}, found `{found}`")]
    Unexpected {
        expected: &'static str,
        found: String,
    },

    #[error("expected {0}, found end of expression")]
    UnexpectedEnd(&'static str),

    #[error("unexpected trailing input starting at `{0}`")]
    TrailingInput(String),
}

/// Parse a restricted condition expression into a [`Condition`].
pub fn parse(expression: &str) -> Result<Condition, ConditionParseError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(ConditionParseError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let condition = parser.or_expr()?;
    if let Some(extra) = parser.peek() {
        return Err(ConditionParseError::TrailingInput(extra.describe()));
    }
    Ok(condition)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    LBracket,
    RBracket,
    LParen,
    RParen,
    Op(CompareOp),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => name.clone(),
            Token::Number(n) => n.to_string(),
            Token::Str(s) => format!("'{s}'"),
            Token::LBracket => "[".to_string(),
            Token::RBracket => "]".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::Op(op) => op.to_string(),
        }
    }
}

fn tokenize(expression: &str) -> Result<Vec<Token>, ConditionParseError> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(name));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut literal = String::new();
                literal.push(c);
                chars.next();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        literal.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value: f64 = literal
                    .parse()
                    .map_err(|_| ConditionParseError::InvalidNumber(literal.clone()))?;
                tokens.push(Token::Number(value));
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some(c) if c == quote => break,
                        Some(c) => text.push(c),
                        None => return Err(ConditionParseError::UnterminatedString),
                    }
                }
                tokens.push(Token::Str(text));
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '.' => return Err(ConditionParseError::ForbiddenSyntax("attribute access")),
            '=' | '!' | '>' | '<' => {
                chars.next();
                let followed_by_eq = chars.peek() == Some(&'=');
                let op = match (c, followed_by_eq) {
                    ('=', true) => CompareOp::Eq,
                    ('!', true) => CompareOp::Ne,
                    ('>', true) => CompareOp::Gte,
                    ('<', true) => CompareOp::Lte,
                    ('>', false) => CompareOp::Gt,
                    ('<', false) => CompareOp::Lt,
                    _ => return Err(ConditionParseError::UnexpectedCharacter(c)),
                };
                if followed_by_eq {
                    chars.next();
                }
                tokens.push(Token::Op(op));
            }
            other => return Err(ConditionParseError::UnexpectedCharacter(other)),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(name)) if name == keyword)
    }

    fn expect(&mut self, expected: Token, label: &'static str) -> Result<(), ConditionParseError> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(ConditionParseError::Unexpected {
                expected: label,
                found: token.describe(),
            }),
            None => Err(ConditionParseError::UnexpectedEnd(label)),
        }
    }

    /// `or_expr := and_expr ('or' and_expr)*`
    fn or_expr(&mut self) -> Result<Condition, ConditionParseError> {
        let mut parts = vec![self.and_expr()?];
        while self.peek_keyword("or") {
            self.advance();
            parts.push(self.and_expr()?);
        }
        if parts.len() == 1 {
            Ok(parts.remove(0))
        } else {
            Ok(Condition::Any(parts))
        }
    }

    /// `and_expr := unary ('and' unary)*`
    fn and_expr(&mut self) -> Result<Condition, ConditionParseError> {
        let mut parts = vec![self.unary()?];
        while self.peek_keyword("and") {
            self.advance();
            parts.push(self.unary()?);
        }
        if parts.len() == 1 {
            Ok(parts.remove(0))
        } else {
            Ok(Condition::All(parts))
        }
    }

    /// `unary := 'not' unary | primary`
    fn unary(&mut self) -> Result<Condition, ConditionParseError> {
        if self.peek_keyword("not") {
            self.advance();
            let inner = self.unary()?;
            return Ok(Condition::Not(Box::new(inner)));
        }
        self.primary()
    }

    /// `primary := '(' or_expr ')' | comparison | existence`
    fn primary(&mut self) -> Result<Condition, ConditionParseError> {
        match self.advance() {
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                self.expect(Token::RParen, "`)`")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if name != "state" {
                    return Err(ConditionParseError::ForbiddenIdentifier(name));
                }
                if self.peek() == Some(&Token::LParen) {
                    return Err(ConditionParseError::ForbiddenSyntax("function call"));
                }
                self.comparison()
            }
            Some(Token::Str(key)) => {
                // `'key' in state`
                match self.advance() {
                    Some(Token::Ident(word)) if word == "in" => {}
                    Some(token) => {
                        return Err(ConditionParseError::Unexpected {
                            expected: "`in`",
                            found: token.describe(),
                        })
                    }
                    None => return Err(ConditionParseError::UnexpectedEnd("`in`")),
                }
                match self.advance() {
                    Some(Token::Ident(name)) if name == "state" => Ok(Condition::Exists(key)),
                    Some(Token::Ident(name)) => Err(ConditionParseError::ForbiddenIdentifier(name)),
                    Some(token) => Err(ConditionParseError::Unexpected {
                        expected: "`state`",
                        found: token.describe(),
                    }),
                    None => Err(ConditionParseError::UnexpectedEnd("`state`")),
                }
            }
            Some(token) => Err(ConditionParseError::Unexpected {
                expected: "`state`, a string literal, `not`, or `(`",
                found: token.describe(),
            }),
            None => Err(ConditionParseError::UnexpectedEnd(
                "`state`, a string literal, `not`, or `(`",
            )),
        }
    }

    /// Remainder of `state['key'] <op> <number>`; the `state` identifier
    /// has already been consumed.
    fn comparison(&mut self) -> Result<Condition, ConditionParseError> {
        self.expect(Token::LBracket, "`[`")?;
        let key = match self.advance() {
            Some(Token::Str(key)) => key,
            Some(token) => {
                return Err(ConditionParseError::Unexpected {
                    expected: "a string literal key",
                    found: token.describe(),
                })
            }
            None => return Err(ConditionParseError::UnexpectedEnd("a string literal key")),
        };
        self.expect(Token::RBracket, "`]`")?;

        let op = match self.advance() {
            Some(Token::Op(op)) => op,
            Some(token) => {
                return Err(ConditionParseError::Unexpected {
                    expected: "a comparison operator",
                    found: token.describe(),
                })
            }
            None => return Err(ConditionParseError::UnexpectedEnd("a comparison operator")),
        };

        let value = match self.advance() {
            Some(Token::Number(value)) => value,
            Some(token) => {
                return Err(ConditionParseError::Unexpected {
                    expected: "a numeric literal",
                    found: token.describe(),
                })
            }
            None => return Err(ConditionParseError::UnexpectedEnd("a numeric literal")),
        };

        Ok(Condition::Compare { key, op, value })
    }
}
