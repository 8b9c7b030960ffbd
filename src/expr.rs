//! Restricted arithmetic-expression evaluator for multi-token
//! placeholder substitution.
//!
//! The grammar is deliberately tiny: integer and float literals,
//! `+ - * /`, unary minus, and parentheses. Anything else is an
//! error, so a literal string that merely contains spaces can
//! never be silently mis-evaluated.

use crate::errors::SuiteError;
use crate::value::Value;

/// Evaluate `input` and return the numeric result. Integer
/// arithmetic stays integral; an inexact integer division falls
/// back to a float result.
pub fn evaluate(input: &str) -> Result<Value, SuiteError> {
    let tokens = tokenize(input).map_err(|reason| SuiteError::BadExpression {
        expr: input.to_string(),
        reason,
    })?;
    let mut parser = Parser { tokens, pos: 0 };
    let result = parser.expression().map_err(|reason| SuiteError::BadExpression {
        expr: input.to_string(),
        reason,
    })?;
    if parser.pos != parser.tokens.len() {
        return Err(SuiteError::BadExpression {
            expr: input.to_string(),
            reason: "trailing input after expression".to_string(),
        });
    }
    Ok(match result {
        Num::Int(i) => Value::Int(i),
        Num::Float(f) => Value::Float(f),
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i128),
    Float(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Open,
    Close,
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i128),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            ' ' | '\t' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                let mut is_float = false;
                while let Some(&c) = chars.peek() {
                    match c {
                        '0'..='9' => literal.push(c),
                        '.' => {
                            is_float = true;
                            literal.push(c);
                        }
                        _ => break,
                    }
                    chars.next();
                }
                if is_float {
                    let f = literal
                        .parse::<f64>()
                        .map_err(|_| format!("invalid number '{literal}'"))?;
                    tokens.push(Token::Float(f));
                } else {
                    let i = literal
                        .parse::<i128>()
                        .map_err(|_| format!("invalid number '{literal}'"))?;
                    tokens.push(Token::Int(i));
                }
            }
            other => return Err(format!("unexpected character '{other}'")),
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

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expression(&mut self) -> Result<Num, String> {
        let mut acc = self.term()?;
        while let Some(op) = self.peek().cloned() {
            match op {
                Token::Plus => {
                    self.next();
                    let rhs = self.term()?;
                    acc = apply(acc, rhs, |a, b| a.checked_add(b), |a, b| a + b)?;
                }
                Token::Minus => {
                    self.next();
                    let rhs = self.term()?;
                    acc = apply(acc, rhs, |a, b| a.checked_sub(b), |a, b| a - b)?;
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    fn term(&mut self) -> Result<Num, String> {
        let mut acc = self.factor()?;
        while let Some(op) = self.peek().cloned() {
            match op {
                Token::Star => {
                    self.next();
                    let rhs = self.factor()?;
                    acc = apply(acc, rhs, |a, b| a.checked_mul(b), |a, b| a * b)?;
                }
                Token::Slash => {
                    self.next();
                    let rhs = self.factor()?;
                    acc = divide(acc, rhs)?;
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    fn factor(&mut self) -> Result<Num, String> {
        match self.next() {
            Some(Token::Int(i)) => Ok(Num::Int(i)),
            Some(Token::Float(f)) => Ok(Num::Float(f)),
            Some(Token::Minus) => {
                let inner = self.factor()?;
                Ok(match inner {
                    Num::Int(i) => Num::Int(-i),
                    Num::Float(f) => Num::Float(-f),
                })
            }
            Some(Token::Open) => {
                let inner = self.expression()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err("missing closing parenthesis".to_string()),
                }
            }
            Some(other) => Err(format!("unexpected token {other:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

fn apply(
    lhs: Num,
    rhs: Num,
    int_op: impl Fn(i128, i128) -> Option<i128>,
    float_op: impl Fn(f64, f64) -> f64,
) -> Result<Num, String> {
    match (lhs, rhs) {
        (Num::Int(a), Num::Int(b)) => int_op(a, b)
            .map(Num::Int)
            .ok_or_else(|| "integer overflow".to_string()),
        (a, b) => Ok(Num::Float(float_op(a.as_f64(), b.as_f64()))),
    }
}

fn divide(lhs: Num, rhs: Num) -> Result<Num, String> {
    match (lhs, rhs) {
        (_, Num::Int(0)) => Err("division by zero".to_string()),
        (Num::Int(a), Num::Int(b)) => {
            if a % b == 0 {
                Ok(Num::Int(a / b))
            } else {
                Ok(Num::Float(a as f64 / b as f64))
            }
        }
        (a, b) => {
            let denominator = b.as_f64();
            if denominator == 0.0 {
                return Err("division by zero".to_string());
            }
            Ok(Num::Float(a.as_f64() / denominator))
        }
    }
}
