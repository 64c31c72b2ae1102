//! Restricted arithmetic evaluator
//!
//! Recursive descent over a fixed grammar:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('+' | '-') unary | power
//! power   := primary (('^' | '**') unary)?
//! primary := number | '(' expr ')'
//! ```
//!
//! Exponentiation is right associative and binds tighter than unary minus,
//! so `-2^2` is `-4` and `2^3^2` is `512`. Nothing outside this grammar is
//! accepted.
//!
//! Integer literals stay exact (`i128`) through `+ - *`, exact division and
//! non-negative integer powers. A fractional literal, an inexact division or
//! a negative exponent switches to `f64`. Integer overflow is an error, never
//! a rounded result.

use std::fmt;
use thiserror::Error;

/// Maximum parenthesis/unary nesting accepted from untrusted input
const MAX_DEPTH: usize = 64;

/// Integral floats up to this magnitude are printed without a fraction
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0; // 2^53

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("invalid number '{text}' at position {pos}")]
    InvalidNumber { text: String, pos: usize },
    #[error("unexpected {found} at position {pos}")]
    UnexpectedToken { found: String, pos: usize },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("division by zero")]
    DivisionByZero,
    #[error("result is not a finite number")]
    NonFinite,
    #[error("integer result is too large to represent exactly")]
    Overflow,
    #[error("expression nested deeper than {} levels", MAX_DEPTH)]
    TooDeep,
}

/// Result of an evaluation: exact integer or float
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i128),
    Float(f64),
}

impl Number {
    #[allow(clippy::cast_precision_loss)]
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(v) => v,
        }
    }

    fn float(value: f64) -> Result<Number, EvalError> {
        if value.is_finite() {
            Ok(Number::Float(value))
        } else {
            Err(EvalError::NonFinite)
        }
    }

    fn add(self, rhs: Number) -> Result<Number, EvalError> {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => {
                a.checked_add(b).map(Number::Int).ok_or(EvalError::Overflow)
            }
            (a, b) => Number::float(a.as_f64() + b.as_f64()),
        }
    }

    fn sub(self, rhs: Number) -> Result<Number, EvalError> {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => {
                a.checked_sub(b).map(Number::Int).ok_or(EvalError::Overflow)
            }
            (a, b) => Number::float(a.as_f64() - b.as_f64()),
        }
    }

    fn mul(self, rhs: Number) -> Result<Number, EvalError> {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => {
                a.checked_mul(b).map(Number::Int).ok_or(EvalError::Overflow)
            }
            (a, b) => Number::float(a.as_f64() * b.as_f64()),
        }
    }

    fn div(self, rhs: Number) -> Result<Number, EvalError> {
        if rhs.as_f64() == 0.0 {
            return Err(EvalError::DivisionByZero);
        }
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => match a.checked_rem(b) {
                Some(0) => a.checked_div(b).map(Number::Int).ok_or(EvalError::Overflow),
                Some(_) => Number::float(self.as_f64() / rhs.as_f64()),
                None => Err(EvalError::Overflow),
            },
            (a, b) => Number::float(a.as_f64() / b.as_f64()),
        }
    }

    fn pow(self, exponent: Number) -> Result<Number, EvalError> {
        match (self, exponent) {
            (Number::Int(base), Number::Int(exp)) if exp >= 0 => match u32::try_from(exp) {
                Ok(exp) => base.checked_pow(exp).map(Number::Int).ok_or(EvalError::Overflow),
                Err(_) => match base {
                    0 | 1 => Ok(Number::Int(base)),
                    -1 => Ok(Number::Int(if exp % 2 == 0 { 1 } else { -1 })),
                    _ => Err(EvalError::Overflow),
                },
            },
            (base, exp) => Number::float(base.as_f64().powf(exp.as_f64())),
        }
    }

    fn neg(self) -> Result<Number, EvalError> {
        match self {
            Number::Int(n) => n.checked_neg().map(Number::Int).ok_or(EvalError::Overflow),
            Number::Float(v) => Ok(Number::Float(-v)),
        }
    }
}

/// Rendered the way results are reported back to the model
impl fmt::Display for Number {
    #[allow(clippy::cast_possible_truncation)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Number::Int(n) => write!(f, "{n}"),
            Number::Float(value) => {
                // Normalise -0 so "0*-0.5" doesn't print as "-0"
                let value = if value == 0.0 { 0.0 } else { value };
                if value.abs() > MAX_EXACT_INTEGER {
                    // Digits beyond 2^53 would be made up
                    write!(f, "{value:e}")
                } else if value.fract() == 0.0 {
                    write!(f, "{}", value as i64)
                } else {
                    write!(f, "{value}")
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(Number),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

impl Token {
    fn describe(self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Caret => "'^'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
        }
    }
}

/// Evaluate an arithmetic expression
pub fn evaluate(expression: &str) -> Result<Number, EvalError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(EvalError::Empty);
    }

    let mut parser = Parser {
        tokens: &tokens,
        index: 0,
        depth: 0,
    };
    let value = parser.expr()?;

    if let Some(&(token, pos)) = parser.peek_with_pos() {
        return Err(EvalError::UnexpectedToken {
            found: token.describe(),
            pos,
        });
    }

    Ok(value)
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, EvalError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let start = i;
        let token = match ch {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' if chars.get(i + 1) == Some(&'*') => {
                i += 1;
                Token::Caret
            }
            '*' => Token::Star,
            '/' => Token::Slash,
            '^' => Token::Caret,
            '(' => Token::LParen,
            ')' => Token::RParen,
            c if c.is_ascii_digit() || c == '.' => {
                let (number, end) = scan_number(&chars, i)?;
                tokens.push((Token::Number(number), start));
                i = end;
                continue;
            }
            other => return Err(EvalError::UnexpectedChar { ch: other, pos: i }),
        };
        tokens.push((token, start));
        i += 1;
    }

    Ok(tokens)
}

/// Scan a numeric literal starting at `start`; returns the value and the
/// index just past it
fn scan_number(chars: &[char], start: usize) -> Result<(Number, usize), EvalError> {
    let mut end = start;
    while end < chars.len() && (chars[end].is_ascii_digit() || chars[end] == '.') {
        end += 1;
    }

    // Optional exponent: e, E followed by optional sign and at least one digit
    if end < chars.len() && matches!(chars[end], 'e' | 'E') {
        let mut exp_end = end + 1;
        if exp_end < chars.len() && matches!(chars[exp_end], '+' | '-') {
            exp_end += 1;
        }
        if exp_end < chars.len() && chars[exp_end].is_ascii_digit() {
            while exp_end < chars.len() && chars[exp_end].is_ascii_digit() {
                exp_end += 1;
            }
            end = exp_end;
        }
    }

    let text: String = chars[start..end].iter().collect();
    let valid_mantissa = text.chars().filter(|c| *c == '.').count() <= 1
        && text.chars().any(|c| c.is_ascii_digit());
    if !valid_mantissa {
        return Err(EvalError::InvalidNumber { text, pos: start });
    }

    if text.chars().all(|c| c.is_ascii_digit()) {
        // Only digits, so the only possible failure is overflow
        return text
            .parse::<i128>()
            .map(|n| (Number::Int(n), end))
            .map_err(|_| EvalError::Overflow);
    }

    match text.parse::<f64>() {
        Ok(value) => Number::float(value).map(|n| (n, end)),
        Err(_) => Err(EvalError::InvalidNumber { text, pos: start }),
    }
}

struct Parser<'a> {
    tokens: &'a [(Token, usize)],
    index: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.index).map(|(t, _)| *t)
    }

    fn peek_with_pos(&self) -> Option<&(Token, usize)> {
        self.tokens.get(self.index)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn enter(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            Err(EvalError::TooDeep)
        } else {
            Ok(())
        }
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn expr(&mut self) -> Result<Number, EvalError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    value = value.add(self.term()?)?;
                }
                Some(Token::Minus) => {
                    self.advance();
                    value = value.sub(self.term()?)?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<Number, EvalError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.advance();
                    value = value.mul(self.unary()?)?;
                }
                Some(Token::Slash) => {
                    self.advance();
                    value = value.div(self.unary()?)?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<Number, EvalError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.advance();
                self.enter()?;
                let value = self.unary();
                self.leave();
                value?.neg()
            }
            Some(Token::Plus) => {
                self.advance();
                self.enter()?;
                let value = self.unary();
                self.leave();
                value
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Number, EvalError> {
        let base = self.primary()?;
        if self.peek() == Some(Token::Caret) {
            self.advance();
            self.enter()?;
            let exponent = self.unary();
            self.leave();
            return base.pow(exponent?);
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Number, EvalError> {
        let pos = self.peek_with_pos().map(|(_, p)| *p);
        match self.advance() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                self.enter()?;
                let value = self.expr();
                self.leave();
                let value = value?;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    Some(other) => Err(EvalError::UnexpectedToken {
                        found: other.describe(),
                        pos: self.tokens[self.index - 1].1,
                    }),
                    None => Err(EvalError::UnexpectedEnd),
                }
            }
            Some(other) => Err(EvalError::UnexpectedToken {
                found: other.describe(),
                pos: pos.unwrap_or_default(),
            }),
            None => Err(EvalError::UnexpectedEnd),
        }
    }
}
