//! MB-005: Literal expression evaluator.
//!
//! Works on fully substituted text only. A tokenizer feeds a
//! recursive-descent parser with the usual precedence levels:
//! - primary: numbers, `true`/`false`, parentheses
//! - unary: `-`, `+`
//! - multiplicative: `*`, `/`
//! - additive: `+`, `-`
//! - comparison: `<`, `>`, `<=`, `>=`, `==`, `!=`
//! - `not` / `!`, then `and` / `&&`, then `or` / `||`
//!
//! Nothing else is accepted, so recipe text can never run as code.

use super::error::{Result, SimError};
use super::types::Value;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Bool(bool),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    Ne,
    And,
    Or,
    Not,
}

fn tokenize(src: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let (token, width) = match c {
            ' ' | '\t' => {
                i += 1;
                continue;
            }
            '+' => (Token::Plus, 1),
            '-' => (Token::Minus, 1),
            '*' => (Token::Star, 1),
            '/' => (Token::Slash, 1),
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '<' if next == Some('=') => (Token::Le, 2),
            '<' => (Token::Lt, 1),
            '>' if next == Some('=') => (Token::Ge, 2),
            '>' => (Token::Gt, 1),
            '=' if next == Some('=') => (Token::EqEq, 2),
            '!' if next == Some('=') => (Token::Ne, 2),
            '!' => (Token::Not, 1),
            '&' if next == Some('&') => (Token::And, 2),
            '|' if next == Some('|') => (Token::Or, 2),
            c if c.is_ascii_digit() || c == '.' => {
                let (n, width) = scan_number(&chars[i..])?;
                (Token::Num(n), width)
            }
            c if c.is_ascii_alphabetic() => {
                let width = chars[i..]
                    .iter()
                    .take_while(|c| c.is_ascii_alphanumeric() || **c == '_')
                    .count();
                let word: String = chars[i..i + width].iter().collect();
                let token = match word.to_ascii_lowercase().as_str() {
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => {
                        return Err(SimError::malformed(format!(
                            "unexpected word '{}' in '{}'",
                            word, src
                        )))
                    }
                };
                (token, width)
            }
            other => {
                return Err(SimError::malformed(format!(
                    "unexpected character '{}' in '{}'",
                    other, src
                )))
            }
        };
        tokens.push(token);
        i += width;
    }

    Ok(tokens)
}

/// Scan `digits[.digits][e[+-]digits]` from the start of `chars`.
fn scan_number(chars: &[char]) -> Result<(f64, usize)> {
    let mut width = chars
        .iter()
        .take_while(|c| c.is_ascii_digit() || **c == '.')
        .count();
    if matches!(chars.get(width), Some('e') | Some('E')) {
        let sign = usize::from(matches!(chars.get(width + 1), Some('+') | Some('-')));
        let digits = chars[(width + 1 + sign).min(chars.len())..]
            .iter()
            .take_while(|c| c.is_ascii_digit())
            .count();
        if digits > 0 {
            width += 1 + sign + digits;
        }
    }
    let text: String = chars[..width].iter().collect();
    text.parse::<f64>()
        .map(|n| (n, width))
        .map_err(|_| SimError::malformed(format!("invalid number '{}'", text)))
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.peek();
        self.pos += 1;
        t
    }

    fn error(&self, what: &str) -> SimError {
        SimError::malformed(format!("{} in '{}'", what, self.src))
    }

    fn or_expr(&mut self) -> Result<Value> {
        let mut lhs = self.and_expr()?;
        while self.peek() == Some(Token::Or) {
            self.bump();
            let rhs = self.and_expr()?;
            lhs = Value::Bool(lhs.as_bool() || rhs.as_bool());
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Value> {
        let mut lhs = self.not_expr()?;
        while self.peek() == Some(Token::And) {
            self.bump();
            let rhs = self.not_expr()?;
            lhs = Value::Bool(lhs.as_bool() && rhs.as_bool());
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Value> {
        if self.peek() == Some(Token::Not) {
            self.bump();
            return Ok(Value::Bool(!self.not_expr()?.as_bool()));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Value> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            Some(
                t @ (Token::Lt | Token::Gt | Token::Le | Token::Ge | Token::EqEq | Token::Ne),
            ) => t,
            _ => return Ok(lhs),
        };
        self.bump();
        let rhs = self.additive()?;
        let result = match (op, lhs, rhs) {
            (Token::EqEq, Value::Bool(a), Value::Bool(b)) => a == b,
            (Token::Ne, Value::Bool(a), Value::Bool(b)) => a != b,
            (op, lhs, rhs) => {
                let (a, b) = (lhs.as_f64(), rhs.as_f64());
                match op {
                    Token::Lt => a < b,
                    Token::Gt => a > b,
                    Token::Le => a <= b,
                    Token::Ge => a >= b,
                    Token::EqEq => a == b,
                    _ => a != b,
                }
            }
        };
        Ok(Value::Bool(result))
    }

    fn additive(&mut self) -> Result<Value> {
        let first = self.multiplicative()?;
        let mut lhs = first.as_f64();
        let mut seen = false;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.bump();
                    lhs += self.multiplicative()?.as_f64();
                }
                Some(Token::Minus) => {
                    self.bump();
                    lhs -= self.multiplicative()?.as_f64();
                }
                _ => break,
            }
            seen = true;
        }
        // Booleans pass through untouched when no arithmetic happened
        Ok(if seen { Value::Number(lhs) } else { first })
    }

    fn multiplicative(&mut self) -> Result<Value> {
        let first = self.unary()?;
        let mut lhs = first.as_f64();
        let mut seen = false;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.bump();
                    lhs *= self.unary()?.as_f64();
                }
                Some(Token::Slash) => {
                    self.bump();
                    let rhs = self.unary()?.as_f64();
                    if rhs == 0.0 {
                        return Err(self.error("division by zero"));
                    }
                    lhs /= rhs;
                }
                _ => break,
            }
            seen = true;
        }
        Ok(if seen { Value::Number(lhs) } else { first })
    }

    fn unary(&mut self) -> Result<Value> {
        match self.peek() {
            Some(Token::Minus) => {
                self.bump();
                Ok(Value::Number(-self.unary()?.as_f64()))
            }
            Some(Token::Plus) => {
                self.bump();
                Ok(Value::Number(self.unary()?.as_f64()))
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Value> {
        match self.bump() {
            Some(Token::Num(n)) => Ok(Value::Number(n)),
            Some(Token::Bool(b)) => Ok(Value::Bool(b)),
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.error("missing ')'")),
                }
            }
            Some(_) => Err(self.error("unexpected operator")),
            None => Err(self.error("unexpected end of expression")),
        }
    }
}

/// Evaluate a literal expression to whatever value it produces.
pub fn evaluate(expr: &str) -> Result<Value> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err(SimError::malformed("empty expression"));
    }
    let mut parser = Parser {
        src: expr,
        tokens,
        pos: 0,
    };
    let value = parser.or_expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error("trailing tokens"));
    }
    Ok(value)
}

/// Evaluate a literal arithmetic expression to a number.
pub fn evaluate_arithmetic(expr: &str) -> Result<f64> {
    match evaluate(expr)? {
        Value::Number(n) if n.is_finite() => Ok(n),
        Value::Number(n) => Err(SimError::malformed(format!(
            "'{}' does not evaluate to a finite number ({})",
            expr, n
        ))),
        Value::Bool(_) => Err(SimError::malformed(format!(
            "expected a number, got a condition: '{}'",
            expr
        ))),
    }
}

/// Evaluate a literal predicate to a boolean.
pub fn evaluate_boolean(expr: &str) -> Result<bool> {
    match evaluate(expr)? {
        Value::Bool(b) => Ok(b),
        Value::Number(_) => Err(SimError::malformed(format!(
            "expected a condition, got a number: '{}'",
            expr
        ))),
    }
}
