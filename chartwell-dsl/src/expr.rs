//! Interpolation expressions
//!
//! `${...}` values are compiled once into a [`Callback`] that takes the caller's
//! props object, bound to the name `params` (alias `props`). The language is a
//! small, side-effect free subset of familiar expression syntax:
//!
//! ```text
//! params.title                     member access
//! params["series"][0]              index access
//! params.prefix + " sales"         concatenation when either side is a string
//! params.total / params.count      arithmetic: + - * / %
//! params.count > 10 && !params.off comparison and logic
//! params.dark ? "#000" : "#fff"    conditional
//! ```

use chartwell_core::{Callback, EvalError};
use serde_json::{Number, Value};
use std::sync::Arc;
use thiserror::Error;

/// Names the props object is bound to inside an expression.
pub const PARAMS_BINDINGS: &[&str] = &["params", "props"];

/// Longest expression body accepted by [`parse_expression`], in bytes.
pub const MAX_EXPRESSION_LEN: usize = 1024;

/// Deepest nesting of parentheses, brackets, ternaries and unary operators.
pub const MAX_EXPRESSION_DEPTH: usize = 64;

/// Expression compile error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid expression at offset {offset}: {message}")]
pub struct ExprError {
    pub message: String,
    pub offset: usize,
}

// ============================================================================
// AST
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Params,
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// Compile `${...}` body text into a callback.
pub fn compile(source: &str) -> Result<Callback, ExprError> {
    let expr = Arc::new(parse_expression(source)?);
    Ok(Callback::new(source, move |params| expr.eval(params)))
}

/// Parse expression text into an [`Expr`].
pub fn parse_expression(source: &str) -> Result<Expr, ExprError> {
    if source.len() > MAX_EXPRESSION_LEN {
        return Err(ExprError {
            message: format!("expression longer than {} bytes", MAX_EXPRESSION_LEN),
            offset: MAX_EXPRESSION_LEN,
        });
    }
    let tokens = ExprLexer::new(source).tokenize()?;
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.conditional()?;
    match parser.current() {
        (Tok::End, _) => Ok(expr),
        (tok, offset) => Err(ExprError {
            message: format!("unexpected {}", tok.describe()),
            offset: *offset,
        }),
    }
}

// ============================================================================
// TOKENIZER
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Number(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Question,
    Colon,
    End,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::Number(n) => format!("number {}", n),
            Tok::Str(s) => format!("string \"{}\"", s),
            Tok::Ident(s) => format!("identifier '{}'", s),
            Tok::Op(op) => format!("operator '{}'", op),
            Tok::LParen => "'('".to_string(),
            Tok::RParen => "')'".to_string(),
            Tok::LBracket => "'['".to_string(),
            Tok::RBracket => "']'".to_string(),
            Tok::Dot => "'.'".to_string(),
            Tok::Question => "'?'".to_string(),
            Tok::Colon => "':'".to_string(),
            Tok::End => "end of expression".to_string(),
        }
    }
}

struct ExprLexer<'a> {
    source: &'a str,
    pos: usize,
}

const MULTI_CHAR_OPS: &[(&str, &str)] = &[
    ("===", "=="),
    ("!==", "!="),
    ("==", "=="),
    ("!=", "!="),
    ("<=", "<="),
    (">=", ">="),
    ("&&", "&&"),
    ("||", "||"),
];

impl<'a> ExprLexer<'a> {
    fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> ExprError {
        ExprError {
            message: message.into(),
            offset: self.pos,
        }
    }

    fn tokenize(mut self) -> Result<Vec<(Tok, usize)>, ExprError> {
        let mut tokens = Vec::new();
        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.bump();
            }
            let start = self.pos;
            let Some(c) = self.peek() else {
                tokens.push((Tok::End, start));
                return Ok(tokens);
            };

            if let Some((text, op)) = MULTI_CHAR_OPS
                .iter()
                .find(|(text, _)| self.rest().starts_with(text))
            {
                self.pos += text.len();
                tokens.push((Tok::Op(*op), start));
                continue;
            }

            let tok = match c {
                '0'..='9' => self.number()?,
                '"' | '\'' => self.string(c)?,
                c if c.is_ascii_alphabetic() || c == '_' || c == '$' => self.ident(),
                _ => {
                    self.bump();
                    match c {
                        '+' => Tok::Op("+"),
                        '-' => Tok::Op("-"),
                        '*' => Tok::Op("*"),
                        '/' => Tok::Op("/"),
                        '%' => Tok::Op("%"),
                        '!' => Tok::Op("!"),
                        '<' => Tok::Op("<"),
                        '>' => Tok::Op(">"),
                        '(' => Tok::LParen,
                        ')' => Tok::RParen,
                        '[' => Tok::LBracket,
                        ']' => Tok::RBracket,
                        '.' => Tok::Dot,
                        '?' => Tok::Question,
                        ':' => Tok::Colon,
                        other => {
                            self.pos = start;
                            return Err(self.error(format!("unexpected character '{}'", other)));
                        }
                    }
                }
            };
            tokens.push((tok, start));
        }
    }

    fn number(&mut self) -> Result<Tok, ExprError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        let mut lookahead = self.rest().chars();
        if lookahead.next() == Some('.') && lookahead.next().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        self.source[start..self.pos]
            .parse::<f64>()
            .map(Tok::Number)
            .map_err(|e| self.error(e.to_string()))
    }

    fn string(&mut self, quote: char) -> Result<Tok, ExprError> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(Tok::Str(value)),
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some(c) => value.push(c),
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn ident(&mut self) -> Tok {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        {
            self.bump();
        }
        Tok::Ident(self.source[start..self.pos].to_string())
    }
}

// ============================================================================
// PARSER
// ============================================================================

struct ExprParser {
    tokens: Vec<(Tok, usize)>,
    pos: usize,
    depth: usize,
}

impl ExprParser {
    fn current(&self) -> &(Tok, usize) {
        // tokenize() always terminates the list with End
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn check(&self, tok: &Tok) -> bool {
        &self.current().0 == tok
    }

    fn check_op(&self, op: &str) -> bool {
        matches!(&self.current().0, Tok::Op(o) if *o == op)
    }

    fn expect(&mut self, tok: Tok) -> Result<(), ExprError> {
        if self.check(&tok) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {} but found {}",
                tok.describe(),
                self.current().0.describe()
            )))
        }
    }

    fn error(&self, message: impl Into<String>) -> ExprError {
        ExprError {
            message: message.into(),
            offset: self.current().1,
        }
    }

    /// Run `parse` one nesting level deeper, failing past the depth cap.
    fn nested(
        &mut self,
        parse: fn(&mut Self) -> Result<Expr, ExprError>,
    ) -> Result<Expr, ExprError> {
        if self.depth >= MAX_EXPRESSION_DEPTH {
            return Err(self.error(format!(
                "expression nested deeper than {} levels",
                MAX_EXPRESSION_DEPTH
            )));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn conditional(&mut self) -> Result<Expr, ExprError> {
        self.nested(Self::ternary)
    }

    fn ternary(&mut self) -> Result<Expr, ExprError> {
        let condition = self.or()?;
        if !self.check(&Tok::Question) {
            return Ok(condition);
        }
        self.advance();
        let then = self.conditional()?;
        self.expect(Tok::Colon)?;
        let otherwise = self.conditional()?;
        Ok(Expr::Conditional(
            Box::new(condition),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    fn or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.and()?;
        while self.check_op("||") {
            self.advance();
            let right = self.and()?;
            left = Expr::Logical(LogicalOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.equality()?;
        while self.check_op("&&") {
            self.advance();
            let right = self.equality()?;
            left = Expr::Logical(LogicalOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn binary_level(
        &mut self,
        ops: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, ExprError>,
    ) -> Result<Expr, ExprError> {
        let mut left = next(self)?;
        'outer: loop {
            for (text, op) in ops {
                if self.check_op(text) {
                    self.advance();
                    let right = next(self)?;
                    left = Expr::Binary(*op, Box::new(left), Box::new(right));
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn equality(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&[("==", BinaryOp::Eq), ("!=", BinaryOp::Ne)], Self::comparison)
    }

    fn comparison(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(
            &[
                ("<=", BinaryOp::Le),
                (">=", BinaryOp::Ge),
                ("<", BinaryOp::Lt),
                (">", BinaryOp::Gt),
            ],
            Self::additive,
        )
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&[("+", BinaryOp::Add), ("-", BinaryOp::Sub)], Self::multiplicative)
    }

    fn multiplicative(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(
            &[("*", BinaryOp::Mul), ("/", BinaryOp::Div), ("%", BinaryOp::Rem)],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        let op = match &self.current().0 {
            Tok::Op("!") => Some(UnaryOp::Not),
            Tok::Op("-") => Some(UnaryOp::Neg),
            Tok::Op("+") => Some(UnaryOp::Plus),
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                Ok(Expr::Unary(op, Box::new(self.nested(Self::unary)?)))
            }
            None => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.primary()?;
        loop {
            let tok = self.current().0.clone();
            match tok {
                Tok::Dot => {
                    self.advance();
                    match self.current().0.clone() {
                        Tok::Ident(name) => {
                            self.advance();
                            expr = Expr::Member(Box::new(expr), name);
                        }
                        other => {
                            return Err(self.error(format!(
                                "expected property name but found {}",
                                other.describe()
                            )))
                        }
                    }
                }
                Tok::LBracket => {
                    self.advance();
                    let index = self.conditional()?;
                    self.expect(Tok::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let (tok, _) = self.current().clone();
        match tok {
            Tok::Number(n) => {
                self.advance();
                Ok(Expr::Literal(number_value(n).unwrap_or(Value::Null)))
            }
            Tok::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Value::String(s)))
            }
            Tok::Ident(name) => {
                let expr = match name.as_str() {
                    "true" => Expr::Literal(Value::Bool(true)),
                    "false" => Expr::Literal(Value::Bool(false)),
                    "null" | "undefined" => Expr::Literal(Value::Null),
                    n if PARAMS_BINDINGS.contains(&n) => Expr::Params,
                    other => return Err(self.error(format!("unknown identifier '{}'", other))),
                };
                self.advance();
                Ok(expr)
            }
            Tok::LParen => {
                self.advance();
                let inner = self.conditional()?;
                self.expect(Tok::RParen)?;
                Ok(inner)
            }
            other => Err(self.error(format!("unexpected {}", other.describe()))),
        }
    }
}

// ============================================================================
// EVALUATION
// ============================================================================

impl Expr {
    /// Evaluate against the props object.
    pub fn eval(&self, params: &Value) -> Result<Value, EvalError> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Params => Ok(params.clone()),
            Expr::Member(target, name) => {
                let target = target.eval(params)?;
                member(&target, name)
            }
            Expr::Index(target, index) => {
                let target = target.eval(params)?;
                let index = index.eval(params)?;
                match &index {
                    Value::String(key) => member(&target, key),
                    Value::Number(n) => match (&target, n.as_f64()) {
                        (Value::Array(items), Some(i)) if i >= 0.0 && i.fract() == 0.0 => {
                            Ok(items.get(i as usize).cloned().unwrap_or(Value::Null))
                        }
                        _ => member(&target, &display(&index)),
                    },
                    other => Err(EvalError::new(format!(
                        "cannot index with {}",
                        type_name(other)
                    ))),
                }
            }
            Expr::Unary(op, operand) => {
                let value = operand.eval(params)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!truthy(&value))),
                    UnaryOp::Neg => numeric(-as_number(&value, "-")?),
                    UnaryOp::Plus => numeric(as_number(&value, "+")?),
                }
            }
            Expr::Binary(op, left, right) => {
                let left = left.eval(params)?;
                let right = right.eval(params)?;
                binary(*op, &left, &right)
            }
            Expr::Logical(op, left, right) => {
                let left = left.eval(params)?;
                match (op, truthy(&left)) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                    _ => right.eval(params),
                }
            }
            Expr::Conditional(condition, then, otherwise) => {
                if truthy(&condition.eval(params)?) {
                    then.eval(params)
                } else {
                    otherwise.eval(params)
                }
            }
        }
    }
}

fn member(target: &Value, name: &str) -> Result<Value, EvalError> {
    match target {
        Value::Object(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
        Value::Array(items) if name == "length" => Ok(Value::from(items.len())),
        Value::String(s) if name == "length" => Ok(Value::from(s.chars().count())),
        Value::Null => Err(EvalError::new(format!(
            "cannot read property '{}' of null",
            name
        ))),
        _ => Ok(Value::Null),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Add => match (left, right) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Ok(Value::String(format!("{}{}", display(left), display(right))))
            }
            _ => numeric(as_number(left, "+")? + as_number(right, "+")?),
        },
        BinaryOp::Sub => numeric(as_number(left, "-")? - as_number(right, "-")?),
        BinaryOp::Mul => numeric(as_number(left, "*")? * as_number(right, "*")?),
        BinaryOp::Div => numeric(as_number(left, "/")? / as_number(right, "/")?),
        BinaryOp::Rem => numeric(as_number(left, "%")? % as_number(right, "%")?),
        BinaryOp::Eq => Ok(Value::Bool(loose_eq(left, right))),
        BinaryOp::Ne => Ok(Value::Bool(!loose_eq(left, right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (left, right) {
                (Value::String(a), Value::String(b)) => a.partial_cmp(b),
                _ => as_number(left, "comparison")?.partial_cmp(&as_number(right, "comparison")?),
            };
            let result = match ordering {
                None => false,
                Some(ord) => match op {
                    BinaryOp::Lt => ord.is_lt(),
                    BinaryOp::Le => ord.is_le(),
                    BinaryOp::Gt => ord.is_gt(),
                    _ => ord.is_ge(),
                },
            };
            Ok(Value::Bool(result))
        }
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn as_number(value: &Value, op: &str) -> Result<f64, EvalError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| EvalError::new("number out of range")),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => Err(EvalError::new(format!(
            "operator '{}' expects a number, got {}",
            op,
            type_name(other)
        ))),
    }
}

fn numeric(n: f64) -> Result<Value, EvalError> {
    number_value(n).ok_or_else(|| EvalError::new(format!("non-finite result {}", n)))
}

fn number_value(n: f64) -> Option<Value> {
    if !n.is_finite() {
        return None;
    }
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        Some(Value::Number(Number::from(n as i64)))
    } else {
        Number::from_f64(n).map(Value::Number)
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
