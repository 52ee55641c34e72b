//! Abstract Syntax Tree types

use crate::lexer::Span;
use chartwell_core::{keys, ConfigMap, ConfigValue, FieldMap};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// AST TYPES
// ============================================================================

/// The root AST node. Statements and comments are kept in separate lists,
/// each in source order; a comment's `line` places it among the statements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DslDocument {
    pub statements: Vec<Assignment>,
    pub comments: Vec<Comment>,
}

/// A single `path: value;` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Dotted property path segments (`options.scales.y` -> 3 segments).
    pub path: Vec<String>,
    pub value: ValueNode,
    pub span: Span,
}

impl Assignment {
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: String,
    pub line: usize,
}

/// Right-hand side of an assignment, before conversion to a [`ConfigValue`].
#[derive(Debug, Clone, PartialEq)]
pub enum ValueNode {
    String(String),
    Number(f64),
    Boolean(bool),
    /// Bare word taken literally (`type: bar;`).
    Identifier(String),
    /// `$name`, kept verbatim for the resolver.
    Variable(String),
    /// `$.a.b[0]` data-extraction path.
    JsonPath(String),
    /// `name(arg, ...)` with string/number arguments only.
    Call { name: String, args: Vec<ValueNode> },
    /// Raw `${...}` body.
    Interpolation(String),
}

impl ValueNode {
    /// Convert into a schema value. Interpolations are compiled into
    /// callbacks; one that fails to compile is kept as its raw text.
    pub fn to_config_value(&self) -> ConfigValue {
        match self {
            ValueNode::String(s)
            | ValueNode::Identifier(s)
            | ValueNode::Variable(s)
            | ValueNode::JsonPath(s) => ConfigValue::String(s.clone()),
            ValueNode::Number(n) => ConfigValue::Number(*n),
            ValueNode::Boolean(b) => ConfigValue::Bool(*b),
            ValueNode::Call { name, args } => ConfigValue::Call(chartwell_core::FunctionCall::new(
                name.clone(),
                args.iter().map(ValueNode::to_config_value).collect(),
            )),
            ValueNode::Interpolation(expr) => match crate::expr::compile(expr) {
                Ok(callback) => ConfigValue::Deferred(callback),
                Err(e) => {
                    tracing::debug!(expression = %expr, error = %e, "Keeping uncompilable interpolation as text");
                    ConfigValue::String(expr.clone())
                }
            },
        }
    }
}

/// Reserved top-level keys copied out of the parsed config for the resolver.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaMetadata {
    pub extends: Option<String>,
    pub source: Option<ConfigValue>,
    pub map: Option<FieldMap>,
}

impl SchemaMetadata {
    pub fn from_config(config: &ConfigMap) -> Self {
        Self {
            extends: config
                .get(keys::EXTENDS)
                .and_then(ConfigValue::as_str)
                .map(str::to_string),
            source: config.get(keys::SOURCE).cloned(),
            map: config.get(keys::MAP).and_then(field_map),
        }
    }
}

/// Flatten a `map` object into a target-path -> source-path table.
///
/// Nested objects become dotted target paths; non-string leaves are dropped.
pub fn field_map(value: &ConfigValue) -> Option<FieldMap> {
    fn walk(prefix: &str, map: &ConfigMap, out: &mut FieldMap) {
        for (key, value) in map {
            let target = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };
            match value {
                ConfigValue::String(path) => {
                    out.insert(target, path.clone());
                }
                ConfigValue::Object(inner) => walk(&target, inner, out),
                _ => {}
            }
        }
    }

    let object = value.as_object()?;
    let mut out = FieldMap::new();
    walk("", object, &mut out);
    Some(out)
}

// ============================================================================
// PARSE RESULT AND ERRORS
// ============================================================================

/// Stable parse error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParseErrorCode {
    ExpectedProperty,
    ExpectedColon,
    ExpectedValue,
    ExpectedSemicolon,
    TokenLimit,
}

impl ParseErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseErrorCode::ExpectedProperty => "EXPECTED_PROPERTY",
            ParseErrorCode::ExpectedColon => "EXPECTED_COLON",
            ParseErrorCode::ExpectedValue => "EXPECTED_VALUE",
            ParseErrorCode::ExpectedSemicolon => "EXPECTED_SEMICOLON",
            ParseErrorCode::TokenLimit => "TOKEN_LIMIT",
        }
    }
}

/// Parse error with location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub code: ParseErrorCode,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parse error at line {}, column {} [{}]: {}",
            self.line,
            self.column,
            self.code.as_str(),
            self.message
        )
    }
}

impl std::error::Error for ParseError {}

/// Everything a parse produces. Always returned, even when `errors` is not
/// empty.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub ast: DslDocument,
    pub config: ConfigMap,
    pub metadata: SchemaMetadata,
    pub errors: Vec<ParseError>,
}

impl ParseResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}
