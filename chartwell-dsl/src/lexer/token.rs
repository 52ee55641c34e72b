//! Lexer token types

use std::fmt;

// ============================================================================
// LEXER TYPES
// ============================================================================

/// Token kinds for the chart DSL.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Property name or bare word. May carry a trailing `[n]` index.
    Identifier(String),

    // Punctuation
    Colon,
    Semicolon,
    Dot,
    LParen,
    RParen,

    // Literals
    String(String),
    Number(f64),
    Boolean(bool),

    /// `$name`, or a bare `$` when it is the root of a data path.
    Variable(String),
    /// Raw expression text between `${` and the matching `}`.
    Interpolation(String),

    /// Comment text without the leading `#` or `//`.
    Comment(String),

    Eof,
}

impl TokenKind {
    /// Short description used in parse error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Identifier(_) => "identifier",
            TokenKind::Colon => "':'",
            TokenKind::Semicolon => "';'",
            TokenKind::Dot => "'.'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::String(_) => "string",
            TokenKind::Number(_) => "number",
            TokenKind::Boolean(_) => "boolean",
            TokenKind::Variable(_) => "variable",
            TokenKind::Interpolation(_) => "interpolation",
            TokenKind::Comment(_) => "comment",
            TokenKind::Eof => "end of input",
        }
    }
}

/// Source location span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Default for Span {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 1,
            column: 1,
        }
    }
}

/// A token with its kind, raw source text and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn line(&self) -> usize {
        self.span.line
    }

    pub fn column(&self) -> usize {
        self.span.column
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::Eof => write!(f, "end of input"),
            kind => write!(f, "{} '{}'", kind.describe(), self.text),
        }
    }
}
