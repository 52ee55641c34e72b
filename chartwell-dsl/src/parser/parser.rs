//! Parser implementation
//!
//! Grammar:
//!
//! ```text
//! document   := (statement | comment)*
//! statement  := path ':' value ';'
//! path       := IDENT ('.' IDENT)*
//! value      := IDENT '(' arg* ')' | IDENT | STRING | NUMBER | BOOLEAN
//!             | VARIABLE ('.' IDENT)* | INTERPOLATION
//! ```
//!
//! Errors are collected per statement and parsing resumes after the next `;`.

use super::ast::*;
use crate::lexer::*;
use chartwell_core::{insert_path, ConfigMap};

// ============================================================================
// PARSER
// ============================================================================

/// Parser for the chart DSL.
pub struct Parser {
    pub(crate) tokens: Vec<Token>,
    pub(crate) pos: usize,
    comments: Vec<Comment>,
    errors: Vec<ParseError>,
}

impl Parser {
    /// Create a new parser from a vector of tokens.
    ///
    /// Comment tokens are set aside so they may appear anywhere.
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut comments = Vec::new();
        let mut statement_tokens = Vec::with_capacity(tokens.len());
        for token in tokens {
            match token.kind {
                TokenKind::Comment(text) => comments.push(Comment {
                    text,
                    line: token.span.line,
                }),
                _ => statement_tokens.push(token),
            }
        }
        if statement_tokens.last().map(|t| &t.kind) != Some(&TokenKind::Eof) {
            statement_tokens.push(Token {
                kind: TokenKind::Eof,
                text: String::new(),
                span: Span::default(),
            });
        }

        Self {
            tokens: statement_tokens,
            pos: 0,
            comments,
            errors: Vec::new(),
        }
    }

    /// Parse every statement, collecting errors along the way.
    pub fn parse(mut self) -> (DslDocument, Vec<ParseError>) {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            match self.parse_assignment() {
                Ok(assignment) => statements.push(assignment),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize();
                }
            }
        }

        let document = DslDocument {
            statements,
            comments: self.comments,
        };
        (document, self.errors)
    }

    fn parse_assignment(&mut self) -> Result<Assignment, ParseError> {
        let span = self.current().span;
        let path = self.parse_path()?;

        if !self.check(&TokenKind::Colon) {
            return Err(self.error(
                ParseErrorCode::ExpectedColon,
                &format!("Expected ':' after '{}'", path.join(".")),
            ));
        }
        self.advance();

        let value = self.parse_value()?;

        if self.check(&TokenKind::Semicolon) {
            self.advance();
        } else if !self.is_at_end() {
            // Keep the assignment; the next statement starts here.
            let err = self.error(
                ParseErrorCode::ExpectedSemicolon,
                &format!("Expected ';' after value of '{}'", path.join(".")),
            );
            self.errors.push(err);
        }

        Ok(Assignment { path, value, span })
    }

    fn parse_path(&mut self) -> Result<Vec<String>, ParseError> {
        let mut path = vec![self.expect_identifier()?];
        while self.check(&TokenKind::Dot) {
            self.advance();
            path.push(self.expect_identifier()?);
        }
        Ok(path)
    }

    fn parse_value(&mut self) -> Result<ValueNode, ParseError> {
        let kind = self.current().kind.clone();
        match kind {
            TokenKind::Identifier(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    self.advance();
                    Ok(ValueNode::Call {
                        name,
                        args: self.parse_call_args(),
                    })
                } else {
                    Ok(ValueNode::Identifier(name))
                }
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(ValueNode::String(s))
            }
            TokenKind::Number(n) => {
                self.advance();
                Ok(ValueNode::Number(n))
            }
            TokenKind::Boolean(b) => {
                self.advance();
                Ok(ValueNode::Boolean(b))
            }
            TokenKind::Variable(text) => {
                self.advance();
                if self.check(&TokenKind::Dot) {
                    Ok(ValueNode::JsonPath(self.extend_json_path(text)))
                } else {
                    Ok(ValueNode::Variable(text))
                }
            }
            TokenKind::Interpolation(expr) => {
                self.advance();
                Ok(ValueNode::Interpolation(expr))
            }
            _ => Err(self.error(
                ParseErrorCode::ExpectedValue,
                &format!("Expected value but found {}", self.current()),
            )),
        }
    }

    /// Greedily append `.segment` pairs to a path root.
    fn extend_json_path(&mut self, root: String) -> String {
        let mut path = root;
        while self.check(&TokenKind::Dot) {
            let Some(TokenKind::Identifier(segment)) = self.peek_kind(1).cloned() else {
                break;
            };
            self.advance();
            self.advance();
            path.push('.');
            path.push_str(&segment);
        }
        path
    }

    /// Arguments up to the closing `)`. Anything other than a string or
    /// number is skipped. Stops without consuming at `;` or end of input.
    fn parse_call_args(&mut self) -> Vec<ValueNode> {
        let mut args = Vec::new();
        loop {
            match &self.current().kind {
                TokenKind::RParen => {
                    self.advance();
                    break;
                }
                TokenKind::Semicolon | TokenKind::Eof => break,
                TokenKind::String(s) => args.push(ValueNode::String(s.clone())),
                TokenKind::Number(n) => args.push(ValueNode::Number(*n)),
                _ => {}
            }
            self.advance();
        }
        args
    }

    /// Skip past the next `;` (or to end of input).
    fn synchronize(&mut self) {
        while !self.is_at_end() {
            let was_semicolon = self.check(&TokenKind::Semicolon);
            self.advance();
            if was_semicolon {
                break;
            }
        }
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    pub(crate) fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    pub(crate) fn peek_kind(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    pub(crate) fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    pub(crate) fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::Identifier(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => Err(self.error(
                ParseErrorCode::ExpectedProperty,
                &format!("Expected property name but found {}", self.current()),
            )),
        }
    }

    pub(crate) fn error(&self, code: ParseErrorCode, msg: &str) -> ParseError {
        let span = self.current().span;
        ParseError {
            message: msg.to_string(),
            line: span.line,
            column: span.column,
            code,
        }
    }
}

// ============================================================================
// CONVENIENCE FUNCTIONS
// ============================================================================

/// Parse DSL text with the default token cap.
pub fn parse(source: &str) -> ParseResult {
    parse_with_limit(source, DEFAULT_TOKEN_LIMIT)
}

/// Parse DSL text, capping the lexer at `token_limit` tokens.
///
/// Never fails: errors are reported in [`ParseResult::errors`] next to
/// whatever could be parsed.
pub fn parse_with_limit(source: &str, token_limit: usize) -> ParseResult {
    let mut lexer = Lexer::new(source).with_token_limit(token_limit);
    let tokens = lexer.tokenize();
    let truncated = lexer.was_truncated();
    let end = tokens.last().map(|t| t.span).unwrap_or_default();

    let (ast, mut errors) = Parser::new(tokens).parse();
    if truncated {
        errors.push(ParseError {
            message: format!("Input exceeds the limit of {} tokens", token_limit),
            line: end.line,
            column: end.column,
            code: ParseErrorCode::TokenLimit,
        });
    }

    let config = build_config(&ast);
    let metadata = SchemaMetadata::from_config(&config);

    ParseResult {
        ast,
        config,
        metadata,
        errors,
    }
}

/// Fold statements into a nested map; later statements win.
pub fn build_config(document: &DslDocument) -> ConfigMap {
    let mut config = ConfigMap::new();
    for statement in &document.statements {
        insert_path(&mut config, &statement.path, statement.value.to_config_value());
    }
    config
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use chartwell_core::{lookup_path, ConfigValue};
    use proptest::prelude::*;

    fn arb_ident() -> impl Strategy<Value = String> {
        "[a-z][a-zA-Z0-9_]{0,8}".prop_filter("not a boolean keyword", |s| {
            s != "true" && s != "false"
        })
    }

    fn arb_literal() -> impl Strategy<Value = (String, ConfigValue)> {
        prop_oneof![
            "[a-zA-Z0-9 ,.!?-]{0,20}"
                .prop_map(|s| (format!("\"{}\"", s), ConfigValue::String(s))),
            (0u32..1_000_000).prop_map(|n| (n.to_string(), ConfigValue::Number(n as f64))),
            any::<bool>().prop_map(|b| (b.to_string(), ConfigValue::Bool(b))),
            arb_ident().prop_map(|s| (s.clone(), ConfigValue::String(s))),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A single `path: literal;` statement puts the literal at the path.
        #[test]
        fn prop_single_statement_value_at_path(
            segments in prop::collection::vec(arb_ident(), 1..4),
            (text, expected) in arb_literal(),
        ) {
            let path = segments.join(".");
            let result = parse(&format!("{}: {};", path, text));
            prop_assert!(result.is_ok(), "{:?}", result.errors);
            prop_assert_eq!(lookup_path(&result.config, &path), Some(&expected));
        }

        /// Arbitrary input never panics and always yields a result.
        #[test]
        fn prop_parse_never_panics(source in any::<String>()) {
            let result = parse(&source);
            prop_assert!(result.ast.statements.len() <= DEFAULT_TOKEN_LIMIT);
        }
    }
}
