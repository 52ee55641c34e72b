//! CHARTWELL DSL - Chart Schema Language
//!
//! Parses the line-oriented chart DSL into a config tree, resolves schema
//! inheritance against a registry, substitutes theme variables and
//! validates the result.
//!
//! Architecture:
//! ```text
//! DSL Source (`path: value;` statements)
//!     ↓
//! Lexer (token stream, capped)
//!     ↓
//! Parser (AST + ConfigMap + metadata, errors collected)
//!     ↓
//! Resolver (extends chain, deep merge, $variables, ${...} callbacks)
//!     ↓
//! Validator (chart type, source, field map)
//!     ↓
//! Pretty Printer (ConfigMap → DSL, for round-trip testing)
//! ```

pub mod expr;
pub mod lexer;
pub mod parser;
pub mod pretty_printer;
pub mod registry;
pub mod resolver;
pub mod validator;

// Re-export key types for convenience
pub use expr::{compile, ExprError};
pub use lexer::{tokenize, Lexer, Span, Token, TokenKind, DEFAULT_TOKEN_LIMIT};
pub use parser::{
    build_config, parse, parse_with_limit, Assignment, DslDocument, ParseError, ParseErrorCode,
    ParseResult, Parser, SchemaMetadata, ValueNode,
};
pub use pretty_printer::to_dsl;
pub use registry::SchemaRegistry;
pub use resolver::{
    deep_merge, resolve, resolve_named, ResolutionError, ResolutionErrorCode, ResolvedConfig,
    SchemaResolver,
};
pub use validator::{validate_response, validate_schema, ValidationIssue, SUPPORTED_CHART_TYPES};
