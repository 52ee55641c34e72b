//! Lexer module for the chart DSL

pub mod token;
pub mod scanner;

pub use token::*;
pub use scanner::*;
