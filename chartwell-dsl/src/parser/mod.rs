//! Parser module for the chart DSL

pub mod ast;
pub mod parser;

pub use ast::*;
pub use parser::*;
