//! Front end for the analysed Python subset
//!
//! This module provides:
//! - Lexer (tokenization with indentation tracking)
//! - Parser (AST construction)
//! - AST definitions
//! - Span tracking
//!
//! The analyzer only sees the [`SourceParser`] trait, so another front end
//! can be substituted without touching the inference engine.

pub mod ast;
pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;
pub mod span;

pub use ast::*;
pub use lexer::{tokenize, Lexer, Token, TokenKind};
pub use parser::Parser;
pub use span::SourceFile;

use crate::diagnostics::DiagnosticBag;
use std::path::Path;

/// Turns source text into a syntax tree
pub trait SourceParser {
    /// Parse `source`, attributing spans to `path`
    fn parse(&self, source: &str, path: &Path) -> Result<Module, DiagnosticBag>;
}

/// The bundled recursive descent parser
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonParser;

impl SourceParser for PythonParser {
    fn parse(&self, source: &str, path: &Path) -> Result<Module, DiagnosticBag> {
        parse_source(source, path)
    }
}

/// Parse source code into an AST
pub fn parse_source(source: &str, path: &Path) -> Result<Module, DiagnosticBag> {
    let source_file = SourceFile::new(path.to_path_buf(), source.to_string());
    let tokens = tokenize(&source_file)?;
    let mut parser = Parser::new(tokens, &source_file);
    parser.parse_module()
}

#[cfg(test)]
mod tests;
