//! pyinfer: whole-program type inference for Python
//!
//! Every source file under a root is loaded and interpreted abstractly over
//! a lattice of types. The result is a table of typed bindings, the
//! references to them, and per-file diagnostics for unresolved names,
//! unused variables and unparsable files.

pub mod analysis;
pub mod cache;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod fs;
pub mod parser;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::analysis::{Analyzer, Type};
    pub use crate::config::AnalyzerConfig;
    pub use crate::diagnostics::{Diagnostic, Severity, Span};
    pub use crate::fs::{FileSystem, MemoryFileSystem, OsFileSystem};
}
