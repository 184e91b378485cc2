//! Diagnostic reporting for pyinfer
//!
//! This module provides structured problem reporting with stable codes,
//! source spans, and machine-readable JSON output. Parse errors and the
//! analyzer's semantic findings (unresolved names, unused bindings) are both
//! expressed as [`Diagnostic`]s.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod error_codes;
pub use error_codes::*;

/// Prefix of the synthetic file name used for library (built-in) locations
pub const LIBRARY_PREFIX: &str = "<library>/";

/// A source location span
///
/// Spans double as node identity: two syntax nodes are the same node when
/// they come from the same file and cover the same byte range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    /// Source file path
    pub file: PathBuf,

    /// Start byte offset (0-indexed)
    pub start: usize,

    /// End byte offset (0-indexed, exclusive)
    pub end: usize,

    /// Start line (1-indexed)
    pub start_line: usize,

    /// Start column (1-indexed)
    pub start_col: usize,

    /// End line (1-indexed)
    pub end_line: usize,

    /// End column (1-indexed)
    pub end_col: usize,
}

impl Span {
    /// Create a new span
    pub fn new(
        file: PathBuf,
        start: usize,
        end: usize,
        start_line: usize,
        start_col: usize,
        end_line: usize,
        end_col: usize,
    ) -> Self {
        Self {
            file,
            start,
            end,
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Create a span for an entire file
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: path.into(),
            start: 0,
            end: 0,
            start_line: 1,
            start_col: 1,
            end_line: 1,
            end_col: 1,
        }
    }

    /// Create a synthetic span naming a library definition, e.g. `os.path.join`
    pub fn library(qname: &str) -> Self {
        Self::file(format!("{}{}", LIBRARY_PREFIX, qname))
    }

    /// True for spans that do not point into a real source file
    pub fn is_synthetic(&self) -> bool {
        self.file.to_string_lossy().starts_with(LIBRARY_PREFIX)
    }

    /// True if this span lies in the given file
    pub fn in_file(&self, path: &Path) -> bool {
        self.file == path
    }

    /// Merge two spans into one that covers both
    pub fn merge(&self, other: &Span) -> Span {
        Span {
            file: self.file.clone(),
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            start_line: self.start_line.min(other.start_line),
            start_col: if self.start_line <= other.start_line {
                self.start_col
            } else {
                other.start_col
            },
            end_line: self.end_line.max(other.end_line),
            end_col: if self.end_line >= other.end_line {
                self.end_col
            } else {
                other.end_col
            },
        }
    }
}

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// An additional note attached to a diagnostic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Note message
    pub message: String,

    /// Optional span for the note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl Note {
    /// Create a new note with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
        }
    }

    /// Attach a span to this note
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

/// A diagnostic produced while parsing or analyzing a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable code (e.g., "E1002")
    pub code: String,

    /// Severity level
    pub severity: Severity,

    /// Primary message
    pub message: String,

    /// Primary source span
    pub span: Span,

    /// Additional notes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<Note>,
}

impl Diagnostic {
    /// Create a new error diagnostic
    pub fn error(code: impl Into<String>) -> DiagnosticBuilder {
        DiagnosticBuilder::new(code.into(), Severity::Error)
    }

    /// Create a new warning diagnostic
    pub fn warning(code: impl Into<String>) -> DiagnosticBuilder {
        DiagnosticBuilder::new(code.into(), Severity::Warning)
    }

    /// Create a new info diagnostic
    pub fn info(code: impl Into<String>) -> DiagnosticBuilder {
        DiagnosticBuilder::new(code.into(), Severity::Info)
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }

    /// Format as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Format as human-readable string
    pub fn to_human_readable(&self, source: &str) -> String {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };

        let mut output = format!(
            "{}[{}]: {}\n  --> {}:{}:{}\n",
            severity,
            self.code,
            self.message,
            self.span.file.display(),
            self.span.start_line,
            self.span.start_col
        );

        // Show source context
        let lines: Vec<&str> = source.lines().collect();
        if self.span.start_line > 0 && self.span.start_line <= lines.len() {
            let line = lines[self.span.start_line - 1];
            output.push_str(&format!(
                "   |\n{:>3} | {}\n   |",
                self.span.start_line, line
            ));

            let underline_start = self.span.start_col.saturating_sub(1);
            let underline_len = if self.span.end_line == self.span.start_line {
                self.span.end_col.saturating_sub(self.span.start_col).max(1)
            } else {
                line.len().saturating_sub(underline_start).max(1)
            };

            output.push_str(&format!(
                " {}{}\n",
                " ".repeat(underline_start),
                "^".repeat(underline_len)
            ));
        }

        for note in &self.notes {
            output.push_str(&format!("   = note: {}\n", note.message));
        }

        output
    }
}

/// Builder for constructing diagnostics
#[derive(Debug)]
pub struct DiagnosticBuilder {
    code: String,
    severity: Severity,
    message: String,
    span: Option<Span>,
    notes: Vec<Note>,
}

impl DiagnosticBuilder {
    fn new(code: String, severity: Severity) -> Self {
        Self {
            code,
            severity,
            message: String::new(),
            span: None,
            notes: Vec::new(),
        }
    }

    /// Set the message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Set the primary span
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Add a note
    pub fn note(mut self, note: Note) -> Self {
        self.notes.push(note);
        self
    }

    /// Build the diagnostic
    pub fn build(self) -> Diagnostic {
        Diagnostic {
            code: self.code,
            severity: self.severity,
            message: self.message,
            span: self.span.unwrap_or_else(|| Span::file("")),
            notes: self.notes,
        }
    }
}

/// A collection of diagnostics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    /// Create a new empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }

    /// Count warnings
    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d.severity, Severity::Warning))
            .count()
    }

    /// Count errors
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    /// Get all diagnostics
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Take all diagnostics
    pub fn take(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Merge another bag into this one
    pub fn merge(&mut self, other: DiagnosticBag) {
        self.diagnostics.extend(other.diagnostics);
    }

    /// Get the number of diagnostics
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Check if the bag is empty
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Format all diagnostics as JSON
    pub fn to_json(&self) -> String {
        let json_array: Vec<String> = self.diagnostics.iter().map(|d| d.to_json()).collect();
        format!("[{}]", json_array.join(","))
    }

    /// Format all diagnostics as human-readable text
    pub fn format_text(&self, source: &str) -> String {
        self.diagnostics
            .iter()
            .map(|d| d.to_human_readable(source))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl From<Diagnostic> for DiagnosticBag {
    fn from(diagnostic: Diagnostic) -> Self {
        let mut bag = DiagnosticBag::new();
        bag.push(diagnostic);
        bag
    }
}
