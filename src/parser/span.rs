//! Source text with line tables for span construction

use crate::diagnostics::Span;
use std::path::{Path, PathBuf};

/// A source file with its content and line information
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    content: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    /// Create a new source file
    pub fn new(path: PathBuf, content: String) -> Self {
        let line_starts = std::iter::once(0)
            .chain(content.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        Self {
            path,
            content,
            line_starts,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Span covering the byte range `start..end`
    pub fn span(&self, start: usize, end: usize) -> Span {
        let (start_line, start_col) = self.line_col(start);
        let (end_line, end_col) = self.line_col(end);
        Span::new(
            self.path.clone(),
            start,
            end,
            start_line,
            start_col,
            end_line,
            end_col,
        )
    }

    /// Empty span at the end of the text
    pub fn eof_span(&self) -> Span {
        let len = self.content.len();
        self.span(len, len)
    }

    /// Convert a byte offset to line and column (1-indexed)
    fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let line_start = self.line_starts.get(line).copied().unwrap_or(0);
        (line + 1, offset.saturating_sub(line_start) + 1)
    }

    /// Get a line by number (1-indexed), without its terminator
    pub fn get_line(&self, line: usize) -> Option<&str> {
        if line == 0 || line > self.line_starts.len() {
            return None;
        }
        let start = self.line_starts[line - 1];
        let end = self
            .line_starts
            .get(line)
            .map(|&e| e.saturating_sub(1))
            .unwrap_or(self.content.len());
        Some(self.content[start..end].trim_end_matches('\r'))
    }
}

#[cfg(test)]
#[path = "span_tests.rs"]
mod tests;
