//! Utilities shared across the engine.

mod paths;

pub use paths::{module_path_for_file, normalize_display_path, DEFAULT_SKIP_DIRS};

use ruff_text_size::TextSize;

/// A utility struct to convert byte offsets to line numbers.
///
/// The AST parser works with byte offsets, but findings are reported with
/// line numbers which are more human-readable.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Stores the byte index of the start of each line.
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Creates a new `LineIndex` by scanning the source code for newlines.
    /// Uses byte iteration since '\n' is always a single byte in UTF-8.
    #[must_use]
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, byte) in source.as_bytes().iter().enumerate() {
            if *byte == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// Converts a `TextSize` (byte offset) to a 1-indexed line number.
    #[must_use]
    pub fn line_of(&self, offset: TextSize) -> usize {
        let offset = offset.to_usize();
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line + 1,
            Err(line) => line,
        }
    }

    /// Converts a `TextSize` to a 0-indexed column within its line.
    #[must_use]
    pub fn col_of(&self, offset: TextSize) -> usize {
        let offset = offset.to_usize();
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line - 1,
        };
        offset - self.line_starts[line]
    }

    /// Number of lines in the indexed source.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// Returns the 1-indexed `line` of `source`, trimmed, or an empty string when
/// out of range. Used for code snippets in findings.
#[must_use]
pub fn line_text(source: &str, line: usize) -> &str {
    source
        .lines()
        .nth(line.saturating_sub(1))
        .map(str::trim)
        .unwrap_or_default()
}
