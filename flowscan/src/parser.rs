//! Syntax-tree facade over the ruff Python parser.
//!
//! The rest of the engine consumes parsed files through this module: a
//! [`ParsedModule`] bundles the typed tree with its source text and a
//! byte-offset/line index so downstream passes never touch parser internals
//! directly.

use crate::utils::LineIndex;
use ruff_python_ast::ModModule;
use ruff_text_size::{Ranged, TextRange};
use std::path::Path;

/// A parse failure for a single file. Per-file failures are non-fatal: the
/// file contributes nothing and the build continues.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// File that failed to parse.
    pub file: std::path::PathBuf,
    /// Parser diagnostic.
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.file.display(), self.message)
    }
}

impl std::error::Error for ParseError {}

/// A parsed Python module plus the accessors the engine needs: line/column
/// mapping and snippet extraction.
#[derive(Debug)]
pub struct ParsedModule {
    /// The typed syntax tree.
    pub module: ModModule,
    /// Original source text.
    pub source: String,
    /// Byte-offset to line mapping.
    pub line_index: LineIndex,
}

impl ParsedModule {
    /// 1-indexed line of a node.
    #[must_use]
    pub fn line_of(&self, node: &impl Ranged) -> usize {
        self.line_index.line_of(node.range().start())
    }

    /// 1-indexed last line of a node.
    #[must_use]
    pub fn end_line_of(&self, node: &impl Ranged) -> usize {
        self.line_index.line_of(node.range().end())
    }

    /// 0-indexed column of a node's start.
    #[must_use]
    pub fn col_of(&self, node: &impl Ranged) -> usize {
        self.line_index.col_of(node.range().start())
    }

    /// Source text covered by a range.
    #[must_use]
    pub fn snippet(&self, range: TextRange) -> &str {
        &self.source[range.start().to_usize()..range.end().to_usize()]
    }
}

/// Parses a Python source string into a [`ParsedModule`].
pub fn parse_source(source: &str, file: &Path) -> Result<ParsedModule, ParseError> {
    match ruff_python_parser::parse_module(source) {
        Ok(parsed) => Ok(ParsedModule {
            module: parsed.into_syntax(),
            source: source.to_owned(),
            line_index: LineIndex::new(source),
        }),
        Err(err) => Err(ParseError {
            file: file.to_path_buf(),
            message: err.to_string(),
        }),
    }
}

/// Reads and parses a file from disk. I/O errors are folded into the same
/// per-file [`ParseError`] since both are handled identically (skip + log).
pub fn parse_file(file: &Path) -> Result<ParsedModule, ParseError> {
    let source = std::fs::read_to_string(file).map_err(|err| ParseError {
        file: file.to_path_buf(),
        message: err.to_string(),
    })?;
    parse_source(&source, file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_module() {
        let parsed = parse_source("def f():\n    pass\n", Path::new("a.py")).unwrap();
        assert_eq!(parsed.module.body.len(), 1);
        assert_eq!(parsed.line_index.line_count(), 3);
    }

    #[test]
    fn reports_syntax_errors_with_file() {
        let err = parse_source("def f(:\n", Path::new("bad.py")).unwrap_err();
        assert!(err.to_string().contains("bad.py"));
    }

    #[test]
    fn snippet_covers_node_range() {
        let parsed = parse_source("x = foo(1)\n", Path::new("a.py")).unwrap();
        let stmt = &parsed.module.body[0];
        assert_eq!(parsed.snippet(stmt.range()), "x = foo(1)");
        assert_eq!(parsed.line_of(stmt), 1);
    }
}
