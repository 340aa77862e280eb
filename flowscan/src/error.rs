//! Error taxonomy for the analysis engine.
//!
//! Fatal errors abort the whole build; everything else degrades per file and
//! is reported through the log.

use std::path::PathBuf;

/// Errors surfaced by the engine. Per-file parse and extraction failures are
/// not represented here: they are logged and the file is skipped.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The project root could not be read at all.
    #[error("failed to read project root {root}: {source}")]
    ProjectRoot {
        /// The root that was requested.
        root: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The cancellation token was triggered mid-build. No partial call graph
    /// is returned.
    #[error("build cancelled")]
    Cancelled,

    /// Every file in a non-empty project failed to parse, so no worker
    /// produced anything usable.
    #[error("all {file_count} files failed to parse; no call graph produced")]
    AllWorkersFailed {
        /// Number of files that were attempted.
        file_count: usize,
    },

    /// A pattern file could not be loaded or deserialized.
    #[error("invalid pattern file {file}: {message}")]
    PatternLoad {
        /// Path of the offending file (or `<builtin>`).
        file: String,
        /// Deserialization or I/O detail.
        message: String,
    },

    /// A configuration file existed but could not be parsed.
    #[error("invalid configuration {file}: {message}")]
    ConfigLoad {
        /// Path of the offending file.
        file: PathBuf,
        /// Deserialization detail.
        message: String,
    },

    /// Generic I/O failure outside the per-file best-effort paths.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_root_path() {
        let err = EngineError::ProjectRoot {
            root: PathBuf::from("/does/not/exist"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.to_string().contains("/does/not/exist"));
    }

    #[test]
    fn cancelled_is_terse() {
        assert_eq!(EngineError::Cancelled.to_string(), "build cancelled");
    }
}
