//! Security patterns and the match engine.
//!
//! Patterns are data: a TOML file names each pattern's sources, sinks,
//! sanitizers, and classification. A default set ships inside the binary;
//! projects can point the engine at their own file.

mod engine;
mod findings;

pub use engine::{match_patterns, MatchEngine};
pub use findings::{Finding, FlowEndpoint, Report, Severity};

use crate::error::EngineError;
use serde::Deserialize;
use std::path::Path;

/// The default pattern set compiled into the binary.
const DEFAULT_PATTERNS: &str = include_str!("../../patterns.toml");

/// How a pattern is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternKind {
    /// A source call site reaching a sink call site through the call graph.
    SourceSink,
    /// Like `SourceSink`, but suppressed when a sanitizer intervenes;
    /// same-function pairs are confirmed by taint analysis.
    MissingSanitizer,
    /// Any resolved call of a listed function.
    DangerousFunction,
}

/// One security pattern.
#[derive(Debug, Clone, Deserialize)]
pub struct Pattern {
    /// Stable identifier (`CMD-INJECTION-001`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// What the pattern detects.
    #[serde(default)]
    pub description: String,
    /// Evaluation kind.
    pub kind: PatternKind,
    /// Severity of resulting findings.
    pub severity: Severity,
    /// Source names.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Sink names.
    #[serde(default)]
    pub sinks: Vec<String>,
    /// Sanitizer names.
    #[serde(default)]
    pub sanitizers: Vec<String>,
    /// Dangerous-function names (for `DangerousFunction` patterns).
    #[serde(default)]
    pub dangerous: Vec<String>,
    /// CWE identifier.
    #[serde(default)]
    pub cwe: String,
    /// OWASP category.
    #[serde(default)]
    pub owasp: String,
}

/// A loaded pattern file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatternSet {
    /// ORM call shapes consulted during call-site resolution.
    #[serde(default)]
    pub orm_patterns: Vec<String>,
    /// The patterns, in file order.
    #[serde(default)]
    pub patterns: Vec<Pattern>,
}

impl PatternSet {
    /// The compiled-in default set.
    pub fn load_default() -> Result<Self, EngineError> {
        Self::from_toml(DEFAULT_PATTERNS, "<builtin>")
    }

    /// Loads a pattern file from disk.
    pub fn from_path(path: &Path) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path).map_err(|err| EngineError::PatternLoad {
            file: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::from_toml(&text, &path.display().to_string())
    }

    /// Parses TOML pattern text.
    pub fn from_toml(text: &str, origin: &str) -> Result<Self, EngineError> {
        let set: PatternSet = toml::from_str(text).map_err(|err| EngineError::PatternLoad {
            file: origin.to_owned(),
            message: err.to_string(),
        })?;
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_parses_and_covers_the_classics() {
        let set = PatternSet::load_default().unwrap();
        assert!(!set.patterns.is_empty());
        assert!(!set.orm_patterns.is_empty());

        let ids: Vec<&str> = set.patterns.iter().map(|p| p.id.as_str()).collect();
        assert!(ids.iter().any(|id| id.contains("CMD-INJECTION")));
        assert!(ids.iter().any(|id| id.contains("CODE-INJECTION")));
        assert!(ids.iter().any(|id| id.contains("SQL-INJECTION")));

        for pattern in &set.patterns {
            assert!(!pattern.id.is_empty());
            match pattern.kind {
                PatternKind::DangerousFunction => assert!(!pattern.dangerous.is_empty()),
                _ => assert!(!pattern.sources.is_empty() && !pattern.sinks.is_empty()),
            }
        }
    }

    #[test]
    fn bad_toml_is_a_pattern_load_error() {
        let err = PatternSet::from_toml("patterns = 3", "test").unwrap_err();
        assert!(matches!(err, EngineError::PatternLoad { .. }));
    }
}
