//! Finding output types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Severity levels for findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Immediate exploitation risk.
    Critical,
    /// Significant security risk.
    High,
    /// Potential security risk.
    Medium,
    /// Minor security concern.
    Low,
}

impl Severity {
    /// Rank for threshold filtering; higher is more severe.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Severity::Critical => 4,
            Severity::High => 3,
            Severity::Medium => 2,
            Severity::Low => 1,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "CRITICAL"),
            Severity::High => write!(f, "HIGH"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::Low => write!(f, "LOW"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// One end of a reported flow.
#[derive(Debug, Clone, Serialize)]
pub struct FlowEndpoint {
    /// FQN of the enclosing function.
    pub fqn: String,
    /// The call as written (`input`, `os.system`).
    pub call_name: String,
    /// File containing the call.
    pub file: PathBuf,
    /// 1-indexed line.
    pub line: usize,
    /// Trimmed source line.
    pub code_snippet: String,
}

/// A reported vulnerability.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    /// Severity from the pattern.
    pub severity: Severity,
    /// Pattern id (`CMD-INJECTION-001`).
    pub pattern_id: String,
    /// Pattern display name.
    pub pattern_name: String,
    /// What the pattern detects.
    pub description: String,
    /// CWE identifier.
    pub cwe: String,
    /// OWASP category.
    pub owasp: String,
    /// Where untrusted data enters.
    pub source: FlowEndpoint,
    /// Where it lands.
    pub sink: FlowEndpoint,
    /// Function FQNs along the flow.
    pub path: Vec<String>,
    /// True when source and sink share a function.
    pub intra_procedural: bool,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

/// All findings of a scan, with summary counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    /// Findings in deterministic engine order.
    pub findings: Vec<Finding>,
    /// Count per severity label.
    pub severity_counts: BTreeMap<String, usize>,
}

impl Report {
    /// Builds the report and its counts.
    #[must_use]
    pub fn from_findings(findings: Vec<Finding>) -> Self {
        let mut severity_counts: BTreeMap<String, usize> = BTreeMap::new();
        for finding in &findings {
            *severity_counts
                .entry(finding.severity.to_string())
                .or_default() += 1;
        }
        Self {
            findings,
            severity_counts,
        }
    }

    /// Number of findings at or above `floor`.
    #[must_use]
    pub fn count_at_least(&self, floor: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity.rank() >= floor.rank())
            .count()
    }
}
