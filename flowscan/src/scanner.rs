//! High-level scan entry point: build the call graph, run the patterns,
//! filter and package the findings.

use crate::config::Config;
use crate::error::EngineError;
use crate::graph::{BuildOptions, BuildStats, CallGraph, CancelToken, GraphBuilder};
use crate::patterns::{match_patterns, PatternSet, Report, Severity};
use std::path::{Path, PathBuf};

/// Everything a scan produces.
#[derive(Debug)]
pub struct ScanOutcome {
    /// Findings with severity counts.
    pub report: Report,
    /// The call graph, including taint summaries computed during matching.
    pub graph: CallGraph,
    /// Build diagnostics.
    pub stats: BuildStats,
}

/// Scanner options, assembled from configuration and CLI flags.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Worker override (environment variable still wins).
    pub max_workers: Option<usize>,
    /// Extra directories to skip.
    pub exclude_folders: Vec<String>,
    /// Pattern file; the compiled-in set when absent.
    pub patterns_file: Option<PathBuf>,
    /// Drop findings below this severity.
    pub min_severity: Option<Severity>,
}

impl ScanOptions {
    /// Merges file configuration under these options (options win).
    #[must_use]
    pub fn overlaid_on(mut self, config: &Config) -> Self {
        if self.max_workers.is_none() {
            self.max_workers = config.flowscan.max_workers;
        }
        if let Some(folders) = &config.flowscan.exclude_folders {
            self.exclude_folders.extend(folders.iter().cloned());
        }
        if self.patterns_file.is_none() {
            self.patterns_file = config.flowscan.patterns_file.clone();
        }
        if self.min_severity.is_none() {
            self.min_severity = config
                .flowscan
                .min_severity
                .as_deref()
                .and_then(|s| s.parse().ok());
        }
        self
    }
}

/// The scanner. One instance can run several scans; each gets a fresh call
/// graph but shares the cancellation token.
#[derive(Debug, Default)]
pub struct Scanner {
    options: ScanOptions,
    cancel: CancelToken,
}

impl Scanner {
    /// Scanner with the given options.
    #[must_use]
    pub fn new(options: ScanOptions) -> Self {
        Self {
            options,
            cancel: CancelToken::new(),
        }
    }

    /// Token cancelling in-flight scans.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Scans `root`: builds the graph and matches the pattern set.
    pub fn scan(&self, root: &Path) -> Result<ScanOutcome, EngineError> {
        let patterns = match &self.options.patterns_file {
            Some(path) => PatternSet::from_path(path)?,
            None => PatternSet::load_default()?,
        };

        let builder = GraphBuilder::with_options(
            root,
            BuildOptions {
                max_workers: self.options.max_workers,
                extra_excludes: self.options.exclude_folders.clone(),
                orm_patterns: patterns.orm_patterns.clone(),
            },
        )
        .with_cancel(self.cancel.clone());

        let built = builder.build()?;
        let mut graph = built.graph;
        let mut findings = match_patterns(&mut graph, &patterns);
        if let Some(floor) = self.options.min_severity {
            findings.retain(|finding| finding.severity.rank() >= floor.rank());
        }

        Ok(ScanOutcome {
            report: Report::from_findings(findings),
            graph,
            stats: built.stats,
        })
    }
}
