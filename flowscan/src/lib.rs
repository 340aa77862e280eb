//! Core library for the flowscan static taint-flow scanner.
//!
//! The pipeline: index a Python project's modules, resolve imports and call
//! sites into a whole-program call graph, run intra-procedural taint
//! analysis over def-use chains, and match data-driven security patterns to
//! produce CWE/OWASP-classified findings.

#![allow(
    clippy::type_complexity,
    clippy::too_many_arguments,
    clippy::similar_names,
    clippy::map_unwrap_or
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

/// Catalogs of names the project does not define: builtins, frameworks,
/// and the standard library.
pub mod catalog;

/// Command-line interface definition.
pub mod cli;

/// Project configuration loading.
pub mod config;

/// Def-use chains and intra-procedural taint analysis.
pub mod dataflow;

/// Typed error taxonomy.
pub mod error;

/// Per-file extraction passes: statements, calls, return types,
/// assignments, class attributes.
pub mod extract;

/// The whole-program call graph and its builder.
pub mod graph;

/// Per-file import maps and the shared cache.
pub mod imports;

/// Type inference for method-call resolution.
pub mod infer;

/// Console and JSON rendering.
pub mod output;

/// Syntax-tree facade over the Python parser.
pub mod parser;

/// Security patterns and the match engine.
pub mod patterns;

/// Module registry over the project tree.
pub mod registry;

/// High-level scan entry point.
pub mod scanner;

/// Shared utilities (line index, path helpers).
pub mod utils;

pub use error::EngineError;
pub use graph::{BuildStats, CallGraph, CancelToken, GraphBuilder};
pub use patterns::{Finding, PatternSet, Report, Severity};
pub use scanner::{ScanOptions, ScanOutcome, Scanner};
