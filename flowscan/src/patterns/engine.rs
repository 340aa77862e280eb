//! Pattern matching over the finished call graph.
//!
//! Dangerous-function patterns flag resolved call sites directly.
//! Source-sink and missing-sanitizer patterns pair source and sink call
//! sites by enclosing function: same-function pairs run taint analysis on
//! demand, cross-function pairs search the call graph for a connecting
//! path. All pairings iterate in caller-FQN order, so repeated runs produce
//! identical findings.

use super::findings::{Finding, FlowEndpoint};
use super::{Pattern, PatternKind, PatternSet};
use crate::dataflow::{analyze_taint, name_matches, NameLists, TaintSummary};
use crate::extract::lower_function;
use crate::graph::{CallGraph, CallSite, FunctionMetadata};
use crate::parser::{parse_file, ParsedModule};
use crate::utils::line_text;
use ruff_python_ast::{self as ast, Stmt};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Confidence assigned to cross-function structural findings; there is no
/// taint evidence, only a call-graph path.
const INTER_PROCEDURAL_CONFIDENCE: f64 = 0.6;
/// Confidence of same-function source/sink co-location without taint
/// confirmation (plain source-sink patterns).
const INTRA_STRUCTURAL_CONFIDENCE: f64 = 0.7;
/// Confidence of a dangerous-function hit on a resolved call.
const DANGEROUS_CONFIDENCE: f64 = 0.8;

/// Runs every pattern in `set` against `graph`. Taint summaries computed on
/// demand are stored back into `graph.summaries`.
pub fn match_patterns(graph: &mut CallGraph, set: &PatternSet) -> Vec<Finding> {
    MatchEngine::new().run(graph, set)
}

/// The engine; holds a parse cache for the files it revisits.
#[derive(Default)]
pub struct MatchEngine {
    /// File -> parsed module; `None` caches a parse failure.
    parse_cache: FxHashMap<PathBuf, Option<Arc<ParsedModule>>>,
}

impl MatchEngine {
    /// Fresh engine with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches all patterns, in file order.
    pub fn run(&mut self, graph: &mut CallGraph, set: &PatternSet) -> Vec<Finding> {
        let mut findings = Vec::new();
        for pattern in &set.patterns {
            match pattern.kind {
                PatternKind::DangerousFunction => {
                    self.dangerous_findings(graph, pattern, &mut findings);
                }
                PatternKind::SourceSink => {
                    self.flow_findings(graph, pattern, false, &mut findings);
                }
                PatternKind::MissingSanitizer => {
                    self.flow_findings(graph, pattern, true, &mut findings);
                }
            }
        }
        findings
    }

    /// Every resolved call of a listed dangerous function is a finding.
    fn dangerous_findings(
        &mut self,
        graph: &CallGraph,
        pattern: &Pattern,
        findings: &mut Vec<Finding>,
    ) {
        let sites: Vec<&CallSite> = graph
            .all_call_sites()
            .filter(|site| site.resolved && matches_lists(site, &pattern.dangerous))
            .collect();
        for site in sites {
            let endpoint = self.endpoint_for_site(site);
            findings.push(Finding {
                severity: pattern.severity,
                pattern_id: pattern.id.clone(),
                pattern_name: pattern.name.clone(),
                description: pattern.description.clone(),
                cwe: pattern.cwe.clone(),
                owasp: pattern.owasp.clone(),
                source: endpoint.clone(),
                sink: endpoint,
                path: vec![site.caller_fqn.clone()],
                intra_procedural: true,
                confidence: DANGEROUS_CONFIDENCE,
            });
        }
    }

    /// Source/sink pairing for `SourceSink` and `MissingSanitizer` kinds.
    fn flow_findings(
        &mut self,
        graph: &mut CallGraph,
        pattern: &Pattern,
        require_sanitizer_check: bool,
        findings: &mut Vec<Finding>,
    ) {
        let source_fns = enclosing_functions(graph, &pattern.sources);
        if source_fns.is_empty() {
            return;
        }
        let sink_fns = enclosing_functions(graph, &pattern.sinks);
        if sink_fns.is_empty() {
            return;
        }
        let sanitizer_fns: BTreeSet<String> = enclosing_functions(graph, &pattern.sanitizers)
            .into_iter()
            .map(|(fqn, _)| fqn)
            .collect();

        for (source_fqn, source_site) in &source_fns {
            for (sink_fqn, sink_site) in &sink_fns {
                if source_fqn == sink_fqn {
                    if require_sanitizer_check {
                        self.taint_confirmed_finding(
                            graph,
                            pattern,
                            source_fqn,
                            findings,
                        );
                    } else {
                        findings.push(self.structural_finding(
                            pattern,
                            source_site,
                            sink_site,
                            vec![source_fqn.clone()],
                            true,
                            INTRA_STRUCTURAL_CONFIDENCE,
                        ));
                    }
                    continue;
                }

                let Some(path) = find_flow_path(graph, source_fqn, sink_fqn) else {
                    continue;
                };
                if require_sanitizer_check {
                    if path.len() < 2 {
                        continue;
                    }
                    if path.iter().any(|fqn| sanitizer_fns.contains(fqn)) {
                        continue;
                    }
                }
                findings.push(self.structural_finding(
                    pattern,
                    source_site,
                    sink_site,
                    path,
                    false,
                    INTER_PROCEDURAL_CONFIDENCE,
                ));
            }
        }
    }

    /// Same-function missing-sanitizer pair: confirmed by taint analysis.
    /// The computed summary lands in `graph.summaries`.
    fn taint_confirmed_finding(
        &mut self,
        graph: &mut CallGraph,
        pattern: &Pattern,
        function_fqn: &str,
        findings: &mut Vec<Finding>,
    ) {
        let Some(meta) = graph.functions.get(function_fqn).cloned() else {
            return;
        };
        let summary = self.taint_for(&meta, pattern);
        let detection = summary
            .detections
            .iter()
            .find(|d| !d.sanitized)
            .cloned();
        graph
            .summaries
            .insert(function_fqn.to_owned(), summary);

        let Some(detection) = detection else {
            return;
        };
        findings.push(Finding {
            severity: pattern.severity,
            pattern_id: pattern.id.clone(),
            pattern_name: pattern.name.clone(),
            description: pattern.description.clone(),
            cwe: pattern.cwe.clone(),
            owasp: pattern.owasp.clone(),
            source: FlowEndpoint {
                fqn: function_fqn.to_owned(),
                call_name: detection.source_call.clone(),
                file: meta.file.clone(),
                line: detection.source_line,
                code_snippet: self.snippet(&meta.file, detection.source_line),
            },
            sink: FlowEndpoint {
                fqn: function_fqn.to_owned(),
                call_name: detection.sink_call.clone(),
                file: meta.file.clone(),
                line: detection.sink_line,
                code_snippet: self.snippet(&meta.file, detection.sink_line),
            },
            path: vec![function_fqn.to_owned()],
            intra_procedural: true,
            confidence: detection.confidence,
        });
    }

    /// Taint analysis for one function; failures yield an empty summary and
    /// a warning, never an error.
    fn taint_for(&mut self, meta: &FunctionMetadata, pattern: &Pattern) -> TaintSummary {
        let fqn = meta.fqn();
        let Some(parsed) = self.parsed(&meta.file) else {
            return TaintSummary::empty(&fqn);
        };
        let Some(func) = find_function(&parsed.module.body, &meta.name, meta.start_line, &parsed)
        else {
            tracing::warn!("function {fqn} not found at line {}; empty taint summary", meta.start_line);
            return TaintSummary::empty(&fqn);
        };
        let statements = lower_function(func, &parsed.line_index);
        analyze_taint(
            &fqn,
            meta.start_line,
            meta.end_line,
            &statements,
            &NameLists {
                sources: &pattern.sources,
                sinks: &pattern.sinks,
                sanitizers: &pattern.sanitizers,
            },
        )
    }

    fn structural_finding(
        &mut self,
        pattern: &Pattern,
        source_site: &CallSite,
        sink_site: &CallSite,
        path: Vec<String>,
        intra_procedural: bool,
        confidence: f64,
    ) -> Finding {
        Finding {
            severity: pattern.severity,
            pattern_id: pattern.id.clone(),
            pattern_name: pattern.name.clone(),
            description: pattern.description.clone(),
            cwe: pattern.cwe.clone(),
            owasp: pattern.owasp.clone(),
            source: self.endpoint_for_site(source_site),
            sink: self.endpoint_for_site(sink_site),
            path,
            intra_procedural,
            confidence,
        }
    }

    fn endpoint_for_site(&mut self, site: &CallSite) -> FlowEndpoint {
        FlowEndpoint {
            fqn: site.caller_fqn.clone(),
            call_name: site.target_name.clone(),
            file: site.location.file.clone(),
            line: site.location.line,
            code_snippet: self.snippet(&site.location.file, site.location.line),
        }
    }

    fn snippet(&mut self, file: &Path, line: usize) -> String {
        self.parsed(file)
            .map(|parsed| line_text(&parsed.source, line).to_owned())
            .unwrap_or_default()
    }

    fn parsed(&mut self, file: &Path) -> Option<Arc<ParsedModule>> {
        if let Some(cached) = self.parse_cache.get(file) {
            return cached.clone();
        }
        let parsed = match parse_file(file) {
            Ok(parsed) => Some(Arc::new(parsed)),
            Err(err) => {
                tracing::warn!("pattern engine cannot re-read {err}");
                None
            }
        };
        self.parse_cache.insert(file.to_path_buf(), parsed.clone());
        parsed
    }
}

/// Matches a call site against a name list, by resolved FQN or written
/// target.
fn matches_lists(site: &CallSite, names: &[String]) -> bool {
    names.iter().any(|name| {
        (site.resolved && name_matches(&site.target_fqn, name))
            || name_matches(&site.target_name, name)
    })
}

/// Enclosing functions of all call sites matching `names`, one entry per
/// function (its first matching site), ordered by caller FQN. Sites are
/// cloned out so callers can keep mutating the graph's summaries.
fn enclosing_functions(graph: &CallGraph, names: &[String]) -> Vec<(String, CallSite)> {
    let mut out: Vec<(String, CallSite)> = Vec::new();
    for (caller, sites) in &graph.call_sites {
        let Some(site) = sites.iter().find(|site| matches_lists(site, names)) else {
            continue;
        };
        out.push((caller.clone(), site.clone()));
    }
    out
}

/// Path from `source_fn` to `sink_fn`: a directed path when one exists,
/// otherwise a join at the nearest common caller (reported as
/// `[caller, ..., source_fn, sink_fn]`).
fn find_flow_path(graph: &CallGraph, source_fn: &str, sink_fn: &str) -> Option<Vec<String>> {
    if let Some(path) = graph.find_path(source_fn, sink_fn) {
        return Some(path);
    }
    // Breadth-first over callers of the source, in sorted order per ring.
    let mut visited: BTreeSet<String> = BTreeSet::new();
    let mut ring: Vec<String> = graph.callers(source_fn).map(str::to_owned).collect();
    while !ring.is_empty() {
        let mut next_ring = Vec::new();
        for caller in ring {
            if !visited.insert(caller.clone()) {
                continue;
            }
            if let Some(to_sink) = graph.find_path(&caller, sink_fn) {
                // Join: the caller's route to the source, then its route to
                // the sink. Both legs matter to the sanitizer check.
                let mut path = graph.find_path(&caller, source_fn)?;
                path.extend(to_sink.into_iter().skip(1));
                return Some(path);
            }
            next_ring.extend(graph.callers(&caller).map(str::to_owned));
        }
        ring = next_ring;
    }
    None
}

/// Finds the function definition matching `name` at `start_line`.
fn find_function<'a>(
    stmts: &'a [Stmt],
    name: &str,
    start_line: usize,
    parsed: &ParsedModule,
) -> Option<&'a ast::StmtFunctionDef> {
    for stmt in stmts {
        match stmt {
            Stmt::FunctionDef(func) => {
                if func.name.as_str() == name && parsed.line_of(func) == start_line {
                    return Some(func);
                }
                if let Some(found) = find_function(&func.body, name, start_line, parsed) {
                    return Some(found);
                }
            }
            Stmt::ClassDef(class_def) => {
                if let Some(found) = find_function(&class_def.body, name, start_line, parsed) {
                    return Some(found);
                }
            }
            Stmt::If(if_stmt) => {
                if let Some(found) = find_function(&if_stmt.body, name, start_line, parsed) {
                    return Some(found);
                }
                for clause in &if_stmt.elif_else_clauses {
                    if let Some(found) = find_function(&clause.body, name, start_line, parsed) {
                        return Some(found);
                    }
                }
            }
            Stmt::Try(try_stmt) => {
                if let Some(found) = find_function(&try_stmt.body, name, start_line, parsed) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}
