//! The whole-program call graph.
//!
//! Every cross-entity relation is an FQN-keyed map; nothing holds pointers
//! into anything else, so cyclic call structures cost nothing. Ordered maps
//! keep iteration deterministic for downstream pattern matching.

mod builder;
mod resolve;

pub use builder::{BuildOptions, BuildStats, BuiltGraph, CancelToken, GraphBuilder, PassTiming};
pub use resolve::{FailureReason, Resolution};

use crate::dataflow::TaintSummary;
use crate::infer::TypeInfo;
use petgraph::graph::DiGraph;
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// A source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// File containing the element.
    pub file: PathBuf,
    /// 1-indexed line.
    pub line: usize,
    /// 0-indexed column.
    pub col: usize,
}

/// Metadata for one indexed function or method.
#[derive(Debug, Clone)]
pub struct FunctionMetadata {
    /// Dotted module path.
    pub module: String,
    /// Defining file.
    pub file: PathBuf,
    /// Bare function name.
    pub name: String,
    /// Enclosing class name (dotted for nested classes), when a method.
    pub class_name: Option<String>,
    /// First line of the definition.
    pub start_line: usize,
    /// Last line of the definition.
    pub end_line: usize,
    /// Source text of the definition.
    pub source: String,
    /// Method heuristic: first parameter `self`/`cls`, or lexically inside
    /// a class body.
    pub is_method: bool,
    /// `async def`.
    pub is_async: bool,
    /// Carries at least one decorator.
    pub has_decorators: bool,
}

impl FunctionMetadata {
    /// `module.name` or `module.Class.name`.
    #[must_use]
    pub fn fqn(&self) -> String {
        match &self.class_name {
            Some(class) => format!("{}.{class}.{}", self.module, self.name),
            None => format!("{}.{}", self.module, self.name),
        }
    }
}

/// One call expression, resolved or not.
#[derive(Debug, Clone)]
pub struct CallSite {
    /// FQN of the enclosing function.
    pub caller_fqn: String,
    /// Dotted target text as written.
    pub target_name: String,
    /// Receiver text, empty for bare calls.
    pub object_name: String,
    /// Where the call happens.
    pub location: Location,
    /// Positional argument snippets.
    pub arguments: Vec<String>,
    /// True when the target resolved to an FQN.
    pub resolved: bool,
    /// The resolved FQN; also set as a best candidate on some failures.
    pub target_fqn: String,
    /// Categorized reason when unresolved.
    pub resolution_failure: Option<FailureReason>,
    /// Receiver type when resolution went through inference.
    pub inferred_type: Option<TypeInfo>,
}

/// The finished call graph.
#[derive(Debug, Default)]
pub struct CallGraph {
    /// FQN -> metadata for every indexed function.
    pub functions: BTreeMap<String, FunctionMetadata>,
    /// Class FQN -> method FQNs.
    pub classes: BTreeMap<String, Vec<String>>,
    /// Forward edges: caller FQN -> callee FQNs.
    pub edges: BTreeMap<String, BTreeSet<String>>,
    /// Reverse edges: callee FQN -> caller FQNs.
    pub reverse_edges: BTreeMap<String, BTreeSet<String>>,
    /// Caller FQN -> its call sites in textual order.
    pub call_sites: BTreeMap<String, Vec<CallSite>>,
    /// Taint summaries, filled in by pattern matching.
    pub summaries: BTreeMap<String, TaintSummary>,
}

impl CallGraph {
    /// Empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes a function.
    pub fn add_function(&mut self, meta: FunctionMetadata) {
        self.functions.insert(meta.fqn(), meta);
    }

    /// Indexes a class with its method FQNs.
    pub fn add_class(&mut self, class_fqn: String, methods: Vec<String>) {
        self.classes.insert(class_fqn, methods);
    }

    /// True when `fqn` is an indexed function.
    #[must_use]
    pub fn contains_function(&self, fqn: &str) -> bool {
        self.functions.contains_key(fqn)
    }

    /// Adds one directed edge, keeping forward and reverse sets in sync.
    /// Multiplicity collapses; self-edges are allowed.
    pub fn add_edge(&mut self, caller: &str, callee: &str) {
        self.edges
            .entry(caller.to_owned())
            .or_default()
            .insert(callee.to_owned());
        self.reverse_edges
            .entry(callee.to_owned())
            .or_default()
            .insert(caller.to_owned());
    }

    /// Appends a call-site record.
    pub fn add_call_site(&mut self, site: CallSite) {
        self.call_sites
            .entry(site.caller_fqn.clone())
            .or_default()
            .push(site);
    }

    /// Callees of `fqn` (empty when none).
    #[must_use]
    pub fn callees(&self, fqn: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(fqn)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Callers of `fqn` (empty when none).
    #[must_use]
    pub fn callers(&self, fqn: &str) -> impl Iterator<Item = &str> {
        self.reverse_edges
            .get(fqn)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Total number of directed edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// All call sites across all callers, caller-ordered.
    pub fn all_call_sites(&self) -> impl Iterator<Item = &CallSite> {
        self.call_sites.values().flatten()
    }

    /// Depth-first path from `from` to `to` over forward edges, visiting
    /// children in set (sorted) order. `Some(vec![from])` when `from == to`.
    #[must_use]
    pub fn find_path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        if from == to {
            return Some(vec![from.to_owned()]);
        }
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut path: Vec<&str> = Vec::new();
        if self.dfs(from, to, &mut visited, &mut path) {
            let mut full: Vec<String> = vec![from.to_owned()];
            full.extend(path.iter().map(|s| (*s).to_owned()));
            Some(full)
        } else {
            None
        }
    }

    fn dfs<'a>(
        &'a self,
        current: &'a str,
        to: &str,
        visited: &mut BTreeSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> bool {
        if !visited.insert(current) {
            return false;
        }
        let Some(next) = self.edges.get(current) else {
            return false;
        };
        for callee in next {
            if callee == to {
                path.push(callee);
                return true;
            }
            path.push(callee);
            if self.dfs(callee, to, visited, path) {
                return true;
            }
            path.pop();
        }
        false
    }

    /// Cycles in the graph: strongly connected components with more than one
    /// node, plus self-loops.
    #[must_use]
    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        let mut indices: FxHashMap<&str, petgraph::graph::NodeIndex> = FxHashMap::default();
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        for (caller, callees) in &self.edges {
            let from = *indices
                .entry(caller.as_str())
                .or_insert_with(|| graph.add_node(caller.as_str()));
            for callee in callees {
                let to = *indices
                    .entry(callee.as_str())
                    .or_insert_with(|| graph.add_node(callee.as_str()));
                graph.add_edge(from, to, ());
            }
        }
        petgraph::algo::tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || scc.first().is_some_and(|&n| graph.contains_edge(n, n))
            })
            .map(|scc| scc.into_iter().map(|n| graph[n].to_owned()).collect())
            .collect()
    }
}
