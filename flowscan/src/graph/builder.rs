//! Call-graph construction.
//!
//! Six barriered passes: index functions, return types, assignments,
//! placeholder resolution, class attributes, call-site resolution. Within a
//! pass, files are processed in parallel as pure jobs; results merge into
//! shared tables (concurrent maps for the extraction passes, one mutex for
//! the call graph itself).

use super::resolve::{resolve_target, Resolution, ResolveCtx};
use super::{CallGraph, CallSite, FunctionMetadata, Location};
use crate::catalog::{BuiltinCatalog, FrameworkCatalog, StdlibCatalog};
use crate::error::EngineError;
use crate::extract::{
    extract_assignments, extract_calls, extract_class_attributes, extract_return_types,
    ClassAttrRegistry, ReturnTypeTable, TypeNameResolver,
};
use crate::imports::ImportMapCache;
use crate::infer::{resolve_placeholders, ScopeSet, TypeEngine};
use crate::parser::{parse_file, ParsedModule};
use crate::registry::ModuleRegistry;
use rayon::prelude::*;
use ruff_python_ast::{self as ast, Stmt};
use ruff_text_size::Ranged;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Hard ceiling on the worker pool, even with the environment override.
const MAX_WORKERS_CAP: usize = 32;
/// Environment variable overriding the worker count.
const WORKERS_ENV: &str = "FLOWSCAN_MAX_WORKERS";

/// Cooperative cancellation token. Workers finish their current file and
/// exit; a cancelled build returns an error, never a partial graph.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, untriggered token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// True once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Wall-clock timing of one pass.
#[derive(Debug, Clone)]
pub struct PassTiming {
    /// Pass name.
    pub name: &'static str,
    /// Elapsed time.
    pub duration: Duration,
}

/// Diagnostics accumulated during a build.
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    /// Files the registry found.
    pub files_total: usize,
    /// Files that parsed.
    pub files_parsed: usize,
    /// Files skipped on parse or read errors.
    pub files_failed: usize,
    /// Functions indexed.
    pub functions: usize,
    /// Classes indexed.
    pub classes: usize,
    /// Call sites recorded.
    pub call_sites: usize,
    /// Call sites that resolved.
    pub resolved_calls: usize,
    /// Call sites that did not.
    pub unresolved_calls: usize,
    /// Unresolved histogram by failure category.
    pub failure_counts: BTreeMap<String, usize>,
    /// Per-pass timings in execution order.
    pub passes: Vec<PassTiming>,
    /// Call cycles (non-trivial SCCs) in the finished graph.
    pub cycle_count: usize,
}

impl BuildStats {
    /// Resolution rate in `[0, 1]`; 1.0 for an empty project.
    #[must_use]
    pub fn resolution_rate(&self) -> f64 {
        if self.call_sites == 0 {
            1.0
        } else {
            self.resolved_calls as f64 / self.call_sites as f64
        }
    }
}

/// Options honored by the build. Only `max_workers` affects core behavior;
/// the rest parameterize the walk and the ORM shape list.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Worker override; the `FLOWSCAN_MAX_WORKERS` environment variable
    /// wins over this, and both are capped at 32.
    pub max_workers: Option<usize>,
    /// Extra directory names to skip during the walk.
    pub extra_excludes: Vec<String>,
    /// ORM call shapes, from the pattern file.
    pub orm_patterns: Vec<String>,
}

/// The finished build.
#[derive(Debug)]
pub struct BuiltGraph {
    /// The call graph.
    pub graph: CallGraph,
    /// Build diagnostics.
    pub stats: BuildStats,
    /// The module registry, kept for downstream path lookups.
    pub registry: ModuleRegistry,
}

/// Orchestrates the build passes over a project root.
pub struct GraphBuilder {
    root: PathBuf,
    options: BuildOptions,
    cancel: CancelToken,
}

/// One successfully parsed file with its module identity.
struct IndexedFile {
    module: String,
    file: PathBuf,
    parsed: Arc<ParsedModule>,
}

impl GraphBuilder {
    /// Builder over `root` with default options.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_options(root, BuildOptions::default())
    }

    /// Builder with explicit options.
    #[must_use]
    pub fn with_options(root: impl Into<PathBuf>, options: BuildOptions) -> Self {
        Self {
            root: root.into(),
            options,
            cancel: CancelToken::new(),
        }
    }

    /// Token that cancels this build when triggered.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Uses an externally owned cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Runs all passes and returns the finished graph.
    pub fn build(&self) -> Result<BuiltGraph, EngineError> {
        let registry = ModuleRegistry::scan(&self.root, &self.options.extra_excludes)?;
        let workers = worker_count(self.options.max_workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|err| std::io::Error::other(err.to_string()))?;

        tracing::debug!(
            "building call graph for {} ({} modules, {workers} workers)",
            self.root.display(),
            registry.len()
        );

        pool.install(|| self.build_inner(registry))
    }

    #[allow(clippy::too_many_lines)]
    fn build_inner(&self, registry: ModuleRegistry) -> Result<BuiltGraph, EngineError> {
        let mut stats = BuildStats::default();
        let mut graph = CallGraph::new();

        let targets: Vec<(String, PathBuf)> = registry
            .modules()
            .map(|(module, file)| (module.to_owned(), file.to_path_buf()))
            .collect();
        stats.files_total = targets.len();

        // Pass 1: parse and index functions.
        let started = Instant::now();
        let parsed_files: Vec<Option<IndexedFile>> = targets
            .par_iter()
            .map(|(module, file)| {
                if self.cancel.is_cancelled() {
                    return None;
                }
                match parse_file(file) {
                    Ok(parsed) => Some(IndexedFile {
                        module: module.clone(),
                        file: file.clone(),
                        parsed: Arc::new(parsed),
                    }),
                    Err(err) => {
                        tracing::warn!("skipping unparsable file: {err}");
                        None
                    }
                }
            })
            .collect();
        self.check_cancelled()?;

        let files: Vec<IndexedFile> = parsed_files.into_iter().flatten().collect();
        stats.files_parsed = files.len();
        stats.files_failed = stats.files_total - stats.files_parsed;
        if stats.files_total > 0 && stats.files_parsed == 0 {
            return Err(EngineError::AllWorkersFailed {
                file_count: stats.files_total,
            });
        }

        for indexed in &files {
            index_file(indexed, &mut graph);
        }
        stats.functions = graph.functions.len();
        stats.classes = graph.classes.len();
        stats.passes.push(PassTiming {
            name: "index",
            duration: started.elapsed(),
        });

        // Shared tables for the extraction passes.
        let function_index: FxHashSet<String> = graph.functions.keys().cloned().collect();
        let class_index: FxHashSet<String> = graph.classes.keys().cloned().collect();
        let builtins = BuiltinCatalog::new();
        let frameworks = FrameworkCatalog::new();
        let stdlib = StdlibCatalog::bundled();
        let import_cache = ImportMapCache::new();
        let returns = ReturnTypeTable::new();
        let scopes = ScopeSet::new();
        let class_attrs = ClassAttrRegistry::new();

        // Pass 2: return types.
        let started = Instant::now();
        files.par_iter().for_each(|indexed| {
            if self.cancel.is_cancelled() {
                return;
            }
            let imports =
                import_cache.get_or_extract(&indexed.file, &indexed.parsed, &indexed.module);
            let resolver = TypeNameResolver {
                module: &indexed.module,
                imports: &imports,
                builtins: &builtins,
                classes: &class_index,
            };
            extract_return_types(&indexed.parsed, &indexed.module, &resolver, &returns);
        });
        self.check_cancelled()?;
        stats.passes.push(PassTiming {
            name: "return_types",
            duration: started.elapsed(),
        });

        // Pass 3: variable assignments.
        let started = Instant::now();
        files.par_iter().for_each(|indexed| {
            if self.cancel.is_cancelled() {
                return;
            }
            let imports =
                import_cache.get_or_extract(&indexed.file, &indexed.parsed, &indexed.module);
            let resolver = TypeNameResolver {
                module: &indexed.module,
                imports: &imports,
                builtins: &builtins,
                classes: &class_index,
            };
            extract_assignments(&indexed.parsed, &indexed.module, &resolver, &scopes);
        });
        self.check_cancelled()?;
        stats.passes.push(PassTiming {
            name: "assignments",
            duration: started.elapsed(),
        });

        // Pass 4: placeholder resolution (single-threaded fixed point).
        let started = Instant::now();
        let demoted = resolve_placeholders(&scopes, &returns);
        if demoted > 0 {
            tracing::debug!("{demoted} bindings stayed unresolved after placeholder pass");
        }
        stats.passes.push(PassTiming {
            name: "placeholders",
            duration: started.elapsed(),
        });

        // Pass 5: class attributes.
        let started = Instant::now();
        files.par_iter().for_each(|indexed| {
            if self.cancel.is_cancelled() {
                return;
            }
            let imports =
                import_cache.get_or_extract(&indexed.file, &indexed.parsed, &indexed.module);
            let resolver = TypeNameResolver {
                module: &indexed.module,
                imports: &imports,
                builtins: &builtins,
                classes: &class_index,
            };
            extract_class_attributes(
                &indexed.parsed,
                &indexed.module,
                &resolver,
                &returns,
                &scopes,
                &class_attrs,
            );
        });
        self.check_cancelled()?;
        stats.passes.push(PassTiming {
            name: "class_attributes",
            duration: started.elapsed(),
        });

        // Pass 6: call-site resolution, merged under one mutex.
        let started = Instant::now();
        let engine = TypeEngine {
            scopes: &scopes,
            classes: &class_attrs,
            returns: &returns,
            functions: &function_index,
            class_index: &class_index,
            builtins: &builtins,
            frameworks: &frameworks,
            stdlib: &stdlib,
        };
        let shared_graph = Mutex::new(graph);
        files.par_iter().for_each(|indexed| {
            if self.cancel.is_cancelled() {
                return;
            }
            let imports =
                import_cache.get_or_extract(&indexed.file, &indexed.parsed, &indexed.module);
            let mut sites: Vec<(CallSite, Option<String>)> = Vec::new();

            for_each_function(&indexed.parsed.module.body, &mut Vec::new(), &mut |stack, func| {
                let class_fqn = (!stack.is_empty())
                    .then(|| format!("{}.{}", indexed.module, stack.join(".")));
                let caller_fqn = match &class_fqn {
                    Some(class) => format!("{class}.{}", func.name),
                    None => format!("{}.{}", indexed.module, func.name),
                };
                let ctx = ResolveCtx {
                    module: &indexed.module,
                    caller_fqn: &caller_fqn,
                    class_fqn: class_fqn.as_deref(),
                    imports: &imports,
                    engine: &engine,
                    registry: &registry,
                    orm_patterns: &self.options.orm_patterns,
                };
                for raw in extract_calls(func, &indexed.parsed) {
                    let resolution = resolve_target(&ctx, &raw.target);
                    let (site, edge_target) =
                        make_call_site(&ctx, &caller_fqn, &indexed.file, raw, resolution);
                    sites.push((site, edge_target));
                }
            });

            let mut graph = shared_graph.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            for (site, edge_target) in sites {
                if let Some(target) = edge_target {
                    graph.add_edge(&site.caller_fqn, &target);
                }
                graph.add_call_site(site);
            }
        });
        self.check_cancelled()?;
        let graph = shared_graph
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        stats.passes.push(PassTiming {
            name: "resolution",
            duration: started.elapsed(),
        });

        for site in graph.all_call_sites() {
            stats.call_sites += 1;
            if site.resolved {
                stats.resolved_calls += 1;
            } else {
                stats.unresolved_calls += 1;
                if let Some(reason) = site.resolution_failure {
                    *stats
                        .failure_counts
                        .entry(reason.as_str().to_owned())
                        .or_default() += 1;
                }
            }
        }
        stats.cycle_count = graph.detect_cycles().len();

        // Symmetry is structural (add_edge maintains both maps); make any
        // regression loud in debug builds.
        debug_assert!(graph
            .edges
            .iter()
            .all(|(a, callees)| callees
                .iter()
                .all(|b| graph.reverse_edges.get(b).is_some_and(|r| r.contains(a)))));

        Ok(BuiltGraph {
            graph,
            stats,
            registry,
        })
    }

    fn check_cancelled(&self) -> Result<(), EngineError> {
        if self.cancel.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Worker sizing: environment override, then options, both capped; default
/// `max(2, min(16, 3/4 cpu))`.
fn worker_count(option: Option<usize>) -> usize {
    let from_env = std::env::var(WORKERS_ENV)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|&n| n > 0);
    if let Some(n) = from_env.or(option).filter(|&n| n > 0) {
        return n.min(MAX_WORKERS_CAP);
    }
    (num_cpus::get() * 3 / 4).clamp(2, 16)
}

/// Indexes one file's functions and classes into the graph.
fn index_file(indexed: &IndexedFile, graph: &mut CallGraph) {
    for_each_function(&indexed.parsed.module.body, &mut Vec::new(), &mut |stack, func| {
        let class_name = (!stack.is_empty()).then(|| stack.join("."));
        let first_param = func
            .parameters
            .posonlyargs
            .first()
            .or_else(|| func.parameters.args.first())
            .map(|p| p.parameter.name.as_str());
        let is_method =
            class_name.is_some() || matches!(first_param, Some("self") | Some("cls"));
        graph.add_function(FunctionMetadata {
            module: indexed.module.clone(),
            file: indexed.file.clone(),
            name: func.name.to_string(),
            class_name,
            start_line: indexed.parsed.line_of(func),
            end_line: indexed.parsed.end_line_of(func),
            source: indexed.parsed.snippet(func.range()).to_owned(),
            is_method,
            is_async: func.is_async,
            has_decorators: !func.decorator_list.is_empty(),
        });
    });
    index_classes(&indexed.parsed.module.body, &indexed.module, None, graph);
}

fn index_classes(stmts: &[Stmt], module: &str, outer: Option<&str>, graph: &mut CallGraph) {
    for stmt in stmts {
        let Stmt::ClassDef(class_def) = stmt else {
            continue;
        };
        let local = match outer {
            Some(outer) => format!("{outer}.{}", class_def.name),
            None => class_def.name.to_string(),
        };
        let class_fqn = format!("{module}.{local}");
        let methods: Vec<String> = class_def
            .body
            .iter()
            .filter_map(|s| match s {
                Stmt::FunctionDef(func) => Some(format!("{class_fqn}.{}", func.name)),
                _ => None,
            })
            .collect();
        graph.add_class(class_fqn, methods);
        index_classes(&class_def.body, module, Some(&local), graph);
    }
}

/// Visits every function definition with its enclosing class stack, in
/// textual order, including methods and nested defs.
fn for_each_function<'a>(
    stmts: &'a [Stmt],
    class_stack: &mut Vec<String>,
    f: &mut impl FnMut(&[String], &'a ast::StmtFunctionDef),
) {
    for stmt in stmts {
        match stmt {
            Stmt::FunctionDef(func) => {
                f(class_stack, func);
                for_each_function(&func.body, class_stack, f);
            }
            Stmt::ClassDef(class_def) => {
                class_stack.push(class_def.name.to_string());
                for_each_function(&class_def.body, class_stack, f);
                class_stack.pop();
            }
            Stmt::If(if_stmt) => {
                for_each_function(&if_stmt.body, class_stack, f);
                for clause in &if_stmt.elif_else_clauses {
                    for_each_function(&clause.body, class_stack, f);
                }
            }
            Stmt::Try(try_stmt) => {
                for_each_function(&try_stmt.body, class_stack, f);
                for handler in &try_stmt.handlers {
                    let ast::ExceptHandler::ExceptHandler(h) = handler;
                    for_each_function(&h.body, class_stack, f);
                }
                for_each_function(&try_stmt.orelse, class_stack, f);
                for_each_function(&try_stmt.finalbody, class_stack, f);
            }
            _ => {}
        }
    }
}

/// Builds the call-site record and, for resolved calls, the edge endpoint
/// that keeps the graph free of dangling internal FQNs: indexed functions
/// link directly, constructors link to `__init__` when present, external
/// names link as-is, everything else records the site without an edge.
fn make_call_site(
    ctx: &ResolveCtx<'_>,
    caller_fqn: &str,
    file: &std::path::Path,
    raw: crate::extract::RawCall,
    resolution: Resolution,
) -> (CallSite, Option<String>) {
    let location = Location {
        file: file.to_path_buf(),
        line: raw.line,
        col: raw.col,
    };
    match resolution {
        Resolution::Resolved { fqn, inferred } => {
            let edge_target = if ctx.engine.functions.contains(&fqn) {
                Some(fqn.clone())
            } else if ctx.engine.class_index.contains(&fqn) {
                let init = format!("{fqn}.__init__");
                ctx.engine.functions.contains(&init).then_some(init)
            } else if ctx.is_external_fqn(&fqn) {
                Some(fqn.clone())
            } else {
                // Optimistically resolved names (fluent guesses, unknown
                // methods) keep their call-site record but add no edge, so
                // the graph never carries dangling internal FQNs.
                None
            };
            (
                CallSite {
                    caller_fqn: caller_fqn.to_owned(),
                    target_name: raw.target,
                    object_name: raw.object,
                    location,
                    arguments: raw.args,
                    resolved: true,
                    target_fqn: fqn,
                    resolution_failure: None,
                    inferred_type: inferred,
                },
                edge_target,
            )
        }
        Resolution::Unresolved { candidate, reason } => (
            CallSite {
                caller_fqn: caller_fqn.to_owned(),
                target_name: raw.target,
                object_name: raw.object,
                location,
                arguments: raw.args,
                resolved: false,
                target_fqn: candidate.unwrap_or_default(),
                resolution_failure: Some(reason),
                inferred_type: None,
            },
            None,
        ),
    }
}
