//! Forward intra-procedural taint analysis.
//!
//! Walks a function's lowered statements in textual order carrying a
//! variable -> taint map. Sources taint at full confidence, plain
//! assignments copy taint unchanged, calls decay it, sanitizers clear it,
//! and sinks emit detections from the state flowing into them.

use super::DefUseChain;
use crate::extract::{Statement, StatementKind};
use serde::Serialize;
use std::collections::BTreeMap;

/// Confidence decay applied when taint passes through a call whose effect
/// on the data is unknown.
pub const CALL_DECAY: f64 = 0.7;

/// Sources recognized regardless of the pattern's own list.
const STDLIB_SOURCES: &[&str] = &[
    "input",
    "raw_input",
    "sys.argv",
    "sys.stdin",
    "sys.stdin.read",
    "sys.stdin.readline",
    "os.environ",
    "os.environ.get",
    "os.getenv",
];

/// Sanitizers recognized regardless of the pattern's own list.
const STDLIB_SANITIZERS: &[&str] = &[
    "html.escape",
    "shlex.quote",
    "urllib.parse.quote",
    "re.escape",
    "os.path.basename",
];

/// Calls that never carry taint from arguments into their result.
const NON_PROPAGATORS: &[&str] = &[
    "len",
    "type",
    "isinstance",
    "issubclass",
    "bool",
    "int",
    "float",
    "str",
    "repr",
    "id",
    "ord",
    "hex",
    "abs",
    "hash",
    "hasattr",
    "callable",
    "os.path.exists",
    "os.path.isfile",
    "os.path.isdir",
    "os.path.getsize",
];

/// Name lists drawn from a pattern.
#[derive(Debug, Clone, Copy)]
pub struct NameLists<'a> {
    /// Operations producing untrusted data.
    pub sources: &'a [String],
    /// Operations dangerous on untrusted data.
    pub sinks: &'a [String],
    /// Operations cleansing data for the sink class.
    pub sanitizers: &'a [String],
}

/// Taint carried by one variable.
#[derive(Debug, Clone, Serialize)]
pub struct TaintInfo {
    /// The source call that introduced the taint.
    pub source_call: String,
    /// Variable first tainted.
    pub source_var: String,
    /// Line where the taint entered.
    pub source_line: usize,
    /// Current confidence, non-increasing along the path.
    pub confidence: f64,
    /// Variables the taint flowed through, in order.
    pub path: Vec<String>,
    /// Set when a discarded-result sanitizer touched the value: reported
    /// in the summary but excluded from findings.
    pub sanitized: bool,
}

/// One source-to-sink detection.
#[derive(Debug, Clone, Serialize)]
pub struct TaintDetection {
    /// Enclosing function FQN.
    pub function: String,
    /// The source call (e.g. `input`).
    pub source_call: String,
    /// Line of the source.
    pub source_line: usize,
    /// Variable the source tainted.
    pub source_var: String,
    /// Line of the sink call.
    pub sink_line: usize,
    /// The tainted variable reaching the sink.
    pub sink_var: String,
    /// The sink call target (e.g. `os.system`).
    pub sink_call: String,
    /// Variables along the flow.
    pub propagation_path: Vec<String>,
    /// Confidence at the sink.
    pub confidence: f64,
    /// True when a discarded-result sanitizer touched the flow.
    pub sanitized: bool,
}

/// Result of taint analysis for one function.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaintSummary {
    /// Function FQN.
    pub function: String,
    /// Final taint state.
    pub tainted_vars: BTreeMap<String, TaintInfo>,
    /// Detections in textual order.
    pub detections: Vec<TaintDetection>,
}

impl TaintSummary {
    /// Empty summary for a function that could not be analyzed.
    #[must_use]
    pub fn empty(function: &str) -> Self {
        Self {
            function: function.to_owned(),
            ..Self::default()
        }
    }
}

/// Matches a call target against one list entry: exact, suffix (`.name`),
/// prefix (`name.`), or last component. Trailing `(` and arguments on the
/// entry are ignored. Shared with the pattern engine so both layers agree
/// on what a name hit means.
#[must_use]
pub fn name_matches(target: &str, name: &str) -> bool {
    let name = name.split('(').next().unwrap_or(name).trim();
    if name.is_empty() {
        return false;
    }
    if target == name {
        return true;
    }
    if target.len() > name.len() + 1 {
        if let Some(stripped) = target.strip_suffix(name) {
            if stripped.ends_with('.') {
                return true;
            }
        }
    }
    if let Some(stripped) = target.strip_prefix(name) {
        if stripped.starts_with('.') {
            return true;
        }
    }
    target.rsplit('.').next() == Some(name)
}

fn matches_any(target: &str, names: &[String]) -> bool {
    names.iter().any(|name| name_matches(target, name))
}

fn matches_static(target: &str, names: &[&str]) -> bool {
    names.iter().any(|name| name_matches(target, name))
}

/// Runs forward taint over a function's statements. `start_line`/`end_line`
/// bound the enclosing function; anything outside is discarded.
#[must_use]
pub fn analyze_taint(
    function: &str,
    start_line: usize,
    end_line: usize,
    statements: &[Statement],
    lists: &NameLists<'_>,
) -> TaintSummary {
    let chain = DefUseChain::build(statements);
    let mut state: BTreeMap<String, TaintInfo> = BTreeMap::new();
    let mut detections = Vec::new();

    // Taint on a variable with no use at or after its definition can never
    // reach a sink; the def-use chain lets us drop it immediately.
    let is_live = |var: &str, from_line: usize| {
        chain
            .get(var)
            .is_some_and(|du| du.used_at.iter().any(|&line| line >= from_line))
    };

    for stmt in statements {
        let target = stmt.call_target.as_deref();
        let is_source = target
            .is_some_and(|t| matches_any(t, lists.sources) || matches_static(t, STDLIB_SOURCES));
        let is_sanitizer = target.is_some_and(|t| {
            matches_any(t, lists.sanitizers) || matches_static(t, STDLIB_SANITIZERS)
        });
        let is_sink = target.is_some_and(|t| matches_any(t, lists.sinks));

        // Sinks observe the state flowing *into* the statement.
        if is_sink {
            for used in &stmt.uses {
                let Some(info) = state.get(used) else { continue };
                let sink_call = target.unwrap_or_default().to_owned();
                if info.source_line < start_line
                    || stmt.line > end_line
                    || info.source_line > stmt.line
                {
                    continue;
                }
                detections.push(TaintDetection {
                    function: function.to_owned(),
                    source_call: info.source_call.clone(),
                    source_line: info.source_line,
                    source_var: info.source_var.clone(),
                    sink_line: stmt.line,
                    sink_var: used.clone(),
                    sink_call,
                    propagation_path: info.path.clone(),
                    confidence: info.confidence,
                    sanitized: info.sanitized,
                });
            }
        }

        // State transition.
        if is_source {
            if let Some(def) = &stmt.def {
                if is_live(def, stmt.line) {
                    state.insert(
                        def.clone(),
                        TaintInfo {
                            source_call: target.unwrap_or_default().to_owned(),
                            source_var: def.clone(),
                            source_line: stmt.line,
                            confidence: 1.0,
                            path: vec![def.clone()],
                            sanitized: false,
                        },
                    );
                }
            }
            continue;
        }

        if is_sanitizer {
            match &stmt.def {
                // `y = escape(x)`: the result is clean.
                Some(def) => {
                    state.remove(def);
                }
                // `escape(x)` with the result discarded does not clean `x`;
                // flag it so downstream detections carry the marker.
                None => {
                    for used in &stmt.uses {
                        if let Some(info) = state.get_mut(used) {
                            info.sanitized = true;
                        }
                    }
                }
            }
            continue;
        }

        match stmt.kind {
            StatementKind::Assignment | StatementKind::Loop => {
                let Some(def) = &stmt.def else { continue };
                match first_tainted(&state, &stmt.uses) {
                    Some(info) if is_live(def, stmt.line) => {
                        let mut next = info.clone();
                        next.path.push(def.clone());
                        state.insert(def.clone(), next);
                    }
                    // Overwritten with clean data, or dead from here on.
                    _ => {
                        state.remove(def);
                    }
                }
            }
            StatementKind::Call => {
                let Some(def) = &stmt.def else { continue };
                if target.is_some_and(|t| matches_static(t, NON_PROPAGATORS)) {
                    state.remove(def);
                    continue;
                }
                match first_tainted(&state, &stmt.uses) {
                    Some(info) if is_live(def, stmt.line) => {
                        let mut next = info.clone();
                        next.confidence *= CALL_DECAY;
                        next.path.push(def.clone());
                        state.insert(def.clone(), next);
                    }
                    _ => {
                        state.remove(def);
                    }
                }
            }
            _ => {}
        }
    }

    TaintSummary {
        function: function.to_owned(),
        tainted_vars: state,
        detections,
    }
}

fn first_tainted<'a>(
    state: &'a BTreeMap<String, TaintInfo>,
    uses: &[String],
) -> Option<&'a TaintInfo> {
    uses.iter().find_map(|used| state.get(used))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::lower_function;
    use crate::parser::parse_source;
    use ruff_python_ast::Stmt;
    use std::path::Path;

    fn run(source: &str, sources: &[&str], sinks: &[&str], sanitizers: &[&str]) -> TaintSummary {
        let parsed = parse_source(source, Path::new("t.py")).unwrap();
        let Stmt::FunctionDef(func) = &parsed.module.body[0] else {
            panic!("expected function");
        };
        let statements = lower_function(func, &parsed.line_index);
        let sources: Vec<String> = sources.iter().map(|&s| s.to_owned()).collect();
        let sinks: Vec<String> = sinks.iter().map(|&s| s.to_owned()).collect();
        let sanitizers: Vec<String> = sanitizers.iter().map(|&s| s.to_owned()).collect();
        analyze_taint(
            "t.f",
            1,
            100,
            &statements,
            &NameLists {
                sources: &sources,
                sinks: &sinks,
                sanitizers: &sanitizers,
            },
        )
    }

    #[test]
    fn direct_source_to_sink() {
        let summary = run(
            "def f():\n    x = input()\n    os.system(x)\n",
            &["input"],
            &["os.system"],
            &[],
        );
        assert_eq!(summary.detections.len(), 1);
        let d = &summary.detections[0];
        assert_eq!(d.source_call, "input");
        assert_eq!(d.source_line, 2);
        assert_eq!(d.sink_line, 3);
        assert_eq!(d.sink_call, "os.system");
        assert_eq!(d.sink_var, "x");
        assert!((d.confidence - 1.0).abs() < 1e-9);
        assert!(!d.sanitized);
    }

    #[test]
    fn sanitizer_clears_taint() {
        let summary = run(
            "def f():\n    x = input()\n    y = html.escape(x)\n    os.system(y)\n",
            &["input"],
            &["os.system"],
            &["html.escape"],
        );
        assert!(summary.detections.is_empty());
        assert!(!summary.tainted_vars.contains_key("y"));
    }

    #[test]
    fn assignment_copies_without_decay_call_decays() {
        let summary = run(
            "def f():\n    x = input()\n    y = x\n    z = transform(y)\n    eval(z)\n",
            &["input"],
            &["eval"],
            &[],
        );
        assert_eq!(summary.detections.len(), 1);
        let d = &summary.detections[0];
        assert!((d.confidence - CALL_DECAY).abs() < 1e-9);
        assert_eq!(d.propagation_path, ["x", "y", "z"]);
    }

    #[test]
    fn non_propagator_stops_taint() {
        let summary = run(
            "def f():\n    x = input()\n    y = len(x)\n    eval(y)\n",
            &["input"],
            &["eval"],
            &[],
        );
        assert!(summary.detections.is_empty());
    }

    #[test]
    fn discarded_sanitizer_flags_but_keeps_taint() {
        let summary = run(
            "def f():\n    x = input()\n    html.escape(x)\n    os.system(x)\n",
            &["input"],
            &["os.system"],
            &["html.escape"],
        );
        assert_eq!(summary.detections.len(), 1);
        assert!(summary.detections[0].sanitized);
    }

    #[test]
    fn rebinding_with_clean_value_untaints() {
        let summary = run(
            "def f():\n    x = input()\n    x = \"safe\"\n    os.system(x)\n",
            &["input"],
            &["os.system"],
            &[],
        );
        assert!(summary.detections.is_empty());
    }

    #[test]
    fn suffix_and_prefix_matching() {
        assert!(name_matches("cursor.execute", "execute"));
        assert!(name_matches("os.system", "os.system"));
        assert!(name_matches("subprocess.call", "subprocess"));
        assert!(name_matches("db.session.execute", "execute"));
        assert!(name_matches("eval", "eval("));
        assert!(!name_matches("evaluate", "eval"));
        assert!(!name_matches("os.system", "system_x"));
    }

    #[test]
    fn taint_on_a_never_used_variable_is_pruned() {
        let summary = run(
            "def f():\n    x = input()\n    return 1\n",
            &["input"],
            &["os.system"],
            &[],
        );
        assert!(summary.detections.is_empty());
        assert!(summary.tainted_vars.is_empty());
    }

    #[test]
    fn zero_statements_empty_summary() {
        let empty: &[Statement] = &[];
        let lists = NameLists {
            sources: &[],
            sinks: &[],
            sanitizers: &[],
        };
        let summary = analyze_taint("t.f", 1, 1, empty, &lists);
        assert!(summary.detections.is_empty());
        assert!(summary.tainted_vars.is_empty());
    }

    #[test]
    fn fstring_use_propagates() {
        let summary = run(
            "def f():\n    name = input()\n    cmd = f\"ls {name}\"\n    os.system(cmd)\n",
            &["input"],
            &["os.system"],
            &[],
        );
        assert_eq!(summary.detections.len(), 1);
        assert_eq!(summary.detections[0].propagation_path, ["name", "cmd"]);
    }
}
