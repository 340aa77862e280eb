//! Call-site resolution behaviors: imports, self receivers, attribute
//! chains, and the failure categories.

use flowscan::graph::{FailureReason, GraphBuilder};
use flowscan::{ScanOptions, Scanner};
use std::path::Path;

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, text).unwrap();
}

fn build(root: &Path) -> flowscan::graph::BuiltGraph {
    GraphBuilder::new(root).build().unwrap()
}

#[test]
fn aliased_import_resolves_to_framework() {
    let temp = tempfile::tempdir().unwrap();
    write(
        temp.path(),
        "m.py",
        "import numpy as np\ndef f():\n    np.array([1])\n",
    );

    let built = build(temp.path());
    let site = built.graph.all_call_sites().next().unwrap();
    assert!(site.resolved);
    assert_eq!(site.target_fqn, "numpy.array");
    assert_eq!(site.object_name, "np");
}

#[test]
fn from_import_binds_function_across_modules() {
    let temp = tempfile::tempdir().unwrap();
    write(temp.path(), "util.py", "def helper():\n    pass\n");
    write(
        temp.path(),
        "m.py",
        "from util import helper as h\ndef f():\n    h()\n",
    );

    let built = build(temp.path());
    assert!(built.graph.callees("m.f").any(|c| c == "util.helper"));
}

#[test]
fn relative_import_resolves_within_package() {
    let temp = tempfile::tempdir().unwrap();
    write(temp.path(), "pkg/__init__.py", "");
    write(temp.path(), "pkg/helpers.py", "def work():\n    pass\n");
    write(
        temp.path(),
        "pkg/mod.py",
        "from .helpers import work\ndef f():\n    work()\n",
    );

    let built = build(temp.path());
    assert!(built.graph.callees("pkg.mod.f").any(|c| c == "pkg.helpers.work"));
}

#[test]
fn self_method_resolves_on_class() {
    let temp = tempfile::tempdir().unwrap();
    write(
        temp.path(),
        "m.py",
        concat!(
            "class S:\n",
            "    def helper(self):\n",
            "        pass\n",
            "    def run(self):\n",
            "        self.helper()\n",
        ),
    );

    let built = build(temp.path());
    assert!(built.graph.callees("m.S.run").any(|c| c == "m.S.helper"));
}

#[test]
fn self_attribute_chain_resolves_through_init_type() {
    let temp = tempfile::tempdir().unwrap();
    write(
        temp.path(),
        "m.py",
        concat!(
            "class Repo:\n",
            "    def save(self):\n",
            "        pass\n",
            "class Service:\n",
            "    def __init__(self):\n",
            "        self.repo = Repo()\n",
            "    def run(self):\n",
            "        self.repo.save()\n",
        ),
    );

    let built = build(temp.path());
    assert!(
        built.graph.callees("m.Service.run").any(|c| c == "m.Repo.save"),
        "edges: {:?}",
        built.graph.edges
    );
}

#[test]
fn super_calls_are_categorized() {
    let temp = tempfile::tempdir().unwrap();
    write(
        temp.path(),
        "m.py",
        concat!(
            "class A:\n",
            "    def go(self):\n",
            "        pass\n",
            "class B(A):\n",
            "    def go(self):\n",
            "        super().go()\n",
        ),
    );

    let built = build(temp.path());
    let unresolved: Vec<_> = built
        .graph
        .all_call_sites()
        .filter(|s| !s.resolved)
        .collect();
    assert!(unresolved
        .iter()
        .any(|s| s.resolution_failure == Some(FailureReason::SuperCall)));
    assert_eq!(built.stats.failure_counts.get("super_call"), Some(&1));
}

#[test]
fn orm_shapes_are_categorized_via_pattern_data() {
    let temp = tempfile::tempdir().unwrap();
    write(
        temp.path(),
        "m.py",
        "def q():\n    return Article.objects.filter(live=True)\n",
    );

    // The ORM shape list rides on the pattern set, so go through the
    // scanner rather than a bare builder.
    let outcome = Scanner::new(ScanOptions::default()).scan(temp.path()).unwrap();
    let site = outcome
        .graph
        .all_call_sites()
        .find(|s| s.target_name == "Article.objects.filter")
        .unwrap();
    assert!(!site.resolved);
    assert_eq!(site.resolution_failure, Some(FailureReason::OrmPattern));
}

#[test]
fn unknown_variable_type_is_variable_method() {
    let temp = tempfile::tempdir().unwrap();
    write(
        temp.path(),
        "m.py",
        "def f():\n    y = mystery()\n    y.do_thing()\n",
    );

    let built = build(temp.path());
    let site = built
        .graph
        .all_call_sites()
        .find(|s| s.target_name == "y.do_thing")
        .unwrap();
    assert_eq!(site.resolution_failure, Some(FailureReason::VariableMethod));
}

#[test]
fn stdlib_member_resolves_without_framework_prefix() {
    let temp = tempfile::tempdir().unwrap();
    write(
        temp.path(),
        "m.py",
        "import hashlib\ndef f(d):\n    return hashlib.sha256(d)\n",
    );

    let built = build(temp.path());
    let site = built.graph.all_call_sites().next().unwrap();
    assert!(site.resolved);
    assert_eq!(site.target_fqn, "hashlib.sha256");
}

#[test]
fn builtin_type_method_on_annotated_parameter() {
    let temp = tempfile::tempdir().unwrap();
    write(
        temp.path(),
        "m.py",
        "def f(s: str):\n    t = s.upper()\n    return t\n",
    );

    let built = build(temp.path());
    let site = built
        .graph
        .all_call_sites()
        .find(|s| s.target_name == "s.upper")
        .unwrap();
    assert!(site.resolved);
    assert_eq!(site.target_fqn, "builtins.str.upper");
    let inferred = site.inferred_type.as_ref().unwrap();
    assert_eq!(inferred.known_fqn(), Some("builtins.str"));
}
