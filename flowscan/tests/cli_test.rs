//! CLI smoke tests for the flowscan binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, text).unwrap();
}

fn flowscan() -> Command {
    Command::cargo_bin("flowscan-bin").unwrap()
}

#[test]
fn clean_project_reports_no_findings() {
    let temp = tempfile::tempdir().unwrap();
    write(temp.path(), "a.py", "def f():\n    return 1\n");

    flowscan()
        .arg(temp.path())
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::contains("No findings"));
}

#[test]
fn vulnerable_project_prints_findings_table() {
    let temp = tempfile::tempdir().unwrap();
    write(
        temp.path(),
        "a.py",
        "import os\ndef f():\n    x = input()\n    os.system(x)\n",
    );

    flowscan()
        .arg(temp.path())
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::contains("CMD-INJECTION-001"));
}

#[test]
fn json_output_is_parseable() {
    let temp = tempfile::tempdir().unwrap();
    write(
        temp.path(),
        "a.py",
        "import os\ndef f():\n    x = input()\n    os.system(x)\n",
    );

    let output = flowscan().arg(temp.path()).arg("--json").output().unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["findings"][0]["pattern_id"], "CMD-INJECTION-001");
    assert_eq!(value["stats"]["files_parsed"], 1);
}

#[test]
fn fail_on_findings_sets_exit_code() {
    let temp = tempfile::tempdir().unwrap();
    write(
        temp.path(),
        "a.py",
        "import os\ndef f():\n    x = input()\n    os.system(x)\n",
    );

    flowscan()
        .arg(temp.path())
        .args(["--quiet", "--fail-on-findings"])
        .assert()
        .code(1);
}

#[test]
fn min_severity_filters_findings() {
    let temp = tempfile::tempdir().unwrap();
    // Weak hash is medium severity; a critical floor hides it.
    write(
        temp.path(),
        "a.py",
        "import hashlib\ndef f(d):\n    return hashlib.md5(d)\n",
    );

    flowscan()
        .arg(temp.path())
        .args(["--quiet", "--min-severity", "critical"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No findings"));
}

#[test]
fn missing_root_fails_with_error() {
    flowscan()
        .arg("/definitely/not/a/project")
        .arg("--quiet")
        .assert()
        .failure();
}

#[test]
fn custom_pattern_file_is_used() {
    let temp = tempfile::tempdir().unwrap();
    write(
        temp.path(),
        "a.py",
        "import os\ndef f():\n    x = input()\n    os.system(x)\n",
    );
    write(
        temp.path(),
        "only_yaml.toml",
        concat!(
            "[[patterns]]\n",
            "id = \"LOCAL-001\"\n",
            "name = \"Local Yaml\"\n",
            "kind = \"dangerous-function\"\n",
            "severity = \"low\"\n",
            "dangerous = [\"yaml.load\"]\n",
        ),
    );

    // The custom set has no command-injection pattern, so the scan is clean.
    flowscan()
        .arg(temp.path())
        .args(["--quiet", "--patterns"])
        .arg(temp.path().join("only_yaml.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("No findings"));
}
