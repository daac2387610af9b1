use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[allow(deprecated)]
fn snipgraph(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("snipgraph").expect("binary");
    cmd.current_dir(root).arg("--quiet");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().expect("command run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("utf-8 stdout")
}

fn setup_repo() -> tempfile::TempDir {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::write(root.join("a.py"), "def foo():\n    bar()\n\ndef bar():\n    pass\n").unwrap();
    fs::write(root.join("b.py"), "from a import foo\n\ndef baz():\n    foo()\n").unwrap();
    fs::write(
        root.join("pyproject.toml"),
        "[project]\nname = \"demo\"\ndependencies = [\"requests\"]\n",
    )
    .unwrap();
    temp
}

fn index(root: &Path) -> Value {
    let stdout = stdout_of(snipgraph(root).arg("index"));
    serde_json::from_str(&stdout).expect("stats json")
}

#[test]
fn index_reports_stats() {
    let temp = setup_repo();
    let stats = index(temp.path());

    assert_eq!(stats["files"], 2);
    assert_eq!(stats["languages"]["python"], 2);
    assert_eq!(stats["errors"].as_array().map(Vec::len), Some(0));
    assert!(temp.path().join(".snipgraph").join("graph.db").exists());
}

#[test]
fn context_renders_ordered_markdown() {
    let temp = setup_repo();
    index(temp.path());

    let markdown = stdout_of(snipgraph(temp.path()).args(["context", "b.baz"]));
    let a_header = markdown.find("a.py:\n```\ndef foo():").expect("a.py section");
    let b_header = markdown.find("b.py:\n```\nfrom a import foo").expect("b.py section");
    assert!(a_header < b_header, "{markdown}");
    assert!(!markdown.contains("def baz()"), "seed must not be included");
}

#[test]
fn context_json_honours_budget_and_seeds() {
    let temp = setup_repo();
    index(temp.path());

    let stdout = stdout_of(snipgraph(temp.path()).args([
        "context",
        "b.baz",
        "--format",
        "json",
        "--with-seeds",
    ]));
    let bundle: Value = serde_json::from_str(&stdout).unwrap();
    let ids: Vec<&str> = bundle["snippets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["a.foo", "a.bar", "b._imports_", "b.baz"]);

    let stdout = stdout_of(snipgraph(temp.path()).args([
        "context", "b.baz", "--format", "json", "--budget", "1",
    ]));
    let bundle: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(bundle["count"], 0);
}

#[test]
fn edge_queries_list_ids() {
    let temp = setup_repo();
    index(temp.path());

    let deps = stdout_of(snipgraph(temp.path()).args(["deps", "b.baz"]));
    assert_eq!(deps, "a.foo\nb._imports_\n");

    let dependents = stdout_of(snipgraph(temp.path()).args(["dependents", "a.bar"]));
    assert!(dependents.lines().any(|line| line == "a.foo"), "{dependents}");

    snipgraph(temp.path())
        .args(["deps", "nope.missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown snippet id nope.missing"));
}

#[test]
fn snippets_lists_ids_by_prefix() {
    let temp = setup_repo();
    index(temp.path());

    let ids = stdout_of(snipgraph(temp.path()).args(["snippets", "b.py"]));
    assert_eq!(ids, "b\nb._imports_\nb.baz\n");
}

#[test]
fn structure_lists_files_and_manifests() {
    let temp = setup_repo();
    index(temp.path());

    let listing = stdout_of(snipgraph(temp.path()).arg("structure"));
    assert!(listing.contains("# Project dependencies:\n- requests\n"), "{listing}");
    assert!(listing.contains("- a.py\n  - foo\n  - bar\n"), "{listing}");
    assert!(listing.contains("- pyproject.toml\n"), "{listing}");
}

#[test]
fn unknown_config_keys_are_rejected() {
    let temp = setup_repo();
    fs::write(temp.path().join("snipgraph.toml"), "budgett = 5\n").unwrap();

    snipgraph(temp.path())
        .arg("index")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown field"));
}
