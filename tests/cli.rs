mod common;

use std::path::Path;
use std::process::{Command, Output};

use assert_cmd::prelude::*;

use common::layout_in;

fn provision(root: &Path, args: &[&str]) -> Output {
    let mut cmd = Command::cargo_bin("kira-provision").unwrap();
    cmd.env_remove("KIRA_ANNOTATION_URL")
        .env_remove("KIRA_PROVISION_ROOT")
        .env_remove("RUST_LOG")
        .arg("--root")
        .arg(root)
        .args(args);
    cmd.output().unwrap()
}

#[test]
fn help_lists_tasks_and_exits_nonzero() {
    let temp = tempfile::tempdir().unwrap();
    let output = provision(temp.path(), &["-h"]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    for task in ["tools_install", "tools_setup", "db_install", "db_setup", "ref", "example"] {
        assert!(stdout.contains(task), "missing {task} in help");
    }
}

#[test]
fn unknown_task_exits_without_side_effects() {
    let temp = tempfile::tempdir().unwrap();
    layout_in(temp.path());
    let output = provision(temp.path(), &["-t", "refs"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("refs"));
    assert!(stderr.contains("invalid task"));
    assert!(common::file_names(&temp.path().join("assets/references/sequencing")).is_empty());
}

#[test]
fn unknown_flag_and_missing_argument_exit_one() {
    let temp = tempfile::tempdir().unwrap();
    let output = provision(temp.path(), &["-x"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("-x"));

    let output = provision(temp.path(), &["-t"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn db_setup_without_hallmarks_fails() {
    let temp = tempfile::tempdir().unwrap();
    layout_in(temp.path());
    let output = provision(temp.path(), &["-t", "db_setup", "--non-interactive"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("gene-set"));
}

#[test]
fn dry_run_prints_plan_as_json() {
    let temp = tempfile::tempdir().unwrap();
    layout_in(temp.path());
    let output = provision(temp.path(), &["-t", "ref", "--dry-run", "--non-interactive"]);
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["task"], "ref");
    assert_eq!(report["actions"][0]["action"], "install_references");
    assert_eq!(report["actions"][0]["items"].as_array().unwrap().len(), 3);
}
