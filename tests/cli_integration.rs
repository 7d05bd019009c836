//! Integration tests for the autopilot CLI

use assert_cmd::cargo;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the autopilot binary
fn autopilot() -> Command {
    Command::new(cargo::cargo_bin!("autopilot"))
}

#[test]
fn test_help() {
    autopilot()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("re-score"));
}

#[test]
fn test_version() {
    autopilot()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_run_outside_git_fails_branch_guard() {
    let temp = TempDir::new().unwrap();

    autopilot()
        .arg("--project")
        .arg(temp.path())
        .args(["run", "--no-commit"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Branch guard"));

    assert!(!temp.path().join("data").exists());
    assert!(!temp.path().join("score.md").exists());
}

#[test]
fn test_config_show_defaults() {
    let temp = TempDir::new().unwrap();

    autopilot()
        .arg("--project")
        .arg(temp.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Required branch: develop"))
        .stdout(predicate::str::contains("sxyazi/yazi"));
}

#[test]
fn test_config_show_json() {
    let temp = TempDir::new().unwrap();

    let output = autopilot()
        .arg("--project")
        .arg(temp.path())
        .args(["config", "show", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["self_entity"], "fileview");
    assert_eq!(json["stagnation_limit"], 2);
    assert_eq!(json["entities"].as_array().unwrap().len(), 5);
}

#[test]
fn test_config_validate_reports_errors() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("autopilot.toml"),
        "self_entity = \"missing\"\n",
    )
    .unwrap();

    autopilot()
        .arg("--project")
        .arg(temp.path())
        .args(["config", "validate"])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("self_entity"));
}

#[test]
fn test_config_validate_defaults_ok() {
    let temp = TempDir::new().unwrap();

    autopilot()
        .arg("--project")
        .arg(temp.path())
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_broken_config_exits_with_config_code() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("autopilot.toml"), "stagnation_limit = \"two\"\n").unwrap();

    autopilot()
        .arg("--project")
        .arg(temp.path())
        .arg("status")
        .assert()
        .code(7);
}

#[test]
fn test_status_on_empty_project() {
    let temp = TempDir::new().unwrap();

    autopilot()
        .arg("--project")
        .arg(temp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("no cycles yet"))
        .stdout(predicate::str::contains("queue exhausted"));

    assert!(!temp.path().join("data").exists());
}

#[test]
fn test_status_json_reads_state() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("data")).unwrap();
    std::fs::write(
        temp.path().join("data/autopilot_state.json"),
        r#"{"fileview_boost": {"product": 2}, "last_total": 54, "no_delta_cycles": 1, "completed_tasks": ["t1"]}"#,
    )
    .unwrap();
    std::fs::create_dir_all(temp.path().join("tasks")).unwrap();
    std::fs::write(
        temp.path().join("tasks/queue.json"),
        r#"{"tasks": [{"id": "t1", "title": "a", "status": "done"}, {"id": "t2", "title": "b", "command": "true"}]}"#,
    )
    .unwrap();

    let output = autopilot()
        .arg("--project")
        .arg(temp.path())
        .args(["status", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["total"], 54);
    assert_eq!(json["state"]["no_delta_cycles"], 1);
    assert_eq!(json["queue"]["done"], 1);
    assert_eq!(json["queue"]["next"], "t2");
}
