//! End-to-end cycle tests against a temporary project directory.
//!
//! Git, the metrics provider and the task shell are mocked; every persisted
//! document is real.

use std::path::Path;

use autopilot::cycle::{EXIT_ESCALATE, EXIT_PIVOT};
use autopilot::error::EXIT_ALREADY_RUNNING;
use autopilot::persistence::{InstanceLock, JsonDocument};
use autopilot::{
    AutopilotConfig, AutopilotError, Boost, CycleController, CycleState, Decision, Dimension,
    MockCommandRunner, MockGitOperations, MockMetricsProvider, RepoMetrics, Snapshot, Task,
    TaskKind, TaskOutcome, TaskQueue, TaskStatus,
};
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

type Controller = CycleController<MockGitOperations, MockMetricsProvider, MockCommandRunner>;

fn fast_config() -> AutopilotConfig {
    let mut config = AutopilotConfig::default();
    config.fetch.attempts = 2;
    config.fetch.backoff_ms = 0;
    config
}

fn controller(dir: &Path, provider: MockMetricsProvider) -> Controller {
    CycleController::new(
        dir,
        fast_config(),
        MockGitOperations::new(),
        provider,
        MockCommandRunner::new(),
    )
}

fn write_queue(dir: &Path, tasks: Vec<Task>) {
    JsonDocument::new(dir.join("tasks/queue.json"))
        .save_atomic(&TaskQueue::new(tasks))
        .unwrap();
}

fn read_state(ctl: &Controller) -> CycleState {
    JsonDocument::new(&ctl.paths().state)
        .load_or_default()
        .unwrap()
}

fn read_queue(ctl: &Controller) -> TaskQueue {
    JsonDocument::new(&ctl.paths().queue)
        .load_or_default()
        .unwrap()
}

#[tokio::test]
async fn test_completed_task_raises_score() {
    let temp = TempDir::new().unwrap();
    let ctl = controller(temp.path(), MockMetricsProvider::new());
    ctl.run_cycle().await.unwrap();

    write_queue(
        temp.path(),
        vec![Task::new("t1", "Add archive preview")
            .with_command("cargo test")
            .with_boost(Boost::default().with(Dimension::Product, 2))],
    );
    let report = ctl.run_cycle().await.unwrap();

    assert_eq!(report.outcome, TaskOutcome::Done);
    assert_eq!(report.delta, 2);
    assert_eq!(report.decision, Decision::Continue);

    let state = read_state(&ctl);
    assert_eq!(state.boost.product, 2);
    assert_eq!(state.completed_tasks, vec!["t1".to_string()]);
    assert_eq!(state.last_total, Some(54));
    assert_eq!(state.no_delta_cycles, 0);
    assert_eq!(state.last_task_result, Some(TaskOutcome::Done));

    let queue = read_queue(&ctl);
    assert_eq!(queue.tasks[0].status, TaskStatus::Done);
    assert!(queue.tasks[0].completed_at.is_some());

    let score = std::fs::read_to_string(&ctl.paths().score_report).unwrap();
    assert!(score.contains("| fileview | 54 | 24 |"));
    assert!(score.contains("- fileview total delta: +2"));
}

#[tokio::test]
async fn test_major_task_escalates_every_cycle() {
    let temp = TempDir::new().unwrap();
    write_queue(
        temp.path(),
        vec![Task::new("m1", "Rewrite core").with_kind(TaskKind::Major)],
    );
    let ctl = controller(temp.path(), MockMetricsProvider::new());

    for _ in 0..2 {
        let report = ctl.run_cycle().await.unwrap();
        assert_eq!(report.outcome, TaskOutcome::Major);
        assert_eq!(report.decision.exit_code(), EXIT_ESCALATE);
    }

    let log = std::fs::read_to_string(&ctl.paths().escalations).unwrap();
    assert!(log.starts_with("# Escalations\n\n"));
    let entries: Vec<&str> = log.lines().filter(|l| l.starts_with("- ")).collect();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].contains("| m1 | Rewrite core | kind=major |"));

    assert_eq!(read_queue(&ctl).tasks[0].status, TaskStatus::Todo);
    assert_eq!(read_state(&ctl).no_delta_cycles, 0);
}

#[tokio::test]
async fn test_stagnation_pivots_after_limit() {
    let temp = TempDir::new().unwrap();
    let ctl = controller(temp.path(), MockMetricsProvider::new());
    ctl.run_cycle().await.unwrap();

    write_queue(
        temp.path(),
        vec![
            Task::new("t1", "docs").with_command("true"),
            Task::new("t2", "more docs").with_command("true"),
            Task::new("t3", "never reached").with_command("true"),
        ],
    );

    let second = ctl.run_cycle().await.unwrap();
    assert_eq!(second.delta, 0);
    assert_eq!(second.no_delta_cycles, 1);
    assert_eq!(second.decision, Decision::Continue);

    let third = ctl.run_cycle().await.unwrap();
    assert_eq!(third.no_delta_cycles, 2);
    assert_eq!(third.decision, Decision::Pivot);
    assert_eq!(third.decision.exit_code(), EXIT_PIVOT);
}

#[tokio::test]
async fn test_run_loop_stops_on_pivot() {
    let temp = TempDir::new().unwrap();
    write_queue(
        temp.path(),
        vec![
            Task::new("t1", "a").with_command("true"),
            Task::new("t2", "b").with_command("true"),
        ],
    );
    let ctl = controller(temp.path(), MockMetricsProvider::new());

    let mut cycles = 0;
    let report = ctl
        .run_loop(std::time::Duration::ZERO, |_| cycles += 1)
        .await
        .unwrap();

    assert_eq!(report.decision, Decision::Pivot);
    assert_eq!(cycles, 2);
    assert_eq!(ctl.git().commits().len(), 2);
}

#[tokio::test]
async fn test_wrong_branch_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let ctl = CycleController::new(
        temp.path(),
        fast_config(),
        MockGitOperations::new().with_branch("main"),
        MockMetricsProvider::new(),
        MockCommandRunner::new(),
    );

    let err = ctl.run_cycle().await.unwrap_err();
    assert!(matches!(
        err,
        AutopilotError::BranchGuard { ref expected, ref actual } if expected == "develop" && actual == "main"
    ));
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    assert!(ctl.git().commits().is_empty());
}

#[tokio::test]
async fn test_live_metrics_with_transient_failure() {
    let temp = TempDir::new().unwrap();
    let pushed = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let provider = MockMetricsProvider::new()
        .with_metrics(
            "sxyazi/yazi",
            RepoMetrics::new(40000, 900, 80).with_pushed_at(pushed),
        )
        .with_transient_failures("sxyazi/yazi", 1);
    let ctl = controller(temp.path(), provider);

    ctl.run_cycle().await.unwrap();

    let snapshot: Snapshot = JsonDocument::new(&ctl.paths().snapshot)
        .load_optional()
        .unwrap()
        .unwrap();
    let yazi = snapshot.get("yazi").unwrap();
    assert_eq!(yazi.stargazers_count, 40000);
    assert_eq!(yazi.pushed_at, Some(pushed));
    // Everything else fell through to the default table.
    assert_eq!(snapshot.get("lf").unwrap().stargazers_count, 9026);
    assert_eq!(snapshot.repos.len(), 5);
}

#[tokio::test]
async fn test_previous_snapshot_used_when_offline() {
    let temp = TempDir::new().unwrap();
    let previous = Snapshot::new(Utc.with_ymd_and_hms(2020, 10, 1, 0, 0, 0).unwrap())
        .with_repo("yazi", RepoMetrics::new(35000, 750, 60));
    JsonDocument::new(temp.path().join("data/market_snapshot.json"))
        .save_atomic(&previous)
        .unwrap();
    let ctl = controller(temp.path(), MockMetricsProvider::new());

    ctl.run_cycle().await.unwrap();

    let snapshot: Snapshot = JsonDocument::new(&ctl.paths().snapshot)
        .load_optional()
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.get("yazi").unwrap().stargazers_count, 35000);
    assert_eq!(snapshot.get("nnn").unwrap().stargazers_count, 21191);
    assert!(snapshot.updated_at > previous.updated_at);
}

#[tokio::test]
async fn test_corrupt_snapshot_treated_as_absent() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("data")).unwrap();
    std::fs::write(temp.path().join("data/market_snapshot.json"), "{not json").unwrap();
    let ctl = controller(temp.path(), MockMetricsProvider::new());

    let report = ctl.run_cycle().await.unwrap();
    assert_eq!(report.total, 52);
}

#[tokio::test]
async fn test_corrupt_queue_fails_cycle() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("tasks")).unwrap();
    std::fs::write(temp.path().join("tasks/queue.json"), "[1, 2").unwrap();
    let ctl = controller(temp.path(), MockMetricsProvider::new());

    let err = ctl.run_cycle().await.unwrap_err();
    assert!(matches!(err, AutopilotError::Document { .. }));
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn test_second_instance_is_rejected() {
    let temp = TempDir::new().unwrap();
    let ctl = controller(temp.path(), MockMetricsProvider::new());
    let _held = InstanceLock::acquire(&ctl.paths().lock).unwrap();

    let err = ctl.run_cycle().await.unwrap_err();
    assert!(matches!(err, AutopilotError::AlreadyRunning { .. }));
    assert_eq!(err.exit_code(), EXIT_ALREADY_RUNNING);
}

#[tokio::test]
async fn test_unknown_queue_fields_survive_execution() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("tasks")).unwrap();
    std::fs::write(
        temp.path().join("tasks/queue.json"),
        r#"{
  "version": 3,
  "tasks": [
    {"id": "t1", "title": "x", "status": "todo", "command": "true", "owner": "ops", "boost": {"reliability": 1}}
  ]
}"#,
    )
    .unwrap();
    let ctl = controller(temp.path(), MockMetricsProvider::new());

    ctl.run_cycle().await.unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&ctl.paths().queue).unwrap()).unwrap();
    assert_eq!(raw["version"], 3);
    assert_eq!(raw["tasks"][0]["owner"], "ops");
    assert_eq!(raw["tasks"][0]["status"], "done");
    assert_eq!(read_state(&ctl).boost.reliability, 1);
}

#[tokio::test]
async fn test_push_failure_fails_single_run() {
    let temp = TempDir::new().unwrap();
    let ctl = CycleController::new(
        temp.path(),
        fast_config(),
        MockGitOperations::new().with_push_error("remote rejected"),
        MockMetricsProvider::new(),
        MockCommandRunner::new(),
    );

    let err = ctl.run_cycle().await.unwrap_err();
    assert!(matches!(err, AutopilotError::Git { .. }));
    assert!(!err.is_fatal());
    // The cycle itself completed before publishing.
    assert!(ctl.paths().state.exists());
    assert_eq!(ctl.git().commits().len(), 1);
}

#[tokio::test]
async fn test_pivot_exit_code_survives_push_failure() {
    let temp = TempDir::new().unwrap();
    let ctl = CycleController::new(
        temp.path(),
        fast_config(),
        MockGitOperations::new().with_push_error("remote rejected"),
        MockMetricsProvider::new(),
        MockCommandRunner::new(),
    );
    // The first cycle continues, so its push failure surfaces.
    assert!(ctl.run_cycle().await.is_err());

    write_queue(
        temp.path(),
        vec![
            Task::new("t1", "docs").with_command("true"),
            Task::new("t2", "more docs").with_command("true"),
        ],
    );
    assert!(ctl.run_cycle().await.is_err());

    let report = ctl.run_cycle().await.unwrap();
    assert_eq!(report.decision, Decision::Pivot);
    assert_eq!(report.decision.exit_code(), EXIT_PIVOT);
    assert_eq!(read_state(&ctl).no_delta_cycles, 2);
}
