//! Autopilot - competitive improvement loop
//!
//! Runs one improvement cycle at a time against a project checkout: fetch
//! market metrics for the tracked repositories, execute the next queued
//! task, re-score the product against its competitors, persist the loop
//! state and publish Markdown reports.
//!
//! # Architecture
//!
//! - [`config`] - `autopilot.toml` loading and validation
//! - [`cycle`] - Cycle state, decisions and the controller
//! - [`error`] - Error types and exit codes
//! - [`market`] - Metrics snapshots and the fetch fallback chain
//! - [`operations`] - Real git, GitHub CLI and shell implementations
//! - [`persistence`] - Atomic JSON documents and the instance lock
//! - [`queue`] - Task queue, executor and escalation log
//! - [`report`] - Markdown report rendering
//! - [`score`] - Score engine
//! - [`testing`] - Collaborator traits and mocks
//!
//! # Example
//!
//! ```rust,ignore
//! use autopilot::config::AutopilotConfig;
//! use autopilot::cycle::CycleController;
//! use autopilot::operations::{GhMetricsProvider, RealGitOperations, ShellCommandRunner};
//!
//! let project = std::path::Path::new(".");
//! let config = AutopilotConfig::load(project)?;
//! let controller = CycleController::new(
//!     project,
//!     config.clone(),
//!     RealGitOperations::new(project.to_path_buf()),
//!     GhMetricsProvider::new(),
//!     ShellCommandRunner::new(project.to_path_buf(), config.task_shell.clone()),
//! );
//! let report = controller.run_cycle().await?;
//! std::process::exit(report.decision.exit_code());
//! ```

pub mod config;
pub mod cycle;
pub mod error;
pub mod market;
pub mod operations;
pub mod persistence;
pub mod queue;
pub mod report;
pub mod score;
pub mod testing;

// Re-export commonly used types
pub use error::{AutopilotError, Result};

pub use config::{AutopilotConfig, EntityConfig, FetchConfig, PathsConfig, ResolvedPaths};

pub use cycle::{CycleController, CycleOptions, CycleReport, CycleState, Decision};

pub use market::{RepoMetrics, Snapshot, SnapshotFetcher};

pub use queue::{Task, TaskExecutor, TaskKind, TaskOutcome, TaskQueue, TaskStatus};

pub use score::{Boost, Dimension, ScoreBreakdown, ScoreEngine, Scoreboard};

pub use testing::{
    CommandOutput, CommandRunner, GitOperations, MetricsProvider, MockCommandRunner,
    MockGitOperations, MockMetricsProvider,
};
