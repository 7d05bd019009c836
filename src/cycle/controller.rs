//! The cycle controller.
//!
//! Sequences one full cycle against the persisted documents:
//!
//! ```text
//! branch guard ─► lock ─► fetch snapshot ─► advance queue ─► score
//!                                                             │
//!     commit/push ◄─ publish reports ◄─ persist state ◄───────┘
//! ```
//!
//! A branch-guard failure aborts before anything is written. Everything
//! after the guard runs to completion even when the task fails; only I/O
//! errors on the persisted documents abort a cycle.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use super::{now_utc, CycleReport, CycleState, Decision};
use crate::config::{AutopilotConfig, ResolvedPaths};
use crate::error::{AutopilotError, Result};
use crate::market::{Snapshot, SnapshotFetcher};
use crate::persistence::{InstanceLock, JsonDocument};
use crate::queue::{EscalationLog, TaskExecutor, TaskQueue};
use crate::report::MarkdownPublisher;
use crate::score::{score_delta, ScoreEngine};
use crate::testing::{CommandRunner, GitOperations, MetricsProvider};

/// Per-run publishing switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOptions {
    /// Commit changed documents after each cycle.
    pub commit: bool,
    /// Push after committing.
    pub push: bool,
}

impl Default for CycleOptions {
    fn default() -> Self {
        Self {
            commit: true,
            push: true,
        }
    }
}

/// Stage `paths`, commit if anything changed, and optionally push.
///
/// Returns `false` without committing when nothing is staged.
///
/// # Errors
///
/// Returns [`AutopilotError::Git`] if staging, commit or push fails.
pub fn commit_and_push<G: GitOperations + ?Sized>(
    git: &G,
    paths: &[PathBuf],
    push: bool,
) -> Result<bool> {
    git.stage(paths)
        .map_err(|e| AutopilotError::git("add", e.to_string()))?;

    let changed = git
        .has_staged_changes()
        .map_err(|e| AutopilotError::git("diff", e.to_string()))?;
    if !changed {
        info!("Nothing to commit");
        return Ok(false);
    }

    let message = format!(
        "chore(autopilot): loop cycle {}",
        Utc::now().format("%Y-%m-%d %H:%M:%SZ")
    );
    git.commit(&message)
        .map_err(|e| AutopilotError::git("commit", e.to_string()))?;

    if push {
        git.push()
            .map_err(|e| AutopilotError::git("push", e.to_string()))?;
    }
    Ok(true)
}

/// Runs cycles for one project.
pub struct CycleController<G, P, R> {
    config: AutopilotConfig,
    paths: ResolvedPaths,
    git: G,
    provider: P,
    runner: R,
    options: CycleOptions,
}

impl<G, P, R> CycleController<G, P, R>
where
    G: GitOperations,
    P: MetricsProvider,
    R: CommandRunner,
{
    #[must_use]
    pub fn new(
        project_dir: &Path,
        config: AutopilotConfig,
        git: G,
        provider: P,
        runner: R,
    ) -> Self {
        let paths = config.paths.resolve(project_dir);
        Self {
            config,
            paths,
            git,
            provider,
            runner,
            options: CycleOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: CycleOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn config(&self) -> &AutopilotConfig {
        &self.config
    }

    #[must_use]
    pub fn paths(&self) -> &ResolvedPaths {
        &self.paths
    }

    #[must_use]
    pub fn git(&self) -> &G {
        &self.git
    }

    /// Verify the working branch.
    ///
    /// # Errors
    ///
    /// Returns [`AutopilotError::BranchGuard`] if the branch differs or
    /// cannot be determined.
    pub fn check_branch(&self) -> Result<()> {
        let expected = &self.config.required_branch;
        let actual = self
            .git
            .current_branch()
            .unwrap_or_else(|e| format!("<unknown: {e}>"));
        if &actual != expected {
            return Err(AutopilotError::BranchGuard {
                expected: expected.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Run a single cycle, then publish if opted in.
    ///
    /// # Errors
    ///
    /// Returns an error on a precondition failure or a document I/O failure.
    /// A commit/push failure is an error only when the cycle decided to
    /// continue; an escalate or pivot decision is returned regardless so its
    /// exit code reaches the caller.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        self.check_branch()?;
        let _lock = InstanceLock::acquire(&self.paths.lock)?;
        let report = self.execute_cycle().await?;
        if let Err(e) = self.publish_changes() {
            if e.is_fatal() || !report.decision.stops_loop() {
                return Err(e);
            }
            warn!("Publishing failed after {} decision: {}", report.decision, e);
        }
        Ok(report)
    }

    /// Run cycles until a decision stops the loop.
    ///
    /// Sleeps `sleep` between cycles. There is no cancellation other than
    /// process termination. Commit/push failures are logged and the loop
    /// carries on; the next cycle's commit picks the changes up.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error.
    pub async fn run_loop<F>(&self, sleep: Duration, mut on_cycle: F) -> Result<CycleReport>
    where
        F: FnMut(&CycleReport),
    {
        self.check_branch()?;
        let _lock = InstanceLock::acquire(&self.paths.lock)?;

        loop {
            self.check_branch()?;
            let report = self.execute_cycle().await?;
            if let Err(e) = self.publish_changes() {
                if e.is_fatal() {
                    return Err(e);
                }
                warn!("Publishing failed, continuing: {}", e);
            }
            on_cycle(&report);

            if report.decision.stops_loop() {
                return Ok(report);
            }
            tokio::time::sleep(sleep).await;
        }
    }

    fn publish_changes(&self) -> Result<()> {
        if !self.options.commit {
            return Ok(());
        }
        commit_and_push(&self.git, &self.paths.publishable(), self.options.push)?;
        Ok(())
    }

    /// Fetch, execute, score and persist. Assumes the guard and lock are held.
    async fn execute_cycle(&self) -> Result<CycleReport> {
        info!("Cycle start");

        let state_doc = JsonDocument::new(&self.paths.state);
        let queue_doc = JsonDocument::new(&self.paths.queue);
        let snapshot_doc = JsonDocument::new(&self.paths.snapshot);

        let mut state: CycleState = state_doc.load_or_default()?;
        let mut queue: TaskQueue = queue_doc.load_or_default()?;
        let previous: Option<Snapshot> = snapshot_doc.load_lenient();

        let snapshot = SnapshotFetcher::standard(&self.provider, self.config.fetch.clone(), previous)
            .fetch(&self.config.entities, now_utc())
            .await;
        snapshot_doc.save_atomic(&snapshot)?;
        info!("Market snapshot updated");

        let executor = TaskExecutor::new(&self.runner, EscalationLog::new(&self.paths.escalations));
        let outcome = executor.advance(&mut queue, &mut state, now_utc()).await?;
        if outcome.mutates_queue() {
            queue_doc.save_atomic(&queue)?;
        }
        info!("Task result: {}", outcome);

        let engine = ScoreEngine::new(&self.config.entities, &self.config.self_entity);
        let scores = engine.compute(&snapshot, &state.boost);
        let total = engine.self_total(&scores);
        let delta = score_delta(state.last_total, total);

        state.apply_outcome(outcome, delta);
        state.last_total = Some(total);
        state.last_task_result = Some(outcome);
        state.last_cycle_at = Some(now_utc());
        state_doc.save_atomic(&state)?;

        MarkdownPublisher::new(&self.paths).publish(&self.config, &snapshot, &scores, delta)?;

        let decision = Decision::from_cycle(outcome, &state, self.config.stagnation_limit);
        info!(
            "{} score: {} (delta {:+}), decision: {}",
            self.config.self_entity, total, delta, decision
        );

        Ok(CycleReport {
            outcome,
            scores,
            total,
            delta,
            no_delta_cycles: state.no_delta_cycles,
            decision,
            captured_at: snapshot.updated_at,
        })
    }
}
