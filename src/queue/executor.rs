//! Task queue executor.
//!
//! Advances the queue by exactly one task per call:
//!
//! ```text
//! next_pending ──none──> NoTask
//!      │
//!      ├─ kind=major ──> escalate, stay todo ──> Major
//!      ├─ no command ──> blocked ──────────────> Blocked
//!      └─ run command ─┬─ exit != 0 ─> failed ─> Failed
//!                      └─ exit == 0 ─> done, merge boost ─> Done
//! ```
//!
//! The executor holds no state between calls; selection is recomputed from
//! the queue each time.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::{EscalationLog, TaskKind, TaskOutcome, TaskQueue, TaskStatus};
use crate::cycle::CycleState;
use crate::error::Result;
use crate::testing::{CommandOutput, CommandRunner};

/// Maximum characters of error output kept in a failed task's result.
pub const RESULT_TAIL_CHARS: usize = 800;

/// Result recorded on a task that has no command.
pub const MISSING_COMMAND: &str = "missing command";

/// Exit code recorded when the command could not be spawned.
const SPAWN_FAILURE_EXIT: i32 = -1;

/// The last `max` characters of `s`.
#[must_use]
pub fn tail_chars(s: &str, max: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(max)).collect()
}

/// Runs the first pending task through the queue state machine.
pub struct TaskExecutor<'a, R: CommandRunner> {
    runner: &'a R,
    escalations: EscalationLog,
}

impl<'a, R: CommandRunner> TaskExecutor<'a, R> {
    #[must_use]
    pub fn new(runner: &'a R, escalations: EscalationLog) -> Self {
        Self {
            runner,
            escalations,
        }
    }

    /// Advance the queue by one task.
    ///
    /// Mutates at most one task in `queue`. On success, the task's boost is
    /// merged into `state` and its id recorded as completed.
    ///
    /// # Errors
    ///
    /// Returns an error only if a major task's escalation cannot be written.
    /// Command failures are recorded on the task, not returned.
    pub async fn advance(
        &self,
        queue: &mut TaskQueue,
        state: &mut CycleState,
        now: DateTime<Utc>,
    ) -> Result<TaskOutcome> {
        let Some(index) = queue.next_pending() else {
            debug!("No pending task");
            return Ok(TaskOutcome::NoTask);
        };
        let task = &mut queue.tasks[index];

        if task.kind == TaskKind::Major {
            self.escalations.append(task, now)?;
            return Ok(TaskOutcome::Major);
        }

        let Some(command) = task.runnable_command().map(str::to_string) else {
            warn!("Task {} has no command, marking blocked", task.id);
            task.status = TaskStatus::Blocked;
            task.result = Some(MISSING_COMMAND.to_string());
            return Ok(TaskOutcome::Blocked);
        };

        info!("Running task {}: {}", task.id, task.title);
        let output = match self.runner.run(&command).await {
            Ok(output) => output,
            Err(e) => CommandOutput::failure(SPAWN_FAILURE_EXIT, format!("failed to run command: {e}")),
        };

        if !output.succeeded() {
            warn!("Task {} failed with exit code {}", task.id, output.exit_code);
            task.status = TaskStatus::Failed;
            task.result = Some(tail_chars(&output.stderr, RESULT_TAIL_CHARS));
            return Ok(TaskOutcome::Failed);
        }

        task.status = TaskStatus::Done;
        task.completed_at = Some(now);
        state.boost.accumulate(&task.boost);
        state.record_completed(&task.id);
        info!("Task {} done", task.id);
        Ok(TaskOutcome::Done)
    }
}
