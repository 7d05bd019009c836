//! Cycle state carried between cycles.
//!
//! Persisted as `data/autopilot_state.json`. The cycle controller is the
//! only writer: it loads the document once per cycle, mutates it in memory
//! and replaces it atomically at the end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::queue::TaskOutcome;
use crate::score::Boost;

/// Persistent loop state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleState {
    /// Cumulative boost applied to the self-entity. Never decreases.
    #[serde(rename = "fileview_boost", default)]
    pub boost: Boost,

    /// Self-entity total recorded by the previous cycle.
    #[serde(default)]
    pub last_total: Option<i64>,

    /// Consecutive completed-task cycles that produced no score delta.
    #[serde(default)]
    pub no_delta_cycles: u32,

    /// Ids of tasks completed by the loop, in completion order.
    #[serde(default)]
    pub completed_tasks: Vec<String>,

    #[serde(default)]
    pub last_task_result: Option<TaskOutcome>,

    #[serde(default)]
    pub last_cycle_at: Option<DateTime<Utc>>,
}

impl CycleState {
    /// Record a completed task id once.
    pub fn record_completed(&mut self, id: &str) {
        if !self.completed_tasks.iter().any(|t| t == id) {
            self.completed_tasks.push(id.to_string());
        }
    }

    /// Update the stagnation counter for this cycle's outcome.
    ///
    /// Only a `done` outcome touches the counter: zero delta increments it,
    /// nonzero delta resets it. Every other outcome leaves it unchanged.
    pub fn apply_outcome(&mut self, outcome: TaskOutcome, delta: i64) {
        if outcome != TaskOutcome::Done {
            return;
        }
        if delta == 0 {
            self.no_delta_cycles = self.no_delta_cycles.saturating_add(1);
        } else {
            self.no_delta_cycles = 0;
        }
    }

    /// Check whether the stagnation limit has been reached.
    #[must_use]
    pub fn is_stagnant(&self, limit: u32) -> bool {
        self.no_delta_cycles >= limit
    }
}
