//! Cycle control: state, decisions and the controller.
//!
//! One cycle runs fetch → execute → score → persist → publish and ends in a
//! [`Decision`]. Escalation and stagnation are designed halts, not errors;
//! they are signalled through distinct exit codes.

pub mod controller;
pub mod state;

pub use controller::{commit_and_push, CycleController, CycleOptions};
pub use state::CycleState;

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;

use crate::queue::TaskOutcome;
use crate::score::Scoreboard;

/// Exit status for a cycle that wants to keep going.
pub const EXIT_CONTINUE: i32 = 0;

/// Exit status when a major task needs a human decision.
pub const EXIT_ESCALATE: i32 = 10;

/// Exit status when the loop has stagnated and needs a new direction.
pub const EXIT_PIVOT: i32 = 11;

/// Current UTC time truncated to whole seconds.
#[must_use]
pub fn now_utc() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// What the loop driver should do after a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Continue,
    /// A major task was surfaced; stop until a human acts.
    Escalate,
    /// Completed tasks stopped moving the score; stop and change strategy.
    Pivot,
}

impl Decision {
    /// Derive the decision from this cycle's outcome and updated state.
    ///
    /// Escalation takes precedence over stagnation.
    #[must_use]
    pub fn from_cycle(outcome: TaskOutcome, state: &CycleState, stagnation_limit: u32) -> Self {
        if outcome == TaskOutcome::Major {
            Self::Escalate
        } else if state.is_stagnant(stagnation_limit) {
            Self::Pivot
        } else {
            Self::Continue
        }
    }

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Continue => EXIT_CONTINUE,
            Self::Escalate => EXIT_ESCALATE,
            Self::Pivot => EXIT_PIVOT,
        }
    }

    /// True if a `--loop` run must stop after this decision.
    #[must_use]
    pub fn stops_loop(&self) -> bool {
        !matches!(self, Self::Continue)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Continue => write!(f, "continue"),
            Self::Escalate => write!(f, "escalate"),
            Self::Pivot => write!(f, "pivot"),
        }
    }
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub outcome: TaskOutcome,
    pub scores: Scoreboard,
    /// Self-entity total after this cycle.
    pub total: i64,
    /// Change in the self-entity total since the previous cycle.
    pub delta: i64,
    pub no_delta_cycles: u32,
    pub decision: Decision,
    pub captured_at: DateTime<Utc>,
}
