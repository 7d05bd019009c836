//! Task queue model.
//!
//! The queue (`tasks/queue.json`) is authored outside the loop. The loop
//! only ever moves a task out of `todo`, one task per cycle. Tasks it did
//! not change are written back exactly as they were read, nulls and
//! unknown fields included; a changed task is patched over its original
//! object.

pub mod escalation;
pub mod executor;

pub use escalation::EscalationLog;
pub use executor::{tail_chars, TaskExecutor, RESULT_TAIL_CHARS};

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::score::Boost;

/// Whether a task may run unattended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    #[default]
    Normal,
    /// Requires a human decision; never executed by the loop.
    Major,
}

/// Task lifecycle status.
///
/// `todo` moves to exactly one of the other states, once. Any status the
/// loop does not know (including `null`) reads as [`TaskStatus::Unrecognized`]
/// and is skipped like a finished task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    Blocked,
    Failed,
    Done,
    #[serde(other)]
    Unrecognized,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Todo => write!(f, "todo"),
            Self::Blocked => write!(f, "blocked"),
            Self::Failed => write!(f, "failed"),
            Self::Done => write!(f, "done"),
            Self::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_status_is_unrecognized<'de, D>(deserializer: D) -> Result<TaskStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<TaskStatus>::deserialize(deserializer)?.unwrap_or(TaskStatus::Unrecognized))
}

/// One improvement task.
///
/// Every field but `id` may be missing or `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub kind: TaskKind,
    #[serde(default, deserialize_with = "null_status_is_unrecognized")]
    pub status: TaskStatus,
    /// Shell instruction to run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Increments merged into the cumulative boost on success.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Boost::is_zero"
    )]
    pub boost: Boost,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Fields the loop does not interpret, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    /// Creates a normal `todo` task with no command.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind: TaskKind::Normal,
            status: TaskStatus::Todo,
            command: None,
            boost: Boost::default(),
            result: None,
            completed_at: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: TaskKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    #[must_use]
    pub fn with_boost(mut self, boost: Boost) -> Self {
        self.boost = boost;
        self
    }

    /// The command, if present and not blank.
    #[must_use]
    pub fn runnable_command(&self) -> Option<&str> {
        self.command
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// A task as it was read, kept so unchanged tasks round-trip verbatim.
#[derive(Debug, Clone, PartialEq)]
struct LoadedTask {
    parsed: Task,
    raw: Value,
}

/// The persisted task queue document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskQueue {
    pub tasks: Vec<Task>,
    /// Top-level fields other than `tasks`.
    pub extra: Map<String, Value>,
    loaded: Vec<LoadedTask>,
}

#[derive(Deserialize)]
struct RawQueue {
    #[serde(default)]
    tasks: Option<Vec<Value>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Serialize)]
struct RawQueueOut<'a> {
    tasks: Vec<Value>,
    #[serde(flatten)]
    extra: &'a Map<String, Value>,
}

impl<'de> Deserialize<'de> for TaskQueue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawQueue::deserialize(deserializer)?;
        let loaded = raw
            .tasks
            .unwrap_or_default()
            .into_iter()
            .map(|raw| {
                Task::deserialize(&raw)
                    .map(|parsed| LoadedTask { parsed, raw })
                    .map_err(D::Error::custom)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            tasks: loaded.iter().map(|t| t.parsed.clone()).collect(),
            extra: raw.extra,
            loaded,
        })
    }
}

impl Serialize for TaskQueue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let tasks = self
            .tasks
            .iter()
            .enumerate()
            .map(|(i, task)| self.task_value(i, task))
            .collect::<Result<Vec<_>, _>>()
            .map_err(S::Error::custom)?;

        RawQueueOut {
            tasks,
            extra: &self.extra,
        }
        .serialize(serializer)
    }
}

impl TaskQueue {
    #[must_use]
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            extra: Map::new(),
            loaded: Vec::new(),
        }
    }

    /// JSON for the task at `index`: the original object if unchanged, the
    /// original patched with the task's fields if changed.
    fn task_value(&self, index: usize, task: &Task) -> serde_json::Result<Value> {
        let Some(loaded) = self.loaded.get(index).filter(|l| l.parsed.id == task.id) else {
            return serde_json::to_value(task);
        };
        if loaded.parsed == *task {
            return Ok(loaded.raw.clone());
        }

        let patch = serde_json::to_value(task)?;
        match (loaded.raw.clone(), patch) {
            (Value::Object(mut original), Value::Object(fields)) => {
                original.extend(fields);
                Ok(Value::Object(original))
            }
            (_, patch) => Ok(patch),
        }
    }

    /// Index of the first `todo` task in queue order.
    #[must_use]
    pub fn next_pending(&self) -> Option<usize> {
        self.tasks.iter().position(|t| t.status == TaskStatus::Todo)
    }

    /// Number of tasks in `status`.
    #[must_use]
    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }
}

/// What the executor did with the queue this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    /// No `todo` task was found.
    NoTask,
    /// A major task was escalated and left in `todo`.
    Major,
    /// The selected task had no command.
    Blocked,
    /// The command exited nonzero or could not be spawned.
    Failed,
    /// The command succeeded.
    Done,
}

impl TaskOutcome {
    /// True if the executor changed the queue document.
    #[must_use]
    pub fn mutates_queue(&self) -> bool {
        matches!(self, Self::Blocked | Self::Failed | Self::Done)
    }
}

impl std::fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoTask => write!(f, "no_task"),
            Self::Major => write!(f, "major"),
            Self::Blocked => write!(f, "blocked"),
            Self::Failed => write!(f, "failed"),
            Self::Done => write!(f, "done"),
        }
    }
}
