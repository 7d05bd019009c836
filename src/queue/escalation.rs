//! Append-only escalation log.
//!
//! One line per escalation event. The file is only ever opened in append
//! mode; existing content is never rewritten or truncated.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;

use super::Task;
use crate::error::Result;

/// Header written when the log is first created.
pub const ESCALATION_HEADER: &str = "# Escalations\n\n";

/// Severity marker recorded on every escalation line.
pub const SEVERITY_MARKER: &str = "kind=major";

fn single_line_field(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '\r' | '\n' => ' ',
            '|' => '/',
            other => other,
        })
        .collect()
}

/// Escalation log at a fixed path.
#[derive(Debug, Clone)]
pub struct EscalationLog {
    path: PathBuf,
}

impl EscalationLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format one escalation line, including the trailing newline.
    ///
    /// Line breaks in the id and title become spaces and `|` becomes `/`,
    /// so every event stays on a single line with five columns.
    #[must_use]
    pub fn format_line(task: &Task, at: DateTime<Utc>) -> String {
        format!(
            "- {} | {} | {} | {} | action required\n",
            at.to_rfc3339_opts(SecondsFormat::Secs, true),
            single_line_field(&task.id),
            single_line_field(&task.title),
            SEVERITY_MARKER
        )
    }

    /// Append an escalation for `task`.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be created or appended to.
    pub fn append(&self, task: &Task, at: DateTime<Utc>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut entry = String::new();
        if file.metadata()?.len() == 0 {
            entry.push_str(ESCALATION_HEADER);
        }
        entry.push_str(&Self::format_line(task, at));
        file.write_all(entry.as_bytes())?;
        file.sync_all()?;

        info!("Escalated major task {} to {}", task.id, self.path.display());
        Ok(())
    }
}
