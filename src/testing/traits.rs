//! Trait definitions for testable abstractions.
//!
//! These traits abstract the loop's external collaborators so the cycle
//! controller can be exercised without a git repository, network access
//! or a real shell.

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;

use crate::market::RepoMetrics;

/// Abstraction for the version-control guard and publisher.
///
/// # Example
///
/// ```rust,ignore
/// use autopilot::testing::GitOperations;
///
/// fn on_branch(git: &impl GitOperations, branch: &str) -> bool {
///     git.current_branch().map(|b| b == branch).unwrap_or(false)
/// }
/// ```
pub trait GitOperations {
    /// Get the current branch name.
    ///
    /// # Errors
    ///
    /// Returns an error if not in a git repository.
    fn current_branch(&self) -> Result<String>;

    /// Stage the given paths. Paths that do not exist are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if git cannot be run.
    fn stage(&self, paths: &[PathBuf]) -> Result<()>;

    /// Check whether anything is staged for commit.
    ///
    /// # Errors
    ///
    /// Returns an error if git cannot be run.
    fn has_staged_changes(&self) -> Result<bool>;

    /// Commit the staged changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    fn commit(&self, message: &str) -> Result<()>;

    /// Push the current branch to its upstream.
    ///
    /// # Errors
    ///
    /// Returns an error if push fails (auth, network, etc.).
    fn push(&self) -> Result<()>;
}

/// Abstraction for the repository metrics provider.
///
/// Implementations perform a single attempt; retry and fallback are
/// handled by [`crate::market::SnapshotFetcher`].
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Fetch current metrics for an `owner/name` repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics could not be retrieved.
    async fn fetch(&self, repo: &str) -> Result<RepoMetrics>;
}

/// Exit status and captured error output of a task command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stderr: String,
}

impl CommandOutput {
    /// A zero-exit result with no error output.
    #[must_use]
    pub fn success() -> Self {
        Self {
            exit_code: 0,
            stderr: String::new(),
        }
    }

    /// A failing result with the given exit code and error output.
    #[must_use]
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stderr: stderr.into(),
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Abstraction for the command execution environment.
///
/// The instruction string is opaque to the loop. Execution has no timeout:
/// a command that never exits blocks the cycle until the process is killed.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a shell instruction and wait for it to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the process could not be spawned.
    async fn run(&self, command: &str) -> Result<CommandOutput>;
}
