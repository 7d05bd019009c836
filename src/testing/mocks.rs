//! Mock implementations of testing traits.
//!
//! These mocks provide controllable test doubles for external dependencies,
//! enabling deterministic unit tests.

use super::traits::{CommandOutput, CommandRunner, GitOperations, MetricsProvider};
use crate::market::RepoMetrics;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Mock implementation of git operations.
///
/// # Example
///
/// ```rust,ignore
/// let git = MockGitOperations::new().with_branch("main");
/// assert_eq!(git.current_branch().unwrap(), "main");
/// ```
#[derive(Debug)]
pub struct MockGitOperations {
    branch: Option<String>,
    has_changes: bool,
    commit_error: Option<String>,
    push_error: Option<String>,
    staged: Mutex<Vec<PathBuf>>,
    commits: Mutex<Vec<String>>,
    push_count: AtomicU32,
}

impl Default for MockGitOperations {
    fn default() -> Self {
        Self {
            branch: Some("develop".to_string()),
            has_changes: true,
            commit_error: None,
            push_error: None,
            staged: Mutex::new(Vec::new()),
            commits: Mutex::new(Vec::new()),
            push_count: AtomicU32::new(0),
        }
    }
}

impl MockGitOperations {
    /// Create a new mock on the `develop` branch with pending changes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current branch name.
    #[must_use]
    pub fn with_branch(mut self, branch: &str) -> Self {
        self.branch = Some(branch.to_string());
        self
    }

    /// Simulate running outside a git repository.
    #[must_use]
    pub fn without_repository(mut self) -> Self {
        self.branch = None;
        self
    }

    /// Report nothing staged after `stage`.
    #[must_use]
    pub fn with_clean_tree(mut self) -> Self {
        self.has_changes = false;
        self
    }

    /// Configure commit to fail with an error.
    #[must_use]
    pub fn with_commit_error(mut self, error: &str) -> Self {
        self.commit_error = Some(error.to_string());
        self
    }

    /// Configure push to fail with an error.
    #[must_use]
    pub fn with_push_error(mut self, error: &str) -> Self {
        self.push_error = Some(error.to_string());
        self
    }

    /// Commit messages recorded so far.
    pub fn commits(&self) -> Vec<String> {
        self.commits.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Paths staged so far.
    pub fn staged(&self) -> Vec<PathBuf> {
        self.staged.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Number of successful pushes.
    pub fn push_count(&self) -> u32 {
        self.push_count.load(Ordering::SeqCst)
    }
}

impl GitOperations for MockGitOperations {
    fn current_branch(&self) -> Result<String> {
        match &self.branch {
            Some(branch) => Ok(branch.clone()),
            None => bail!("Not in a git repository"),
        }
    }

    fn stage(&self, paths: &[PathBuf]) -> Result<()> {
        if let Ok(mut staged) = self.staged.lock() {
            staged.extend(paths.iter().cloned());
        }
        Ok(())
    }

    fn has_staged_changes(&self) -> Result<bool> {
        Ok(self.has_changes)
    }

    fn commit(&self, message: &str) -> Result<()> {
        if let Some(ref error) = self.commit_error {
            bail!("{}", error)
        }
        if let Ok(mut commits) = self.commits.lock() {
            commits.push(message.to_string());
        }
        Ok(())
    }

    fn push(&self) -> Result<()> {
        if let Some(ref error) = self.push_error {
            bail!("{}", error)
        }
        self.push_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Mock implementation of the repository metrics provider.
///
/// Repositories without a configured response fail every attempt.
///
/// # Example
///
/// ```rust,ignore
/// let provider = MockMetricsProvider::new()
///     .with_metrics("sxyazi/yazi", RepoMetrics::new(40000, 900, 80));
/// ```
#[derive(Debug, Default)]
pub struct MockMetricsProvider {
    responses: HashMap<String, RepoMetrics>,
    failures_before_success: HashMap<String, u32>,
    calls: Mutex<HashMap<String, u32>>,
}

impl MockMetricsProvider {
    /// Create a provider that fails for every repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `metrics` for `repo`.
    #[must_use]
    pub fn with_metrics(mut self, repo: &str, metrics: RepoMetrics) -> Self {
        self.responses.insert(repo.to_string(), metrics);
        self
    }

    /// Fail the first `failures` attempts for `repo` before answering.
    #[must_use]
    pub fn with_transient_failures(mut self, repo: &str, failures: u32) -> Self {
        self.failures_before_success
            .insert(repo.to_string(), failures);
        self
    }

    /// Number of fetch attempts made for `repo`.
    pub fn call_count(&self, repo: &str) -> u32 {
        self.calls
            .lock()
            .map(|c| c.get(repo).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait]
impl MetricsProvider for MockMetricsProvider {
    async fn fetch(&self, repo: &str) -> Result<RepoMetrics> {
        let attempt = {
            let mut calls = self
                .calls
                .lock()
                .map_err(|_| anyhow::anyhow!("call counter poisoned"))?;
            let count = calls.entry(repo.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let failures = self
            .failures_before_success
            .get(repo)
            .copied()
            .unwrap_or(0);
        if attempt <= failures {
            bail!("transient failure fetching {}", repo)
        }

        match self.responses.get(repo) {
            Some(metrics) => Ok(metrics.clone()),
            None => bail!("no metrics for {}", repo),
        }
    }
}

/// Mock implementation of the command execution environment.
///
/// Commands succeed unless configured otherwise.
///
/// # Example
///
/// ```rust,ignore
/// let runner = MockCommandRunner::new()
///     .with_output("make lint", CommandOutput::failure(2, "lint failed"));
/// ```
#[derive(Debug, Default)]
pub struct MockCommandRunner {
    outputs: HashMap<String, CommandOutput>,
    spawn_error: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl MockCommandRunner {
    /// Create a runner where every command exits 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `output` when `command` is run.
    #[must_use]
    pub fn with_output(mut self, command: &str, output: CommandOutput) -> Self {
        self.outputs.insert(command.to_string(), output);
        self
    }

    /// Fail to spawn every command.
    #[must_use]
    pub fn with_spawn_error(mut self, error: &str) -> Self {
        self.spawn_error = Some(error.to_string());
        self
    }

    /// Commands run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CommandRunner for MockCommandRunner {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.to_string());
        }

        if let Some(ref error) = self.spawn_error {
            bail!("{}", error)
        }

        Ok(self
            .outputs
            .get(command)
            .cloned()
            .unwrap_or_else(CommandOutput::success))
    }
}
