//! Real implementations of testable traits.
//!
//! These implementations shell out to `git`, the GitHub CLI and the
//! configured task shell. They implement the same traits as the mocks.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

use crate::market::RepoMetrics;
use crate::testing::{CommandOutput, CommandRunner, GitOperations, MetricsProvider};

/// Fields requested from the repository endpoint.
const REPO_FIELDS_JQ: &str = "{stargazers_count,forks_count,open_issues_count,pushed_at}";

/// Real git operations implementation.
///
/// Executes actual git commands in the project directory.
#[derive(Debug, Clone)]
pub struct RealGitOperations {
    project_dir: PathBuf,
}

impl RealGitOperations {
    /// Create a new git operations instance for the given directory.
    #[must_use]
    pub fn new(project_dir: PathBuf) -> Self {
        Self { project_dir }
    }

    fn git(&self, args: &[&str]) -> Result<std::process::Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.project_dir)
            .output()
            .with_context(|| format!("Failed to run git {}", args.join(" ")))
    }
}

impl GitOperations for RealGitOperations {
    fn current_branch(&self) -> Result<String> {
        let output = self.git(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            bail!("Not in a git repository")
        }
    }

    fn stage(&self, paths: &[PathBuf]) -> Result<()> {
        let existing: Vec<&PathBuf> = paths.iter().filter(|p| p.exists()).collect();
        if existing.is_empty() {
            return Ok(());
        }

        let output = Command::new("git")
            .arg("add")
            .arg("--")
            .args(existing)
            .current_dir(&self.project_dir)
            .output()
            .context("Failed to run git add")?;

        if output.status.success() {
            Ok(())
        } else {
            bail!("git add failed: {}", String::from_utf8_lossy(&output.stderr))
        }
    }

    fn has_staged_changes(&self) -> Result<bool> {
        let output = self.git(&["diff", "--cached", "--name-only"])?;
        if output.status.success() {
            Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
        } else {
            bail!("git diff failed: {}", String::from_utf8_lossy(&output.stderr))
        }
    }

    fn commit(&self, message: &str) -> Result<()> {
        let output = self.git(&["commit", "-m", message])?;
        if output.status.success() {
            Ok(())
        } else {
            bail!("Commit failed: {}", String::from_utf8_lossy(&output.stderr))
        }
    }

    fn push(&self) -> Result<()> {
        let output = Command::new("git")
            .arg("push")
            .env("GIT_SSH_COMMAND", "ssh -o BatchMode=yes -o ConnectTimeout=10")
            .current_dir(&self.project_dir)
            .output()
            .context("Failed to push to remote")?;

        if output.status.success() {
            Ok(())
        } else {
            bail!("Push failed: {}", String::from_utf8_lossy(&output.stderr))
        }
    }
}

/// Metrics provider backed by the GitHub CLI (`gh api`).
///
/// Authentication is whatever `gh` is already logged in with.
#[derive(Debug, Clone, Default)]
pub struct GhMetricsProvider;

impl GhMetricsProvider {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// True if a `gh` executable is on `PATH`.
    #[must_use]
    pub fn is_available() -> bool {
        which::which("gh").is_ok()
    }
}

#[async_trait]
impl MetricsProvider for GhMetricsProvider {
    async fn fetch(&self, repo: &str) -> Result<RepoMetrics> {
        if !Self::is_available() {
            bail!("gh CLI not found on PATH");
        }

        debug!("Fetching metrics for {}", repo);
        let output = AsyncCommand::new("gh")
            .args(["api", &format!("repos/{repo}"), "--jq", REPO_FIELDS_JQ])
            .stdin(Stdio::null())
            .output()
            .await
            .context("Failed to run gh api")?;

        if !output.status.success() {
            bail!(
                "gh api repos/{} failed: {}",
                repo,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        serde_json::from_slice(&output.stdout)
            .with_context(|| format!("Unexpected gh api response for {repo}"))
    }
}

/// Runs task commands through the configured shell.
#[derive(Debug, Clone)]
pub struct ShellCommandRunner {
    project_dir: PathBuf,
    shell: Vec<String>,
}

impl ShellCommandRunner {
    /// `shell` is the program followed by its leading arguments, e.g.
    /// `["/bin/sh", "-c"]`. The command string is appended as the last
    /// argument.
    #[must_use]
    pub fn new(project_dir: PathBuf, shell: Vec<String>) -> Self {
        Self { project_dir, shell }
    }
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        let Some((program, leading)) = self.shell.split_first() else {
            bail!("task shell is empty");
        };

        debug!("Running task command: {}", command);
        let output = AsyncCommand::new(program)
            .args(leading)
            .arg(command)
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to spawn {program}"))?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(dir: &TempDir) -> ShellCommandRunner {
        ShellCommandRunner::new(
            dir.path().to_path_buf(),
            vec!["/bin/sh".to_string(), "-c".to_string()],
        )
    }

    #[tokio::test]
    async fn test_shell_runner_success() {
        let temp = TempDir::new().unwrap();
        let output = sh(&temp).run("true").await.unwrap();
        assert!(output.succeeded());
    }

    #[tokio::test]
    async fn test_shell_runner_captures_stderr_and_code() {
        let temp = TempDir::new().unwrap();
        let output = sh(&temp).run("echo boom >&2; exit 3").await.unwrap();
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stderr.trim(), "boom");
    }

    #[tokio::test]
    async fn test_shell_runner_uses_project_dir() {
        let temp = TempDir::new().unwrap();
        sh(&temp).run("touch marker").await.unwrap();
        assert!(temp.path().join("marker").exists());
    }

    #[tokio::test]
    async fn test_missing_shell_is_spawn_error() {
        let temp = TempDir::new().unwrap();
        let runner = ShellCommandRunner::new(
            temp.path().to_path_buf(),
            vec!["/nonexistent/shell".to_string()],
        );
        assert!(runner.run("true").await.is_err());
    }

    #[test]
    fn test_branch_outside_repository_fails() {
        let temp = TempDir::new().unwrap();
        let git = RealGitOperations::new(temp.path().to_path_buf());
        assert!(git.current_branch().is_err());
    }

    #[test]
    fn test_stage_with_no_existing_paths_is_noop() {
        let temp = TempDir::new().unwrap();
        let git = RealGitOperations::new(temp.path().to_path_buf());
        assert!(git.stage(&[temp.path().join("missing.md")]).is_ok());
    }
}
