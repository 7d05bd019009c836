//! Configuration management for the autopilot loop.
//!
//! Configuration is read from an optional `autopilot.toml` at the project
//! root. Every field has a default, so a project without the file runs the
//! built-in comparison set against the `develop` branch.

pub mod validation;

pub use validation::validate;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AutopilotError, Result};
use crate::market::RepoMetrics;
use crate::score::BaseScores;

/// Config file name at the project root.
pub const CONFIG_FILENAME: &str = "autopilot.toml";

/// Project configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutopilotConfig {
    /// Branch the loop is allowed to run on.
    pub required_branch: String,

    /// Key of the entity being improved.
    pub self_entity: String,

    /// Consecutive no-delta completed-task cycles that trigger a pivot.
    pub stagnation_limit: u32,

    /// Sleep between cycles in `--loop` mode.
    pub loop_sleep_secs: u64,

    /// Program and leading arguments used to run task commands.
    pub task_shell: Vec<String>,

    pub fetch: FetchConfig,

    pub paths: PathsConfig,

    /// Tracked entities, in report order.
    pub entities: Vec<EntityConfig>,
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            required_branch: "develop".to_string(),
            self_entity: "fileview".to_string(),
            stagnation_limit: 2,
            loop_sleep_secs: 1800,
            task_shell: vec!["/bin/sh".to_string(), "-c".to_string()],
            fetch: FetchConfig::default(),
            paths: PathsConfig::default(),
            entities: default_entities(),
        }
    }
}

impl AutopilotConfig {
    /// Load configuration from a project directory.
    ///
    /// Returns the defaults when no config file exists.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed,
    /// or if the resulting configuration fails validation.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config = Self::load_unchecked(project_dir)?;
        validate(&config)?;
        Ok(config)
    }

    /// Read and parse the config file without validating it.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn load_unchecked(project_dir: &Path) -> Result<Self> {
        let path = Self::config_path(project_dir);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| AutopilotError::config_with_path(e.to_string(), path.clone()))?;
        toml::from_str(&content).map_err(|e| AutopilotError::config_with_path(e.to_string(), path))
    }

    /// Get the config file path for a project
    #[must_use]
    pub fn config_path(project_dir: &Path) -> PathBuf {
        project_dir.join(CONFIG_FILENAME)
    }

    /// Look up an entity by key.
    #[must_use]
    pub fn entity(&self, key: &str) -> Option<&EntityConfig> {
        self.entities.iter().find(|e| e.key == key)
    }

    /// Between-cycle sleep as a duration.
    #[must_use]
    pub fn loop_sleep(&self) -> Duration {
        Duration::from_secs(self.loop_sleep_secs)
    }
}

/// Live metrics retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Attempts per entity before falling back.
    pub attempts: u32,
    /// Sleep between attempts.
    pub backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_ms: 1000,
        }
    }
}

impl FetchConfig {
    #[must_use]
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Locations of persisted documents, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub queue: PathBuf,
    pub state: PathBuf,
    pub snapshot: PathBuf,
    pub score_report: PathBuf,
    pub scorecard: PathBuf,
    pub escalations: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            queue: PathBuf::from("tasks/queue.json"),
            state: PathBuf::from("data/autopilot_state.json"),
            snapshot: PathBuf::from("data/market_snapshot.json"),
            score_report: PathBuf::from("score.md"),
            scorecard: PathBuf::from("docs/COMPETITIVE_SCORECARD.md"),
            escalations: PathBuf::from("tasks/escalations.md"),
        }
    }
}

impl PathsConfig {
    /// Resolve every path against the project directory.
    #[must_use]
    pub fn resolve(&self, project_dir: &Path) -> ResolvedPaths {
        ResolvedPaths {
            queue: project_dir.join(&self.queue),
            state: project_dir.join(&self.state),
            snapshot: project_dir.join(&self.snapshot),
            score_report: project_dir.join(&self.score_report),
            scorecard: project_dir.join(&self.scorecard),
            escalations: project_dir.join(&self.escalations),
            lock: project_dir
                .join(&self.state)
                .with_file_name(crate::persistence::LOCK_FILENAME),
        }
    }
}

/// Absolute document locations for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub queue: PathBuf,
    pub state: PathBuf,
    pub snapshot: PathBuf,
    pub score_report: PathBuf,
    pub scorecard: PathBuf,
    pub escalations: PathBuf,
    pub lock: PathBuf,
}

impl ResolvedPaths {
    /// Paths handed to the commit guard after a cycle.
    #[must_use]
    pub fn publishable(&self) -> Vec<PathBuf> {
        vec![
            self.score_report.clone(),
            self.scorecard.clone(),
            self.queue.clone(),
            self.state.clone(),
            self.snapshot.clone(),
            self.escalations.clone(),
        ]
    }
}

/// One tracked competitor or the product itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    pub key: String,
    /// GitHub `owner/name`.
    pub repo: String,
    pub product: i64,
    pub ai_fit: i64,
    pub reliability: i64,
    /// Metrics used when neither a live fetch nor a prior snapshot exists.
    #[serde(default)]
    pub fallback: RepoMetrics,
}

impl EntityConfig {
    #[must_use]
    pub fn base(&self) -> BaseScores {
        BaseScores {
            product: self.product,
            ai_fit: self.ai_fit,
            reliability: self.reliability,
        }
    }
}

fn entity(
    key: &str,
    repo: &str,
    (product, ai_fit, reliability): (i64, i64, i64),
    fallback: RepoMetrics,
) -> EntityConfig {
    EntityConfig {
        key: key.to_string(),
        repo: repo.to_string(),
        product,
        ai_fit,
        reliability,
        fallback,
    }
}

/// Built-in comparison set.
#[must_use]
pub fn default_entities() -> Vec<EntityConfig> {
    vec![
        entity(
            "fileview",
            "Hiro-Chiba/fileview",
            (22, 18, 10),
            RepoMetrics::new(0, 0, 0),
        ),
        entity(
            "yazi",
            "sxyazi/yazi",
            (33, 6, 12),
            RepoMetrics::new(32179, 701, 73),
        ),
        entity("lf", "gokcehan/lf", (24, 3, 13), RepoMetrics::new(9026, 359, 66)),
        entity("nnn", "jarun/nnn", (24, 3, 14), RepoMetrics::new(21191, 798, 2)),
        entity(
            "ranger",
            "ranger/ranger",
            (29, 4, 13),
            RepoMetrics::new(16834, 923, 921),
        ),
    ]
}
