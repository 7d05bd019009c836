//! Configuration validation.
//!
//! Collects every problem in a loaded [`AutopilotConfig`] into a
//! [`ValidationReport`] so `autopilot config validate` can show them all at
//! once, while [`validate`] fails fast on the first error for normal runs.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use super::AutopilotConfig;
use crate::error::{AutopilotError, Result};

fn repo_slug_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+$").expect("valid repo slug regex")
    })
}

/// A single validation problem tied to a config field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub reason: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Result of configuration validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Problems that make the configuration unusable.
    pub errors: Vec<ValidationIssue>,
    /// Suspicious but usable settings.
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Validate a configuration and collect every issue.
    #[must_use]
    pub fn check(config: &AutopilotConfig) -> Self {
        let mut report = Self::default();

        if config.required_branch.trim().is_empty() {
            report.error("required_branch", "must not be empty");
        }

        if config.task_shell.is_empty() {
            report.error("task_shell", "must name a program");
        }

        if config.fetch.attempts == 0 {
            report.error("fetch.attempts", "must be at least 1");
        }

        if config.stagnation_limit == 0 {
            report.warning(
                "stagnation_limit",
                "0 makes every cycle end in a pivot decision",
            );
        }

        if config.entities.is_empty() {
            report.error("entities", "at least one entity is required");
        }

        let mut seen = HashSet::new();
        for (i, entity) in config.entities.iter().enumerate() {
            if entity.key.trim().is_empty() {
                report.error(format!("entities[{i}].key"), "must not be empty");
            } else if !seen.insert(entity.key.as_str()) {
                report.error(
                    format!("entities[{i}].key"),
                    format!("duplicate key '{}'", entity.key),
                );
            }

            if !repo_slug_pattern().is_match(&entity.repo) {
                report.error(
                    format!("entities[{i}].repo"),
                    format!("'{}' is not an owner/name slug", entity.repo),
                );
            }
        }

        if config.entity(&config.self_entity).is_none() {
            report.error(
                "self_entity",
                format!("'{}' is not a configured entity", config.self_entity),
            );
        }

        report
    }

    /// Returns true if the configuration has no errors.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Human-readable one-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_valid() {
            if self.warnings.is_empty() {
                "Configuration is valid.".to_string()
            } else {
                format!(
                    "Configuration is valid with {} warning(s).",
                    self.warnings.len()
                )
            }
        } else {
            format!(
                "Configuration is invalid with {} error(s).",
                self.errors.len()
            )
        }
    }

    fn error(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.errors.push(ValidationIssue {
            field: field.into(),
            reason: reason.into(),
        });
    }

    fn warning(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            field: field.into(),
            reason: reason.into(),
        });
    }
}

/// Validate a configuration, failing on the first error.
///
/// # Errors
///
/// Returns [`AutopilotError::InvalidConfig`] naming the offending field.
pub fn validate(config: &AutopilotConfig) -> Result<()> {
    let report = ValidationReport::check(config);
    match report.errors.into_iter().next() {
        Some(issue) => Err(AutopilotError::invalid_config(issue.field, issue.reason)),
        None => Ok(()),
    }
}
