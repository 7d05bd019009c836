//! Markdown reports rendered after each cycle.
//!
//! Two documents are produced from the snapshot and scoreboard:
//! - the score report (`score.md`): rubric, current scores, delta, market
//!   snapshot and the loop rule
//! - the competitive scorecard (`docs/COMPETITIVE_SCORECARD.md`): market
//!   snapshot only

use std::path::PathBuf;

use crate::config::{AutopilotConfig, ResolvedPaths};
use crate::error::Result;
use crate::market::Snapshot;
use crate::persistence::write_atomic;
use crate::score::{Dimension, Scoreboard};

/// Format an integer with `,` thousands separators.
#[must_use]
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn market_table(config: &AutopilotConfig, snapshot: &Snapshot) -> Vec<String> {
    let mut lines = vec![
        "| Repo | Stars | Forks | Open Issues |".to_string(),
        "|---|---:|---:|---:|".to_string(),
    ];
    for entity in &config.entities {
        let metrics = snapshot.get(&entity.key).cloned().unwrap_or_default();
        lines.push(format!(
            "| {} | {} | {} | {} |",
            entity.repo,
            thousands(metrics.stargazers_count),
            thousands(metrics.forks_count),
            thousands(metrics.open_issues_count)
        ));
    }
    lines
}

/// Render `score.md`.
///
/// Competitors are listed by descending total with the self-entity last.
#[must_use]
pub fn render_score_report(
    config: &AutopilotConfig,
    snapshot: &Snapshot,
    scores: &Scoreboard,
    delta: i64,
) -> String {
    let me = config.self_entity.as_str();
    let mut lines = vec![
        format!("# {me} Competitive Score (Snapshot)"),
        String::new(),
        format!("Updated: {}", snapshot.updated_at.date_naive()),
        String::new(),
        "## Score Model (100)".to_string(),
        String::new(),
    ];
    for dimension in Dimension::all() {
        lines.push(format!("- {}: {}", dimension.label(), dimension.weight()));
    }
    lines.extend([
        String::new(),
        "## Current Scores".to_string(),
        String::new(),
        "| Product | Total | Product | AI Fit | Reliability | Ecosystem | Momentum |".to_string(),
        "|---|---:|---:|---:|---:|---:|---:|".to_string(),
    ]);

    let mut rows: Vec<_> = scores.ranked().into_iter().filter(|(k, _)| *k != me).collect();
    if let Some(own) = scores.get(me) {
        rows.push((me, own));
    }
    for (key, s) in rows {
        lines.push(format!(
            "| {} | {} | {} | {} | {} | {} | {} |",
            key, s.total, s.product, s.ai_fit, s.reliability, s.ecosystem, s.momentum
        ));
    }

    lines.extend([
        String::new(),
        "## Score Delta (this cycle)".to_string(),
        String::new(),
        format!("- {me} total delta: {delta:+}"),
        String::new(),
        "## Market Snapshot".to_string(),
        String::new(),
    ]);
    lines.extend(market_table(config, snapshot));
    lines.extend([
        String::new(),
        "## Loop Rule".to_string(),
        String::new(),
        "1. Market research update".to_string(),
        format!(
            "2. Implement one measurable improvement from {}",
            config.paths.queue.display()
        ),
        "3. Re-score in this file".to_string(),
        "4. Record before/after delta".to_string(),
        "5. Repeat".to_string(),
        String::new(),
        format!(
            "If no score delta appears for {} cycles, pivot theme immediately.",
            config.stagnation_limit
        ),
    ]);

    lines.join("\n") + "\n"
}

/// Render the competitive scorecard.
#[must_use]
pub fn render_scorecard(config: &AutopilotConfig, snapshot: &Snapshot) -> String {
    let mut lines = vec![
        "# Competitive Scorecard".to_string(),
        String::new(),
        format!("Last updated: {}", snapshot.updated_at.date_naive()),
        String::new(),
        "## Market Snapshot".to_string(),
        String::new(),
    ];
    lines.extend(market_table(config, snapshot));
    lines.extend([
        String::new(),
        "## Notes".to_string(),
        String::new(),
        format!(
            "- Source of truth for loop score: `{}`",
            config.paths.score_report.display()
        ),
        format!(
            "- Autopilot updates this file from `{}`",
            config.paths.snapshot.display()
        ),
    ]);
    lines.join("\n") + "\n"
}

/// Writes both reports to their configured locations.
#[derive(Debug, Clone)]
pub struct MarkdownPublisher {
    score_report: PathBuf,
    scorecard: PathBuf,
}

impl MarkdownPublisher {
    #[must_use]
    pub fn new(paths: &ResolvedPaths) -> Self {
        Self {
            score_report: paths.score_report.clone(),
            scorecard: paths.scorecard.clone(),
        }
    }

    /// Render and write both reports.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be written.
    pub fn publish(
        &self,
        config: &AutopilotConfig,
        snapshot: &Snapshot,
        scores: &Scoreboard,
        delta: i64,
    ) -> Result<()> {
        write_atomic(
            &self.score_report,
            render_score_report(config, snapshot, scores, delta).as_bytes(),
        )?;
        write_atomic(
            &self.scorecard,
            render_scorecard(config, snapshot).as_bytes(),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{Boost, ScoreEngine};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn fixture() -> (AutopilotConfig, Snapshot, Scoreboard) {
        let config = AutopilotConfig::default();
        let snapshot = config.entities.iter().fold(
            Snapshot::new(Utc.with_ymd_and_hms(2026, 10, 15, 6, 0, 0).unwrap()),
            |s, e| s.with_repo(e.key.clone(), e.fallback.clone()),
        );
        let scores =
            ScoreEngine::new(&config.entities, &config.self_entity).compute(&snapshot, &Boost::default());
        (config, snapshot, scores)
    }

    #[test]
    fn test_thousands() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(32179), "32,179");
        assert_eq!(thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_score_report_orders_self_last() {
        let (config, snapshot, scores) = fixture();
        let report = render_score_report(&config, &snapshot, &scores, 3);

        let rows: Vec<&str> = report
            .lines()
            .filter(|l| l.starts_with("| ") && !l.starts_with("| Product") && !l.starts_with("| Repo"))
            .take(5)
            .collect();
        assert!(rows[0].starts_with("| yazi | 67 |"));
        assert!(rows[1].starts_with("| ranger |"));
        assert!(rows[4].starts_with("| fileview | 52 |"));
    }

    #[test]
    fn test_score_report_sections() {
        let (config, snapshot, scores) = fixture();
        let report = render_score_report(&config, &snapshot, &scores, 0);
        assert!(report.starts_with("# fileview Competitive Score (Snapshot)\n"));
        assert!(report.contains("Updated: 2026-10-15"));
        assert!(report.contains("- Product capability: 35"));
        assert!(report.contains("- fileview total delta: +0"));
        assert!(report.contains("| sxyazi/yazi | 32,179 | 701 | 73 |"));
        assert!(report.contains("If no score delta appears for 2 cycles"));
        assert!(report.ends_with('\n'));
    }

    #[test]
    fn test_negative_delta_sign() {
        let (config, snapshot, scores) = fixture();
        let report = render_score_report(&config, &snapshot, &scores, -4);
        assert!(report.contains("total delta: -4"));
    }

    #[test]
    fn test_publisher_writes_both_files() {
        let temp = TempDir::new().unwrap();
        let (config, snapshot, scores) = fixture();
        let paths = config.paths.resolve(temp.path());

        MarkdownPublisher::new(&paths)
            .publish(&config, &snapshot, &scores, 1)
            .unwrap();

        assert!(paths.score_report.exists());
        let scorecard = std::fs::read_to_string(&paths.scorecard).unwrap();
        assert!(scorecard.starts_with("# Competitive Scorecard"));
        assert!(scorecard.contains("| ranger/ranger | 16,834 | 923 | 921 |"));
    }
}
