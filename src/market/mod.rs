//! Market snapshot data model.
//!
//! A [`Snapshot`] holds one [`RepoMetrics`] record per tracked entity and is
//! replaced wholesale every cycle. Field names match the persisted JSON
//! (`data/market_snapshot.json`) exactly.

pub mod fetcher;

pub use fetcher::{
    fetch_with_retry, DefaultTableSource, LiveSource, MetricsOrigin, MetricsSource,
    PreviousSnapshotSource, SnapshotFetcher,
};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Public metrics for one tracked repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMetrics {
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub open_issues_count: u64,
    /// Last push time; unparseable values read as unknown.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub pushed_at: Option<DateTime<Utc>>,
}

impl RepoMetrics {
    /// Creates a record with no push timestamp.
    #[must_use]
    pub fn new(stars: u64, forks: u64, open_issues: u64) -> Self {
        Self {
            stargazers_count: stars,
            forks_count: forks,
            open_issues_count: open_issues,
            pushed_at: None,
        }
    }

    /// Sets the last push timestamp.
    #[must_use]
    pub fn with_pushed_at(mut self, pushed_at: DateTime<Utc>) -> Self {
        self.pushed_at = Some(pushed_at);
        self
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }))
}

/// Metrics for every tracked entity at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the snapshot was captured.
    pub updated_at: DateTime<Utc>,
    /// Metrics keyed by entity key.
    #[serde(default)]
    pub repos: BTreeMap<String, RepoMetrics>,
}

impl Snapshot {
    /// Creates an empty snapshot captured at `updated_at`.
    #[must_use]
    pub fn new(updated_at: DateTime<Utc>) -> Self {
        Self {
            updated_at,
            repos: BTreeMap::new(),
        }
    }

    /// Adds or replaces the record for `key`.
    #[must_use]
    pub fn with_repo(mut self, key: impl Into<String>, metrics: RepoMetrics) -> Self {
        self.repos.insert(key.into(), metrics);
        self
    }

    /// Returns the record for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&RepoMetrics> {
        self.repos.get(key)
    }

    /// Highest star count across all entities (0 when empty).
    #[must_use]
    pub fn max_stars(&self) -> u64 {
        self.repos
            .values()
            .map(|r| r.stargazers_count)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_snapshot_json_field_names() {
        let pushed = Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap();
        let snapshot = Snapshot::new(Utc.with_ymd_and_hms(2026, 10, 15, 9, 30, 0).unwrap())
            .with_repo("yazi", RepoMetrics::new(32179, 701, 73).with_pushed_at(pushed));

        let json: serde_json::Value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["updated_at"], "2026-10-15T09:30:00Z");
        let yazi = &json["repos"]["yazi"];
        assert_eq!(yazi["stargazers_count"], 32179);
        assert_eq!(yazi["forks_count"], 701);
        assert_eq!(yazi["open_issues_count"], 73);
        assert_eq!(yazi["pushed_at"], "2026-10-01T12:00:00Z");
    }

    #[test]
    fn test_missing_pushed_at_serializes_as_null() {
        let json = serde_json::to_value(RepoMetrics::new(1, 2, 3)).unwrap();
        assert!(json["pushed_at"].is_null());
    }

    #[test]
    fn test_malformed_pushed_at_reads_as_unknown() {
        let metrics: RepoMetrics = serde_json::from_str(
            r#"{"stargazers_count": 5, "forks_count": 1, "open_issues_count": 0, "pushed_at": "yesterday"}"#,
        )
        .unwrap();
        assert_eq!(metrics.stargazers_count, 5);
        assert!(metrics.pushed_at.is_none());
    }

    #[test]
    fn test_github_timestamp_parses() {
        let metrics: RepoMetrics =
            serde_json::from_str(r#"{"stargazers_count": 1, "pushed_at": "2026-10-14T08:00:00Z"}"#)
                .unwrap();
        assert_eq!(
            metrics.pushed_at,
            Some(Utc.with_ymd_and_hms(2026, 10, 14, 8, 0, 0).unwrap())
        );
        assert_eq!(metrics.forks_count, 0);
    }

    #[test]
    fn test_max_stars() {
        let snapshot = Snapshot::new(Utc::now())
            .with_repo("a", RepoMetrics::new(10, 0, 0))
            .with_repo("b", RepoMetrics::new(32179, 0, 0));
        assert_eq!(snapshot.max_stars(), 32179);
        assert_eq!(Snapshot::new(Utc::now()).max_stars(), 0);
    }
}
