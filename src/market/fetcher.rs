//! Snapshot fetcher with retry and an ordered fallback chain.
//!
//! Each entity is resolved by trying sources in priority order and
//! stopping at the first one that has a record:
//!
//! ```text
//! LiveSource ──miss──> PreviousSnapshotSource ──miss──> DefaultTableSource
//!  (gh api,               (last persisted                (built-in table)
//!   retried)               snapshot)
//! ```
//!
//! The default table always answers, so a fetched [`Snapshot`] has a record
//! for every configured entity and fetching never fails.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::{RepoMetrics, Snapshot};
use crate::config::{EntityConfig, FetchConfig};
use crate::testing::MetricsProvider;

/// Where a resolved record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsOrigin {
    Live,
    Previous,
    Default,
}

impl std::fmt::Display for MetricsOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Previous => write!(f, "previous snapshot"),
            Self::Default => write!(f, "default table"),
        }
    }
}

/// One link in the fallback chain.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    fn origin(&self) -> MetricsOrigin;

    /// Returns the entity's record, or `None` to defer to the next source.
    async fn lookup(&self, entity: &EntityConfig) -> Option<RepoMetrics>;
}

/// Fetch with a bounded number of attempts and a fixed sleep between them.
///
/// Returns `None` once every attempt has failed.
pub async fn fetch_with_retry<P: MetricsProvider + ?Sized>(
    provider: &P,
    repo: &str,
    policy: &FetchConfig,
) -> Option<RepoMetrics> {
    for attempt in 1..=policy.attempts {
        match provider.fetch(repo).await {
            Ok(metrics) => return Some(metrics),
            Err(e) => {
                warn!(
                    "Fetch attempt {}/{} for {} failed: {}",
                    attempt, policy.attempts, repo, e
                );
                if attempt < policy.attempts {
                    tokio::time::sleep(policy.backoff()).await;
                }
            }
        }
    }
    None
}

/// Live metrics from the repository provider.
pub struct LiveSource<'a, P: MetricsProvider> {
    provider: &'a P,
    policy: FetchConfig,
}

impl<'a, P: MetricsProvider> LiveSource<'a, P> {
    #[must_use]
    pub fn new(provider: &'a P, policy: FetchConfig) -> Self {
        Self { provider, policy }
    }
}

#[async_trait]
impl<'a, P: MetricsProvider> MetricsSource for LiveSource<'a, P> {
    fn origin(&self) -> MetricsOrigin {
        MetricsOrigin::Live
    }

    async fn lookup(&self, entity: &EntityConfig) -> Option<RepoMetrics> {
        fetch_with_retry(self.provider, &entity.repo, &self.policy).await
    }
}

/// Records from the immediately prior persisted snapshot.
#[derive(Debug, Clone, Default)]
pub struct PreviousSnapshotSource {
    previous: Option<Snapshot>,
}

impl PreviousSnapshotSource {
    #[must_use]
    pub fn new(previous: Option<Snapshot>) -> Self {
        Self { previous }
    }
}

#[async_trait]
impl MetricsSource for PreviousSnapshotSource {
    fn origin(&self) -> MetricsOrigin {
        MetricsOrigin::Previous
    }

    async fn lookup(&self, entity: &EntityConfig) -> Option<RepoMetrics> {
        self.previous
            .as_ref()
            .and_then(|s| s.get(&entity.key))
            .cloned()
    }
}

/// The entity's configured fallback record. Always answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTableSource;

#[async_trait]
impl MetricsSource for DefaultTableSource {
    fn origin(&self) -> MetricsOrigin {
        MetricsOrigin::Default
    }

    async fn lookup(&self, entity: &EntityConfig) -> Option<RepoMetrics> {
        Some(entity.fallback.clone())
    }
}

/// Resolves a full snapshot through an ordered list of sources.
pub struct SnapshotFetcher<'a> {
    sources: Vec<Box<dyn MetricsSource + 'a>>,
}

impl<'a> SnapshotFetcher<'a> {
    /// Build the standard chain: live, previous snapshot, default table.
    #[must_use]
    pub fn standard<P: MetricsProvider>(
        provider: &'a P,
        policy: FetchConfig,
        previous: Option<Snapshot>,
    ) -> Self {
        Self::from_sources(vec![
            Box::new(LiveSource::new(provider, policy)),
            Box::new(PreviousSnapshotSource::new(previous)),
            Box::new(DefaultTableSource),
        ])
    }

    /// Build a fetcher over an explicit source order.
    #[must_use]
    pub fn from_sources(sources: Vec<Box<dyn MetricsSource + 'a>>) -> Self {
        Self { sources }
    }

    /// Resolve one entity, returning the record and where it came from.
    pub async fn resolve(&self, entity: &EntityConfig) -> (RepoMetrics, MetricsOrigin) {
        for source in &self.sources {
            if let Some(metrics) = source.lookup(entity).await {
                return (metrics, source.origin());
            }
        }
        (entity.fallback.clone(), MetricsOrigin::Default)
    }

    /// Resolve every entity into a snapshot captured at `captured_at`.
    pub async fn fetch(&self, entities: &[EntityConfig], captured_at: DateTime<Utc>) -> Snapshot {
        let mut snapshot = Snapshot::new(captured_at);
        for entity in entities {
            let (metrics, origin) = self.resolve(entity).await;
            match origin {
                MetricsOrigin::Live => debug!("{}: live metrics", entity.key),
                other => info!("{}: live fetch unavailable, using {}", entity.key, other),
            }
            snapshot.repos.insert(entity.key.clone(), metrics);
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_entities;
    use crate::testing::MockMetricsProvider;

    fn no_backoff(attempts: u32) -> FetchConfig {
        FetchConfig {
            attempts,
            backoff_ms: 0,
        }
    }

    fn entity(key: &str) -> EntityConfig {
        default_entities()
            .into_iter()
            .find(|e| e.key == key)
            .unwrap()
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let provider = MockMetricsProvider::new()
            .with_metrics("sxyazi/yazi", RepoMetrics::new(40000, 1, 1))
            .with_transient_failures("sxyazi/yazi", 2);

        let result = fetch_with_retry(&provider, "sxyazi/yazi", &no_backoff(3)).await;
        assert_eq!(result.unwrap().stargazers_count, 40000);
        assert_eq!(provider.call_count("sxyazi/yazi"), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_attempts() {
        let provider = MockMetricsProvider::new();
        assert!(fetch_with_retry(&provider, "a/b", &no_backoff(3)).await.is_none());
        assert_eq!(provider.call_count("a/b"), 3);
    }

    #[tokio::test]
    async fn test_live_result_wins() {
        let provider =
            MockMetricsProvider::new().with_metrics("sxyazi/yazi", RepoMetrics::new(1, 2, 3));
        let previous = Snapshot::new(Utc::now()).with_repo("yazi", RepoMetrics::new(9, 9, 9));
        let fetcher = SnapshotFetcher::standard(&provider, no_backoff(1), Some(previous));

        let (metrics, origin) = fetcher.resolve(&entity("yazi")).await;
        assert_eq!(origin, MetricsOrigin::Live);
        assert_eq!(metrics, RepoMetrics::new(1, 2, 3));
    }

    #[tokio::test]
    async fn test_falls_back_to_previous_snapshot() {
        let provider = MockMetricsProvider::new();
        let previous = Snapshot::new(Utc::now()).with_repo("yazi", RepoMetrics::new(9, 9, 9));
        let fetcher = SnapshotFetcher::standard(&provider, no_backoff(2), Some(previous));

        let (metrics, origin) = fetcher.resolve(&entity("yazi")).await;
        assert_eq!(origin, MetricsOrigin::Previous);
        assert_eq!(metrics, RepoMetrics::new(9, 9, 9));
    }

    #[tokio::test]
    async fn test_falls_back_to_default_table_exactly() {
        let provider = MockMetricsProvider::new();
        let fetcher = SnapshotFetcher::standard(&provider, no_backoff(1), None);

        let yazi = entity("yazi");
        let (metrics, origin) = fetcher.resolve(&yazi).await;
        assert_eq!(origin, MetricsOrigin::Default);
        assert_eq!(metrics, yazi.fallback);
    }

    #[tokio::test]
    async fn test_previous_snapshot_missing_entity_uses_default() {
        let provider = MockMetricsProvider::new();
        let previous = Snapshot::new(Utc::now()).with_repo("lf", RepoMetrics::new(1, 1, 1));
        let fetcher = SnapshotFetcher::standard(&provider, no_backoff(1), Some(previous));

        let (_, origin) = fetcher.resolve(&entity("nnn")).await;
        assert_eq!(origin, MetricsOrigin::Default);
    }

    #[tokio::test]
    async fn test_fetch_covers_every_entity() {
        let provider =
            MockMetricsProvider::new().with_metrics("jarun/nnn", RepoMetrics::new(22000, 800, 5));
        let fetcher = SnapshotFetcher::standard(&provider, no_backoff(1), None);
        let entities = default_entities();
        let at = Utc::now();

        let snapshot = fetcher.fetch(&entities, at).await;
        assert_eq!(snapshot.updated_at, at);
        assert_eq!(snapshot.repos.len(), entities.len());
        assert_eq!(snapshot.get("nnn").unwrap().stargazers_count, 22000);
        assert_eq!(snapshot.get("ranger").unwrap().stargazers_count, 16834);
    }

    #[tokio::test]
    async fn test_custom_source_order() {
        let previous = Snapshot::new(Utc::now()).with_repo("lf", RepoMetrics::new(5, 5, 5));
        let fetcher = SnapshotFetcher::from_sources(vec![
            Box::new(DefaultTableSource),
            Box::new(PreviousSnapshotSource::new(Some(previous))),
        ]);

        let (_, origin) = fetcher.resolve(&entity("lf")).await;
        assert_eq!(origin, MetricsOrigin::Default);
    }
}
