use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::fetcher::{FetchError, FixtureFetcher};
use super::source::FetchQuery;
use crate::model::{EntityId, MatchRecord};

/// Which upstream window this cache serves.
#[derive(Debug, Clone, Copy)]
pub enum QueryWindow {
    Live { lookback_hours: i64 },
    Upcoming { lookahead_days: i64 },
}

impl QueryWindow {
    fn to_query(self) -> FetchQuery {
        match self {
            QueryWindow::Live { lookback_hours } => FetchQuery::live(lookback_hours),
            QueryWindow::Upcoming { lookahead_days } => FetchQuery::upcoming(lookahead_days),
        }
    }
}

struct CachedSnapshot {
    /// Sorted entity set the snapshot was fetched for.
    entities: Vec<EntityId>,
    records: Vec<MatchRecord>,
    fetched_at: Instant,
}

/// TTL wrapper around the fixture fetcher, shared by the poll loop and the
/// on-demand query paths so they draw on one upstream budget.
///
/// `get` returns the cached snapshot while it is fresh, non-empty and was
/// fetched for the same entity set; otherwise it fetches and replaces it.
/// Readers never force an extra fetch beyond that.
#[derive(Clone)]
pub struct SnapshotCache {
    fetcher: Arc<FixtureFetcher>,
    window: QueryWindow,
    ttl: Duration,
    inner: Arc<Mutex<Option<CachedSnapshot>>>,
}

impl SnapshotCache {
    pub fn new(fetcher: Arc<FixtureFetcher>, window: QueryWindow, ttl: Duration) -> Self {
        SnapshotCache {
            fetcher,
            window,
            ttl,
            inner: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn get(&self, entities: &[EntityId]) -> Result<Vec<MatchRecord>, FetchError> {
        let mut key: Vec<EntityId> = entities.to_vec();
        key.sort_unstable();
        key.dedup();

        // The lock is held across the fetch so concurrent readers coalesce
        // into a single upstream round.
        let mut guard = self.inner.lock().await;

        if let Some(snap) = guard.as_ref() {
            if snap.entities == key
                && snap.fetched_at.elapsed() < self.ttl
                && !snap.records.is_empty()
            {
                debug!("snapshot cache hit ({} records)", snap.records.len());
                return Ok(snap.records.clone());
            }
        }

        let records = self.fetcher.fetch(&key, &self.window.to_query()).await?;
        *guard = Some(CachedSnapshot {
            entities: key,
            records: records.clone(),
            fetched_at: Instant::now(),
        });
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::source::{MatchSource, SourceError, TeamInfo};
    use crate::model::{MatchStatus, TeamRef};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        records: Vec<MatchRecord>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MatchSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        async fn fetch_matches(
            &self,
            _entity: EntityId,
            _query: &FetchQuery,
        ) -> Result<Vec<MatchRecord>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.records.clone())
        }

        async fn fetch_teams(&self, _competition: &str) -> Result<Vec<TeamInfo>, SourceError> {
            Ok(vec![])
        }
    }

    fn record(id: u64) -> MatchRecord {
        MatchRecord {
            id,
            status: MatchStatus::Live,
            competition: "Premier League".into(),
            home: TeamRef {
                id: 1,
                name: "Arsenal".into(),
            },
            away: TeamRef {
                id: 2,
                name: "Chelsea".into(),
            },
            home_score: 0,
            away_score: 0,
            utc_date: chrono::Utc::now(),
        }
    }

    fn cache_with(records: Vec<MatchRecord>, ttl: Duration) -> (SnapshotCache, Arc<CountingSource>) {
        let source = Arc::new(CountingSource {
            records,
            calls: AtomicUsize::new(0),
        });
        let fetcher = Arc::new(FixtureFetcher::new(
            source.clone(),
            Duration::ZERO,
            Duration::ZERO,
        ));
        (
            SnapshotCache::new(fetcher, QueryWindow::Live { lookback_hours: 3 }, ttl),
            source,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_snapshot_is_served_from_cache() {
        let (cache, source) = cache_with(vec![record(1)], Duration::from_secs(45));

        let a = cache.get(&[1]).await.unwrap();
        let b = cache.get(&[1]).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_snapshot_is_refetched() {
        let (cache, source) = cache_with(vec![record(1)], Duration::from_secs(45));

        cache.get(&[1]).await.unwrap();
        tokio::time::advance(Duration::from_secs(46)).await;
        cache.get(&[1]).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_snapshot_is_not_cached() {
        let (cache, source) = cache_with(vec![], Duration::from_secs(45));

        cache.get(&[1]).await.unwrap();
        cache.get(&[1]).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entity_set_change_invalidates_cache() {
        let (cache, source) = cache_with(vec![record(1)], Duration::from_secs(45));

        cache.get(&[1]).await.unwrap();
        cache.get(&[1, 2]).await.unwrap();
        // One call per entity in the second round plus the first round's call
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entity_order_does_not_invalidate_cache() {
        let (cache, source) = cache_with(vec![record(1)], Duration::from_secs(45));

        cache.get(&[2, 1]).await.unwrap();
        cache.get(&[1, 2]).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
