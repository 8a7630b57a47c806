use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::source::{FetchQuery, MatchSource, SourceError};
use crate::model::{EntityId, MatchRecord};

/// Outcome taxonomy for a whole fetch round.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Upstream rate limit hit somewhere in the round: no data this cycle,
    /// previous state must not be altered.
    #[error("upstream rate limit exceeded, skipping this round")]
    RateLimited,

    /// Every entity query in a non-empty round failed.
    #[error("could not reach the upstream source")]
    Unavailable,
}

/// Fetches match records for a set of tracked entities, one upstream query
/// per entity, pacing successive calls to stay inside the rate budget.
///
/// A single entity's failure never aborts the round; HTTP 429 aborts the
/// whole round (`FetchError::RateLimited`). Never panics.
pub struct FixtureFetcher {
    source: Arc<dyn MatchSource>,
    /// Delay between successive upstream calls.
    pacing: Duration,
    /// Upper bound on the random jitter added to each pacing delay.
    jitter: Duration,
}

impl FixtureFetcher {
    pub fn new(source: Arc<dyn MatchSource>, pacing: Duration, jitter: Duration) -> Self {
        FixtureFetcher {
            source,
            pacing,
            jitter,
        }
    }

    /// Fetch matches for every entity in the set, deduplicated by match id
    /// (two followed teams in the same match yield one record).
    ///
    /// An empty entity set returns an empty list without any upstream call.
    pub async fn fetch(
        &self,
        entities: &[EntityId],
        query: &FetchQuery,
    ) -> Result<Vec<MatchRecord>, FetchError> {
        if entities.is_empty() {
            debug!("no tracked entities, skipping upstream fetch");
            return Ok(vec![]);
        }

        let mut records: Vec<MatchRecord> = Vec::new();
        let mut seen: HashSet<u64> = HashSet::new();
        let mut failures = 0usize;

        for (idx, entity) in entities.iter().enumerate() {
            if idx > 0 {
                tokio::time::sleep(self.pacing + self.random_jitter()).await;
            }

            match self.source.fetch_matches(*entity, query).await {
                Ok(matches) => {
                    for m in matches {
                        if seen.insert(m.id) {
                            records.push(m);
                        }
                    }
                }
                Err(SourceError::RateLimited) => {
                    warn!(
                        "{}: rate limited while fetching entity {}",
                        self.source.name(),
                        entity
                    );
                    return Err(FetchError::RateLimited);
                }
                Err(e) => {
                    // Isolated: one entity's failure must not block the rest.
                    warn!(
                        "{}: fetch for entity {} failed: {}",
                        self.source.name(),
                        entity,
                        e
                    );
                    failures += 1;
                }
            }
        }

        if failures == entities.len() {
            return Err(FetchError::Unavailable);
        }
        Ok(records)
    }

    fn random_jitter(&self) -> Duration {
        let max_ms = self.jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}
