use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::diff::DiffEngine;
use super::resolver;
use crate::fixtures::SnapshotCache;
use crate::model::EntityId;
use crate::notify::Dispatcher;
use crate::subs::SubscriptionReader;

/// Result of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed { events: usize, delivered: usize },
    /// Fetch or store stage failed; previous state untouched.
    Skipped,
}

/// Periodic driver for one fetch → diff → resolve → dispatch cycle.
///
/// Owns the diff engine's previous-state map; nothing else writes it. Ticks
/// that fire while a cycle is still running are coalesced, never queued, so
/// two cycles can never overlap.
pub struct PollLoop {
    cache: SnapshotCache,
    store: Arc<dyn SubscriptionReader>,
    dispatcher: Dispatcher,
    diff: DiffEngine,
}

impl PollLoop {
    pub fn new(
        cache: SnapshotCache,
        store: Arc<dyn SubscriptionReader>,
        dispatcher: Dispatcher,
        stale_retention: Duration,
    ) -> Self {
        PollLoop {
            cache,
            store,
            dispatcher,
            diff: DiffEngine::new(stale_retention),
        }
    }

    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let subscriptions = match self.store.list_all_subscribers().await {
            Ok(s) => s,
            Err(e) => {
                warn!("cycle skipped: subscription store unavailable: {}", e);
                return CycleOutcome::Skipped;
            }
        };

        let mut entities: Vec<EntityId> =
            subscriptions.values().flatten().copied().collect();
        entities.sort_unstable();
        entities.dedup();

        let records = match self.cache.get(&entities).await {
            Ok(r) => r,
            Err(e) => {
                info!("cycle skipped: {}", e);
                return CycleOutcome::Skipped;
            }
        };

        let events = self.diff.detect(&records);
        let mut delivered = 0usize;
        for event in &events {
            let recipients = resolver::resolve(&event.record, &subscriptions);
            if recipients.is_empty() {
                // Resolver miss: nobody follows either side, drop the event.
                continue;
            }
            info!(
                "{:?} for {} → {} subscriber(s)",
                event.kind,
                event.record.scoreline(),
                recipients.len()
            );
            delivered += self.dispatcher.dispatch(event, &recipients).await.delivered;
        }

        self.diff.commit(&records);
        CycleOutcome::Completed {
            events: events.len(),
            delivered,
        }
    }

    /// Spawn the periodic driver. Missed ticks are skipped, so a cycle that
    /// overruns the interval degrades to a slower schedule instead of a
    /// backlog. Shutdown stops the timer; an in-flight cycle finishes.
    pub fn spawn(
        mut self,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("poll loop started (interval={:?})", interval);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_cycle().await;
                    }
                    res = shutdown.changed() => {
                        if res.is_err() || *shutdown.borrow() {
                            info!("poll loop stopping");
                            break;
                        }
                    }
                }
            }
        })
    }

    #[cfg(test)]
    pub fn diff_engine(&self) -> &DiffEngine {
        &self.diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::cache::QueryWindow;
    use crate::fixtures::source::{FetchQuery, MatchSource, SourceError, TeamInfo};
    use crate::fixtures::FixtureFetcher;
    use crate::model::{MatchRecord, MatchStatus, SubscriberId, TeamRef};
    use crate::notify::{DeliveryError, Notification, NotificationSink};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    enum Step {
        Matches(Vec<MatchRecord>),
        RateLimited,
    }

    /// Source that replays a scripted sequence, one step per fetch round.
    struct SequenceSource {
        steps: StdMutex<VecDeque<Step>>,
    }

    impl SequenceSource {
        fn new(steps: Vec<Step>) -> Self {
            SequenceSource {
                steps: StdMutex::new(steps.into()),
            }
        }
    }

    #[async_trait]
    impl MatchSource for SequenceSource {
        fn name(&self) -> &str {
            "sequence"
        }

        async fn fetch_matches(
            &self,
            _entity: crate::model::EntityId,
            _query: &FetchQuery,
        ) -> Result<Vec<MatchRecord>, SourceError> {
            match self.steps.lock().unwrap().pop_front() {
                Some(Step::Matches(m)) => Ok(m),
                Some(Step::RateLimited) => Err(SourceError::RateLimited),
                None => Ok(vec![]),
            }
        }

        async fn fetch_teams(&self, _competition: &str) -> Result<Vec<TeamInfo>, SourceError> {
            Ok(vec![])
        }
    }

    struct StaticReader {
        map: HashMap<SubscriberId, HashSet<EntityId>>,
    }

    #[async_trait]
    impl SubscriptionReader for StaticReader {
        async fn list_all_subscribers(
            &self,
        ) -> Result<HashMap<SubscriberId, HashSet<EntityId>>> {
            Ok(self.map.clone())
        }

        async fn list_entities(
            &self,
            _subscriber: SubscriberId,
        ) -> Result<Vec<crate::subs::FollowedTeam>> {
            Ok(vec![])
        }
    }

    struct CountingSink {
        direct: AtomicUsize,
        broadcasts: AtomicUsize,
    }

    #[async_trait]
    impl NotificationSink for CountingSink {
        async fn send_direct(
            &self,
            _subscriber: SubscriberId,
            _note: &Notification,
        ) -> Result<(), DeliveryError> {
            self.direct.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn broadcast(&self, _note: &Notification) -> Result<(), DeliveryError> {
            self.broadcasts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn record(id: u64, status: MatchStatus, home: u64, away: u64, score: (i32, i32)) -> MatchRecord {
        MatchRecord {
            id,
            status,
            competition: "Premier League".into(),
            home: TeamRef {
                id: home,
                name: "TeamA".into(),
            },
            away: TeamRef {
                id: away,
                name: "TeamC".into(),
            },
            home_score: score.0,
            away_score: score.1,
            utc_date: chrono::Utc::now(),
        }
    }

    fn poll_loop(
        steps: Vec<Step>,
        subscriptions: &[(SubscriberId, &[EntityId])],
    ) -> (PollLoop, Arc<CountingSink>) {
        let source = Arc::new(SequenceSource::new(steps));
        let fetcher = Arc::new(FixtureFetcher::new(
            source,
            Duration::ZERO,
            Duration::ZERO,
        ));
        // Zero TTL: every cycle reaches the source, so scripted steps line up
        // one per cycle.
        let cache = SnapshotCache::new(fetcher, QueryWindow::Live { lookback_hours: 3 }, Duration::ZERO);
        let store = Arc::new(StaticReader {
            map: subscriptions
                .iter()
                .map(|(id, teams)| (*id, teams.iter().copied().collect()))
                .collect(),
        });
        let sink = Arc::new(CountingSink {
            direct: AtomicUsize::new(0),
            broadcasts: AtomicUsize::new(0),
        });
        let dispatcher = Dispatcher::new(sink.clone(), None);
        (
            PollLoop::new(cache, store, dispatcher, Duration::from_secs(6 * 60 * 60)),
            sink,
        )
    }

    #[tokio::test]
    async fn test_full_cycle_detects_and_delivers() {
        let (mut pl, sink) = poll_loop(
            vec![
                Step::Matches(vec![record(1, MatchStatus::Live, 10, 30, (0, 0))]),
                Step::Matches(vec![record(1, MatchStatus::Live, 10, 30, (1, 0))]),
            ],
            &[(100, &[10])],
        );

        assert_eq!(
            pl.run_cycle().await,
            CycleOutcome::Completed {
                events: 1,
                delivered: 1
            }
        );
        assert_eq!(
            pl.run_cycle().await,
            CycleOutcome::Completed {
                events: 1,
                delivered: 1
            }
        );
        assert_eq!(sink.direct.load(Ordering::SeqCst), 2);
        assert_eq!(sink.broadcasts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rate_limited_cycle_leaves_previous_map_untouched() {
        let (mut pl, sink) = poll_loop(
            vec![
                Step::Matches(vec![record(1, MatchStatus::Live, 10, 30, (0, 0))]),
                Step::RateLimited,
                Step::Matches(vec![record(1, MatchStatus::Live, 10, 30, (0, 0))]),
            ],
            &[(100, &[10])],
        );

        pl.run_cycle().await;
        let before = pl.diff_engine().previous().clone();

        assert_eq!(pl.run_cycle().await, CycleOutcome::Skipped);
        assert_eq!(*pl.diff_engine().previous(), before);

        // Identical data afterwards emits nothing: the map survived intact.
        assert_eq!(
            pl.run_cycle().await,
            CycleOutcome::Completed {
                events: 0,
                delivered: 0
            }
        );
        assert_eq!(sink.direct.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolver_miss_drops_event_without_any_delivery() {
        let (mut pl, sink) = poll_loop(
            vec![Step::Matches(vec![record(
                1,
                MatchStatus::Live,
                10,
                30,
                (0, 0),
            )])],
            &[(100, &[99])],
        );

        assert_eq!(
            pl.run_cycle().await,
            CycleOutcome::Completed {
                events: 1,
                delivered: 0
            }
        );
        assert_eq!(sink.direct.load(Ordering::SeqCst), 0);
        assert_eq!(sink.broadcasts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_subscribers_means_no_upstream_rounds_consumed() {
        // With no subscribers the entity set is empty and the fetcher
        // short-circuits; the scripted step must remain unconsumed.
        let (mut pl, _) = poll_loop(
            vec![Step::Matches(vec![record(
                1,
                MatchStatus::Live,
                10,
                30,
                (0, 0),
            )])],
            &[],
        );

        assert_eq!(
            pl.run_cycle().await,
            CycleOutcome::Completed {
                events: 0,
                delivered: 0
            }
        );
    }

    #[tokio::test]
    async fn test_spawned_loop_stops_on_shutdown() {
        let (pl, _) = poll_loop(vec![], &[(100, &[10])]);
        let (tx, rx) = watch::channel(false);

        let handle = pl.spawn(Duration::from_secs(3600), rx);
        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
