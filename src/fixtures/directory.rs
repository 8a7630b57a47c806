use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::source::{MatchSource, SourceError, TeamInfo};

/// Competitions the directory indexes by default (free-plan selection).
pub const COMPETITIONS_TRACKED: &[(&str, &str)] = &[
    ("WC", "FIFA World Cup"),
    ("CL", "UEFA Champions League"),
    ("BL1", "Bundesliga"),
    ("DED", "Eredivisie"),
    ("BSA", "Campeonato Brasileiro Série A"),
    ("PD", "Primera Division"),
    ("FL1", "Ligue 1"),
    ("ELC", "Championship"),
    ("PPL", "Primeira Liga"),
    ("EC", "European Championship"),
    ("SA", "Serie A"),
    ("PL", "Premier League"),
];

struct DirectoryState {
    built: bool,
    by_name: HashMap<String, TeamInfo>,
}

/// Lazily built team-name index over the tracked competitions.
///
/// The index is filled on first use, pacing one upstream call per
/// competition. A rate limit mid-build keeps whatever loaded so far; the
/// build is retried on the next lookup only if nothing loaded at all.
pub struct TeamDirectory {
    source: Arc<dyn MatchSource>,
    competitions: Vec<String>,
    pacing: Duration,
    inner: Arc<RwLock<DirectoryState>>,
}

impl TeamDirectory {
    pub fn new(source: Arc<dyn MatchSource>, competitions: Vec<String>, pacing: Duration) -> Self {
        TeamDirectory {
            source,
            competitions,
            pacing,
            inner: Arc::new(RwLock::new(DirectoryState {
                built: false,
                by_name: HashMap::new(),
            })),
        }
    }

    /// Look up a team by name: exact match, then prefix, then substring,
    /// case-insensitive.
    pub async fn search(&self, query: &str) -> Option<TeamInfo> {
        self.ensure_built().await;

        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return None;
        }

        let state = self.inner.read().await;
        if let Some(team) = state.by_name.get(&q) {
            return Some(team.clone());
        }
        if let Some(team) = state
            .by_name
            .iter()
            .find(|(name, _)| name.starts_with(&q))
            .map(|(_, t)| t)
        {
            return Some(team.clone());
        }
        state
            .by_name
            .iter()
            .find(|(name, _)| name.contains(&q))
            .map(|(_, t)| t.clone())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_name.len()
    }

    async fn ensure_built(&self) {
        if self.inner.read().await.built {
            return;
        }

        let mut state = self.inner.write().await;
        if state.built {
            return;
        }

        let mut succeeded = 0usize;
        for (idx, code) in self.competitions.iter().enumerate() {
            if idx > 0 {
                tokio::time::sleep(self.pacing).await;
            }
            match self.source.fetch_teams(code).await {
                Ok(teams) => {
                    for team in teams {
                        state.by_name.insert(team.name.to_lowercase(), team);
                    }
                    succeeded += 1;
                }
                Err(SourceError::RateLimited) => {
                    warn!("team directory build rate limited at {}, keeping partial index", code);
                    break;
                }
                Err(e) => {
                    warn!("team listing for {} failed: {}", code, e);
                }
            }
        }

        // A build that loaded nothing is retried on the next lookup.
        state.built = succeeded > 0;
        info!(
            "team directory built: {} teams from {} competition(s)",
            state.by_name.len(),
            succeeded
        );
    }
}
