use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{EntityId, MatchRecord, MatchStatus};

/// Failure taxonomy for a single upstream query.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Upstream rate limit hit (HTTP 429). Aborts the whole fetch round.
    #[error("upstream rate limit exceeded")]
    RateLimited,

    /// Upstream returned a non-success status for one query.
    #[error("upstream error: HTTP {0}")]
    Status(u16),

    /// Transport-level failure (connect, timeout, TLS).
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body was not the JSON shape we expect.
    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

/// Status filter and date window for one match query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchQuery {
    pub statuses: Vec<MatchStatus>,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
}

impl FetchQuery {
    /// Live matches plus anything finished within the look-back window, so
    /// end-of-match transitions are still observable a few hours after the
    /// final whistle.
    pub fn live(lookback_hours: i64) -> Self {
        let now = chrono::Utc::now();
        FetchQuery {
            statuses: vec![MatchStatus::Live, MatchStatus::Paused, MatchStatus::Finished],
            date_from: (now - chrono::Duration::hours(lookback_hours)).date_naive(),
            date_to: (now + chrono::Duration::days(1)).date_naive(),
        }
    }

    /// Scheduled matches within the look-ahead window.
    pub fn upcoming(lookahead_days: i64) -> Self {
        let now = chrono::Utc::now();
        FetchQuery {
            statuses: vec![MatchStatus::NotStarted],
            date_from: now.date_naive(),
            date_to: (now + chrono::Duration::days(lookahead_days)).date_naive(),
        }
    }
}

/// A team as listed by a competition directory query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamInfo {
    pub id: EntityId,
    pub name: String,
    pub competition: String,
}

/// Trait every sports-data source must implement.
#[async_trait]
pub trait MatchSource: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Matches involving one tracked entity within the query window.
    async fn fetch_matches(
        &self,
        entity: EntityId,
        query: &FetchQuery,
    ) -> Result<Vec<MatchRecord>, SourceError>;

    /// All teams of one competition, for the team directory.
    async fn fetch_teams(&self, competition: &str) -> Result<Vec<TeamInfo>, SourceError>;
}
