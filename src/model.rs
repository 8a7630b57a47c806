use chrono::{DateTime, Utc};
use serde::Serialize;

/// Stable match identifier from the sports-data source.
pub type MatchId = u64;

/// Identifier of a tracked entity (a team).
pub type EntityId = u64;

/// Identifier of a notification subscriber.
pub type SubscriberId = u64;

/// One side of a match as reported by the upstream source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamRef {
    pub id: EntityId,
    pub name: String,
}

/// Snapshot of a single match at fetch time.
///
/// Ephemeral: replaced every poll cycle except the copy retained in the
/// diff engine's previous-state map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub status: MatchStatus,
    pub competition: String,
    pub home: TeamRef,
    pub away: TeamRef,
    pub home_score: i32,
    pub away_score: i32,
    /// Scheduled kickoff time (UTC).
    pub utc_date: DateTime<Utc>,
}

impl MatchRecord {
    /// Formatted scoreline, e.g. "Arsenal 2:1 Chelsea".
    pub fn scoreline(&self) -> String {
        format!(
            "{} {}:{} {}",
            self.home.name, self.home_score, self.away_score, self.away.name
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    NotStarted,
    Live,
    Paused,
    Finished,
    Postponed,
    Cancelled,
    /// Any upstream status we do not recognise; treated as a non-event.
    Unknown,
}

impl MatchStatus {
    /// Map a football-data.org v4 status string. Unrecognised values
    /// (including SUSPENDED) become `Unknown` so they never trigger events.
    pub fn from_api(s: &str) -> Self {
        match s {
            "SCHEDULED" | "TIMED" => MatchStatus::NotStarted,
            "IN_PLAY" | "LIVE" => MatchStatus::Live,
            "PAUSED" => MatchStatus::Paused,
            "FINISHED" => MatchStatus::Finished,
            "POSTPONED" => MatchStatus::Postponed,
            "CANCELLED" => MatchStatus::Cancelled,
            _ => MatchStatus::Unknown,
        }
    }

    /// Whether observing this status for a previously unseen match counts
    /// as the match having started.
    pub fn counts_as_started(&self) -> bool {
        matches!(
            self,
            MatchStatus::Live | MatchStatus::Paused | MatchStatus::Finished
        )
    }
}

/// Kind of detected match transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Start,
    Goal,
    Pause,
    End,
}

impl EventKind {
    pub fn headline(&self) -> &'static str {
        match self {
            EventKind::Start => "Match started!",
            EventKind::Goal => "Goal scored!",
            EventKind::Pause => "Half-time break.",
            EventKind::End => "Match finished.",
        }
    }

    /// Audio cue name understood by the companion sound server.
    pub fn cue(&self) -> &'static str {
        match self {
            EventKind::Start => "match_start",
            EventKind::Goal => "goal",
            EventKind::Pause => "timeout",
            EventKind::End => "match_end",
        }
    }
}

/// A detected match transition. Derived fresh each cycle, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchEvent {
    pub kind: EventKind,
    pub record: MatchRecord,
    pub message: String,
}

impl MatchEvent {
    pub fn new(kind: EventKind, record: MatchRecord) -> Self {
        MatchEvent {
            kind,
            message: kind.headline().to_string(),
            record,
        }
    }
}
