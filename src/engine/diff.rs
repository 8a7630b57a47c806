use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::model::{EventKind, MatchEvent, MatchId, MatchRecord, MatchStatus};

/// Derive events from one cycle's records against the previous-state map.
///
/// Pure: given the same inputs it always produces the same events, in input
/// record order (one match may emit several kinds, in start/goal/pause/end
/// order). Re-observing an unchanged record emits nothing.
pub fn detect_events(
    prev: &HashMap<MatchId, MatchRecord>,
    records: &[MatchRecord],
) -> Vec<MatchEvent> {
    let mut events = Vec::new();

    for record in records {
        let previous = prev.get(&record.id);

        // A match entering the tracked set already past kickoff still counts
        // as started; unknown statuses never trigger anything.
        if previous.is_none() && record.status.counts_as_started() {
            events.push(MatchEvent::new(EventKind::Start, record.clone()));
        }

        if let Some(p) = previous {
            if record.home_score != p.home_score || record.away_score != p.away_score {
                events.push(MatchEvent::new(EventKind::Goal, record.clone()));
            }
        }

        if record.status == MatchStatus::Paused
            && previous.map_or(true, |p| p.status != MatchStatus::Paused)
        {
            events.push(MatchEvent::new(EventKind::Pause, record.clone()));
        }

        if record.status == MatchStatus::Finished
            && previous.map_or(true, |p| p.status != MatchStatus::Finished)
        {
            events.push(MatchEvent::new(EventKind::End, record.clone()));
        }
    }

    events
}

/// Owns the previous-state map across poll cycles.
///
/// `detect` reads; `commit` merges a cycle's records in by match id and
/// evicts entries unseen for longer than the retention window. Entries are
/// never dropped just because one fetch omitted them: a finished match that
/// reappears inside the look-back window must still compare against its
/// finished previous state or `end` would fire twice.
pub struct DiffEngine {
    prev: HashMap<MatchId, MatchRecord>,
    last_seen: HashMap<MatchId, Instant>,
    stale_after: Duration,
}

impl DiffEngine {
    pub fn new(stale_after: Duration) -> Self {
        DiffEngine {
            prev: HashMap::new(),
            last_seen: HashMap::new(),
            stale_after,
        }
    }

    pub fn detect(&self, records: &[MatchRecord]) -> Vec<MatchEvent> {
        detect_events(&self.prev, records)
    }

    pub fn commit(&mut self, records: &[MatchRecord]) {
        let now = Instant::now();
        for record in records {
            self.last_seen.insert(record.id, now);
            self.prev.insert(record.id, record.clone());
        }

        let stale_after = self.stale_after;
        let stale: Vec<MatchId> = self
            .last_seen
            .iter()
            .filter(|(_, seen)| seen.elapsed() > stale_after)
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            debug!("evicting stale previous-state entry for match {}", id);
            self.last_seen.remove(&id);
            self.prev.remove(&id);
        }
    }

    pub fn previous(&self) -> &HashMap<MatchId, MatchRecord> {
        &self.prev
    }
}
