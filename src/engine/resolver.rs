use std::collections::{HashMap, HashSet};

use crate::model::{EntityId, MatchRecord, SubscriberId};

/// Subscribers whose followed entities intersect the match's home/away pair.
///
/// Entity-level targeting: following either side matches, following only the
/// competition does not. Sorted for deterministic fan-out order.
pub fn resolve(
    record: &MatchRecord,
    subscriptions: &HashMap<SubscriberId, HashSet<EntityId>>,
) -> Vec<SubscriberId> {
    let involved = [record.home.id, record.away.id];

    let mut matched: Vec<SubscriberId> = subscriptions
        .iter()
        .filter(|(_, followed)| involved.iter().any(|id| followed.contains(id)))
        .map(|(subscriber, _)| *subscriber)
        .collect();
    matched.sort_unstable();
    matched
}
