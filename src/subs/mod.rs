use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::model::{EntityId, SubscriberId};

/// One followed team with its display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowedTeam {
    pub team_id: EntityId,
    pub team_name: String,
    pub league: String,
}

/// Read-only view of the subscription store, the only surface the core
/// consumes. Writes stay in the transport layer.
#[async_trait]
pub trait SubscriptionReader: Send + Sync {
    /// Subscriber → followed entity ids, for resolver fan-out.
    async fn list_all_subscribers(&self) -> Result<HashMap<SubscriberId, HashSet<EntityId>>>;

    /// One subscriber's followed teams with display metadata.
    async fn list_entities(&self, subscriber: SubscriberId) -> Result<Vec<FollowedTeam>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UserEntry {
    teams: Vec<FollowedTeam>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SubsFile {
    users: HashMap<String, UserEntry>,
}

/// JSON-file subscription store (`subscriptions.json`).
///
/// The whole file is small; every operation reads and rewrites it under one
/// lock, which also keeps concurrent HTTP writes from interleaving.
#[derive(Clone)]
pub struct JsonSubscriptionStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl JsonSubscriptionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonSubscriptionStore {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    fn load(&self) -> Result<SubsFile> {
        if !self.path.exists() {
            return Ok(SubsFile::default());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    fn save(&self, db: &SubsFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let raw = serde_json::to_string_pretty(db)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    /// Add a followed team. Returns false if the subscriber already follows
    /// this entity (the store enforces no-duplicates).
    pub async fn add(&self, subscriber: SubscriberId, team: FollowedTeam) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut db = self.load()?;
        let entry = db.users.entry(subscriber.to_string()).or_default();
        if entry.teams.iter().any(|t| t.team_id == team.team_id) {
            return Ok(false);
        }
        entry.teams.push(team);
        self.save(&db)?;
        Ok(true)
    }

    /// Remove one followed team. Returns false when nothing was removed.
    pub async fn remove(&self, subscriber: SubscriberId, team_id: EntityId) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut db = self.load()?;
        let Some(entry) = db.users.get_mut(&subscriber.to_string()) else {
            return Ok(false);
        };
        let before = entry.teams.len();
        entry.teams.retain(|t| t.team_id != team_id);
        let changed = entry.teams.len() != before;
        if changed {
            self.save(&db)?;
        }
        Ok(changed)
    }

    /// Drop every subscription of one subscriber.
    pub async fn clear(&self, subscriber: SubscriberId) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut db = self.load()?;
        db.users.insert(subscriber.to_string(), UserEntry::default());
        self.save(&db)
    }
}

#[async_trait]
impl SubscriptionReader for JsonSubscriptionStore {
    async fn list_all_subscribers(&self) -> Result<HashMap<SubscriberId, HashSet<EntityId>>> {
        let _guard = self.lock.lock().await;
        let db = self.load()?;
        let mut out = HashMap::new();
        for (user, entry) in db.users {
            let Ok(id) = user.parse::<SubscriberId>() else {
                continue;
            };
            let teams: HashSet<EntityId> = entry.teams.iter().map(|t| t.team_id).collect();
            if !teams.is_empty() {
                out.insert(id, teams);
            }
        }
        Ok(out)
    }

    async fn list_entities(&self, subscriber: SubscriberId) -> Result<Vec<FollowedTeam>> {
        let _guard = self.lock.lock().await;
        let db = self.load()?;
        Ok(db
            .users
            .get(&subscriber.to_string())
            .map(|e| e.teams.clone())
            .unwrap_or_default())
    }
}
