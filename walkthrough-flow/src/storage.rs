use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::{context::Context, error::Result};

/// Session information
///
/// A session is created on the first interaction, mutated only by that
/// session's own requests and never shared with another session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub pipeline_id: String,
    pub last_task_id: Option<String>,
    pub status_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub context: Context,
}

impl Session {
    pub fn new(id: impl Into<String>, pipeline_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            pipeline_id: pipeline_id.into(),
            last_task_id: None,
            status_message: None,
            created_at: now,
            updated_at: now,
            context: Context::new(),
        }
    }

    /// New session with a random v4 id
    pub fn generate(pipeline_id: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), pipeline_id)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Trait for storing and retrieving sessions
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, session: Session) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Session>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory implementation of SessionStorage
///
/// With an idle TTL, sessions whose `updated_at` is older than the TTL are
/// dropped on the next save and are no longer returned by `get`.
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, Session>>,
    idle_ttl: Option<Duration>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            idle_ttl: None,
        }
    }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            idle_ttl: Some(idle_ttl),
        }
    }

    fn is_expired(&self, session: &Session) -> bool {
        self.idle_ttl
            .is_some_and(|ttl| session.updated_at < Utc::now() - ttl)
    }

    /// Drop idle sessions, returning how many were removed.
    pub fn evict_idle(&self) -> usize {
        if self.idle_ttl.is_none() {
            return 0;
        }
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !self.is_expired(session));
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for InMemorySessionStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: Session) -> Result<()> {
        let evicted = self.evict_idle();
        if evicted > 0 {
            debug!(evicted, remaining = self.sessions.len(), "Evicted idle sessions");
        }
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        let session = self.sessions.get(id).map(|entry| entry.clone());
        match session {
            Some(session) if self.is_expired(&session) => {
                self.sessions.remove(id);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}
