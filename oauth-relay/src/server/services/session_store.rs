use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::server::models::{OAuthSession, SessionError};
use crate::server::services::{Clock, SystemClock};

/// Storage for in-flight authorization sessions.
///
/// `update` must apply its closure atomically with respect to every other
/// operation on the same record: readers observe either the old record or
/// the fully updated one, and `sweep_expired` never removes a record while
/// an update to it is in progress.
pub trait SessionStore: Send + Sync {
    /// Insert a new pending session under a fresh, unused id
    fn create(&self, scope: String) -> OAuthSession;

    fn get(&self, session_id: &str) -> Option<OAuthSession>;

    /// Apply `apply` to the stored session and return the updated record.
    /// When `apply` fails the stored record is left untouched.
    fn update(
        &self,
        session_id: &str,
        apply: &mut dyn FnMut(&mut OAuthSession) -> Result<(), SessionError>,
    ) -> Result<OAuthSession, SessionError>;

    fn delete(&self, session_id: &str) -> bool;

    /// Remove every session older than the TTL, returning how many were removed
    fn sweep_expired(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct InMemorySessionStore {
    sessions: DashMap<String, OAuthSession>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl InMemorySessionStore {
    pub fn new(ttl_seconds: u64) -> Self {
        Self::with_clock(ttl_seconds, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl_seconds: u64, clock: Arc<dyn Clock>) -> Self {
        let ttl = chrono::Duration::from_std(Duration::from_secs(ttl_seconds))
            .unwrap_or(chrono::Duration::MAX);

        tracing::info!(
            "Session store initialized with TTL of {} seconds",
            ttl_seconds
        );

        Self {
            sessions: DashMap::new(),
            ttl,
            clock,
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, scope: String) -> OAuthSession {
        loop {
            let session_id = Uuid::new_v4().to_string();
            if let Entry::Vacant(slot) = self.sessions.entry(session_id.clone()) {
                let session = OAuthSession::new(session_id.clone(), scope, self.clock.now());
                slot.insert(session.clone());
                tracing::debug!(session_id = %session_id, "Created session");
                return session;
            }
        }
    }

    fn get(&self, session_id: &str) -> Option<OAuthSession> {
        self.sessions.get(session_id).map(|s| s.clone())
    }

    fn update(
        &self,
        session_id: &str,
        apply: &mut dyn FnMut(&mut OAuthSession) -> Result<(), SessionError>,
    ) -> Result<OAuthSession, SessionError> {
        let mut entry = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        let mut draft = entry.clone();
        apply(&mut draft)?;
        *entry = draft.clone();

        tracing::debug!(
            session_id = %session_id,
            status = draft.state.label(),
            "Session updated"
        );
        Ok(draft)
    }

    fn delete(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            tracing::debug!("Session deleted: {}", session_id);
        }
        removed
    }

    fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let initial_count = self.sessions.len();

        self.sessions.retain(|session_id, session| {
            if session.is_expired(now, self.ttl) {
                tracing::debug!(
                    session_id = %session_id,
                    status = session.state.label(),
                    "Cleaning up expired session"
                );
                false
            } else {
                true
            }
        });

        let cleaned = initial_count.saturating_sub(self.sessions.len());
        if cleaned > 0 {
            tracing::info!(
                "Cleaned up {} expired sessions, {} remaining",
                cleaned,
                self.sessions.len()
            );
        }
        cleaned
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}

/// Background task that periodically sweeps expired sessions, in addition
/// to the sweep that runs ahead of every request
pub fn spawn_cleanup_task(store: Arc<dyn SessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            store.sweep_expired();
        }
    })
}
