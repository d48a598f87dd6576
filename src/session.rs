//! In-memory session store
//!
//! Each session holds the accumulated draft, profile, and last itinerary,
//! guarded by a per-session async mutex that a request holds for its whole
//! duration: requests on the same session never interleave. A monotonic
//! sequence number is stamped on every response so that serialization is
//! observable from outside.
//!
//! Durable persistence is a transport-side concern; this store is the
//! in-process seam it would plug into.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Itinerary, TripConstraints, UserProfile};
use crate::intake::ConstraintDraft;

const MAX_HISTORY_ENTRIES: usize = 50;

/// One turn recorded in a session's history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub request_id: String,
    pub message: String,
    pub status: String,
    pub at: chrono::DateTime<chrono::Utc>,
}

/// Accumulated session state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    /// Constraint fields gathered so far, across clarify turns
    pub draft: ConstraintDraft,
    pub profile: UserProfile,

    /// Constraints of the last completed plan
    pub constraints: Option<TripConstraints>,

    /// The last finished itinerary, the target of edit patches
    pub itinerary: Option<Itinerary>,

    /// Monotonic per-session sequence number
    pub seq: u64,

    pub history: Vec<HistoryEntry>,
}

impl SessionState {
    pub fn record_turn(&mut self, request_id: &str, message: &str, status: &str) {
        self.history.push(HistoryEntry {
            request_id: request_id.to_string(),
            message: message.to_string(),
            status: status.to_string(),
            at: chrono::Utc::now(),
        });
        if self.history.len() > MAX_HISTORY_ENTRIES {
            let overflow = self.history.len() - MAX_HISTORY_ENTRIES;
            self.history.drain(0..overflow);
        }
    }
}

/// A single session: state behind its per-session mutex
pub struct SessionHandle {
    pub id: String,
    state: Arc<Mutex<SessionState>>,
    last_access: StdMutex<Instant>,
}

impl SessionHandle {
    fn new(id: String) -> Self {
        Self {
            id,
            state: Arc::new(Mutex::new(SessionState::default())),
            last_access: StdMutex::new(Instant::now()),
        }
    }

    /// Acquire the session for one request. The guard is held until the
    /// response is built, which serializes requests per session.
    pub async fn acquire(&self) -> OwnedMutexGuard<SessionState> {
        *self.last_access.lock().expect("session clock poisoned") = Instant::now();
        self.state.clone().lock_owned().await
    }

    /// Non-blocking read for history endpoints
    pub fn try_read(&self) -> Option<MutexGuard<'_, SessionState>> {
        self.state.try_lock().ok()
    }

    fn idle_for(&self) -> Duration {
        self.last_access
            .lock()
            .expect("session clock poisoned")
            .elapsed()
    }
}

/// Session registry with TTL and capacity eviction
pub struct SessionStore {
    sessions: StdMutex<HashMap<String, Arc<SessionHandle>>>,
    ttl: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: StdMutex::new(HashMap::new()),
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Fetch or create a session. A missing id creates a fresh session with
    /// a generated id.
    pub fn get_or_create(&self, session_id: Option<&str>) -> Arc<SessionHandle> {
        let mut sessions = self.sessions.lock().expect("session store poisoned");

        // Drop idle sessions before admitting new ones
        sessions.retain(|_, handle| handle.idle_for() <= self.ttl);

        let id = match session_id {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        if let Some(existing) = sessions.get(&id) {
            return existing.clone();
        }

        if sessions.len() >= self.max_sessions {
            // Evict the most idle session
            if let Some(oldest) = sessions
                .iter()
                .max_by_key(|(_, handle)| handle.idle_for())
                .map(|(key, _)| key.clone())
            {
                debug!(session = %oldest, "session store full, evicting most idle");
                sessions.remove(&oldest);
            }
        }

        let handle = Arc::new(SessionHandle::new(id.clone()));
        sessions.insert(id, handle.clone());
        handle
    }

    /// Look up an existing session without creating one
    pub fn get(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        let sessions = self.sessions.lock().expect("session store poisoned");
        sessions.get(session_id).cloned()
    }

    pub fn active_count(&self) -> usize {
        let sessions = self.sessions.lock().expect("session store poisoned");
        sessions.len()
    }

    /// Session ids, most recently used first
    pub fn list(&self, limit: usize) -> Vec<String> {
        let sessions = self.sessions.lock().expect("session store poisoned");
        let mut entries: Vec<(&String, Duration)> = sessions
            .iter()
            .map(|(id, handle)| (id, handle.idle_for()))
            .collect();
        entries.sort_by_key(|(_, idle)| *idle);
        entries.into_iter().take(limit).map(|(id, _)| id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(Duration::from_secs(60), 10)
    }

    #[tokio::test]
    async fn test_create_and_reuse() {
        let store = store();
        let first = store.get_or_create(Some("s1"));
        let again = store.get_or_create(Some("s1"));
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(store.active_count(), 1);
    }

    #[tokio::test]
    async fn test_generated_id_when_missing() {
        let store = store();
        let handle = store.get_or_create(None);
        assert!(!handle.id.is_empty());
        assert!(store.get(&handle.id).is_some());
    }

    #[tokio::test]
    async fn test_capacity_eviction() {
        let store = SessionStore::new(Duration::from_secs(60), 2);
        store.get_or_create(Some("a"));
        std::thread::sleep(Duration::from_millis(5));
        store.get_or_create(Some("b"));
        store.get_or_create(Some("c"));

        assert_eq!(store.active_count(), 2);
        // The most idle session "a" was evicted
        assert!(store.get("a").is_none());
        assert!(store.get("c").is_some());
    }

    #[tokio::test]
    async fn test_sequence_increments_under_lock() {
        let store = store();
        let handle = store.get_or_create(Some("seq"));

        for _ in 0..3 {
            let mut state = handle.acquire().await;
            state.seq += 1;
        }
        let state = handle.acquire().await;
        assert_eq!(state.seq, 3);
    }

    #[tokio::test]
    async fn test_requests_serialize_per_session() {
        let store = Arc::new(store());
        let handle = store.get_or_create(Some("serial"));

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                let mut state = handle.acquire().await;
                let seen = state.seq;
                // A hold across an await point must not admit another request
                tokio::time::sleep(Duration::from_millis(1)).await;
                state.seq = seen + 1;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let state = handle.acquire().await;
        assert_eq!(state.seq, 20);
    }

    #[test]
    fn test_history_capped() {
        let mut state = SessionState::default();
        for i in 0..60 {
            state.record_turn(&format!("r{i}"), "msg", "done");
        }
        assert_eq!(state.history.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(state.history[0].request_id, "r10");
    }
}
