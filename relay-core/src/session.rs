//! Per-user sessions and the store that owns them.
//!
//! Two locks per session:
//! - `state`: short critical sections over rate-limit timestamps and history.
//!   Never held across an await.
//! - `turn gate`: serializes one user's completion round trips so replies are
//!   appended in the order their prompts were. Other users never wait on it.

use crate::history::ConversationHistory;
use crate::rate_limit::ActivityLog;
use crate::types::UserId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Mutable per-user state.
#[derive(Debug)]
pub struct SessionState {
    pub activity: ActivityLog,
    pub history: ConversationHistory,
}

/// One user's session. Lives for the whole process.
#[derive(Debug)]
pub struct Session {
    user_id: UserId,
    state: Mutex<SessionState>,
    turn_gate: tokio::sync::Mutex<()>,
}

impl Session {
    pub fn new(user_id: UserId, max_turns: usize) -> Self {
        Self {
            user_id,
            state: Mutex::new(SessionState {
                activity: ActivityLog::new(),
                history: ConversationHistory::new(max_turns),
            }),
            turn_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Exclusive access to the session state.
    ///
    /// A panic in another holder leaves the state structurally valid, so a
    /// poisoned lock is recovered rather than propagated.
    pub fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for this user's previous round trip to finish.
    pub async fn begin_turn(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.turn_gate.lock().await
    }
}

/// Get-or-create access to sessions keyed by user.
pub trait SessionStore: Send + Sync {
    /// Return the single session for `user_id`, creating it on first use.
    fn get_or_create(&self, user_id: UserId) -> Arc<Session>;

    /// Number of sessions created so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-lifetime in-memory store. Sessions are never evicted.
#[derive(Debug)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<UserId, Arc<Session>>>,
    max_turns: usize,
}

impl InMemorySessionStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_turns,
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(relay_common::config::HistoryConfig::default().max_turns)
    }
}

impl SessionStore for InMemorySessionStore {
    fn get_or_create(&self, user_id: UserId) -> Arc<Session> {
        {
            let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(session) = sessions.get(&user_id) {
                return Arc::clone(session);
            }
        }

        // Re-check under the write lock: a concurrent first message may have won.
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let session = sessions.entry(user_id).or_insert_with(|| {
            tracing::debug!(user_id = %user_id, "Creating session");
            Arc::new(Session::new(user_id, self.max_turns))
        });
        Arc::clone(session)
    }

    fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
