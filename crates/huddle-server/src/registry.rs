//! Connection registry: the set of live sessions keyed by username.
//!
//! All mutation goes through [`SessionRegistry::add`] and the two remove
//! methods, each a single write-locked step. [`SessionRegistry::snapshot`]
//! copies the current sessions out under a read lock so callers can fan
//! out without holding the lock. No I/O happens here.

use std::collections::HashMap;
use std::sync::Arc;

use huddle_core::HubError;
use parking_lot::RwLock;
use tracing::debug;

use crate::websocket::connection::ClientSession;

/// Live sessions, at most one per username.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<ClientSession>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. Fails if the username is already live.
    pub fn add(&self, session: Arc<ClientSession>) -> Result<(), HubError> {
        let username = session.username().as_str();
        {
            let mut sessions = self.sessions.write();
            if sessions.contains_key(username) {
                return Err(HubError::DuplicateUsername(username.to_string()));
            }
            let _ = sessions.insert(username.to_string(), Arc::clone(&session));
        }
        debug!(username, conn_id = %session.id(), "session registered");
        Ok(())
    }

    /// Remove whatever session holds `username`. Idempotent.
    pub fn remove(&self, username: &str) -> Option<Arc<ClientSession>> {
        self.sessions.write().remove(username)
    }

    /// Remove `session` only if it is still the registered one for its
    /// username. Returns whether it was removed.
    pub fn remove_session(&self, session: &ClientSession) -> bool {
        let username = session.username().as_str();
        let is_current = {
            let mut sessions = self.sessions.write();
            let is_current = sessions
                .get(username)
                .is_some_and(|current| current.id() == session.id());
            if is_current {
                let _ = sessions.remove(username);
            }
            is_current
        };
        if is_current {
            debug!(username, conn_id = %session.id(), "session deregistered");
        }
        is_current
    }

    /// Look up the live session for `username`.
    pub fn get(&self, username: &str) -> Option<Arc<ClientSession>> {
        self.sessions.read().get(username).cloned()
    }

    /// Consistent copy of all live sessions, ordered by username.
    pub fn snapshot(&self) -> Vec<Arc<ClientSession>> {
        let mut sessions: Vec<_> = self.sessions.read().values().cloned().collect();
        sessions.sort_by(|a, b| a.username().cmp(b.username()));
        sessions
    }

    /// Registered usernames, sorted.
    pub fn usernames(&self) -> Vec<String> {
        let mut names: Vec<_> = self.sessions.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no sessions are live.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
