//! Active session registry
//!
//! Process-wide table of live call sessions, keyed by session id.
//! The only shared mutable state across sessions.

use super::error::BridgeError;
use super::session::{CallSession, SessionState};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Snapshot of one session for the monitoring surface
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub state: SessionState,
    pub dialed_number: Option<String>,
    pub age_seconds: i64,
    pub idle_seconds: i64,
}

/// Session registry
///
/// Sessions are inserted when the telephony leg connects and removed
/// once both legs have closed. Entries are independent; tearing one
/// down never touches another.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Arc<RwLock<CallSession>>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session; rejects duplicate ids
    pub async fn insert(&self, session: CallSession) -> Result<Arc<RwLock<CallSession>>, BridgeError> {
        let id = session.id.clone();
        let mut sessions = self.sessions.write().await;

        if sessions.contains_key(&id) {
            warn!("Rejecting duplicate session id: {}", id);
            return Err(BridgeError::DuplicateSession(id));
        }

        let entry = Arc::new(RwLock::new(session));
        sessions.insert(id.clone(), entry.clone());
        info!("Registered session: {} ({} active)", id, sessions.len());
        Ok(entry)
    }

    /// Look up a session by id
    pub async fn get(&self, id: &str) -> Option<Arc<RwLock<CallSession>>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Remove a session on teardown
    pub async fn remove(&self, id: &str) -> Option<Arc<RwLock<CallSession>>> {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(id);
        if removed.is_some() {
            info!("Removed session: {} ({} active)", id, sessions.len());
        } else {
            warn!("No session to remove for id: {}", id);
        }
        removed
    }

    /// Re-key a session once the trunk announces its protocol-assigned id
    ///
    /// No-op when the ids match. Fails if the new id is already live.
    pub async fn rekey(
        &self,
        old_id: &str,
        new_id: &str,
    ) -> Result<Arc<RwLock<CallSession>>, BridgeError> {
        let mut sessions = self.sessions.write().await;

        let entry = sessions
            .get(old_id)
            .cloned()
            .ok_or_else(|| BridgeError::SessionNotFound(old_id.to_string()))?;
        if old_id == new_id {
            return Ok(entry);
        }
        if sessions.contains_key(new_id) {
            return Err(BridgeError::DuplicateSession(new_id.to_string()));
        }

        sessions.remove(old_id);
        entry.write().await.id = new_id.to_string();
        sessions.insert(new_id.to_string(), entry.clone());
        info!("Re-keyed session {} -> {}", old_id, new_id);
        Ok(entry)
    }

    /// Number of registered sessions
    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Snapshot all sessions for the monitoring API
    pub async fn snapshot(&self) -> Vec<SessionSnapshot> {
        let sessions = self.sessions.read().await;
        let mut out = Vec::with_capacity(sessions.len());
        for entry in sessions.values() {
            let s = entry.read().await;
            out.push(SessionSnapshot {
                id: s.id.clone(),
                state: s.state,
                dialed_number: s.dialed_number.clone(),
                age_seconds: s.age_seconds(),
                idle_seconds: s.idle_seconds(),
            });
        }
        out
    }
}
