//! Session registry shared between the slot manager, pipelines and observers
//!
//! The owning pipeline is the only writer for a given session; observers
//! read snapshots through `get`. Once a session reaches a terminal status
//! the registry refuses further mutation, which keeps terminal sessions
//! immutable by construction.

use shared::{Session, SessionId, SessionStatus, Stage};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Concurrent map of all sessions the engine has admitted
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a freshly admitted session
    pub async fn insert(&self, session: Session) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session);
    }

    /// Snapshot a session for observers
    pub async fn get(&self, session_id: &SessionId) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).cloned()
    }

    /// Advance a non-terminal session to a new stage
    ///
    /// Also moves a pending session into `processing`. Terminal sessions
    /// are left untouched.
    pub async fn advance_stage(&self, session_id: &SessionId, stage: Stage) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            if session.status.is_terminal() {
                return;
            }
            session.current_stage = stage;
            if session.status == SessionStatus::Pending {
                session.status = SessionStatus::Processing;
            }
        }
    }

    /// Transition a session to `completed`
    pub async fn complete(&self, session_id: &SessionId) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            if session.status.is_terminal() {
                return;
            }
            session.status = SessionStatus::Completed;
            session.current_stage = Stage::Complete;
            session.completed_at = Some(chrono::Utc::now());
        }
    }

    /// Transition a session to `failed`, recording the error verbatim
    pub async fn fail(&self, session_id: &SessionId, error: String) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            if session.status.is_terminal() {
                return;
            }
            session.status = SessionStatus::Failed;
            session.current_stage = Stage::Failed;
            session.completed_at = Some(chrono::Utc::now());
            session.error = Some(error);
        }
    }

    /// Count sessions that have not yet reached a terminal status
    pub async fn non_terminal_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.values().filter(|s| !s.status.is_terminal()).count()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
