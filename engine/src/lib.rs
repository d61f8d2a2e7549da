//! Generation orchestration engine
//!
//! Accepts generation requests, runs each through a bounded pool of
//! concurrent slots, and drives every admitted request through a
//! deterministic pipeline: prompt construction, the AI call, response
//! parsing, semantic duplicate detection, weighted scoring, and
//! persistence. Observers follow progress in real time by polling or
//! subscribing to per-session logs.
//!
//! External collaborators (profile resolution, AI completion, embeddings,
//! persistence) are injected through the traits in [`traits`]; the
//! [`services`] module provides simulated implementations for development
//! and testing.

pub mod config;
pub mod core;
pub mod services;
pub mod traits;

use std::sync::Arc;

use shared::{
    EngineError, EngineResult, GenerationRequest, LogEntry, Session, SessionId, SlotStatus,
};
use tokio::sync::broadcast;

pub use crate::config::EngineConfig;
pub use crate::core::{LogStream, SessionHandle, SessionRegistry, SlotManager};
use crate::traits::{AiProvider, ConfigSource, EmbeddingProvider, IdeaStore};

/// Facade wiring the slot pool, session registry and log stream together
///
/// One instance per process; clone-free sharing happens through the
/// internal `Arc`s, so the engine itself can live in an `Arc` and be used
/// from any number of tasks.
pub struct Engine {
    manager: SlotManager,
    logs: Arc<LogStream>,
    sessions: Arc<SessionRegistry>,
}

impl Engine {
    /// Build an engine from validated config and injected collaborators
    pub fn new(
        config: EngineConfig,
        config_source: Arc<dyn ConfigSource>,
        provider: Arc<dyn AiProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn IdeaStore>,
    ) -> EngineResult<Self> {
        let logs = Arc::new(LogStream::new());
        let sessions = Arc::new(SessionRegistry::new());
        let manager = SlotManager::new(
            &config,
            config_source,
            provider,
            embedder,
            store,
            logs.clone(),
            sessions.clone(),
        )?;

        Ok(Engine {
            manager,
            logs,
            sessions,
        })
    }

    /// Admit a generation request into a slot
    pub async fn generate(&self, request: GenerationRequest) -> EngineResult<SessionHandle> {
        self.manager.admit(request).await
    }

    /// Snapshot a session's status
    pub async fn get_status(&self, session_id: &SessionId) -> EngineResult<Session> {
        self.sessions
            .get(session_id)
            .await
            .ok_or_else(|| EngineError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    /// Poll a session's log for entries newer than `last_id`
    pub async fn get_logs_since(&self, session_id: &SessionId, last_id: u64) -> Vec<LogEntry> {
        self.logs.since(session_id, last_id).await
    }

    /// Subscribe to a session's log for push consumption
    pub async fn subscribe(&self, session_id: &SessionId) -> broadcast::Receiver<LogEntry> {
        self.logs.subscribe(session_id).await
    }

    /// Release a terminal session's log once observers are done
    pub async fn release_logs(&self, session_id: &SessionId) {
        self.logs.release(session_id).await;
    }

    /// Administrative: resize the slot pool
    pub async fn set_slot_count(&self, count: u32) -> EngineResult<()> {
        self.manager.resize(count).await
    }

    /// Administrative: status of every slot
    pub async fn get_slot_statuses(&self) -> Vec<SlotStatus> {
        self.manager.list_slots().await
    }

    /// Status of a single slot
    pub async fn get_slot_status(&self, slot_number: u32) -> EngineResult<SlotStatus> {
        self.manager.status(slot_number).await
    }
}
