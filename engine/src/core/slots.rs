//! Bounded slot pool and session admission
//!
//! Slots are the engine's only mutually-exclusive resource: each holds at
//! most one active session, and admission is atomic per slot under one
//! lock. Pipelines run on their own tokio task; whatever the outcome, the
//! task frees its slot on the way out, so a slot is busy for exactly the
//! lifetime of one non-terminal session.

use crate::core::duplicate::DuplicateDetector;
use crate::core::logstream::LogStream;
use crate::core::pipeline::GenerationPipeline;
use crate::core::sessions::SessionRegistry;
use crate::config::{EngineConfig, MAX_SLOTS};
use crate::traits::{AiProvider, ConfigSource, EmbeddingProvider, IdeaStore};
use shared::{
    EngineError, EngineResult, GenerationRequest, Idea, Session, SessionId, SlotState, SlotStatus,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// One concurrency unit; busy iff a session is bound
struct Slot {
    number: u32,
    session: Option<SessionId>,
}

impl Slot {
    fn idle(number: u32) -> Self {
        Slot { number, session: None }
    }

    fn status(&self) -> SlotStatus {
        SlotStatus {
            number: self.number,
            state: if self.session.is_some() {
                SlotState::Busy
            } else {
                SlotState::Idle
            },
            session_id: self.session.clone(),
        }
    }
}

/// Handle returned to the caller at admission
///
/// Dropping the handle does not affect the session; the pipeline runs to a
/// terminal state regardless. The join handle lets callers await the
/// outcome when they want it.
#[derive(Debug)]
pub struct SessionHandle {
    pub session_id: SessionId,
    pub slot_number: u32,
    pub outcome: JoinHandle<EngineResult<Idea>>,
}

/// Admits generation requests into a fixed pool of concurrency slots
pub struct SlotManager {
    slots: Arc<Mutex<Vec<Slot>>>,
    sessions: Arc<SessionRegistry>,
    logs: Arc<LogStream>,
    config_source: Arc<dyn ConfigSource>,
    provider: Arc<dyn AiProvider>,
    detector: Arc<DuplicateDetector>,
    store: Arc<dyn IdeaStore>,
}

impl SlotManager {
    /// Build a manager with `config.slot_count` idle slots
    pub fn new(
        config: &EngineConfig,
        config_source: Arc<dyn ConfigSource>,
        provider: Arc<dyn AiProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn IdeaStore>,
        logs: Arc<LogStream>,
        sessions: Arc<SessionRegistry>,
    ) -> EngineResult<Self> {
        config.validate()?;

        let slots = (1..=config.slot_count).map(Slot::idle).collect();
        let detector = Arc::new(DuplicateDetector::new(
            embedder,
            store.clone(),
            config.duplicate_threshold,
            config.nearest_limit,
        ));

        Ok(SlotManager {
            slots: Arc::new(Mutex::new(slots)),
            sessions,
            logs,
            config_source,
            provider,
            detector,
            store,
        })
    }

    /// Admit a request, binding it to a slot and spawning its pipeline
    ///
    /// A named busy slot fails with `SlotBusy` and an unknown slot number
    /// with `SlotNotFound`; when no slot is named, any idle slot is taken,
    /// or `AllSlotsBusy` if there is none. There is no queueing: rejected
    /// callers retry or pick another slot.
    pub async fn admit(&self, request: GenerationRequest) -> EngineResult<SessionHandle> {
        let session_id = SessionId::new();

        let slot_number = {
            let mut slots = self.slots.lock().await;
            let slot = match request.slot_number {
                Some(number) => {
                    let slot = slots
                        .iter_mut()
                        .find(|s| s.number == number)
                        .ok_or(EngineError::SlotNotFound { slot: number })?;
                    if slot.session.is_some() {
                        return Err(EngineError::SlotBusy { slot: number });
                    }
                    slot
                }
                None => slots
                    .iter_mut()
                    .find(|s| s.session.is_none())
                    .ok_or(EngineError::AllSlotsBusy)?,
            };

            slot.session = Some(session_id.clone());
            slot.number
        };

        self.sessions
            .insert(Session::new(session_id.clone(), slot_number))
            .await;
        info!(session = %session_id, slot = slot_number, "request admitted");

        let pipeline = GenerationPipeline::new(
            session_id.clone(),
            slot_number,
            request,
            self.config_source.clone(),
            self.provider.clone(),
            self.detector.clone(),
            self.store.clone(),
            self.logs.clone(),
            self.sessions.clone(),
        );

        let slots = self.slots.clone();
        let task_session = session_id.clone();
        let outcome = tokio::spawn(async move {
            let result = pipeline.run().await;

            // Free the slot on any terminal transition. The slot may have
            // been removed by a concurrent shrink only if it was idle, so
            // a busy slot is always found here.
            let mut slots = slots.lock().await;
            if let Some(slot) = slots
                .iter_mut()
                .find(|s| s.session.as_ref() == Some(&task_session))
            {
                slot.session = None;
                debug!(session = %task_session, slot = slot.number, "slot freed");
            }

            result
        });

        Ok(SessionHandle {
            session_id,
            slot_number,
            outcome,
        })
    }

    /// Status of one slot
    pub async fn status(&self, slot_number: u32) -> EngineResult<SlotStatus> {
        let slots = self.slots.lock().await;
        slots
            .iter()
            .find(|s| s.number == slot_number)
            .map(Slot::status)
            .ok_or(EngineError::SlotNotFound { slot: slot_number })
    }

    /// Status of every slot, in slot order
    pub async fn list_slots(&self) -> Vec<SlotStatus> {
        let slots = self.slots.lock().await;
        slots.iter().map(Slot::status).collect()
    }

    /// Resize the pool
    ///
    /// Growing appends idle slots. Shrinking refuses to remove a busy slot:
    /// the first busy slot above the new count fails the whole resize with
    /// `SlotInUse` and the pool is left untouched.
    pub async fn resize(&self, new_count: u32) -> EngineResult<()> {
        if new_count == 0 || new_count > MAX_SLOTS {
            return Err(EngineError::InvalidSlotCount {
                count: new_count,
                max: MAX_SLOTS,
            });
        }

        let mut slots = self.slots.lock().await;
        let current = slots.len() as u32;

        if new_count < current {
            if let Some(busy) = slots
                .iter()
                .find(|s| s.number > new_count && s.session.is_some())
            {
                return Err(EngineError::SlotInUse { slot: busy.number });
            }
            slots.retain(|s| s.number <= new_count);
        } else {
            for number in (current + 1)..=new_count {
                slots.push(Slot::idle(number));
            }
        }

        info!(from = current, to = new_count, "slot pool resized");
        Ok(())
    }

    /// Current pool size
    pub async fn slot_count(&self) -> u32 {
        self.slots.lock().await.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ConfigProfile, CriterionSpec, ProviderSettings, SessionStatus};
    use tokio::sync::Semaphore;

    /// Provider that holds every call until a permit is released, keeping
    /// slots busy for as long as a test needs
    struct GatedProvider {
        gate: Arc<Semaphore>,
        response: String,
    }

    #[async_trait::async_trait]
    impl AiProvider for GatedProvider {
        async fn complete(&self, _prompt: &str, _settings: &ProviderSettings) -> EngineResult<String> {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| EngineError::provider("sim", "gate closed"))?;
            permit.forget();
            Ok(self.response.clone())
        }
    }

    struct FixedConfigSource;

    #[async_trait::async_trait]
    impl ConfigSource for FixedConfigSource {
        async fn resolve(&self, _profile_id: &str) -> EngineResult<ConfigProfile> {
            Ok(ConfigProfile {
                id: "default".to_string(),
                name: "Default".to_string(),
                prompt_template: "Generate an idea for {domain}.".to_string(),
                criteria: vec![CriterionSpec::standard("problem_severity", 50.0)],
                provider_settings: ProviderSettings::default(),
            })
        }
    }

    struct UnitEmbedder;

    #[async_trait::async_trait]
    impl EmbeddingProvider for UnitEmbedder {
        async fn embed(&self, _text: &str) -> EngineResult<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    struct NullStore;

    #[async_trait::async_trait]
    impl IdeaStore for NullStore {
        async fn save(&self, _idea: &Idea) -> EngineResult<String> {
            Ok("saved".to_string())
        }

        async fn find_nearest_by_vector(
            &self,
            _vector: &[f32],
            _limit: usize,
        ) -> EngineResult<Vec<shared::NearestIdea>> {
            Ok(Vec::new())
        }
    }

    fn gated_response() -> String {
        serde_json::json!({
            "title": "t", "domain": "d", "problem": "p", "solution": "s",
            "scores": { "problem_severity": 8.0 }
        })
        .to_string()
    }

    fn manager_with_gate(slot_count: u32) -> (SlotManager, Arc<Semaphore>, Arc<SessionRegistry>) {
        let gate = Arc::new(Semaphore::new(0));
        let sessions = Arc::new(SessionRegistry::new());
        let config = EngineConfig {
            slot_count,
            ..EngineConfig::default()
        };
        let manager = SlotManager::new(
            &config,
            Arc::new(FixedConfigSource),
            Arc::new(GatedProvider {
                gate: gate.clone(),
                response: gated_response(),
            }),
            Arc::new(UnitEmbedder),
            Arc::new(NullStore),
            Arc::new(LogStream::new()),
            sessions.clone(),
        )
        .unwrap();
        (manager, gate, sessions)
    }

    #[tokio::test]
    async fn test_admit_targets_named_slot() {
        let (manager, gate, _) = manager_with_gate(3);

        let mut request = GenerationRequest::for_profile("default");
        request.slot_number = Some(2);
        let handle = manager.admit(request).await.unwrap();
        assert_eq!(handle.slot_number, 2);

        let status = manager.status(2).await.unwrap();
        assert_eq!(status.state, SlotState::Busy);
        assert_eq!(status.session_id, Some(handle.session_id.clone()));

        gate.add_permits(4);
        handle.outcome.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_busy_slot_rejects_without_queueing() {
        let (manager, gate, _) = manager_with_gate(2);

        let mut request = GenerationRequest::for_profile("default");
        request.slot_number = Some(1);
        let first = manager.admit(request.clone()).await.unwrap();

        // Same slot again while busy: immediate SlotBusy, never queued
        let err = manager.admit(request).await.unwrap_err();
        assert_eq!(err, EngineError::SlotBusy { slot: 1 });

        gate.add_permits(4);
        first.outcome.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_unspecified_slot_takes_any_idle() {
        let (manager, gate, _) = manager_with_gate(2);

        let a = manager.admit(GenerationRequest::for_profile("default")).await.unwrap();
        let b = manager.admit(GenerationRequest::for_profile("default")).await.unwrap();
        assert_ne!(a.slot_number, b.slot_number);

        let err = manager
            .admit(GenerationRequest::for_profile("default"))
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::AllSlotsBusy);

        gate.add_permits(4);
        a.outcome.await.unwrap().unwrap();
        b.outcome.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_nonexistent_slot_is_rejected() {
        let (manager, _gate, _) = manager_with_gate(2);

        let mut request = GenerationRequest::for_profile("default");
        request.slot_number = Some(9);
        let err = manager.admit(request).await.unwrap_err();
        assert_eq!(err, EngineError::SlotNotFound { slot: 9 });

        let err = manager.status(9).await.unwrap_err();
        assert_eq!(err, EngineError::SlotNotFound { slot: 9 });
    }

    #[tokio::test]
    async fn test_at_most_n_sessions_non_terminal() {
        let (manager, gate, sessions) = manager_with_gate(3);

        let mut handles = Vec::new();
        for _ in 0..3 {
            handles.push(manager.admit(GenerationRequest::for_profile("default")).await.unwrap());
        }
        assert!(manager
            .admit(GenerationRequest::for_profile("default"))
            .await
            .is_err());
        assert_eq!(sessions.non_terminal_count().await, 3);

        gate.add_permits(4);
        for handle in handles {
            handle.outcome.await.unwrap().unwrap();
        }
        assert_eq!(sessions.non_terminal_count().await, 0);
    }

    #[tokio::test]
    async fn test_slot_freed_after_completion() {
        let (manager, gate, _) = manager_with_gate(1);

        let handle = manager.admit(GenerationRequest::for_profile("default")).await.unwrap();
        gate.add_permits(4);
        handle.outcome.await.unwrap().unwrap();

        let status = manager.status(1).await.unwrap();
        assert_eq!(status.state, SlotState::Idle);
        assert!(status.session_id.is_none());

        // The freed slot is reusable immediately
        let again = manager.admit(GenerationRequest::for_profile("default")).await.unwrap();
        assert_eq!(again.slot_number, 1);
        gate.add_permits(4);
        again.outcome.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_slot_freed_after_failure() {
        // Provider errors immediately: session fails, slot still frees
        let sessions = Arc::new(SessionRegistry::new());
        let config = EngineConfig {
            slot_count: 1,
            ..EngineConfig::default()
        };

        struct FailingProvider;

        #[async_trait::async_trait]
        impl AiProvider for FailingProvider {
            async fn complete(
                &self,
                _prompt: &str,
                _settings: &ProviderSettings,
            ) -> EngineResult<String> {
                Err(EngineError::provider("sim", "boom"))
            }
        }

        let manager = SlotManager::new(
            &config,
            Arc::new(FixedConfigSource),
            Arc::new(FailingProvider),
            Arc::new(UnitEmbedder),
            Arc::new(NullStore),
            Arc::new(LogStream::new()),
            sessions.clone(),
        )
        .unwrap();

        let handle = manager.admit(GenerationRequest::for_profile("default")).await.unwrap();
        let session_id = handle.session_id.clone();
        assert!(handle.outcome.await.unwrap().is_err());

        assert_eq!(manager.status(1).await.unwrap().state, SlotState::Idle);
        let session = sessions.get(&session_id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Failed);
    }

    #[tokio::test]
    async fn test_resize_grows_with_idle_slots() {
        let (manager, _gate, _) = manager_with_gate(2);

        manager.resize(5).await.unwrap();
        assert_eq!(manager.slot_count().await, 5);

        let statuses = manager.list_slots().await;
        assert_eq!(statuses.len(), 5);
        assert!(statuses.iter().all(|s| s.state == SlotState::Idle));
        assert_eq!(statuses.iter().map(|s| s.number).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_resize_down_over_busy_slot_fails() {
        let (manager, gate, _) = manager_with_gate(3);

        let mut request = GenerationRequest::for_profile("default");
        request.slot_number = Some(3);
        let handle = manager.admit(request).await.unwrap();

        let err = manager.resize(2).await.unwrap_err();
        assert_eq!(err, EngineError::SlotInUse { slot: 3 });

        // Busy slot untouched, pool size unchanged
        assert_eq!(manager.slot_count().await, 3);
        assert_eq!(manager.status(3).await.unwrap().state, SlotState::Busy);

        gate.add_permits(4);
        handle.outcome.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_resize_down_over_idle_slots_succeeds() {
        let (manager, gate, _) = manager_with_gate(4);

        // Keep slot 1 busy; removing idle slots 3 and 4 is fine
        let mut request = GenerationRequest::for_profile("default");
        request.slot_number = Some(1);
        let handle = manager.admit(request).await.unwrap();

        manager.resize(2).await.unwrap();
        assert_eq!(manager.slot_count().await, 2);

        gate.add_permits(4);
        handle.outcome.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_resize_bounds() {
        let (manager, _gate, _) = manager_with_gate(2);
        assert!(manager.resize(0).await.is_err());
        assert!(manager.resize(MAX_SLOTS + 1).await.is_err());
        assert!(manager.resize(MAX_SLOTS).await.is_ok());
    }
}
