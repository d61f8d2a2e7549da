//! Shared fixtures and helpers for engine integration tests

use engine::services::{HashEmbedder, InMemoryIdeaStore, StaticConfigSource};
use engine::{Engine, EngineConfig};
use shared::{ConfigProfile, CriterionSpec, EngineError, EngineResult, ProviderSettings};
use std::sync::Arc;
use tokio::sync::Semaphore;

use engine::traits::AiProvider;

/// Two-criterion profile whose weights sum to 80, not 100
pub fn partial_weight_profile() -> ConfigProfile {
    ConfigProfile {
        id: "partial".to_string(),
        name: "Partial weights".to_string(),
        prompt_template: "Generate one idea for {domain}.".to_string(),
        criteria: vec![
            CriterionSpec::standard("problem_severity", 40.0),
            CriterionSpec::standard("market_size", 40.0),
        ],
        provider_settings: ProviderSettings::default(),
    }
}

/// Canned candidate with fixed scores 9 and 7 for the partial profile
pub fn canned_response() -> String {
    serde_json::json!({
        "title": "Fleet maintenance copilot",
        "domain": "logistics",
        "problem": "Preventive maintenance schedules are guesswork",
        "solution": "Predict failures from telematics and book service automatically",
        "scores": { "problem_severity": 9.0, "market_size": 7.0 }
    })
    .to_string()
}

/// Provider returning the same canned text for every call
pub struct FixedResponseProvider {
    response: String,
}

impl FixedResponseProvider {
    pub fn new(response: String) -> Self {
        FixedResponseProvider { response }
    }
}

#[async_trait::async_trait]
impl AiProvider for FixedResponseProvider {
    async fn complete(&self, _prompt: &str, _settings: &ProviderSettings) -> EngineResult<String> {
        Ok(self.response.clone())
    }
}

/// Provider failing every call
pub struct FailingProvider;

#[async_trait::async_trait]
impl AiProvider for FailingProvider {
    async fn complete(&self, _prompt: &str, _settings: &ProviderSettings) -> EngineResult<String> {
        Err(EngineError::provider("test", "simulated outage"))
    }
}

/// Provider that blocks each call until a permit is granted
pub struct GatedProvider {
    pub gate: Arc<Semaphore>,
    response: String,
}

impl GatedProvider {
    pub fn new(gate: Arc<Semaphore>, response: String) -> Self {
        GatedProvider { gate, response }
    }
}

#[async_trait::async_trait]
impl AiProvider for GatedProvider {
    async fn complete(&self, _prompt: &str, _settings: &ProviderSettings) -> EngineResult<String> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| EngineError::provider("test", "gate closed"))?;
        permit.forget();
        Ok(self.response.clone())
    }
}

/// Engine over the partial profile with an injected provider
pub fn engine_with_provider(
    slot_count: u32,
    provider: Arc<dyn AiProvider>,
) -> (Engine, Arc<InMemoryIdeaStore>) {
    let config = EngineConfig {
        slot_count,
        ..EngineConfig::default()
    };
    let store = Arc::new(InMemoryIdeaStore::new());
    let engine = Engine::new(
        config,
        Arc::new(StaticConfigSource::new(vec![partial_weight_profile()])),
        provider,
        Arc::new(HashEmbedder::default()),
        store.clone(),
    )
    .expect("engine config is valid");
    (engine, store)
}
