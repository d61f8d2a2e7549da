//! Simulated collaborators for development and testing
//!
//! Mirrors the standalone execution mode of the wider system: a seeded
//! in-process provider stands in for the AI model, a hash-based embedder
//! stands in for the embedding service, and an in-memory store stands in
//! for persistence. Everything is deterministic under a fixed seed.

use crate::core::duplicate::cosine_similarity;
use crate::traits::{AiProvider, ConfigSource, EmbeddingProvider, IdeaStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    ConfigProfile, CriterionSpec, EngineError, EngineResult, Idea, NearestIdea, ProviderSettings,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::RwLock;

/// Profile source backed by a fixed in-memory map
pub struct StaticConfigSource {
    profiles: HashMap<String, ConfigProfile>,
}

impl StaticConfigSource {
    pub fn new(profiles: Vec<ConfigProfile>) -> Self {
        StaticConfigSource {
            profiles: profiles.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    /// The conventional business-idea profile used by the demo binary
    pub fn with_default_profile() -> Self {
        Self::new(vec![default_profile()])
    }
}

/// Standard five-criterion profile on 0-10 raw scales
pub fn default_profile() -> ConfigProfile {
    ConfigProfile {
        id: "default".to_string(),
        name: "Balanced".to_string(),
        prompt_template: concat!(
            "Generate one specific business idea for {domain}. Respond with a ",
            "single JSON object holding title, domain, problem, solution and ",
            "a scores map rating each criterion from 0 to 10. {parent_context}"
        )
        .to_string(),
        criteria: vec![
            CriterionSpec::standard("problem_severity", 25.0),
            CriterionSpec::standard("market_size", 25.0),
            CriterionSpec::standard("technical_feasibility", 20.0),
            CriterionSpec::standard("regulatory_ease", 15.0),
            CriterionSpec::standard("sales_cycle_speed", 15.0),
        ],
        provider_settings: ProviderSettings::default(),
    }
}

#[async_trait::async_trait]
impl ConfigSource for StaticConfigSource {
    async fn resolve(&self, profile_id: &str) -> EngineResult<ConfigProfile> {
        self.profiles
            .get(profile_id)
            .cloned()
            .ok_or_else(|| EngineError::config(format!("no such profile '{profile_id}'")))
    }
}

const SIM_DOMAINS: &[&str] = &[
    "logistics",
    "healthtech",
    "fintech",
    "agritech",
    "education",
    "energy",
];

const SIM_PROBLEMS: &[&str] = &[
    "manual reconciliation eats hours every week",
    "small teams cannot afford specialist tooling",
    "data lives in spreadsheets nobody trusts",
    "compliance reporting is slow and error prone",
    "capacity planning relies on gut feeling",
];

const SIM_SOLUTIONS: &[&str] = &[
    "a workflow service that automates the busywork end to end",
    "an assistant that drafts the paperwork for human review",
    "a shared ledger with automatic anomaly flags",
    "a lightweight planner fed by live operational data",
    "an integration layer that syncs the systems of record",
];

/// Seeded stand-in for the AI provider
///
/// Emits a well-formed candidate JSON document with plausible scores for
/// the default profile's criteria.
pub struct SimulatedAiProvider {
    rng: Mutex<StdRng>,
}

impl SimulatedAiProvider {
    pub fn new(seed: u64) -> Self {
        SimulatedAiProvider {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait::async_trait]
impl AiProvider for SimulatedAiProvider {
    async fn complete(&self, prompt: &str, _settings: &ProviderSettings) -> EngineResult<String> {
        let (domain, problem, solution, scores) = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| EngineError::provider("simulated", "rng poisoned"))?;

            // Honor an explicit domain hint in the prompt when present
            let domain = SIM_DOMAINS
                .iter()
                .find(|d| prompt.contains(*d))
                .copied()
                .unwrap_or_else(|| SIM_DOMAINS[rng.gen_range(0..SIM_DOMAINS.len())]);
            let problem = SIM_PROBLEMS[rng.gen_range(0..SIM_PROBLEMS.len())];
            let solution = SIM_SOLUTIONS[rng.gen_range(0..SIM_SOLUTIONS.len())];

            let mut scores = serde_json::Map::new();
            for key in [
                "problem_severity",
                "market_size",
                "technical_feasibility",
                "regulatory_ease",
                "sales_cycle_speed",
            ] {
                scores.insert(
                    key.to_string(),
                    serde_json::json!(rng.gen_range(3..=10) as f64),
                );
            }
            (domain, problem, solution, scores)
        };

        let body = serde_json::json!({
            "title": format!("{domain} automation play"),
            "domain": domain,
            "problem": format!("In {domain}, {problem}"),
            "solution": solution,
            "scores": scores,
        });

        // Real providers habitually fence their JSON; the parser copes
        Ok(format!("```json\n{body}\n```"))
    }
}

/// Deterministic embedding from character trigram hashing
///
/// Not semantically meaningful, but identical texts always map to
/// identical vectors and unrelated texts diverge, which is what duplicate
/// detection needs from a stand-in.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        HashEmbedder { dims: dims.max(8) }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> EngineResult<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dims];
        let bytes = text.as_bytes();
        for window in bytes.windows(3) {
            let mut hash = 5381u64;
            for b in window {
                hash = hash.wrapping_mul(33).wrapping_add(u64::from(*b));
            }
            vector[(hash % self.dims as u64) as usize] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

/// In-memory persistence with exact-scan vector search
pub struct InMemoryIdeaStore {
    ideas: RwLock<Vec<Idea>>,
    next_id: AtomicU64,
}

impl InMemoryIdeaStore {
    pub fn new() -> Self {
        InMemoryIdeaStore {
            ideas: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of persisted ideas
    pub async fn count(&self) -> usize {
        self.ideas.read().await.len()
    }

    /// Fetch a persisted idea by id
    pub async fn get(&self, id: &str) -> Option<Idea> {
        let ideas = self.ideas.read().await;
        ideas.iter().find(|i| i.id.as_deref() == Some(id)).cloned()
    }
}

impl Default for InMemoryIdeaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IdeaStore for InMemoryIdeaStore {
    async fn save(&self, idea: &Idea) -> EngineResult<String> {
        let id = format!("idea-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut stored = idea.clone();
        stored.id = Some(id.clone());

        let mut ideas = self.ideas.write().await;
        ideas.push(stored);
        Ok(id)
    }

    async fn find_nearest_by_vector(
        &self,
        vector: &[f32],
        limit: usize,
    ) -> EngineResult<Vec<NearestIdea>> {
        let ideas = self.ideas.read().await;
        let mut scored: Vec<(f64, NearestIdea)> = ideas
            .iter()
            .filter(|idea| !idea.embedding.is_empty())
            .filter_map(|idea| {
                let id = idea.id.clone()?;
                let similarity = cosine_similarity(vector, &idea.embedding);
                Some((
                    similarity,
                    NearestIdea {
                        id,
                        vector: idea.embedding.clone(),
                    },
                ))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().take(limit).map(|(_, n)| n).collect())
    }
}
