//! Collaborator seams with mockall annotations for testing
//!
//! The engine talks to the outside world exclusively through these traits:
//! profile resolution, AI completion, text embedding, and idea persistence.
//! Mocks are generated for dependency injection in tests.

use shared::{ConfigProfile, EngineResult, Idea, NearestIdea, ProviderSettings};

/// Resolves a profile id into generation configuration
///
/// Profile storage (YAML files, database rows) is an external concern;
/// the engine only ever sees the resolved shape.
#[mockall::automock]
#[async_trait::async_trait]
pub trait ConfigSource: Send + Sync {
    /// Resolve a profile by id
    ///
    /// Fails with `EngineError::Config` when the profile is missing or
    /// malformed.
    async fn resolve(&self, profile_id: &str) -> EngineResult<ConfigProfile>;
}

/// External AI completion provider
#[mockall::automock]
#[async_trait::async_trait]
pub trait AiProvider: Send + Sync {
    /// Run one completion and return the raw response text
    ///
    /// A single attempt per call; timeouts, non-2xx responses and transport
    /// failures surface as `EngineError::Provider`.
    async fn complete(&self, prompt: &str, settings: &ProviderSettings) -> EngineResult<String>;
}

/// External embedding provider
#[mockall::automock]
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a canonical text into a fixed-dimension vector
    async fn embed(&self, text: &str) -> EngineResult<Vec<f32>>;
}

/// Idea persistence and vector search collaborator
///
/// The store owns indexing; the engine only issues point writes and
/// nearest-neighbor queries against it.
#[mockall::automock]
#[async_trait::async_trait]
pub trait IdeaStore: Send + Sync {
    /// Persist a finished idea, returning its generated identity
    async fn save(&self, idea: &Idea) -> EngineResult<String>;

    /// Return up to `limit` stored ideas nearest to `vector`
    ///
    /// Exact scan or ANN is the store's choice; the engine only compares
    /// what comes back.
    async fn find_nearest_by_vector(&self, vector: &[f32], limit: usize) -> EngineResult<Vec<NearestIdea>>;
}
