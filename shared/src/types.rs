//! Core types shared between the engine and its observers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Opaque session identifier
///
/// Callers may supply their own identifier; otherwise a random one is
/// generated at admission time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random session id
    pub fn new() -> Self {
        SessionId(Uuid::new_v4().to_string())
    }

    /// Wrap a caller-supplied identifier
    pub fn from_string(id: impl Into<String>) -> Self {
        SessionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Occupancy state of a single slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    Idle,
    Busy,
}

/// Externally visible snapshot of one slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotStatus {
    /// Slot number, 1-based
    pub number: u32,
    pub state: SlotState,
    /// Session currently bound to this slot, if busy
    pub session_id: Option<SessionId>,
}

/// Lifecycle status of a generation session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl SessionStatus {
    /// Terminal sessions are immutable
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Processing => "processing",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        };
        write!(f, "{label}")
    }
}

/// Ordered stages of the generation pipeline
///
/// `Complete` and `Failed` are terminal; `Failed` is reachable from any
/// non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    ConfigLoad,
    PromptBuild,
    ApiCall,
    ResponseParse,
    DuplicateCheck,
    Scoring,
    Persist,
    Complete,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Complete | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Init => "init",
            Stage::ConfigLoad => "config_load",
            Stage::PromptBuild => "prompt_build",
            Stage::ApiCall => "api_call",
            Stage::ResponseParse => "response_parse",
            Stage::DuplicateCheck => "duplicate_check",
            Stage::Scoring => "scoring",
            Stage::Persist => "persist",
            Stage::Complete => "complete",
            Stage::Failed => "failed",
        };
        write!(f, "{label}")
    }
}

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Success,
}

/// One append-only entry in a session's log
///
/// Ids are assigned by the log stream and strictly increase within a
/// session. Entries are never mutated or deleted while the session lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub session_id: SessionId,
    pub stage: Stage,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Wall-clock duration of the work the entry reports, when measured
    pub duration_ms: Option<u64>,
    /// Optional structured payload (scores, similarity, persisted id, ...)
    pub metadata: Option<serde_json::Value>,
}

/// One end-to-end run of the generation pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub slot_number: u32,
    pub status: SessionStatus,
    pub current_stage: Stage,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Present iff the session failed
    pub error: Option<String>,
}

impl Session {
    /// Create a fresh pending session bound to a slot
    pub fn new(id: SessionId, slot_number: u32) -> Self {
        Session {
            id,
            slot_number,
            status: SessionStatus::Pending,
            current_stage: Stage::Init,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }
}

/// A caller's request for one generation run
///
/// Transient: requests are consumed at admission and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Target slot; `None` means any idle slot
    pub slot_number: Option<u32>,
    /// Profile to resolve through the config source
    pub profile_id: String,
    /// Optional domain hint woven into the prompt
    pub domain: Option<String>,
    /// Optional caller-supplied prompt override
    pub custom_prompt: Option<String>,
    /// Skip the duplicate check stage entirely
    pub skip_duplicate_check: bool,
    /// Lineage: the idea this request refines, if any
    pub parent_idea_id: Option<String>,
}

impl GenerationRequest {
    /// Minimal request for a profile, any slot
    pub fn for_profile(profile_id: impl Into<String>) -> Self {
        GenerationRequest {
            slot_number: None,
            profile_id: profile_id.into(),
            domain: None,
            custom_prompt: None,
            skip_duplicate_check: false,
            parent_idea_id: None,
        }
    }
}

/// Declared scoring criterion from a config profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionSpec {
    /// Map key this criterion uses in raw score maps
    pub key: String,
    /// Relative weight; weights are normalized by their sum, never assumed
    /// to total 100
    pub weight: f64,
    /// Declared lower bound of the raw score range
    pub min: f64,
    /// Declared upper bound of the raw score range
    pub max: f64,
}

impl CriterionSpec {
    /// Criterion on the conventional 0-10 raw scale
    pub fn standard(key: impl Into<String>, weight: f64) -> Self {
        CriterionSpec {
            key: key.into(),
            weight,
            min: 0.0,
            max: 10.0,
        }
    }
}

/// Model invocation parameters resolved from a profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        ProviderSettings {
            model: "default".to_string(),
            temperature: 0.7,
            max_tokens: 2048,
        }
    }
}

/// Resolved generation profile
///
/// The engine treats profile storage as an external concern; this is the
/// already-resolved shape handed back by the config source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigProfile {
    pub id: String,
    pub name: String,
    /// Template with `{domain}` and `{parent_context}` placeholders
    pub prompt_template: String,
    pub criteria: Vec<CriterionSpec>,
    pub provider_settings: ProviderSettings,
}

impl ConfigProfile {
    /// Look up a declared criterion by key
    pub fn criterion(&self, key: &str) -> Option<&CriterionSpec> {
        self.criteria.iter().find(|c| c.key == key)
    }
}

/// Weighted scoring output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Weighted total on a 0-100 scale
    pub total: f64,
    /// Clamped raw score per criterion key
    pub per_criterion: HashMap<String, f64>,
}

/// Derived complexity metrics
///
/// Each component is present only when its source criterion was scored;
/// `total` is present only when all three components are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexityScores {
    pub technical: Option<f64>,
    pub regulatory: Option<f64>,
    pub sales: Option<f64>,
    pub total: Option<f64>,
}

/// Parsed AI output before scoring and persistence
///
/// Owned exclusively by the pipeline instance until handed to the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateIdea {
    pub title: String,
    pub domain: String,
    pub problem: String,
    pub solution: String,
    /// Raw per-criterion scores as reported by the model
    pub scores: HashMap<String, f64>,
    /// Embedding of the canonical text, filled during duplicate check
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    /// Highest-similarity prior idea at or above the duplicate threshold
    #[serde(default)]
    pub duplicate_of_id: Option<String>,
    /// Similarity to the nearest prior idea, when one was compared
    #[serde(default)]
    pub similarity: Option<f64>,
}

/// Finished idea record handed to the persistence collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Idea {
    /// Store-assigned identity, absent until persisted
    pub id: Option<String>,
    pub title: String,
    pub domain: String,
    pub problem: String,
    pub solution: String,
    /// Clamped per-criterion scores
    pub scores: HashMap<String, f64>,
    /// Weighted aggregate on a 0-100 scale
    pub score: f64,
    pub complexity_scores: ComplexityScores,
    pub duplicate_of_id: Option<String>,
    pub similarity: Option<f64>,
    /// Lineage to the idea this one refines
    pub parent_idea_id: Option<String>,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a duplicate comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateResult {
    pub is_duplicate: bool,
    /// Id of the best match when one exists
    pub match_id: Option<String>,
    /// Cosine similarity to the best match, 0.0 when the corpus is empty
    pub similarity: f64,
}

impl DuplicateResult {
    /// Result for an empty corpus: nothing to compare against
    pub fn no_match() -> Self {
        DuplicateResult {
            is_duplicate: false,
            match_id: None,
            similarity: 0.0,
        }
    }
}

/// Neighbor returned by the store's vector query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearestIdea {
    pub id: String,
    pub vector: Vec<f32>,
}
