//! Per-session generation pipeline state machine
//!
//! Drives one admitted request through the fixed stage order
//! `INIT -> CONFIG_LOAD -> PROMPT_BUILD -> API_CALL -> RESPONSE_PARSE ->
//! DUPLICATE_CHECK -> SCORING -> PERSIST -> COMPLETE`. Stages run strictly
//! sequentially; a failure at any stage logs one error entry, transitions
//! the session to `failed`, and stops the run. Subsequent stages never
//! execute after a failure.

use crate::core::duplicate::DuplicateDetector;
use crate::core::logstream::LogStream;
use crate::core::scoring::ScoringAggregator;
use crate::core::sessions::SessionRegistry;
use crate::traits::{AiProvider, ConfigSource, IdeaStore};
use shared::{
    CandidateIdea, ConfigProfile, EngineError, EngineResult, GenerationRequest, Idea, LogLevel,
    SessionId, Stage,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Deterministically render the generation prompt
///
/// Pure function of the resolved template and request hints. A caller
/// supplied custom prompt replaces the profile template as the base; the
/// `{domain}` and `{parent_context}` placeholders are substituted when
/// present and the corresponding hint is appended when they are not.
pub fn build_prompt(
    template: &str,
    domain: Option<&str>,
    custom_prompt: Option<&str>,
    parent_idea_id: Option<&str>,
) -> String {
    let base = custom_prompt.unwrap_or(template);
    let mut prompt = base.to_string();

    let domain_hint = domain.unwrap_or("any promising domain");
    if prompt.contains("{domain}") {
        prompt = prompt.replace("{domain}", domain_hint);
    } else if domain.is_some() {
        prompt.push_str(&format!("\n\nFocus on the {domain_hint} domain."));
    }

    let parent_context = match parent_idea_id {
        Some(id) => format!(
            "This is a refinement of idea {id}. Keep its core insight but address its weaknesses."
        ),
        None => String::new(),
    };
    if prompt.contains("{parent_context}") {
        prompt = prompt.replace("{parent_context}", parent_context.trim());
        prompt = prompt.trim_end().to_string();
    } else if !parent_context.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(&parent_context);
    }

    prompt
}

/// Strip a surrounding markdown code fence, if present
///
/// Providers routinely wrap JSON output in ``` fences; the payload inside
/// is what gets parsed.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence line
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse raw provider text into a validated candidate
///
/// Every criterion the profile declares must be present in the candidate's
/// score map with a finite value inside the criterion's declared range.
/// Anything else is a `Parse` error, fatal for the session.
pub fn parse_candidate(raw: &str, profile: &ConfigProfile) -> EngineResult<CandidateIdea> {
    let payload = strip_code_fences(raw);
    let candidate: CandidateIdea = serde_json::from_str(payload)
        .map_err(|e| EngineError::parse(format!("response is not a well-formed idea: {e}")))?;

    if candidate.problem.trim().is_empty() || candidate.solution.trim().is_empty() {
        return Err(EngineError::parse("problem and solution must be non-empty"));
    }

    for criterion in &profile.criteria {
        let Some(&value) = candidate.scores.get(&criterion.key) else {
            return Err(EngineError::parse(format!(
                "missing required criterion score '{}'",
                criterion.key
            )));
        };
        if !value.is_finite() || value < criterion.min || value > criterion.max {
            return Err(EngineError::parse(format!(
                "criterion '{}' score {} outside declared range {}..{}",
                criterion.key, value, criterion.min, criterion.max
            )));
        }
    }

    Ok(candidate)
}

/// One pipeline execution bound to an admitted session
pub struct GenerationPipeline {
    session_id: SessionId,
    slot_number: u32,
    request: GenerationRequest,
    config_source: Arc<dyn ConfigSource>,
    provider: Arc<dyn AiProvider>,
    detector: Arc<DuplicateDetector>,
    store: Arc<dyn IdeaStore>,
    logs: Arc<LogStream>,
    sessions: Arc<SessionRegistry>,
}

impl GenerationPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: SessionId,
        slot_number: u32,
        request: GenerationRequest,
        config_source: Arc<dyn ConfigSource>,
        provider: Arc<dyn AiProvider>,
        detector: Arc<DuplicateDetector>,
        store: Arc<dyn IdeaStore>,
        logs: Arc<LogStream>,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        GenerationPipeline {
            session_id,
            slot_number,
            request,
            config_source,
            provider,
            detector,
            store,
            logs,
            sessions,
        }
    }

    /// Run the pipeline to a terminal state
    ///
    /// Returns the persisted idea on success. On failure the session is
    /// already marked `failed` with the error recorded; the caller only
    /// needs to free the slot.
    pub async fn run(self) -> EngineResult<Idea> {
        let result = self.execute().await;
        match &result {
            Ok(idea) => {
                self.enter_stage(Stage::Complete, LogLevel::Success, "generation complete")
                    .await;
                self.sessions.complete(&self.session_id).await;
                debug!(
                    session = %self.session_id,
                    slot = self.slot_number,
                    id = ?idea.id,
                    "session completed"
                );
            }
            Err(error) => {
                let stage = self
                    .sessions
                    .get(&self.session_id)
                    .await
                    .map(|s| s.current_stage)
                    .unwrap_or(Stage::Init);
                self.logs
                    .append_with(
                        &self.session_id,
                        stage,
                        LogLevel::Error,
                        error.to_string(),
                        None,
                        Some(serde_json::json!({ "error_kind": error.kind() })),
                    )
                    .await;
                self.sessions.fail(&self.session_id, error.to_string()).await;
                debug!(
                    session = %self.session_id,
                    slot = self.slot_number,
                    error = %error,
                    "session failed"
                );
            }
        }
        result
    }

    /// The ordered stage sequence; returns at the first failed stage
    async fn execute(&self) -> EngineResult<Idea> {
        self.enter_stage(
            Stage::Init,
            LogLevel::Info,
            format!("session admitted to slot {}", self.slot_number),
        )
        .await;

        // CONFIG_LOAD
        self.enter_stage(
            Stage::ConfigLoad,
            LogLevel::Info,
            format!("resolving profile '{}'", self.request.profile_id),
        )
        .await;
        let profile = self.config_source.resolve(&self.request.profile_id).await?;

        // PROMPT_BUILD
        self.enter_stage(Stage::PromptBuild, LogLevel::Info, "rendering prompt").await;
        let prompt = build_prompt(
            &profile.prompt_template,
            self.request.domain.as_deref(),
            self.request.custom_prompt.as_deref(),
            self.request.parent_idea_id.as_deref(),
        );

        // API_CALL (single attempt, no automatic retry)
        self.enter_stage(
            Stage::ApiCall,
            LogLevel::Info,
            format!("calling provider model '{}'", profile.provider_settings.model),
        )
        .await;
        let started = Instant::now();
        let raw = self
            .provider
            .complete(&prompt, &profile.provider_settings)
            .await?;
        let duration_ms = started.elapsed().as_millis() as u64;
        self.logs
            .append_with(
                &self.session_id,
                Stage::ApiCall,
                LogLevel::Success,
                "provider responded",
                Some(duration_ms),
                None,
            )
            .await;

        // RESPONSE_PARSE
        self.enter_stage(Stage::ResponseParse, LogLevel::Info, "parsing provider response")
            .await;
        let mut candidate = parse_candidate(&raw, &profile)?;

        // DUPLICATE_CHECK
        let embedding = if self.request.skip_duplicate_check {
            self.enter_stage(
                Stage::DuplicateCheck,
                LogLevel::Info,
                "duplicate check skipped by request",
            )
            .await;
            Vec::new()
        } else {
            self.enter_stage(
                Stage::DuplicateCheck,
                LogLevel::Info,
                "comparing against prior ideas",
            )
            .await;
            let vector = self.detector.embed_candidate(&candidate).await?;
            let result = self.detector.check(&vector).await?;
            if result.is_duplicate {
                // A duplicate is annotated and surfaced, never an error;
                // disposition is left to the caller
                candidate.duplicate_of_id = result.match_id.clone();
                self.logs
                    .append_with(
                        &self.session_id,
                        Stage::DuplicateCheck,
                        LogLevel::Warning,
                        format!(
                            "near-duplicate of {} (similarity {:.3})",
                            result.match_id.as_deref().unwrap_or("?"),
                            result.similarity
                        ),
                        None,
                        Some(serde_json::json!({
                            "match_id": result.match_id,
                            "similarity": result.similarity,
                        })),
                    )
                    .await;
            }
            if result.match_id.is_some() {
                candidate.similarity = Some(result.similarity);
            }
            candidate.embedding = Some(vector.clone());
            vector
        };

        // SCORING
        self.enter_stage(Stage::Scoring, LogLevel::Info, "aggregating criterion scores")
            .await;
        let breakdown = ScoringAggregator::aggregate(&candidate.scores, &profile.criteria);
        let complexity = ScoringAggregator::complexity(&candidate.scores);

        // PERSIST
        self.enter_stage(Stage::Persist, LogLevel::Info, "persisting idea").await;
        let mut idea = Idea {
            id: None,
            title: candidate.title.clone(),
            domain: candidate.domain.clone(),
            problem: candidate.problem.clone(),
            solution: candidate.solution.clone(),
            scores: breakdown.per_criterion,
            score: breakdown.total,
            complexity_scores: complexity,
            duplicate_of_id: candidate.duplicate_of_id.clone(),
            similarity: candidate.similarity,
            parent_idea_id: self.request.parent_idea_id.clone(),
            embedding,
            created_at: chrono::Utc::now(),
        };
        let id = self.store.save(&idea).await?;
        idea.id = Some(id.clone());
        self.logs
            .append_with(
                &self.session_id,
                Stage::Persist,
                LogLevel::Success,
                format!("idea persisted as {id}"),
                None,
                Some(serde_json::json!({ "idea_id": id, "score": idea.score })),
            )
            .await;

        Ok(idea)
    }

    /// Record a stage transition: registry update plus exactly one entry
    /// marking stage entry
    async fn enter_stage(&self, stage: Stage, level: LogLevel, message: impl Into<String>) {
        self.sessions.advance_stage(&self.session_id, stage).await;
        self.logs.append(&self.session_id, stage, level, message).await;
    }
}
