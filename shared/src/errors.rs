//! Error taxonomy for the generation engine
//!
//! Admission-time errors (`SlotNotFound`, `SlotBusy`, `AllSlotsBusy`,
//! `SlotInUse`) are
//! surfaced to the caller directly and never fail a session. Every other
//! variant is fatal to the session that hit it: the pipeline logs one
//! error-level entry, transitions to `failed`, and the slot is freed.
//! Nothing is retried internally and nothing is swallowed.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Config profile error: {message}")]
    Config { message: String },

    #[error("Provider call failed ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("Response parse failed: {message}")]
    Parse { message: String },

    #[error("Persistence rejected the write: {message}")]
    Persistence { message: String },

    #[error("Slot {slot} does not exist")]
    SlotNotFound { slot: u32 },

    #[error("Slot {slot} is busy")]
    SlotBusy { slot: u32 },

    #[error("All slots are busy")]
    AllSlotsBusy,

    #[error("Slot {slot} is in use and cannot be removed")]
    SlotInUse { slot: u32 },

    #[error("Invalid slot count: {count} (allowed 1-{max})")]
    InvalidSlotCount { count: u32, max: u32 },

    #[error("Unknown session: {session_id}")]
    SessionNotFound { session_id: String },
}

impl EngineError {
    pub fn config(message: impl Into<String>) -> Self {
        EngineError::Config {
            message: message.into(),
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        EngineError::Parse {
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        EngineError::Persistence {
            message: message.into(),
        }
    }

    /// Short machine-readable kind for log metadata
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Config { .. } => "config",
            EngineError::Provider { .. } => "provider",
            EngineError::Parse { .. } => "parse",
            EngineError::Persistence { .. } => "persistence",
            EngineError::SlotNotFound { .. } => "slot_not_found",
            EngineError::SlotBusy { .. } => "slot_busy",
            EngineError::AllSlotsBusy => "all_slots_busy",
            EngineError::SlotInUse { .. } => "slot_in_use",
            EngineError::InvalidSlotCount { .. } => "invalid_slot_count",
            EngineError::SessionNotFound { .. } => "session_not_found",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
