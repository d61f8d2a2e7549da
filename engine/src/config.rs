//! Engine runtime configuration

use serde::{Deserialize, Serialize};
use shared::{EngineError, EngineResult};

/// Hard ceiling on the slot pool size
pub const MAX_SLOTS: u32 = 10;

/// Runtime configuration for the generation engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of concurrent generation slots (1-10)
    pub slot_count: u32,

    /// Cosine similarity at or above which a candidate is a duplicate
    pub duplicate_threshold: f64,

    /// How many neighbors to pull from the store per duplicate check
    pub nearest_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            slot_count: 3,
            duplicate_threshold: 0.92,
            nearest_limit: 10,
        }
    }
}

impl EngineConfig {
    /// Validate bounds, normalizing the threshold into (0, 1]
    pub fn validate(&self) -> EngineResult<()> {
        if self.slot_count == 0 || self.slot_count > MAX_SLOTS {
            return Err(EngineError::InvalidSlotCount {
                count: self.slot_count,
                max: MAX_SLOTS,
            });
        }
        if !(self.duplicate_threshold > 0.0 && self.duplicate_threshold <= 1.0) {
            return Err(EngineError::config(format!(
                "duplicate threshold {} outside (0, 1]",
                self.duplicate_threshold
            )));
        }
        if self.nearest_limit == 0 {
            return Err(EngineError::config("nearest limit must be at least 1"));
        }
        Ok(())
    }
}
