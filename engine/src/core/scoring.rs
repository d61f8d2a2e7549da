//! Weighted multi-criteria scoring and derived complexity metrics

use shared::{ComplexityScores, CriterionSpec, ScoreBreakdown};
use std::collections::HashMap;

/// Criterion key feeding the technical complexity component
pub const TECHNICAL_FEASIBILITY: &str = "technical_feasibility";
/// Criterion key feeding the regulatory complexity component
pub const REGULATORY_EASE: &str = "regulatory_ease";
/// Criterion key feeding the sales complexity component
pub const SALES_CYCLE_SPEED: &str = "sales_cycle_speed";

/// Complexity components invert a 1-10 ease score: 10 (easiest) maps to 1
const COMPLEXITY_INVERSION_BASE: f64 = 11.0;

/// Computes weighted totals and derived complexity from raw criterion scores
///
/// Stateless; all inputs come from the active profile and the parsed
/// candidate. Out-of-range raw values are clamped to the criterion's
/// declared range rather than rejected, tolerating minor provider drift.
pub struct ScoringAggregator;

impl ScoringAggregator {
    /// Aggregate raw scores into a 0-100 weighted total
    ///
    /// Each raw score is clamped to its criterion's declared range and
    /// normalized within it; the total is the weight-normalized mean of
    /// those fractions scaled to 0-100. Weights are divided by their own
    /// sum, so profiles whose weights do not sum to 100 behave identically
    /// to ones that do. Criteria without a raw score contribute nothing.
    pub fn aggregate(raw_scores: &HashMap<String, f64>, criteria: &[CriterionSpec]) -> ScoreBreakdown {
        let mut per_criterion = HashMap::new();
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;

        for criterion in criteria {
            let Some(&raw) = raw_scores.get(&criterion.key) else {
                continue;
            };

            let clamped = raw.clamp(criterion.min, criterion.max);
            per_criterion.insert(criterion.key.clone(), clamped);

            let span = criterion.max - criterion.min;
            if span <= 0.0 || criterion.weight <= 0.0 {
                continue;
            }

            let fraction = (clamped - criterion.min) / span;
            weighted_sum += fraction * criterion.weight;
            weight_sum += criterion.weight;
        }

        let total = if weight_sum > 0.0 {
            (weighted_sum / weight_sum * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        ScoreBreakdown { total, per_criterion }
    }

    /// Derive complexity metrics from the named ease criteria
    ///
    /// Each component is `11 - ease`, so an idea scored 10 for feasibility
    /// carries complexity 1. A criterion absent from the raw scores leaves
    /// its component absent; the total exists only when all three do.
    pub fn complexity(raw_scores: &HashMap<String, f64>) -> ComplexityScores {
        let invert = |key: &str| raw_scores.get(key).map(|v| COMPLEXITY_INVERSION_BASE - v);

        let technical = invert(TECHNICAL_FEASIBILITY);
        let regulatory = invert(REGULATORY_EASE);
        let sales = invert(SALES_CYCLE_SPEED);

        let total = match (technical, regulatory, sales) {
            (Some(t), Some(r), Some(s)) => Some(t + r + s),
            _ => None,
        };

        ComplexityScores {
            technical,
            regulatory,
            sales,
            total,
        }
    }
}
