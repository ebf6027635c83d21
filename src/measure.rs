use serde::{Deserialize, Serialize};

/// Which score a detector ranks images by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlurrinessMeasure {
    /// Variance of the Laplacian response. Computed locally.
    #[default]
    EdgeVariance,
    /// Blurriness probability from an external model.
    LearnedProbability,
}

impl BlurrinessMeasure {
    pub fn sense(self) -> ComparisonSense {
        match self {
            BlurrinessMeasure::EdgeVariance => ComparisonSense::HigherIsBetter,
            BlurrinessMeasure::LearnedProbability => ComparisonSense::LowerIsBetter,
        }
    }
}

/// Strict "better than" ordering for scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonSense {
    HigherIsBetter,
    LowerIsBetter,
}

impl ComparisonSense {
    /// Returns true if `a` is strictly better than `b`. Equal scores are never better.
    #[inline]
    pub fn better(self, a: f32, b: f32) -> bool {
        match self {
            ComparisonSense::HigherIsBetter => a > b,
            ComparisonSense::LowerIsBetter => a < b,
        }
    }
}
