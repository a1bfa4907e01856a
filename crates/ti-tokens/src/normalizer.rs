use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TokenError};

/// Confidence tier assigned to a probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceTier::High => write!(f, "high"),
            ConfidenceTier::Medium => write!(f, "medium"),
            ConfidenceTier::Low => write!(f, "low"),
        }
    }
}

/// Lower bounds (inclusive) of the high and medium tiers.
///
/// Anything below `medium` is low.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub high: f64,
    pub medium: f64,
}

impl TierThresholds {
    /// `>= 0.5` high, `>= 0.2` medium.
    pub const STANDARD: TierThresholds = TierThresholds {
        high: 0.5,
        medium: 0.2,
    };

    /// `>= 0.7` high, `>= 0.3` medium.
    pub const STRICT: TierThresholds = TierThresholds {
        high: 0.7,
        medium: 0.3,
    };

    /// Create validated thresholds.
    ///
    /// # Errors
    /// Returns `InvalidThresholds` if either bound is outside `[0, 1]` or
    /// `medium > high`.
    pub fn new(high: f64, medium: f64) -> Result<Self> {
        let thresholds = TierThresholds { high, medium };
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Check the invariants `0 <= medium <= high <= 1`.
    pub fn validate(&self) -> Result<()> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.high) || !in_unit(self.medium) || self.medium > self.high {
            return Err(TokenError::InvalidThresholds {
                high: self.high,
                medium: self.medium,
            });
        }
        Ok(())
    }
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self::STRICT
    }
}

/// Converts log-probabilities into probabilities and classifies them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbabilityNormalizer {
    thresholds: TierThresholds,
}

impl ProbabilityNormalizer {
    /// Create a normalizer that classifies with the given thresholds.
    pub fn new(thresholds: TierThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> TierThresholds {
        self.thresholds
    }

    /// Compute `exp(logprob)` clamped into `(0, 1]`.
    ///
    /// Underflow to zero is clamped to the smallest positive `f64` so that a
    /// stored probability is never zero.
    ///
    /// # Errors
    /// Returns `InvalidProbability` if `logprob` is NaN.
    pub fn normalize(&self, logprob: f64) -> Result<f64> {
        if logprob.is_nan() {
            return Err(TokenError::InvalidProbability(logprob));
        }
        Ok(logprob.exp().clamp(f64::MIN_POSITIVE, 1.0))
    }

    /// Assign a tier to an already-normalized probability.
    pub fn classify(&self, probability: f64) -> ConfidenceTier {
        if probability >= self.thresholds.high {
            ConfidenceTier::High
        } else if probability >= self.thresholds.medium {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }

    /// Normalize and classify in one step.
    pub fn tier_of(&self, logprob: f64) -> Result<ConfidenceTier> {
        self.normalize(logprob).map(|p| self.classify(p))
    }
}
