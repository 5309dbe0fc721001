//! Externally supplied prediction scores and their declared ranges.

use serde::{Deserialize, Serialize};

use super::error::TradepilotError;
use super::signal::Lean;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionScore {
    pub value: f64,
    /// Optional model confidence in [0, 1].
    pub confidence: Option<f64>,
    pub source: String,
}

/// Inclusive bounds a predictor declares for its `value`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
}

impl ScoreRange {
    /// -1 (strong sell) .. +1 (strong buy)
    pub const SIGNED: ScoreRange = ScoreRange { min: -1.0, max: 1.0 };
    /// 0 (strong sell) .. 1 (strong buy), 0.5 neutral
    pub const UNIT: ScoreRange = ScoreRange { min: 0.0, max: 1.0 };

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    /// Which way the score points relative to the range midpoint.
    pub fn direction(&self, value: f64) -> Lean {
        let mid = self.midpoint();
        if value > mid {
            Lean::Bullish
        } else if value < mid {
            Lean::Bearish
        } else {
            Lean::Neutral
        }
    }

    /// Distance from the midpoint normalized to [0, 1].
    pub fn strength(&self, value: f64) -> f64 {
        let half = (self.max - self.min) / 2.0;
        if half <= 0.0 {
            return 0.0;
        }
        ((value - self.midpoint()).abs() / half).min(1.0)
    }
}

impl Default for ScoreRange {
    fn default() -> Self {
        ScoreRange::SIGNED
    }
}

impl PredictionScore {
    pub fn new(value: f64, source: impl Into<String>) -> Self {
        PredictionScore {
            value,
            confidence: None,
            source: source.into(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Supplied confidence, or the score's normalized distance from neutral.
    pub fn effective_confidence(&self, range: &ScoreRange) -> f64 {
        self.confidence.unwrap_or_else(|| range.strength(self.value))
    }

    /// Reject scores outside the declared range or with a bad confidence.
    pub fn check(&self, range: &ScoreRange) -> Result<(), TradepilotError> {
        if !range.contains(self.value) {
            return Err(TradepilotError::Prediction {
                source_name: self.source.clone(),
                reason: format!(
                    "score {} outside declared range [{}, {}]",
                    self.value, range.min, range.max
                ),
            });
        }
        if let Some(c) = self.confidence {
            if !(c.is_finite() && (0.0..=1.0).contains(&c)) {
                return Err(TradepilotError::Prediction {
                    source_name: self.source.clone(),
                    reason: format!("confidence {} outside [0, 1]", c),
                });
            }
        }
        Ok(())
    }
}
