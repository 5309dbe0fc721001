//! Trade signals and the indicator snapshot they are derived from.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::prediction::PredictionScore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalAction::Buy => write!(f, "BUY"),
            SignalAction::Sell => write!(f, "SELL"),
            SignalAction::Hold => write!(f, "HOLD"),
        }
    }
}

/// Directional lean contributed by one input to the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lean {
    Bullish,
    Bearish,
    Neutral,
}

/// Why the policy settled on HOLD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldReason {
    Warmup,
    NeutralLean,
    ConflictingLeans,
    PredictionContradicts,
    LowConfidence,
}

impl fmt::Display for HoldReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HoldReason::Warmup => "warmup",
            HoldReason::NeutralLean => "neutral-lean",
            HoldReason::ConflictingLeans => "conflicting-leans",
            HoldReason::PredictionContradicts => "prediction-contradicts",
            HoldReason::LowConfidence => "low-confidence",
        };
        f.write_str(s)
    }
}

/// Indicator values aligned to one bar, plus the previous bar's close/SMA
/// needed to detect crossings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub prev_close: Option<f64>,
    pub sma: Option<f64>,
    pub prev_sma: Option<f64>,
    pub rsi: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub timestamp: NaiveDateTime,
    pub action: SignalAction,
    pub indicators: IndicatorSnapshot,
    pub prediction: Option<PredictionScore>,
    pub hold_reason: Option<HoldReason>,
}
