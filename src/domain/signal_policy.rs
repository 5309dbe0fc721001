//! Signal policy: indicator leans + optional prediction → BUY / SELL / HOLD.
//!
//! Rules:
//! - RSI < oversold is bullish, RSI > overbought is bearish, else neutral.
//! - Close crossing above its SMA is bullish, crossing below is bearish
//!   (or, with `SmaTrigger::Level`, simply sitting above/below it; with
//!   `SmaTrigger::Band`, leaving a percentage band around it).
//! - Every enabled indicator must lean the same non-neutral way. A present
//!   prediction must not point the other way and must meet the configured
//!   minimum confidence.
//! - Anything else is HOLD. The policy never guesses.

use chrono::NaiveDateTime;
use tracing::warn;

use super::error::TradepilotError;
use super::indicator::IndicatorSeries;
use super::prediction::PredictionScore;
use super::signal::{HoldReason, IndicatorSnapshot, Lean, Signal, SignalAction};
use super::strategy::{IndicatorFamily, SmaTrigger, StrategyConfig};

/// RSI lean, or `None` while RSI is still warming up.
pub fn rsi_lean(rsi: Option<f64>, config: &StrategyConfig) -> Option<Lean> {
    let rsi = rsi?;
    Some(if rsi < config.rsi_oversold() {
        Lean::Bullish
    } else if rsi > config.rsi_overbought() {
        Lean::Bearish
    } else {
        Lean::Neutral
    })
}

/// SMA lean, or `None` when the values the trigger needs are missing.
pub fn sma_lean(snapshot: &IndicatorSnapshot, config: &StrategyConfig) -> Option<Lean> {
    let sma = snapshot.sma?;
    let close = snapshot.close;
    match config.sma_trigger() {
        SmaTrigger::Level => Some(if close > sma {
            Lean::Bullish
        } else if close < sma {
            Lean::Bearish
        } else {
            Lean::Neutral
        }),
        SmaTrigger::Band => Some(if close < sma * (1.0 - config.sma_buy_band()) {
            Lean::Bullish
        } else if close > sma * (1.0 + config.sma_sell_band()) {
            Lean::Bearish
        } else {
            Lean::Neutral
        }),
        SmaTrigger::Crossover => {
            let prev_close = snapshot.prev_close?;
            let prev_sma = snapshot.prev_sma?;
            Some(if prev_close <= prev_sma && close > sma {
                Lean::Bullish
            } else if prev_close >= prev_sma && close < sma {
                Lean::Bearish
            } else {
                Lean::Neutral
            })
        }
    }
}

fn opposite(a: Lean, b: Lean) -> bool {
    matches!(
        (a, b),
        (Lean::Bullish, Lean::Bearish) | (Lean::Bearish, Lean::Bullish)
    )
}

fn decide(
    snapshot: &IndicatorSnapshot,
    config: &StrategyConfig,
    prediction: Option<&PredictionScore>,
) -> Result<SignalAction, HoldReason> {
    let mut leans = Vec::with_capacity(2);
    for family in config.enabled_indicators() {
        let lean = match family {
            IndicatorFamily::Sma => sma_lean(snapshot, config),
            IndicatorFamily::Rsi => rsi_lean(snapshot.rsi, config),
        };
        leans.push(lean.ok_or(HoldReason::Warmup)?);
    }

    let bullish = leans.iter().any(|l| *l == Lean::Bullish);
    let bearish = leans.iter().any(|l| *l == Lean::Bearish);
    if bullish && bearish {
        return Err(HoldReason::ConflictingLeans);
    }
    if leans.iter().any(|l| *l == Lean::Neutral) || !(bullish || bearish) {
        return Err(HoldReason::NeutralLean);
    }
    let direction = if bullish { Lean::Bullish } else { Lean::Bearish };

    if let Some(score) = prediction {
        let range = config.prediction_range();
        if opposite(direction, range.direction(score.value)) {
            return Err(HoldReason::PredictionContradicts);
        }
        if let Some(threshold) = config.min_prediction_confidence() {
            if score.effective_confidence(&range) < threshold {
                return Err(HoldReason::LowConfidence);
            }
        }
    }

    Ok(if bullish {
        SignalAction::Buy
    } else {
        SignalAction::Sell
    })
}

/// Produce exactly one signal for one bar. Pure: no hidden state.
pub fn evaluate(
    timestamp: NaiveDateTime,
    snapshot: &IndicatorSnapshot,
    config: &StrategyConfig,
    prediction: Option<&PredictionScore>,
) -> Signal {
    let (action, hold_reason) = match decide(snapshot, config, prediction) {
        Ok(action) => (action, None),
        Err(reason) => (SignalAction::Hold, Some(reason)),
    };
    Signal {
        timestamp,
        action,
        indicators: snapshot.clone(),
        prediction: prediction.cloned(),
        hold_reason,
    }
}

/// Build the snapshot for bar `index` from precomputed aligned series.
pub fn snapshot_at(
    closes: &[f64],
    sma: Option<&IndicatorSeries>,
    rsi: Option<&IndicatorSeries>,
    index: usize,
) -> IndicatorSnapshot {
    let prev = index.checked_sub(1);
    IndicatorSnapshot {
        close: closes[index],
        prev_close: prev.map(|i| closes[i]),
        sma: sma.and_then(|s| s.value_at(index)),
        prev_sma: prev.and_then(|i| sma.and_then(|s| s.value_at(i))),
        rsi: rsi.and_then(|s| s.value_at(index)),
    }
}

/// Turn a predictor result into an optional score, degrading failures.
///
/// Errors and out-of-range scores become "no prediction" with a warning so a
/// flaky predictor never fails a run.
pub fn accept_prediction(
    result: Result<PredictionScore, TradepilotError>,
    config: &StrategyConfig,
) -> Option<PredictionScore> {
    let score = match result {
        Ok(score) => score,
        Err(e) => {
            warn!(error = %e, "prediction unavailable, continuing without it");
            return None;
        }
    };
    match score.check(&config.prediction_range()) {
        Ok(()) => Some(score),
        Err(e) => {
            warn!(error = %e, "discarding out-of-range prediction");
            None
        }
    }
}
