//! Strategy configuration: validated once at construction, immutable after.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::error::TradepilotError;
use super::indicator::IndicatorKind;
use super::prediction::ScoreRange;

/// Indicator families the signal policy can combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorFamily {
    Sma,
    Rsi,
}

impl FromStr for IndicatorFamily {
    type Err = TradepilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sma" => Ok(IndicatorFamily::Sma),
            "rsi" => Ok(IndicatorFamily::Rsi),
            other => Err(TradepilotError::configuration(
                "enabled_indicators",
                format!("unknown indicator '{}'", other),
            )),
        }
    }
}

impl fmt::Display for IndicatorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorFamily::Sma => f.write_str("sma"),
            IndicatorFamily::Rsi => f.write_str("rsi"),
        }
    }
}

pub const DEFAULT_SMA_BUY_BAND: f64 = 0.02;
pub const DEFAULT_SMA_SELL_BAND: f64 = 0.03;

/// How price relative to its SMA produces a lean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SmaTrigger {
    /// Lean only on the bar where close crosses the SMA.
    Crossover,
    /// Lean whenever close sits above/below the SMA.
    Level,
    /// Lean once close leaves a percentage band around the SMA:
    /// below `sma * (1 - buy_band)` is bullish, above `sma * (1 + sell_band)` bearish.
    Band,
}

impl FromStr for SmaTrigger {
    type Err = TradepilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "crossover" | "cross" => Ok(SmaTrigger::Crossover),
            "level" => Ok(SmaTrigger::Level),
            "band" => Ok(SmaTrigger::Band),
            other => Err(TradepilotError::configuration(
                "sma_trigger",
                format!("unknown trigger '{}' (expected crossover, level or band)", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyConfig {
    name: String,
    symbol: String,
    sma_window: usize,
    rsi_window: usize,
    rsi_oversold: f64,
    rsi_overbought: f64,
    sma_trigger: SmaTrigger,
    sma_buy_band: f64,
    sma_sell_band: f64,
    min_prediction_confidence: Option<f64>,
    prediction_range: ScoreRange,
    max_position_size: i64,
    order_size: i64,
    allow_shorting: bool,
    enabled_indicators: BTreeSet<IndicatorFamily>,
}

impl StrategyConfig {
    pub fn builder() -> StrategyConfigBuilder {
        StrategyConfigBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn sma_window(&self) -> usize {
        self.sma_window
    }

    pub fn rsi_window(&self) -> usize {
        self.rsi_window
    }

    pub fn rsi_oversold(&self) -> f64 {
        self.rsi_oversold
    }

    pub fn rsi_overbought(&self) -> f64 {
        self.rsi_overbought
    }

    pub fn sma_trigger(&self) -> SmaTrigger {
        self.sma_trigger
    }

    /// Fraction below the SMA that triggers a buy lean in band mode.
    pub fn sma_buy_band(&self) -> f64 {
        self.sma_buy_band
    }

    pub fn sma_sell_band(&self) -> f64 {
        self.sma_sell_band
    }

    pub fn min_prediction_confidence(&self) -> Option<f64> {
        self.min_prediction_confidence
    }

    pub fn prediction_range(&self) -> ScoreRange {
        self.prediction_range
    }

    pub fn max_position_size(&self) -> i64 {
        self.max_position_size
    }

    pub fn order_size(&self) -> i64 {
        self.order_size
    }

    pub fn allow_shorting(&self) -> bool {
        self.allow_shorting
    }

    pub fn enabled_indicators(&self) -> &BTreeSet<IndicatorFamily> {
        &self.enabled_indicators
    }

    pub fn is_enabled(&self, family: IndicatorFamily) -> bool {
        self.enabled_indicators.contains(&family)
    }

    /// Indicator series the policy needs for this configuration.
    pub fn indicator_kinds(&self) -> Vec<IndicatorKind> {
        self.enabled_indicators
            .iter()
            .map(|family| match family {
                IndicatorFamily::Sma => IndicatorKind::Sma(self.sma_window),
                IndicatorFamily::Rsi => IndicatorKind::Rsi(self.rsi_window),
            })
            .collect()
    }

    /// Start a builder pre-filled with this config, for deriving a new run.
    pub fn to_builder(&self) -> StrategyConfigBuilder {
        StrategyConfigBuilder {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            sma_window: self.sma_window,
            rsi_window: self.rsi_window,
            rsi_oversold: self.rsi_oversold,
            rsi_overbought: self.rsi_overbought,
            sma_trigger: self.sma_trigger,
            sma_buy_band: self.sma_buy_band,
            sma_sell_band: self.sma_sell_band,
            min_prediction_confidence: self.min_prediction_confidence,
            prediction_range: self.prediction_range,
            max_position_size: self.max_position_size,
            order_size: self.order_size,
            allow_shorting: self.allow_shorting,
            enabled_indicators: self.enabled_indicators.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StrategyConfigBuilder {
    name: String,
    symbol: String,
    sma_window: usize,
    rsi_window: usize,
    rsi_oversold: f64,
    rsi_overbought: f64,
    sma_trigger: SmaTrigger,
    sma_buy_band: f64,
    sma_sell_band: f64,
    min_prediction_confidence: Option<f64>,
    prediction_range: ScoreRange,
    max_position_size: i64,
    order_size: i64,
    allow_shorting: bool,
    enabled_indicators: BTreeSet<IndicatorFamily>,
}

impl Default for StrategyConfigBuilder {
    fn default() -> Self {
        StrategyConfigBuilder {
            name: "Unnamed".to_string(),
            symbol: "UNKNOWN".to_string(),
            sma_window: 20,
            rsi_window: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            sma_trigger: SmaTrigger::Crossover,
            sma_buy_band: DEFAULT_SMA_BUY_BAND,
            sma_sell_band: DEFAULT_SMA_SELL_BAND,
            min_prediction_confidence: None,
            prediction_range: ScoreRange::SIGNED,
            max_position_size: 1,
            order_size: 1,
            allow_shorting: false,
            enabled_indicators: [IndicatorFamily::Sma, IndicatorFamily::Rsi]
                .into_iter()
                .collect(),
        }
    }
}

impl StrategyConfigBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    pub fn sma_window(mut self, window: usize) -> Self {
        self.sma_window = window;
        self
    }

    pub fn rsi_window(mut self, window: usize) -> Self {
        self.rsi_window = window;
        self
    }

    pub fn rsi_thresholds(mut self, oversold: f64, overbought: f64) -> Self {
        self.rsi_oversold = oversold;
        self.rsi_overbought = overbought;
        self
    }

    pub fn sma_trigger(mut self, trigger: SmaTrigger) -> Self {
        self.sma_trigger = trigger;
        self
    }

    pub fn sma_bands(mut self, buy_band: f64, sell_band: f64) -> Self {
        self.sma_buy_band = buy_band;
        self.sma_sell_band = sell_band;
        self
    }

    pub fn min_prediction_confidence(mut self, threshold: Option<f64>) -> Self {
        self.min_prediction_confidence = threshold;
        self
    }

    pub fn prediction_range(mut self, range: ScoreRange) -> Self {
        self.prediction_range = range;
        self
    }

    pub fn max_position_size(mut self, size: i64) -> Self {
        self.max_position_size = size;
        self
    }

    pub fn order_size(mut self, size: i64) -> Self {
        self.order_size = size;
        self
    }

    pub fn allow_shorting(mut self, allow: bool) -> Self {
        self.allow_shorting = allow;
        self
    }

    pub fn enabled_indicators<I: IntoIterator<Item = IndicatorFamily>>(mut self, families: I) -> Self {
        self.enabled_indicators = families.into_iter().collect();
        self
    }

    /// Validate every field and produce an immutable config.
    pub fn build(self) -> Result<StrategyConfig, TradepilotError> {
        if self.sma_window < 1 {
            return Err(TradepilotError::configuration(
                "sma_window",
                "sma_window must be at least 1",
            ));
        }
        if self.rsi_window < 1 {
            return Err(TradepilotError::configuration(
                "rsi_window",
                "rsi_window must be at least 1",
            ));
        }
        if !(self.rsi_oversold.is_finite() && (0.0..=100.0).contains(&self.rsi_oversold)) {
            return Err(TradepilotError::configuration(
                "rsi_oversold",
                "rsi_oversold must be between 0 and 100",
            ));
        }
        if !(self.rsi_overbought.is_finite() && (0.0..=100.0).contains(&self.rsi_overbought)) {
            return Err(TradepilotError::configuration(
                "rsi_overbought",
                "rsi_overbought must be between 0 and 100",
            ));
        }
        if self.rsi_oversold >= self.rsi_overbought {
            return Err(TradepilotError::configuration(
                "rsi_oversold",
                "rsi_oversold must be below rsi_overbought",
            ));
        }
        if !(self.sma_buy_band.is_finite() && (0.0..1.0).contains(&self.sma_buy_band)) {
            return Err(TradepilotError::configuration(
                "sma_buy_band",
                "sma_buy_band must be at least 0 and below 1",
            ));
        }
        if !(self.sma_sell_band.is_finite() && self.sma_sell_band >= 0.0) {
            return Err(TradepilotError::configuration(
                "sma_sell_band",
                "sma_sell_band must be non-negative",
            ));
        }
        let range = self.prediction_range;
        if !(range.min.is_finite() && range.max.is_finite() && range.min < range.max) {
            return Err(TradepilotError::configuration(
                "prediction_range",
                "prediction range min must be below max",
            ));
        }
        if let Some(threshold) = self.min_prediction_confidence {
            if !(threshold.is_finite() && (0.0..=1.0).contains(&threshold)) {
                return Err(TradepilotError::configuration(
                    "min_prediction_confidence",
                    "min_prediction_confidence must be between 0 and 1",
                ));
            }
        }
        if self.max_position_size <= 0 {
            return Err(TradepilotError::configuration(
                "max_position_size",
                "max_position_size must be positive",
            ));
        }
        if self.order_size <= 0 {
            return Err(TradepilotError::configuration(
                "order_size",
                "order_size must be positive",
            ));
        }
        if self.order_size > self.max_position_size {
            return Err(TradepilotError::configuration(
                "order_size",
                "order_size must not exceed max_position_size",
            ));
        }
        if self.enabled_indicators.is_empty() {
            return Err(TradepilotError::configuration(
                "enabled_indicators",
                "at least one indicator must be enabled",
            ));
        }
        if self.symbol.trim().is_empty() {
            return Err(TradepilotError::configuration(
                "symbol",
                "symbol must not be empty",
            ));
        }

        Ok(StrategyConfig {
            name: self.name,
            symbol: self.symbol.trim().to_uppercase(),
            sma_window: self.sma_window,
            rsi_window: self.rsi_window,
            rsi_oversold: self.rsi_oversold,
            rsi_overbought: self.rsi_overbought,
            sma_trigger: self.sma_trigger,
            sma_buy_band: self.sma_buy_band,
            sma_sell_band: self.sma_sell_band,
            min_prediction_confidence: self.min_prediction_confidence,
            prediction_range: self.prediction_range,
            max_position_size: self.max_position_size,
            order_size: self.order_size,
            allow_shorting: self.allow_shorting,
            enabled_indicators: self.enabled_indicators,
        })
    }
}

/// Parse a comma-separated indicator list such as `"sma, rsi"`.
pub fn parse_enabled_indicators(value: &str) -> Result<BTreeSet<IndicatorFamily>, TradepilotError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(IndicatorFamily::from_str)
        .collect()
}
