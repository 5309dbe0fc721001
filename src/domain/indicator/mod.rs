//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorKind`: Indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: A time series of indicator values aligned 1:1 with bars
//!
//! Every indicator exposes a streaming stepper (one close at a time) and a
//! batch function built from it, so a value at bar `t` only ever depends on
//! bars `0..=t`.

pub mod rsi;
pub mod sma;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use rsi::{RsiStepper, calculate_rsi};
pub use sma::{SmaStepper, calculate_sma};

/// A single indicator value. `value` is `None` until warm-up completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IndicatorKind {
    Sma(usize),
    Rsi(usize),
}

impl IndicatorKind {
    /// Number of leading bars without a value.
    pub fn warmup(&self) -> usize {
        match self {
            IndicatorKind::Sma(window) => window.saturating_sub(1),
            IndicatorKind::Rsi(window) => *window,
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorKind::Sma(window) => write!(f, "SMA({})", window),
            IndicatorKind::Rsi(window) => write!(f, "RSI({})", window),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSeries {
    pub kind: IndicatorKind,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.values.get(index).and_then(|p| p.value)
    }

    /// Number of points carrying a value.
    pub fn defined_count(&self) -> usize {
        self.values.iter().filter(|p| p.value.is_some()).count()
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.last().and_then(|p| p.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_kind_display() {
        assert_eq!(IndicatorKind::Sma(20).to_string(), "SMA(20)");
        assert_eq!(IndicatorKind::Rsi(14).to_string(), "RSI(14)");
    }

    #[test]
    fn indicator_kind_warmup() {
        assert_eq!(IndicatorKind::Sma(5).warmup(), 4);
        assert_eq!(IndicatorKind::Sma(0).warmup(), 0);
        assert_eq!(IndicatorKind::Rsi(14).warmup(), 14);
    }

    #[test]
    fn indicator_kind_hash_eq() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(IndicatorKind::Sma(20), "sma20");
        map.insert(IndicatorKind::Sma(50), "sma50");
        map.insert(IndicatorKind::Rsi(14), "rsi14");

        assert_eq!(map.get(&IndicatorKind::Sma(20)), Some(&"sma20"));
        assert_eq!(map.get(&IndicatorKind::Sma(50)), Some(&"sma50"));
        assert_eq!(map.get(&IndicatorKind::Rsi(14)), Some(&"rsi14"));
        assert_eq!(map.get(&IndicatorKind::Rsi(7)), None);
    }
}
