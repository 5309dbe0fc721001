//! Shared helper functions for indicator calculations.

use std::collections::HashMap;

use crate::domain::bar::PriceBar;
use crate::domain::indicator::{IndicatorKind, IndicatorSeries, calculate_rsi, calculate_sma};

pub fn compute_indicator(bars: &[PriceBar], kind: IndicatorKind) -> IndicatorSeries {
    match kind {
        IndicatorKind::Sma(window) => calculate_sma(bars, window),
        IndicatorKind::Rsi(window) => calculate_rsi(bars, window),
    }
}

/// Compute each requested indicator once; duplicates collapse onto one key.
pub fn compute_indicators(
    bars: &[PriceBar],
    kinds: &[IndicatorKind],
) -> HashMap<IndicatorKind, IndicatorSeries> {
    let mut out = HashMap::with_capacity(kinds.len());
    for kind in kinds {
        out.entry(*kind)
            .or_insert_with(|| compute_indicator(bars, *kind));
    }
    out
}
