//! Price bar representation and series validation.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::TradepilotError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl PriceBar {
    /// A bar with every price set to `price`, as produced by single-price feeds.
    pub fn flat(timestamp: NaiveDateTime, price: f64) -> Self {
        PriceBar {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0,
        }
    }

    /// Prices finite and positive, high >= low, volume non-negative.
    pub fn is_well_formed(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        prices.iter().all(|p| p.is_finite() && *p > 0.0) && self.high >= self.low && self.volume >= 0
    }
}

/// Accepted timestamp layouts, tried in order.
const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Parse a bar timestamp; bare dates resolve to midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Check a series is well formed with strictly increasing timestamps.
pub fn validate_series(bars: &[PriceBar]) -> Result<(), TradepilotError> {
    for (index, bar) in bars.iter().enumerate() {
        if !bar.is_well_formed() {
            return Err(TradepilotError::data(format!(
                "malformed bar {} at {}",
                index, bar.timestamp
            )));
        }
        if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
            return Err(TradepilotError::NonMonotonic {
                index,
                previous: bars[index - 1].timestamp,
                current: bar.timestamp,
            });
        }
    }
    Ok(())
}

/// Validate a series, optionally dropping bad bars instead of failing.
///
/// With `tolerate_bad_bars` a malformed bar, or one that does not advance past
/// the last kept timestamp, is skipped with a warning. Otherwise the first bad
/// bar fails the whole series.
pub fn sanitize_series(
    bars: &[PriceBar],
    tolerate_bad_bars: bool,
) -> Result<Vec<PriceBar>, TradepilotError> {
    if !tolerate_bad_bars {
        validate_series(bars)?;
        return Ok(bars.to_vec());
    }

    let mut kept: Vec<PriceBar> = Vec::with_capacity(bars.len());
    for (index, bar) in bars.iter().enumerate() {
        if !bar.is_well_formed() {
            warn!(index, timestamp = %bar.timestamp, "skipping malformed bar");
            continue;
        }
        if let Some(last) = kept.last() {
            if bar.timestamp <= last.timestamp {
                warn!(
                    index,
                    timestamp = %bar.timestamp,
                    previous = %last.timestamp,
                    "skipping out-of-order bar"
                );
                continue;
            }
        }
        kept.push(bar.clone());
    }
    Ok(kept)
}
