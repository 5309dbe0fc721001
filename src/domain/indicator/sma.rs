//! Simple Moving Average.
//!
//! SMA[i] = mean(C[i-n+1..=i]). Warmup: first (n-1) bars have no value.

use std::collections::VecDeque;

use crate::domain::bar::PriceBar;
use crate::domain::indicator::{IndicatorKind, IndicatorPoint, IndicatorSeries};

#[derive(Debug, Clone)]
pub struct SmaStepper {
    window: usize,
    closes: VecDeque<f64>,
}

impl SmaStepper {
    pub fn new(window: usize) -> Self {
        SmaStepper {
            window,
            closes: VecDeque::with_capacity(window),
        }
    }

    /// Feed the next close and return the SMA ending at it, if warm.
    pub fn next(&mut self, close: f64) -> Option<f64> {
        if self.window == 0 {
            return None;
        }
        if self.closes.len() == self.window {
            self.closes.pop_front();
        }
        self.closes.push_back(close);
        if self.closes.len() < self.window {
            return None;
        }
        Some(self.closes.iter().sum::<f64>() / self.window as f64)
    }
}

pub fn calculate_sma(bars: &[PriceBar], window: usize) -> IndicatorSeries {
    let mut stepper = SmaStepper::new(window);
    let values = bars
        .iter()
        .map(|bar| IndicatorPoint {
            timestamp: bar.timestamp,
            value: stepper.next(bar.close),
        })
        .collect();

    IndicatorSeries {
        kind: IndicatorKind::Sma(window),
        values,
    }
}
