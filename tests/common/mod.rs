#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tradepilot::domain::audit::AuditEntry;
use tradepilot::domain::bar::PriceBar;
use tradepilot::domain::error::TradepilotError;
use tradepilot::domain::gateway::Session;
use tradepilot::domain::position::Side;
use tradepilot::domain::prediction::PredictionScore;
use tradepilot::domain::strategy::{IndicatorFamily, StrategyConfig};
use tradepilot::ports::audit_port::AuditPort;
use tradepilot::ports::entitlement_port::EntitlementPort;
use tradepilot::ports::order_port::{OrderPort, OrderResult};
use tradepilot::ports::prediction_port::PredictionPort;

pub fn ts(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::days(i as i64)
}

pub fn bars_from_closes(closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar {
            timestamp: ts(i),
            open: close,
            high: close + 1.0,
            low: (close - 1.0).max(0.01),
            close,
            volume: 1000,
        })
        .collect()
}

pub fn constant_bars(count: usize, price: f64) -> Vec<PriceBar> {
    (0..count).map(|i| PriceBar::flat(ts(i), price)).collect()
}

/// A choppy series that produces both oversold dips and SMA crossings.
pub fn zigzag_closes(count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| {
            let x = i as f64;
            100.0 + (x * 0.45).sin() * 12.0 + (x * 1.7).cos() * 3.0
        })
        .collect()
}

pub fn fast_strategy() -> StrategyConfig {
    StrategyConfig::builder()
        .name("fast")
        .symbol("TEST")
        .sma_window(3)
        .rsi_window(3)
        .rsi_thresholds(40.0, 60.0)
        .max_position_size(5)
        .order_size(2)
        .build()
        .unwrap()
}

/// RSI alone decides, so a choppy series trades often.
pub fn rsi_only_strategy(max_position: i64, order_size: i64, allow_shorting: bool) -> StrategyConfig {
    StrategyConfig::builder()
        .name("rsi-only")
        .symbol("TEST")
        .rsi_window(3)
        .rsi_thresholds(40.0, 60.0)
        .enabled_indicators([IndicatorFamily::Rsi])
        .max_position_size(max_position)
        .order_size(order_size)
        .allow_shorting(allow_shorting)
        .build()
        .unwrap()
}

/// Deterministic predictor: the sign of the last bar's change, scaled.
pub struct MomentumPredictor;

impl PredictionPort for MomentumPredictor {
    fn name(&self) -> &str {
        "momentum"
    }

    fn predict(
        &self,
        history: &[PriceBar],
        _timestamp: NaiveDateTime,
    ) -> Result<PredictionScore, TradepilotError> {
        let value = match history {
            [.., prev, last] => ((last.close - prev.close) / prev.close * 10.0).clamp(-1.0, 1.0),
            _ => 0.0,
        };
        Ok(PredictionScore::new(value, "momentum"))
    }
}

/// Records the history length and last timestamp of every call.
#[derive(Default)]
pub struct RecordingPredictor {
    pub calls: Mutex<Vec<(usize, NaiveDateTime, NaiveDateTime)>>,
}

impl PredictionPort for RecordingPredictor {
    fn name(&self) -> &str {
        "recording"
    }

    fn predict(
        &self,
        history: &[PriceBar],
        timestamp: NaiveDateTime,
    ) -> Result<PredictionScore, TradepilotError> {
        let last = history.last().map(|b| b.timestamp).unwrap_or(timestamp);
        self.calls.lock().unwrap().push((history.len(), last, timestamp));
        Ok(PredictionScore::new(0.5, "recording"))
    }
}

pub struct FailingPredictor;

impl PredictionPort for FailingPredictor {
    fn name(&self) -> &str {
        "failing"
    }

    fn predict(
        &self,
        _history: &[PriceBar],
        _timestamp: NaiveDateTime,
    ) -> Result<PredictionScore, TradepilotError> {
        Err(TradepilotError::Prediction {
            source_name: "failing".into(),
            reason: "model offline".into(),
        })
    }
}

pub struct FixedEntitlement {
    pub allowed: bool,
    pub checks: AtomicUsize,
}

impl FixedEntitlement {
    pub fn new(allowed: bool) -> Self {
        Self {
            allowed,
            checks: AtomicUsize::new(0),
        }
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

impl EntitlementPort for FixedEntitlement {
    fn is_automated_execution_allowed(&self, _session: &Session) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.allowed
    }
}

/// Broker stub that fills every order at a fixed price and records calls.
pub struct RecordingBroker {
    pub orders: Mutex<Vec<(String, Side, i64)>>,
    pub fail: bool,
    pub delay: Duration,
}

impl RecordingBroker {
    pub fn new() -> Self {
        Self {
            orders: Mutex::new(Vec::new()),
            fail: false,
            delay: Duration::ZERO,
        }
    }

    /// Fills every order, but only after `delay`.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }
}

impl OrderPort for RecordingBroker {
    fn place_order(&self, symbol: &str, side: Side, size: i64) -> Result<OrderResult, TradepilotError> {
        std::thread::sleep(self.delay);
        let mut orders = self.orders.lock().unwrap();
        orders.push((symbol.to_string(), side, size));
        if self.fail {
            return Err(TradepilotError::Execution {
                reason: "connection reset".into(),
            });
        }
        Ok(OrderResult {
            success: true,
            order_id: Some(format!("ord-{}", orders.len())),
            filled_quantity: size,
            fill_price: Some(100.0),
            message: None,
        })
    }
}

pub fn session() -> Session {
    Session {
        id: "session-1".into(),
        user: "alice".into(),
    }
}

/// Audit sink whose writes always fail.
pub struct BrokenAuditLog;

impl AuditPort for BrokenAuditLog {
    fn append(&self, _entry: &AuditEntry) -> Result<(), TradepilotError> {
        Err(TradepilotError::audit_write("disk full"))
    }

    fn ready(&self) -> Result<(), TradepilotError> {
        Err(TradepilotError::audit_write("disk full"))
    }

    fn entries_for_run(&self, _run_id: &str) -> Result<Vec<AuditEntry>, TradepilotError> {
        Ok(Vec::new())
    }

    fn entries(&self) -> Result<Vec<AuditEntry>, TradepilotError> {
        Ok(Vec::new())
    }
}
