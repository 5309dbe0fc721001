//! Virtual ledger for one run: cash, the single position, and equity tracking.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::position::{ClosedTrade, Position};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub position: Position,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
    pub commissions_paid: f64,
    pub fills: usize,
}

impl Portfolio {
    pub fn new(symbol: &str, initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            position: Position::flat(symbol),
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
            commissions_paid: 0.0,
            fills: 0,
        }
    }

    pub fn record_trade(&mut self, trade: ClosedTrade) {
        self.closed_trades.push(trade);
    }

    pub fn record_equity(&mut self, timestamp: NaiveDateTime, equity: f64) {
        self.equity_curve.push(EquityPoint { timestamp, equity });
    }

    /// Cash plus the signed position marked at `price`.
    pub fn total_equity(&self, price: f64) -> f64 {
        self.cash + self.position.quantity as f64 * price
    }
}
