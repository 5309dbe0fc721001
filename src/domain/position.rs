//! Position tracking: signed quantity, average entry, realized P&L.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::signal::SignalAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn from_action(action: SignalAction) -> Option<Side> {
        match action {
            SignalAction::Buy => Some(Side::Buy),
            SignalAction::Sell => Some(Side::Sell),
            SignalAction::Hold => None,
        }
    }

    /// +1 for buys, -1 for sells.
    pub fn sign(&self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("BUY"),
            Side::Sell => f.write_str("SELL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: i64,
    pub avg_entry_price: f64,
    pub realized_pnl: f64,
    pub opened_at: Option<NaiveDateTime>,
}

/// The closing leg of a fill that reduced or flipped a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub symbol: String,
    /// Signed quantity of the position that was closed (positive = long).
    pub quantity: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub pnl: f64,
}

impl Position {
    pub fn flat(symbol: impl Into<String>) -> Self {
        Position {
            symbol: symbol.into(),
            quantity: 0,
            avg_entry_price: 0.0,
            realized_pnl: 0.0,
            opened_at: None,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity.unsigned_abs() as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity as f64 * (price - self.avg_entry_price)
    }

    /// Apply a fill and return the closed leg, if the fill reduced exposure.
    pub fn apply_fill(
        &mut self,
        side: Side,
        quantity: i64,
        price: f64,
        time: NaiveDateTime,
    ) -> Option<ClosedTrade> {
        if quantity <= 0 {
            return None;
        }
        let delta = side.sign() * quantity;

        if self.quantity == 0 || self.quantity.signum() == delta.signum() {
            let held = self.quantity.unsigned_abs() as f64;
            let added = quantity as f64;
            self.avg_entry_price = (held * self.avg_entry_price + added * price) / (held + added);
            if self.quantity == 0 {
                self.opened_at = Some(time);
            }
            self.quantity += delta;
            return None;
        }

        let closing = quantity.min(self.quantity.abs());
        let closed_signed = self.quantity.signum() * closing;
        let pnl = closed_signed as f64 * (price - self.avg_entry_price);
        self.realized_pnl += pnl;

        let trade = ClosedTrade {
            symbol: self.symbol.clone(),
            quantity: closed_signed,
            entry_price: self.avg_entry_price,
            exit_price: price,
            entry_time: self.opened_at.unwrap_or(time),
            exit_time: time,
            pnl,
        };

        self.quantity -= closed_signed;
        let remaining = quantity - closing;
        if self.quantity == 0 {
            self.avg_entry_price = 0.0;
            self.opened_at = None;
        }
        if remaining > 0 {
            self.quantity = side.sign() * remaining;
            self.avg_entry_price = price;
            self.opened_at = Some(time);
        }

        Some(trade)
    }
}
