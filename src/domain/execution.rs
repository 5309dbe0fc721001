//! Simulated fills: slippage, commissions, and ledger updates.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::portfolio::Portfolio;
use super::position::{ClosedTrade, Side};

/// Cost model applied to every simulated fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionCosts {
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
}

impl Default for ExecutionCosts {
    fn default() -> Self {
        ExecutionCosts {
            commission_per_trade: 0.0,
            commission_pct: 0.0,
            slippage_pct: 0.0,
        }
    }
}

/// Calculate commission: flat_fee + (trade_value * pct / 100).
pub fn calculate_commission(trade_value: f64, costs: &ExecutionCosts) -> f64 {
    costs.commission_per_trade + (trade_value * costs.commission_pct / 100.0)
}

/// Buys fill above the market price, sells below it.
pub fn apply_slippage(market_price: f64, side: Side, slippage_pct: f64) -> f64 {
    match side {
        Side::Buy => market_price * (1.0 + slippage_pct / 100.0),
        Side::Sell => market_price * (1.0 - slippage_pct / 100.0),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FillResult {
    Filled {
        quantity: i64,
        price: f64,
        commission: f64,
        closed: Option<ClosedTrade>,
    },
    InsufficientCapital,
}

/// Fill `quantity` on `side` at `market_price` against the portfolio.
///
/// Buys must be fully paid for from cash including commission; sell proceeds
/// are credited to cash. The position handles averaging and realized P&L.
pub fn fill(
    portfolio: &mut Portfolio,
    side: Side,
    quantity: i64,
    market_price: f64,
    time: NaiveDateTime,
    costs: &ExecutionCosts,
) -> FillResult {
    if quantity <= 0 {
        return FillResult::InsufficientCapital;
    }
    let price = apply_slippage(market_price, side, costs.slippage_pct);
    let notional = quantity as f64 * price;
    let commission = calculate_commission(notional, costs);

    match side {
        Side::Buy => {
            if notional + commission > portfolio.cash {
                return FillResult::InsufficientCapital;
            }
            portfolio.cash -= notional + commission;
        }
        Side::Sell => {
            portfolio.cash += notional - commission;
        }
    }
    portfolio.commissions_paid += commission;
    portfolio.fills += 1;

    let closed = portfolio.position.apply_fill(side, quantity, price, time);
    if let Some(trade) = &closed {
        portfolio.record_trade(trade.clone());
    }

    FillResult::Filled {
        quantity,
        price,
        commission,
        closed,
    }
}
