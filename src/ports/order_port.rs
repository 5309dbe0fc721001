//! Brokerage order placement.

use serde::{Deserialize, Serialize};

use crate::domain::error::TradepilotError;
use crate::domain::position::Side;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub success: bool,
    pub order_id: Option<String>,
    pub filled_quantity: i64,
    pub fill_price: Option<f64>,
    pub message: Option<String>,
}

pub trait OrderPort: Send + Sync {
    fn place_order(&self, symbol: &str, side: Side, size: i64) -> Result<OrderResult, TradepilotError>;
}
