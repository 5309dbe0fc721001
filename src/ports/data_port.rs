//! Price series access port.

use crate::domain::bar::PriceBar;
use crate::domain::error::TradepilotError;

pub trait DataPort {
    /// Bars for `symbol`, oldest first. Callers validate before use.
    fn fetch_series(&self, symbol: &str) -> Result<Vec<PriceBar>, TradepilotError>;

    fn list_symbols(&self) -> Result<Vec<String>, TradepilotError>;
}
