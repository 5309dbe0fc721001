//! Position-size and shorting limits shared by simulation and live execution.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::position::{Position, Side};
use super::strategy::StrategyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskRejection {
    /// Already at the configured maximum exposure in this direction.
    PositionLimit,
    /// A sell would open or extend a short position.
    ShortingDisabled,
}

impl fmt::Display for RiskRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskRejection::PositionLimit => f.write_str("position limit reached"),
            RiskRejection::ShortingDisabled => f.write_str("shorting disabled"),
        }
    }
}

/// Quantity allowed for an order of `config.order_size()` on `side`.
///
/// The order is clipped to the remaining headroom; with no headroom at all it
/// is rejected. The resulting position always satisfies
/// `|quantity| <= max_position_size` and, unless shorting is allowed,
/// `quantity >= 0`.
pub fn check_order(
    position: &Position,
    side: Side,
    config: &StrategyConfig,
) -> Result<i64, RiskRejection> {
    let max = config.max_position_size();
    let current = position.quantity;

    let headroom = match side {
        Side::Buy => max - current,
        Side::Sell if config.allow_shorting() => max + current,
        Side::Sell => {
            if current <= 0 {
                return Err(RiskRejection::ShortingDisabled);
            }
            current
        }
    };

    if headroom <= 0 {
        return Err(RiskRejection::PositionLimit);
    }
    Ok(config.order_size().min(headroom))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max: i64, order: i64, shorting: bool) -> StrategyConfig {
        StrategyConfig::builder()
            .max_position_size(max)
            .order_size(order)
            .allow_shorting(shorting)
            .build()
            .unwrap()
    }

    fn position(quantity: i64) -> Position {
        let mut p = Position::flat("TEST");
        p.quantity = quantity;
        p
    }

    #[test]
    fn buy_within_limit() {
        assert_eq!(check_order(&position(0), Side::Buy, &config(10, 3, false)), Ok(3));
    }

    #[test]
    fn buy_clipped_to_headroom() {
        assert_eq!(check_order(&position(8), Side::Buy, &config(10, 3, false)), Ok(2));
    }

    #[test]
    fn buy_at_limit_rejected() {
        assert_eq!(
            check_order(&position(10), Side::Buy, &config(10, 3, false)),
            Err(RiskRejection::PositionLimit)
        );
    }

    #[test]
    fn sell_without_shorting_only_reduces() {
        assert_eq!(check_order(&position(2), Side::Sell, &config(10, 3, false)), Ok(2));
        assert_eq!(
            check_order(&position(0), Side::Sell, &config(10, 3, false)),
            Err(RiskRejection::ShortingDisabled)
        );
    }

    #[test]
    fn sell_with_shorting_respects_limit() {
        assert_eq!(check_order(&position(0), Side::Sell, &config(5, 3, true)), Ok(3));
        assert_eq!(check_order(&position(-4), Side::Sell, &config(5, 3, true)), Ok(1));
        assert_eq!(
            check_order(&position(-5), Side::Sell, &config(5, 3, true)),
            Err(RiskRejection::PositionLimit)
        );
    }

    #[test]
    fn buy_covers_short() {
        assert_eq!(check_order(&position(-5), Side::Buy, &config(5, 3, true)), Ok(3));
    }
}
