//! External prediction source.

use chrono::NaiveDateTime;

use crate::domain::bar::PriceBar;
use crate::domain::error::TradepilotError;
use crate::domain::prediction::{PredictionScore, ScoreRange};

/// A model that scores the latest bar of a history.
///
/// `history` always ends at `timestamp`; implementations never see later bars.
pub trait PredictionPort: Send + Sync {
    fn name(&self) -> &str;

    /// Declared bounds for `PredictionScore::value`.
    fn range(&self) -> ScoreRange {
        ScoreRange::SIGNED
    }

    fn predict(
        &self,
        history: &[PriceBar],
        timestamp: NaiveDateTime,
    ) -> Result<PredictionScore, TradepilotError>;
}
