//! Prediction scores replayed from a CSV file.
//!
//! Columns: `timestamp,value` with an optional `confidence`. Each score is
//! keyed by the bar timestamp it was produced for, so a backtest can replay
//! an externally computed model output without look-ahead.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::domain::bar::{parse_timestamp, PriceBar};
use crate::domain::error::TradepilotError;
use crate::domain::prediction::{PredictionScore, ScoreRange};
use crate::ports::prediction_port::PredictionPort;

pub struct CsvPredictionAdapter {
    name: String,
    range: ScoreRange,
    scores: BTreeMap<NaiveDateTime, (f64, Option<f64>)>,
}

impl CsvPredictionAdapter {
    pub fn from_file(path: &Path, range: ScoreRange) -> Result<Self, TradepilotError> {
        let content = fs::read_to_string(path).map_err(|e| {
            TradepilotError::data(format!("failed to read {}: {}", path.display(), e))
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "csv".to_string());
        Self::from_string(&name, &content, range)
    }

    pub fn from_string(name: &str, content: &str, range: ScoreRange) -> Result<Self, TradepilotError> {
        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| TradepilotError::data(format!("CSV header error: {e}")))?
            .clone();
        let find = |col: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(col));
        let ts_col = find("timestamp").ok_or_else(|| TradepilotError::data("missing timestamp column"))?;
        let value_col = find("value")
            .or_else(|| find("score"))
            .ok_or_else(|| TradepilotError::data("missing value column"))?;
        let confidence_col = find("confidence");

        let mut scores = BTreeMap::new();
        for (i, result) in rdr.records().enumerate() {
            let line = i + 2;
            let record = result.map_err(|e| TradepilotError::data(format!("CSV parse error: {e}")))?;
            let raw_ts = record.get(ts_col).unwrap_or("").trim();
            let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
                TradepilotError::data(format!("line {line}: invalid timestamp {raw_ts:?}"))
            })?;
            let value: f64 = record
                .get(value_col)
                .unwrap_or("")
                .trim()
                .parse()
                .map_err(|e| TradepilotError::data(format!("line {line}: invalid value: {e}")))?;
            let confidence = match confidence_col.and_then(|c| record.get(c)).map(str::trim) {
                None | Some("") => None,
                Some(raw) => Some(raw.parse::<f64>().map_err(|e| {
                    TradepilotError::data(format!("line {line}: invalid confidence: {e}"))
                })?),
            };
            scores.insert(timestamp, (value, confidence));
        }

        Ok(Self {
            name: name.to_string(),
            range,
            scores,
        })
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl PredictionPort for CsvPredictionAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn range(&self) -> ScoreRange {
        self.range
    }

    fn predict(
        &self,
        _history: &[PriceBar],
        timestamp: NaiveDateTime,
    ) -> Result<PredictionScore, TradepilotError> {
        let (value, confidence) =
            self.scores
                .get(&timestamp)
                .ok_or_else(|| TradepilotError::Prediction {
                    source_name: self.name.clone(),
                    reason: format!("no score for {timestamp}"),
                })?;
        let score = PredictionScore::new(*value, self.name.as_str());
        Ok(match confidence {
            Some(c) => score.with_confidence(*c),
            None => score,
        })
    }
}
