//! CSV price series adapter.
//!
//! Two layouts are accepted, selected by header:
//! `timestamp,open,high,low,close,volume` and the single-price
//! `timestamp,price`. A `date` column is accepted in place of `timestamp`.

use crate::domain::bar::{parse_timestamp, PriceBar};
use crate::domain::error::TradepilotError;
use crate::ports::data_port::DataPort;
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol.to_uppercase()))
    }
}

enum Layout {
    Ohlcv {
        timestamp: usize,
        open: usize,
        high: usize,
        low: usize,
        close: usize,
        volume: Option<usize>,
    },
    SinglePrice {
        timestamp: usize,
        price: usize,
    },
}

fn detect_layout(headers: &csv::StringRecord) -> Result<Layout, TradepilotError> {
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };
    let timestamp = find("timestamp")
        .or_else(|| find("date"))
        .ok_or_else(|| TradepilotError::data("missing timestamp column"))?;

    if let (Some(open), Some(high), Some(low), Some(close)) =
        (find("open"), find("high"), find("low"), find("close"))
    {
        return Ok(Layout::Ohlcv {
            timestamp,
            open,
            high,
            low,
            close,
            volume: find("volume"),
        });
    }
    if let Some(price) = find("price").or_else(|| find("close")) {
        return Ok(Layout::SinglePrice { timestamp, price });
    }
    Err(TradepilotError::data(
        "expected open,high,low,close or price columns",
    ))
}

fn field<'r>(record: &'r csv::StringRecord, index: usize, name: &str, line: usize) -> Result<&'r str, TradepilotError> {
    record
        .get(index)
        .map(str::trim)
        .ok_or_else(|| TradepilotError::data(format!("line {line}: missing {name} column")))
}

fn number(record: &csv::StringRecord, index: usize, name: &str, line: usize) -> Result<f64, TradepilotError> {
    field(record, index, name, line)?
        .parse()
        .map_err(|e| TradepilotError::data(format!("line {line}: invalid {name} value: {e}")))
}

/// Parse CSV text into bars in file order.
///
/// Ordering and price sanity are left to `validate_series`.
pub fn parse_series(content: &str) -> Result<Vec<PriceBar>, TradepilotError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| TradepilotError::data(format!("CSV header error: {e}")))?
        .clone();
    let layout = detect_layout(&headers)?;

    let mut bars = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let line = i + 2;
        let record = result.map_err(|e| TradepilotError::data(format!("CSV parse error: {e}")))?;

        let ts_index = match layout {
            Layout::Ohlcv { timestamp, .. } | Layout::SinglePrice { timestamp, .. } => timestamp,
        };
        let raw_ts = field(&record, ts_index, "timestamp", line)?;
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
            TradepilotError::data(format!("line {line}: invalid timestamp {raw_ts:?}"))
        })?;

        let bar = match layout {
            Layout::Ohlcv {
                open,
                high,
                low,
                close,
                volume,
                ..
            } => PriceBar {
                timestamp,
                open: number(&record, open, "open", line)?,
                high: number(&record, high, "high", line)?,
                low: number(&record, low, "low", line)?,
                close: number(&record, close, "close", line)?,
                volume: match volume {
                    Some(v) => field(&record, v, "volume", line)?.parse().map_err(|e| {
                        TradepilotError::data(format!("line {line}: invalid volume value: {e}"))
                    })?,
                    None => 0,
                },
            },
            Layout::SinglePrice { price, .. } => {
                PriceBar::flat(timestamp, number(&record, price, "price", line)?)
            }
        };
        bars.push(bar);
    }
    Ok(bars)
}

/// Read and parse one CSV file.
pub fn read_series_file(path: &Path) -> Result<Vec<PriceBar>, TradepilotError> {
    let content = fs::read_to_string(path).map_err(|e| {
        TradepilotError::data(format!("failed to read {}: {}", path.display(), e))
    })?;
    parse_series(&content)
}

impl DataPort for CsvAdapter {
    fn fetch_series(&self, symbol: &str) -> Result<Vec<PriceBar>, TradepilotError> {
        read_series_file(&self.csv_path(symbol))
    }

    fn list_symbols(&self) -> Result<Vec<String>, TradepilotError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            TradepilotError::data(format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| TradepilotError::data(format!("directory entry error: {}", e)))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(symbol) = name.strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
