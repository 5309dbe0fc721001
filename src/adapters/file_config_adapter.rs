//! INI file configuration adapter.

use crate::domain::error::TradepilotError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TradepilotError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| TradepilotError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, TradepilotError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| TradepilotError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key).filter(|v| !v.trim().is_empty())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_deref()
            .and_then(Self::parse_bool)
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[strategy]
name = RSI Dip Buyer
symbol = bhp
sma_window = 20
rsi_oversold = 25.5
enabled_indicators = sma, rsi
allow_shorting = yes

[simulation]
initial_capital = 10000
tolerate_bad_bars = off

[audit]
path =
"#;

    #[test]
    fn reads_strategy_section() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(
            adapter.get_string("strategy", "name"),
            Some("RSI Dip Buyer".to_string())
        );
        assert_eq!(adapter.get_int("strategy", "sma_window", 0), 20);
        assert_eq!(adapter.get_double("strategy", "rsi_oversold", 0.0), 25.5);
        assert!(adapter.get_bool("strategy", "allow_shorting", false));
        assert_eq!(
            adapter.get_string("strategy", "enabled_indicators"),
            Some("sma, rsi".to_string())
        );
    }

    #[test]
    fn blank_values_read_as_missing() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(adapter.get_string("audit", "path"), None);
        assert_eq!(adapter.get_string("audit", "format"), None);
        assert_eq!(adapter.get_string("nope", "key"), None);
    }

    #[test]
    fn numeric_getters_fall_back_to_default() {
        let adapter =
            FileConfigAdapter::from_string("[simulation]\ninitial_capital = lots\n").unwrap();
        assert_eq!(adapter.get_double("simulation", "initial_capital", 99.9), 99.9);
        assert_eq!(adapter.get_int("simulation", "missing", 42), 42);
    }

    #[test]
    fn bool_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[simulation]\na = true\nb = no\nc = 1\nd = off\ne = maybe\n",
        )
        .unwrap();
        assert!(adapter.get_bool("simulation", "a", false));
        assert!(!adapter.get_bool("simulation", "b", true));
        assert!(adapter.get_bool("simulation", "c", false));
        assert!(!adapter.get_bool("simulation", "d", true));
        assert!(adapter.get_bool("simulation", "e", true));
    }

    #[test]
    fn from_file_reads_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[audit]\npath = /var/log/tradepilot.jsonl\nformat = jsonl\n").unwrap();
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("audit", "format"),
            Some("jsonl".to_string())
        );
    }

    #[test]
    fn missing_file_is_config_parse_error() {
        let err = FileConfigAdapter::from_file("/nonexistent/path/config.ini").unwrap_err();
        assert!(matches!(err, TradepilotError::ConfigParse { ref file, .. } if file.contains("config.ini")));
    }
}
