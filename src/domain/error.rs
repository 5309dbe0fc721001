//! Domain error types.

use chrono::NaiveDateTime;

/// Top-level error type for tradepilot.
#[derive(Debug, thiserror::Error)]
pub enum TradepilotError {
    #[error("invalid strategy config field {field}: {reason}")]
    Configuration { field: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("non-monotonic series at bar {index}: {current} does not follow {previous}")]
    NonMonotonic {
        index: usize,
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },

    #[error("prediction from {source_name} unavailable: {reason}")]
    Prediction { source_name: String, reason: String },

    #[error("execution error: {reason}")]
    Execution { reason: String },

    #[error("audit write failed: {reason}")]
    AuditWrite { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TradepilotError {
    pub fn configuration(field: &str, reason: impl Into<String>) -> Self {
        TradepilotError::Configuration {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn data(reason: impl Into<String>) -> Self {
        TradepilotError::Data {
            reason: reason.into(),
        }
    }

    pub fn audit_write(reason: impl Into<String>) -> Self {
        TradepilotError::AuditWrite {
            reason: reason.into(),
        }
    }

    /// True for errors the dashboard should surface before any run starts.
    pub fn is_pre_run(&self) -> bool {
        matches!(
            self,
            TradepilotError::Configuration { .. }
                | TradepilotError::ConfigParse { .. }
                | TradepilotError::ConfigMissing { .. }
                | TradepilotError::Data { .. }
                | TradepilotError::NonMonotonic { .. }
        )
    }
}

impl From<&TradepilotError> for std::process::ExitCode {
    fn from(err: &TradepilotError) -> Self {
        let code: u8 = match err {
            TradepilotError::Io(_) => 1,
            TradepilotError::Configuration { .. }
            | TradepilotError::ConfigParse { .. }
            | TradepilotError::ConfigMissing { .. } => 2,
            TradepilotError::Data { .. } | TradepilotError::NonMonotonic { .. } => 3,
            TradepilotError::Prediction { .. } => 4,
            TradepilotError::Execution { .. } => 5,
            TradepilotError::AuditWrite { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
