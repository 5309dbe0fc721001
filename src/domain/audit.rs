//! Append-only audit records for every automated decision.

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::risk::RiskRejection;
use super::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Executed,
    Skipped,
    Simulated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Automated,
    Manual,
}

/// Machine-readable reason attached to each decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReasonCode {
    Filled,
    HoldSignal,
    PositionLimit,
    ShortingDisabled,
    InsufficientCapital,
    NotEntitled,
    SessionHalted,
    ExecutionError,
    /// An order that had timed out was filled by the broker afterwards.
    LateFill,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReasonCode::Filled => "filled",
            ReasonCode::HoldSignal => "hold-signal",
            ReasonCode::PositionLimit => "position-limit",
            ReasonCode::ShortingDisabled => "shorting-disabled",
            ReasonCode::InsufficientCapital => "insufficient-capital",
            ReasonCode::NotEntitled => "not-entitled",
            ReasonCode::SessionHalted => "session-halted",
            ReasonCode::ExecutionError => "execution-error",
            ReasonCode::LateFill => "late-fill",
        };
        f.write_str(s)
    }
}

impl From<RiskRejection> for ReasonCode {
    fn from(rejection: RiskRejection) -> Self {
        match rejection {
            RiskRejection::PositionLimit => ReasonCode::PositionLimit,
            RiskRejection::ShortingDisabled => ReasonCode::ShortingDisabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub run_id: String,
    /// Position of this entry within its run, starting at 0.
    pub sequence: u64,
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub signal: Signal,
    pub decision: Decision,
    pub reason: ReasonCode,
    pub actor: Actor,
    /// Filled quantity; zero when nothing traded.
    pub quantity: i64,
    pub price: Option<f64>,
    pub order_id: Option<String>,
    /// Live session that made the decision; `None` for simulated runs.
    #[serde(default)]
    pub session_id: Option<String>,
    pub detail: Option<String>,
}

impl AuditEntry {
    pub fn ordering_key(&self) -> (NaiveDateTime, &str, u64) {
        (self.timestamp, self.run_id.as_str(), self.sequence)
    }
}

static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// `<prefix>-<UTC timestamp>-<n>`; never repeats within a process.
pub fn unique_run_id(prefix: &str) -> String {
    let n = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{n}", Utc::now().format("%Y%m%dT%H%M%S%.6f"))
}

/// Sort entries by (timestamp, run id, sequence).
pub fn sort_entries(entries: &mut [AuditEntry]) {
    entries.sort_by(|a, b| a.ordering_key().cmp(&b.ordering_key()));
}
