//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod csv_prediction_adapter;
pub mod file_config_adapter;
pub mod jsonl_audit_log;
pub mod memory_audit_log;
#[cfg(feature = "sqlite")]
pub mod sqlite_audit_log;
