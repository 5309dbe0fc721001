//! Append-only audit storage.

use crate::domain::audit::AuditEntry;
use crate::domain::error::TradepilotError;

/// Storage for audit entries. Implementations never update or delete.
pub trait AuditPort: Send + Sync {
    /// Persist one entry atomically.
    fn append(&self, entry: &AuditEntry) -> Result<(), TradepilotError>;

    /// Whether the sink can currently accept writes.
    fn ready(&self) -> Result<(), TradepilotError> {
        Ok(())
    }

    /// Entries for one run ordered by (timestamp, run id, sequence).
    fn entries_for_run(&self, run_id: &str) -> Result<Vec<AuditEntry>, TradepilotError>;

    /// All entries ordered by (timestamp, run id, sequence).
    fn entries(&self) -> Result<Vec<AuditEntry>, TradepilotError>;
}
