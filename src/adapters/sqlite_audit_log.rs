//! SQLite audit log. Rows are only ever inserted; triggers reject
//! UPDATE and DELETE.

use crate::domain::audit::{sort_entries, AuditEntry};
use crate::domain::error::TradepilotError;
use crate::ports::audit_port::AuditPort;
use crate::ports::config_port::ConfigPort;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

pub struct SqliteAuditLog {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> TradepilotError {
    TradepilotError::audit_write(e.to_string())
}

fn query_error(e: rusqlite::Error) -> TradepilotError {
    TradepilotError::audit_write(e.to_string())
}

impl SqliteAuditLog {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TradepilotError> {
        let db_path =
            config
                .get_string("audit", "path")
                .ok_or_else(|| TradepilotError::ConfigMissing {
                    section: "audit".into(),
                    key: "path".into(),
                })?;
        let pool_size = config.get_int("audit", "pool_size", 4).max(1) as u32;
        Self::open(&db_path, pool_size)
    }

    pub fn open(db_path: &str, pool_size: u32) -> Result<Self, TradepilotError> {
        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_error)?;
        let log = Self { pool };
        log.initialize_schema()?;
        Ok(log)
    }

    pub fn in_memory() -> Result<Self, TradepilotError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;
        let log = Self { pool };
        log.initialize_schema()?;
        Ok(log)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TradepilotError> {
        self.pool.get().map_err(pool_error)
    }

    fn initialize_schema(&self) -> Result<(), TradepilotError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS audit_log (
                    run_id TEXT NOT NULL,
                    sequence INTEGER NOT NULL,
                    timestamp TEXT NOT NULL,
                    symbol TEXT NOT NULL,
                    action TEXT NOT NULL,
                    decision TEXT NOT NULL,
                    reason TEXT NOT NULL,
                    quantity INTEGER NOT NULL,
                    price REAL,
                    payload TEXT NOT NULL,
                    PRIMARY KEY (run_id, sequence)
                );
                CREATE INDEX IF NOT EXISTS idx_audit_log_order ON audit_log(timestamp, run_id, sequence);
                CREATE TRIGGER IF NOT EXISTS audit_log_no_update BEFORE UPDATE ON audit_log
                BEGIN SELECT RAISE(ABORT, 'audit log is append-only'); END;
                CREATE TRIGGER IF NOT EXISTS audit_log_no_delete BEFORE DELETE ON audit_log
                BEGIN SELECT RAISE(ABORT, 'audit log is append-only'); END;",
            )
            .map_err(query_error)
    }

    fn query(&self, sql: &str, run_id: Option<&str>) -> Result<Vec<AuditEntry>, TradepilotError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(query_error)?;
        let payloads: Vec<String> = match run_id {
            Some(id) => stmt
                .query_map(params![id], |row| row.get(0))
                .map_err(query_error)?
                .collect::<Result<_, _>>()
                .map_err(query_error)?,
            None => stmt
                .query_map([], |row| row.get(0))
                .map_err(query_error)?
                .collect::<Result<_, _>>()
                .map_err(query_error)?,
        };

        let mut entries = payloads
            .iter()
            .map(|p| {
                serde_json::from_str::<AuditEntry>(p)
                    .map_err(|e| TradepilotError::data(format!("corrupt audit row: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        sort_entries(&mut entries);
        Ok(entries)
    }
}

impl AuditPort for SqliteAuditLog {
    fn append(&self, entry: &AuditEntry) -> Result<(), TradepilotError> {
        let payload = serde_json::to_string(entry)
            .map_err(|e| TradepilotError::audit_write(e.to_string()))?;
        self.conn()?
            .execute(
                "INSERT INTO audit_log (run_id, sequence, timestamp, symbol, action, decision, reason, quantity, price, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    entry.run_id,
                    entry.sequence as i64,
                    entry.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    entry.symbol,
                    entry.signal.action.to_string(),
                    format!("{:?}", entry.decision).to_lowercase(),
                    entry.reason.to_string(),
                    entry.quantity,
                    entry.price,
                    payload
                ],
            )
            .map_err(query_error)?;
        Ok(())
    }

    fn ready(&self) -> Result<(), TradepilotError> {
        self.conn()?
            .query_row("SELECT 1", [], |_| Ok(()))
            .map_err(query_error)
    }

    fn entries_for_run(&self, run_id: &str) -> Result<Vec<AuditEntry>, TradepilotError> {
        self.query(
            "SELECT payload FROM audit_log WHERE run_id = ?1 ORDER BY timestamp, run_id, sequence",
            Some(run_id),
        )
    }

    fn entries(&self) -> Result<Vec<AuditEntry>, TradepilotError> {
        self.query(
            "SELECT payload FROM audit_log ORDER BY timestamp, run_id, sequence",
            None,
        )
    }
}
