//! Audit log stored as JSON lines, one entry per line, append-only.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::domain::audit::{sort_entries, AuditEntry};
use crate::domain::error::TradepilotError;
use crate::ports::audit_port::AuditPort;

pub struct JsonlAuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlAuditLog {
    /// Open `path` for appending, creating it if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TradepilotError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                TradepilotError::audit_write(format!("cannot open {}: {}", path.display(), e))
            })?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<AuditEntry>, TradepilotError> {
        let file = File::open(&self.path)?;
        let mut entries = Vec::new();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: AuditEntry = serde_json::from_str(&line).map_err(|e| {
                TradepilotError::data(format!(
                    "{} line {}: {}",
                    self.path.display(),
                    i + 1,
                    e
                ))
            })?;
            entries.push(entry);
        }
        sort_entries(&mut entries);
        Ok(entries)
    }
}

impl AuditPort for JsonlAuditLog {
    fn append(&self, entry: &AuditEntry) -> Result<(), TradepilotError> {
        let mut line = serde_json::to_string(entry)
            .map_err(|e| TradepilotError::audit_write(e.to_string()))?;
        line.push('\n');

        let mut file = self
            .file
            .lock()
            .map_err(|_| TradepilotError::audit_write("audit file lock poisoned"))?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| TradepilotError::audit_write(format!("{}: {}", self.path.display(), e)))
    }

    /// The held handle must flush, and the path must still open for
    /// appending. A file removed or made read-only since `open` fails here.
    fn ready(&self) -> Result<(), TradepilotError> {
        let unwritable =
            |e: std::io::Error| TradepilotError::audit_write(format!("{}: {}", self.path.display(), e));
        let mut file = self
            .file
            .lock()
            .map_err(|_| TradepilotError::audit_write("audit file lock poisoned"))?;
        file.flush().map_err(unwritable)?;
        OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map(|_| ())
            .map_err(unwritable)
    }

    fn entries_for_run(&self, run_id: &str) -> Result<Vec<AuditEntry>, TradepilotError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| e.run_id == run_id)
            .collect())
    }

    fn entries(&self) -> Result<Vec<AuditEntry>, TradepilotError> {
        self.read_all()
    }
}
