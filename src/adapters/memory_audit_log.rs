//! In-process audit log.

use std::sync::{Mutex, MutexGuard};

use crate::domain::audit::{sort_entries, AuditEntry};
use crate::domain::error::TradepilotError;
use crate::ports::audit_port::AuditPort;

#[derive(Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<AuditEntry>>, TradepilotError> {
        self.entries
            .lock()
            .map_err(|_| TradepilotError::audit_write("audit log lock poisoned"))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditPort for MemoryAuditLog {
    fn append(&self, entry: &AuditEntry) -> Result<(), TradepilotError> {
        self.lock()?.push(entry.clone());
        Ok(())
    }

    fn ready(&self) -> Result<(), TradepilotError> {
        self.lock().map(|_| ())
    }

    fn entries_for_run(&self, run_id: &str) -> Result<Vec<AuditEntry>, TradepilotError> {
        let mut out: Vec<AuditEntry> = self
            .lock()?
            .iter()
            .filter(|e| e.run_id == run_id)
            .cloned()
            .collect();
        sort_entries(&mut out);
        Ok(out)
    }

    fn entries(&self) -> Result<Vec<AuditEntry>, TradepilotError> {
        let mut out = self.lock()?.clone();
        sort_entries(&mut out);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::tests::entry;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn filters_by_run_and_orders() {
        let log = MemoryAuditLog::new();
        log.append(&entry("a", 1, 3)).unwrap();
        log.append(&entry("b", 0, 1)).unwrap();
        log.append(&entry("a", 0, 2)).unwrap();

        let run_a = log.entries_for_run("a").unwrap();
        assert_eq!(run_a.iter().map(|e| e.sequence).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(log.entries().unwrap()[0].run_id, "b");
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn concurrent_appends_are_all_kept() {
        let log = Arc::new(MemoryAuditLog::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for seq in 0..25 {
                        log.append(&entry(&format!("run-{t}"), seq, 1)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(log.len(), 100);
        assert_eq!(log.entries_for_run("run-2").unwrap().len(), 25);
    }
}
