use crate::journal_traits::{JournalEntry, OperationJournal};
use provision_core::error::ProvisionError;
use provision_core::transaction::Receipt;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// In-memory journal, useful for tests and for callers that only need an
/// ordered operation history without durability.
///
/// Clones share the same entries, so a test can keep a handle while the
/// ledger owns another.
#[derive(Clone, Default)]
pub struct InMemoryJournal {
    entries: Arc<Mutex<Vec<JournalEntry>>>,
    /// When set, every append fails (used to exercise abort paths)
    reject_appends: Arc<Mutex<bool>>,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent appends fail or succeed
    pub fn set_reject_appends(&self, reject: bool) {
        if let Ok(mut guard) = self.reject_appends.lock() {
            *guard = reject;
        }
    }

    /// Number of recorded entries
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all recorded receipts
    pub fn receipts(&self) -> Vec<Receipt> {
        self.entries
            .lock()
            .map(|entries| entries.iter().map(|entry| entry.receipt.clone()).collect())
            .unwrap_or_default()
    }
}

impl OperationJournal for InMemoryJournal {
    fn init(&self, _path: &Path) -> Result<(), ProvisionError> {
        Ok(())
    }

    fn append(&self, receipt: &Receipt) -> Result<(), ProvisionError> {
        let rejecting = *self
            .reject_appends
            .lock()
            .map_err(|e| ProvisionError::Journal(format!("Failed to acquire lock: {}", e)))?;
        if rejecting {
            return Err(ProvisionError::Journal("journal is not accepting entries".to_string()));
        }

        let mut entries = self
            .entries
            .lock()
            .map_err(|e| ProvisionError::Journal(format!("Failed to acquire lock: {}", e)))?;
        entries.push(JournalEntry {
            receipt: receipt.clone(),
            recorded_at: provision_core::current_timestamp(),
        });
        Ok(())
    }

    fn iterate_entries(&self) -> Box<dyn Iterator<Item = Result<JournalEntry, ProvisionError>> + '_> {
        let snapshot = match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(_) => Vec::new(),
        };
        Box::new(snapshot.into_iter().map(Ok))
    }
}
