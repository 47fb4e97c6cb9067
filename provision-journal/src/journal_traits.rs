use provision_core::error::ProvisionError;
use provision_core::transaction::Receipt;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A journal entry for one processed operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// The receipt of the operation, including its effects
    pub receipt: Receipt,

    /// Timestamp of when this entry was recorded (milliseconds)
    pub recorded_at: i64,
}

/// Write-ahead journal for durably recording operations before they are committed
pub trait OperationJournal: Send + Sync {
    /// Initialize the journal
    ///
    /// # Parameters
    /// * `path` - The file path for the journal
    ///
    /// # Returns
    /// Ok(()) if successful, Err otherwise
    fn init(&self, path: &Path) -> Result<(), ProvisionError>;

    /// Record an operation receipt
    ///
    /// The ledger calls this before committing; an error aborts the operation.
    fn append(&self, receipt: &Receipt) -> Result<(), ProvisionError>;

    /// Iterate over all entries in the order they were appended
    fn iterate_entries(&self) -> Box<dyn Iterator<Item = Result<JournalEntry, ProvisionError>> + '_>;
}
