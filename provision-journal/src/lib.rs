pub mod file;
pub mod journal_traits;
pub mod memory;

// Re-export the main types for convenience
pub use file::FileJournal;
pub use journal_traits::{JournalEntry, OperationJournal};
pub use memory::InMemoryJournal;
