use crate::journal_traits::{JournalEntry, OperationJournal};
use log::{debug, warn};
use provision_core::error::ProvisionError;
use provision_core::transaction::Receipt;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Size of the little-endian length prefix in front of every frame
const LENGTH_PREFIX: u64 = 8;

/// A file-based operation journal
///
/// Each entry is a little-endian `u64` length followed by the bincode
/// encoded [`JournalEntry`]. Entries are flushed one by one.
#[derive(Default)]
pub struct FileJournal {
    /// `None` until [`OperationJournal::init`] succeeds
    open: Mutex<Option<OpenJournal>>,
}

struct OpenJournal {
    path: PathBuf,
    writer: BufWriter<File>,
}

fn poisoned<T>(_: PoisonError<T>) -> ProvisionError {
    ProvisionError::Journal("journal lock poisoned".to_string())
}

impl FileJournal {
    /// Create a new, uninitialized file journal
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and initialize a journal at `path`
    pub fn open(path: &Path) -> Result<Self, ProvisionError> {
        let journal = Self::new();
        journal.init(path)?;
        Ok(journal)
    }

    /// The path this journal writes to, once initialized
    pub fn path(&self) -> Option<PathBuf> {
        self.open
            .lock()
            .ok()
            .and_then(|open| open.as_ref().map(|journal| journal.path.clone()))
    }
}

impl OperationJournal for FileJournal {
    fn init(&self, path: &Path) -> Result<(), ProvisionError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                ProvisionError::Journal(format!("cannot open journal {}: {}", path.display(), e))
            })?;

        *self.open.lock().map_err(poisoned)? = Some(OpenJournal {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        });

        debug!("Journal opened at {}", path.display());
        Ok(())
    }

    fn append(&self, receipt: &Receipt) -> Result<(), ProvisionError> {
        let mut guard = self.open.lock().map_err(poisoned)?;
        let journal = guard
            .as_mut()
            .ok_or_else(|| ProvisionError::Journal("journal has not been initialized".to_string()))?;

        let frame = bincode::serialize(&JournalEntry {
            receipt: receipt.clone(),
            recorded_at: provision_core::current_timestamp(),
        })?;
        journal.writer.write_all(&(frame.len() as u64).to_le_bytes())?;
        journal.writer.write_all(&frame)?;
        journal.writer.flush()?;

        debug!("Journaled operation #{} ({} bytes)", receipt.sequence, frame.len());
        Ok(())
    }

    fn iterate_entries(&self) -> Box<dyn Iterator<Item = Result<JournalEntry, ProvisionError>> + '_> {
        let Some(path) = self.path() else {
            return Box::new(std::iter::empty());
        };

        let opened = File::open(&path).and_then(|file| {
            let len = file.metadata()?.len();
            Ok((file, len))
        });
        match opened {
            Ok((file, len)) => Box::new(FrameReader {
                reader: BufReader::new(file),
                remaining: len,
            }),
            Err(e) => Box::new(std::iter::once(Err(ProvisionError::from(e)))),
        }
    }
}

/// Reads frames from a snapshot of the journal's length
///
/// A prefix that promises more bytes than the file still holds ends the
/// iteration with an error instead of allocating that much.
struct FrameReader {
    reader: BufReader<File>,
    remaining: u64,
}

impl FrameReader {
    fn read_frame(&mut self) -> Result<JournalEntry, ProvisionError> {
        if self.remaining < LENGTH_PREFIX {
            return Err(ProvisionError::Journal(format!(
                "torn length prefix ({} trailing bytes)",
                self.remaining
            )));
        }
        let mut prefix = [0u8; LENGTH_PREFIX as usize];
        self.reader.read_exact(&mut prefix)?;
        self.remaining -= LENGTH_PREFIX;

        let frame_len = u64::from_le_bytes(prefix);
        if frame_len > self.remaining {
            return Err(ProvisionError::Journal(format!(
                "frame of {} bytes exceeds the {} bytes left in the journal",
                frame_len, self.remaining
            )));
        }

        let mut frame = Vec::new();
        (&mut self.reader).take(frame_len).read_to_end(&mut frame)?;
        self.remaining -= frame_len;
        Ok(bincode::deserialize(&frame)?)
    }
}

impl Iterator for FrameReader {
    type Item = Result<JournalEntry, ProvisionError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let frame = self.read_frame();
        if let Err(err) = &frame {
            warn!("Stopping journal replay: {}", err);
            // Nothing after a damaged frame can be located reliably
            self.remaining = 0;
        }
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provision_core::transaction::{Event, Operation};
    use provision_core::{ObjectId, Value};
    use tempfile::tempdir;

    // Helper to create a committed receipt
    fn create_test_receipt(sequence: u64) -> Receipt {
        let caller = ObjectId::from_label("deployer");
        let template = ObjectId::new([1; 32]);
        let factory = ObjectId::new([2; 32]);
        let mut receipt = Receipt::committed(
            [sequence as u8; 32],
            sequence,
            caller,
            Operation::DeployFactory { template },
            1_700_000_000_000,
            Value::Id(factory),
        );
        receipt.events.push(Event::FactoryDeployed { factory, template });
        receipt
    }

    #[test]
    fn test_journal_appends_in_order() {
        let temp_dir = tempdir().unwrap();
        let journal_path = temp_dir.path().join("ops.journal");

        let journal = FileJournal::new();
        journal.init(&journal_path).unwrap();

        let first = create_test_receipt(1);
        let second = create_test_receipt(2);
        journal.append(&first).unwrap();
        journal.append(&second).unwrap();

        let entries: Vec<_> = journal
            .iterate_entries()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].receipt, first);
        assert_eq!(entries[1].receipt, second);
        assert!(entries[0].recorded_at > 0);
    }

    #[test]
    fn test_journal_survives_reopen() {
        let temp_dir = tempdir().unwrap();
        let journal_path = temp_dir.path().join("ops.journal");

        {
            let journal = FileJournal::open(&journal_path).unwrap();
            journal.append(&create_test_receipt(1)).unwrap();
        }

        let reopened = FileJournal::open(&journal_path).unwrap();
        reopened.append(&create_test_receipt(2)).unwrap();

        let sequences: Vec<u64> = reopened
            .iterate_entries()
            .map(|entry| entry.unwrap().receipt.sequence)
            .collect();
        assert_eq!(sequences, vec![1, 2]);
        assert_eq!(reopened.path(), Some(journal_path));
    }

    #[test]
    fn test_uninitialized_journal_rejects_appends() {
        let journal = FileJournal::new();
        let err = journal.append(&create_test_receipt(1)).unwrap_err();
        assert_eq!(err.code(), "Journal");
        assert_eq!(journal.iterate_entries().count(), 0);
    }

    #[test]
    fn test_truncated_entry_is_an_error() {
        let temp_dir = tempdir().unwrap();
        let journal_path = temp_dir.path().join("ops.journal");

        let journal = FileJournal::open(&journal_path).unwrap();
        journal.append(&create_test_receipt(1)).unwrap();

        // A length prefix promising more bytes than follow
        let mut raw = OpenOptions::new().append(true).open(&journal_path).unwrap();
        raw.write_all(&64u64.to_le_bytes()).unwrap();
        raw.write_all(&[1, 2, 3]).unwrap();

        let entries: Vec<_> = journal.iterate_entries().collect();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_ok());
        assert!(entries[1].is_err());
    }

    #[test]
    fn test_oversized_length_prefix_is_an_error() {
        let temp_dir = tempdir().unwrap();
        let journal_path = temp_dir.path().join("ops.journal");

        let journal = FileJournal::open(&journal_path).unwrap();
        journal.append(&create_test_receipt(1)).unwrap();

        let mut raw = OpenOptions::new().append(true).open(&journal_path).unwrap();
        raw.write_all(&u64::MAX.to_le_bytes()).unwrap();
        raw.write_all(&[1, 2, 3]).unwrap();

        let entries: Vec<_> = journal.iterate_entries().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].as_ref().unwrap().receipt.sequence, 1);
        assert_eq!(entries[1].as_ref().unwrap_err().code(), "Journal");
    }

    #[test]
    fn test_torn_length_prefix_is_an_error() {
        let temp_dir = tempdir().unwrap();
        let journal_path = temp_dir.path().join("ops.journal");

        let journal = FileJournal::open(&journal_path).unwrap();
        journal.append(&create_test_receipt(1)).unwrap();
        journal.append(&create_test_receipt(2)).unwrap();

        let mut raw = OpenOptions::new().append(true).open(&journal_path).unwrap();
        raw.write_all(&[9, 9, 9]).unwrap();

        let results: Vec<_> = journal.iterate_entries().collect();
        assert_eq!(results.len(), 3);
        assert!(results[..2].iter().all(Result::is_ok));
        assert_eq!(results[2].as_ref().unwrap_err().code(), "Journal");
    }
}
