use std::path::Path;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use stockledger_core::{EntryId, LedgerError, LedgerResult};
use stockledger_inventory::LedgerEntry;

use super::in_memory::InMemoryLedgerStore;
use super::r#trait::{LedgerFilter, LedgerStore};
use crate::journal::JournalFile;

/// One durable state change of the entry store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum JournalRecord {
    EntryInserted {
        entry: LedgerEntry,
    },
    EntryReversed {
        id: EntryId,
        reversed_by: EntryId,
    },
    ReversalRecorded {
        original: EntryId,
        reversal: LedgerEntry,
    },
}

/// Durable entry store backed by a JSON-lines journal file.
///
/// Every change is validated against the in-memory view, appended and flushed
/// to the journal, and only then applied in memory, all under one mutex. Reads
/// go to the in-memory view.
#[derive(Debug)]
pub struct JournalLedgerStore {
    journal: Mutex<JournalFile>,
    memory: InMemoryLedgerStore,
}

impl JournalLedgerStore {
    /// Open (or create) the journal and rebuild the store from it.
    pub fn open(path: &Path, fsync: bool) -> LedgerResult<Self> {
        let (journal, records) = JournalFile::open::<JournalRecord>(path, fsync)?;
        let memory = InMemoryLedgerStore::new();

        for (idx, record) in records.into_iter().enumerate() {
            Self::apply(&memory, record).map_err(|e| {
                LedgerError::storage(format!(
                    "journal {} record {}: {e}",
                    path.display(),
                    idx + 1
                ))
            })?;
        }

        tracing::info!(path = %path.display(), entries = memory.len(), "ledger journal opened");

        Ok(Self {
            journal: Mutex::new(journal),
            memory,
        })
    }

    fn apply(memory: &InMemoryLedgerStore, record: JournalRecord) -> LedgerResult<()> {
        match record {
            JournalRecord::EntryInserted { entry } => memory.insert(entry).map(|_| ()),
            JournalRecord::EntryReversed { id, reversed_by } => memory.mark_reversed(id, reversed_by),
            JournalRecord::ReversalRecorded { original, reversal } => {
                memory.record_reversal(original, reversal).map(|_| ())
            }
        }
    }

    fn journal(&self) -> LedgerResult<std::sync::MutexGuard<'_, JournalFile>> {
        self.journal
            .lock()
            .map_err(|_| LedgerError::storage("journal lock poisoned"))
    }
}

impl LedgerStore for JournalLedgerStore {
    fn insert(&self, entry: LedgerEntry) -> LedgerResult<EntryId> {
        let mut journal = self.journal()?;
        self.memory.check_insert(&entry)?;
        journal.append(&JournalRecord::EntryInserted {
            entry: entry.clone(),
        })?;
        self.memory.insert(entry)
    }

    fn get(&self, id: EntryId) -> LedgerResult<LedgerEntry> {
        self.memory.get(id)
    }

    fn mark_reversed(&self, id: EntryId, reversing_entry: EntryId) -> LedgerResult<()> {
        let mut journal = self.journal()?;
        self.memory.check_mark(id)?;
        journal.append(&JournalRecord::EntryReversed {
            id,
            reversed_by: reversing_entry,
        })?;
        self.memory.mark_reversed(id, reversing_entry)
    }

    fn record_reversal(&self, original: EntryId, reversal: LedgerEntry) -> LedgerResult<EntryId> {
        let mut journal = self.journal()?;
        self.memory.check_reversal(original, &reversal)?;
        journal.append(&JournalRecord::ReversalRecorded {
            original,
            reversal: reversal.clone(),
        })?;
        self.memory.record_reversal(original, reversal)
    }

    fn list(&self, filter: &LedgerFilter) -> LedgerResult<Vec<LedgerEntry>> {
        self.memory.list(filter)
    }

    fn scan(&self) -> LedgerResult<Vec<LedgerEntry>> {
        self.memory.scan()
    }
}
