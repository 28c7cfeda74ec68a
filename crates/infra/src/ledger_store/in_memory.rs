use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use stockledger_core::{EntryId, LedgerError, LedgerResult};
use stockledger_inventory::LedgerEntry;

use super::r#trait::{LedgerFilter, LedgerStore};

#[derive(Debug, Default)]
struct Entries {
    /// Commit order; `sequence` is index + 1.
    log: Vec<LedgerEntry>,
    index: HashMap<EntryId, usize>,
}

impl Entries {
    fn position(&self, id: EntryId) -> LedgerResult<usize> {
        self.index.get(&id).copied().ok_or(LedgerError::NotFound(id))
    }

    fn check_insert(&self, entry: &LedgerEntry) -> LedgerResult<()> {
        if self.index.contains_key(&entry.id()) {
            return Err(LedgerError::storage(format!(
                "duplicate entry id {}",
                entry.id()
            )));
        }
        Ok(())
    }

    fn insert(&mut self, entry: LedgerEntry) -> LedgerResult<EntryId> {
        self.check_insert(&entry)?;
        let id = entry.id();
        let sequence = self.log.len() as u64 + 1;
        self.index.insert(id, self.log.len());
        self.log.push(entry.with_sequence(sequence));
        Ok(id)
    }

    fn mark_reversed(&mut self, id: EntryId, reversing_entry: EntryId) -> LedgerResult<()> {
        let pos = self.position(id)?;
        self.log[pos].mark_reversed(reversing_entry)
    }

    fn check_reversal(&self, original: EntryId, reversal: &LedgerEntry) -> LedgerResult<()> {
        let target = &self.log[self.position(original)?];
        if target.is_reversed() {
            return Err(LedgerError::AlreadyReversed(original));
        }
        if reversal.reversal_of() != Some(original) {
            return Err(LedgerError::storage(format!(
                "entry {} does not reverse {original}",
                reversal.id()
            )));
        }
        self.check_insert(reversal)
    }

    fn record_reversal(&mut self, original: EntryId, reversal: LedgerEntry) -> LedgerResult<EntryId> {
        self.check_reversal(original, &reversal)?;
        self.mark_reversed(original, reversal.id())?;
        self.insert(reversal)
    }
}

/// In-memory append-only entry store.
///
/// Intended for tests/dev; also the read side of [`super::JournalLedgerStore`].
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    inner: RwLock<Entries>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed entries. Entries are only ever appended, so the
    /// count stays meaningful even if a writer panicked.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .log
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate an insert without performing it.
    pub(crate) fn check_insert(&self, entry: &LedgerEntry) -> LedgerResult<()> {
        self.read()?.check_insert(entry)
    }

    /// Validate a reversal without performing it.
    pub(crate) fn check_reversal(&self, original: EntryId, reversal: &LedgerEntry) -> LedgerResult<()> {
        self.read()?.check_reversal(original, reversal)
    }

    /// Validate a reversal mark without performing it.
    pub(crate) fn check_mark(&self, id: EntryId) -> LedgerResult<()> {
        let entries = self.read()?;
        let entry = &entries.log[entries.position(id)?];
        if entry.is_reversed() {
            return Err(LedgerError::AlreadyReversed(id));
        }
        if entry.is_reversal() {
            return Err(LedgerError::validation("reversal entries cannot be reversed"));
        }
        Ok(())
    }

    fn read(&self) -> LedgerResult<std::sync::RwLockReadGuard<'_, Entries>> {
        self.inner
            .read()
            .map_err(|_| LedgerError::storage("ledger store lock poisoned"))
    }

    fn write(&self) -> LedgerResult<std::sync::RwLockWriteGuard<'_, Entries>> {
        self.inner
            .write()
            .map_err(|_| LedgerError::storage("ledger store lock poisoned"))
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn insert(&self, entry: LedgerEntry) -> LedgerResult<EntryId> {
        self.write()?.insert(entry)
    }

    fn get(&self, id: EntryId) -> LedgerResult<LedgerEntry> {
        let entries = self.read()?;
        let pos = entries.position(id)?;
        Ok(entries.log[pos].clone())
    }

    fn mark_reversed(&self, id: EntryId, reversing_entry: EntryId) -> LedgerResult<()> {
        self.write()?.mark_reversed(id, reversing_entry)
    }

    fn record_reversal(&self, original: EntryId, reversal: LedgerEntry) -> LedgerResult<EntryId> {
        self.write()?.record_reversal(original, reversal)
    }

    fn list(&self, filter: &LedgerFilter) -> LedgerResult<Vec<LedgerEntry>> {
        let entries = self.read()?;
        let mut matching: Vec<LedgerEntry> = entries
            .log
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        matching.sort_by_key(|e| (e.timestamp(), e.sequence()));
        Ok(matching)
    }

    fn scan(&self) -> LedgerResult<Vec<LedgerEntry>> {
        Ok(self.read()?.log.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use stockledger_core::{ProductId, WarehouseId};
    use stockledger_inventory::{EntryKind, StockLine};

    use crate::ledger_store::DateRange;

    fn entry(kind: EntryKind, warehouse_id: WarehouseId, at: chrono::DateTime<Utc>) -> LedgerEntry {
        LedgerEntry::new(
            EntryId::new(),
            kind,
            warehouse_id,
            at,
            vec![StockLine::new(ProductId::new(), 1, dec!(1))],
            None,
        )
        .unwrap()
    }

    #[test]
    fn insert_assigns_increasing_sequence() {
        let store = InMemoryLedgerStore::new();
        let w = WarehouseId::new();
        let a = store.insert(entry(EntryKind::Inbound, w, Utc::now())).unwrap();
        let b = store.insert(entry(EntryKind::Inbound, w, Utc::now())).unwrap();

        assert_eq!(store.get(a).unwrap().sequence(), 1);
        assert_eq!(store.get(b).unwrap().sequence(), 2);
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = InMemoryLedgerStore::new();
        let id = EntryId::new();
        assert_eq!(store.get(id).unwrap_err(), LedgerError::NotFound(id));
    }

    #[test]
    fn second_mark_reversed_is_refused() {
        let store = InMemoryLedgerStore::new();
        let id = store
            .insert(entry(EntryKind::Inbound, WarehouseId::new(), Utc::now()))
            .unwrap();

        store.mark_reversed(id, EntryId::new()).unwrap();
        assert_eq!(
            store.mark_reversed(id, EntryId::new()).unwrap_err(),
            LedgerError::AlreadyReversed(id)
        );
    }

    #[test]
    fn duplicate_ids_are_refused() {
        let store = InMemoryLedgerStore::new();
        let e = entry(EntryKind::Inbound, WarehouseId::new(), Utc::now());
        store.insert(e.clone()).unwrap();
        assert!(matches!(store.insert(e), Err(LedgerError::Storage(_))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn len_reports_entries_behind_a_poisoned_lock() {
        let store = InMemoryLedgerStore::new();
        store
            .insert(entry(EntryKind::Inbound, WarehouseId::new(), Utc::now()))
            .unwrap();

        std::thread::scope(|s| {
            let writer = s.spawn(|| {
                let _guard = store.inner.write().unwrap();
                panic!("writer died holding the lock");
            });
            assert!(writer.join().is_err());
        });

        assert!(store.inner.is_poisoned());
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
        assert!(matches!(store.scan(), Err(LedgerError::Storage(_))));
    }

    #[test]
    fn record_reversal_is_all_or_nothing() {
        let store = InMemoryLedgerStore::new();
        let original = entry(EntryKind::Inbound, WarehouseId::new(), Utc::now());
        let id = store.insert(original.clone()).unwrap();

        let reversal = LedgerEntry::reversal(&original, EntryId::new(), Utc::now()).unwrap();
        store.record_reversal(id, reversal.clone()).unwrap();

        let again = LedgerEntry::reversal(&original, EntryId::new(), Utc::now()).unwrap();
        assert_eq!(
            store.record_reversal(id, again).unwrap_err(),
            LedgerError::AlreadyReversed(id)
        );
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(id).unwrap().reversed_by(), Some(reversal.id()));
    }

    #[test]
    fn list_filters_and_orders_by_timestamp() {
        let store = InMemoryLedgerStore::new();
        let w = WarehouseId::new();
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let late = store.insert(entry(EntryKind::Inbound, w, base + Duration::days(2))).unwrap();
        let early = store.insert(entry(EntryKind::Inbound, w, base)).unwrap();
        store.insert(entry(EntryKind::Outbound, w, base)).unwrap();
        store
            .insert(entry(EntryKind::Inbound, WarehouseId::new(), base))
            .unwrap();

        let filter = LedgerFilter {
            warehouse_id: Some(w),
            kind: Some(EntryKind::Inbound),
            date_range: None,
        };
        let ids: Vec<EntryId> = store.list(&filter).unwrap().iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![early, late]);

        let bounded = LedgerFilter {
            date_range: Some(DateRange {
                from: Some(base + Duration::days(1)),
                to: Some(base + Duration::days(2)),
            }),
            ..filter
        };
        let ids: Vec<EntryId> = store.list(&bounded).unwrap().iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![late]);
    }
}
