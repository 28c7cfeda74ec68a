use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{EntryId, LedgerError, LedgerResult, WarehouseId};
use stockledger_inventory::{EntryKind, LedgerEntry};

/// Inclusive range over an entry's caller-supplied timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }

    pub fn validate(&self) -> LedgerResult<()> {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from > to => Err(LedgerError::validation(format!(
                "date range starts after it ends ({from} > {to})"
            ))),
            _ => Ok(()),
        }
    }
}

/// Filter criteria for listing entries. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerFilter {
    pub warehouse_id: Option<WarehouseId>,
    pub kind: Option<EntryKind>,
    pub date_range: Option<DateRange>,
}

impl LedgerFilter {
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.warehouse_id.is_none_or(|w| entry.warehouse_id() == w)
            && self.kind.is_none_or(|k| entry.kind() == k)
            && self
                .date_range
                .is_none_or(|range| range.contains(entry.timestamp()))
    }
}

/// Durable append-only entry store.
///
/// The store holds no business validation. It does guard the one-time
/// reversal transition itself: a second `mark_reversed` of the same entry
/// fails with `AlreadyReversed`, whatever the caller.
pub trait LedgerStore: Send + Sync {
    /// Append a new entry; the store assigns its commit `sequence`.
    fn insert(&self, entry: LedgerEntry) -> LedgerResult<EntryId>;

    /// Load an entry; `NotFound` if absent.
    fn get(&self, id: EntryId) -> LedgerResult<LedgerEntry>;

    /// Flag `id` as reversed by `reversing_entry`.
    fn mark_reversed(&self, id: EntryId, reversing_entry: EntryId) -> LedgerResult<()>;

    /// Mark `original` reversed and append `reversal` as one atomic step.
    fn record_reversal(&self, original: EntryId, reversal: LedgerEntry) -> LedgerResult<EntryId>;

    /// Matching entries ordered by timestamp, then sequence.
    fn list(&self, filter: &LedgerFilter) -> LedgerResult<Vec<LedgerEntry>>;

    /// Every entry in commit (sequence) order.
    fn scan(&self) -> LedgerResult<Vec<LedgerEntry>>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn insert(&self, entry: LedgerEntry) -> LedgerResult<EntryId> {
        (**self).insert(entry)
    }

    fn get(&self, id: EntryId) -> LedgerResult<LedgerEntry> {
        (**self).get(id)
    }

    fn mark_reversed(&self, id: EntryId, reversing_entry: EntryId) -> LedgerResult<()> {
        (**self).mark_reversed(id, reversing_entry)
    }

    fn record_reversal(&self, original: EntryId, reversal: LedgerEntry) -> LedgerResult<EntryId> {
        (**self).record_reversal(original, reversal)
    }

    fn list(&self, filter: &LedgerFilter) -> LedgerResult<Vec<LedgerEntry>> {
        (**self).list(filter)
    }

    fn scan(&self) -> LedgerResult<Vec<LedgerEntry>> {
        (**self).scan()
    }
}
