use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{EntryId, LedgerError, LedgerResult, ProductId, WarehouseId};

use crate::line::StockLine;
use crate::position::StockKey;

/// Kind of stock movement an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Inbound,
    Outbound,
    Reconciliation,
}

impl EntryKind {
    /// +1 for kinds that add stock, -1 for kinds that deduct it.
    pub fn direction(self) -> i64 {
        match self {
            EntryKind::Inbound => 1,
            EntryKind::Outbound | EntryKind::Reconciliation => -1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Inbound => "inbound",
            EntryKind::Outbound => "outbound",
            EntryKind::Reconciliation => "reconciliation",
        }
    }
}

impl core::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for EntryKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbound" => Ok(EntryKind::Inbound),
            "outbound" => Ok(EntryKind::Outbound),
            "reconciliation" => Ok(EntryKind::Reconciliation),
            other => Err(LedgerError::validation(format!("unknown entry kind '{other}'"))),
        }
    }
}

/// The change one line of an entry makes to a stock position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockEffect {
    pub key: StockKey,
    pub quantity_delta: i64,
    /// Cost the added units carry; ignored for decreases.
    pub unit_cost: Decimal,
}

/// One committed inbound, outbound or reconciliation transaction.
///
/// Once committed an entry is immutable except for the single
/// `reversed: false -> true` transition performed by [`LedgerEntry::mark_reversed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    id: EntryId,
    /// Commit order, assigned by the store. Zero until inserted.
    sequence: u64,
    kind: EntryKind,
    warehouse_id: WarehouseId,
    /// Caller-supplied business time (may be backdated).
    timestamp: DateTime<Utc>,
    lines: Vec<StockLine>,
    total: Decimal,
    notes: Option<String>,
    reversed: bool,
    /// Set on an original entry: the entry that reversed it.
    reversed_by: Option<EntryId>,
    /// Set on a reversal entry: the entry it reverses.
    reversal_of: Option<EntryId>,
}

impl LedgerEntry {
    /// Build a new, uncommitted entry.
    ///
    /// Fails if `lines` is empty, any quantity is not positive, any unit cost is
    /// negative, notes are attached to a non-reconciliation entry, or the total
    /// does not fit in a `Decimal`.
    pub fn new(
        id: EntryId,
        kind: EntryKind,
        warehouse_id: WarehouseId,
        timestamp: DateTime<Utc>,
        lines: Vec<StockLine>,
        notes: Option<String>,
    ) -> LedgerResult<Self> {
        if lines.is_empty() {
            return Err(LedgerError::validation("entry must have at least one line"));
        }
        for (idx, line) in lines.iter().enumerate() {
            if line.quantity <= 0 {
                return Err(LedgerError::validation(format!(
                    "line {idx}: quantity must be positive"
                )));
            }
            if line.unit_cost < Decimal::ZERO {
                return Err(LedgerError::validation(format!(
                    "line {idx}: unit cost cannot be negative"
                )));
            }
        }
        if notes.is_some() && kind != EntryKind::Reconciliation {
            return Err(LedgerError::validation(
                "notes are only accepted on reconciliation entries",
            ));
        }

        let total = lines.iter().try_fold(Decimal::ZERO, |total, line| {
            total
                .checked_add(line.subtotal()?)
                .ok_or_else(|| LedgerError::validation("entry total overflow"))
        })?;

        Ok(Self {
            id,
            sequence: 0,
            kind,
            warehouse_id,
            timestamp,
            lines,
            total,
            notes,
            reversed: false,
            reversed_by: None,
            reversal_of: None,
        })
    }

    /// Build the entry that reverses `original`.
    ///
    /// The reversal mirrors the original's kind and lines (same quantities, same
    /// recorded unit costs) and links back through `reversal_of`.
    pub fn reversal(
        original: &LedgerEntry,
        id: EntryId,
        timestamp: DateTime<Utc>,
    ) -> LedgerResult<Self> {
        if original.is_reversal() {
            return Err(LedgerError::validation("reversal entries cannot be reversed"));
        }
        if original.reversed {
            return Err(LedgerError::AlreadyReversed(original.id));
        }

        let mut entry = Self::new(
            id,
            original.kind,
            original.warehouse_id,
            timestamp,
            original.lines.clone(),
            original.notes.clone(),
        )?;
        entry.reversal_of = Some(original.id);
        Ok(entry)
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn lines(&self) -> &[StockLine] {
        &self.lines
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn reversed_by(&self) -> Option<EntryId> {
        self.reversed_by
    }

    pub fn reversal_of(&self) -> Option<EntryId> {
        self.reversal_of
    }

    pub fn is_reversal(&self) -> bool {
        self.reversal_of.is_some()
    }

    /// Whether this entry contributes to on-hand quantity: neither reversed nor
    /// itself a reversal.
    pub fn is_effective(&self) -> bool {
        !self.reversed && self.reversal_of.is_none()
    }

    /// Distinct stock keys this entry touches, sorted.
    pub fn keys(&self) -> Vec<StockKey> {
        let mut keys: Vec<StockKey> = self
            .lines
            .iter()
            .map(|l| StockKey::new(self.warehouse_id, l.product_id))
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Per-line position changes, in line order.
    ///
    /// A reversal entry's effects are the inverse of its kind: reversing an
    /// inbound removes stock, reversing a deduction adds it back at the
    /// originally recorded unit cost.
    pub fn effects(&self) -> impl Iterator<Item = StockEffect> + '_ {
        let sign = if self.is_reversal() {
            -self.kind.direction()
        } else {
            self.kind.direction()
        };
        self.lines.iter().map(move |line| StockEffect {
            key: StockKey::new(self.warehouse_id, line.product_id),
            quantity_delta: sign * line.quantity,
            unit_cost: line.unit_cost,
        })
    }

    /// Signed quantity this entry contributes to `product_id`, ignoring the
    /// reversal flags.
    pub fn signed_quantity(&self, product_id: ProductId) -> i64 {
        self.lines
            .iter()
            .filter(|l| l.product_id == product_id)
            .map(|l| self.kind.direction() * l.quantity)
            .sum()
    }

    /// Assign the store's commit sequence.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// The single permitted mutation of a committed entry.
    pub fn mark_reversed(&mut self, reversing_entry: EntryId) -> LedgerResult<()> {
        if self.reversed {
            return Err(LedgerError::AlreadyReversed(self.id));
        }
        if self.is_reversal() {
            return Err(LedgerError::validation("reversal entries cannot be reversed"));
        }
        self.reversed = true;
        self.reversed_by = Some(reversing_entry);
        Ok(())
    }
}
