//! Authoritative (warehouse, product) → position mapping.
//!
//! ## Locking
//!
//! Every key owns its own mutex. A writer acquires the mutexes of every
//! distinct key its entry touches, in `StockKey` order, stages all changes on
//! copies, and writes them back only if the whole unit of work succeeded.
//! Readers that need more than one key (warehouse snapshots) acquire their key
//! set in the same order, so they never observe half of a transaction and
//! never deadlock against a writer.
//!
//! The outer `RwLock` only guards the slot table itself and is never held while
//! a key mutex is being waited on.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use rust_decimal::Decimal;

use stockledger_core::{LedgerError, LedgerResult, ProductId, WarehouseId};
use stockledger_inventory::{DEFAULT_COST_SCALE, StockEffect, StockKey, StockPosition};

type Slot = Arc<Mutex<StockPosition>>;

fn poisoned<T>(_: T) -> LedgerError {
    LedgerError::storage("stock index lock poisoned")
}

/// In-memory stock index with per-key write scopes.
#[derive(Debug)]
pub struct StockIndex {
    slots: RwLock<HashMap<StockKey, Slot>>,
    cost_scale: u32,
}

impl Default for StockIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl StockIndex {
    pub fn new() -> Self {
        Self::with_cost_scale(DEFAULT_COST_SCALE)
    }

    pub fn with_cost_scale(cost_scale: u32) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            cost_scale,
        }
    }

    pub fn cost_scale(&self) -> u32 {
        self.cost_scale
    }

    /// Current position; the zero position if the key was never touched.
    pub fn get(&self, warehouse_id: WarehouseId, product_id: ProductId) -> LedgerResult<StockPosition> {
        let key = StockKey::new(warehouse_id, product_id);
        match self.existing_slot(&key)? {
            Some(slot) => {
                let position = *slot.lock().map_err(poisoned)?;
                Ok(position)
            }
            None => Ok(StockPosition::default()),
        }
    }

    fn existing_slot(&self, key: &StockKey) -> LedgerResult<Option<Slot>> {
        let slots = self.slots.read().map_err(poisoned)?;
        Ok(slots.get(key).cloned())
    }

    fn slot(&self, key: StockKey) -> LedgerResult<Slot> {
        if let Some(slot) = self.existing_slot(&key)? {
            return Ok(slot);
        }
        let mut slots = self.slots.write().map_err(poisoned)?;
        Ok(slots.entry(key).or_default().clone())
    }

    fn lock_all<'a>(slots: &'a [(StockKey, Slot)]) -> LedgerResult<Vec<(StockKey, MutexGuard<'a, StockPosition>)>> {
        let mut guards = Vec::with_capacity(slots.len());
        for (key, slot) in slots {
            guards.push((*key, slot.lock().map_err(poisoned)?));
        }
        Ok(guards)
    }

    /// Run `work` inside an exclusive write scope over `keys`.
    ///
    /// `work` sees and mutates staged copies of the positions. If it returns
    /// `Ok`, every staged position is written back before any key is released;
    /// if it returns `Err`, nothing is written.
    pub fn write_scope<T, F>(&self, keys: &[StockKey], work: F) -> LedgerResult<T>
    where
        F: FnOnce(&mut StagedPositions) -> LedgerResult<T>,
    {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let slots = keys
            .iter()
            .map(|key| self.slot(*key).map(|slot| (*key, slot)))
            .collect::<LedgerResult<Vec<_>>>()?;

        let mut guards = Self::lock_all(&slots)?;
        tracing::debug!(keys = guards.len(), "stock write scope acquired");

        let mut staged = StagedPositions {
            positions: guards.iter().map(|(key, guard)| (*key, **guard)).collect(),
            cost_scale: self.cost_scale,
        };

        let out = work(&mut staged)?;

        for (key, guard) in guards.iter_mut() {
            if let Some(position) = staged.positions.get(&*key) {
                **guard = *position;
            }
        }

        Ok(out)
    }

    /// Consistent snapshot of every position in one warehouse, sorted by product.
    pub fn warehouse_snapshot(&self, warehouse_id: WarehouseId) -> LedgerResult<Vec<(StockKey, StockPosition)>> {
        self.snapshot_where(|key| key.warehouse_id == warehouse_id)
    }

    /// Consistent snapshot of every touched position.
    ///
    /// Untouched (zero-valued) slots are omitted, so a failed transaction leaves
    /// the snapshot exactly as it was.
    pub fn snapshot(&self) -> LedgerResult<BTreeMap<StockKey, StockPosition>> {
        Ok(self.snapshot_where(|_| true)?.into_iter().collect())
    }

    fn snapshot_where(&self, include: impl Fn(&StockKey) -> bool) -> LedgerResult<Vec<(StockKey, StockPosition)>> {
        let mut slots: Vec<(StockKey, Slot)> = {
            let table = self.slots.read().map_err(poisoned)?;
            table
                .iter()
                .filter(|(key, _)| include(*key))
                .map(|(key, slot)| (*key, slot.clone()))
                .collect()
        };
        slots.sort_by_key(|(key, _)| *key);

        let guards = Self::lock_all(&slots)?;
        Ok(guards
            .iter()
            .filter(|(_, guard)| **guard != StockPosition::default())
            .map(|(key, guard)| (*key, **guard))
            .collect())
    }

    /// Seed positions, e.g. from a ledger replay on startup.
    pub fn restore(&self, positions: impl IntoIterator<Item = (StockKey, StockPosition)>) -> LedgerResult<()> {
        let positions: Vec<_> = positions.into_iter().collect();
        let keys: Vec<StockKey> = positions.iter().map(|(key, _)| *key).collect();
        self.write_scope(&keys, |staged| {
            for (key, position) in positions {
                staged.set(key, position)?;
            }
            Ok(())
        })
    }
}

/// Staged copies of the positions inside one write scope.
#[derive(Debug)]
pub struct StagedPositions {
    positions: BTreeMap<StockKey, StockPosition>,
    cost_scale: u32,
}

impl StagedPositions {
    fn in_scope(&mut self, key: StockKey) -> LedgerResult<&mut StockPosition> {
        self.positions
            .get_mut(&key)
            .ok_or_else(|| LedgerError::storage(format!("key {key} is outside the write scope")))
    }

    pub fn get(&self, key: StockKey) -> LedgerResult<StockPosition> {
        self.positions
            .get(&key)
            .copied()
            .ok_or_else(|| LedgerError::storage(format!("key {key} is outside the write scope")))
    }

    /// Stage a signed change; see [`StockPosition::apply_delta`].
    pub fn apply_delta(
        &mut self,
        key: StockKey,
        quantity_delta: i64,
        cost_for_increase: Decimal,
    ) -> LedgerResult<StockPosition> {
        let cost_scale = self.cost_scale;
        let position = self.in_scope(key)?;
        let next = position.apply_delta(key, quantity_delta, cost_for_increase, cost_scale)?;
        *position = next;
        Ok(next)
    }

    pub fn apply(&mut self, effect: &StockEffect) -> LedgerResult<StockPosition> {
        self.apply_delta(effect.key, effect.quantity_delta, effect.unit_cost)
    }

    fn set(&mut self, key: StockKey, position: StockPosition) -> LedgerResult<()> {
        *self.in_scope(key)? = position;
        Ok(())
    }
}
