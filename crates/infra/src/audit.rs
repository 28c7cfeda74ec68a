//! Rebuild and cross-check stock positions from the ledger.
//!
//! The ledger is the source of truth: replaying every entry in commit order
//! must reproduce the live [`StockIndex`] exactly, quantities and average
//! costs alike. `verify` is meant for a quiescent ledger; writes racing with it
//! can show up as transient mismatches.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use stockledger_core::{LedgerError, LedgerResult};
use stockledger_inventory::{LedgerEntry, StockKey, StockPosition};

use crate::ledger_store::LedgerStore;
use crate::stock_index::StockIndex;

/// Re-apply `entries` in sequence order and return the resulting positions.
///
/// Positions that end at the zero position are omitted, matching
/// [`StockIndex::snapshot`].
pub fn replay<'a, I>(entries: I, cost_scale: u32) -> LedgerResult<BTreeMap<StockKey, StockPosition>>
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let mut ordered: Vec<&LedgerEntry> = entries.into_iter().collect();
    ordered.sort_by_key(|e| e.sequence());

    let mut positions: BTreeMap<StockKey, StockPosition> = BTreeMap::new();
    for entry in ordered {
        for effect in entry.effects() {
            let slot = positions.entry(effect.key).or_default();
            *slot = slot
                .apply_delta(effect.key, effect.quantity_delta, effect.unit_cost, cost_scale)
                .map_err(|e| {
                    LedgerError::storage(format!(
                        "replay of entry {} (sequence {}) failed: {e}",
                        entry.id(),
                        entry.sequence()
                    ))
                })?;
        }
    }

    positions.retain(|_, position| *position != StockPosition::default());
    Ok(positions)
}

/// One disagreement found by [`verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mismatch {
    /// The replayed position differs from the live one.
    Position {
        key: StockKey,
        replayed: StockPosition,
        live: StockPosition,
    },
    /// The live quantity differs from the signed sum over effective entries.
    Quantity {
        key: StockKey,
        ledger_quantity: i64,
        live_quantity: i64,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub entries_checked: usize,
    pub positions_checked: usize,
    pub mismatches: Vec<Mismatch>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Compare the live index with a full replay of `store`, and check every
/// quantity against the signed sum of the entries that still count.
pub fn verify<S: LedgerStore + ?Sized>(stock: &StockIndex, store: &S) -> LedgerResult<AuditReport> {
    let entries = store.scan()?;
    let live = stock.snapshot()?;
    let replayed = replay(&entries, stock.cost_scale())?;

    let mut ledger_quantities: BTreeMap<StockKey, i64> = BTreeMap::new();
    for entry in entries.iter().filter(|e| e.is_effective()) {
        for key in entry.keys() {
            *ledger_quantities.entry(key).or_default() += entry.signed_quantity(key.product_id);
        }
    }

    let keys: BTreeSet<StockKey> = live
        .keys()
        .chain(replayed.keys())
        .chain(ledger_quantities.keys())
        .copied()
        .collect();

    let mut mismatches = Vec::new();
    for key in &keys {
        let live_position = live.get(key).copied().unwrap_or_default();
        let replayed_position = replayed.get(key).copied().unwrap_or_default();
        if live_position != replayed_position {
            mismatches.push(Mismatch::Position {
                key: *key,
                replayed: replayed_position,
                live: live_position,
            });
        }

        let ledger_quantity = ledger_quantities.get(key).copied().unwrap_or_default();
        if ledger_quantity != live_position.quantity {
            mismatches.push(Mismatch::Quantity {
                key: *key,
                ledger_quantity,
                live_quantity: live_position.quantity,
            });
        }
    }

    if !mismatches.is_empty() {
        tracing::warn!(mismatches = mismatches.len(), "ledger audit found mismatches");
    }

    Ok(AuditReport {
        entries_checked: entries.len(),
        positions_checked: keys.len(),
        mismatches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use stockledger_core::{EntryId, ProductId, WarehouseId};
    use stockledger_inventory::{
        DeductionLine, EntryLimits, InboundLine, InboundRequest, OutboundRequest,
        ReconciliationRequest,
    };

    use crate::catalog::InMemoryCatalog;
    use crate::ledger_store::InMemoryLedgerStore;
    use crate::processor::{ReversalProcessor, TransactionProcessor};

    struct Ledger {
        stock: Arc<StockIndex>,
        store: Arc<InMemoryLedgerStore>,
        writer: TransactionProcessor<Arc<InMemoryLedgerStore>, Arc<InMemoryCatalog>>,
        reverser: ReversalProcessor<Arc<InMemoryLedgerStore>>,
        warehouse: WarehouseId,
        products: Vec<ProductId>,
    }

    fn ledger(product_count: usize) -> Ledger {
        let stock = Arc::new(StockIndex::new());
        let store = Arc::new(InMemoryLedgerStore::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        let warehouse = WarehouseId::new();
        catalog.register_warehouse(warehouse).unwrap();
        let products: Vec<ProductId> = (0..product_count).map(|_| ProductId::new()).collect();
        for p in &products {
            catalog.register_product(*p).unwrap();
        }

        Ledger {
            writer: TransactionProcessor::new(
                stock.clone(),
                store.clone(),
                catalog,
                EntryLimits::default(),
            ),
            reverser: ReversalProcessor::new(stock.clone(), store.clone()),
            stock,
            store,
            warehouse,
            products,
        }
    }

    impl Ledger {
        fn inbound(&self, product: usize, quantity: i64, price: Decimal) -> LedgerResult<EntryId> {
            self.writer
                .create_inbound(&InboundRequest {
                    warehouse_id: self.warehouse,
                    timestamp: Utc::now(),
                    lines: vec![InboundLine {
                        product_id: self.products[product],
                        quantity,
                        buying_price: price,
                    }],
                })
                .map(|e| e.id())
        }

        fn outbound(&self, product: usize, quantity: i64) -> LedgerResult<EntryId> {
            self.writer
                .create_outbound(&OutboundRequest {
                    warehouse_id: self.warehouse,
                    timestamp: Utc::now(),
                    lines: vec![DeductionLine {
                        product_id: self.products[product],
                        quantity,
                    }],
                })
                .map(|e| e.id())
        }

        fn lose(&self, product: usize, quantity: i64) -> LedgerResult<EntryId> {
            self.writer
                .create_reconciliation(&ReconciliationRequest {
                    warehouse_id: self.warehouse,
                    timestamp: Utc::now(),
                    lines: vec![DeductionLine {
                        product_id: self.products[product],
                        quantity,
                    }],
                    notes: None,
                })
                .map(|e| e.id())
        }
    }

    #[test]
    fn replay_reproduces_average_costs() {
        let l = ledger(1);
        l.inbound(0, 3, dec!(1)).unwrap();
        l.inbound(0, 7, dec!(2.333)).unwrap();
        let out = l.outbound(0, 4).unwrap();
        l.reverser.reverse(out).unwrap();

        let entries = l.store.scan().unwrap();
        assert_eq!(replay(&entries, l.stock.cost_scale()).unwrap(), l.stock.snapshot().unwrap());
        assert!(verify(&l.stock, &l.store).unwrap().is_consistent());
    }

    #[test]
    fn verify_reports_drift() {
        let l = ledger(1);
        l.inbound(0, 5, dec!(10)).unwrap();
        let key = StockKey::new(l.warehouse, l.products[0]);
        l.stock
            .restore([(key, StockPosition::new(6, dec!(10)))])
            .unwrap();

        let report = verify(&l.stock, &l.store).unwrap();
        assert_eq!(report.entries_checked, 1);
        assert_eq!(
            report.mismatches,
            vec![
                Mismatch::Position {
                    key,
                    replayed: StockPosition::new(5, dec!(10)),
                    live: StockPosition::new(6, dec!(10)),
                },
                Mismatch::Quantity {
                    key,
                    ledger_quantity: 5,
                    live_quantity: 6,
                },
            ]
        );
    }

    #[derive(Debug, Clone)]
    enum Op {
        Inbound { product: usize, quantity: i64, cents: i64 },
        Outbound { product: usize, quantity: i64 },
        Lose { product: usize, quantity: i64 },
        Reverse { pick: usize },
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..3usize, 1..50i64, 0..100_000i64)
                .prop_map(|(product, quantity, cents)| Op::Inbound { product, quantity, cents }),
            (0..3usize, 1..40i64).prop_map(|(product, quantity)| Op::Outbound { product, quantity }),
            (0..3usize, 1..10i64).prop_map(|(product, quantity)| Op::Lose { product, quantity }),
            any::<usize>().prop_map(|pick| Op::Reverse { pick }),
        ]
    }

    proptest! {
        #[test]
        fn ledger_and_index_never_disagree(ops in prop::collection::vec(op(), 1..60)) {
            let l = ledger(3);
            let mut committed: Vec<EntryId> = Vec::new();

            for op in ops {
                let outcome = match op {
                    Op::Inbound { product, quantity, cents } => {
                        l.inbound(product, quantity, Decimal::new(cents, 2))
                    }
                    Op::Outbound { product, quantity } => {
                        let outcome = l.outbound(product, quantity);
                        if let Err(err) = &outcome {
                            prop_assert!(matches!(err, LedgerError::InsufficientStock { .. }), "{err:?}");
                        }
                        outcome
                    }
                    Op::Lose { product, quantity } => {
                        let outcome = l.lose(product, quantity);
                        if let Err(err) = &outcome {
                            prop_assert!(matches!(err, LedgerError::InsufficientStock { .. }), "{err:?}");
                        }
                        outcome
                    }
                    Op::Reverse { pick } if !committed.is_empty() => {
                        let target = committed[pick % committed.len()];
                        l.reverser.reverse(target).map(|e| e.id())
                    }
                    Op::Reverse { .. } => continue,
                };
                if let Ok(id) = outcome {
                    committed.push(id);
                }
            }

            let report = verify(&l.stock, &l.store).unwrap();
            prop_assert!(report.is_consistent(), "{:?}", report.mismatches);
            for position in l.stock.snapshot().unwrap().values() {
                prop_assert!(position.quantity >= 0);
            }
        }
    }
}
