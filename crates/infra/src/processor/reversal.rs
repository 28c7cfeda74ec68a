use std::sync::Arc;

use chrono::Utc;

use stockledger_core::{EntryId, LedgerError, LedgerResult};
use stockledger_inventory::LedgerEntry;

use crate::ledger_store::LedgerStore;
use crate::stock_index::StockIndex;

/// Undoes a committed entry by appending its inverse.
///
/// The original entry is never edited beyond its reversal flag. Reversing an
/// inbound removes the stock it added, which fails with `InsufficientStock`
/// once that stock has been shipped.
pub struct ReversalProcessor<S> {
    stock: Arc<StockIndex>,
    store: S,
}

impl<S: LedgerStore> ReversalProcessor<S> {
    pub fn new(stock: Arc<StockIndex>, store: S) -> Self {
        Self { stock, store }
    }

    #[tracing::instrument(skip(self))]
    pub fn reverse(&self, entry_id: EntryId) -> LedgerResult<LedgerEntry> {
        let result = self.reverse_inner(entry_id);
        match &result {
            Ok(reversal) => tracing::info!(
                reversal_id = %reversal.id(),
                kind = %reversal.kind(),
                warehouse_id = %reversal.warehouse_id(),
                "ledger entry reversed"
            ),
            Err(err) => tracing::warn!(error_kind = err.kind(), error = %err, "reversal rejected"),
        }
        result
    }

    fn reverse_inner(&self, entry_id: EntryId) -> LedgerResult<LedgerEntry> {
        let original = self.store.get(entry_id)?;
        check_reversible(&original)?;

        self.stock.write_scope(&original.keys(), |staged| {
            // Another reverser may have won while we waited for the keys.
            let original = self.store.get(entry_id)?;
            check_reversible(&original)?;

            let reversal = LedgerEntry::reversal(&original, EntryId::new(), Utc::now())?;
            for effect in reversal.effects() {
                staged.apply(&effect)?;
            }

            let id = self.store.record_reversal(entry_id, reversal)?;
            self.store.get(id)
        })
    }
}

fn check_reversible(entry: &LedgerEntry) -> LedgerResult<()> {
    if entry.is_reversal() {
        return Err(LedgerError::validation("reversal entries cannot be reversed"));
    }
    if entry.is_reversed() {
        return Err(LedgerError::AlreadyReversed(entry.id()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use stockledger_core::{ProductId, WarehouseId};
    use stockledger_inventory::{
        DeductionLine, EntryKind, EntryLimits, InboundLine, InboundRequest, OutboundRequest,
        StockPosition,
    };

    use crate::catalog::InMemoryCatalog;
    use crate::ledger_store::InMemoryLedgerStore;
    use crate::processor::TransactionProcessor;

    struct Fixture {
        stock: Arc<StockIndex>,
        store: Arc<InMemoryLedgerStore>,
        writer: TransactionProcessor<Arc<InMemoryLedgerStore>, Arc<InMemoryCatalog>>,
        reverser: ReversalProcessor<Arc<InMemoryLedgerStore>>,
        warehouse: WarehouseId,
        product: ProductId,
    }

    fn fixture() -> Fixture {
        let stock = Arc::new(StockIndex::new());
        let store = Arc::new(InMemoryLedgerStore::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        let warehouse = WarehouseId::new();
        let product = ProductId::new();
        catalog.register_warehouse(warehouse).unwrap();
        catalog.register_product(product).unwrap();

        Fixture {
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
            product,
        }
    }

    fn receive(f: &Fixture, quantity: i64, price: Decimal) -> LedgerEntry {
        f.writer
            .create_inbound(&InboundRequest {
                warehouse_id: f.warehouse,
                timestamp: Utc::now(),
                lines: vec![InboundLine {
                    product_id: f.product,
                    quantity,
                    buying_price: price,
                }],
            })
            .unwrap()
    }

    fn ship(f: &Fixture, quantity: i64) -> LedgerEntry {
        f.writer
            .create_outbound(&OutboundRequest {
                warehouse_id: f.warehouse,
                timestamp: Utc::now(),
                lines: vec![DeductionLine {
                    product_id: f.product,
                    quantity,
                }],
            })
            .unwrap()
    }

    fn position(f: &Fixture) -> StockPosition {
        f.stock.get(f.warehouse, f.product).unwrap()
    }

    #[test]
    fn reversal_mirrors_original_and_links_both_ways() {
        let f = fixture();
        let inbound = receive(&f, 10, dec!(100));

        let reversal = f.reverser.reverse(inbound.id()).unwrap();
        assert_eq!(reversal.kind(), EntryKind::Inbound);
        assert_eq!(reversal.lines(), inbound.lines());
        assert_eq!(reversal.reversal_of(), Some(inbound.id()));
        assert_eq!(reversal.sequence(), 2);

        let original = f.store.get(inbound.id()).unwrap();
        assert!(original.is_reversed());
        assert_eq!(original.reversed_by(), Some(reversal.id()));
        assert_eq!(position(&f).quantity, 0);
    }

    #[test]
    fn second_reversal_is_refused_without_changes() {
        let f = fixture();
        let inbound = receive(&f, 10, dec!(100));
        f.reverser.reverse(inbound.id()).unwrap();
        let before = f.stock.snapshot().unwrap();

        assert_eq!(
            f.reverser.reverse(inbound.id()).unwrap_err(),
            LedgerError::AlreadyReversed(inbound.id())
        );
        assert_eq!(f.stock.snapshot().unwrap(), before);
        assert_eq!(f.store.len(), 2);
    }

    #[test]
    fn reversing_a_reversal_is_a_validation_error() {
        let f = fixture();
        let inbound = receive(&f, 1, dec!(1));
        let reversal = f.reverser.reverse(inbound.id()).unwrap();

        assert!(matches!(
            f.reverser.reverse(reversal.id()),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn unknown_entry_is_not_found() {
        let f = fixture();
        let id = EntryId::new();
        assert_eq!(f.reverser.reverse(id).unwrap_err(), LedgerError::NotFound(id));
    }

    #[test]
    fn inbound_cannot_be_reversed_once_shipped() {
        let f = fixture();
        let inbound = receive(&f, 10, dec!(5));
        ship(&f, 8);

        let err = f.reverser.reverse(inbound.id()).unwrap_err();
        assert_eq!(
            err,
            LedgerError::insufficient_stock(f.warehouse, f.product, 10, 2)
        );
        assert!(!f.store.get(inbound.id()).unwrap().is_reversed());
        assert_eq!(position(&f).quantity, 2);
    }

    #[test]
    fn reversing_outbound_restores_stock() {
        let f = fixture();
        receive(&f, 10, dec!(5));
        let outbound = ship(&f, 2);

        f.reverser.reverse(outbound.id()).unwrap();
        assert_eq!(position(&f), StockPosition::new(10, dec!(5)));
    }

    #[test]
    fn reversing_outbound_then_inbound_empties_the_key() {
        let f = fixture();
        let inbound = receive(&f, 10, dec!(5));
        let outbound = ship(&f, 2);

        f.reverser.reverse(outbound.id()).unwrap();
        f.reverser.reverse(inbound.id()).unwrap();
        assert_eq!(position(&f).quantity, 0);
    }

    #[test]
    fn concurrent_reversals_admit_exactly_one() {
        let f = fixture();
        let inbound = receive(&f, 10, dec!(5));

        let outcomes: Vec<LedgerResult<LedgerEntry>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| f.reverser.reverse(inbound.id())))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            outcomes
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| *e == LedgerError::AlreadyReversed(inbound.id()))
        );
        assert_eq!(f.store.len(), 2);
        assert_eq!(position(&f).quantity, 0);
    }
}
