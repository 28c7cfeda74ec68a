//! Read side over the stock index.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{LedgerError, LedgerResult, ProductId, WarehouseId};
use stockledger_inventory::StockPosition;

use crate::catalog::{ReferenceCatalog, require_warehouse};
use crate::stock_index::StockIndex;

/// One product currently on hand in a warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableStock {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Current weighted-average cost.
    pub unit_cost: Decimal,
}

/// Inventory value of one warehouse at average cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseValuation {
    pub warehouse_id: WarehouseId,
    pub product_count: usize,
    pub total_quantity: i64,
    pub total_value: Decimal,
}

/// Point-in-time availability queries.
///
/// Every answer is taken from one consistent snapshot, so a concurrent
/// multi-line transaction is seen either completely or not at all.
pub struct AvailabilityQuery<C> {
    stock: Arc<StockIndex>,
    catalog: C,
}

impl<C: ReferenceCatalog> AvailabilityQuery<C> {
    pub fn new(stock: Arc<StockIndex>, catalog: C) -> Self {
        Self { stock, catalog }
    }

    /// Products with a non-zero quantity, ordered by product id.
    pub fn list_available(&self, warehouse_id: WarehouseId) -> LedgerResult<Vec<AvailableStock>> {
        require_warehouse(&self.catalog, warehouse_id)?;
        Ok(self
            .stock
            .warehouse_snapshot(warehouse_id)?
            .into_iter()
            .filter(|(_, position)| position.quantity > 0)
            .map(|(key, position)| AvailableStock {
                product_id: key.product_id,
                quantity: position.quantity,
                unit_cost: position.average_cost,
            })
            .collect())
    }

    pub fn position(&self, warehouse_id: WarehouseId, product_id: ProductId) -> LedgerResult<StockPosition> {
        require_warehouse(&self.catalog, warehouse_id)?;
        self.stock.get(warehouse_id, product_id)
    }

    /// Sum of `quantity * average cost` over the products on hand.
    ///
    /// A total beyond the `Decimal` or `i64` range is a validation error.
    pub fn valuation(&self, warehouse_id: WarehouseId) -> LedgerResult<WarehouseValuation> {
        let available = self.list_available(warehouse_id)?;
        let mut valuation = WarehouseValuation {
            warehouse_id,
            product_count: available.len(),
            total_quantity: 0,
            total_value: Decimal::ZERO,
        };
        for stock in &available {
            let value = StockPosition::new(stock.quantity, stock.unit_cost).value()?;
            valuation.total_value = valuation
                .total_value
                .checked_add(value)
                .ok_or_else(|| LedgerError::validation("warehouse value overflow"))?;
            valuation.total_quantity = valuation
                .total_quantity
                .checked_add(stock.quantity)
                .ok_or_else(|| LedgerError::validation("warehouse quantity overflow"))?;
        }
        Ok(valuation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use stockledger_inventory::StockKey;

    use crate::catalog::InMemoryCatalog;

    fn setup() -> (Arc<StockIndex>, AvailabilityQuery<Arc<InMemoryCatalog>>, WarehouseId) {
        let stock = Arc::new(StockIndex::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        let warehouse = WarehouseId::new();
        catalog.register_warehouse(warehouse).unwrap();
        let query = AvailabilityQuery::new(stock.clone(), catalog);
        (stock, query, warehouse)
    }

    #[test]
    fn unknown_warehouse_is_rejected() {
        let (_, query, _) = setup();
        let other = WarehouseId::new();
        assert_eq!(
            query.list_available(other).unwrap_err(),
            LedgerError::unknown_warehouse(other)
        );
    }

    #[test]
    fn lists_only_products_on_hand() {
        let (stock, query, warehouse) = setup();
        let kept = StockKey::new(warehouse, ProductId::new());
        let emptied = StockKey::new(warehouse, ProductId::new());
        let elsewhere = StockKey::new(WarehouseId::new(), ProductId::new());

        stock
            .write_scope(&[kept, emptied, elsewhere], |staged| {
                staged.apply_delta(kept, 4, dec!(2.5))?;
                staged.apply_delta(emptied, 3, dec!(1))?;
                staged.apply_delta(emptied, -3, Decimal::ZERO)?;
                staged.apply_delta(elsewhere, 9, dec!(1))?;
                Ok(())
            })
            .unwrap();

        assert_eq!(
            query.list_available(warehouse).unwrap(),
            vec![AvailableStock {
                product_id: kept.product_id,
                quantity: 4,
                unit_cost: dec!(2.5),
            }]
        );
        assert_eq!(query.position(warehouse, emptied.product_id).unwrap().quantity, 0);
    }

    #[test]
    fn empty_warehouse_lists_nothing() {
        let (_, query, warehouse) = setup();
        assert!(query.list_available(warehouse).unwrap().is_empty());

        let valuation = query.valuation(warehouse).unwrap();
        assert_eq!(valuation.product_count, 0);
        assert_eq!(valuation.total_value, Decimal::ZERO);
    }

    #[test]
    fn valuation_sums_quantity_times_average_cost() {
        let (stock, query, warehouse) = setup();
        let a = StockKey::new(warehouse, ProductId::new());
        let b = StockKey::new(warehouse, ProductId::new());
        stock
            .write_scope(&[a, b], |staged| {
                staged.apply_delta(a, 10, dec!(1.5))?;
                staged.apply_delta(b, 2, dec!(100))?;
                Ok(())
            })
            .unwrap();

        let valuation = query.valuation(warehouse).unwrap();
        assert_eq!(valuation.product_count, 2);
        assert_eq!(valuation.total_quantity, 12);
        assert_eq!(valuation.total_value, dec!(215));
    }

    #[test]
    fn valuation_overflow_is_an_error_not_a_panic() {
        let (stock, query, warehouse) = setup();
        let huge = Decimal::from_i128_with_scale(50_000_000_000_000_000_000_000_000_000, 0);
        let a = StockKey::new(warehouse, ProductId::new());
        let b = StockKey::new(warehouse, ProductId::new());
        stock
            .write_scope(&[a, b], |staged| {
                staged.apply_delta(a, 1, huge)?;
                staged.apply_delta(b, 1, huge)?;
                Ok(())
            })
            .unwrap();

        assert_eq!(
            query.valuation(warehouse).unwrap_err(),
            LedgerError::validation("warehouse value overflow")
        );
        assert_eq!(query.list_available(warehouse).unwrap().len(), 2);
    }
}
