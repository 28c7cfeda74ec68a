//! Per-(warehouse, product) stock position arithmetic.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use stockledger_core::{LedgerError, LedgerResult, ProductId, WarehouseId};

/// Decimal places average cost is kept to after a recomputation.
pub const DEFAULT_COST_SCALE: u32 = 6;

/// Key of one stock position.
///
/// Ordering is (warehouse, product); lock sets are acquired in this order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
}

impl StockKey {
    pub fn new(warehouse_id: WarehouseId, product_id: ProductId) -> Self {
        Self {
            warehouse_id,
            product_id,
        }
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.warehouse_id, self.product_id)
    }
}

/// Current on-hand quantity and weighted-average cost of one key.
///
/// A key that was never touched is the zero position.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StockPosition {
    pub quantity: i64,
    pub average_cost: Decimal,
}

impl StockPosition {
    pub fn new(quantity: i64, average_cost: Decimal) -> Self {
        Self {
            quantity,
            average_cost,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.quantity == 0
    }

    /// On-hand value at the current average cost.
    pub fn value(&self) -> LedgerResult<Decimal> {
        Decimal::from(self.quantity)
            .checked_mul(self.average_cost)
            .ok_or_else(|| LedgerError::validation("stock value overflow"))
    }

    /// Apply a signed quantity change and return the resulting position.
    ///
    /// Increases recompute the quantity-weighted average cost using
    /// `cost_for_increase`, rounded to `cost_scale` places. Decreases leave the
    /// average cost untouched and fail with `InsufficientStock` if the
    /// quantity would go negative.
    pub fn apply_delta(
        &self,
        key: StockKey,
        quantity_delta: i64,
        cost_for_increase: Decimal,
        cost_scale: u32,
    ) -> LedgerResult<StockPosition> {
        match quantity_delta.cmp(&0) {
            core::cmp::Ordering::Equal => Ok(*self),
            core::cmp::Ordering::Greater => {
                if cost_for_increase < Decimal::ZERO {
                    return Err(LedgerError::validation("unit cost cannot be negative"));
                }
                let quantity = self
                    .quantity
                    .checked_add(quantity_delta)
                    .ok_or_else(|| LedgerError::validation("stock quantity overflow"))?;

                let old_value = Decimal::from(self.quantity)
                    .checked_mul(self.average_cost)
                    .ok_or_else(|| LedgerError::validation("stock value overflow"))?;
                let added_value = Decimal::from(quantity_delta)
                    .checked_mul(cost_for_increase)
                    .ok_or_else(|| LedgerError::validation("stock value overflow"))?;
                let total_value = old_value
                    .checked_add(added_value)
                    .ok_or_else(|| LedgerError::validation("stock value overflow"))?;

                let average_cost = total_value
                    .checked_div(Decimal::from(quantity))
                    .ok_or_else(|| LedgerError::validation("stock value overflow"))?
                    .round_dp_with_strategy(cost_scale, RoundingStrategy::MidpointNearestEven)
                    .normalize();

                Ok(StockPosition {
                    quantity,
                    average_cost,
                })
            }
            core::cmp::Ordering::Less => {
                let requested = quantity_delta.checked_neg().unwrap_or(i64::MAX);
                if requested > self.quantity {
                    return Err(LedgerError::insufficient_stock(
                        key.warehouse_id,
                        key.product_id,
                        requested,
                        self.quantity,
                    ));
                }
                Ok(StockPosition {
                    quantity: self.quantity - requested,
                    average_cost: self.average_cost,
                })
            }
        }
    }
}
