use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{LedgerError, LedgerResult, ProductId};

/// One product line of a ledger entry.
///
/// The subtotal is always derived from the line, never stored beside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub product_id: ProductId,
    /// Units moved; always positive.
    pub quantity: i64,
    /// Cost per unit: the buying price for inbound lines, the average cost
    /// read at commit time for deductions.
    pub unit_cost: Decimal,
}

impl StockLine {
    pub fn new(product_id: ProductId, quantity: i64, unit_cost: Decimal) -> Self {
        Self {
            product_id,
            quantity,
            unit_cost,
        }
    }

    /// `quantity * unit_cost`; fails rather than overflow the decimal range.
    pub fn subtotal(&self) -> LedgerResult<Decimal> {
        Decimal::from(self.quantity)
            .checked_mul(self.unit_cost)
            .ok_or_else(|| LedgerError::validation("line subtotal overflow"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn subtotal_is_quantity_times_cost() {
        let line = StockLine::new(ProductId::new(), 3, dec!(2.50));
        assert_eq!(line.subtotal().unwrap(), dec!(7.50));
    }

    #[test]
    fn subtotal_overflow_is_a_validation_error() {
        let line = StockLine::new(ProductId::new(), 1_000_000_000_000, Decimal::from(100_000_000_000_000_000u64));
        assert!(matches!(line.subtotal(), Err(LedgerError::Validation(_))));
    }
}
