//! Submission shapes for new entries and their structural validation.
//!
//! Referential checks (does the warehouse exist?) and availability checks
//! need storage and live in the processors; everything here is pure.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{LedgerError, LedgerResult, ProductId, WarehouseId};

/// Structural limits applied to every submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryLimits {
    pub max_lines_per_entry: usize,
    pub max_notes_len: usize,
}

impl Default for EntryLimits {
    fn default() -> Self {
        Self {
            max_lines_per_entry: 500,
            max_notes_len: 2000,
        }
    }
}

impl EntryLimits {
    fn check_line_count(&self, count: usize) -> LedgerResult<()> {
        if count == 0 {
            return Err(LedgerError::validation("entry must have at least one line"));
        }
        if count > self.max_lines_per_entry {
            return Err(LedgerError::validation(format!(
                "entry has {count} lines, limit is {}",
                self.max_lines_per_entry
            )));
        }
        Ok(())
    }
}

fn check_quantity(idx: usize, quantity: i64) -> LedgerResult<()> {
    if quantity <= 0 {
        return Err(LedgerError::validation(format!(
            "line {idx}: quantity must be positive"
        )));
    }
    Ok(())
}

/// Inbound line: new stock at a caller-supplied buying price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub buying_price: Decimal,
}

/// Receipt of stock into a warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundRequest {
    pub warehouse_id: WarehouseId,
    pub timestamp: DateTime<Utc>,
    pub lines: Vec<InboundLine>,
}

impl InboundRequest {
    pub fn validate(&self, limits: &EntryLimits) -> LedgerResult<()> {
        limits.check_line_count(self.lines.len())?;
        for (idx, line) in self.lines.iter().enumerate() {
            check_quantity(idx, line.quantity)?;
            if line.buying_price < Decimal::ZERO {
                return Err(LedgerError::validation(format!(
                    "line {idx}: buying price cannot be negative"
                )));
            }
        }
        Ok(())
    }
}

/// Deduction line: the cost is resolved by the ledger, never supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

fn validate_deductions(lines: &[DeductionLine], limits: &EntryLimits) -> LedgerResult<()> {
    limits.check_line_count(lines.len())?;
    for (idx, line) in lines.iter().enumerate() {
        check_quantity(idx, line.quantity)?;
    }
    Ok(())
}

/// Shipment of stock out of a warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundRequest {
    pub warehouse_id: WarehouseId,
    pub timestamp: DateTime<Utc>,
    pub lines: Vec<DeductionLine>,
}

impl OutboundRequest {
    pub fn validate(&self, limits: &EntryLimits) -> LedgerResult<()> {
        validate_deductions(&self.lines, limits)
    }
}

/// Loss adjustment found during a stock count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationRequest {
    pub warehouse_id: WarehouseId,
    pub timestamp: DateTime<Utc>,
    pub lines: Vec<DeductionLine>,
    /// Free text, stored verbatim.
    pub notes: Option<String>,
}

impl ReconciliationRequest {
    pub fn validate(&self, limits: &EntryLimits) -> LedgerResult<()> {
        validate_deductions(&self.lines, limits)?;
        if let Some(notes) = &self.notes {
            let len = notes.chars().count();
            if len > limits.max_notes_len {
                return Err(LedgerError::validation(format!(
                    "notes are {len} characters, limit is {}",
                    limits.max_notes_len
                )));
            }
        }
        Ok(())
    }
}
