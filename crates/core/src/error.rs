//! Ledger error model.

use thiserror::Error;

use crate::id::{EntryId, ProductId, WarehouseId};

/// Result type used across the ledger.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Which kind of external record a reference pointed at.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Warehouse,
    Product,
}

impl core::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ReferenceKind::Warehouse => f.write_str("warehouse"),
            ReferenceKind::Product => f.write_str("product"),
        }
    }
}

/// Ledger-level error.
///
/// Every variant except `Storage` is a precondition failure: it is reported
/// synchronously with no partial effect and is never retried internally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed or empty input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A warehouse or product id does not exist.
    #[error("unknown {kind}: {id}")]
    UnknownReference { kind: ReferenceKind, id: String },

    /// A deduction would drive a position negative.
    #[error(
        "insufficient stock for product {product_id} in warehouse {warehouse_id}: \
         requested {requested}, available {available} (short by {shortfall})"
    )]
    InsufficientStock {
        warehouse_id: WarehouseId,
        product_id: ProductId,
        requested: i64,
        available: i64,
        shortfall: i64,
    },

    /// The entry has already been reversed.
    #[error("entry {0} is already reversed")]
    AlreadyReversed(EntryId),

    /// The entry does not exist.
    #[error("entry {0} not found")]
    NotFound(EntryId),

    /// Denied by the authorization gate.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Infrastructure fault (poisoned lock, journal IO, serialization).
    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unknown_warehouse(id: impl core::fmt::Display) -> Self {
        Self::UnknownReference {
            kind: ReferenceKind::Warehouse,
            id: id.to_string(),
        }
    }

    pub fn unknown_product(id: impl core::fmt::Display) -> Self {
        Self::UnknownReference {
            kind: ReferenceKind::Product,
            id: id.to_string(),
        }
    }

    pub fn insufficient_stock(
        warehouse_id: WarehouseId,
        product_id: ProductId,
        requested: i64,
        available: i64,
    ) -> Self {
        Self::InsufficientStock {
            warehouse_id,
            product_id,
            requested,
            available,
            shortfall: requested - available,
        }
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "validation_error",
            LedgerError::UnknownReference { .. } => "unknown_reference",
            LedgerError::InsufficientStock { .. } => "insufficient_stock",
            LedgerError::AlreadyReversed(_) => "already_reversed",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::Forbidden(_) => "forbidden",
            LedgerError::Storage(_) => "storage_error",
        }
    }
}
