//! Warehouse stock ledger domain.
//!
//! This crate contains the bookkeeping rules for stock (entry shape, line
//! arithmetic, weighted-average cost), implemented purely as deterministic
//! domain logic (no IO, no locking, no storage).

pub mod entry;
pub mod line;
pub mod position;
pub mod request;

pub use entry::{EntryKind, LedgerEntry, StockEffect};
pub use line::StockLine;
pub use position::{DEFAULT_COST_SCALE, StockKey, StockPosition};
pub use request::{
    DeductionLine, EntryLimits, InboundLine, InboundRequest, OutboundRequest,
    ReconciliationRequest,
};
