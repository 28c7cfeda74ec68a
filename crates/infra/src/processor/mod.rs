//! Writers of the stock ledger.
//!
//! These are the only components that mutate the [`crate::StockIndex`]. Each
//! operation runs its read-validate-apply sequence inside one write scope over
//! the entry's key set and inserts the entry before the scope is released, so
//! commit order in the store matches application order per key.

pub mod reversal;
pub mod transaction;

pub use reversal::ReversalProcessor;
pub use transaction::TransactionProcessor;
