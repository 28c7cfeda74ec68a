//! Append-only storage of committed ledger entries.

pub mod in_memory;
pub mod journal;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use journal::JournalLedgerStore;
pub use r#trait::{DateRange, LedgerFilter, LedgerStore};
