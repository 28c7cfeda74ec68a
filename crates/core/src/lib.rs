//! `stockledger-core`: ids and the error taxonomy shared by every ledger crate.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;

pub use error::{LedgerError, LedgerResult, ReferenceKind};
pub use id::{EntryId, ProductId, WarehouseId};
