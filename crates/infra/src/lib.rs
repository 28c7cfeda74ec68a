//! Infrastructure layer: stock index, entry stores, processors, config.

pub mod audit;
pub mod availability;
pub mod catalog;
pub mod config;
pub mod journal;
pub mod ledger_store;
pub mod processor;
pub mod service;
pub mod stock_index;


pub use availability::{AvailabilityQuery, AvailableStock, WarehouseValuation};
pub use catalog::{InMemoryCatalog, JournalCatalog, ReferenceCatalog};
pub use config::{ConfigError, JournalConfig, LedgerConfig};
pub use ledger_store::{DateRange, InMemoryLedgerStore, JournalLedgerStore, LedgerFilter, LedgerStore};
pub use processor::{ReversalProcessor, TransactionProcessor};
pub use service::LedgerService;
pub use stock_index::{StagedPositions, StockIndex};
