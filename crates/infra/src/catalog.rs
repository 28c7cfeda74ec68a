//! Existence checks against externally owned master data.
//!
//! The ledger never owns warehouse or product records; it only needs to know
//! whether an id refers to something real.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

use stockledger_core::{LedgerError, LedgerResult, ProductId, WarehouseId};

use crate::journal::JournalFile;

/// Read boundary for warehouse/product existence.
pub trait ReferenceCatalog: Send + Sync {
    fn warehouse_exists(&self, id: WarehouseId) -> LedgerResult<bool>;
    fn product_exists(&self, id: ProductId) -> LedgerResult<bool>;
}

impl<C> ReferenceCatalog for Arc<C>
where
    C: ReferenceCatalog + ?Sized,
{
    fn warehouse_exists(&self, id: WarehouseId) -> LedgerResult<bool> {
        (**self).warehouse_exists(id)
    }

    fn product_exists(&self, id: ProductId) -> LedgerResult<bool> {
        (**self).product_exists(id)
    }
}

/// `UnknownReference` unless the warehouse exists.
pub fn require_warehouse<C: ReferenceCatalog + ?Sized>(catalog: &C, id: WarehouseId) -> LedgerResult<()> {
    if catalog.warehouse_exists(id)? {
        Ok(())
    } else {
        Err(LedgerError::unknown_warehouse(id))
    }
}

/// `UnknownReference` for the first product that does not exist.
pub fn require_products<C, I>(catalog: &C, ids: I) -> LedgerResult<()>
where
    C: ReferenceCatalog + ?Sized,
    I: IntoIterator<Item = ProductId>,
{
    for id in ids {
        if !catalog.product_exists(id)? {
            return Err(LedgerError::unknown_product(id));
        }
    }
    Ok(())
}

/// In-memory catalog for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    warehouses: RwLock<HashSet<WarehouseId>>,
    products: RwLock<HashSet<ProductId>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the warehouse was already registered.
    pub fn register_warehouse(&self, id: WarehouseId) -> LedgerResult<bool> {
        let mut set = self
            .warehouses
            .write()
            .map_err(|_| LedgerError::storage("catalog lock poisoned"))?;
        Ok(set.insert(id))
    }

    /// Returns `false` if the product was already registered.
    pub fn register_product(&self, id: ProductId) -> LedgerResult<bool> {
        let mut set = self
            .products
            .write()
            .map_err(|_| LedgerError::storage("catalog lock poisoned"))?;
        Ok(set.insert(id))
    }
}

impl ReferenceCatalog for InMemoryCatalog {
    fn warehouse_exists(&self, id: WarehouseId) -> LedgerResult<bool> {
        let set = self
            .warehouses
            .read()
            .map_err(|_| LedgerError::storage("catalog lock poisoned"))?;
        Ok(set.contains(&id))
    }

    fn product_exists(&self, id: ProductId) -> LedgerResult<bool> {
        let set = self
            .products
            .read()
            .map_err(|_| LedgerError::storage("catalog lock poisoned"))?;
        Ok(set.contains(&id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CatalogRecord {
    WarehouseRegistered { id: WarehouseId },
    ProductRegistered { id: ProductId },
}

/// Catalog whose registrations are persisted in a JSON-lines journal.
#[derive(Debug)]
pub struct JournalCatalog {
    journal: Mutex<JournalFile>,
    memory: InMemoryCatalog,
}

impl JournalCatalog {
    pub fn open(path: &Path, fsync: bool) -> LedgerResult<Self> {
        let (journal, records) = JournalFile::open::<CatalogRecord>(path, fsync)?;
        let memory = InMemoryCatalog::new();
        for record in records {
            match record {
                CatalogRecord::WarehouseRegistered { id } => memory.register_warehouse(id)?,
                CatalogRecord::ProductRegistered { id } => memory.register_product(id)?,
            };
        }
        Ok(Self {
            journal: Mutex::new(journal),
            memory,
        })
    }

    fn journal(&self) -> LedgerResult<std::sync::MutexGuard<'_, JournalFile>> {
        self.journal
            .lock()
            .map_err(|_| LedgerError::storage("catalog journal lock poisoned"))
    }

    pub fn register_warehouse(&self, id: WarehouseId) -> LedgerResult<bool> {
        let mut journal = self.journal()?;
        if self.memory.warehouse_exists(id)? {
            return Ok(false);
        }
        journal.append(&CatalogRecord::WarehouseRegistered { id })?;
        self.memory.register_warehouse(id)
    }

    pub fn register_product(&self, id: ProductId) -> LedgerResult<bool> {
        let mut journal = self.journal()?;
        if self.memory.product_exists(id)? {
            return Ok(false);
        }
        journal.append(&CatalogRecord::ProductRegistered { id })?;
        self.memory.register_product(id)
    }
}

impl ReferenceCatalog for JournalCatalog {
    fn warehouse_exists(&self, id: WarehouseId) -> LedgerResult<bool> {
        self.memory.warehouse_exists(id)
    }

    fn product_exists(&self, id: ProductId) -> LedgerResult<bool> {
        self.memory.product_exists(id)
    }
}
