//! Caller-facing operations of the stock ledger.
//!
//! Mutating calls consult the [`AuthorizationGate`] before anything else, so
//! a forbidden request never reaches validation.

use std::sync::Arc;

use stockledger_auth::{AuthorizationGate, Caller, OperationKind};
use stockledger_core::{EntryId, LedgerResult, ProductId, WarehouseId};
use stockledger_inventory::{
    EntryLimits, InboundRequest, LedgerEntry, OutboundRequest, ReconciliationRequest,
    StockPosition,
};

use crate::audit::{self, AuditReport};
use crate::availability::{AvailabilityQuery, AvailableStock, WarehouseValuation};
use crate::catalog::ReferenceCatalog;
use crate::ledger_store::{LedgerFilter, LedgerStore};
use crate::processor::{ReversalProcessor, TransactionProcessor};
use crate::stock_index::StockIndex;

pub struct LedgerService<S, C, G> {
    stock: Arc<StockIndex>,
    store: S,
    gate: G,
    transactions: TransactionProcessor<S, C>,
    reversals: ReversalProcessor<S>,
    availability: AvailabilityQuery<C>,
}

impl<S, C, G> LedgerService<S, C, G>
where
    S: LedgerStore + Clone,
    C: ReferenceCatalog + Clone,
    G: AuthorizationGate,
{
    pub fn new(stock: Arc<StockIndex>, store: S, catalog: C, gate: G, limits: EntryLimits) -> Self {
        Self {
            transactions: TransactionProcessor::new(
                stock.clone(),
                store.clone(),
                catalog.clone(),
                limits,
            ),
            reversals: ReversalProcessor::new(stock.clone(), store.clone()),
            availability: AvailabilityQuery::new(stock.clone(), catalog),
            stock,
            store,
            gate,
        }
    }

    fn authorize(&self, caller: &Caller, operation: OperationKind) -> LedgerResult<()> {
        self.gate.check(&caller.role, operation).map_err(|err| {
            tracing::warn!(
                principal_id = %caller.principal_id,
                role = %caller.role,
                %operation,
                "operation forbidden"
            );
            err.into()
        })
    }

    pub fn create_inbound(&self, caller: &Caller, request: &InboundRequest) -> LedgerResult<LedgerEntry> {
        self.authorize(caller, OperationKind::CreateInbound)?;
        self.transactions.create_inbound(request)
    }

    pub fn create_outbound(&self, caller: &Caller, request: &OutboundRequest) -> LedgerResult<LedgerEntry> {
        self.authorize(caller, OperationKind::CreateOutbound)?;
        self.transactions.create_outbound(request)
    }

    pub fn create_reconciliation(
        &self,
        caller: &Caller,
        request: &ReconciliationRequest,
    ) -> LedgerResult<LedgerEntry> {
        self.authorize(caller, OperationKind::CreateReconciliation)?;
        self.transactions.create_reconciliation(request)
    }

    pub fn reverse_entry(&self, caller: &Caller, entry_id: EntryId) -> LedgerResult<LedgerEntry> {
        self.authorize(caller, OperationKind::ReverseEntry)?;
        self.reversals.reverse(entry_id)
    }

    pub fn get_availability(&self, warehouse_id: WarehouseId) -> LedgerResult<Vec<AvailableStock>> {
        self.availability.list_available(warehouse_id)
    }

    pub fn get_position(&self, warehouse_id: WarehouseId, product_id: ProductId) -> LedgerResult<StockPosition> {
        self.availability.position(warehouse_id, product_id)
    }

    pub fn list_ledger(&self, filter: &LedgerFilter) -> LedgerResult<Vec<LedgerEntry>> {
        if let Some(range) = &filter.date_range {
            range.validate()?;
        }
        self.store.list(filter)
    }

    pub fn get_entry(&self, entry_id: EntryId) -> LedgerResult<LedgerEntry> {
        self.store.get(entry_id)
    }

    pub fn valuation(&self, warehouse_id: WarehouseId) -> LedgerResult<WarehouseValuation> {
        self.availability.valuation(warehouse_id)
    }

    pub fn audit(&self) -> LedgerResult<AuditReport> {
        audit::verify(&self.stock, &self.store)
    }
}
