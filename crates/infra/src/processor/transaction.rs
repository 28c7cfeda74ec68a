use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use stockledger_core::{EntryId, LedgerResult, WarehouseId};
use stockledger_inventory::{
    DeductionLine, EntryKind, EntryLimits, InboundRequest, LedgerEntry, OutboundRequest,
    ReconciliationRequest, StockKey, StockLine,
};

use crate::catalog::{ReferenceCatalog, require_products, require_warehouse};
use crate::ledger_store::LedgerStore;
use crate::stock_index::StockIndex;

/// Validates and commits new inbound, outbound and reconciliation entries.
///
/// Every kind follows the same pipeline:
///
/// ```text
/// structural validation → reference checks
///   → [ write scope over the entry's keys:
///        availability checks (cumulative per key) → stage deltas
///        → build entry (total) → insert ]
///   → positions written back, scope released
/// ```
///
/// Any failure inside the scope discards every staged delta.
pub struct TransactionProcessor<S, C> {
    stock: Arc<StockIndex>,
    store: S,
    catalog: C,
    limits: EntryLimits,
}

impl<S, C> TransactionProcessor<S, C>
where
    S: LedgerStore,
    C: ReferenceCatalog,
{
    pub fn new(stock: Arc<StockIndex>, store: S, catalog: C, limits: EntryLimits) -> Self {
        Self {
            stock,
            store,
            catalog,
            limits,
        }
    }

    /// Receive new stock at caller-supplied buying prices.
    #[tracing::instrument(
        skip(self, request),
        fields(warehouse_id = %request.warehouse_id, lines = request.lines.len())
    )]
    pub fn create_inbound(&self, request: &InboundRequest) -> LedgerResult<LedgerEntry> {
        let result = self.inbound(request);
        log_outcome(EntryKind::Inbound, &result);
        result
    }

    /// Ship stock out at the warehouse's current average cost.
    #[tracing::instrument(
        skip(self, request),
        fields(warehouse_id = %request.warehouse_id, lines = request.lines.len())
    )]
    pub fn create_outbound(&self, request: &OutboundRequest) -> LedgerResult<LedgerEntry> {
        let result = request.validate(&self.limits).and_then(|()| {
            self.deduct(
                EntryKind::Outbound,
                request.warehouse_id,
                request.timestamp,
                &request.lines,
                None,
            )
        });
        log_outcome(EntryKind::Outbound, &result);
        result
    }

    /// Record a loss at the warehouse's current average cost.
    #[tracing::instrument(
        skip(self, request),
        fields(warehouse_id = %request.warehouse_id, lines = request.lines.len())
    )]
    pub fn create_reconciliation(&self, request: &ReconciliationRequest) -> LedgerResult<LedgerEntry> {
        let result = request.validate(&self.limits).and_then(|()| {
            self.deduct(
                EntryKind::Reconciliation,
                request.warehouse_id,
                request.timestamp,
                &request.lines,
                request.notes.clone(),
            )
        });
        log_outcome(EntryKind::Reconciliation, &result);
        result
    }

    fn inbound(&self, request: &InboundRequest) -> LedgerResult<LedgerEntry> {
        request.validate(&self.limits)?;
        require_warehouse(&self.catalog, request.warehouse_id)?;
        require_products(&self.catalog, request.lines.iter().map(|l| l.product_id))?;

        let lines = request
            .lines
            .iter()
            .map(|l| StockLine::new(l.product_id, l.quantity, l.buying_price))
            .collect();
        let entry = LedgerEntry::new(
            EntryId::new(),
            EntryKind::Inbound,
            request.warehouse_id,
            request.timestamp,
            lines,
            None,
        )?;

        self.stock.write_scope(&entry.keys(), |staged| {
            for effect in entry.effects() {
                staged.apply(&effect)?;
            }
            let id = self.store.insert(entry.clone())?;
            self.store.get(id)
        })
    }

    fn deduct(
        &self,
        kind: EntryKind,
        warehouse_id: WarehouseId,
        timestamp: DateTime<Utc>,
        lines: &[DeductionLine],
        notes: Option<String>,
    ) -> LedgerResult<LedgerEntry> {
        require_warehouse(&self.catalog, warehouse_id)?;
        require_products(&self.catalog, lines.iter().map(|l| l.product_id))?;

        let keys: Vec<StockKey> = lines
            .iter()
            .map(|l| StockKey::new(warehouse_id, l.product_id))
            .collect();

        self.stock.write_scope(&keys, |staged| {
            let mut recorded = Vec::with_capacity(lines.len());
            for line in lines {
                let key = StockKey::new(warehouse_id, line.product_id);
                // Cost is resolved here, under the scope, from the latest committed state.
                let unit_cost = staged.get(key)?.average_cost;
                staged.apply_delta(key, -line.quantity, Decimal::ZERO)?;
                recorded.push(StockLine::new(line.product_id, line.quantity, unit_cost));
            }

            let entry = LedgerEntry::new(EntryId::new(), kind, warehouse_id, timestamp, recorded, notes)?;
            let id = self.store.insert(entry)?;
            self.store.get(id)
        })
    }
}

fn log_outcome(kind: EntryKind, result: &LedgerResult<LedgerEntry>) {
    match result {
        Ok(entry) => tracing::info!(
            entry_id = %entry.id(),
            %kind,
            warehouse_id = %entry.warehouse_id(),
            lines = entry.lines().len(),
            total = %entry.total(),
            "ledger entry committed"
        ),
        Err(err) => tracing::warn!(%kind, error_kind = err.kind(), error = %err, "ledger entry rejected"),
    }
}
