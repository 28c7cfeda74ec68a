use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use serde::Serialize;

use stockledger_auth::{Caller, Role, RolePolicy};
use stockledger_core::{ProductId, WarehouseId};
use stockledger_infra::audit::{self, AuditReport, Mismatch};
use stockledger_infra::{
    AvailableStock, DateRange, JournalCatalog, JournalLedgerStore, LedgerConfig, LedgerFilter,
    LedgerService, LedgerStore, StockIndex, WarehouseValuation,
};
use stockledger_inventory::{InboundRequest, LedgerEntry, OutboundRequest, ReconciliationRequest};

use crate::cli::*;

type Service = LedgerService<Arc<JournalLedgerStore>, Arc<JournalCatalog>, RolePolicy>;

/// Everything one invocation works against.
struct Session {
    service: Service,
    catalog: Arc<JournalCatalog>,
    caller: Caller,
    format: OutputFormat,
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let session = open_session(&cli)?;
    match cli.command {
        Command::Warehouse(args) => cmd_register_warehouse(&session, args),
        Command::Product(args) => cmd_register_product(&session, args),
        Command::Inbound(args) => cmd_inbound(&session, args),
        Command::Outbound(args) => cmd_outbound(&session, args),
        Command::Reconcile(args) => cmd_reconcile(&session, args),
        Command::Reverse(args) => {
            let reversal = session.service.reverse_entry(&session.caller, args.entry)?;
            session.emit_entry(&reversal)
        }
        Command::Availability(args) => cmd_availability(&session, args),
        Command::Valuation(args) => {
            let valuation = session.service.valuation(args.warehouse)?;
            session.emit(&valuation, print_valuation)
        }
        Command::Ledger(args) => cmd_ledger(&session, args),
        Command::Audit => cmd_audit(&session),
    }
}

fn open_session(cli: &Cli) -> anyhow::Result<Session> {
    let mut config = LedgerConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(journal) = &cli.journal {
        config.journal.path = journal.clone();
    }
    stockledger_observability::init(&config.log);

    for permission in config.unknown_permissions() {
        tracing::warn!(permission, "configured permission matches no operation");
    }

    let store = Arc::new(
        JournalLedgerStore::open(&config.journal.path, config.journal.fsync)
            .with_context(|| format!("opening ledger journal {}", config.journal.path.display()))?,
    );
    let catalog_path = config.journal.catalog_path();
    let catalog = Arc::new(
        JournalCatalog::open(&catalog_path, config.journal.fsync)
            .with_context(|| format!("opening catalog {}", catalog_path.display()))?,
    );

    let stock = Arc::new(StockIndex::with_cost_scale(config.cost_scale));
    let entries = store.scan()?;
    stock.restore(audit::replay(&entries, config.cost_scale)?)?;
    tracing::debug!(entries = entries.len(), "stock positions rebuilt from ledger");

    let caller = Caller::new(
        cli.principal.unwrap_or_default(),
        Role::new(cli.role.clone()),
    );
    let service = LedgerService::new(stock, store, catalog.clone(), config.role_policy(), config.limits);

    Ok(Session {
        service,
        catalog,
        caller,
        format: cli.format,
    })
}

impl Session {
    fn emit<T: Serialize + ?Sized>(&self, value: &T, text: impl FnOnce(&T)) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Text => text(value),
        }
        Ok(())
    }

    fn emit_entry(&self, entry: &LedgerEntry) -> anyhow::Result<()> {
        self.emit(entry, print_entry)
    }
}

#[derive(Serialize)]
struct Registered {
    id: String,
    created: bool,
}

fn print_registered(kind: &str) -> impl FnOnce(&Registered) + '_ {
    move |r: &Registered| {
        if r.created {
            println!("registered {kind} {}", r.id);
        } else {
            println!("{kind} {} already registered", r.id);
        }
    }
}

fn cmd_register_warehouse(session: &Session, args: RegisterArgs) -> anyhow::Result<()> {
    let RegisterAction::Add { id } = args.action;
    let id: WarehouseId = match id {
        Some(raw) => raw.parse()?,
        None => WarehouseId::new(),
    };
    let created = session.catalog.register_warehouse(id)?;
    session.emit(
        &Registered {
            id: id.to_string(),
            created,
        },
        print_registered("warehouse"),
    )
}

fn cmd_register_product(session: &Session, args: RegisterArgs) -> anyhow::Result<()> {
    let RegisterAction::Add { id } = args.action;
    let id: ProductId = match id {
        Some(raw) => raw.parse()?,
        None => ProductId::new(),
    };
    let created = session.catalog.register_product(id)?;
    session.emit(
        &Registered {
            id: id.to_string(),
            created,
        },
        print_registered("product"),
    )
}

fn cmd_inbound(session: &Session, args: InboundArgs) -> anyhow::Result<()> {
    let request = InboundRequest {
        warehouse_id: args.warehouse,
        timestamp: args.at.unwrap_or_else(Utc::now),
        lines: args.lines,
    };
    let entry = session.service.create_inbound(&session.caller, &request)?;
    session.emit_entry(&entry)
}

fn cmd_outbound(session: &Session, args: DeductionArgs) -> anyhow::Result<()> {
    let request = OutboundRequest {
        warehouse_id: args.warehouse,
        timestamp: args.at.unwrap_or_else(Utc::now),
        lines: args.lines,
    };
    let entry = session.service.create_outbound(&session.caller, &request)?;
    session.emit_entry(&entry)
}

fn cmd_reconcile(session: &Session, args: ReconcileArgs) -> anyhow::Result<()> {
    let request = ReconciliationRequest {
        warehouse_id: args.deduction.warehouse,
        timestamp: args.deduction.at.unwrap_or_else(Utc::now),
        lines: args.deduction.lines,
        notes: args.notes,
    };
    let entry = session.service.create_reconciliation(&session.caller, &request)?;
    session.emit_entry(&entry)
}

fn cmd_availability(session: &Session, args: WarehouseArgs) -> anyhow::Result<()> {
    let available = session.service.get_availability(args.warehouse)?;
    session.emit(available.as_slice(), |rows: &[AvailableStock]| {
        if rows.is_empty() {
            println!("no stock on hand");
        }
        for row in rows {
            println!("{}  qty {:>8}  avg cost {}", row.product_id, row.quantity, row.unit_cost);
        }
    })
}

fn cmd_ledger(session: &Session, args: LedgerArgs) -> anyhow::Result<()> {
    let date_range = (args.from.is_some() || args.to.is_some()).then_some(DateRange {
        from: args.from,
        to: args.to,
    });
    let filter = LedgerFilter {
        warehouse_id: args.warehouse,
        kind: args.kind,
        date_range,
    };
    let entries = session.service.list_ledger(&filter)?;
    session.emit(entries.as_slice(), |entries: &[LedgerEntry]| {
        if entries.is_empty() {
            println!("no entries");
        }
        for entry in entries {
            print_entry(entry);
        }
    })
}

fn cmd_audit(session: &Session) -> anyhow::Result<()> {
    let report = session.service.audit()?;
    session.emit(&report, print_audit)?;
    if !report.is_consistent() {
        anyhow::bail!("ledger audit found {} mismatches", report.mismatches.len());
    }
    Ok(())
}

fn print_entry(entry: &LedgerEntry) {
    let mut flags = String::new();
    if let Some(original) = entry.reversal_of() {
        flags.push_str(&format!(" reverses {original}"));
    }
    if let Some(by) = entry.reversed_by() {
        flags.push_str(&format!(" reversed by {by}"));
    }
    println!(
        "#{:<5} {} {:<14} {}  warehouse {}  total {}{flags}",
        entry.sequence(),
        entry.id(),
        entry.kind().as_str(),
        entry.timestamp().to_rfc3339(),
        entry.warehouse_id(),
        entry.total(),
    );
    for line in entry.lines() {
        let subtotal = line
            .subtotal()
            .map_or_else(|_| "overflow".to_string(), |s| s.to_string());
        println!(
            "        {}  qty {:>8}  unit cost {}  subtotal {subtotal}",
            line.product_id, line.quantity, line.unit_cost,
        );
    }
    if let Some(notes) = entry.notes() {
        println!("        notes: {notes}");
    }
}

fn print_valuation(v: &WarehouseValuation) {
    println!(
        "warehouse {}: {} products, {} units, value {}",
        v.warehouse_id, v.product_count, v.total_quantity, v.total_value
    );
}

fn print_audit(report: &AuditReport) {
    println!(
        "checked {} entries against {} positions",
        report.entries_checked, report.positions_checked
    );
    for mismatch in &report.mismatches {
        match mismatch {
            Mismatch::Position { key, replayed, live } => println!(
                "  {key}: replayed {} @ {}, live {} @ {}",
                replayed.quantity, replayed.average_cost, live.quantity, live.average_cost
            ),
            Mismatch::Quantity {
                key,
                ledger_quantity,
                live_quantity,
            } => println!("  {key}: ledger quantity {ledger_quantity}, live {live_quantity}"),
        }
    }
    if report.is_consistent() {
        println!("ledger and stock positions agree");
    }
}
