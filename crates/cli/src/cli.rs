use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

use stockledger_auth::PrincipalId;
use stockledger_core::{EntryId, ProductId, WarehouseId};
use stockledger_inventory::{DeductionLine, EntryKind, InboundLine};

#[derive(Parser)]
#[command(
    name = "stockledger",
    about = "Warehouse stock ledger: receive, ship, reconcile and audit stock",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Ledger journal file; overrides the configured path.
    #[arg(long, global = true)]
    pub journal: Option<PathBuf>,

    /// Role the caller acts in.
    #[arg(long, global = true, default_value = "admin")]
    pub role: String,

    /// Principal recorded in logs; a fresh id if omitted.
    #[arg(long, global = true)]
    pub principal: Option<PrincipalId>,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Register warehouses
    Warehouse(RegisterArgs),
    /// Register products
    Product(RegisterArgs),
    /// Receive stock at buying prices
    Inbound(InboundArgs),
    /// Ship stock out at average cost
    Outbound(DeductionArgs),
    /// Record lost or damaged stock
    Reconcile(ReconcileArgs),
    /// Reverse a committed entry
    Reverse(ReverseArgs),
    /// List products on hand in a warehouse
    Availability(WarehouseArgs),
    /// Inventory value of a warehouse at average cost
    Valuation(WarehouseArgs),
    /// List ledger entries
    Ledger(LedgerArgs),
    /// Replay the ledger and compare it with live positions
    Audit,
}

#[derive(Args)]
pub struct RegisterArgs {
    #[command(subcommand)]
    pub action: RegisterAction,
}

#[derive(Subcommand)]
pub enum RegisterAction {
    /// Register an id; a new one is generated if omitted
    Add { id: Option<String> },
}

#[derive(Args)]
pub struct InboundArgs {
    #[arg(long)]
    pub warehouse: WarehouseId,
    /// PRODUCT:QTY:PRICE, repeatable
    #[arg(long = "line", required = true, value_parser = parse_inbound_line)]
    pub lines: Vec<InboundLine>,
    /// RFC 3339 timestamp; now if omitted
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Args)]
pub struct DeductionArgs {
    #[arg(long)]
    pub warehouse: WarehouseId,
    /// PRODUCT:QTY, repeatable
    #[arg(long = "line", required = true, value_parser = parse_deduction_line)]
    pub lines: Vec<DeductionLine>,
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Args)]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub deduction: DeductionArgs,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args)]
pub struct ReverseArgs {
    pub entry: EntryId,
}

#[derive(Args)]
pub struct WarehouseArgs {
    pub warehouse: WarehouseId,
}

#[derive(Args)]
pub struct LedgerArgs {
    #[arg(long)]
    pub warehouse: Option<WarehouseId>,
    #[arg(long)]
    pub kind: Option<EntryKind>,
    #[arg(long)]
    pub from: Option<DateTime<Utc>>,
    #[arg(long)]
    pub to: Option<DateTime<Utc>>,
}

fn split_fields(raw: &str, expected: usize, shape: &str) -> Result<Vec<String>, String> {
    let fields: Vec<String> = raw.split(':').map(|f| f.trim().to_string()).collect();
    if fields.len() != expected {
        return Err(format!("expected {shape}, got '{raw}'"));
    }
    Ok(fields)
}

fn parse_quantity(raw: &str) -> Result<i64, String> {
    raw.parse().map_err(|e| format!("quantity '{raw}': {e}"))
}

pub fn parse_inbound_line(raw: &str) -> Result<InboundLine, String> {
    let fields = split_fields(raw, 3, "PRODUCT:QTY:PRICE")?;
    Ok(InboundLine {
        product_id: fields[0].parse().map_err(|e| format!("{e}"))?,
        quantity: parse_quantity(&fields[1])?,
        buying_price: fields[2]
            .parse::<Decimal>()
            .map_err(|e| format!("price '{}': {e}", fields[2]))?,
    })
}

pub fn parse_deduction_line(raw: &str) -> Result<DeductionLine, String> {
    let fields = split_fields(raw, 2, "PRODUCT:QTY")?;
    let product_id: ProductId = fields[0].parse().map_err(|e| format!("{e}"))?;
    Ok(DeductionLine {
        product_id,
        quantity: parse_quantity(&fields[1])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rust_decimal_macros::dec;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn inbound_line_parses() {
        let product = ProductId::new();
        let line = parse_inbound_line(&format!("{product}:12:3.50")).unwrap();
        assert_eq!(line.product_id, product);
        assert_eq!(line.quantity, 12);
        assert_eq!(line.buying_price, dec!(3.50));
    }

    #[test]
    fn malformed_lines_are_rejected() {
        let product = ProductId::new();
        assert!(parse_inbound_line(&format!("{product}:12")).is_err());
        assert!(parse_inbound_line(&format!("{product}:x:1")).is_err());
        assert!(parse_deduction_line("not-a-uuid:1").is_err());
        assert!(parse_deduction_line(&format!("{product}:1:2")).is_err());
    }

    #[test]
    fn global_flags_and_lines_parse() {
        let w = WarehouseId::new();
        let p = ProductId::new();
        let cli = Cli::try_parse_from([
            "stockledger".to_string(),
            "--role".to_string(),
            "warehouse".to_string(),
            "outbound".to_string(),
            "--warehouse".to_string(),
            w.to_string(),
            "--line".to_string(),
            format!("{p}:2"),
            "--line".to_string(),
            format!("{p}:3"),
            "--format".to_string(),
            "json".to_string(),
        ])
        .unwrap();

        assert_eq!(cli.role, "warehouse");
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Command::Outbound(args) => {
                assert_eq!(args.warehouse, w);
                assert_eq!(args.lines.len(), 2);
                assert_eq!(args.lines[1].quantity, 3);
            }
            _ => panic!("expected outbound"),
        }
    }
}
