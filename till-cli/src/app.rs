use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use till_config::{load_config, AppConfig};
use till_ledger::{
    LedgerQuery, LedgerRepository, ManualKind, ManualTransaction, NewPayment, PaymentMethod,
    Product, PurchaseRecord, Reference, SaleRecord, Scope, SqliteLedger, TransactionType,
};
use till_reports::{summarize, summarize_dashboard, DashboardRequest, Period};

use crate::telemetry::init_tracing;

#[derive(Parser)]
#[command(author, version, about = "Till point-of-sale accounting")]
pub struct Cli {
    /// Directory holding `default.toml` and per-environment overrides
    #[arg(long, default_value = "config", global = true)]
    config_dir: PathBuf,
    /// Configuration environment to load on top of the defaults
    #[arg(long, default_value = "default", global = true)]
    env: String,
    /// Override the configured database path
    #[arg(long, global = true)]
    database: Option<PathBuf>,
    /// Increase logging verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the ledger schema if it does not exist yet
    Init,
    /// Book a completed sale read from a JSON file (`-` for stdin)
    Sale {
        #[arg(long)]
        file: PathBuf,
    },
    /// Book a supplier purchase read from a JSON file (`-` for stdin)
    Purchase {
        #[arg(long)]
        file: PathBuf,
    },
    /// Record a payment against a sale, a purchase or nothing
    Payment(PaymentArgs),
    /// Record staff-entered income or expense
    Manual(ManualArgs),
    /// Create or update a catalog product used for costing
    Product(ProductArgs),
    /// Replay a JSON array of historical sales into the ledger
    Backfill {
        #[arg(long)]
        file: PathBuf,
    },
    /// Profit and cash totals over an optional window
    Summary {
        #[arg(long)]
        device: i64,
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        #[arg(long)]
        to: Option<DateTime<Utc>>,
    },
    /// Period-over-period dashboard with chart buckets
    Dashboard {
        #[arg(long)]
        device: i64,
        #[arg(long, default_value_t = 0)]
        user: i64,
        /// today, week, month, quarter or year
        #[arg(long)]
        period: Option<Period>,
    },
    /// List receivables for a device
    Receivables(SubledgerArgs),
    /// List payables for a device
    Payables(SubledgerArgs),
    /// List ledger entries for a device
    Entries(EntriesArgs),
    /// Print the resolved configuration as TOML
    Config,
}

#[derive(Args)]
pub struct ScopeArgs {
    #[arg(long)]
    device: i64,
    #[arg(long, default_value_t = 0)]
    company: i64,
    /// Staff member attributed with the write
    #[arg(long, default_value_t = 0)]
    user: i64,
}

impl ScopeArgs {
    fn scope(&self) -> Scope {
        Scope::new(self.device, self.company, self.user)
    }
}

#[derive(Args)]
pub struct PaymentArgs {
    #[command(flatten)]
    scope: ScopeArgs,
    /// `sale:<id>`, `purchase:<id>` or `manual`
    #[arg(long, default_value = "manual")]
    reference: Reference,
    #[arg(long)]
    amount: Decimal,
    #[arg(long, default_value = "cash")]
    method: PaymentMethod,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    date: Option<DateTime<Utc>>,
}

#[derive(Args)]
pub struct ManualArgs {
    #[command(flatten)]
    scope: ScopeArgs,
    /// `income` or `expense`
    #[arg(long)]
    kind: ManualKind,
    #[arg(long)]
    amount: Decimal,
    #[arg(long, default_value = "")]
    category: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long)]
    date: Option<DateTime<Utc>>,
}

#[derive(Args)]
pub struct ProductArgs {
    #[arg(long)]
    device: i64,
    #[arg(long)]
    id: i64,
    #[arg(long)]
    name: String,
    #[arg(long)]
    price: Option<Decimal>,
    #[arg(long)]
    wholesale_price: Option<Decimal>,
}

#[derive(Args)]
pub struct SubledgerArgs {
    #[arg(long)]
    device: i64,
    /// Only rows with a balance still owed
    #[arg(long)]
    outstanding: bool,
}

#[derive(Args)]
pub struct EntriesArgs {
    #[arg(long)]
    device: i64,
    #[arg(long = "type")]
    transaction_type: Option<TransactionType>,
    #[arg(long)]
    reference: Option<Reference>,
    #[arg(long)]
    from: Option<DateTime<Utc>>,
    #[arg(long)]
    to: Option<DateTime<Utc>>,
    #[arg(long)]
    limit: Option<usize>,
    /// Newest first
    #[arg(long)]
    desc: bool,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config_dir, &cli.env)?;
    let _guard = init_tracing(&config.logging, cli.verbose)?;
    execute(cli, config)
}

fn execute(cli: Cli, config: AppConfig) -> Result<()> {
    if let Commands::Config = cli.command {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }
    let path = cli.database.unwrap_or_else(|| config.database.path.clone());
    let ledger = SqliteLedger::with_busy_timeout(&path, config.database.busy_timeout())
        .with_context(|| format!("failed to open ledger at {}", path.display()))?;

    match cli.command {
        Commands::Init => {
            info!(path = %path.display(), "ledger initialised");
            emit(&serde_json::json!({ "database": path }))
        }
        Commands::Sale { file } => {
            let sale: SaleRecord = read_json(&file)?;
            let outcome = ledger
                .record_sale(&sale)
                .with_context(|| format!("failed to record sale {}", sale.sale_id))?;
            emit(&outcome)
        }
        Commands::Purchase { file } => {
            let purchase: PurchaseRecord = read_json(&file)?;
            let outcome = ledger
                .record_purchase(&purchase)
                .with_context(|| format!("failed to record purchase {}", purchase.purchase_id))?;
            emit(&outcome)
        }
        Commands::Payment(args) => {
            let mut payment = NewPayment::new(args.reference, args.amount, args.scope.scope())
                .with_method(args.method);
            if let Some(notes) = args.notes {
                payment = payment.with_notes(notes);
            }
            if let Some(date) = args.date {
                payment = payment.dated(date);
            }
            let receipt = ledger
                .record_payment(payment)
                .with_context(|| format!("failed to record payment for {}", args.reference))?;
            emit(&receipt)
        }
        Commands::Manual(args) => {
            let entry = ledger.add_manual_transaction(ManualTransaction {
                kind: args.kind,
                amount: args.amount,
                category: args.category,
                description: args.description,
                scope: args.scope.scope(),
                transaction_date: args.date.unwrap_or_else(Utc::now),
            })?;
            emit(&entry)
        }
        Commands::Product(args) => {
            let product = ledger.upsert_product(&Product {
                id: args.id,
                device_id: args.device,
                name: args.name,
                price: args.price,
                wholesale_price: args.wholesale_price,
            })?;
            emit(&product)
        }
        Commands::Backfill { file } => {
            let sales: Vec<SaleRecord> = read_json(&file)?;
            let report = ledger.backfill_sales(&sales);
            emit(&report)?;
            if report.failed() > 0 {
                bail!("{} of {} sales failed to backfill", report.failed(), sales.len());
            }
            Ok(())
        }
        Commands::Summary { device, from, to } => emit(&summarize(&ledger, device, from, to)?),
        Commands::Dashboard {
            device,
            user,
            period,
        } => {
            let period = match period {
                Some(period) => period,
                None => config
                    .dashboard
                    .default_period
                    .parse::<Period>()
                    .map_err(anyhow::Error::msg)
                    .context("invalid dashboard.default_period")?,
            };
            let snapshot = summarize_dashboard(
                &ledger,
                &DashboardRequest {
                    user_id: user,
                    device_id: device,
                    period,
                },
            )?;
            emit(&snapshot)
        }
        Commands::Receivables(args) => emit(&ledger.receivables(args.device, args.outstanding)?),
        Commands::Payables(args) => emit(&ledger.payables(args.device, args.outstanding)?),
        Commands::Entries(args) => {
            let mut query = LedgerQuery::for_device(args.device).with_time_range(args.from, args.to);
            if let Some(transaction_type) = args.transaction_type {
                query = query.with_type(transaction_type);
            }
            if let Some(reference) = args.reference {
                query = query.with_reference(reference);
            }
            if let Some(limit) = args.limit {
                query = query.with_limit(limit);
            }
            if args.desc {
                query = query.descending();
            }
            emit(&ledger.entries(&query)?)
        }
        Commands::Config => Ok(()),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        buf
    } else {
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?
    };
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn emit<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
