use anyhow::Context as _;
use chrono::Datelike;
use clap::{CommandFactory, Parser, Subcommand};
use inquire::InquireError;
use std::fs;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use fabric_invoice::model::CustomCharge;
use fabric_invoice::render::{export_invoice, load_records, open_and_reveal, today};
use fabric_invoice::session::InvoiceSession;
use fabric_invoice::settings::{load_settings, setup_config_wizard};
use fabric_invoice::summary::{invoice_table, summarize, summary_tables};
use fabric_invoice::wizard::{compose_invoice, manage_catalog, parse_date, print_catalog, profit_wizard, App, CatalogKind};

// ==========================================
// CLI
// ==========================================

#[derive(Parser)]
#[command(name = "fabric-invoice", about = "Fabric price lists and set-based invoices")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose a new invoice interactively
    New,
    /// Price an invoice from flags, optionally exporting the PDF
    Quote(QuoteArgs),
    /// Add, edit or delete entries of one catalog
    Catalog {
        #[arg(value_enum)]
        kind: CatalogKind,
    },
    /// Print catalog tables
    List {
        #[arg(value_enum)]
        kind: Option<CatalogKind>,
    },
    /// View or change the profit margin
    Profit,
    /// Show summary of exported invoices
    Summary {
        /// Year to summarize (defaults to current year)
        year: Option<i32>,
    },
    /// Configure data directory
    Config,
    /// Open output folder
    Open,
}

#[derive(clap::Args)]
struct QuoteArgs {
    #[arg(long)]
    customer: String,
    #[arg(long)]
    width: u32,
    /// Number of sets
    #[arg(long)]
    sets: String,
    /// Fabric type id
    #[arg(long)]
    fabric: u32,
    /// Brooch category id
    #[arg(long)]
    brooch: Option<u32>,
    /// Lace category id
    #[arg(long)]
    lace: Option<u32>,
    /// Extra charge id (repeatable)
    #[arg(long = "extra")]
    extras: Vec<u32>,
    /// Custom charge as NAME:PRICE:QTY_PER_SET
    #[arg(long)]
    custom: Option<CustomCharge>,
    /// Invoice date (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    date: Option<String>,
    /// Export the invoice after pricing it
    #[arg(long)]
    pdf: bool,
}

// ==========================================
// Main Function
// ==========================================

fn main() {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help().ok();
        return;
    };

    if let Err(e) = run(command) {
        match e.downcast_ref::<InquireError>() {
            Some(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                println!("Operation cancelled.");
            }
            _ => {
                error!("{:#}", e);
                eprintln!("❌ Error: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run(command: Commands) -> anyhow::Result<()> {
    if let Commands::Config = command {
        let settings = setup_config_wizard()?;
        init_tracing(&settings.root())?;
        return Ok(());
    }

    // 1. Initialize configuration
    let settings = match load_settings() {
        Some(s) => s,
        None => setup_config_wizard()?,
    };
    init_tracing(&settings.root())?;
    let app = App::open(settings)?;
    info!(root = %app.root.display(), "Data root ready");

    match command {
        Commands::New => compose_invoice(&app),
        Commands::Quote(args) => run_quote(&app, args),
        Commands::Catalog { kind } => manage_catalog(&app, kind),
        Commands::List { kind } => print_catalog(&app, kind),
        Commands::Profit => profit_wizard(&app),
        Commands::Summary { year } => show_summary(&app, year),
        Commands::Open => {
            let output = app.root.join("output");
            fs::create_dir_all(&output)?;
            println!("🚀 Opening: {:?}", output);
            open_and_reveal(&output);
            Ok(())
        }
        Commands::Config => Ok(()),
    }
}

/// Diagnostics go to `logs/fabric-invoice.log`; only warnings reach the
/// terminal so prompts stay readable.
fn init_tracing(root: &Path) -> anyhow::Result<()> {
    let log_dir = root.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("fabric-invoice.log"))
        .context("Cannot open log file")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(LevelFilter::WARN),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Arc::new(log_file))
                .with_ansi(false),
        )
        .try_init()
        .ok();
    Ok(())
}

// ==========================================
// Commands
// ==========================================

fn run_quote(app: &App, args: QuoteArgs) -> anyhow::Result<()> {
    let catalog = app.store.load()?;
    let date = parse_date(args.date.as_deref())?;

    let mut session = InvoiceSession::new();
    session.on_customer_entered(&args.customer);
    if let Some(request) = session.on_width_selected(Some(args.width)) {
        session.on_fabric_response::<String>(request, Ok(catalog.fabrics_for_width(args.width)));
    }
    session.on_fabric_selected(Some(args.fabric));
    let scaled = session.on_sets_entered(&args.sets, &catalog.width_rules, app.settings.sets_policy)?;
    session.on_trims_selected(args.brooch, args.lace);
    session.on_extras_selected(args.extras);
    session.on_custom_charge(args.custom);

    let invoice = session
        .on_calculate_invoice(&catalog, app.settings.sets_policy, date)?
        .clone();

    println!(
        "📏 {:.1}m fabric, {} brooch, {} lace for {} sets",
        scaled.meters, scaled.brooch_qty, scaled.lace_qty, invoice.number_of_sets
    );
    println!("\n--- Invoice for {} ({}) ---", invoice.customer_name, invoice.date);
    println!("{}", invoice_table(&invoice, app.currency()));

    if args.pdf {
        let exported = export_invoice(&app.root, &app.shop, &invoice)?;
        println!("✅ Invoice {} saved: {:?}", exported.id, exported.record_path);
        if let Some(pdf) = exported.pdf_path {
            println!("✅ PDF Generated: {:?}", pdf);
        }
    }
    Ok(())
}

fn show_summary(app: &App, year: Option<i32>) -> anyhow::Result<()> {
    let output_dir = app.root.join("output");
    if !output_dir.exists() {
        println!("❌ No output directory found. No invoices to summarize.");
        return Ok(());
    }

    let target_year = year.unwrap_or_else(|| today().year());
    println!("🔍 Scanning invoices for summary (Year: {})...", target_year);

    let records = load_records(&output_dir);
    let summary = summarize(&records, target_year);
    if summary.monthly.is_empty() {
        println!("No invoices found.");
        return Ok(());
    }

    let (monthly, customers) = summary_tables(&summary, target_year, app.currency());
    println!("\n--- Monthly Invoice Summary ({}) ---", target_year);
    println!("{monthly}");
    println!("\n--- Customer Summary ({}) ---", target_year);
    println!("{customers}");
    Ok(())
}
