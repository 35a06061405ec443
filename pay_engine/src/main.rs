//! Entry point for the Pay Engine binary.
//!
//! `pay_engine serve` (the default) starts the HTTP API.  `pay_engine
//! price` prices a JSON file of pay events against the catalog on disk
//! and prints the batch result.  The catalog directory, bind address and
//! snapshot freshness bound come from the environment; see
//! `config::AppConfig`.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use pay_engine::catalog::load_catalog_from_dir;
use pay_engine::config::AppConfig;
use pay_engine::engine::run_batch;
use pay_engine::models::PayRunInput;
use pay_engine::{api, telemetry};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pay_engine",
    about = "Resolve linehaul pay rates and price driver pay events",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Price a batch of pay events from a JSON file
    Price(PriceArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured bind address
    #[arg(long)]
    addr: Option<SocketAddr>,
}

#[derive(Args, Debug)]
struct PriceArgs {
    /// JSON file holding `{"events": [...]}`
    #[arg(long)]
    events: PathBuf,
    /// Override the configured catalog directory
    #[arg(long)]
    catalog: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error running pay engine: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    match cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()))
    {
        Command::Serve(args) => {
            let addr = args.addr.unwrap_or(config.bind_addr);
            api::serve(addr, config.catalog.dir.clone(), config.catalog.snapshot_policy()).await
        }
        Command::Price(args) => {
            let dir = args.catalog.unwrap_or_else(|| config.catalog.dir.clone());
            let catalog = load_catalog_from_dir(&dir)?;
            let raw = std::fs::read_to_string(&args.events)
                .with_context(|| format!("reading {}", args.events.display()))?;
            let input: PayRunInput = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", args.events.display()))?;
            let result = run_batch(input, &catalog, &config.catalog.snapshot_policy(), Utc::now());
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
    }
}
