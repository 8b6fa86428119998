// SwearJar - Main Entry Point
//
// This is the SwearJar service binary:
// - CLI interface
// - HTTP API and live WebSocket fan-out (`serve`)
// - Offline inspection and reset of the stored counter

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use swearjar::config::Config;
use swearjar::cost::{PriceMultiplier, Tally};
use swearjar::{logging, server};

/// SwearJar: a swear counter with live cost updates
#[derive(Parser, Debug)]
#[command(name = "swearjar")]
#[command(author = "SwearJar Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Swear jar counter service with rate limiting and live WebSocket fan-out", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (defaults to the XDG config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP and WebSocket service
    Serve,
    /// Print the stored count
    Show {
        /// Price per swear used for the cost
        #[arg(long, default_value_t = 1.0)]
        price: f64,
    },
    /// Zero the stored count without a running service
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    logging::init(&config.logging, args.verbose)?;

    match args.command {
        Commands::Serve => {
            info!("SwearJar v{} starting...", env!("CARGO_PKG_VERSION"));
            server::serve(config).await?;
        }
        Commands::Show { price } => {
            let price = PriceMultiplier::new(price)?;
            let store = server::open_store(&config.store)?;
            let count = tokio::task::spawn_blocking(move || store.read()).await??;
            let count = u64::try_from(count)
                .with_context(|| format!("Stored count is negative: {}", count))?;
            let tally = Tally::priced(count, price);
            println!("count: {}, cost: {:.2}", tally.count, tally.cost);
        }
        Commands::Reset => {
            let store = server::open_store(&config.store)?;
            tokio::task::spawn_blocking(move || store.reset()).await??;
            warn!("Swears reset offline; live subscribers of a running service are not notified");
            println!("OK");
        }
    }

    Ok(())
}
