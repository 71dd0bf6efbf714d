// In app/src/main.rs

use anyhow::{Context, Result};
use app_config::Settings;
use clap::{Parser, Subcommand};
use database::{MemoryStore, SharedStore, Store};
use market::{PriceFeed, VolatilityModel, default_catalog};
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use web_server::AppState;

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = "Simulated stock-trading game server.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serves the trade, market-data and XP endpoints.
    Serve {
        /// Keep all state in memory instead of PostgreSQL.
        #[arg(long)]
        memory: bool,
    },

    /// Inserts any missing instruments of the default catalog.
    Seed,

    /// Advances the simulated market and prints the resulting prices.
    Tick {
        /// How many ticks to run.
        #[arg(short, long, default_value_t = 1)]
        count: u32,
    },
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = app_config::load_settings().context("loading configuration")?;

    let default_level = settings
        .app
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(
        tracing_subscriber::filter::Targets::new()
            .with_target("sqlx::query", tracing::Level::WARN) // Disable sqlx query debug logs
            .with_default(default_level),
    );
    tracing_subscriber::registry().with(fmt_layer).init();

    tracing::info!(environment = %settings.app.environment, "Starting trading game");

    match cli.command {
        Commands::Serve { memory } => handle_serve(settings, memory).await?,
        Commands::Seed => handle_seed(settings).await?,
        Commands::Tick { count } => handle_tick(settings, count).await?,
    }

    Ok(())
}

/// Opens the configured store, or an empty in-memory one.
async fn open_store(settings: &Settings, memory: bool) -> Result<SharedStore> {
    if memory {
        tracing::warn!("Using in-memory store; all state is lost on exit.");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let db = database::connect(&settings.database)
        .await
        .context("connecting to PostgreSQL")?;
    Ok(Arc::new(db))
}

async fn seed_catalog(store: &dyn Store) -> Result<()> {
    let inserted = store
        .seed_instruments(&default_catalog())
        .await
        .context("seeding instrument catalog")?;
    tracing::info!(inserted, "Instrument catalog seeded");
    Ok(())
}

// --- "Serve" Subcommand Logic ---

async fn handle_serve(settings: Settings, memory: bool) -> Result<()> {
    let store = open_store(&settings, memory).await?;
    // An in-memory store starts empty, so it always needs the catalog.
    if memory || settings.market.seed_on_start {
        seed_catalog(store.as_ref()).await?;
    }

    let model = VolatilityModel::from_settings(&settings.market)?;
    let state = AppState::new(store, model);

    web_server::run(settings.server, state).await?;
    Ok(())
}

// --- "Seed" Subcommand Logic ---

async fn handle_seed(settings: Settings) -> Result<()> {
    let store = open_store(&settings, false).await?;
    seed_catalog(store.as_ref()).await
}

// --- "Tick" Subcommand Logic ---

async fn handle_tick(settings: Settings, count: u32) -> Result<()> {
    let store = open_store(&settings, false).await?;
    let model = VolatilityModel::from_settings(&settings.market)?;
    let feed = PriceFeed::new(store, model);

    for tick in 1..=count {
        let snapshots = feed.tick().await?;
        println!("--- tick {tick} ---");
        for snapshot in snapshots {
            println!(
                "{:<12} {:>10} {:>9} ({:>6}%)",
                snapshot.symbol.as_str(),
                snapshot.price,
                snapshot.change,
                snapshot.change_pct
            );
        }
    }
    Ok(())
}
