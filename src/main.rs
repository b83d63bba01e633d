// ABOUTME: Entry point for the witness binary.
// ABOUTME: Parses CLI arguments, initializes tracing, and runs schema setup or store inspection.

mod config;
mod status;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use witness_store::{Store, create_schema};

use crate::config::WitnessConfig;

#[derive(Parser)]
#[command(name = "witness", version, about = "Regional transparency-log witness storage")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the checkpoint table in a new database
    InitDb {
        /// Database path or SQLite URI
        #[arg(long = "db-url")]
        db_url: String,
    },
    /// Open the store for REGION and verify the checkpoint table is reachable
    Check,
    /// Show the latest stored checkpoint for each log in REGION
    Status {
        /// Only show this log
        #[arg(long)]
        log: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; real deployments set the environment directly.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("witness=info,witness_store=info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::InitDb { db_url } => {
            create_schema(&db_url).context("failed to create checkpoint table")?;
            tracing::info!("table created");
        }
        Command::Check => {
            let store = open_store().await?;
            let logs = tokio::task::spawn_blocking(move || store.logs())
                .await
                .context("log listing task panicked")??;
            tracing::info!(logs = logs.len(), "checkpoint store ready");
        }
        Command::Status { log } => {
            let store = open_store().await?;
            for summary in status::collect(store, log).await? {
                println!("{summary}");
            }
        }
    }

    Ok(())
}

/// Load configuration, open the region's store, and run the startup schema check.
async fn open_store() -> Result<Store> {
    let config = WitnessConfig::from_env().context("failed to load configuration")?;
    tracing::info!(
        region = %config.region,
        key = config.key_name().unwrap_or("-"),
        "opening checkpoint store"
    );

    tokio::task::spawn_blocking(move || {
        let store = Store::open_with(&config.database_url, &config.region, config.pool)
            .context("failed to open persistence database")?;
        store.init().context("checkpoint table check failed")?;
        Ok::<_, anyhow::Error>(store)
    })
    .await
    .context("store startup task panicked")?
}
