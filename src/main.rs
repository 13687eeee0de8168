mod api;
mod cli;
mod config;
mod db;
mod error;
mod models;
mod services;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "formcast")]
#[command(about = "Football form tables, outcome models and fixture predictions")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Fetch historical results and/or upcoming fixtures
    Fetch {
        #[arg(short, long, default_value = "all")]
        target: String,
    },
    /// Predict upcoming fixtures and send the reports
    Predict {
        /// Print reports instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
    /// Over/under 2.5 goals predictions for upcoming fixtures
    OverUnder {
        #[arg(long)]
        dry_run: bool,
    },
    /// Show a team's current form
    Team {
        #[arg(short, long)]
        league: String,
        #[arg(short, long)]
        name: String,
    },
    /// Write a league's enriched match rows as CSV
    Export {
        #[arg(short, long)]
        league: String,
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Initialize the database
    InitDb,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    match cli.command {
        Some(Commands::Serve { port }) => {
            tracing::info!("Starting formcast API server on port {}", port);
            api::serve(settings, port).await?;
        }
        Some(Commands::Fetch { target }) => {
            tracing::info!("Fetching {}", target);
            cli::fetch_data(&settings, &target).await?;
        }
        Some(Commands::Predict { dry_run }) => {
            tracing::info!("Generating predictions...");
            cli::generate_predictions(&settings, dry_run).await?;
        }
        Some(Commands::OverUnder { dry_run }) => {
            tracing::info!("Generating over/under predictions...");
            cli::generate_over_under(&settings, dry_run).await?;
        }
        Some(Commands::Team { league, name }) => {
            tracing::info!("Querying team: {} ({})", name, league);
            cli::query_team(&settings, &league, &name).await?;
        }
        Some(Commands::Export { league, out }) => {
            cli::export_features(&settings, &league, &out).await?;
        }
        Some(Commands::InitDb) => {
            tracing::info!("Initializing database...");
            cli::init_db(&settings).await?;
        }
        None => {
            // Default to serving
            tracing::info!("Starting formcast API server on port 3000");
            api::serve(settings, 3000).await?;
        }
    }

    Ok(())
}
