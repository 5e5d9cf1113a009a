//! # tasker-queue
//!
//! Command-line entry point for the batch engine. Meant to be invoked by an external
//! scheduler: `run-batch` for cron, `serve` for HTTP-triggered deployments.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tasker_queue::bootstrap::bootstrap;
use tasker_queue::config::ConfigManager;
use tasker_queue::database::{connection, migrator};
use tasker_queue::logging::init_structured_logging;
use tasker_queue::web::{self, AppState};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "tasker-queue")]
#[command(about = "Run and serve the tasker-queue batch engine")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Environment to load (overrides TASKER_ENV / APP_ENV)
    #[arg(short, long, global = true)]
    environment: Option<String>,

    /// Configuration directory (default: $TASKER_QUEUE_CONFIG_DIR or ./config)
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Claim and process one batch, print the summary as JSON
    RunBatch {
        /// Maximum tasks to claim (default: engine.default_batch_size)
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Serve the HTTP trigger endpoint
    Serve,

    /// Apply database migrations
    Migrate,

    /// Load and validate configuration, print the sanitized result
    CheckConfig,
}

fn load_config(cli: &Cli) -> Result<Arc<ConfigManager>> {
    let environment = cli
        .environment
        .clone()
        .unwrap_or_else(ConfigManager::detect_environment);
    ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &environment)
        .context("failed to load configuration")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal outside local development
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config_manager = load_config(&cli)?;
    init_structured_logging(&config_manager.config().logging);

    match cli.command {
        Commands::RunBatch { limit } => {
            let engine = bootstrap(config_manager).await?;
            let limit = limit.unwrap_or(engine.config().engine.default_batch_size);
            let summary = engine.runner.run_batch(limit).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if let Some(error) = summary.infrastructure_error {
                anyhow::bail!("batch run stopped early: {error}");
            }
        }
        Commands::Serve => {
            let engine = bootstrap(config_manager).await?;
            let state = AppState::new(engine.runner.clone(), engine.config().web.clone());
            web::serve(state, shutdown_signal()).await?;
        }
        Commands::Migrate => {
            let pool = connection::connect(&config_manager.config().database).await?;
            migrator::run_migrations(&pool).await?;
            println!("migrations applied");
        }
        Commands::CheckConfig => {
            println!(
                "environment: {}\nconfig directory: {}\n{}",
                config_manager.environment(),
                config_manager.config_directory().display(),
                serde_json::to_string_pretty(&config_manager.debug_config())?
            );
        }
    }

    Ok(())
}
