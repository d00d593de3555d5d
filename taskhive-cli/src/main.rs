//! taskhive CLI - crowdsourced task-management backend
//!
//! Entry point for the `taskhive` binary:
//! - `serve` runs migrations and the HTTP API
//! - `migrate` applies the schema and exits

use anyhow::Result;
use clap::{Parser, Subcommand};

use taskhive_core::AppConfig;

mod commands;
mod tracing_setup;

use commands::migrate::{run_migrate, MigrateArgs};
use commands::serve::{run_serve, ServeArgs};
use tracing_setup::{init_tracing, TracingConfig};

#[derive(Parser, Debug)]
#[command(
    name = "taskhive",
    author,
    version,
    about = "Backend for crowdsourced mapping challenges",
    long_about = "Serve the taskhive HTTP API: projects, challenges, surveys, tasks, \
                  and status-action reporting over PostgreSQL."
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve(ServeArgs),
    /// Apply database migrations and exit
    Migrate(MigrateArgs),
}

/// Load .env files: current directory first, then ~/.taskhive/.env.
/// Existing environment variables are never overwritten.
fn load_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!("Loaded .env from {}", path.display());
    }
    if let Some(home) = dirs::home_dir() {
        let env_file = home.join(".taskhive").join(".env");
        if env_file.exists() {
            let _ = dotenvy::from_path(&env_file);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();

    let cli = Cli::parse();
    init_tracing(&TracingConfig { debug: cli.debug })?;

    let config = AppConfig::load()?;

    match cli.command {
        Commands::Serve(args) => run_serve(args, config).await,
        Commands::Migrate(args) => run_migrate(args, config).await,
    }
}
