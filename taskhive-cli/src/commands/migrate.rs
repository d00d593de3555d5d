//! Standalone migration command

use anyhow::{Context, Result};
use clap::Parser;

use taskhive_core::AppConfig;
use taskhive_server::db::{create_pool, migrations};

/// Arguments for the migrate command
#[derive(Parser, Debug)]
pub struct MigrateArgs {
    /// Database URL (overrides config/environment)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
}

/// Run migrations and exit
pub async fn run_migrate(args: MigrateArgs, config: AppConfig) -> Result<()> {
    let database_url = match &args.database_url {
        Some(url) => url.clone(),
        None => config.database_url()?.to_owned(),
    };

    let pool = create_pool(&database_url)
        .await
        .context("Failed to create database pool")?;

    migrations::run(&pool)
        .await
        .context("Failed to run migrations")?;

    println!("Migrations applied");
    Ok(())
}
