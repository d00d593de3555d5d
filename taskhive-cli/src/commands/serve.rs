//! HTTP server command
//!
//! Runs migrations, then serves the API until shutdown.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use taskhive_core::AppConfig;
use taskhive_server::db::{migrations, pool::create_pool_with_options};
use taskhive_server::http::{run_server, ServerConfig};

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (overrides config)
    #[arg(long, short = 'b')]
    pub bind: Option<SocketAddr>,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,

    /// Database URL (overrides config/environment)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs, config: AppConfig) -> Result<()> {
    let database_url = match &args.database_url {
        Some(url) => url.clone(),
        None => config.database_url()?.to_owned(),
    };

    let bind_addr = match args.bind {
        Some(addr) => addr,
        None => config
            .server
            .bind
            .parse()
            .with_context(|| format!("invalid bind address '{}'", config.server.bind))?,
    };

    let pool = create_pool_with_options(&database_url, config.database.max_connections)
        .await
        .context("Failed to create database pool")?;

    migrations::run(&pool)
        .await
        .context("Failed to run migrations")?;

    let server_config = ServerConfig {
        bind_addr,
        cors_permissive: args.cors_permissive || config.server.cors_permissive,
        cache_capacity: config.cache.capacity,
        cache_ttl: Duration::from_secs(config.cache.ttl_secs),
    };

    tracing::info!("Starting taskhive server on {}", bind_addr);

    // Blocks until shutdown
    run_server(pool, server_config).await.context("Server error")?;

    Ok(())
}
