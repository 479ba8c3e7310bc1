use anyhow::Result;
use clap::Parser;
use tracing::info;

use dbcopy_cli::commands::{self, Cli};
use dbcopy_cli::config::Config;
use dbcopy_cli::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting dbcopy v{}", env!("CARGO_PKG_VERSION"));

    // Create database connection pool
    let pool = persistence::db::create_pool(&config.database).await?;
    info!("Database connection pool created");

    commands::run(cli.command, &config, pool).await
}
