use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use trivia_api::config::Settings;
use trivia_api::db::{establish_connection, run_migrations};
use trivia_api::server::app::run_server;
use trivia_api::telemetry::init_tracing;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Settings file, defaults to trivia.toml in the working directory if present
    #[clap(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    tracing::debug!("Loaded settings: {settings:?}");

    let pool = establish_connection(&settings.database)
        .await
        .context("Cannot connect to DB")?;

    tracing::info!("Running db migrations...");
    run_migrations(&pool).await?;

    run_server(&settings.server, pool).await
}
