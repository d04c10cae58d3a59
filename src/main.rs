//! relaykit - entry point
//!
//! Exits with status 1 when the command fails.

use clap::Parser;

use relaykit::cli::{self, Cli};
use relaykit::config::Config;
use relaykit::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    cli.apply(&mut config);
    init_tracing(config.log_format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        database_url = %config.database_url,
        "Starting relaykit"
    );
    cli::run(cli, config).await
}
