mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rota_core::Config;
use rota_storage::Rota;

use crate::cli::CliArgs;

#[tokio::main]
async fn main() -> Result<()> {
    rota_core::config::load_dotenv();
    let args = CliArgs::parse();

    let config = match &args.profile {
        Some(profile) => Config::for_profile(profile),
        None => Config::from_env(),
    };

    // RUST_LOG wins over LOG_LEVEL; logs go to stderr so stdout stays JSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    config.validate().context("invalid configuration")?;
    config.log_summary();

    let rota = Rota::from_config(&config).context("failed to set up the store")?;
    let outcome = commands::run(&rota, &config, args.command, args.pretty).await;
    rota.close().await;
    outcome
}
