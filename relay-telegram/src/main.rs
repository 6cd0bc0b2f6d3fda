//! Relay Bot - Main entry point.

use anyhow::Result;
use relay_common::config::Config;
use relay_common::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (.env, config file, environment) and validate
    let config = Config::load_and_validate()?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("Relay Bot v{}", env!("CARGO_PKG_VERSION"));

    relay_telegram::run(&config).await
}
