//! reasoning-tap binary entry point

use color_eyre::Result;
use reasoning_tap::{
    cli::{self, Cli},
    config::TapConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Install error handler
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Resolve configuration: files, environment, then flags
    let mut config = TapConfig::load()?;
    cli.apply_overrides(&mut config);

    // Set up logging
    cli::init_logging(config.verbose);

    cli::run(cli, config).await?;

    Ok(())
}
