mod cli;
mod platform;

use anyhow::{Context, Result};
use clap::Parser;

use cli::Args;
use platform::config::WatcherConfig;

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = WatcherConfig::load(args.config.as_deref())?;
    args.apply_to(&mut config);
    platform::logging::initialize(config.log_destination, config.log_level()?);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("could not start the async runtime")?;
    runtime.block_on(platform::run_app(config))
}
