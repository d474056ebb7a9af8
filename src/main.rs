#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

use anyhow::Result;
use callgate::Config;
use clap::Parser;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Registry, fmt, reload};

mod app;
mod cli;

use cli::commands::Cli;

type LevelHandle = reload::Handle<LevelFilter, Registry>;

/// Install the global subscriber at INFO so config loading can already
/// report problems. The returned handle settles the final level later.
fn init_logging() -> Result<LevelHandle> {
    let (level_filter, level_handle) = reload::Layer::new(LevelFilter::INFO);
    tracing_subscriber::registry()
        .with(level_filter)
        .with(fmt::layer())
        .try_init()?;
    Ok(level_handle)
}

/// `--verbose` wins, then `log_level` from config or `LOG_LEVEL`, then INFO.
fn resolve_level(verbose: bool, config: &Config) -> Level {
    if verbose {
        return Level::DEBUG;
    }
    config
        .log_level
        .as_deref()
        .and_then(|raw| Level::from_str(raw.trim()).ok())
        .unwrap_or(Level::INFO)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level_handle = init_logging()?;

    let config = Config::load(cli.config.as_deref())?;
    level_handle.reload(LevelFilter::from_level(resolve_level(cli.verbose, &config)))?;

    app::dispatch::dispatch(cli.command, config).await
}
