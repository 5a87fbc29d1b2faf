mod builtins;
mod config;
mod dispatch;
mod error;
mod history;
mod parser;
mod pipeline;
mod repl;
mod util;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

fn main() -> Result<()> {
    // Diagnostics go to stderr; stdout belongs to the pipelines.
    let filter = EnvFilter::try_from_env("SISH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    tracing::debug!(?config, "starting");
    repl::start_repl(config)
}
