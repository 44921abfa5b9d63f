//! linkboard CLI — a web news and link aggregator.
//!
//! Submits posts, imports them from external feeds, and classifies their
//! linked pages, all against a single deduplicating post store.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
