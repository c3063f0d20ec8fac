mod auth;
mod cli;
mod config;
mod engine;
mod error;
mod model;
mod output;
mod providers;
mod sweep;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting pkgsweep - GitLab package retention cleaner");
    cli.execute().await?;

    Ok(())
}
