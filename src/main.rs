mod board;
mod cli;
mod config;
mod error;
mod fetch;
mod logging;
mod model;
mod query;
mod resolve;
mod triage;

use anyhow::Result;
use clap::Parser;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);
    cli::execute(cli).await
}
