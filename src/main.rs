mod cli;
mod config;
mod engine;
mod gmail;
mod logging;
mod rules;
mod store;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::config::Config;

#[derive(Parser)]
#[command(version, about = "keep a local mailbox snapshot and apply declarative rules to it")]
pub struct Args {
    /// Alternative config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Alternative rule file
    #[arg(long)]
    rules: Option<PathBuf>,
    /// How many recent messages to fetch before processing
    #[arg(long)]
    limit: Option<u32>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();
    let config = Config::load_from_file(args.config.clone());

    cli::run(&args, &config).await
}
