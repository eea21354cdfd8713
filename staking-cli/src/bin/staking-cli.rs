use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use staking_cli::{commands, Commands, Config};

#[derive(Parser)]
#[command(author, version, about = "Operator CLI for the governance/staking/voting core")]
struct Cli {
    /// Config file (TOML). Defaults to none, in which case built-in
    /// defaults plus `--store-path`/`GOVERNANCE_STORE` apply.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Overrides `Config::store_path`.
    #[arg(long, env = "GOVERNANCE_STORE")]
    store_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref(), cli.store_path)?;
    commands::run(&config, cli.command)
}
