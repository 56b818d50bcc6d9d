use std::io;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use mail_quota_tool::{open_root, run, Command, QuotaToolConfig};

#[derive(Debug, Parser)]
#[command(name = "mail-quota", about = "Inspect and maintain mail quota usage")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = QuotaToolConfig::from_env()?;
    init_tracing(&config.log_level)?;

    let mut root = open_root(&config)?;
    let outcome = run(&mut root, &config, cli.command, &mut io::stdout().lock());
    root.deinit()?;
    outcome
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))?;
    Ok(())
}
