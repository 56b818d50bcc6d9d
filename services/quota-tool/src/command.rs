use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;
use tracing::info;

use mail_quota::{
    BackendRegistry, MaildirUsageOracle, Quota, QuotaRoot, ResourceUsage, Usage, UsageDelta,
};

use crate::config::QuotaToolConfig;

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Print current usage and limits
    Get,
    /// Apply a usage delta
    Update {
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        bytes: i64,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        messages: i64,
    },
    /// Recount usage from the mail storage and overwrite stored counters
    Recalc,
}

#[derive(Debug, Serialize)]
pub struct UsageReport<'a> {
    pub user: &'a str,
    pub backend: &'a str,
    pub resources: Vec<ResourceUsage>,
}

/// Opens the configured quota root, counting mail under `MAIL_ROOT`.
pub fn open_root(config: &QuotaToolConfig) -> Result<QuotaRoot> {
    let settings = config.root_settings()?;
    info!(
        user = %config.user,
        backend = %settings.backend,
        mail_root = %config.mail_root.display(),
        "opening quota root"
    );

    let oracle = Arc::new(MaildirUsageOracle::new(config.mail_root.clone()));
    let quota = Quota::new(config.user.clone(), oracle);
    let root = BackendRegistry::with_builtin_backends()
        .allocate(&settings.backend, quota)?
        .with_limits(config.limits())
        .init(&settings.args)
        .with_context(|| format!("failed to initialize quota root for {}", config.user))?;
    Ok(root)
}

/// Runs `command` against `root` and writes the resulting usage report.
pub fn run<W: Write>(
    root: &mut QuotaRoot,
    config: &QuotaToolConfig,
    command: Command,
    out: &mut W,
) -> Result<()> {
    match command {
        Command::Get => write_usage(root, config, out),
        Command::Update { bytes, messages } => {
            root.update(&UsageDelta::new(bytes, messages))?;
            info!(user = %config.user, bytes, messages, "applied usage delta");
            write_usage(root, config, out)
        }
        Command::Recalc => {
            match root.recalculate()? {
                Some(Usage { bytes, messages }) => {
                    info!(user = %config.user, bytes, messages, "recalculated quota usage");
                }
                None => {
                    info!(backend = root.backend_name(), "backend keeps no stored usage");
                }
            }
            write_usage(root, config, out)
        }
    }
}

pub fn write_usage<W: Write>(
    root: &mut QuotaRoot,
    config: &QuotaToolConfig,
    out: &mut W,
) -> Result<()> {
    let report = UsageReport {
        user: &config.user,
        backend: root.backend_name(),
        resources: root.usage()?,
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}
