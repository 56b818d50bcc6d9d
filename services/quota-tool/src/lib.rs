pub mod command;
pub mod config;

pub use command::{open_root, run, write_usage, Command, UsageReport};
pub use config::QuotaToolConfig;
