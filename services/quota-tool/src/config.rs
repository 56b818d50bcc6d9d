use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use mail_quota::{QuotaLimits, QuotaRootSettings};

#[derive(Debug, Clone)]
pub struct QuotaToolConfig {
    pub user: String,
    pub quota_root: String,
    pub mail_root: PathBuf,
    pub storage_limit_bytes: Option<u64>,
    pub message_limit: Option<u64>,
    pub log_level: String,
}

impl Default for QuotaToolConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            quota_root: "dict::memory:default".to_string(),
            mail_root: PathBuf::from("mail"),
            storage_limit_bytes: None,
            message_limit: None,
            log_level: "info".to_string(),
        }
    }
}

impl QuotaToolConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| env::var(name).ok())
    }

    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(user) = var("USER") {
            cfg.user = user;
        }
        if let Some(root) = var("QUOTA_ROOT") {
            cfg.quota_root = root;
        }
        if let Some(dir) = var("MAIL_ROOT") {
            cfg.mail_root = PathBuf::from(dir);
        }
        if let Some(limit) = var("QUOTA_STORAGE_LIMIT_BYTES") {
            cfg.storage_limit_bytes = Some(
                limit
                    .parse()
                    .context("QUOTA_STORAGE_LIMIT_BYTES must be a positive integer")?,
            );
        }
        if let Some(limit) = var("QUOTA_MESSAGE_LIMIT") {
            cfg.message_limit = Some(
                limit
                    .parse()
                    .context("QUOTA_MESSAGE_LIMIT must be a positive integer")?,
            );
        }
        if let Some(level) = var("LOG_LEVEL") {
            cfg.log_level = level;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.user.trim().is_empty() {
            anyhow::bail!("USER must be set to the mail user to account for");
        }
        self.root_settings()?;

        if self.storage_limit_bytes == Some(0) {
            anyhow::bail!("QUOTA_STORAGE_LIMIT_BYTES must be greater than zero");
        }
        if self.message_limit == Some(0) {
            anyhow::bail!("QUOTA_MESSAGE_LIMIT must be greater than zero");
        }

        Ok(())
    }

    pub fn root_settings(&self) -> Result<QuotaRootSettings> {
        QuotaRootSettings::parse(&self.quota_root)
            .with_context(|| format!("QUOTA_ROOT is invalid: {}", self.quota_root))
    }

    pub fn limits(&self) -> QuotaLimits {
        QuotaLimits {
            storage_bytes: self.storage_limit_bytes,
            messages: self.message_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<QuotaToolConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        QuotaToolConfig::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_with_user() {
        let config = config_from(&[("USER", "alice")]).unwrap();
        assert_eq!(config.user, "alice");
        assert_eq!(config.quota_root, "dict::memory:default");
        assert_eq!(config.limits(), QuotaLimits::default());
        assert_eq!(config.root_settings().unwrap().backend, "dict");
    }

    #[test]
    fn test_full_environment() {
        let config = config_from(&[
            ("USER", "alice"),
            ("QUOTA_ROOT", "dict:bob:sqlite:/var/lib/mail/quota.db"),
            ("MAIL_ROOT", "/srv/mail/%u/Maildir"),
            ("QUOTA_STORAGE_LIMIT_BYTES", "1048576"),
            ("QUOTA_MESSAGE_LIMIT", "1000"),
            ("LOG_LEVEL", "debug"),
        ])
        .unwrap();

        assert_eq!(
            config.root_settings().unwrap().args,
            "bob:sqlite:/var/lib/mail/quota.db"
        );
        assert_eq!(config.mail_root, PathBuf::from("/srv/mail/%u/Maildir"));
        assert_eq!(
            config.limits(),
            QuotaLimits {
                storage_bytes: Some(1_048_576),
                messages: Some(1000),
            }
        );
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_config_validation() {
        // missing user
        assert!(config_from(&[]).is_err());

        // malformed root
        assert!(config_from(&[("USER", "alice"), ("QUOTA_ROOT", ":memory:x")]).is_err());

        // zero and non-numeric limits
        assert!(config_from(&[("USER", "alice"), ("QUOTA_MESSAGE_LIMIT", "0")]).is_err());
        assert!(
            config_from(&[("USER", "alice"), ("QUOTA_STORAGE_LIMIT_BYTES", "lots")]).is_err()
        );
    }
}
