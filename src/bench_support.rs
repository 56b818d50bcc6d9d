//! Fixtures shared by the workspace benches and end-to-end tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rand::Rng;
use tempfile::TempDir;

pub use mail_dict;
pub use mail_quota;
pub use tracing_subscriber;

use mail_quota::{BackendRegistry, MaildirUsageOracle, Quota, QuotaRoot, Usage, UsageDelta};

/// A `dict` quota setup for one user: a SQLite dictionary and a Maildir
/// tree inside a temporary directory.
pub struct QuotaFixture {
    pub user: String,
    pub registry: BackendRegistry,
    pub quota: Arc<Quota>,
    pub dict_uri: String,
    pub temp_dir: TempDir,
}

impl QuotaFixture {
    pub fn sqlite(user: &str) -> Result<Self> {
        let temp_dir = TempDir::new().context("creating fixture tempdir")?;
        let dict_uri = format!("sqlite:{}", temp_dir.path().join("quota.db").display());
        Ok(Self::build(user, dict_uri, temp_dir))
    }

    pub fn memory(user: &str) -> Result<Self> {
        let temp_dir = TempDir::new().context("creating fixture tempdir")?;
        let dict_uri = format!("memory:{}", random_user("store"));
        Ok(Self::build(user, dict_uri, temp_dir))
    }

    fn build(user: &str, dict_uri: String, temp_dir: TempDir) -> Self {
        let oracle = Arc::new(MaildirUsageOracle::new(temp_dir.path().join("mail")));
        Self {
            user: user.to_string(),
            registry: BackendRegistry::with_builtin_backends(),
            quota: Quota::new(user, oracle),
            dict_uri,
            temp_dir,
        }
    }

    pub fn mail_root(&self) -> PathBuf {
        self.temp_dir.path().join("mail")
    }

    /// Backend arguments relying on the ambient user.
    pub fn root_args(&self) -> String {
        format!(":{}", self.dict_uri)
    }

    pub fn open_root(&self) -> Result<QuotaRoot> {
        let root = self
            .registry
            .allocate("dict", Arc::clone(&self.quota))?
            .init(&self.root_args())?;
        Ok(root)
    }

    /// Opens a root for another user sharing the same dictionary.
    pub fn open_root_for(&self, user: &str) -> Result<QuotaRoot> {
        let root = self
            .registry
            .allocate("dict", Arc::clone(&self.quota))?
            .init(&format!("{user}:{}", self.dict_uri))?;
        Ok(root)
    }

    /// Delivers Maildir messages of the given sizes into the fixture user's
    /// inbox and returns the resulting on-disk usage.
    pub fn deliver(&self, sizes: &[u64]) -> Result<Usage> {
        write_maildir(&self.mail_root().join(&self.user), sizes)
    }
}

/// Writes one message file per size into `<dir>/new`, naming each with the
/// Maildir `S=` size field. Returns the usage the files add up to.
pub fn write_maildir(dir: &Path, sizes: &[u64]) -> Result<Usage> {
    let new_dir = dir.join("new");
    fs::create_dir_all(&new_dir)
        .with_context(|| format!("creating maildir {}", new_dir.display()))?;
    for dir_name in ["cur", "tmp"] {
        fs::create_dir_all(dir.join(dir_name))?;
    }

    let mut rng = rand::thread_rng();
    let mut usage = Usage::default();
    for size in sizes {
        let name = format!("{}.M{}P1.fixture,S={size}", rng.gen::<u32>(), rng.gen::<u32>());
        fs::write(new_dir.join(name), b"Subject: fixture\r\n\r\n")?;
        usage.bytes += size;
        usage.messages += 1;
    }
    Ok(usage)
}

pub fn random_user(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    format!("{}-{}", prefix, rng.gen::<u32>())
}

/// Random deliveries and expunges, as a mail session would produce them.
pub fn random_deltas(count: usize) -> Vec<UsageDelta> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let mut delta = UsageDelta::default();
            let size = rng.gen_range(512..=256 * 1024);
            if rng.gen_bool(0.8) {
                delta.message_added(size);
            } else {
                delta.message_expunged(size);
            }
            delta
        })
        .collect()
}
