use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::debug;
use walkdir::WalkDir;

use crate::usage::Usage;

/// Computes an owner's authoritative usage by enumerating their mail.
///
/// Implementations may be slow; callers must not hold locks across a call.
pub trait UsageOracle: Send + Sync {
    fn compute_usage(&self, username: &str) -> Result<Usage>;
}

impl<F> UsageOracle for F
where
    F: Fn(&str) -> Result<Usage> + Send + Sync,
{
    fn compute_usage(&self, username: &str) -> Result<Usage> {
        self(username)
    }
}

/// Counts messages stored in Maildir folders.
///
/// The location is either a directory holding one mail directory per user,
/// or a path template where `%u` is replaced by the username.
#[derive(Debug, Clone)]
pub struct MaildirUsageOracle {
    location: PathBuf,
}

impl MaildirUsageOracle {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
        }
    }

    /// Resolves the mail directory of `username`.
    ///
    /// Usernames that could address a directory outside their own are
    /// rejected.
    pub fn mail_dir(&self, username: &str) -> Result<PathBuf> {
        if username.is_empty()
            || username == "."
            || username.contains("..")
            || username.contains(['/', '\\', '\0'])
        {
            bail!("username {username:?} cannot name a mail directory");
        }

        let location = self.location.to_string_lossy();
        if location.contains("%u") {
            Ok(PathBuf::from(location.replace("%u", username)))
        } else {
            Ok(self.location.join(username))
        }
    }
}

impl UsageOracle for MaildirUsageOracle {
    fn compute_usage(&self, username: &str) -> Result<Usage> {
        let dir = self.mail_dir(username)?;
        if !dir.exists() {
            debug!(username, dir = %dir.display(), "mail directory missing, usage is zero");
            return Ok(Usage::default());
        }
        if !dir.is_dir() {
            bail!("{} exists but is not a directory", dir.display());
        }

        let mut usage = Usage::default();
        for entry in WalkDir::new(&dir) {
            let entry =
                entry.with_context(|| format!("failed to scan mail directory {}", dir.display()))?;
            if !entry.file_type().is_file() || !in_message_dir(entry.path()) {
                continue;
            }

            let size = match maildir_size(entry.file_name()) {
                Some(size) => size,
                None => entry
                    .metadata()
                    .with_context(|| format!("failed to stat {}", entry.path().display()))?
                    .len(),
            };
            usage.bytes = usage.bytes.saturating_add(size);
            usage.messages += 1;
        }

        debug!(
            username,
            bytes = usage.bytes,
            messages = usage.messages,
            "counted maildir usage"
        );
        Ok(usage)
    }
}

fn in_message_dir(path: &Path) -> bool {
    path.parent()
        .and_then(Path::file_name)
        .map(|name| name == "cur" || name == "new")
        .unwrap_or(false)
}

/// Reads the `S=<size>` field of a Maildir filename.
fn maildir_size(file_name: &OsStr) -> Option<u64> {
    let name = file_name.to_str()?;
    let base = name.split(':').next()?;
    base.split(',')
        .skip(1)
        .find_map(|field| field.strip_prefix("S="))
        .and_then(|size| size.parse().ok())
}
