use std::fmt;
use std::sync::Arc;

use tracing::error;

use crate::error::QuotaError;
use crate::oracle::UsageOracle;
use crate::usage::Usage;

/// State shared by every quota root of one mail user.
pub struct Quota {
    user: String,
    oracle: Arc<dyn UsageOracle>,
}

impl fmt::Debug for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Quota").field("user", &self.user).finish()
    }
}

impl Quota {
    pub fn new(user: impl Into<String>, oracle: Arc<dyn UsageOracle>) -> Arc<Self> {
        Arc::new(Self {
            user: user.into(),
            oracle,
        })
    }

    /// Identity of the mail user this process runs for.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Recounts `username`'s usage from the mail storage.
    pub fn count(&self, username: &str) -> Result<Usage, QuotaError> {
        self.oracle.compute_usage(username).map_err(|source| {
            error!(username, error = ?source, "failed to count quota usage");
            QuotaError::Oracle {
                username: username.to_string(),
                source,
            }
        })
    }
}
