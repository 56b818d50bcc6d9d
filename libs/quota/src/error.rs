use anyhow::Error as AnyhowError;
use mail_dict::DictError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("{backend} quota: {reason}")]
    Config {
        backend: &'static str,
        reason: String,
    },
    #[error("{backend} quota: failed to open '{uri}' for user '{username}'")]
    Connect {
        backend: &'static str,
        uri: String,
        username: String,
        #[source]
        source: DictError,
    },
    #[error("{backend} quota: {operation} failed for user '{username}'")]
    Store {
        backend: &'static str,
        operation: &'static str,
        username: String,
        #[source]
        source: DictError,
    },
    #[error("usage recount failed for user '{username}'")]
    Oracle {
        username: String,
        #[source]
        source: AnyhowError,
    },
    #[error("unknown quota backend '{0}'")]
    UnknownBackend(String),
    #[error("{0} quota root is not initialized")]
    NotReady(&'static str),
}

impl QuotaError {
    pub fn username(&self) -> Option<&str> {
        match self {
            QuotaError::Connect { username, .. } => Some(username.as_str()),
            QuotaError::Store { username, .. } => Some(username.as_str()),
            QuotaError::Oracle { username, .. } => Some(username.as_str()),
            QuotaError::Config { .. } | QuotaError::UnknownBackend(_) | QuotaError::NotReady(_) => {
                None
            }
        }
    }

    pub fn is_store_error(&self) -> bool {
        matches!(self, QuotaError::Store { .. })
    }
}
