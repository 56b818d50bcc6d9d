use std::io;

use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DictError {
    #[error("dict URI '{0}' is missing the driver prefix")]
    InvalidUri(String),
    #[error("unknown dict driver '{0}'")]
    UnknownDriver(String),
    #[error("invalid dict key '{0}': must start with priv/ or shared/")]
    InvalidKey(String),
    #[error("value '{value}' of key '{key}' is not an integer")]
    InvalidValue { key: String, value: String },
    #[error("incrementing key '{key}' from {value} by {delta} overflows")]
    Overflow {
        key: String,
        value: String,
        delta: i64,
    },
    #[error("failed to open dict '{uri}'")]
    Connect {
        uri: String,
        #[source]
        source: AnyhowError,
    },
    #[error("transaction commit failed: {0}")]
    CommitFailed(String),
    #[error("dict connection poisoned")]
    ConnectionPoisoned,
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
