//! Key/value dictionary client used by the mail quota plugins.
//!
//! A dictionary is opened from a `<driver>:<location>` URI for one username.
//! Keys live in one of two namespaces: `priv/` keys are private to the
//! username the dictionary was opened for, `shared/` keys are visible to
//! every username of the same store. Writes go through transactions that are
//! committed all-or-nothing.

pub mod error;
pub mod memory;
pub mod registry;
pub mod schema;
pub mod sqlite;
pub mod transaction;

pub use error::DictError;
pub use memory::{MemoryDict, MemoryStore};
pub use registry::{DictOpener, DictRegistry};
pub use sqlite::SqliteDict;
pub use transaction::{DictOp, DictTransaction};

pub const DICT_PATH_PRIVATE: &str = "priv/";
pub const DICT_PATH_SHARED: &str = "shared/";

/// Value type a dictionary is declared to hold.
///
/// Values are stored as text; atomic increments parse them as integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictValueType {
    String,
}

/// Outcome of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictLookup {
    Found(String),
    Absent,
}

/// An open dictionary handle scoped to one username.
///
/// Handles are not shared between threads; every caller opens its own.
pub trait Dict: Send {
    fn username(&self) -> &str;

    fn value_type(&self) -> DictValueType;

    fn lookup(&mut self, key: &str) -> Result<DictLookup, DictError>;

    fn transaction_begin(&self) -> DictTransaction {
        DictTransaction::new()
    }

    /// Applies every queued operation, or none of them.
    fn commit(&mut self, txn: DictTransaction) -> Result<(), DictError>;

    fn close(self: Box<Self>) -> Result<(), DictError>;
}

/// Storage scope a key resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope {
    Private,
    Shared,
}

/// Resolves the username a key is stored under.
///
/// Shared keys are stored under the empty username.
pub fn scoped_owner<'a>(key: &str, username: &'a str) -> Result<&'a str, DictError> {
    match key_scope(key)? {
        KeyScope::Private => Ok(username),
        KeyScope::Shared => Ok(""),
    }
}

pub fn key_scope(key: &str) -> Result<KeyScope, DictError> {
    if key.len() > DICT_PATH_PRIVATE.len() && key.starts_with(DICT_PATH_PRIVATE) {
        Ok(KeyScope::Private)
    } else if key.len() > DICT_PATH_SHARED.len() && key.starts_with(DICT_PATH_SHARED) {
        Ok(KeyScope::Shared)
    } else {
        Err(DictError::InvalidKey(key.to_string()))
    }
}

/// Adds `delta` to the integer stored as `current` and returns the new text.
///
/// Stored integers may span `i64::MIN..=u64::MAX`, so full-width unsigned
/// counters stay incrementable. A result below zero is stored as is; a
/// result outside that range fails with [`DictError::Overflow`].
pub(crate) fn increment_integer(key: &str, current: &str, delta: i64) -> Result<String, DictError> {
    let value = current
        .trim()
        .parse::<i128>()
        .ok()
        .filter(|value| integer_in_range(*value))
        .ok_or_else(|| DictError::InvalidValue {
            key: key.to_string(),
            value: current.to_string(),
        })?;

    let next = value + i128::from(delta);
    if !integer_in_range(next) {
        return Err(DictError::Overflow {
            key: key.to_string(),
            value: current.trim().to_string(),
            delta,
        });
    }
    Ok(next.to_string())
}

fn integer_in_range(value: i128) -> bool {
    (i128::from(i64::MIN)..=i128::from(u64::MAX)).contains(&value)
}
