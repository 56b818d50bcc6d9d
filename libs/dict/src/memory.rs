use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use dashmap::DashMap;
use tracing::debug;

use crate::error::DictError;
use crate::transaction::{DictOp, DictTransaction};
use crate::{increment_integer, scoped_owner, Dict, DictLookup, DictValueType};

pub const DEFAULT_MEMORY_STORE: &str = "default";

type EntryKey = (String, String);

static NAMED_STORES: OnceLock<DashMap<String, Arc<MemoryStore>>> = OnceLock::new();

/// In-process dictionary storage shared by every [`MemoryDict`] opened on it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<EntryKey, String>>,
    fail_next_commit: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns the process-wide store registered under `name`, creating it on
    /// first use. `memory:<name>` URIs resolve through this.
    pub fn named(name: &str) -> Arc<Self> {
        let stores = NAMED_STORES.get_or_init(DashMap::new);
        stores
            .entry(name.to_string())
            .or_insert_with(MemoryStore::new)
            .clone()
    }

    pub fn open(self: &Arc<Self>, value_type: DictValueType, username: &str) -> MemoryDict {
        MemoryDict {
            store: Arc::clone(self),
            username: username.to_string(),
            value_type,
        }
    }

    /// Reads a key as `username` would see it, bypassing any dict handle.
    pub fn get(&self, username: &str, key: &str) -> Result<Option<String>, DictError> {
        let owner = scoped_owner(key, username)?;
        let entries = self
            .entries
            .lock()
            .map_err(|_| DictError::ConnectionPoisoned)?;
        Ok(entries.get(&(owner.to_string(), key.to_string())).cloned())
    }

    /// Makes the next commit fail after its first operation has been staged.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    fn apply(&self, username: &str, ops: Vec<DictOp>) -> Result<(), DictError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| DictError::ConnectionPoisoned)?;
        let mut staged = entries.clone();

        for (index, op) in ops.into_iter().enumerate() {
            let owner = scoped_owner(op.key(), username)?.to_string();
            match op {
                DictOp::Set { key, value } => {
                    staged.insert((owner, key), value);
                }
                DictOp::Unset { key } => {
                    staged.remove(&(owner, key));
                }
                DictOp::AtomicInc { key, delta } => {
                    let slot = (owner, key);
                    if let Some(current) = staged.get_mut(&slot) {
                        *current = increment_integer(&slot.1, current, delta)?;
                    }
                }
            }

            if index == 0 && self.fail_next_commit.swap(false, Ordering::SeqCst) {
                return Err(DictError::CommitFailed("injected failure".into()));
            }
        }

        *entries = staged;
        Ok(())
    }
}

/// Dictionary handle over a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryDict {
    store: Arc<MemoryStore>,
    username: String,
    value_type: DictValueType,
}

impl MemoryDict {
    pub fn open(location: &str, value_type: DictValueType, username: &str) -> Self {
        let name = if location.is_empty() {
            DEFAULT_MEMORY_STORE
        } else {
            location
        };
        debug!(store = name, username, "opening memory dict");
        MemoryStore::named(name).open(value_type, username)
    }
}

impl Dict for MemoryDict {
    fn username(&self) -> &str {
        &self.username
    }

    fn value_type(&self) -> DictValueType {
        self.value_type
    }

    fn lookup(&mut self, key: &str) -> Result<DictLookup, DictError> {
        Ok(match self.store.get(&self.username, key)? {
            Some(value) => DictLookup::Found(value),
            None => DictLookup::Absent,
        })
    }

    fn commit(&mut self, txn: DictTransaction) -> Result<(), DictError> {
        if txn.is_empty() {
            return Ok(());
        }
        self.store.apply(&self.username, txn.into_ops())
    }

    fn close(self: Box<Self>) -> Result<(), DictError> {
        Ok(())
    }
}
