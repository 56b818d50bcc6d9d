use std::fmt;
use std::mem;

use mail_dict::{Dict, DictError, DictLookup, DictRegistry, DictValueType};
use tracing::{debug, error, info, warn};

use crate::backend::QuotaBackend;
use crate::counter;
use crate::error::QuotaError;
use crate::quota::Quota;
use crate::resource::{ResourceName, ResourceValue};
use crate::usage::{Usage, UsageDelta};

pub const DICT_QUOTA_BACKEND: &str = "dict";

/// Byte counter, private to the dict's user.
pub const DICT_QUOTA_CURRENT_BYTES_PATH: &str = "priv/quota/storage";
/// Message counter, private to the dict's user.
pub const DICT_QUOTA_CURRENT_COUNT_PATH: &str = "priv/quota/messages";

const DICT_QUOTA_RESOURCES: &[ResourceName] = &[ResourceName::StorageBytes, ResourceName::Messages];

/// Splits `[user]:<dict uri>` backend arguments.
pub fn parse_args(args: &str) -> Result<(&str, &str), QuotaError> {
    args.split_once(':').ok_or_else(|| QuotaError::Config {
        backend: DICT_QUOTA_BACKEND,
        reason: "URI missing from parameters".to_string(),
    })
}

enum DictRootState {
    Unopened,
    Open(OpenDict),
    Closed,
}

struct OpenDict {
    dict: Box<dyn Dict>,
    username: String,
    uri: String,
}

/// Quota backend keeping usage counters in a key/value dictionary.
///
/// Counters are only ever overwritten by a recount or moved by atomic
/// increments. A missing counter is unknown, never zero: reading it recounts
/// the user's mail and stores both counters, so reading one resource also
/// refreshes the other.
pub struct DictQuotaBackend {
    dicts: DictRegistry,
    state: DictRootState,
}

impl fmt::Debug for DictQuotaBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            DictRootState::Unopened => "unopened",
            DictRootState::Open(_) => "open",
            DictRootState::Closed => "closed",
        };
        f.debug_struct("DictQuotaBackend")
            .field("state", &state)
            .field("username", &self.username())
            .finish()
    }
}

impl DictQuotaBackend {
    pub fn new(dicts: DictRegistry) -> Self {
        Self {
            dicts,
            state: DictRootState::Unopened,
        }
    }

    /// User the counters are scoped to, once initialized.
    pub fn username(&self) -> Option<&str> {
        match &self.state {
            DictRootState::Open(open) => Some(open.username.as_str()),
            DictRootState::Unopened | DictRootState::Closed => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, DictRootState::Open(_))
    }

    fn open_dict(&mut self) -> Result<&mut OpenDict, QuotaError> {
        match &mut self.state {
            DictRootState::Open(open) => Ok(open),
            DictRootState::Unopened | DictRootState::Closed => {
                Err(QuotaError::NotReady(DICT_QUOTA_BACKEND))
            }
        }
    }
}

impl OpenDict {
    fn store_error(&self, operation: &'static str, source: DictError) -> QuotaError {
        error!(
            username = %self.username,
            uri = %self.uri,
            operation,
            error = %source,
            "dict quota: store operation failed"
        );
        QuotaError::Store {
            backend: DICT_QUOTA_BACKEND,
            operation,
            username: self.username.clone(),
            source,
        }
    }

    /// Returns the stored counter, or `None` when it is absent or untrusted.
    fn lookup_counter(&mut self, key: &str) -> Result<Option<u64>, QuotaError> {
        match self.dict.lookup(key) {
            Ok(DictLookup::Found(raw)) => {
                let value = counter::decode(&raw);
                if value.is_none() {
                    warn!(
                        username = %self.username,
                        key,
                        value = %raw,
                        "dict quota: ignoring unparsable counter"
                    );
                }
                Ok(value)
            }
            Ok(DictLookup::Absent) => Ok(None),
            Err(source) => Err(self.store_error("lookup", source)),
        }
    }

    /// Recounts usage and overwrites both counters in one transaction.
    fn recount(&mut self, quota: &Quota) -> Result<Usage, QuotaError> {
        let usage = quota.count(&self.username)?;

        let mut txn = self.dict.transaction_begin();
        txn.set(DICT_QUOTA_CURRENT_BYTES_PATH, counter::encode(usage.bytes));
        txn.set(DICT_QUOTA_CURRENT_COUNT_PATH, counter::encode(usage.messages));
        self.dict
            .commit(txn)
            .map_err(|source| self.store_error("counter seed", source))?;

        Ok(usage)
    }
}

impl QuotaBackend for DictQuotaBackend {
    fn name(&self) -> &'static str {
        DICT_QUOTA_BACKEND
    }

    fn init(&mut self, quota: &Quota, args: &str) -> Result<(), QuotaError> {
        if !matches!(self.state, DictRootState::Unopened) {
            return Err(QuotaError::Config {
                backend: DICT_QUOTA_BACKEND,
                reason: "root already initialized".to_string(),
            });
        }

        let (user_override, uri) = match parse_args(args) {
            Ok(parts) => parts,
            Err(err) => {
                error!(error = %err, "dict quota: invalid backend arguments");
                return Err(err);
            }
        };
        let username = if user_override.is_empty() {
            quota.user()
        } else {
            user_override
        };
        if username.is_empty() {
            return Err(QuotaError::Config {
                backend: DICT_QUOTA_BACKEND,
                reason: "no user given and no ambient user set".to_string(),
            });
        }

        debug!(username, uri, "dict quota: opening dict");

        let dict = self
            .dicts
            .open(uri, DictValueType::String, username)
            .map_err(|source| {
                error!(username, uri, error = %source, "dict quota: failed to open dict");
                QuotaError::Connect {
                    backend: DICT_QUOTA_BACKEND,
                    uri: uri.to_string(),
                    username: username.to_string(),
                    source,
                }
            })?;

        self.state = DictRootState::Open(OpenDict {
            dict,
            username: username.to_string(),
            uri: uri.to_string(),
        });
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), QuotaError> {
        match mem::replace(&mut self.state, DictRootState::Closed) {
            DictRootState::Open(open) => {
                let OpenDict {
                    dict,
                    username,
                    uri,
                } = open;
                dict.close().map_err(|source| {
                    error!(%username, %uri, error = %source, "dict quota: failed to close dict");
                    QuotaError::Store {
                        backend: DICT_QUOTA_BACKEND,
                        operation: "close",
                        username,
                        source,
                    }
                })
            }
            DictRootState::Unopened | DictRootState::Closed => Ok(()),
        }
    }

    fn resources(&self) -> &'static [ResourceName] {
        DICT_QUOTA_RESOURCES
    }

    fn get_resource(
        &mut self,
        quota: &Quota,
        name: ResourceName,
    ) -> Result<ResourceValue, QuotaError> {
        let want_bytes = match name {
            ResourceName::StorageBytes => true,
            ResourceName::Messages => false,
            ResourceName::StorageKilobytes => return Ok(ResourceValue::NotHandled),
        };

        let open = self.open_dict()?;
        let key = if want_bytes {
            DICT_QUOTA_CURRENT_BYTES_PATH
        } else {
            DICT_QUOTA_CURRENT_COUNT_PATH
        };

        if let Some(value) = open.lookup_counter(key)? {
            return Ok(ResourceValue::Value(value));
        }

        debug!(
            username = %open.username,
            resource = %name,
            "dict quota: counter missing, recounting"
        );
        let usage = open.recount(quota)?;
        Ok(ResourceValue::Value(if want_bytes {
            usage.bytes
        } else {
            usage.messages
        }))
    }

    fn update(&mut self, delta: &UsageDelta) -> Result<(), QuotaError> {
        let open = self.open_dict()?;

        let mut txn = open.dict.transaction_begin();
        if delta.bytes != 0 {
            txn.atomic_inc(DICT_QUOTA_CURRENT_BYTES_PATH, delta.bytes);
        }
        if delta.messages != 0 {
            txn.atomic_inc(DICT_QUOTA_CURRENT_COUNT_PATH, delta.messages);
        }

        open.dict
            .commit(txn)
            .map_err(|source| open.store_error("update", source))
    }

    fn recalculate(&mut self, quota: &Quota) -> Result<Option<Usage>, QuotaError> {
        let open = self.open_dict()?;
        let usage = open.recount(quota)?;
        info!(
            username = %open.username,
            bytes = usage.bytes,
            messages = usage.messages,
            "dict quota: recalculated usage"
        );
        Ok(Some(usage))
    }
}
