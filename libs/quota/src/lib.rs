//! Mail quota accounting.
//!
//! A quota root binds one accounting backend to a mail user. Backends are
//! created by name through a [`BackendRegistry`], initialized once with their
//! argument string, and then answer resource reads and apply usage deltas.
//!
//! The `dict` backend keeps byte and message counters in a key/value
//! dictionary (see the `mail-dict` crate). Updates are atomic increments, so
//! concurrent deliveries for the same user compose. Missing counters are
//! rebuilt lazily from the mail storage through a [`UsageOracle`].

pub mod backend;
pub mod counter;
pub mod dict_backend;
pub mod error;
pub mod oracle;
pub mod quota;
pub mod registry;
pub mod resource;
pub mod root;
pub mod usage;

pub use backend::QuotaBackend;
pub use dict_backend::{
    DictQuotaBackend, DICT_QUOTA_BACKEND, DICT_QUOTA_CURRENT_BYTES_PATH,
    DICT_QUOTA_CURRENT_COUNT_PATH,
};
pub use error::QuotaError;
pub use oracle::{MaildirUsageOracle, UsageOracle};
pub use quota::Quota;
pub use registry::{BackendFactory, BackendRegistry};
pub use resource::{
    QuotaLimits, ResourceName, ResourceUsage, ResourceValue, UnknownResource,
    QUOTA_NAME_MESSAGES, QUOTA_NAME_STORAGE_BYTES, QUOTA_NAME_STORAGE_KILOBYTES,
};
pub use root::{AllocatedRoot, QuotaRoot, QuotaRootSettings};
pub use usage::{Usage, UsageDelta};
