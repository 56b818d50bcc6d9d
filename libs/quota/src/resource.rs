use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const QUOTA_NAME_STORAGE_BYTES: &str = "STORAGE_BYTES";
pub const QUOTA_NAME_STORAGE_KILOBYTES: &str = "STORAGE";
pub const QUOTA_NAME_MESSAGES: &str = "MESSAGE";

/// Quantities a quota backend can account for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceName {
    #[serde(rename = "STORAGE_BYTES")]
    StorageBytes,
    #[serde(rename = "STORAGE")]
    StorageKilobytes,
    #[serde(rename = "MESSAGE")]
    Messages,
}

impl ResourceName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceName::StorageBytes => QUOTA_NAME_STORAGE_BYTES,
            ResourceName::StorageKilobytes => QUOTA_NAME_STORAGE_KILOBYTES,
            ResourceName::Messages => QUOTA_NAME_MESSAGES,
        }
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownResource(pub String);

impl fmt::Display for UnknownResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown quota resource '{}'", self.0)
    }
}

impl std::error::Error for UnknownResource {}

impl FromStr for ResourceName {
    type Err = UnknownResource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            QUOTA_NAME_STORAGE_BYTES => Ok(ResourceName::StorageBytes),
            QUOTA_NAME_STORAGE_KILOBYTES => Ok(ResourceName::StorageKilobytes),
            QUOTA_NAME_MESSAGES => Ok(ResourceName::Messages),
            other => Err(UnknownResource(other.to_string())),
        }
    }
}

/// Answer of a backend to a resource read.
///
/// `NotHandled` means the backend does not track the resource, so the caller
/// may ask another backend. It is never the same as a zero value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceValue {
    NotHandled,
    Value(u64),
}

impl ResourceValue {
    pub fn value(self) -> Option<u64> {
        match self {
            ResourceValue::Value(value) => Some(value),
            ResourceValue::NotHandled => None,
        }
    }

    pub fn is_handled(self) -> bool {
        matches!(self, ResourceValue::Value(_))
    }
}

/// Limits configured for a quota root. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaLimits {
    pub storage_bytes: Option<u64>,
    pub messages: Option<u64>,
}

impl QuotaLimits {
    pub fn limit_for(&self, name: ResourceName) -> Option<u64> {
        match name {
            ResourceName::StorageBytes => self.storage_bytes,
            ResourceName::StorageKilobytes => self.storage_bytes.map(|bytes| bytes / 1024),
            ResourceName::Messages => self.messages,
        }
    }
}

/// Current value and configured limit of one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub name: ResourceName,
    pub value: u64,
    pub limit: Option<u64>,
}
