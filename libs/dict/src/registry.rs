use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::DictError;
use crate::memory::MemoryDict;
use crate::sqlite::SqliteDict;
use crate::{Dict, DictValueType};

/// Opens a dictionary for `(location, value type, username)`.
pub type DictOpener =
    Arc<dyn Fn(&str, DictValueType, &str) -> Result<Box<dyn Dict>, DictError> + Send + Sync>;

/// Maps URI driver prefixes to openers.
#[derive(Clone, Default)]
pub struct DictRegistry {
    drivers: HashMap<String, DictOpener>,
}

impl fmt::Debug for DictRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut drivers: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        drivers.sort_unstable();
        f.debug_struct("DictRegistry")
            .field("drivers", &drivers)
            .finish()
    }
}

impl DictRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `memory` and `sqlite` drivers.
    pub fn with_builtin_drivers() -> Self {
        let mut registry = Self::new();
        registry.register("memory", |location, value_type, username| {
            Ok(Box::new(MemoryDict::open(location, value_type, username)) as Box<dyn Dict>)
        });
        registry.register("sqlite", |location, value_type, username| {
            Ok(Box::new(SqliteDict::open(location, value_type, username)?) as Box<dyn Dict>)
        });
        registry
    }

    pub fn register<F>(&mut self, driver: &str, opener: F)
    where
        F: Fn(&str, DictValueType, &str) -> Result<Box<dyn Dict>, DictError> + Send + Sync + 'static,
    {
        self.drivers.insert(driver.to_string(), Arc::new(opener));
    }

    pub fn drivers(&self) -> Vec<String> {
        let mut drivers: Vec<String> = self.drivers.keys().cloned().collect();
        drivers.sort_unstable();
        drivers
    }

    /// Opens `<driver>:<location>` for `username`.
    pub fn open(
        &self,
        uri: &str,
        value_type: DictValueType,
        username: &str,
    ) -> Result<Box<dyn Dict>, DictError> {
        let (driver, location) = uri
            .split_once(':')
            .ok_or_else(|| DictError::InvalidUri(uri.to_string()))?;
        let opener = self
            .drivers
            .get(driver)
            .ok_or_else(|| DictError::UnknownDriver(driver.to_string()))?;
        opener(location, value_type, username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DictLookup;

    #[test]
    fn test_open_memory_driver() {
        let registry = DictRegistry::with_builtin_drivers();
        let mut dict = registry
            .open("memory:registry-test", DictValueType::String, "alice")
            .unwrap();
        assert_eq!(dict.username(), "alice");
        assert_eq!(dict.value_type(), DictValueType::String);
        assert_eq!(dict.lookup("priv/quota/storage").unwrap(), DictLookup::Absent);
    }

    #[test]
    fn test_uri_without_driver_rejected() {
        let registry = DictRegistry::with_builtin_drivers();
        assert!(matches!(
            registry.open("no-driver-here", DictValueType::String, "alice"),
            Err(DictError::InvalidUri(_))
        ));
    }

    #[test]
    fn test_unknown_driver_rejected() {
        let registry = DictRegistry::with_builtin_drivers();
        assert!(matches!(
            registry.open("redis:127.0.0.1:6379", DictValueType::String, "alice"),
            Err(DictError::UnknownDriver(driver)) if driver == "redis"
        ));
    }

    #[test]
    fn test_builtin_driver_names() {
        assert_eq!(
            DictRegistry::with_builtin_drivers().drivers(),
            vec!["memory".to_string(), "sqlite".to_string()]
        );
    }
}
