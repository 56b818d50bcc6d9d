use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use mail_dict::DictRegistry;

use crate::backend::QuotaBackend;
use crate::dict_backend::{DictQuotaBackend, DICT_QUOTA_BACKEND};
use crate::error::QuotaError;
use crate::quota::Quota;
use crate::root::AllocatedRoot;

/// Creates a new, uninitialized backend instance.
pub type BackendFactory = Arc<dyn Fn() -> Box<dyn QuotaBackend> + Send + Sync>;

/// Maps backend names to factories.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.backends())
            .finish()
    }
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_backends() -> Self {
        Self::with_dict_drivers(DictRegistry::with_builtin_drivers())
    }

    /// Builtin backends, with the `dict` backend opening URIs through `dicts`.
    pub fn with_dict_drivers(dicts: DictRegistry) -> Self {
        let mut registry = Self::new();
        registry.register(DICT_QUOTA_BACKEND, move || {
            Box::new(DictQuotaBackend::new(dicts.clone())) as Box<dyn QuotaBackend>
        });
        registry
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn QuotaBackend> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    pub fn backends(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Allocates a root for backend `name`. Performs no I/O.
    pub fn allocate(&self, name: &str, quota: Arc<Quota>) -> Result<AllocatedRoot, QuotaError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| QuotaError::UnknownBackend(name.to_string()))?;
        Ok(AllocatedRoot::new(factory(), quota))
    }
}
