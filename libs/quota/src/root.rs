use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::backend::QuotaBackend;
use crate::error::QuotaError;
use crate::quota::Quota;
use crate::resource::{QuotaLimits, ResourceName, ResourceUsage, ResourceValue};
use crate::usage::{Usage, UsageDelta};

/// Parsed `<backend>:<backend args>` root setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaRootSettings {
    pub backend: String,
    pub args: String,
}

impl QuotaRootSettings {
    /// Parses e.g. `dict::sqlite:/var/lib/mail/quota.db`. A setting without
    /// `:` names a backend that takes no arguments.
    pub fn parse(value: &str) -> Result<Self, QuotaError> {
        let (backend, args) = value.split_once(':').unwrap_or((value, ""));
        if backend.trim().is_empty() {
            return Err(QuotaError::UnknownBackend(backend.to_string()));
        }
        Ok(Self {
            backend: backend.trim().to_string(),
            args: args.to_string(),
        })
    }
}

/// A quota root whose backend has been created but not initialized.
pub struct AllocatedRoot {
    backend: Box<dyn QuotaBackend>,
    quota: Arc<Quota>,
    limits: QuotaLimits,
}

impl fmt::Debug for AllocatedRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocatedRoot")
            .field("backend", &self.backend.name())
            .field("quota", &self.quota)
            .field("limits", &self.limits)
            .finish()
    }
}

impl AllocatedRoot {
    pub(crate) fn new(backend: Box<dyn QuotaBackend>, quota: Arc<Quota>) -> Self {
        Self {
            backend,
            quota,
            limits: QuotaLimits::default(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn with_limits(mut self, limits: QuotaLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Initializes the backend. On failure the backend is dropped without
    /// being deinitialized and no root exists.
    pub fn init(mut self, args: &str) -> Result<QuotaRoot, QuotaError> {
        if let Err(err) = self.backend.init(&self.quota, args) {
            error!(
                backend = self.backend.name(),
                user = self.quota.user(),
                error = %err,
                "quota root initialization failed"
            );
            return Err(err);
        }

        Ok(QuotaRoot {
            backend: self.backend,
            quota: self.quota,
            limits: self.limits,
            deinitialized: false,
        })
    }
}

/// An initialized quota root.
///
/// The backend is deinitialized exactly once: by [`QuotaRoot::deinit`], or
/// when the root is dropped.
pub struct QuotaRoot {
    backend: Box<dyn QuotaBackend>,
    quota: Arc<Quota>,
    limits: QuotaLimits,
    deinitialized: bool,
}

impl fmt::Debug for QuotaRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuotaRoot")
            .field("backend", &self.backend.name())
            .field("quota", &self.quota)
            .field("limits", &self.limits)
            .finish()
    }
}

impl QuotaRoot {
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn quota(&self) -> &Arc<Quota> {
        &self.quota
    }

    pub fn limits(&self) -> QuotaLimits {
        self.limits
    }

    pub fn resources(&self) -> &'static [ResourceName] {
        self.backend.resources()
    }

    /// Reads a resource by its protocol name. Names no backend knows are
    /// not handled.
    pub fn get_resource(&mut self, name: &str) -> Result<ResourceValue, QuotaError> {
        match name.parse::<ResourceName>() {
            Ok(name) => self.get(name),
            Err(err) => {
                debug!(backend = self.backend.name(), error = %err, "resource not handled");
                Ok(ResourceValue::NotHandled)
            }
        }
    }

    /// Reads a resource. Storage in kilobytes is derived from the byte
    /// counter when the backend does not serve it directly.
    pub fn get(&mut self, name: ResourceName) -> Result<ResourceValue, QuotaError> {
        let value = self.backend.get_resource(&self.quota, name)?;
        if name != ResourceName::StorageKilobytes || value.is_handled() {
            return Ok(value);
        }

        Ok(
            match self
                .backend
                .get_resource(&self.quota, ResourceName::StorageBytes)?
            {
                ResourceValue::Value(bytes) => ResourceValue::Value(bytes / 1024),
                ResourceValue::NotHandled => ResourceValue::NotHandled,
            },
        )
    }

    /// Current value and limit of every resource the backend serves.
    pub fn usage(&mut self) -> Result<Vec<ResourceUsage>, QuotaError> {
        let mut usage = Vec::new();
        for &name in self.backend.resources() {
            if let ResourceValue::Value(value) = self.get(name)? {
                usage.push(ResourceUsage {
                    name,
                    value,
                    limit: self.limits.limit_for(name),
                });
            }
        }
        Ok(usage)
    }

    pub fn update(&mut self, delta: &UsageDelta) -> Result<(), QuotaError> {
        self.backend.update(delta)
    }

    pub fn recalculate(&mut self) -> Result<Option<Usage>, QuotaError> {
        self.backend.recalculate(&self.quota)
    }

    pub fn deinit(mut self) -> Result<(), QuotaError> {
        self.deinitialized = true;
        self.backend.deinit()
    }
}

impl Drop for QuotaRoot {
    fn drop(&mut self) {
        if self.deinitialized {
            return;
        }
        if let Err(err) = self.backend.deinit() {
            warn!(
                backend = self.backend.name(),
                user = self.quota.user(),
                error = %err,
                "failed to deinitialize dropped quota root"
            );
        }
    }
}
