use crate::error::QuotaError;
use crate::quota::Quota;
use crate::resource::{ResourceName, ResourceValue};
use crate::usage::{Usage, UsageDelta};

/// An accounting strategy behind a quota root.
///
/// A freshly allocated backend holds no resources and performs no I/O until
/// [`QuotaBackend::init`]. Roots drive the lifecycle: `init` is called once,
/// the read/update operations only after it succeeded, and `deinit` once at
/// the end. A backend whose `init` failed is dropped without `deinit`.
pub trait QuotaBackend: Send {
    /// Backend identifier used in root settings, e.g. `dict`.
    fn name(&self) -> &'static str;

    /// Parses backend arguments and opens external connections.
    fn init(&mut self, quota: &Quota, args: &str) -> Result<(), QuotaError>;

    /// Releases everything `init` acquired.
    fn deinit(&mut self) -> Result<(), QuotaError>;

    /// Resources this backend can serve. Pure, no I/O.
    fn resources(&self) -> &'static [ResourceName];

    fn get_resource(
        &mut self,
        quota: &Quota,
        name: ResourceName,
    ) -> Result<ResourceValue, QuotaError>;

    /// Applies `delta` to the persisted usage, all-or-nothing.
    fn update(&mut self, delta: &UsageDelta) -> Result<(), QuotaError>;

    /// Rebuilds persisted usage from the mail storage. Backends without
    /// persisted usage return `Ok(None)`.
    fn recalculate(&mut self, _quota: &Quota) -> Result<Option<Usage>, QuotaError> {
        Ok(None)
    }
}
