//! Resource instance contract.

use crate::entity::InstanceId;
use crate::error::UpdateError;

/// State every resource instance carries: identity, the total flag and the
/// failure captured by the last refresh.
#[derive(Debug, Clone, Default)]
pub struct InstanceCore {
    id: Option<InstanceId>,
    total: bool,
    failure: Option<String>,
}

impl InstanceCore {
    /// Core for an identity-keyed instance.
    pub fn new(id: impl Into<InstanceId>) -> Self {
        Self {
            id: Some(id.into()),
            total: false,
            failure: None,
        }
    }

    /// Core for the aggregate instance. It has no identity.
    pub fn total() -> Self {
        Self {
            id: None,
            total: true,
            failure: None,
        }
    }

    pub fn id(&self) -> Option<&InstanceId> {
        self.id.as_ref()
    }

    pub fn is_total(&self) -> bool {
        self.total
    }

    /// Records `error` as this cycle's failure.
    ///
    /// Format: `<message>; <file>:<line>:<column>`.
    pub fn capture_failure(&mut self, error: &UpdateError) {
        self.failure = Some(format!("{}; {}", error.what(), error.location()));
    }

    pub fn reset_failure(&mut self) {
        self.failure = None;
    }

    pub fn is_failure_captured(&self) -> bool {
        self.failure.is_some()
    }

    pub fn failure_text(&self) -> &str {
        self.failure.as_deref().unwrap_or("")
    }
}

/// One tracked unit of system state.
///
/// Accessors on concrete instances should be cheap reads of cached values;
/// all probing happens in [`Instance::update`]. Failure capture is driven by
/// the owning [`crate::entity::Enumeration`], never by the instance itself.
pub trait Instance {
    fn core(&self) -> &InstanceCore;

    fn core_mut(&mut self) -> &mut InstanceCore;

    /// Refreshes cached attributes from the instance's backing data.
    fn update(&mut self) -> Result<(), UpdateError> {
        Ok(())
    }

    /// Releases held resources. Must be idempotent.
    fn cleanup(&mut self) {}

    /// Called by the `MarkStale` removal policy with whether the identity was
    /// listed by the last discovery.
    fn set_present(&mut self, _present: bool) {}

    fn capture_failure(&mut self, error: &UpdateError) {
        self.core_mut().capture_failure(error);
    }

    fn reset_failure(&mut self) {
        self.core_mut().reset_failure();
    }

    fn id(&self) -> Option<&InstanceId> {
        self.core().id()
    }

    fn is_total(&self) -> bool {
        self.core().is_total()
    }

    fn is_failure_captured(&self) -> bool {
        self.core().is_failure_captured()
    }

    fn failure_text(&self) -> &str {
        self.core().failure_text()
    }
}
