//! Generic enumeration engine.
//!
//! An [`Enumeration`] owns every instance of one resource kind. Each
//! [`Enumeration::update`] runs two phases:
//!
//! 1. **Reconciliation**: the [`Source`] lists the live identities; new ones
//!    are instantiated and appended, vanished ones are handled according to the
//!    source's [`RemovalPolicy`]. A listing failure aborts the call and leaves
//!    the collection untouched.
//! 2. **Refresh** (optional): the Total instance and then every indexed
//!    instance, in storage order, is reset and updated. A failing instance has
//!    its error captured and logged; the remaining instances are still refreshed.

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::entity::{Instance, InstanceId};
use crate::error::CollectError;

/// What reconciliation does with a held identity the source no longer lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    /// Clean up and excise the instance immediately.
    #[default]
    Remove,
    /// Keep the instance and report it absent through [`Instance::set_present`].
    MarkStale,
    /// Keep the instance untouched.
    Retain,
}

/// Per-kind discovery logic bound to a dependency provider.
pub trait Source {
    type Instance: Instance;

    /// Short kind name used in diagnostics (`"disk"`, `"network"`).
    const KIND: &'static str;

    fn removal_policy(&self) -> RemovalPolicy {
        RemovalPolicy::Remove
    }

    /// The aggregate instance installed by [`Enumeration::init`], if this kind
    /// has one.
    fn total_instance(&mut self) -> Option<Self::Instance> {
        None
    }

    /// Lists the identities currently present, in provider order.
    fn discover(&mut self) -> Result<Vec<InstanceId>, CollectError> {
        Ok(Vec::new())
    }

    /// Builds the instance for an identity seen for the first time.
    fn instantiate(&mut self, id: &InstanceId) -> Result<Self::Instance, CollectError> {
        Err(CollectError::NotSupported(format!(
            "{} has no indexed instances (requested {})",
            Self::KIND,
            id
        )))
    }

    fn cleanup(&mut self) {}
}

/// Lifecycle of an [`Enumeration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerationState {
    Uninitialized,
    Initialized,
    CleanedUp,
}

/// Changes applied by one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// New identities, in the order they were appended.
    pub added: Vec<InstanceId>,
    /// Identities excised under [`RemovalPolicy::Remove`].
    pub removed: Vec<InstanceId>,
    /// Identities reported absent under [`RemovalPolicy::MarkStale`].
    pub stale: Vec<InstanceId>,
    /// New identities whose instantiation failed this cycle.
    pub skipped: Vec<InstanceId>,
}

impl Reconciliation {
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Counts from one refresh pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub refreshed: usize,
    pub failed: usize,
}

/// Result of [`Enumeration::update`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub reconciliation: Reconciliation,
    /// `None` when the call did not refresh instances.
    pub refresh: Option<RefreshStats>,
}

/// Identity-keyed, insertion-ordered collection of resource instances with an
/// optional Total instance held outside the index.
pub struct Enumeration<S: Source> {
    source: S,
    instances: IndexMap<InstanceId, S::Instance>,
    total: Option<S::Instance>,
    state: EnumerationState,
}

impl<S: Source> Enumeration<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            instances: IndexMap::new(),
            total: None,
            state: EnumerationState::Uninitialized,
        }
    }

    pub fn state(&self) -> EnumerationState {
        self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// One-time setup: installs the source's Total instance, if any.
    pub fn init(&mut self) {
        debug_assert!(
            self.state == EnumerationState::Uninitialized,
            "{} enumeration initialized twice (state {:?})",
            S::KIND,
            self.state
        );
        trace!("{} enumeration init", S::KIND);

        if let Some(total) = self.source.total_instance() {
            self.set_total_instance(total);
        }
        self.state = EnumerationState::Initialized;
    }

    /// Installs the aggregate instance, cleaning up any previous one.
    pub fn set_total_instance(&mut self, instance: S::Instance) {
        debug_assert!(
            instance.is_total(),
            "{} total slot given a non-total instance",
            S::KIND
        );
        if let Some(mut previous) = self.total.replace(instance) {
            previous.cleanup();
        }
    }

    /// Appends `instance` unless its identity is already held.
    ///
    /// Returns whether the instance was inserted. An existing instance with
    /// the same identity is never replaced.
    pub fn add_instance(&mut self, instance: S::Instance) -> bool {
        debug_assert!(
            self.state != EnumerationState::CleanedUp,
            "{} add_instance after cleanup",
            S::KIND
        );
        let Some(id) = instance.id().cloned() else {
            debug_assert!(false, "{} add_instance without identity", S::KIND);
            return false;
        };
        if self.instances.contains_key(&id) {
            return false;
        }
        self.instances.insert(id, instance);
        true
    }

    /// Cleans up and excises the instance named `id`.
    ///
    /// Later instances shift down one position; relative order is kept.
    pub fn remove_instance(&mut self, id: &str) -> bool {
        match self.instances.get_mut(id) {
            Some(instance) => instance.cleanup(),
            None => return false,
        }
        self.instances.shift_remove(id);
        true
    }

    pub fn get_instance(&self, id: &str) -> Option<&S::Instance> {
        self.assert_initialized("get_instance");
        self.instances.get(id)
    }

    /// Instance at `index` in discovery order.
    ///
    /// # Panics
    /// If `index >= self.size()`.
    pub fn instance_at(&self, index: usize) -> &S::Instance {
        self.assert_initialized("instance_at");
        match self.instances.get_index(index) {
            Some((_, instance)) => instance,
            None => panic!(
                "{} instance index {} out of range (size {})",
                S::KIND,
                index,
                self.instances.len()
            ),
        }
    }

    pub fn get_total_instance(&self) -> Option<&S::Instance> {
        self.assert_initialized("get_total_instance");
        self.total.as_ref()
    }

    /// Number of indexed instances. The Total instance is not counted.
    pub fn size(&self) -> usize {
        self.assert_initialized("size");
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Indexed instances in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &S::Instance> {
        self.assert_initialized("iter");
        self.instances.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &InstanceId> {
        self.instances.keys()
    }

    /// Reconciles against the source and, if `refresh_instances`, refreshes
    /// every held instance.
    ///
    /// Only a reconciliation failure is returned; instance failures are
    /// captured on the instances.
    pub fn update(&mut self, refresh_instances: bool) -> Result<UpdateReport, CollectError> {
        self.assert_initialized("update");

        let reconciliation = self.update_enumeration()?;
        let refresh = refresh_instances.then(|| self.update_instances());

        Ok(UpdateReport {
            reconciliation,
            refresh,
        })
    }

    /// Phase one: matches the held identities to the source's live set.
    pub fn update_enumeration(&mut self) -> Result<Reconciliation, CollectError> {
        self.assert_initialized("update_enumeration");

        // Nothing is modified until the listing has succeeded.
        let live = self.source.discover()?;
        let mut result = Reconciliation::default();

        let mut seen: HashSet<InstanceId> = HashSet::with_capacity(live.len());
        let mut fresh = Vec::new();
        for id in live {
            if !seen.insert(id.clone()) || self.instances.contains_key(&id) {
                continue;
            }
            match self.source.instantiate(&id) {
                Ok(instance) => {
                    debug_assert!(
                        instance.id() == Some(&id),
                        "{} instantiated {} with a different identity",
                        S::KIND,
                        id
                    );
                    fresh.push(instance);
                }
                Err(e) => {
                    warn!("{} instance {} could not be created: {}", S::KIND, id, e);
                    result.skipped.push(id);
                }
            }
        }

        let vanished: Vec<InstanceId> = self
            .instances
            .keys()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();

        match self.source.removal_policy() {
            RemovalPolicy::Remove => {
                for id in vanished {
                    debug!("{} instance {} vanished, removing", S::KIND, id);
                    self.remove_instance(id.as_str());
                    result.removed.push(id);
                }
            }
            RemovalPolicy::MarkStale => {
                for (id, instance) in self.instances.iter_mut() {
                    let present = seen.contains(id);
                    instance.set_present(present);
                    if !present {
                        result.stale.push(id.clone());
                    }
                }
            }
            RemovalPolicy::Retain => {}
        }

        for instance in fresh {
            let id = instance.id().cloned();
            if self.add_instance(instance) {
                if let Some(id) = id {
                    debug!("{} instance {} discovered", S::KIND, id);
                    result.added.push(id);
                }
            }
        }

        Ok(result)
    }

    /// Phase two: refreshes the Total instance, then every indexed instance in
    /// storage order.
    pub fn update_instances(&mut self) -> RefreshStats {
        self.assert_initialized("update_instances");

        let mut stats = RefreshStats::default();
        let total = self.total.iter_mut();
        let indexed = self.instances.values_mut();
        for instance in total.chain(indexed) {
            if refresh_instance(S::KIND, instance) {
                stats.refreshed += 1;
            } else {
                stats.failed += 1;
            }
        }
        stats
    }

    /// Cleans up every instance and the source. Later calls do nothing.
    pub fn cleanup(&mut self) {
        if self.state == EnumerationState::CleanedUp {
            return;
        }
        trace!("{} enumeration cleanup", S::KIND);

        if let Some(mut total) = self.total.take() {
            total.cleanup();
        }
        for (_, mut instance) in self.instances.drain(..) {
            instance.cleanup();
        }
        self.source.cleanup();
        self.state = EnumerationState::CleanedUp;
    }

    fn assert_initialized(&self, op: &str) {
        debug_assert!(
            self.state == EnumerationState::Initialized,
            "{} enumeration: {} called in state {:?}",
            S::KIND,
            op,
            self.state
        );
    }
}

/// Resets and updates one instance, capturing a failure instead of raising it.
fn refresh_instance<I: Instance>(kind: &str, instance: &mut I) -> bool {
    instance.reset_failure();
    match instance.update() {
        Ok(()) => true,
        Err(e) => {
            let label = instance
                .id()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "total".to_string());
            warn!(
                location = %e.location(),
                "{} instance {} update failed: {}", kind, label, e
            );
            instance.capture_failure(&e);
            false
        }
    }
}

impl<S: Source> Drop for Enumeration<S> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl<S: Source> fmt::Display for Enumeration<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} enumeration [{:?}] size={} total={} ids=[",
            S::KIND,
            self.state,
            self.instances.len(),
            if self.total.is_some() { "yes" } else { "no" }
        )?;
        for (i, id) in self.instances.keys().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", id)?;
        }
        f.write_str("]")
    }
}
