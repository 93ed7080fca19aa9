//! Inventory of every resource kind the agent tracks.
//!
//! The `Inventory` struct owns one [`Enumeration`] per kind and drives them
//! in a fixed order, producing serializable snapshots for reporting.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::collector::bios::{BiosInfo, BiosSource};
use crate::collector::cpu::{CpuInfo, CpuSource};
use crate::collector::disk::{DiskInfo, DiskSource};
use crate::collector::memory::{MemoryInfo, MemorySource};
use crate::collector::network::{InterfaceInfo, NetworkSource};
use crate::collector::os::{OsInfo, OsSource};
use crate::collector::software::{PackageInfo, SoftwareSource};
use crate::collector::traits::FileSystem;
use crate::config::Config;
use crate::entity::{Enumeration, Instance, Source};

/// Kind names in update order.
pub const KINDS: [&str; 7] = ["memory", "os", "bios", "cpu", "disk", "network", "software"];

/// Time spent per kind in the last `update` call.
#[derive(Debug, Clone, Default)]
pub struct InventoryTiming {
    pub total: Duration,
    pub memory: Duration,
    pub os: Duration,
    pub bios: Duration,
    pub cpu: Duration,
    pub disk: Duration,
    pub network: Duration,
    pub software: Duration,
}

/// One instance in a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceReport<T> {
    /// `None` for the Total instance.
    pub id: Option<String>,
    /// Failure captured by the last refresh, as `message; file:line:column`.
    pub failure: Option<String>,
    pub data: T,
}

/// All instances of one kind in a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct KindReport<T> {
    pub total: Option<InstanceReport<T>>,
    /// Indexed instances in discovery order.
    pub instances: Vec<InstanceReport<T>>,
    /// Reconciliation error from the last update, if it failed.
    pub error: Option<String>,
}

impl<T> KindReport<T> {
    /// Instances (total included) whose last refresh failed.
    pub fn failed(&self) -> usize {
        self.total
            .iter()
            .chain(self.instances.iter())
            .filter(|r| r.failure.is_some())
            .count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InventorySnapshot {
    pub timestamp: DateTime<Utc>,
    pub memory: KindReport<MemoryInfo>,
    pub os: KindReport<OsInfo>,
    pub bios: KindReport<BiosInfo>,
    pub cpu: KindReport<CpuInfo>,
    pub disk: KindReport<DiskInfo>,
    pub network: KindReport<InterfaceInfo>,
    pub software: KindReport<PackageInfo>,
}

/// Owns and drives the enumeration of every resource kind.
pub struct Inventory<F: FileSystem + Clone> {
    memory: Enumeration<MemorySource<F>>,
    os: Enumeration<OsSource<F>>,
    bios: Enumeration<BiosSource<F>>,
    cpu: Enumeration<CpuSource<F>>,
    disk: Enumeration<DiskSource<F>>,
    network: Enumeration<NetworkSource<F>>,
    software: Enumeration<SoftwareSource<F>>,
    /// Last reconciliation error per kind; cleared by a successful update.
    last_errors: BTreeMap<&'static str, String>,
    last_timing: Option<InventoryTiming>,
}

impl<F: FileSystem + Clone> Inventory<F> {
    /// Creates an inventory reading through `fs`.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `config` - Provider paths and per-kind settings
    pub fn new(fs: F, config: &Config) -> Self {
        let paths = &config.paths;
        Self {
            memory: Enumeration::new(MemorySource::new(fs.clone(), &paths.proc)),
            os: Enumeration::new(OsSource::new(
                fs.clone(),
                &paths.proc,
                &paths.etc,
                &paths.usr,
            )),
            bios: Enumeration::new(BiosSource::new(fs.clone(), &paths.sys)),
            cpu: Enumeration::new(CpuSource::new(fs.clone(), &paths.proc, config.cpu.removal)),
            disk: Enumeration::new(DiskSource::new(
                fs.clone(),
                &paths.proc,
                config.disk.ignored_filesystems.clone(),
                config.disk.removal,
            )),
            network: Enumeration::new(NetworkSource::new(
                fs.clone(),
                &paths.proc,
                &paths.sys,
                config.network.include_non_running,
                config.network.removal,
            )),
            software: Enumeration::new(SoftwareSource::new(
                fs,
                &paths.dpkg_status,
                config.software.removal,
            )),
            last_errors: BTreeMap::new(),
            last_timing: None,
        }
    }

    /// Initializes every enumeration and runs the first full update.
    pub fn init(&mut self) {
        self.memory.init();
        self.os.init();
        self.bios.init();
        self.cpu.init();
        self.disk.init();
        self.network.init();
        self.software.init();

        let failed = self.update(true);
        info!(
            "inventory initialized: {} cpus, {} disks, {} interfaces, {} packages ({} kinds failed)",
            self.cpu.size(),
            self.disk.size(),
            self.network.size(),
            self.software.size(),
            failed
        );
    }

    /// Updates every kind in order. A kind whose reconciliation fails keeps
    /// its previous instances and does not stop the remaining kinds.
    ///
    /// Returns the number of kinds whose reconciliation failed.
    pub fn update(&mut self, refresh_instances: bool) -> usize {
        let total_start = Instant::now();
        let mut timing = InventoryTiming::default();
        let errors = &mut self.last_errors;

        timing.memory = update_kind(&mut self.memory, refresh_instances, errors);
        timing.os = update_kind(&mut self.os, refresh_instances, errors);
        timing.bios = update_kind(&mut self.bios, refresh_instances, errors);
        timing.cpu = update_kind(&mut self.cpu, refresh_instances, errors);
        timing.disk = update_kind(&mut self.disk, refresh_instances, errors);
        timing.network = update_kind(&mut self.network, refresh_instances, errors);
        timing.software = update_kind(&mut self.software, refresh_instances, errors);

        timing.total = total_start.elapsed();
        debug!("inventory update took {:?}", timing.total);
        self.last_timing = Some(timing);
        self.last_errors.len()
    }

    /// Serializable view of the current state.
    pub fn snapshot(&self) -> InventorySnapshot {
        InventorySnapshot {
            timestamp: Utc::now(),
            memory: self.report(&self.memory, |i| i.info().clone()),
            os: self.report(&self.os, |i| i.info().clone()),
            bios: self.report(&self.bios, |i| i.info().clone()),
            cpu: self.report(&self.cpu, |i| i.info().clone()),
            disk: self.report(&self.disk, |i| i.info().clone()),
            network: self.report(&self.network, |i| i.info().clone()),
            software: self.report(&self.software, |i| i.info().clone()),
        }
    }

    fn report<S, T>(&self, e: &Enumeration<S>, data: impl Fn(&S::Instance) -> T) -> KindReport<T>
    where
        S: Source,
    {
        let instance_report = |instance: &S::Instance| InstanceReport {
            id: instance.id().map(|id| id.to_string()),
            failure: instance
                .is_failure_captured()
                .then(|| instance.failure_text().to_string()),
            data: data(instance),
        };
        KindReport {
            total: e.get_total_instance().map(instance_report),
            instances: e.iter().map(instance_report).collect(),
            error: self.last_errors.get(S::KIND).cloned(),
        }
    }

    /// Reconciliation error recorded for `kind` by the last update.
    pub fn last_error(&self, kind: &str) -> Option<&str> {
        self.last_errors.get(kind).map(|s| s.as_str())
    }

    /// Timing information from the last update call.
    pub fn last_timing(&self) -> Option<&InventoryTiming> {
        self.last_timing.as_ref()
    }

    pub fn memory(&self) -> &Enumeration<MemorySource<F>> {
        &self.memory
    }

    pub fn os(&self) -> &Enumeration<OsSource<F>> {
        &self.os
    }

    pub fn bios(&self) -> &Enumeration<BiosSource<F>> {
        &self.bios
    }

    pub fn cpu(&self) -> &Enumeration<CpuSource<F>> {
        &self.cpu
    }

    pub fn disk(&self) -> &Enumeration<DiskSource<F>> {
        &self.disk
    }

    pub fn network(&self) -> &Enumeration<NetworkSource<F>> {
        &self.network
    }

    pub fn software(&self) -> &Enumeration<SoftwareSource<F>> {
        &self.software
    }

    /// Cleans up every enumeration in reverse update order. Idempotent.
    pub fn cleanup(&mut self) {
        self.software.cleanup();
        self.network.cleanup();
        self.disk.cleanup();
        self.cpu.cleanup();
        self.bios.cleanup();
        self.os.cleanup();
        self.memory.cleanup();
    }
}

fn update_kind<S: Source>(
    enumeration: &mut Enumeration<S>,
    refresh_instances: bool,
    errors: &mut BTreeMap<&'static str, String>,
) -> Duration {
    let start = Instant::now();
    match enumeration.update(refresh_instances) {
        Ok(report) => {
            errors.remove(S::KIND);
            let r = &report.reconciliation;
            if !r.is_unchanged() {
                info!(
                    "{}: {} added, {} removed",
                    S::KIND,
                    r.added.len(),
                    r.removed.len()
                );
            }
        }
        Err(e) => {
            warn!("{} enumeration failed: {}", S::KIND, e);
            errors.insert(S::KIND, e.to_string());
        }
    }
    start.elapsed()
}
