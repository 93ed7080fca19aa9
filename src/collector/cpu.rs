//! Per-processor utilization from `/proc/stat`.
//!
//! Each `cpuN` line is one indexed instance keyed `"N"`; the aggregate `cpu`
//! line backs the Total instance. Utilization is derived from the tick deltas
//! between two consecutive refreshes, so the first refresh yields no usage.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::collector::parser::{CpuStat, parse_global_stat};
use crate::collector::traits::FileSystem;
use crate::entity::{Instance, InstanceCore, InstanceId, RemovalPolicy, Source};
use crate::error::{CollectError, UpdateError};

/// Time shares over the last refresh interval, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CpuUsage {
    pub user: f64,
    pub nice: f64,
    pub system: f64,
    pub idle: f64,
    pub iowait: f64,
    pub irq: f64,
    pub softirq: f64,
    pub steal: f64,
    /// Everything except idle and iowait.
    pub busy: f64,
}

impl CpuUsage {
    /// Usage between two samples, or `None` if no ticks elapsed.
    fn between(prev: &CpuStat, curr: &CpuStat) -> Option<Self> {
        let elapsed = curr.total().saturating_sub(prev.total());
        if elapsed == 0 {
            return None;
        }
        let pct = |c: u64, p: u64| c.saturating_sub(p) as f64 * 100.0 / elapsed as f64;

        let idle = pct(curr.idle, prev.idle);
        let iowait = pct(curr.iowait, prev.iowait);
        Some(Self {
            user: pct(curr.user, prev.user),
            nice: pct(curr.nice, prev.nice),
            system: pct(curr.system, prev.system),
            idle,
            iowait,
            irq: pct(curr.irq, prev.irq),
            softirq: pct(curr.softirq, prev.softirq),
            steal: pct(curr.steal, prev.steal),
            busy: (100.0 - idle - iowait).max(0.0),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CpuInfo {
    /// `None` for the aggregate instance.
    pub cpu_id: Option<u32>,
    /// Total ticks accounted to this CPU since boot.
    pub total_ticks: u64,
    pub usage: Option<CpuUsage>,
}

pub struct CpuInstance<F> {
    core: InstanceCore,
    fs: F,
    stat_path: PathBuf,
    cpu_id: Option<u32>,
    previous: Option<CpuStat>,
    info: CpuInfo,
}

impl<F: FileSystem> CpuInstance<F> {
    /// Instance for processor `cpu_id`.
    pub fn new(fs: F, stat_path: &Path, cpu_id: u32) -> Self {
        Self::with_core(InstanceCore::new(cpu_id.to_string()), fs, stat_path, Some(cpu_id))
    }

    /// Instance backed by the aggregate `cpu` line.
    pub fn total(fs: F, stat_path: &Path) -> Self {
        Self::with_core(InstanceCore::total(), fs, stat_path, None)
    }

    fn with_core(core: InstanceCore, fs: F, stat_path: &Path, cpu_id: Option<u32>) -> Self {
        Self {
            core,
            fs,
            stat_path: stat_path.to_path_buf(),
            cpu_id,
            previous: None,
            info: CpuInfo {
                cpu_id,
                ..Default::default()
            },
        }
    }

    pub fn info(&self) -> &CpuInfo {
        &self.info
    }

    fn label(&self) -> String {
        match self.cpu_id {
            Some(id) => format!("cpu{}", id),
            None => "cpu".to_string(),
        }
    }
}

impl<F: FileSystem> Instance for CpuInstance<F> {
    fn core(&self) -> &InstanceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut InstanceCore {
        &mut self.core
    }

    fn update(&mut self) -> Result<(), UpdateError> {
        let content = self.fs.read_to_string(&self.stat_path)?;
        let stat = parse_global_stat(&content)?;
        let line = match self.cpu_id {
            Some(id) => stat.cpu(id),
            None => stat.aggregate(),
        };
        let Some(current) = line.copied() else {
            return Err(UpdateError::new(CollectError::Gone(format!(
                "{} line in {}",
                self.label(),
                self.stat_path.display()
            ))));
        };

        // No elapsed ticks means no interval to report on.
        self.info.usage = self
            .previous
            .as_ref()
            .and_then(|previous| CpuUsage::between(previous, &current));
        self.info.total_ticks = current.total();
        self.previous = Some(current);
        Ok(())
    }

    /// A failed sample breaks the delta chain.
    fn capture_failure(&mut self, error: &UpdateError) {
        self.previous = None;
        self.info.usage = None;
        self.core.capture_failure(error);
    }
}

pub struct CpuSource<F> {
    fs: F,
    stat_path: PathBuf,
    removal: RemovalPolicy,
}

impl<F: FileSystem + Clone> CpuSource<F> {
    pub fn new(fs: F, proc_path: impl AsRef<Path>, removal: RemovalPolicy) -> Self {
        Self {
            fs,
            stat_path: proc_path.as_ref().join("stat"),
            removal,
        }
    }
}

impl<F: FileSystem + Clone> Source for CpuSource<F> {
    type Instance = CpuInstance<F>;
    const KIND: &'static str = "cpu";

    fn removal_policy(&self) -> RemovalPolicy {
        self.removal
    }

    fn total_instance(&mut self) -> Option<Self::Instance> {
        Some(CpuInstance::total(self.fs.clone(), &self.stat_path))
    }

    fn discover(&mut self) -> Result<Vec<InstanceId>, CollectError> {
        let content = self.fs.read_to_string(&self.stat_path)?;
        let stat = parse_global_stat(&content)?;
        Ok(stat
            .cpus
            .iter()
            .filter_map(|c| c.cpu_id)
            .map(|id| InstanceId::new(id.to_string()))
            .collect())
    }

    fn instantiate(&mut self, id: &InstanceId) -> Result<Self::Instance, CollectError> {
        let cpu_id: u32 = id
            .as_str()
            .parse()
            .map_err(|_| CollectError::Parse(format!("cpu identity '{}' is not a number", id)))?;
        Ok(CpuInstance::new(self.fs.clone(), &self.stat_path, cpu_id))
    }
}
