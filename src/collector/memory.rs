//! Physical and swap memory, from `/proc/meminfo`.
//!
//! Memory has no indexed instances: the enumeration holds a single Total
//! instance describing the whole host.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::trace;

use crate::collector::parser::parse_meminfo;
use crate::collector::traits::FileSystem;
use crate::entity::{Instance, InstanceCore, Source};
use crate::error::{CollectError, UpdateError};

/// Memory figures in KiB, as reported by the kernel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoryInfo {
    pub total_kb: u64,
    pub free_kb: u64,
    pub available_kb: u64,
    pub buffers_kb: u64,
    pub cached_kb: u64,
    /// `total - available`.
    pub used_kb: u64,
    pub swap_total_kb: u64,
    pub swap_free_kb: u64,
    pub swap_used_kb: u64,
}

impl MemoryInfo {
    /// Share of physical memory in use, 0.0..=100.0.
    pub fn used_percent(&self) -> f64 {
        if self.total_kb == 0 {
            return 0.0;
        }
        self.used_kb as f64 * 100.0 / self.total_kb as f64
    }
}

/// The host-wide memory instance.
pub struct MemoryInstance<F> {
    core: InstanceCore,
    fs: F,
    meminfo: PathBuf,
    info: MemoryInfo,
}

impl<F: FileSystem> MemoryInstance<F> {
    pub fn new(fs: F, proc_path: &Path) -> Self {
        Self {
            core: InstanceCore::total(),
            fs,
            meminfo: proc_path.join("meminfo"),
            info: MemoryInfo::default(),
        }
    }

    /// Figures from the last successful refresh.
    pub fn info(&self) -> &MemoryInfo {
        &self.info
    }
}

impl<F: FileSystem> Instance for MemoryInstance<F> {
    fn core(&self) -> &InstanceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut InstanceCore {
        &mut self.core
    }

    fn update(&mut self) -> Result<(), UpdateError> {
        let content = self.fs.read_to_string(&self.meminfo)?;
        let mem = parse_meminfo(&content)?;
        if !mem.has_total {
            return Err(UpdateError::new(CollectError::Unavailable(format!(
                "MemTotal missing from {}",
                self.meminfo.display()
            ))));
        }

        // MemAvailable is absent on kernels older than 3.14.
        let available = if mem.mem_available > 0 {
            mem.mem_available
        } else {
            mem.mem_free + mem.buffers + mem.cached
        };

        self.info = MemoryInfo {
            total_kb: mem.mem_total,
            free_kb: mem.mem_free,
            available_kb: available,
            buffers_kb: mem.buffers,
            cached_kb: mem.cached,
            used_kb: mem.mem_total.saturating_sub(available),
            swap_total_kb: mem.swap_total,
            swap_free_kb: mem.swap_free,
            swap_used_kb: mem.swap_total.saturating_sub(mem.swap_free),
        };
        trace!(
            "memory: total={} kB used={} kB",
            self.info.total_kb, self.info.used_kb
        );
        Ok(())
    }
}

/// Source for the memory kind. Installs the Total instance only.
pub struct MemorySource<F> {
    fs: F,
    proc_path: PathBuf,
}

impl<F: FileSystem + Clone> MemorySource<F> {
    pub fn new(fs: F, proc_path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }
}

impl<F: FileSystem + Clone> Source for MemorySource<F> {
    type Instance = MemoryInstance<F>;
    const KIND: &'static str = "memory";

    fn total_instance(&mut self) -> Option<Self::Instance> {
        Some(MemoryInstance::new(self.fs.clone(), &self.proc_path))
    }
}
