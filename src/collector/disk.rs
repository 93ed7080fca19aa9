//! Mounted filesystems (logical disks), keyed by mount point.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::collector::parser::{MountEntry, parse_mounts};
use crate::collector::traits::{FileSystem, FsSpace};
use crate::entity::{Instance, InstanceCore, InstanceId, RemovalPolicy, Source};
use crate::error::{CollectError, UpdateError};

/// Pseudo and virtual filesystem types that never back a logical disk.
pub const DEFAULT_IGNORED_FILESYSTEMS: &[&str] = &[
    "autofs",
    "binfmt_misc",
    "bpf",
    "cgroup",
    "cgroup2",
    "configfs",
    "debugfs",
    "devpts",
    "devtmpfs",
    "fusectl",
    "hugetlbfs",
    "mqueue",
    "nsfs",
    "proc",
    "pstore",
    "ramfs",
    "rpc_pipefs",
    "securityfs",
    "selinuxfs",
    "squashfs",
    "sysfs",
    "tmpfs",
    "tracefs",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiskInfo {
    pub mount_point: String,
    pub device: String,
    pub fs_type: String,
    /// False once the mount point stops appearing in the mount table.
    pub online: bool,
    pub space: Option<FsSpace>,
}

impl DiskInfo {
    /// Share of space in use as seen by unprivileged users.
    pub fn used_percent(&self) -> Option<f64> {
        let space = self.space?;
        let reserved = space.free_bytes.saturating_sub(space.available_bytes);
        let usable = space.total_bytes.saturating_sub(reserved);
        if usable == 0 {
            return None;
        }
        let used = space.total_bytes.saturating_sub(space.free_bytes);
        Some(used as f64 * 100.0 / usable as f64)
    }
}

pub struct DiskInstance<F> {
    core: InstanceCore,
    fs: F,
    info: DiskInfo,
}

impl<F: FileSystem> DiskInstance<F> {
    pub fn new(fs: F, mount: &MountEntry) -> Self {
        Self {
            core: InstanceCore::new(mount.mount_point.as_str()),
            fs,
            info: DiskInfo {
                mount_point: mount.mount_point.clone(),
                device: mount.device.clone(),
                fs_type: mount.fs_type.clone(),
                online: true,
                space: None,
            },
        }
    }

    pub fn info(&self) -> &DiskInfo {
        &self.info
    }

    pub fn is_online(&self) -> bool {
        self.info.online
    }
}

impl<F: FileSystem> Instance for DiskInstance<F> {
    fn core(&self) -> &InstanceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut InstanceCore {
        &mut self.core
    }

    /// Offline disks are not probed; their last figures are kept.
    fn update(&mut self) -> Result<(), UpdateError> {
        if !self.info.online {
            return Ok(());
        }
        let space = self.fs.statvfs(Path::new(&self.info.mount_point))?;
        self.info.space = Some(space);
        Ok(())
    }

    fn set_present(&mut self, present: bool) {
        if self.info.online != present {
            debug!(
                "disk {} is now {}",
                self.info.mount_point,
                if present { "online" } else { "offline" }
            );
        }
        self.info.online = present;
    }
}

pub struct DiskSource<F> {
    fs: F,
    mounts_path: PathBuf,
    ignored: Vec<String>,
    removal: RemovalPolicy,
    /// Mount table rows from the last discovery, by mount point.
    mounts: HashMap<String, MountEntry>,
}

impl<F: FileSystem + Clone> DiskSource<F> {
    pub fn new(
        fs: F,
        proc_path: impl AsRef<Path>,
        ignored: Vec<String>,
        removal: RemovalPolicy,
    ) -> Self {
        Self {
            fs,
            mounts_path: proc_path.as_ref().join("mounts"),
            ignored,
            removal,
            mounts: HashMap::new(),
        }
    }

    fn is_ignored(&self, fs_type: &str) -> bool {
        self.ignored.iter().any(|t| t == fs_type)
    }
}

impl<F: FileSystem + Clone> Source for DiskSource<F> {
    type Instance = DiskInstance<F>;
    const KIND: &'static str = "disk";

    fn removal_policy(&self) -> RemovalPolicy {
        self.removal
    }

    fn discover(&mut self) -> Result<Vec<InstanceId>, CollectError> {
        let content = self.fs.read_to_string(&self.mounts_path)?;
        let entries = parse_mounts(&content)?;

        let mut ids = Vec::new();
        let mut mounts = HashMap::new();
        for entry in entries {
            if self.is_ignored(&entry.fs_type) {
                continue;
            }
            ids.push(InstanceId::new(entry.mount_point.as_str()));
            // Stacked mounts: the last one listed is the visible one.
            mounts.insert(entry.mount_point.clone(), entry);
        }
        self.mounts = mounts;
        Ok(ids)
    }

    fn instantiate(&mut self, id: &InstanceId) -> Result<Self::Instance, CollectError> {
        let mount = self
            .mounts
            .get(id.as_str())
            .ok_or_else(|| CollectError::Gone(format!("mount point {}", id)))?;
        Ok(DiskInstance::new(self.fs.clone(), mount))
    }

    fn cleanup(&mut self) {
        self.mounts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MockFs;
    use crate::entity::Enumeration;

    fn ignored() -> Vec<String> {
        DEFAULT_IGNORED_FILESYSTEMS
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn disks(fs: MockFs, removal: RemovalPolicy) -> Enumeration<DiskSource<MockFs>> {
        let mut e = Enumeration::new(DiskSource::new(fs, "/proc", ignored(), removal));
        e.init();
        e
    }

    const WITHOUT_VAR: &str = "\
/dev/sda1 / ext4 rw,relatime 0 0
proc /proc proc rw 0 0
sysfs /sys sysfs rw 0 0
";

    #[test]
    fn test_disk_discovery_skips_pseudo_filesystems() {
        let mut e = disks(MockFs::typical_system(), RemovalPolicy::Remove);
        e.update(true).unwrap();

        assert_eq!(e.size(), 2);
        assert!(e.get_total_instance().is_none());
        let ids: Vec<_> = e.ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["/", "/var"]);

        let var = e.get_instance("/var").unwrap();
        assert_eq!(var.info().device, "/dev/sda2");
        assert_eq!(var.info().fs_type, "xfs");
        assert_eq!(var.info().space.map(|s| s.total_bytes), Some(200 << 30));
    }

    #[test]
    fn test_disk_unmounted_is_removed() {
        let mut fs = MockFs::typical_system();
        let mut e = disks(fs.clone(), RemovalPolicy::Remove);
        e.update(true).unwrap();
        assert_eq!(e.size(), 2);

        fs.add_file("/proc/mounts", WITHOUT_VAR);
        fs.clear_space("/var");
        let report = e.update(true).unwrap();

        assert_eq!(e.size(), 1);
        assert_eq!(e.instance_at(0).id().map(|id| id.as_str()), Some("/"));
        assert!(e.get_instance("/var").is_none());
        assert_eq!(report.reconciliation.removed, vec![InstanceId::from("/var")]);
        assert_eq!(report.refresh.map(|r| r.failed), Some(0));
    }

    #[test]
    fn test_disk_unmounted_marked_offline() {
        let mut fs = MockFs::typical_system();
        let mut e = disks(fs.clone(), RemovalPolicy::MarkStale);
        e.update(true).unwrap();

        fs.add_file("/proc/mounts", WITHOUT_VAR);
        fs.clear_space("/var");
        e.update(true).unwrap();

        assert_eq!(e.size(), 2);
        let var = e.get_instance("/var").unwrap();
        assert!(!var.is_online());
        assert!(!var.is_failure_captured());
        assert!(var.info().space.is_some());

        // Remounted: back online without a new instance.
        fs.add_file("/proc/mounts", "/dev/sda1 / ext4 rw 0 0\n/dev/sda2 /var xfs rw 0 0\n");
        fs.set_space("/var", FsSpace::default());
        let report = e.update(true).unwrap();
        assert!(report.reconciliation.added.is_empty());
        assert!(e.get_instance("/var").unwrap().is_online());
    }

    #[test]
    fn test_disk_statvfs_failure_is_isolated() {
        let mut fs = MockFs::typical_system();
        let mut e = disks(fs.clone(), RemovalPolicy::Remove);
        fs.clear_space("/");
        let report = e.update(true).unwrap();

        assert_eq!(report.refresh.map(|r| (r.refreshed, r.failed)), Some((1, 1)));
        assert!(e.get_instance("/").unwrap().is_failure_captured());
        assert!(!e.get_instance("/var").unwrap().is_failure_captured());
    }

    #[test]
    fn test_disk_missing_mount_table() {
        let mut e = disks(MockFs::broken_system(), RemovalPolicy::Remove);
        assert!(matches!(e.update(true), Err(CollectError::Io(_))));
        assert_eq!(e.size(), 0);
    }

    #[test]
    fn test_disk_used_percent() {
        let info = DiskInfo {
            space: Some(FsSpace {
                total_bytes: 100,
                free_bytes: 30,
                available_bytes: 20,
                ..Default::default()
            }),
            ..Default::default()
        };
        // used 70 of 90 usable
        let pct = info.used_percent().unwrap();
        assert!((pct - 70.0 * 100.0 / 90.0).abs() < 1e-9);
        assert_eq!(DiskInfo::default().used_percent(), None);
    }
}
