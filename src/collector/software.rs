//! Installed packages from the dpkg status database.
//!
//! Instances are keyed the way `dpkg-query` names packages: the bare name, or
//! `name:arch` when the database holds the package for more than one
//! architecture (`libc6:amd64` next to `libc6:i386`).
//!
//! The database is parsed once per discovery. Instances refresh from that
//! shared snapshot instead of re-reading the file, which on a typical server
//! holds a few thousand stanzas.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::debug;

use crate::collector::parser::{PackageEntry, parse_dpkg_status};
use crate::collector::traits::FileSystem;
use crate::entity::{Instance, InstanceCore, InstanceId, RemovalPolicy, Source};
use crate::error::{CollectError, UpdateError};

type Snapshot = Arc<RwLock<HashMap<String, PackageEntry>>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    pub architecture: String,
    pub maintainer: String,
    pub installed_size_kb: u64,
    pub summary: String,
    /// False once dpkg reports the package as anything but installed.
    pub installed: bool,
}

pub struct PackageInstance {
    core: InstanceCore,
    key: String,
    snapshot: Snapshot,
    info: PackageInfo,
}

impl PackageInstance {
    fn new(key: &str, snapshot: Snapshot) -> Self {
        let name = key.split_once(':').map_or(key, |(name, _)| name);
        Self {
            core: InstanceCore::new(key),
            key: key.to_string(),
            snapshot,
            info: PackageInfo {
                name: name.to_string(),
                ..Default::default()
            },
        }
    }

    pub fn info(&self) -> &PackageInfo {
        &self.info
    }
}

impl Instance for PackageInstance {
    fn core(&self) -> &InstanceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut InstanceCore {
        &mut self.core
    }

    fn update(&mut self) -> Result<(), UpdateError> {
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = snapshot.get(&self.key) else {
            return Err(UpdateError::new(CollectError::Gone(format!(
                "package {}",
                self.key
            ))));
        };

        self.info = PackageInfo {
            name: entry.name.clone(),
            version: entry.version.clone(),
            architecture: entry.architecture.clone(),
            maintainer: entry.maintainer.clone(),
            installed_size_kb: entry.installed_size_kb,
            summary: entry.summary.clone(),
            installed: entry.is_installed(),
        };
        Ok(())
    }
}

pub struct SoftwareSource<F> {
    fs: F,
    status_path: PathBuf,
    removal: RemovalPolicy,
    snapshot: Snapshot,
}

impl<F: FileSystem> SoftwareSource<F> {
    pub fn new(fs: F, status_path: impl Into<PathBuf>, removal: RemovalPolicy) -> Self {
        Self {
            fs,
            status_path: status_path.into(),
            removal,
            snapshot: Snapshot::default(),
        }
    }
}

impl<F: FileSystem> Source for SoftwareSource<F> {
    type Instance = PackageInstance;
    const KIND: &'static str = "software";

    fn removal_policy(&self) -> RemovalPolicy {
        self.removal
    }

    fn discover(&mut self) -> Result<Vec<InstanceId>, CollectError> {
        let content = self.fs.read_to_string(&self.status_path)?;
        let packages = parse_dpkg_status(&content)?;

        let stanzas = packages.len();
        let keys = package_keys(&packages);

        let mut ids = Vec::new();
        let mut listed = HashSet::new();
        let mut by_key: HashMap<String, PackageEntry> = HashMap::with_capacity(stanzas);
        for (key, package) in keys.into_iter().zip(packages) {
            if package.is_installed() && listed.insert(key.clone()) {
                ids.push(InstanceId::new(key.as_str()));
            }
            match by_key.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(package);
                }
                // An installed stanza wins over a leftover one with the same key.
                Entry::Occupied(mut slot) => {
                    if package.is_installed() && !slot.get().is_installed() {
                        slot.insert(package);
                    }
                }
            }
        }
        debug!("software: {} stanzas, {} installed", stanzas, ids.len());

        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = by_key;
        Ok(ids)
    }

    fn instantiate(&mut self, id: &InstanceId) -> Result<Self::Instance, CollectError> {
        Ok(PackageInstance::new(id.as_str(), Arc::clone(&self.snapshot)))
    }

    fn cleanup(&mut self) {
        self.snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Key per stanza: `name`, or `name:arch` when `name` appears with more
/// than one architecture.
fn package_keys(packages: &[PackageEntry]) -> Vec<String> {
    let mut architectures: HashMap<&str, HashSet<&str>> = HashMap::new();
    for package in packages {
        architectures
            .entry(package.name.as_str())
            .or_default()
            .insert(package.architecture.as_str());
    }

    packages
        .iter()
        .map(|p| {
            let multi_arch = architectures.get(p.name.as_str()).is_some_and(|a| a.len() > 1);
            if multi_arch && !p.architecture.is_empty() {
                format!("{}:{}", p.name, p.architecture)
            } else {
                p.name.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MockFs;
    use crate::entity::Enumeration;

    const STATUS: &str = "/var/lib/dpkg/status";

    fn software(fs: MockFs, removal: RemovalPolicy) -> Enumeration<SoftwareSource<MockFs>> {
        let mut e = Enumeration::new(SoftwareSource::new(fs, STATUS, removal));
        e.init();
        e
    }

    #[test]
    fn test_software_installed_only() {
        let mut e = software(MockFs::typical_system(), RemovalPolicy::Retain);
        e.update(true).unwrap();

        let ids: Vec<_> = e.ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["bash", "coreutils", "zlib1g"]);
        let bash = e.get_instance("bash").unwrap().info();
        assert_eq!(bash.version, "5.1-6ubuntu1");
        assert_eq!(bash.installed_size_kb, 1864);
        assert!(bash.installed);
    }

    #[test]
    fn test_software_purged_retained_as_gone() {
        let mut fs = MockFs::typical_system();
        let mut e = software(fs.clone(), RemovalPolicy::Retain);
        e.update(true).unwrap();

        fs.add_file(
            STATUS,
            "Package: bash\nStatus: install ok installed\nVersion: 5.2-1\n",
        );
        let report = e.update(true).unwrap();

        assert!(report.reconciliation.removed.is_empty());
        assert_eq!(e.size(), 3);
        assert_eq!(e.get_instance("bash").unwrap().info().version, "5.2-1");
        let zlib = e.get_instance("zlib1g").unwrap();
        assert!(zlib.is_failure_captured());
        assert!(zlib.failure_text().starts_with("package zlib1g disappeared"));
    }

    #[test]
    fn test_software_deinstalled_reports_not_installed() {
        let mut fs = MockFs::typical_system();
        let mut e = software(fs.clone(), RemovalPolicy::Retain);
        e.update(true).unwrap();

        fs.add_file(
            STATUS,
            "Package: coreutils\nStatus: deinstall ok config-files\nVersion: 8.32-4.1ubuntu1\n",
        );
        e.update(true).unwrap();
        let coreutils = e.get_instance("coreutils").unwrap();
        assert!(!coreutils.is_failure_captured());
        assert!(!coreutils.info().installed);
    }

    const MULTI_ARCH: &str = "\
Package: libc6
Status: install ok installed
Architecture: amd64
Version: 2.35-0ubuntu3.4

Package: libc6
Status: deinstall ok config-files
Architecture: i386
Version: 2.31-0ubuntu9

Package: bash
Status: install ok installed
Architecture: amd64
Version: 5.1-6ubuntu1
";

    #[test]
    fn test_software_multi_arch_keys() {
        let mut fs = MockFs::new();
        fs.add_file(STATUS, MULTI_ARCH);
        let mut e = software(fs, RemovalPolicy::Retain);
        e.update(true).unwrap();

        let ids: Vec<_> = e.ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["libc6:amd64", "bash"]);

        let libc = e.get_instance("libc6:amd64").unwrap();
        assert!(!libc.is_failure_captured());
        assert!(libc.info().installed);
        assert_eq!(libc.info().name, "libc6");
        assert_eq!(libc.info().architecture, "amd64");
        assert_eq!(libc.info().version, "2.35-0ubuntu3.4");
    }

    #[test]
    fn test_software_multi_arch_both_installed() {
        let mut fs = MockFs::new();
        fs.add_file(
            STATUS,
            MULTI_ARCH.replace("deinstall ok config-files", "install ok installed"),
        );
        let mut e = software(fs, RemovalPolicy::Retain);
        e.update(true).unwrap();

        assert_eq!(e.size(), 3);
        let i386 = e.get_instance("libc6:i386").unwrap().info();
        assert!(i386.installed);
        assert_eq!(i386.version, "2.31-0ubuntu9");
        assert_eq!(e.get_instance("libc6:amd64").unwrap().info().architecture, "amd64");
    }

    #[test]
    fn test_software_duplicate_stanza_prefers_installed() {
        let mut fs = MockFs::new();
        fs.add_file(
            STATUS,
            "Package: vim\nStatus: deinstall ok config-files\nVersion: 1\n\n\
             Package: vim\nStatus: install ok installed\nVersion: 2\n",
        );
        let mut e = software(fs, RemovalPolicy::Retain);
        e.update(true).unwrap();

        let vim = e.get_instance("vim").unwrap().info();
        assert!(vim.installed);
        assert_eq!(vim.version, "2");
    }

    #[test]
    fn test_software_remove_policy() {
        let mut fs = MockFs::typical_system();
        let mut e = software(fs.clone(), RemovalPolicy::Remove);
        e.update(true).unwrap();

        fs.add_file(STATUS, "");
        let report = e.update(true).unwrap();
        assert_eq!(report.reconciliation.removed.len(), 3);
        assert!(e.is_empty());
    }

    #[test]
    fn test_software_malformed_database() {
        let mut e = software(MockFs::broken_system(), RemovalPolicy::Retain);
        assert!(matches!(e.update(true), Err(CollectError::Parse(_))));
        assert!(e.is_empty());
    }

    #[test]
    fn test_software_empty_database() {
        let mut e = software(MockFs::minimal_system(), RemovalPolicy::Retain);
        let report = e.update(true).unwrap();
        assert!(e.is_empty());
        assert_eq!(report.refresh.map(|r| r.refreshed), Some(0));
    }
}
