//! Network interfaces from `/sys/class/net`, with counters from `/proc/net/dev`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::collector::parser::{parse_hex_flags, parse_net_dev};
use crate::collector::traits::{FileSystem, read_value};
use crate::entity::{Instance, InstanceCore, InstanceId, RemovalPolicy, Source};
use crate::error::{CollectError, UpdateError};

/// `IFF_UP` from `<linux/if.h>`.
const IFF_UP: u32 = 0x1;
/// `IFF_LOOPBACK` from `<linux/if.h>`.
const IFF_LOOPBACK: u32 = 0x8;

/// Whether an interface counts as running. sysfs `flags` does not carry
/// `IFF_RUNNING`, so the operational state decides; loopback reports
/// `unknown`.
fn is_running(operstate: &str) -> bool {
    matches!(operstate, "up" | "unknown")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InterfaceCounters {
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub rx_errors: u64,
    pub rx_dropped: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errors: u64,
    pub tx_dropped: u64,
    pub collisions: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InterfaceInfo {
    pub name: String,
    pub flags: u32,
    pub up: bool,
    pub running: bool,
    pub loopback: bool,
    pub operstate: String,
    pub mac_address: Option<String>,
    pub mtu: Option<u32>,
    pub counters: InterfaceCounters,
}

pub struct InterfaceInstance<F> {
    core: InstanceCore,
    fs: F,
    dir: PathBuf,
    net_dev: PathBuf,
    info: InterfaceInfo,
}

impl<F: FileSystem> InterfaceInstance<F> {
    pub fn new(fs: F, name: &str, sys_net_dir: &Path, net_dev: &Path) -> Self {
        Self {
            core: InstanceCore::new(name),
            fs,
            dir: sys_net_dir.join(name),
            net_dev: net_dev.to_path_buf(),
            info: InterfaceInfo {
                name: name.to_string(),
                ..Default::default()
            },
        }
    }

    pub fn info(&self) -> &InterfaceInfo {
        &self.info
    }
}

impl<F: FileSystem> Instance for InterfaceInstance<F> {
    fn core(&self) -> &InstanceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut InstanceCore {
        &mut self.core
    }

    fn update(&mut self) -> Result<(), UpdateError> {
        let flags = parse_hex_flags(&read_value(&self.fs, &self.dir.join("flags"))?)?;
        let operstate = read_value(&self.fs, &self.dir.join("operstate")).unwrap_or_default();

        let content = self.fs.read_to_string(&self.net_dev)?;
        let devices = parse_net_dev(&content)?;
        let Some(dev) = devices.iter().find(|d| d.interface == self.info.name) else {
            return Err(UpdateError::new(CollectError::Gone(format!(
                "interface {} in {}",
                self.info.name,
                self.net_dev.display()
            ))));
        };

        self.info.flags = flags;
        self.info.up = flags & IFF_UP != 0;
        self.info.loopback = flags & IFF_LOOPBACK != 0;
        self.info.running = is_running(&operstate);
        self.info.operstate = operstate;
        self.info.mac_address = read_value(&self.fs, &self.dir.join("address"))
            .ok()
            .filter(|a| !a.is_empty());
        self.info.mtu = read_value(&self.fs, &self.dir.join("mtu"))
            .ok()
            .and_then(|v| v.parse().ok());
        self.info.counters = InterfaceCounters {
            rx_bytes: dev.rx_bytes,
            rx_packets: dev.rx_packets,
            rx_errors: dev.rx_errs,
            rx_dropped: dev.rx_drop,
            tx_bytes: dev.tx_bytes,
            tx_packets: dev.tx_packets,
            tx_errors: dev.tx_errs,
            tx_dropped: dev.tx_drop,
            collisions: dev.collisions,
        };
        Ok(())
    }
}

pub struct NetworkSource<F> {
    fs: F,
    sys_net_dir: PathBuf,
    net_dev: PathBuf,
    include_non_running: bool,
    removal: RemovalPolicy,
}

impl<F: FileSystem + Clone> NetworkSource<F> {
    pub fn new(
        fs: F,
        proc_path: impl AsRef<Path>,
        sys_path: impl AsRef<Path>,
        include_non_running: bool,
        removal: RemovalPolicy,
    ) -> Self {
        Self {
            fs,
            sys_net_dir: sys_path.as_ref().join("class/net"),
            net_dev: proc_path.as_ref().join("net/dev"),
            include_non_running,
            removal,
        }
    }

    /// Whether `name` passes the UP and running filter.
    fn is_active(&self, name: &str) -> bool {
        let dir = self.sys_net_dir.join(name);
        let flags = match read_value(&self.fs, &dir.join("flags"))
            .map_err(CollectError::from)
            .and_then(|raw| parse_hex_flags(&raw).map_err(CollectError::from))
        {
            Ok(flags) => flags,
            Err(e) => {
                // Usually the interface vanished during the listing.
                debug!("network: skipping {}: {}", name, e);
                return false;
            }
        };
        let operstate = read_value(&self.fs, &dir.join("operstate")).unwrap_or_default();
        flags & IFF_UP != 0 && is_running(&operstate)
    }
}

impl<F: FileSystem + Clone> Source for NetworkSource<F> {
    type Instance = InterfaceInstance<F>;
    const KIND: &'static str = "network";

    fn removal_policy(&self) -> RemovalPolicy {
        self.removal
    }

    fn discover(&mut self) -> Result<Vec<InstanceId>, CollectError> {
        let mut ids = Vec::new();
        for path in self.fs.read_dir(&self.sys_net_dir)? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if self.include_non_running || self.is_active(name) {
                ids.push(InstanceId::new(name));
            }
        }
        Ok(ids)
    }

    fn instantiate(&mut self, id: &InstanceId) -> Result<Self::Instance, CollectError> {
        Ok(InterfaceInstance::new(
            self.fs.clone(),
            id.as_str(),
            &self.sys_net_dir,
            &self.net_dev,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MockFs;
    use crate::entity::Enumeration;

    fn interfaces(fs: MockFs, include_non_running: bool) -> Enumeration<NetworkSource<MockFs>> {
        let source = NetworkSource::new(fs, "/proc", "/sys", include_non_running, RemovalPolicy::Remove);
        let mut e = Enumeration::new(source);
        e.init();
        e
    }

    fn names<F: FileSystem + Clone>(e: &Enumeration<NetworkSource<F>>) -> Vec<String> {
        e.ids().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_network_running_only() {
        let mut e = interfaces(MockFs::typical_system(), false);
        e.update(true).unwrap();

        assert_eq!(names(&e), vec!["eth0", "lo"]);
        let eth0 = e.get_instance("eth0").unwrap().info();
        assert!(eth0.up);
        assert!(eth0.running);
        assert!(!eth0.loopback);
        assert_eq!(eth0.mtu, Some(1500));
        assert_eq!(eth0.mac_address.as_deref(), Some("52:54:00:12:34:56"));
        assert_eq!(eth0.counters.rx_bytes, 98765432);
        assert_eq!(eth0.counters.tx_packets, 23456);
        assert!(e.get_instance("lo").unwrap().info().loopback);
    }

    #[test]
    fn test_network_include_non_running() {
        let mut e = interfaces(MockFs::typical_system(), true);
        e.update(true).unwrap();

        assert_eq!(names(&e), vec!["eth0", "eth1", "lo"]);
        let eth1 = e.get_instance("eth1").unwrap();
        assert!(!eth1.is_failure_captured());
        assert!(!eth1.info().up);
        assert_eq!(eth1.info().operstate, "down");
    }

    #[test]
    fn test_network_link_down_removed() {
        let mut fs = MockFs::typical_system();
        let mut e = interfaces(fs.clone(), false);
        e.update(true).unwrap();

        fs.add_file("/sys/class/net/eth0/operstate", "down\n");
        let report = e.update(true).unwrap();
        assert_eq!(report.reconciliation.removed, vec![InstanceId::from("eth0")]);
        assert_eq!(names(&e), vec!["lo"]);
    }

    #[test]
    fn test_network_missing_counters_fails_instance() {
        let mut fs = MockFs::typical_system();
        fs.add_file(
            "/proc/net/dev",
            "    lo: 1 1 0 0 0 0 0 0 1 1 0 0 0 0 0 0\n",
        );
        let mut e = interfaces(fs, false);
        let report = e.update(true).unwrap();

        assert_eq!(report.refresh.map(|r| r.failed), Some(1));
        let eth0 = e.get_instance("eth0").unwrap();
        assert!(eth0.is_failure_captured());
        assert!(eth0.failure_text().contains("interface eth0"));
        assert!(!e.get_instance("lo").unwrap().is_failure_captured());
    }

    #[test]
    fn test_network_unreadable_flags_skipped_in_discovery() {
        let mut fs = MockFs::typical_system();
        fs.remove_file("/sys/class/net/eth0/flags");
        let mut e = interfaces(fs, false);
        e.update(true).unwrap();
        assert_eq!(names(&e), vec!["lo"]);
    }

    #[test]
    fn test_network_no_sysfs() {
        let mut e = interfaces(MockFs::broken_system(), false);
        assert!(e.update(false).is_err());
        assert!(e.is_empty());
    }
}
