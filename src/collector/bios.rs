//! Firmware and board identity from the DMI tables exported in sysfs.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::collector::traits::{FileSystem, read_value};
use crate::entity::{Instance, InstanceCore, Source};
use crate::error::UpdateError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BiosInfo {
    pub vendor: String,
    pub version: String,
    pub release_date: String,
    /// `major.minor` BIOS release, when the firmware reports one.
    pub release: Option<String>,
    pub system_vendor: Option<String>,
    pub product_name: Option<String>,
    pub board_vendor: Option<String>,
    pub board_name: Option<String>,
}

pub struct BiosInstance<F> {
    core: InstanceCore,
    fs: F,
    dmi_dir: PathBuf,
    info: BiosInfo,
}

impl<F: FileSystem> BiosInstance<F> {
    pub fn new(fs: F, sys_path: &Path) -> Self {
        Self {
            core: InstanceCore::total(),
            fs,
            dmi_dir: sys_path.join("class/dmi/id"),
            info: BiosInfo::default(),
        }
    }

    pub fn info(&self) -> &BiosInfo {
        &self.info
    }

    fn optional(&self, name: &str) -> Option<String> {
        read_value(&self.fs, &self.dmi_dir.join(name))
            .ok()
            .filter(|v| !v.is_empty())
    }
}

impl<F: FileSystem> Instance for BiosInstance<F> {
    fn core(&self) -> &InstanceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut InstanceCore {
        &mut self.core
    }

    fn update(&mut self) -> Result<(), UpdateError> {
        // Without a vendor there is no DMI table worth reporting.
        let vendor = read_value(&self.fs, &self.dmi_dir.join("bios_vendor"))?;

        self.info = BiosInfo {
            vendor,
            version: self.optional("bios_version").unwrap_or_default(),
            release_date: self.optional("bios_date").unwrap_or_default(),
            release: self.optional("bios_release"),
            system_vendor: self.optional("sys_vendor"),
            product_name: self.optional("product_name"),
            board_vendor: self.optional("board_vendor"),
            board_name: self.optional("board_name"),
        };
        Ok(())
    }
}

/// Source for the bios kind. Installs the Total instance only.
pub struct BiosSource<F> {
    fs: F,
    sys_path: PathBuf,
}

impl<F: FileSystem + Clone> BiosSource<F> {
    pub fn new(fs: F, sys_path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            sys_path: sys_path.into(),
        }
    }
}

impl<F: FileSystem + Clone> Source for BiosSource<F> {
    type Instance = BiosInstance<F>;
    const KIND: &'static str = "bios";

    fn total_instance(&mut self) -> Option<Self::Instance> {
        Some(BiosInstance::new(self.fs.clone(), &self.sys_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MockFs;
    use crate::entity::Enumeration;

    fn refreshed(fs: MockFs) -> Enumeration<BiosSource<MockFs>> {
        let mut e = Enumeration::new(BiosSource::new(fs, "/sys"));
        e.init();
        e.update(true).unwrap();
        e
    }

    #[test]
    fn test_bios_typical() {
        let e = refreshed(MockFs::typical_system());
        let info = e.get_total_instance().unwrap().info();
        assert_eq!(info.vendor, "American Megatrends Inc.");
        assert_eq!(info.version, "F.42");
        assert_eq!(info.release.as_deref(), Some("5.17"));
        assert_eq!(info.product_name.as_deref(), Some("ProLiant DL360 Gen10"));
    }

    #[test]
    fn test_bios_optional_fields() {
        let mut fs = MockFs::new();
        fs.add_file("/sys/class/dmi/id/bios_vendor", "SeaBIOS\n");
        fs.add_file("/sys/class/dmi/id/board_name", "\n");
        let e = refreshed(fs);
        let total = e.get_total_instance().unwrap();
        assert!(!total.is_failure_captured());
        assert_eq!(total.info().version, "");
        assert_eq!(total.info().release, None);
        assert_eq!(total.info().board_name, None);
    }

    #[test]
    fn test_bios_missing_dmi_captured() {
        let e = refreshed(MockFs::minimal_system());
        let total = e.get_total_instance().unwrap();
        assert!(total.is_failure_captured());
        assert!(total.failure_text().starts_with("I/O error"));
        assert!(total.failure_text().contains("bios.rs"));
    }
}
