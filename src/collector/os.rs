//! Operating system identity: kernel, distribution, hostname and uptime.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::collector::parser::{OsRelease, parse_os_release, parse_uptime};
use crate::collector::traits::{FileSystem, read_value};
use crate::entity::{Instance, InstanceCore, Source};
use crate::error::{CollectError, UpdateError};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OsInfo {
    /// Kernel name (`Linux`).
    pub os_type: String,
    pub kernel_release: String,
    pub hostname: String,
    pub distro_id: String,
    pub distro_name: String,
    pub distro_version: String,
    pub pretty_name: String,
    pub uptime_secs: Option<f64>,
}

pub struct OsInstance<F> {
    core: InstanceCore,
    fs: F,
    kernel_dir: PathBuf,
    uptime: PathBuf,
    os_release: Vec<PathBuf>,
    info: OsInfo,
}

impl<F: FileSystem> OsInstance<F> {
    /// `usr_path/lib/os-release` is read when `etc_path/os-release` is absent.
    pub fn new(fs: F, proc_path: &Path, etc_path: &Path, usr_path: &Path) -> Self {
        Self {
            core: InstanceCore::total(),
            fs,
            kernel_dir: proc_path.join("sys/kernel"),
            uptime: proc_path.join("uptime"),
            os_release: vec![etc_path.join("os-release"), usr_path.join("lib/os-release")],
            info: OsInfo::default(),
        }
    }

    pub fn info(&self) -> &OsInfo {
        &self.info
    }

    /// First readable os-release candidate.
    fn read_release(&self) -> Option<Result<OsRelease, CollectError>> {
        self.os_release.iter().find_map(|path| {
            self.fs
                .read_to_string(path)
                .ok()
                .map(|content| parse_os_release(&content).map_err(CollectError::from))
        })
    }

    fn kernel_value(&self, name: &str) -> Option<String> {
        read_value(&self.fs, &self.kernel_dir.join(name)).ok()
    }
}

impl<F: FileSystem> Instance for OsInstance<F> {
    fn core(&self) -> &InstanceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut InstanceCore {
        &mut self.core
    }

    fn update(&mut self) -> Result<(), UpdateError> {
        let release = self.read_release().transpose()?;
        let os_type = self.kernel_value("ostype");
        if release.is_none() && os_type.is_none() {
            return Err(UpdateError::new(CollectError::Unavailable(
                "neither os-release nor kernel ostype is readable".to_string(),
            )));
        }

        let uptime_secs = match self.fs.read_to_string(&self.uptime) {
            Ok(content) => match parse_uptime(&content) {
                Ok(secs) => Some(secs),
                Err(e) => {
                    debug!("os: ignoring uptime: {}", e);
                    None
                }
            },
            Err(_) => None,
        };

        let release = release.unwrap_or_default();
        self.info = OsInfo {
            os_type: os_type.unwrap_or_else(|| "Linux".to_string()),
            kernel_release: self.kernel_value("osrelease").unwrap_or_default(),
            hostname: self.kernel_value("hostname").unwrap_or_default(),
            distro_id: release.id,
            distro_name: release.name,
            distro_version: release.version_id,
            pretty_name: release.pretty_name,
            uptime_secs,
        };
        Ok(())
    }
}

/// Source for the os kind. Installs the Total instance only.
pub struct OsSource<F> {
    fs: F,
    proc_path: PathBuf,
    etc_path: PathBuf,
    usr_path: PathBuf,
}

impl<F: FileSystem + Clone> OsSource<F> {
    pub fn new(
        fs: F,
        proc_path: impl Into<PathBuf>,
        etc_path: impl Into<PathBuf>,
        usr_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            etc_path: etc_path.into(),
            usr_path: usr_path.into(),
        }
    }
}

impl<F: FileSystem + Clone> Source for OsSource<F> {
    type Instance = OsInstance<F>;
    const KIND: &'static str = "os";

    fn total_instance(&mut self) -> Option<Self::Instance> {
        Some(OsInstance::new(
            self.fs.clone(),
            &self.proc_path,
            &self.etc_path,
            &self.usr_path,
        ))
    }
}
