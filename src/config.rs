//! Agent configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! [paths]
//! proc = "/proc"
//!
//! [log]
//! level = "info"
//! [log.modules]
//! "syspal::entity" = "debug"
//!
//! [collect]
//! interval_secs = 10
//!
//! [disk]
//! removal = "mark_stale"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::collector::disk::DEFAULT_IGNORED_FILESYSTEMS;
use crate::entity::RemovalPolicy;
use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub paths: PathsConfig,
    pub log: LogConfig,
    pub collect: CollectConfig,
    pub cpu: KindConfig,
    pub disk: DiskConfig,
    pub network: NetworkConfig,
    pub software: SoftwareConfig,
}

impl Config {
    /// Reads and parses the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Roots of the provider trees. Overridable to read from a captured snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub proc: PathBuf,
    pub sys: PathBuf,
    pub etc: PathBuf,
    /// Holds the `lib/os-release` fallback.
    pub usr: PathBuf,
    pub dpkg_status: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            proc: PathBuf::from("/proc"),
            sys: PathBuf::from("/sys"),
            etc: PathBuf::from("/etc"),
            usr: PathBuf::from("/usr"),
            dpkg_status: PathBuf::from("/var/lib/dpkg/status"),
        }
    }
}

/// Log severity threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
    Off,
}

impl Severity {
    /// Level name as understood by `tracing_subscriber::EnvFilter`.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Off => "off",
        }
    }
}

/// Global threshold plus per-module overrides.
///
/// A module override applies to that module path and everything below it;
/// the longest matching path wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub level: Severity,
    pub modules: BTreeMap<String, Severity>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Severity::Info,
            modules: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectConfig {
    pub interval_secs: u64,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self { interval_secs: 10 }
    }
}

/// Settings shared by kinds that only choose a removal policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KindConfig {
    pub removal: RemovalPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiskConfig {
    pub removal: RemovalPolicy,
    /// Filesystem types never reported as disks.
    pub ignored_filesystems: Vec<String>,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            removal: RemovalPolicy::Remove,
            ignored_filesystems: DEFAULT_IGNORED_FILESYSTEMS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    pub removal: RemovalPolicy,
    /// Also track interfaces that are down or have no carrier.
    pub include_non_running: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SoftwareConfig {
    pub removal: RemovalPolicy,
}

impl Default for SoftwareConfig {
    fn default() -> Self {
        // Uninstalled packages stay visible until the agent restarts.
        Self {
            removal: RemovalPolicy::Retain,
        }
    }
}
