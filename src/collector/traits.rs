//! Abstractions for filesystem access to enable testing and mocking.
//!
//! The `FileSystem` trait is the dependency provider every resource source
//! reads through: the real `/proc`, `/sys` and `/etc` trees on Linux, or an
//! in-memory [`MockFs`](crate::collector::MockFs) in tests.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Space accounting for a mounted filesystem, in bytes and inodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FsSpace {
    pub block_size: u64,
    pub total_bytes: u64,
    pub free_bytes: u64,
    /// Free bytes available to unprivileged users.
    pub available_bytes: u64,
    pub total_inodes: u64,
    pub free_inodes: u64,
}

/// Abstraction for filesystem operations.
///
/// This trait allows collectors to read from the real filesystem or from
/// a mock implementation for testing purposes.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    ///
    /// # Arguments
    /// * `path` - Path to the file to read
    ///
    /// # Returns
    /// The file contents as a string, or an I/O error if the file cannot be read.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Lists entries in a directory.
    ///
    /// # Returns
    /// A vector of paths to entries in the directory, or an I/O error.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Queries space usage of the filesystem mounted at `path`.
    fn statvfs(&self, path: &Path) -> io::Result<FsSpace>;
}

/// Reads a single-value file (sysfs attribute, `/proc/sys` entry) and trims
/// the trailing newline.
pub fn read_value<F: FileSystem + ?Sized>(fs: &F, path: &Path) -> io::Result<String> {
    Ok(fs.read_to_string(path)?.trim().to_string())
}

/// Real filesystem implementation that delegates to `std::fs`.
///
/// Use this in production to read from the actual `/proc` filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    /// Creates a new `RealFs` instance.
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(path)?;
        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        // Directory iteration order is unspecified; keep discovery repeatable.
        paths.sort();
        Ok(paths)
    }

    #[cfg(unix)]
    fn statvfs(&self, path: &Path) -> io::Result<FsSpace> {
        let st = nix::sys::statvfs::statvfs(path).map_err(io::Error::from)?;
        let fragment = st.fragment_size() as u64;
        Ok(FsSpace {
            block_size: st.block_size() as u64,
            total_bytes: st.blocks() as u64 * fragment,
            free_bytes: st.blocks_free() as u64 * fragment,
            available_bytes: st.blocks_available() as u64 * fragment,
            total_inodes: st.files() as u64,
            free_inodes: st.files_free() as u64,
        })
    }

    #[cfg(not(unix))]
    fn statvfs(&self, path: &Path) -> io::Result<FsSpace> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("statvfs not available for {:?}", path),
        ))
    }
}
