//! In-memory mock filesystem for testing collectors without real `/proc`.
//!
//! `MockFs` simulates a filesystem in memory so tests can run on any host.
//! Entries are kept in ordered maps, so `read_dir` is deterministic.

use crate::collector::traits::{FileSystem, FsSpace};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory filesystem for testing.
///
/// Stores files, directories and per-mount space figures in memory, allowing
/// tests to simulate various system states, including devices that vanish
/// between two collection cycles. Clones share the same tree, so a test can
/// keep a handle and change the system after handing a clone to a source.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    tree: Arc<RwLock<Tree>>,
}

#[derive(Debug, Default)]
struct Tree {
    /// Map from path to file contents.
    files: BTreeMap<PathBuf, String>,
    /// Set of directories (for read_dir support).
    directories: BTreeSet<PathBuf>,
    /// `statvfs` results keyed by mount point.
    spaces: BTreeMap<PathBuf, FsSpace>,
}

impl Tree {
    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tree> {
        self.tree.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tree> {
        self.tree.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a file with the given content.
    ///
    /// Parent directories are automatically created.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        let mut tree = self.write();
        tree.add_parents(&path);
        tree.files.insert(path, content.into());
    }

    /// Adds an empty directory.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut tree = self.write();
        tree.add_parents(&path);
        tree.directories.insert(path);
    }

    /// Removes a single file.
    pub fn remove_file(&mut self, path: impl AsRef<Path>) {
        self.write().files.remove(path.as_ref());
    }

    /// Removes a directory together with everything below it.
    pub fn remove_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut tree = self.write();
        tree.files.retain(|p, _| !p.starts_with(path));
        tree.directories.retain(|p| !p.starts_with(path));
    }

    /// Sets the `statvfs` result for a mount point.
    pub fn set_space(&mut self, mount_point: impl AsRef<Path>, space: FsSpace) {
        self.write()
            .spaces
            .insert(mount_point.as_ref().to_path_buf(), space);
    }

    /// Drops the `statvfs` result for a mount point, so queries fail.
    pub fn clear_space(&mut self, mount_point: impl AsRef<Path>) {
        self.write().spaces.remove(mount_point.as_ref());
    }

    /// Loads a mock filesystem from a directory snapshot.
    ///
    /// Files under `dir` are mounted below `virtual_root` (for example a
    /// captured `/sys/class/dmi/id` tree). Binary files are skipped.
    pub fn from_snapshot(dir: &Path, virtual_root: &Path) -> io::Result<Self> {
        let mut fs = Self::new();
        load_directory_recursive(&mut fs, dir, virtual_root)?;
        Ok(fs)
    }
}

fn load_directory_recursive(
    fs: &mut MockFs,
    real_path: &Path,
    virtual_path: &Path,
) -> io::Result<()> {
    fs.add_dir(virtual_path);

    for entry in std::fs::read_dir(real_path)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let real_child = entry.path();
        let virtual_child = virtual_path.join(entry.file_name());

        if file_type.is_dir() {
            load_directory_recursive(fs, &real_child, &virtual_child)?;
        } else if file_type.is_file() {
            if let Ok(content) = std::fs::read_to_string(&real_child) {
                fs.add_file(&virtual_child, content);
            }
        }
    }
    Ok(())
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.read().files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {:?}", path),
            )
        })
    }

    fn exists(&self, path: &Path) -> bool {
        let tree = self.read();
        tree.files.contains_key(path) || tree.directories.contains(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let tree = self.read();
        if !tree.directories.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {:?}", path),
            ));
        }

        let mut entries = BTreeSet::new();

        // Find all files and directories that are direct children
        for file_path in tree.files.keys() {
            if file_path.parent().is_some_and(|parent| parent == path) {
                entries.insert(file_path.clone());
            }
        }

        for dir_path in &tree.directories {
            if dir_path.parent().is_some_and(|parent| parent == path) && dir_path != path {
                entries.insert(dir_path.clone());
            }
        }

        Ok(entries.into_iter().collect())
    }

    fn statvfs(&self, path: &Path) -> io::Result<FsSpace> {
        self.read().spaces.get(path).copied().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no filesystem mounted at {:?}", path),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_fs_add_file() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/meminfo", "MemTotal: 16384 kB\n");

        assert!(fs.exists(Path::new("/proc/meminfo")));
        assert!(fs.exists(Path::new("/proc")));

        let content = fs.read_to_string(Path::new("/proc/meminfo")).unwrap();
        assert_eq!(content, "MemTotal: 16384 kB\n");
    }

    #[test]
    fn test_mock_fs_read_dir_is_sorted() {
        let mut fs = MockFs::new();
        fs.add_file("/sys/class/net/lo/flags", "0x9");
        fs.add_file("/sys/class/net/eth1/flags", "0x1003");
        fs.add_file("/sys/class/net/eth0/flags", "0x1043");

        let entries = fs.read_dir(Path::new("/sys/class/net")).unwrap();
        let names: Vec<_> = entries
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, vec!["eth0", "eth1", "lo"]);
    }

    #[test]
    fn test_mock_fs_remove_dir() {
        let mut fs = MockFs::new();
        fs.add_file("/sys/class/net/eth0/flags", "0x1043");
        fs.add_file("/sys/class/net/eth0/mtu", "1500");
        fs.add_file("/sys/class/net/lo/flags", "0x9");

        fs.remove_dir("/sys/class/net/eth0");
        assert!(!fs.exists(Path::new("/sys/class/net/eth0")));
        assert!(!fs.exists(Path::new("/sys/class/net/eth0/mtu")));
        assert!(fs.exists(Path::new("/sys/class/net/lo/flags")));
    }

    #[test]
    fn test_mock_fs_statvfs() {
        let mut fs = MockFs::new();
        let space = FsSpace {
            block_size: 4096,
            total_bytes: 1 << 30,
            free_bytes: 1 << 29,
            available_bytes: 1 << 28,
            total_inodes: 1000,
            free_inodes: 500,
        };
        fs.set_space("/", space);
        assert_eq!(fs.statvfs(Path::new("/")).unwrap(), space);

        fs.clear_space("/");
        let err = fs.statvfs(Path::new("/")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_mock_fs_clones_share_tree() {
        let mut fs = MockFs::new();
        let reader = fs.clone();
        fs.add_file("/proc/uptime", "1.00 1.00\n");
        assert!(reader.exists(Path::new("/proc/uptime")));

        fs.remove_file("/proc/uptime");
        assert!(!reader.exists(Path::new("/proc/uptime")));
    }

    #[test]
    fn test_mock_fs_not_found() {
        let fs = MockFs::new();
        let result = fs.read_to_string(Path::new("/nonexistent"));
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_mock_fs_from_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bios_vendor"), "Acme\n").unwrap();
        std::fs::create_dir(dir.path().join("power")).unwrap();
        std::fs::write(dir.path().join("power/control"), "auto\n").unwrap();

        let fs = MockFs::from_snapshot(dir.path(), Path::new("/sys/class/dmi/id")).unwrap();
        assert_eq!(
            fs.read_to_string(Path::new("/sys/class/dmi/id/bios_vendor"))
                .unwrap(),
            "Acme\n"
        );
        assert!(fs.exists(Path::new("/sys/class/dmi/id/power/control")));
    }
}
