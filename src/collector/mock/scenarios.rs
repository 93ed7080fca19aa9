//! Pre-built mock filesystem scenarios for testing.
//!
//! These scenarios provide realistic `/proc`, `/sys` and `/etc` states
//! for testing various system conditions.

use super::filesystem::MockFs;
use crate::collector::traits::FsSpace;

const GIB: u64 = 1 << 30;

impl MockFs {
    /// Creates a typical host: 4 CPUs, two real mounts (`/` and `/var`),
    /// three network interfaces (one of them down) and a small dpkg database.
    pub fn typical_system() -> Self {
        let mut fs = Self::new();

        // System-wide files
        fs.add_file("/proc/uptime", "12345.67 98765.43\n");
        fs.add_file(
            "/proc/meminfo",
            "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
MemAvailable:   12000000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapCached:            0 kB
Active:          4096000 kB
Inactive:        2048000 kB
SwapTotal:       4096000 kB
SwapFree:        4096000 kB
Dirty:              1024 kB
Writeback:             0 kB
Slab:             512000 kB
SReclaimable:     256000 kB
",
        );
        fs.add_file(
            "/proc/stat",
            "\
cpu  10000 500 3000 80000 1000 200 100 0 0 0
cpu0 2500 125 750 20000 250 50 25 0 0 0
cpu1 2500 125 750 20000 250 50 25 0 0 0
cpu2 2500 125 750 20000 250 50 25 0 0 0
cpu3 2500 125 750 20000 250 50 25 0 0 0
intr 1000000 50 0 0 0 0 0 0 0 1 0 0 0 100 0 0 1000
ctxt 500000
btime 1700000000
processes 10000
procs_running 2
procs_blocked 0
",
        );

        // Kernel and distribution identity
        fs.add_file("/proc/sys/kernel/ostype", "Linux\n");
        fs.add_file("/proc/sys/kernel/osrelease", "6.5.0-14-generic\n");
        fs.add_file("/proc/sys/kernel/hostname", "web-01\n");
        fs.add_file(
            "/etc/os-release",
            "\
PRETTY_NAME=\"Ubuntu 22.04.3 LTS\"
NAME=\"Ubuntu\"
VERSION_ID=\"22.04\"
VERSION=\"22.04.3 LTS (Jammy Jellyfish)\"
ID=ubuntu
ID_LIKE=debian
",
        );

        // Firmware
        fs.add_file("/sys/class/dmi/id/bios_vendor", "American Megatrends Inc.\n");
        fs.add_file("/sys/class/dmi/id/bios_version", "F.42\n");
        fs.add_file("/sys/class/dmi/id/bios_date", "03/15/2023\n");
        fs.add_file("/sys/class/dmi/id/bios_release", "5.17\n");
        fs.add_file("/sys/class/dmi/id/sys_vendor", "HP\n");
        fs.add_file("/sys/class/dmi/id/product_name", "ProLiant DL360 Gen10\n");
        fs.add_file("/sys/class/dmi/id/board_vendor", "HP\n");
        fs.add_file("/sys/class/dmi/id/board_name", "ProLiant DL360 Gen10\n");

        // Mount table: two real filesystems among pseudo filesystems
        fs.add_file(
            "/proc/mounts",
            "\
/dev/sda1 / ext4 rw,relatime,errors=remount-ro 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
tmpfs /run tmpfs rw,nosuid,nodev,size=1638400k,mode=755 0 0
cgroup2 /sys/fs/cgroup cgroup2 rw,nosuid,nodev,noexec,relatime 0 0
/dev/sda2 /var xfs rw,relatime,attr2,inode64 0 0
",
        );
        fs.set_space(
            "/",
            FsSpace {
                block_size: 4096,
                total_bytes: 100 * GIB,
                free_bytes: 60 * GIB,
                available_bytes: 55 * GIB,
                total_inodes: 6_553_600,
                free_inodes: 5_000_000,
            },
        );
        fs.set_space(
            "/var",
            FsSpace {
                block_size: 4096,
                total_bytes: 200 * GIB,
                free_bytes: 150 * GIB,
                available_bytes: 150 * GIB,
                total_inodes: 13_107_200,
                free_inodes: 13_000_000,
            },
        );

        // Network interfaces
        add_interface(&mut fs, "eth0", "0x1003", "up", "52:54:00:12:34:56", 1500);
        add_interface(&mut fs, "eth1", "0x1002", "down", "52:54:00:ab:cd:ef", 1500);
        add_interface(&mut fs, "lo", "0x9", "unknown", "00:00:00:00:00:00", 65536);
        fs.add_file(
            "/proc/net/dev",
            "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 1234567     1234    0    0    0     0          0         0  1234567     1234    0    0    0     0       0          0
  eth0: 98765432   65432    0    0    0     0          0       100 12345678   23456    0    0    0     0       0          0
  eth1:        0       0    0    0    0     0          0         0        0       0    0    0    0     0       0          0
",
        );

        // Installed software
        fs.add_file(
            "/var/lib/dpkg/status",
            "\
Package: bash
Status: install ok installed
Priority: required
Installed-Size: 1864
Maintainer: Ubuntu Developers <ubuntu-devel-discuss@lists.ubuntu.com>
Architecture: amd64
Version: 5.1-6ubuntu1
Description: GNU Bourne Again SHell
 Bash is an sh-compatible command language interpreter.

Package: coreutils
Status: install ok installed
Installed-Size: 7112
Maintainer: Ubuntu Developers <ubuntu-devel-discuss@lists.ubuntu.com>
Architecture: amd64
Version: 8.32-4.1ubuntu1
Description: GNU core utilities

Package: old-tool
Status: deinstall ok config-files
Version: 0.9-1
Architecture: all

Package: zlib1g
Status: install ok installed
Installed-Size: 164
Architecture: amd64
Version: 1:1.2.11.dfsg-2ubuntu9
Description: compression library - runtime
",
        );

        fs
    }

    /// Creates a minimal container-like system.
    ///
    /// One CPU, only the root mount, loopback only, no DMI firmware data,
    /// no os-release file and an empty dpkg database.
    pub fn minimal_system() -> Self {
        let mut fs = Self::new();

        fs.add_file("/proc/uptime", "100.00 50.00\n");
        fs.add_file(
            "/proc/meminfo",
            "\
MemTotal:        1024000 kB
MemFree:          512000 kB
MemAvailable:     768000 kB
Buffers:           32000 kB
Cached:           128000 kB
SwapTotal:             0 kB
SwapFree:              0 kB
",
        );
        fs.add_file(
            "/proc/stat",
            "\
cpu  100 0 50 1000 0 0 0 0 0 0
cpu0 100 0 50 1000 0 0 0 0 0 0
btime 1700000000
",
        );
        fs.add_file("/proc/sys/kernel/ostype", "Linux\n");
        fs.add_file("/proc/sys/kernel/osrelease", "6.1.0\n");
        fs.add_file("/proc/sys/kernel/hostname", "container\n");

        fs.add_file("/proc/mounts", "overlay / overlay rw,relatime 0 0\n");
        fs.set_space(
            "/",
            FsSpace {
                block_size: 4096,
                total_bytes: 10 * GIB,
                free_bytes: 8 * GIB,
                available_bytes: 8 * GIB,
                total_inodes: 655_360,
                free_inodes: 600_000,
            },
        );

        add_interface(&mut fs, "lo", "0x9", "unknown", "00:00:00:00:00:00", 65536);
        fs.add_file(
            "/proc/net/dev",
            "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:     100       1    0    0    0     0          0         0      100       1    0    0    0     0       0          0
",
        );

        fs.add_file("/var/lib/dpkg/status", "");
        fs
    }

    /// Creates a system whose provider files are missing or malformed.
    ///
    /// Listing sources fail for cpu (bad label), disk (no mount table),
    /// network (no `/sys/class/net`) and software (malformed database);
    /// meminfo has no `MemTotal`.
    pub fn broken_system() -> Self {
        let mut fs = Self::new();

        fs.add_file("/proc/meminfo", "MemFree:   1000 kB\n");
        fs.add_file("/proc/stat", "cpu  1 2 3 4\ncpuX 1 2 3 4\n");
        fs.add_file("/proc/uptime", "garbage\n");
        fs.add_file("/var/lib/dpkg/status", "Package bash without colon\n");

        fs
    }
}

fn add_interface(fs: &mut MockFs, name: &str, flags: &str, operstate: &str, mac: &str, mtu: u32) {
    let base = format!("/sys/class/net/{}", name);
    fs.add_file(format!("{}/flags", base), format!("{}\n", flags));
    fs.add_file(format!("{}/operstate", base), format!("{}\n", operstate));
    fs.add_file(format!("{}/address", base), format!("{}\n", mac));
    fs.add_file(format!("{}/mtu", base), format!("{}\n", mtu));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::traits::FileSystem;
    use std::path::Path;

    #[test]
    fn test_typical_system_has_required_files() {
        let fs = MockFs::typical_system();
        for path in [
            "/proc/meminfo",
            "/proc/stat",
            "/proc/mounts",
            "/proc/net/dev",
            "/etc/os-release",
            "/sys/class/dmi/id/bios_vendor",
            "/var/lib/dpkg/status",
        ] {
            assert!(fs.exists(Path::new(path)), "missing {}", path);
        }
        assert!(fs.statvfs(Path::new("/var")).is_ok());
    }

    #[test]
    fn test_typical_system_interfaces() {
        let fs = MockFs::typical_system();
        let names: Vec<_> = fs
            .read_dir(Path::new("/sys/class/net"))
            .unwrap()
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect();
        assert_eq!(names, vec!["eth0", "eth1", "lo"]);
    }

    #[test]
    fn test_minimal_system_has_no_dmi() {
        let fs = MockFs::minimal_system();
        assert!(!fs.exists(Path::new("/sys/class/dmi/id")));
        assert!(fs.exists(Path::new("/proc/sys/kernel/ostype")));
    }

    #[test]
    fn test_broken_system_has_no_mount_table() {
        let fs = MockFs::broken_system();
        assert!(fs.read_to_string(Path::new("/proc/mounts")).is_err());
        assert!(fs.read_dir(Path::new("/sys/class/net")).is_err());
    }
}
