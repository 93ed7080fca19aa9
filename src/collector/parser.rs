//! Parsers for provider files (`/proc`, `/sys`, `/etc`, dpkg status).
//!
//! These are pure functions that parse the content of the files into
//! structured data. They are designed to be easily testable with string inputs.

use crate::error::ParseError;

/// Parsed data from `/proc/meminfo`.
#[derive(Debug, Clone, Default)]
pub struct MemInfo {
    /// False when no `MemTotal:` line was found.
    pub has_total: bool,
    pub mem_total: u64,
    pub mem_free: u64,
    pub mem_available: u64,
    pub buffers: u64,
    pub cached: u64,
    pub swap_total: u64,
    pub swap_free: u64,
}

/// Parses `/proc/meminfo` content.
pub fn parse_meminfo(content: &str) -> Result<MemInfo, ParseError> {
    let mut info = MemInfo::default();

    let parse_kb = |line: &str| -> u64 {
        line.split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    };

    for line in content.lines() {
        if line.starts_with("MemTotal:") {
            info.has_total = true;
            info.mem_total = parse_kb(line);
        } else if line.starts_with("MemFree:") {
            info.mem_free = parse_kb(line);
        } else if line.starts_with("MemAvailable:") {
            info.mem_available = parse_kb(line);
        } else if line.starts_with("Buffers:") {
            info.buffers = parse_kb(line);
        } else if line.starts_with("Cached:") {
            info.cached = parse_kb(line);
        } else if line.starts_with("SwapTotal:") {
            info.swap_total = parse_kb(line);
        } else if line.starts_with("SwapFree:") {
            info.swap_free = parse_kb(line);
        }
    }

    Ok(info)
}

/// Single CPU line from `/proc/stat`, in clock ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuStat {
    pub cpu_id: Option<u32>, // None for aggregate "cpu" line
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuStat {
    /// Sum of all states. Guest time is already part of `user`/`nice`.
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }
}

/// CPU lines from `/proc/stat`. Other lines are skipped.
#[derive(Debug, Clone, Default)]
pub struct GlobalStat {
    pub cpus: Vec<CpuStat>,
}

impl GlobalStat {
    /// The aggregate `cpu` line, if present.
    pub fn aggregate(&self) -> Option<&CpuStat> {
        self.cpus.iter().find(|c| c.cpu_id.is_none())
    }

    pub fn cpu(&self, id: u32) -> Option<&CpuStat> {
        self.cpus.iter().find(|c| c.cpu_id == Some(id))
    }
}

/// Parses `/proc/stat` content.
///
/// A `cpuN` line whose suffix is not a number is rejected.
pub fn parse_global_stat(content: &str) -> Result<GlobalStat, ParseError> {
    let mut stat = GlobalStat::default();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(label) = parts.first().filter(|p| p.starts_with("cpu")) else {
            continue;
        };

        let cpu_id = if *label == "cpu" {
            None
        } else {
            let id = label
                .strip_prefix("cpu")
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| ParseError::new(format!("bad cpu label '{}'", label)))?;
            Some(id)
        };

        let get_val =
            |idx: usize| -> u64 { parts.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

        stat.cpus.push(CpuStat {
            cpu_id,
            user: get_val(1),
            nice: get_val(2),
            system: get_val(3),
            idle: get_val(4),
            iowait: get_val(5),
            irq: get_val(6),
            softirq: get_val(7),
            steal: get_val(8),
        });
    }

    Ok(stat)
}

/// Parses `/proc/uptime` content into seconds since boot.
pub fn parse_uptime(content: &str) -> Result<f64, ParseError> {
    content
        .split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ParseError::new("empty or malformed /proc/uptime"))
}

// ============ Mount Table Parser ============

/// One line of `/proc/mounts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
}

/// Parses `/proc/mounts` (or `/proc/self/mounts`) content.
///
/// Format (man 5 fstab): `device mount_point fstype options dump pass`.
/// Whitespace inside fields is octal-escaped by the kernel (`\040`).
pub fn parse_mounts(content: &str) -> Result<Vec<MountEntry>, ParseError> {
    let mut mounts = Vec::new();

    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            return Err(ParseError::new(format!(
                "mount table line {}: expected at least 4 fields",
                lineno + 1
            )));
        }

        mounts.push(MountEntry {
            device: unescape_octal(parts[0]),
            mount_point: unescape_octal(parts[1]),
            fs_type: parts[2].to_string(),
        });
    }

    Ok(mounts)
}

/// Decodes `\NNN` octal escapes used by the kernel in mount tables.
fn unescape_octal(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && bytes[i + 1..i + 4].iter().all(|b| (b'0'..=b'7').contains(b))
        {
            let value = bytes[i + 1..i + 4]
                .iter()
                .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
            if let Ok(byte) = u8::try_from(value) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

// ============ Network Device Stats Parser ============

/// Parsed data from `/proc/net/dev`.
#[derive(Debug, Clone, Default)]
pub struct NetDevStats {
    /// Interface name (eth0, lo, etc.)
    pub interface: String,
    /// Bytes received
    pub rx_bytes: u64,
    /// Packets received
    pub rx_packets: u64,
    /// Receive errors
    pub rx_errs: u64,
    /// Receive drops
    pub rx_drop: u64,
    /// Bytes transmitted
    pub tx_bytes: u64,
    /// Packets transmitted
    pub tx_packets: u64,
    /// Transmit errors
    pub tx_errs: u64,
    /// Transmit drops
    pub tx_drop: u64,
    /// Collisions
    pub collisions: u64,
}

/// Parses `/proc/net/dev` content.
///
/// Format:
/// Inter-|   Receive                                                |  Transmit
///  face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
///    lo: 1234567     1234    0    0    0     0          0         0  1234567     1234    0    0    0     0       0          0
pub fn parse_net_dev(content: &str) -> Result<Vec<NetDevStats>, ParseError> {
    let mut devices = Vec::new();

    for line in content.lines() {
        // Skip header lines
        if line.contains('|') || line.trim().is_empty() {
            continue;
        }

        let Some((name, counters)) = line.split_once(':') else {
            continue;
        };

        let interface = name.trim().to_string();
        let values: Vec<&str> = counters.split_whitespace().collect();
        if values.len() < 16 {
            return Err(ParseError::new(format!(
                "/proc/net/dev: {} has {} counters, expected 16",
                interface,
                values.len()
            )));
        }

        let get_val =
            |idx: usize| -> u64 { values.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

        devices.push(NetDevStats {
            interface,
            rx_bytes: get_val(0),
            rx_packets: get_val(1),
            rx_errs: get_val(2),
            rx_drop: get_val(3),
            tx_bytes: get_val(8),
            tx_packets: get_val(9),
            tx_errs: get_val(10),
            tx_drop: get_val(11),
            collisions: get_val(13),
        });
    }

    Ok(devices)
}

/// Parses a `/sys/class/net/<if>/flags` value (`0x1043`).
pub fn parse_hex_flags(content: &str) -> Result<u32, ParseError> {
    let trimmed = content.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u32::from_str_radix(digits, 16)
        .map_err(|e| ParseError::new(format!("bad interface flags '{}': {}", trimmed, e)))
}

// ============ os-release Parser ============

/// Selected keys of `/etc/os-release`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    pub id: String,
    pub name: String,
    pub version_id: String,
    pub pretty_name: String,
}

/// Parses `os-release(5)` content (`KEY=value`, values optionally quoted).
pub fn parse_os_release(content: &str) -> Result<OsRelease, ParseError> {
    let mut release = OsRelease::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, raw)) = line.split_once('=') else {
            return Err(ParseError::new(format!("os-release: malformed line '{}'", line)));
        };
        let value = unquote(raw.trim());
        match key.trim() {
            "ID" => release.id = value,
            "NAME" => release.name = value,
            "VERSION_ID" => release.version_id = value,
            "PRETTY_NAME" => release.pretty_name = value,
            _ => {}
        }
    }

    Ok(release)
}

fn unquote(value: &str) -> String {
    let stripped = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);
    stripped.replace("\\\"", "\"")
}

// ============ dpkg status Parser ============

/// One package stanza of the dpkg status database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageEntry {
    pub name: String,
    pub status: String,
    pub version: String,
    pub architecture: String,
    pub maintainer: String,
    /// `Installed-Size`, in KiB.
    pub installed_size_kb: u64,
    /// First line of `Description`.
    pub summary: String,
}

impl PackageEntry {
    pub fn is_installed(&self) -> bool {
        self.status == "install ok installed"
    }
}

/// Parses the dpkg status database (`/var/lib/dpkg/status`).
///
/// Stanzas are separated by blank lines; continuation lines start with a
/// space and belong to the previous field. A stanza without `Package:` is an
/// error.
pub fn parse_dpkg_status(content: &str) -> Result<Vec<PackageEntry>, ParseError> {
    let mut packages = Vec::new();
    let mut current = PackageEntry::default();
    let mut in_stanza = false;

    let mut finish = |entry: &mut PackageEntry, in_stanza: &mut bool| -> Result<(), ParseError> {
        if *in_stanza {
            if entry.name.is_empty() {
                return Err(ParseError::new("dpkg status: stanza without Package field"));
            }
            packages.push(std::mem::take(entry));
        }
        *in_stanza = false;
        Ok(())
    };

    for line in content.lines() {
        if line.trim().is_empty() {
            finish(&mut current, &mut in_stanza)?;
            continue;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            continue;
        }
        in_stanza = true;
        let Some((key, value)) = line.split_once(':') else {
            return Err(ParseError::new(format!("dpkg status: malformed line '{}'", line)));
        };
        let value = value.trim();
        match key {
            "Package" => current.name = value.to_string(),
            "Status" => current.status = value.to_string(),
            "Version" => current.version = value.to_string(),
            "Architecture" => current.architecture = value.to_string(),
            "Maintainer" => current.maintainer = value.to_string(),
            "Installed-Size" => current.installed_size_kb = value.parse().unwrap_or(0),
            "Description" => current.summary = value.to_string(),
            _ => {}
        }
    }
    finish(&mut current, &mut in_stanza)?;

    Ok(packages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meminfo() {
        let content = "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
MemAvailable:   12000000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapCached:          100 kB
SwapTotal:       4096000 kB
SwapFree:        4000000 kB
";
        let info = parse_meminfo(content).unwrap();
        assert!(info.has_total);
        assert_eq!(info.mem_total, 16384000);
        assert_eq!(info.mem_available, 12000000);
        assert_eq!(info.cached, 2048000);
        assert_eq!(info.swap_free, 4000000);
    }

    #[test]
    fn test_parse_meminfo_without_total() {
        let info = parse_meminfo("MemFree: 10 kB\n").unwrap();
        assert!(!info.has_total);
    }

    #[test]
    fn test_parse_global_stat() {
        let content = "\
cpu  10000 500 3000 80000 1000 200 100 0 0 0
cpu0 5000 250 1500 40000 500 100 50 0 0 0
cpu1 5000 250 1500 40000 500 100 50 0 0 0
ctxt 500000
btime 1700000000
processes 10000
procs_running 2
procs_blocked 1
";
        let stat = parse_global_stat(content).unwrap();
        assert_eq!(stat.cpus.len(), 3);
        assert_eq!(stat.aggregate().map(|c| c.user), Some(10000));
        assert_eq!(stat.cpu(1).map(|c| c.idle), Some(40000));
        assert!(stat.cpu(2).is_none());
        assert_eq!(stat.aggregate().unwrap().total(), 94800);
    }

    #[test]
    fn test_parse_global_stat_bad_cpu_label() {
        assert!(parse_global_stat("cpuX 1 2 3 4\n").is_err());
    }

    #[test]
    fn test_parse_uptime() {
        assert_eq!(parse_uptime("12345.67 98765.43\n").unwrap(), 12345.67);
        assert!(parse_uptime("").is_err());
    }

    #[test]
    fn test_parse_mounts() {
        let content = "\
/dev/sda1 / ext4 rw,relatime 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
/dev/sdb1 /mnt/my\\040disk xfs rw 0 0
";
        let mounts = parse_mounts(content).unwrap();
        assert_eq!(mounts.len(), 3);
        assert_eq!(mounts[0].device, "/dev/sda1");
        assert_eq!(mounts[0].mount_point, "/");
        assert_eq!(mounts[1].fs_type, "proc");
        assert_eq!(mounts[2].mount_point, "/mnt/my disk");
    }

    #[test]
    fn test_parse_mounts_malformed() {
        assert!(parse_mounts("/dev/sda1 /\n").is_err());
    }

    #[test]
    fn test_unescape_octal_passthrough() {
        assert_eq!(unescape_octal("plain"), "plain");
        assert_eq!(unescape_octal("tab\\011x"), "tab\tx");
        assert_eq!(unescape_octal("trailing\\"), "trailing\\");
        assert_eq!(unescape_octal("bad\\9zz"), "bad\\9zz");
    }

    #[test]
    fn test_parse_net_dev() {
        let content = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 1234567     1234    0    0    0     0          0         0  1234567     1234    0    0    0     0       0          0
  eth0: 98765432   65432    1    2    0     0          0       100 12345678   23456    3    4    0     5       0          0
";
        let devs = parse_net_dev(content).unwrap();
        assert_eq!(devs.len(), 2);
        assert_eq!(devs[1].interface, "eth0");
        assert_eq!(devs[1].rx_bytes, 98765432);
        assert_eq!(devs[1].rx_drop, 2);
        assert_eq!(devs[1].tx_packets, 23456);
        assert_eq!(devs[1].collisions, 5);
    }

    #[test]
    fn test_parse_net_dev_truncated_line() {
        let content = "  eth0: 1 2 3\n";
        assert!(parse_net_dev(content).is_err());
    }

    #[test]
    fn test_parse_hex_flags() {
        assert_eq!(parse_hex_flags("0x1043\n").unwrap(), 0x1043);
        assert_eq!(parse_hex_flags("9").unwrap(), 9);
        assert!(parse_hex_flags("0xZZ").is_err());
    }

    #[test]
    fn test_parse_os_release() {
        let content = "\
# comment
NAME=\"Ubuntu\"
VERSION_ID=\"22.04\"
VERSION=\"22.04.3 LTS (Jammy Jellyfish)\"
ID=ubuntu
PRETTY_NAME='Ubuntu 22.04.3 LTS'
";
        let release = parse_os_release(content).unwrap();
        assert_eq!(release.id, "ubuntu");
        assert_eq!(release.name, "Ubuntu");
        assert_eq!(release.version_id, "22.04");
        assert_eq!(release.pretty_name, "Ubuntu 22.04.3 LTS");
    }

    #[test]
    fn test_parse_os_release_malformed() {
        assert!(parse_os_release("NAME Ubuntu\n").is_err());
    }

    #[test]
    fn test_parse_dpkg_status() {
        let content = "\
Package: bash
Status: install ok installed
Installed-Size: 1864
Maintainer: Ubuntu Developers <ubuntu-devel-discuss@lists.ubuntu.com>
Architecture: amd64
Version: 5.1-6ubuntu1
Description: GNU Bourne Again SHell
 Bash is an sh-compatible command language interpreter.
 .
 More text.

Package: removed-pkg
Status: deinstall ok config-files
Version: 1.0

Package: zlib1g
Status: install ok installed
Version: 1:1.2.11.dfsg-2ubuntu9
";
        let packages = parse_dpkg_status(content).unwrap();
        assert_eq!(packages.len(), 3);
        assert_eq!(packages[0].name, "bash");
        assert_eq!(packages[0].installed_size_kb, 1864);
        assert_eq!(packages[0].summary, "GNU Bourne Again SHell");
        assert!(packages[0].is_installed());
        assert!(!packages[1].is_installed());
        assert_eq!(packages[2].version, "1:1.2.11.dfsg-2ubuntu9");
    }

    #[test]
    fn test_parse_dpkg_status_stanza_without_package() {
        let content = "Status: install ok installed\nVersion: 1.0\n";
        assert!(parse_dpkg_status(content).is_err());
    }
}
