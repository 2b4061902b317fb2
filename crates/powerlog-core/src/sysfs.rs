//! Filesystem roots and best-effort readers for sysfs/procfs attributes.
//!
//! Every reader here returns `Option` rather than an error: a missing or
//! unreadable attribute is an expected condition on heterogeneous hosts, and
//! callers decide which sentinel to substitute.

use std::path::{Path, PathBuf};

/// Roots of the kernel pseudo-filesystems the sampler reads from.
///
/// Defaults to the live `/sys` and `/proc`. Tests and replay runs point these
/// at a captured tree instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysPaths {
    pub sysfs: PathBuf,
    pub procfs: PathBuf,
}

impl Default for SysPaths {
    fn default() -> Self {
        Self {
            sysfs: PathBuf::from("/sys"),
            procfs: PathBuf::from("/proc"),
        }
    }
}

impl SysPaths {
    pub fn new(sysfs: impl Into<PathBuf>, procfs: impl Into<PathBuf>) -> Self {
        Self {
            sysfs: sysfs.into(),
            procfs: procfs.into(),
        }
    }

    /// `<sysfs>/class/powercap`
    pub fn powercap(&self) -> PathBuf {
        self.sysfs.join("class").join("powercap")
    }

    /// `<sysfs>/devices/system/cpu`
    pub fn cpu_root(&self) -> PathBuf {
        self.sysfs.join("devices").join("system").join("cpu")
    }

    /// `<sysfs>/devices/system/cpu/cpu<N>`
    pub fn cpu_dir(&self, core: usize) -> PathBuf {
        self.cpu_root().join(format!("cpu{core}"))
    }

    /// `<sysfs>/devices/system/cpu/cpu<N>/cpufreq`
    pub fn cpufreq_dir(&self, core: usize) -> PathBuf {
        self.cpu_dir(core).join("cpufreq")
    }

    /// `<sysfs>/devices/system/cpu/cpu<N>/cpuidle`
    pub fn cpuidle_dir(&self, core: usize) -> PathBuf {
        self.cpu_dir(core).join("cpuidle")
    }

    /// `<sysfs>/devices/system/cpu/intel_pstate/status`
    pub fn pstate_status(&self) -> PathBuf {
        self.cpu_root().join("intel_pstate").join("status")
    }

    /// `<procfs>/stat`
    pub fn proc_stat(&self) -> PathBuf {
        self.procfs.join("stat")
    }
}

/// Read a file and return its trimmed contents, or `None` when unreadable or
/// empty.
pub fn read_trimmed(path: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(path).ok()?;
    let v = raw.trim();
    if v.is_empty() {
        None
    } else {
        Some(v.to_string())
    }
}

/// Read the first whitespace-separated token of a file as `u64`.
pub fn read_u64(path: &Path) -> Option<u64> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| s.split_whitespace().next().and_then(|v| v.parse().ok()))
}

/// Parse the numeric suffix of a name like `cpu12` or `state3`.
pub fn numeric_suffix(name: &str, prefix: &str) -> Option<usize> {
    let rest = name.strip_prefix(prefix)?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

/// List `prefix<N>` entries of a directory, sorted by `N`.
pub fn list_indexed(dir: &Path, prefix: &str) -> Option<Vec<(usize, PathBuf)>> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut out: Vec<(usize, PathBuf)> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            let idx = numeric_suffix(name.to_str()?, prefix)?;
            Some((idx, entry.path()))
        })
        .collect();
    out.sort_by_key(|(idx, _)| *idx);
    Some(out)
}

/// Number of configured logical CPUs as reported by the C library.
pub fn configured_cpus() -> usize {
    // SAFETY: `sysconf` has no side effects and is thread-safe for this query.
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_CONF) };
    if n > 0 { n as usize } else { 1 }
}
