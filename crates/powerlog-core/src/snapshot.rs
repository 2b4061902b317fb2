//! Per-tick raw reads.
//!
//! Each field is read independently and exactly once. A failed read yields
//! `None` for that field only; the rest of the snapshot is unaffected.

use std::collections::HashMap;

use crate::delta::CpuTicks;
use crate::discovery::{self, CoreIdleStates, PstateMode, Topology};
use crate::sysfs::{self, SysPaths};

/// Raw, uninterpreted readings for one tick.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Cumulative µJ per domain, in topology order.
    pub energy_uj: Vec<Option<u64>>,
    /// `scaling_cur_freq` in kHz per core, in topology order.
    pub freq_khz: Vec<Option<u64>>,
    /// Per-core scheduler ticks, `None` when `/proc/stat` is unreadable.
    pub cpu_ticks: Option<HashMap<usize, CpuTicks>>,
    pub governor: Option<String>,
    pub pstate_status: Option<String>,
    /// Energy/performance preference per active-mode core. Empty in status
    /// mode.
    pub preferences: Vec<Option<String>>,
    pub idle: Vec<CoreIdleStates>,
}

/// Take one snapshot of every field the schema needs.
pub fn read_snapshot(paths: &SysPaths, topology: &Topology) -> Snapshot {
    let energy_uj = topology
        .domains
        .iter()
        .map(|d| sysfs::read_u64(&d.energy_path))
        .collect();
    let freq_khz = topology
        .cores
        .iter()
        .map(|&c| read_frequency_khz(paths, c))
        .collect();
    let cpu_ticks = read_cpu_ticks(paths);
    let governor = read_governor(paths);
    let (pstate_status, preferences) = match &topology.pstate {
        PstateMode::Active { cores } => (
            None,
            cores.iter().map(|&c| read_preference(paths, c)).collect(),
        ),
        PstateMode::Status => (
            sysfs::read_trimmed(&paths.pstate_status()).map(|s| s.replace(['\r', '\n'], "")),
            Vec::new(),
        ),
    };
    let idle = discovery::scan_idle_states(paths, &topology.cores);

    Snapshot {
        energy_uj,
        freq_khz,
        cpu_ticks,
        governor,
        pstate_status,
        preferences,
        idle,
    }
}

/// Current frequency of a core in kHz.
pub fn read_frequency_khz(paths: &SysPaths, core: usize) -> Option<u64> {
    sysfs::read_u64(&paths.cpufreq_dir(core).join("scaling_cur_freq"))
}

/// Scaling governor of cpu0.
pub fn read_governor(paths: &SysPaths) -> Option<String> {
    sysfs::read_trimmed(&paths.cpufreq_dir(0).join("scaling_governor"))
}

/// `energy_performance_preference` of a core.
pub fn read_preference(paths: &SysPaths, core: usize) -> Option<String> {
    sysfs::read_trimmed(&paths.cpufreq_dir(core).join("energy_performance_preference"))
}

/// Read and parse the per-core lines of `/proc/stat`.
pub fn read_cpu_ticks(paths: &SysPaths) -> Option<HashMap<usize, CpuTicks>> {
    let raw = std::fs::read_to_string(paths.proc_stat()).ok()?;
    Some(parse_proc_stat(&raw))
}

/// Parse `cpuN` lines into idle (`idle + iowait`) and total ticks.
///
/// The aggregate `cpu ` line and malformed lines are skipped.
pub fn parse_proc_stat(raw: &str) -> HashMap<usize, CpuTicks> {
    let mut out = HashMap::new();
    for line in raw.lines() {
        let mut parts = line.split_whitespace();
        let Some(label) = parts.next() else {
            continue;
        };
        let Some(core) = sysfs::numeric_suffix(label, "cpu") else {
            continue;
        };
        let values: Vec<u64> = parts.filter_map(|s| s.parse().ok()).collect();
        if values.len() < 4 {
            continue;
        }
        let idle = values[3] + values.get(4).copied().unwrap_or(0);
        let total = values.iter().sum();
        out.insert(core, CpuTicks { idle, total });
    }
    out
}
