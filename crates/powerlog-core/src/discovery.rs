//! One-shot discovery of RAPL domains, logical cores, idle states and the
//! P-state mode.
//!
//! Discovery runs once before the sampling loop and fixes everything the
//! output schema depends on. [`scan_idle_states`] is also the per-tick idle
//! state reader.

use std::path::Path;

use log::debug;

use crate::delta::{EnergyDomain, FALLBACK_MAX_ENERGY_UJ};
use crate::error::{Error, Result};
use crate::sysfs::{self, SysPaths};

/// Powercap zone prefix shared by RAPL packages and their subzones.
const RAPL_PREFIX: &str = "intel-rapl:";

/// P-state status that exposes a per-core energy/performance preference.
pub const PSTATE_ACTIVE: &str = "active";

/// Sentinel for unreadable string attributes such as the governor.
pub const UNKNOWN: &str = "unknown";

// ---------------------------------------------------------------------------
// Energy domains
// ---------------------------------------------------------------------------

/// Whether a powercap entry name is a RAPL zone: `intel-rapl:<digit>...`.
///
/// Matches both packages (`intel-rapl:0`) and subzones (`intel-rapl:0:1`),
/// but not the `intel-rapl` control type itself.
pub fn is_rapl_zone(name: &str) -> bool {
    name.strip_prefix(RAPL_PREFIX)
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_digit())
}

/// Enumerate RAPL zones with a live `energy_uj` counter, sorted by zone name.
///
/// A zone is live when its seeding read parses; zones whose counter cannot be
/// read (root-only on recent kernels) are skipped. The wraparound modulus is
/// read from the first live zone only and shared by all zones.
pub fn discover_energy_domains(paths: &SysPaths) -> Result<Vec<EnergyDomain>> {
    let root = paths.powercap();
    let mut zones: Vec<(String, std::path::PathBuf)> = std::fs::read_dir(&root)
        .map(|entries| {
            entries
                .flatten()
                .filter_map(|e| {
                    let name = e.file_name().to_str()?.to_string();
                    is_rapl_zone(&name).then(|| (name, e.path()))
                })
                .collect()
        })
        .unwrap_or_default();
    zones.sort_by(|a, b| a.0.cmp(&b.0));

    let live: Vec<(String, std::path::PathBuf, u64)> = zones
        .into_iter()
        .filter_map(|(zone, dir)| match sysfs::read_u64(&dir.join("energy_uj")) {
            Some(seed) => Some((zone, dir, seed)),
            None => {
                debug!("RAPL zone {zone}: energy_uj unreadable, skipped");
                None
            }
        })
        .collect();

    let Some((_, first, _)) = live.first() else {
        return Err(Error::NoEnergyDomains { root });
    };
    let max_value = detect_max_energy(first);

    let domains: Vec<EnergyDomain> = live
        .into_iter()
        .map(|(zone, dir, seed)| {
            let name = sysfs::read_trimmed(&dir.join("name")).unwrap_or_else(|| UNKNOWN.into());
            debug!("RAPL zone {zone}: {name} (seed {seed})");
            EnergyDomain {
                name,
                energy_path: dir.join("energy_uj"),
                max_value,
                prev_reading: Some(seed),
            }
        })
        .collect();

    debug!(
        "{} RAPL domain(s), wraparound modulus {max_value} uJ",
        domains.len()
    );
    Ok(domains)
}

/// Read `max_energy_range_uj`, falling back to a 32-bit modulus.
fn detect_max_energy(zone_dir: &Path) -> u64 {
    sysfs::read_u64(&zone_dir.join("max_energy_range_uj"))
        .filter(|&v| v > 0)
        .unwrap_or(FALLBACK_MAX_ENERGY_UJ)
}

// ---------------------------------------------------------------------------
// Cores
// ---------------------------------------------------------------------------

/// Enumerate logical cores from `cpu<N>` directories, sorted by id.
///
/// Falls back to `0..configured_cpus()` when the cpu directory cannot be
/// listed or holds no core entries.
pub fn discover_cores(paths: &SysPaths) -> Vec<usize> {
    let ids: Vec<usize> = sysfs::list_indexed(&paths.cpu_root(), "cpu")
        .unwrap_or_default()
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    if ids.is_empty() {
        (0..sysfs::configured_cpus()).collect()
    } else {
        ids
    }
}

// ---------------------------------------------------------------------------
// Idle states
// ---------------------------------------------------------------------------

/// One cpuidle state entry of one core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdleStateEntry {
    /// State name as reported by the driver (`POLL`, `C1E`, `C6`, ...).
    pub name: String,
    /// Column key, `CPU<n>_<name>`.
    pub key: String,
    /// `disable` file reads `0`.
    pub enabled: bool,
    /// Cumulative residency in µs.
    pub time_us: u64,
}

/// Idle states of one core, in state-index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreIdleStates {
    pub core: usize,
    pub states: Vec<IdleStateEntry>,
}

impl CoreIdleStates {
    /// Names of currently enabled states.
    pub fn enabled_names(&self) -> Vec<&str> {
        self.states
            .iter()
            .filter(|s| s.enabled)
            .map(|s| s.name.as_str())
            .collect()
    }
}

/// Column key for an idle state of a core.
pub fn idle_key(core: usize, name: &str) -> String {
    format!("CPU{core}_{name}")
}

/// Read every idle state of each core that exposes `name`, `disable` and
/// `time`. Entries with any unreadable attribute are skipped; a core without
/// a cpuidle directory yields an empty list.
pub fn scan_idle_states(paths: &SysPaths, cores: &[usize]) -> Vec<CoreIdleStates> {
    cores
        .iter()
        .map(|&core| CoreIdleStates {
            core,
            states: scan_core_idle_states(&paths.cpuidle_dir(core), core),
        })
        .collect()
}

fn scan_core_idle_states(dir: &Path, core: usize) -> Vec<IdleStateEntry> {
    let Some(entries) = sysfs::list_indexed(dir, "state") else {
        return Vec::new();
    };
    entries
        .into_iter()
        .filter_map(|(_, state_dir)| {
            let disable = sysfs::read_trimmed(&state_dir.join("disable"))?;
            let name = sysfs::read_trimmed(&state_dir.join("name"))?;
            let time_us = sysfs::read_u64(&state_dir.join("time"))?;
            Some(IdleStateEntry {
                key: idle_key(core, &name),
                enabled: disable == "0",
                name,
                time_us,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// P-state
// ---------------------------------------------------------------------------

/// Read `intel_pstate/status` with CR/LF stripped, or `unknown`.
pub fn read_pstate_status(paths: &SysPaths) -> String {
    sysfs::read_trimmed(&paths.pstate_status())
        .map(|s| s.replace(['\r', '\n'], ""))
        .unwrap_or_else(|| UNKNOWN.into())
}

/// Shape of the P-state columns, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PstateMode {
    /// Driver in `active` mode: one preference column per listed core.
    Active { cores: Vec<usize> },
    /// Any other status: one column holding the status string.
    Status,
}

/// Decide the P-state column shape from the startup status.
///
/// In active mode the listed cores are those exposing
/// `energy_performance_preference` at startup.
pub fn detect_pstate_mode(paths: &SysPaths, cores: &[usize]) -> PstateMode {
    if read_pstate_status(paths) != PSTATE_ACTIVE {
        return PstateMode::Status;
    }
    let cores = cores
        .iter()
        .copied()
        .filter(|&c| {
            paths
                .cpufreq_dir(c)
                .join("energy_performance_preference")
                .is_file()
        })
        .collect();
    PstateMode::Active { cores }
}

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

/// Everything discovered before the sampling loop starts.
#[derive(Debug, Clone)]
pub struct Topology {
    pub domains: Vec<EnergyDomain>,
    pub cores: Vec<usize>,
    pub idle: Vec<CoreIdleStates>,
    pub pstate: PstateMode,
}

impl Topology {
    /// Sorted, de-duplicated idle-state keys across all cores.
    pub fn idle_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .idle
            .iter()
            .flat_map(|c| c.states.iter().map(|s| s.key.clone()))
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

/// Run full discovery. Fails only when no energy domain exists.
pub fn discover(paths: &SysPaths) -> Result<Topology> {
    let domains = discover_energy_domains(paths)?;
    let cores = discover_cores(paths);
    let idle = scan_idle_states(paths, &cores);
    let pstate = detect_pstate_mode(paths, &cores);
    debug!(
        "discovered {} core(s), {:?} P-state columns",
        cores.len(),
        pstate
    );
    Ok(Topology {
        domains,
        cores,
        idle,
        pstate,
    })
}
