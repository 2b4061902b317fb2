//! Cumulative-counter to interval-delta conversion.
//!
//! RAPL energy counters are fixed-width and wrap; `/proc/stat` tick counters
//! and cpuidle residency counters are assumed monotonic for the lifetime of a
//! run. Each stateful tracker stores the current reading as its new previous
//! value on every observation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Wraparound modulus used when a domain does not report `max_energy_range_uj`.
pub const FALLBACK_MAX_ENERGY_UJ: u64 = 1 << 32;

/// Energy consumed between two cumulative readings, in µJ.
///
/// A decreasing counter is treated as exactly one wrap at `max_value`.
pub fn energy_delta(prev: u64, curr: u64, max_value: u64) -> u64 {
    if curr >= prev {
        curr - prev
    } else {
        max_value.saturating_sub(prev).saturating_add(curr)
    }
}

/// Average power over the nominal interval.
///
/// Uses the configured interval rather than the measured one, so cadence
/// drift is not reflected in the wattage.
pub fn power_watts(delta_uj: u64, nominal_interval: Duration) -> f64 {
    let secs = nominal_interval.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    delta_uj as f64 / 1_000_000.0 / secs
}

/// Scheduler tick counters for one logical core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTicks {
    /// `idle + iowait`
    pub idle: u64,
    /// Sum of every column on the `cpuN` line.
    pub total: u64,
}

/// Busy percentage between two tick snapshots: `100 * (1 - Δidle/Δtotal)`,
/// or `0` when no ticks elapsed. Not clamped.
pub fn usage_pct(prev: CpuTicks, curr: CpuTicks) -> f64 {
    let delta_idle = curr.idle as i128 - prev.idle as i128;
    let delta_total = curr.total as i128 - prev.total as i128;
    if delta_total > 0 {
        100.0 * (1.0 - delta_idle as f64 / delta_total as f64)
    } else {
        0.0
    }
}

/// Residency delta in milliseconds from cumulative µs counters. Negative
/// when the counter went backwards.
pub fn residency_ms(prev_us: u64, curr_us: u64) -> f64 {
    (curr_us as i128 - prev_us as i128) as f64 / 1_000.0
}

// ---------------------------------------------------------------------------
// Stateful trackers
// ---------------------------------------------------------------------------

/// A RAPL energy-accounting zone.
#[derive(Debug, Clone)]
pub struct EnergyDomain {
    /// Contents of the zone's `name` file (e.g. `package-0`, `dram`).
    pub name: String,
    /// Path to the zone's `energy_uj` counter.
    pub energy_path: PathBuf,
    /// Wraparound modulus in µJ.
    pub max_value: u64,
    /// Last observed cumulative reading.
    pub prev_reading: Option<u64>,
}

impl EnergyDomain {
    /// Feed a new cumulative reading and return the interval power.
    ///
    /// Returns `None` when either this or the previous reading is missing.
    /// A missing reading leaves the previous value untouched.
    pub fn observe(&mut self, curr: Option<u64>, nominal_interval: Duration) -> Option<f64> {
        let curr = curr?;
        let prev = self.prev_reading.replace(curr)?;
        let delta = energy_delta(prev, curr, self.max_value);
        Some(power_watts(delta, nominal_interval))
    }
}

/// Utilization tracker for one logical core.
#[derive(Debug, Clone)]
pub struct CoreState {
    pub id: usize,
    pub prev: Option<CpuTicks>,
}

impl CoreState {
    pub fn new(id: usize) -> Self {
        Self { id, prev: None }
    }

    /// Feed the core's current ticks. A core absent from `/proc/stat`, or
    /// observed for the first time, reports `0.0`.
    pub fn observe(&mut self, curr: Option<CpuTicks>) -> f64 {
        let Some(curr) = curr else {
            return 0.0;
        };
        let usage = self.prev.map_or(0.0, |prev| usage_pct(prev, curr));
        self.prev = Some(curr);
        usage
    }
}

/// Previous cumulative residency per idle-state key (`CPU<n>_<state>`).
#[derive(Debug, Clone, Default)]
pub struct ResidencyTracker {
    prev: HashMap<String, u64>,
}

impl ResidencyTracker {
    pub fn seeded(times: impl IntoIterator<Item = (String, u64)>) -> Self {
        Self {
            prev: times.into_iter().collect(),
        }
    }

    /// Store `curr_us` for `key` and return the delta in ms since the
    /// previous observation (`0.0` for a key seen for the first time).
    pub fn observe(&mut self, key: &str, curr_us: u64) -> f64 {
        let prev = self.prev.insert(key.to_string(), curr_us).unwrap_or(curr_us);
        residency_ms(prev, curr_us)
    }

    pub fn previous(&self, key: &str) -> Option<u64> {
        self.prev.get(key).copied()
    }
}
