//! One sampling tick: snapshot, deltas, probe, typed row.

use std::collections::HashSet;
use std::time::Duration;

use log::debug;

use crate::clock::format_row_timestamp;
use crate::delta::{CoreState, ResidencyTracker};
use crate::discovery::{PstateMode, Topology};
use crate::probe::LatencyProbe;
use crate::schema::{CoreSample, PstateFields, Reading, SampleRow, Schema};
use crate::snapshot::{self, Snapshot};
use crate::sysfs::SysPaths;

/// Stateful per-run sampler.
///
/// Owns every piece of cross-tick state: previous energy readings (inside the
/// topology's domains), previous per-core ticks and previous idle residency.
pub struct Sampler {
    paths: SysPaths,
    topology: Topology,
    schema: Schema,
    interval: Duration,
    cores: Vec<CoreState>,
    residency: ResidencyTracker,
    probe: Box<dyn LatencyProbe>,
    ignored_keys: HashSet<String>,
}

impl Sampler {
    /// Build a sampler from a finished discovery.
    ///
    /// Per-core ticks are seeded from one `/proc/stat` read and idle
    /// residency from the discovery scan, so the first row already carries
    /// real deltas.
    pub fn new(
        paths: SysPaths,
        topology: Topology,
        interval: Duration,
        probe: Box<dyn LatencyProbe>,
    ) -> Self {
        let schema = Schema::from_topology(&topology);
        let ticks = snapshot::read_cpu_ticks(&paths);
        let cores = topology
            .cores
            .iter()
            .map(|&id| {
                let mut state = CoreState::new(id);
                state.prev = ticks.as_ref().and_then(|t| t.get(&id).copied());
                state
            })
            .collect();
        let residency = ResidencyTracker::seeded(
            topology
                .idle
                .iter()
                .flat_map(|c| c.states.iter().map(|s| (s.key.clone(), s.time_us))),
        );

        Self {
            paths,
            topology,
            schema,
            interval,
            cores,
            residency,
            probe,
            ignored_keys: HashSet::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Take one sample. `wall_time` (since the Unix epoch) stamps the row.
    pub fn tick(&mut self, wall_time: Duration) -> SampleRow {
        let timestamp = format_row_timestamp(wall_time);
        let snap = snapshot::read_snapshot(&self.paths, &self.topology);
        let mut row = self.compute(&snap, timestamp);
        row.latency_ms = self.probe.measure().as_secs_f64() * 1_000.0;
        row
    }

    fn compute(&mut self, snap: &Snapshot, timestamp: String) -> SampleRow {
        let interval = self.interval;
        let power_w = self
            .topology
            .domains
            .iter_mut()
            .zip(&snap.energy_uj)
            .map(|(domain, &curr)| {
                let watts = domain.observe(curr, interval);
                if curr.is_none() {
                    debug!("energy read failed for {}", domain.name);
                }
                Reading::from(watts)
            })
            .collect();

        let cores = self
            .cores
            .iter_mut()
            .zip(&snap.freq_khz)
            .map(|(core, khz)| {
                let utilization_pct = match &snap.cpu_ticks {
                    Some(ticks) => Reading::Available(core.observe(ticks.get(&core.id).copied())),
                    None => Reading::Unavailable,
                };
                CoreSample {
                    freq_mhz: Reading::from(khz.map(|k| k as f64 / 1_000.0)),
                    utilization_pct,
                }
            })
            .collect();

        let pstate = match &self.topology.pstate {
            PstateMode::Active { .. } => PstateFields::PerCore(
                snap.preferences.iter().cloned().map(Reading::from).collect(),
            ),
            PstateMode::Status => PstateFields::Status(Reading::from(snap.pstate_status.clone())),
        };

        let enabled_states = self
            .topology
            .cores
            .iter()
            .map(|&core| {
                snap.idle
                    .iter()
                    .find(|c| c.core == core)
                    .map(|c| c.enabled_names().join(" "))
                    .unwrap_or_default()
            })
            .collect();

        let mut residency_ms = vec![0.0; self.schema.idle_keys().len()];
        for state in snap.idle.iter().flat_map(|c| &c.states) {
            let delta = self.residency.observe(&state.key, state.time_us);
            match self.schema.residency_index(&state.key) {
                Some(i) if state.enabled => residency_ms[i] = delta,
                Some(_) => {}
                None => {
                    if self.ignored_keys.insert(state.key.clone()) {
                        debug!("idle state {} appeared after startup; not logged", state.key);
                    }
                }
            }
        }

        SampleRow {
            timestamp,
            power_w,
            cores,
            governor: Reading::from(snap.governor.clone()),
            pstate,
            enabled_states,
            residency_ms,
            latency_ms: 0.0,
        }
    }
}
