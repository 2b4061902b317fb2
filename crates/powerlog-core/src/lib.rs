//! # powerlog-core
//!
//! **Fixed-cadence CPU power and performance telemetry.**
//!
//! `powerlog-core` samples Intel RAPL energy counters, per-core frequency and
//! utilization, the cpufreq governor, the P-state driver, and per-core idle
//! state residency, and appends one CSV row per tick.
//!
//! ## Quick Start
//!
//! ```no_run
//! use powerlog_core::{MatrixProbe, MonotonicClock, RunFlag, SamplerConfig, run};
//!
//! let config = SamplerConfig::default();
//! let flag = RunFlag::new();
//! powerlog_core::install_termination_handler(&flag)?;
//!
//! let probe = Box::new(MatrixProbe::default());
//! let report = run(&config, &flag, &MonotonicClock::new(), probe)?;
//! println!("{} rows, {} overruns", report.rows_written, report.stats.overruns);
//! # Ok::<(), powerlog_core::Error>(())
//! ```
//!
//! ## Architecture
//!
//! Discovery → Schema → Scheduler { Snapshot → Deltas → Probe → Row } → Writer
//!
//! Everything the header depends on (energy domains, cores, idle states,
//! P-state mode) is discovered once before the first row. Each tick reads raw
//! cumulative counters, converts them to interval quantities against the
//! previous tick, times a fixed matrix-multiply workload and renders a typed
//! [`SampleRow`]. Rows are buffered and flushed in batches. Unreadable fields
//! degrade to `N/A` / `unknown` rather than failing the tick.
//!
//! Readings are Linux-specific. On other platforms discovery finds no energy
//! domain and [`run`] returns [`Error::NoEnergyDomains`].

pub mod clock;
pub mod delta;
pub mod discovery;
pub mod error;
pub mod lifecycle;
pub mod probe;
pub mod runner;
pub mod sampler;
pub mod scheduler;
pub mod schema;
pub mod snapshot;
pub mod summary;
pub mod sysfs;
pub mod writer;

#[cfg(test)]
mod testutil;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use delta::{CpuTicks, EnergyDomain, energy_delta, power_watts, usage_pct};
pub use discovery::{PstateMode, Topology, discover};
pub use error::{Error, Result};
pub use lifecycle::{RunFlag, install_termination_handler};
pub use probe::{FixedProbe, LatencyProbe, MatrixProbe};
pub use runner::{RunReport, SamplerConfig, run};
pub use sampler::Sampler;
pub use scheduler::{IterationStats, Scheduler, StopReason};
pub use schema::{Reading, SampleRow, Schema};
pub use summary::{MachineInfo, RunSummary, detect_machine_info, render_benchmark};
pub use sysfs::SysPaths;
pub use writer::RowWriter;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
