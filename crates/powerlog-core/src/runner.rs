//! Run configuration and the end-to-end sampling run.

use std::path::PathBuf;
use std::time::Duration;

use log::{info, warn};
use uuid::Uuid;

use crate::clock::{Clock, since_epoch};
use crate::discovery::discover;
use crate::error::{Error, Result};
use crate::lifecycle::RunFlag;
use crate::probe::LatencyProbe;
use crate::sampler::Sampler;
use crate::scheduler::{DEFAULT_INTERVAL, IterationStats, Scheduler, StopReason};
use crate::sysfs::SysPaths;
use crate::writer::{DEFAULT_BATCH_SIZE, RowWriter};

/// Default CSV output path.
pub const DEFAULT_OUTPUT: &str = "rapl_power_log.csv";

/// Configuration for a sampling run.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Nominal sampling interval; also the power divisor.
    pub interval: Duration,
    /// `None` runs until the run flag is cleared.
    pub duration: Option<Duration>,
    pub batch_size: usize,
    pub output: PathBuf,
    pub paths: SysPaths,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            duration: None,
            batch_size: DEFAULT_BATCH_SIZE,
            output: PathBuf::from(DEFAULT_OUTPUT),
            paths: SysPaths::default(),
        }
    }
}

/// Outcome of a run that got as far as writing the header.
#[derive(Debug)]
pub struct RunReport {
    pub id: Uuid,
    /// Wall-clock start and end, since the Unix epoch.
    pub started_at: Duration,
    pub ended_at: Duration,
    /// Monotonic time spent in the schedule.
    pub elapsed: Duration,
    pub interval: Duration,
    pub output: PathBuf,
    pub columns: usize,
    pub rows_written: u64,
    pub domains: Vec<String>,
    pub cores: usize,
    pub stats: IterationStats,
    pub stop: StopReason,
    /// Set when writing the output failed after the header.
    pub write_error: Option<Error>,
}

/// Discover, write the header, and sample until a stop condition.
///
/// Fails before creating the output when no energy domain exists. A write
/// failure during the loop stops it and is returned inside the report so
/// the statistics are not lost.
pub fn run<C: Clock>(
    config: &SamplerConfig,
    flag: &RunFlag,
    clock: &C,
    probe: Box<dyn LatencyProbe>,
) -> Result<RunReport> {
    let topology = discover(&config.paths)?;
    let mut sampler = Sampler::new(config.paths.clone(), topology, config.interval, probe);
    let domains: Vec<String> = sampler
        .topology()
        .domains
        .iter()
        .map(|d| d.name.clone())
        .collect();
    let cores = sampler.topology().cores.len();
    let columns = sampler.schema().len();
    let output_error = |source| Error::Output {
        path: config.output.clone(),
        source,
    };
    let mut writer = RowWriter::create(
        &config.output,
        &sampler.schema().header_line(),
        config.batch_size,
    )
    .map_err(output_error)?;

    let id = Uuid::new_v4();
    let started_at = since_epoch();
    info!(
        "run {id}: {} domain(s), {cores} core(s), {columns} columns, interval {:.3}s -> {}",
        domains.len(),
        config.interval.as_secs_f64(),
        config.output.display()
    );

    let mut scheduler = Scheduler::new(clock, flag, config.interval, config.duration);
    let outcome = scheduler.run(|_| {
        let row = sampler.tick(since_epoch());
        writer.append(row.to_csv_line())
    });
    let (schedule, mut write_error) = match outcome {
        Ok(report) => (report, None),
        Err(failure) => (failure.report, Some(output_error(failure.error))),
    };

    let mut stop = schedule.stop;
    let flushed = writer.rows_written();
    let pending = writer.buffered() as u64;
    let rows_written = match writer.finish() {
        Ok(_) => flushed + pending,
        Err(e) => {
            if write_error.is_none() {
                stop = StopReason::WriteError;
                write_error = Some(output_error(e));
            } else {
                warn!("final flush failed after an earlier write error: {e}");
            }
            flushed
        }
    };

    info!(
        "run {id} stopped ({}): {} iteration(s), {} overrun(s)",
        stop, schedule.stats.count, schedule.stats.overruns
    );

    Ok(RunReport {
        id,
        started_at,
        ended_at: since_epoch(),
        elapsed: schedule.elapsed,
        interval: config.interval,
        output: config.output.clone(),
        columns,
        rows_written,
        domains,
        cores,
        stats: schedule.stats,
        stop,
        write_error,
    })
}
