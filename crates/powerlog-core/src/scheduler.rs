//! Drift-compensated fixed-cadence driver.
//!
//! Boundaries lie on the absolute grid `anchor + k * interval`, with the
//! anchor at the start of the run. After each tick the scheduler sleeps until
//! the next boundary instead of sleeping a fixed amount, so per-iteration
//! jitter never accumulates. A tick that runs past its boundary is counted as
//! one overrun, the next tick starts immediately, and the grid is re-anchored
//! at that moment. Missed boundaries are never replayed as back-to-back
//! ticks.
//!
//! The stop conditions (cleared [`RunFlag`], elapsed run duration) are
//! checked once at the top of each iteration. A tick or sleep in progress
//! always completes.

use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::lifecycle::RunFlag;

/// Nominal sampling interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Why the loop left the RUNNING state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The configured run duration elapsed.
    Duration,
    /// The run flag was cleared (termination signal).
    Signal,
    /// Writing a row failed.
    WriteError,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Duration => write!(f, "duration elapsed"),
            Self::Signal => write!(f, "termination signal"),
            Self::WriteError => write!(f, "output write failed"),
        }
    }
}

/// Scheduler state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Stopped(StopReason),
}

/// Iteration timing statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationStats {
    pub count: u64,
    pub total: Duration,
    pub min: Option<Duration>,
    pub max: Duration,
    pub overruns: u64,
}

impl IterationStats {
    pub fn record(&mut self, took: Duration, overran: bool) {
        self.count += 1;
        self.total += took;
        self.min = Some(self.min.map_or(took, |m| m.min(took)));
        self.max = self.max.max(took);
        if overran {
            self.overruns += 1;
        }
    }

    pub fn average(&self) -> Option<Duration> {
        if self.count == 0 {
            return None;
        }
        Some(Duration::from_secs_f64(
            self.total.as_secs_f64() / self.count as f64,
        ))
    }
}

/// Result of a completed schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleReport {
    pub stats: IterationStats,
    pub stop: StopReason,
    /// Wall time from the first check to the stop decision.
    pub elapsed: Duration,
}

/// A tick failed; the schedule stopped after it.
#[derive(Debug)]
pub struct TickFailure<E> {
    pub report: ScheduleReport,
    pub error: E,
}

/// Absolute time of grid boundary `n`.
pub fn boundary(start: Duration, interval: Duration, n: u64) -> Duration {
    let nanos = interval.as_nanos().saturating_mul(u128::from(n));
    start.saturating_add(Duration::from_nanos(
        u64::try_from(nanos).unwrap_or(u64::MAX),
    ))
}

pub struct Scheduler<'a, C: Clock> {
    clock: &'a C,
    flag: &'a RunFlag,
    interval: Duration,
    run_duration: Option<Duration>,
    state: SchedulerState,
}

impl<'a, C: Clock> Scheduler<'a, C> {
    /// `run_duration` of `None` (or zero) means run until the flag clears.
    pub fn new(
        clock: &'a C,
        flag: &'a RunFlag,
        interval: Duration,
        run_duration: Option<Duration>,
    ) -> Self {
        Self {
            clock,
            flag,
            interval,
            run_duration: run_duration.filter(|d| !d.is_zero()),
            state: SchedulerState::Running,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Drive `tick` (called with the iteration index) until a stop
    /// condition is met.
    pub fn run<E>(
        &mut self,
        mut tick: impl FnMut(u64) -> Result<(), E>,
    ) -> Result<ScheduleReport, TickFailure<E>> {
        let start = self.clock.now();
        let mut stats = IterationStats::default();
        let mut iteration: u64 = 0;
        let mut anchor = start;
        let mut slot: u64 = 1;

        loop {
            let iteration_start = self.clock.now();
            if let Some(reason) = self.stop_condition(iteration_start - start) {
                self.state = SchedulerState::Stopped(reason);
                debug!("scheduler stopped after {iteration} tick(s): {reason}");
                return Ok(ScheduleReport {
                    stats,
                    stop: reason,
                    elapsed: iteration_start - start,
                });
            }

            let outcome = tick(iteration);
            let iteration_end = self.clock.now();
            let took = iteration_end.saturating_sub(iteration_start);

            let next = boundary(anchor, self.interval, slot);
            let residual = next.checked_sub(iteration_end);
            if residual.is_some() {
                slot += 1;
            } else {
                anchor = iteration_end;
                slot = 1;
            }
            stats.record(took, residual.is_none());

            if let Err(error) = outcome {
                self.state = SchedulerState::Stopped(StopReason::WriteError);
                return Err(TickFailure {
                    report: ScheduleReport {
                        stats,
                        stop: StopReason::WriteError,
                        elapsed: iteration_end - start,
                    },
                    error,
                });
            }

            match residual {
                Some(residual) => self.clock.sleep(residual),
                None => {
                    if stats.overruns == 1 {
                        warn!(
                            "tick {iteration} took {:.3}s, longer than the {:.3}s interval",
                            took.as_secs_f64(),
                            self.interval.as_secs_f64()
                        );
                    } else {
                        debug!("overrun at tick {iteration} ({:.3}s)", took.as_secs_f64());
                    }
                }
            }
            iteration += 1;
        }
    }

    fn stop_condition(&self, elapsed: Duration) -> Option<StopReason> {
        if !self.flag.is_running() {
            return Some(StopReason::Signal);
        }
        match self.run_duration {
            Some(limit) if elapsed >= limit => Some(StopReason::Duration),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const HALF: Duration = Duration::from_millis(500);

    #[test]
    fn boundaries_are_absolute() {
        let start = Duration::from_millis(7);
        assert_eq!(boundary(start, HALF, 0), start);
        assert_eq!(boundary(start, HALF, 3), Duration::from_millis(1507));
        assert_eq!(
            boundary(Duration::ZERO, Duration::from_secs(1), u64::MAX),
            Duration::from_nanos(u64::MAX)
        );
    }

    #[test]
    fn overrun_counts_once_and_skips_sleep() {
        let clock = ManualClock::new();
        let flag = RunFlag::new();
        let mut sched = Scheduler::new(&clock, &flag, HALF, None);

        let report = sched
            .run(|i| -> Result<(), ()> {
                if i == 0 {
                    clock.advance(Duration::from_millis(600));
                } else {
                    clock.advance(Duration::from_millis(100));
                    flag.stop();
                }
                Ok(())
            })
            .unwrap();

        assert_eq!(report.stats.count, 2);
        assert_eq!(report.stats.overruns, 1);
        // Only the second tick slept: the grid restarted at 0.6s, so from
        // 0.7s to the 1.1s boundary.
        assert_eq!(clock.sleep_count(), 1);
        assert_eq!(clock.total_slept(), Duration::from_millis(400));
        assert_eq!(report.stop, StopReason::Signal);
        assert_eq!(sched.state(), SchedulerState::Stopped(StopReason::Signal));
    }

    #[test]
    fn no_catch_up_after_overrun() {
        let clock = ManualClock::new();
        let flag = RunFlag::new();
        let mut sched = Scheduler::new(&clock, &flag, HALF, None);
        let mut starts = Vec::new();

        let report = sched
            .run(|i| -> Result<(), ()> {
                starts.push(clock.now());
                let cost = if i == 1 { 1_200 } else { 100 };
                clock.advance(Duration::from_millis(cost));
                if i == 3 {
                    flag.stop();
                }
                Ok(())
            })
            .unwrap();

        let ms: Vec<u128> = starts.iter().map(|d| d.as_millis()).collect();
        // tick 1 ends at 1.7s, past boundaries 1.0 and 1.5: tick 2 starts
        // immediately and tick 3 follows one interval later.
        assert_eq!(ms, vec![0, 500, 1700, 2200]);
        assert_eq!(report.stats.overruns, 1);
    }

    #[test]
    fn zero_interval_does_not_divide_by_zero() {
        let clock = ManualClock::new();
        let flag = RunFlag::new();
        let mut sched = Scheduler::new(&clock, &flag, Duration::ZERO, None);
        let report = sched
            .run(|i| -> Result<(), ()> {
                clock.advance(Duration::from_millis(1));
                if i == 2 {
                    flag.stop();
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(report.stats.count, 3);
        assert_eq!(report.stats.overruns, 3);
    }

    #[test]
    fn cadence_holds_without_overruns() {
        let clock = ManualClock::new();
        let flag = RunFlag::new();
        let mut sched = Scheduler::new(&clock, &flag, HALF, None);
        let mut starts = Vec::new();

        let report = sched
            .run(|i| -> Result<(), ()> {
                starts.push(clock.now());
                clock.advance(Duration::from_millis(37 + (i % 5) * 20));
                if i == 99 {
                    flag.stop();
                }
                Ok(())
            })
            .unwrap();

        assert_eq!(report.stats.overruns, 0);
        let gaps: Vec<Duration> = starts.windows(2).map(|w| w[1] - w[0]).collect();
        assert!(gaps.iter().all(|g| *g == HALF));
    }

    #[test]
    fn duration_limit_stops_gracefully() {
        let clock = ManualClock::new();
        let flag = RunFlag::new();
        let mut sched = Scheduler::new(&clock, &flag, HALF, Some(Duration::from_secs(2)));

        let report = sched
            .run(|_| -> Result<(), ()> {
                clock.advance(Duration::from_millis(10));
                Ok(())
            })
            .unwrap();

        // Ticks at 0.0, 0.5, 1.0, 1.5; at 2.0 the limit is reached.
        assert_eq!(report.stats.count, 4);
        assert_eq!(report.stop, StopReason::Duration);
        assert_eq!(report.elapsed, Duration::from_secs(2));
        assert!(flag.is_running());
    }

    #[test]
    fn zero_duration_means_unlimited() {
        let clock = ManualClock::new();
        let flag = RunFlag::new();
        let mut sched = Scheduler::new(&clock, &flag, HALF, Some(Duration::ZERO));

        let report = sched
            .run(|i| -> Result<(), ()> {
                if i == 9 {
                    flag.stop();
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(report.stats.count, 10);
        assert_eq!(report.stop, StopReason::Signal);
    }

    #[test]
    fn flag_cleared_before_start_runs_no_ticks() {
        let clock = ManualClock::new();
        let flag = RunFlag::new();
        flag.stop();
        let mut sched = Scheduler::new(&clock, &flag, HALF, None);
        let report = sched.run(|_| -> Result<(), ()> { panic!("no tick expected") });
        let report = report.unwrap();
        assert_eq!(report.stats.count, 0);
        assert_eq!(report.stats.average(), None);
    }

    #[test]
    fn tick_error_stops_and_keeps_stats() {
        let clock = ManualClock::new();
        let flag = RunFlag::new();
        let mut sched = Scheduler::new(&clock, &flag, HALF, None);

        let failure = sched
            .run(|i| if i == 2 { Err("disk full") } else { Ok(()) })
            .unwrap_err();
        assert_eq!(failure.error, "disk full");
        assert_eq!(failure.report.stats.count, 3);
        assert_eq!(failure.report.stop, StopReason::WriteError);
    }

    #[test]
    fn stats_track_min_max_average() {
        let mut s = IterationStats::default();
        s.record(Duration::from_millis(100), false);
        s.record(Duration::from_millis(300), true);
        assert_eq!(s.min, Some(Duration::from_millis(100)));
        assert_eq!(s.max, Duration::from_millis(300));
        assert_eq!(s.overruns, 1);
        let avg = s.average().unwrap();
        assert!((avg.as_secs_f64() - 0.2).abs() < 1e-9);
    }
}
