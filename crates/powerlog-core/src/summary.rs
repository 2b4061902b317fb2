//! End-of-run reporting: the benchmark text block and the JSON run summary.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::clock::format_iso8601;
use crate::error::{Error, Result};
use crate::runner::RunReport;
use crate::scheduler::{IterationStats, StopReason};

// ---------------------------------------------------------------------------
// Machine info
// ---------------------------------------------------------------------------

/// Host description recorded alongside a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineInfo {
    pub os: String,
    pub arch: String,
    pub cpu_model: String,
    pub cores: usize,
}

/// Detect machine information (best-effort).
pub fn detect_machine_info() -> MachineInfo {
    let os = format!(
        "{} {}",
        std::env::consts::OS,
        os_version().unwrap_or_default()
    );
    MachineInfo {
        os: os.trim_end().to_string(),
        arch: std::env::consts::ARCH.to_string(),
        cpu_model: cpu_model().unwrap_or_else(|| "unknown".to_string()),
        cores: std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
    }
}

fn os_version() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        fs::read_to_string("/etc/os-release").ok().and_then(|s| {
            s.lines()
                .find(|l| l.starts_with("PRETTY_NAME="))
                .map(|l| l.trim_start_matches("PRETTY_NAME=").trim_matches('"').to_string())
        })
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

fn cpu_model() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        fs::read_to_string("/proc/cpuinfo").ok().and_then(|s| {
            s.lines()
                .find(|l| l.starts_with("model name"))
                .and_then(|l| l.split(':').nth(1))
                .map(|v| v.trim().to_string())
        })
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

// ---------------------------------------------------------------------------
// Benchmark text
// ---------------------------------------------------------------------------

/// Human-readable iteration statistics, as printed by `--benchmark`.
pub fn render_benchmark(stats: &IterationStats) -> String {
    let Some(average) = stats.average() else {
        return "No iterations recorded.".to_string();
    };
    let min = stats.min.unwrap_or_default();
    format!(
        "--- Benchmark summary ---\n\
         Total iterations: {}\n\
         Average iteration time: {:.3} s\n\
         Min iteration time: {:.3} s\n\
         Max iteration time: {:.3} s\n\
         Number of overruns (iteration longer than interval): {}",
        stats.count,
        average.as_secs_f64(),
        min.as_secs_f64(),
        stats.max.as_secs_f64(),
        stats.overruns
    )
}

// ---------------------------------------------------------------------------
// Run summary (JSON)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IterationSummary {
    pub count: u64,
    pub avg_ms: Option<f64>,
    pub min_ms: Option<f64>,
    pub max_ms: Option<f64>,
    pub overruns: u64,
}

impl From<&IterationStats> for IterationSummary {
    fn from(s: &IterationStats) -> Self {
        let ms = |d: std::time::Duration| d.as_secs_f64() * 1_000.0;
        Self {
            count: s.count,
            avg_ms: s.average().map(ms),
            min_ms: s.min.map(ms),
            max_ms: (s.count > 0).then(|| ms(s.max)),
            overruns: s.overruns,
        }
    }
}

/// Metadata for one sampling run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub version: u32,
    pub id: String,
    pub started_at: String,
    pub ended_at: String,
    pub duration_ms: u64,
    pub interval_ms: u64,
    pub output: String,
    pub columns: usize,
    pub rows_written: u64,
    pub domains: Vec<String>,
    pub cores: usize,
    pub iterations: IterationSummary,
    pub stop_reason: StopReason,
    pub machine: MachineInfo,
    pub powerlog_version: String,
}

impl RunSummary {
    pub fn from_report(report: &RunReport, machine: MachineInfo) -> Self {
        Self {
            version: 1,
            id: report.id.to_string(),
            started_at: format_iso8601(report.started_at),
            ended_at: format_iso8601(report.ended_at),
            duration_ms: report.elapsed.as_millis() as u64,
            interval_ms: report.interval.as_millis() as u64,
            output: report.output.display().to_string(),
            columns: report.columns,
            rows_written: report.rows_written,
            domains: report.domains.clone(),
            cores: report.cores,
            iterations: IterationSummary::from(&report.stats),
            stop_reason: report.stop,
            machine,
            powerlog_version: crate::VERSION.to_string(),
        }
    }

    /// Write as pretty-printed JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| Error::Summary {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        fs::write(path, json).map_err(|e| Error::Summary {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn stats(durations_ms: &[u64], overruns: u64) -> IterationStats {
        let mut s = IterationStats::default();
        for (i, &d) in durations_ms.iter().enumerate() {
            s.record(Duration::from_millis(d), (i as u64) < overruns);
        }
        s
    }

    fn report() -> RunReport {
        RunReport {
            id: uuid::Uuid::new_v4(),
            started_at: Duration::from_secs(0),
            ended_at: Duration::from_secs(3),
            elapsed: Duration::from_millis(3_000),
            interval: Duration::from_millis(500),
            output: PathBuf::from("rapl_power_log.csv"),
            columns: 20,
            rows_written: 6,
            domains: vec!["package-0".into(), "dram".into()],
            cores: 2,
            stats: stats(&[100, 200, 600], 1),
            stop: StopReason::Duration,
            write_error: None,
        }
    }

    #[test]
    fn benchmark_block_format() {
        let text = render_benchmark(&stats(&[100, 200, 600], 1));
        assert_eq!(
            text,
            "--- Benchmark summary ---\n\
             Total iterations: 3\n\
             Average iteration time: 0.300 s\n\
             Min iteration time: 0.100 s\n\
             Max iteration time: 0.600 s\n\
             Number of overruns (iteration longer than interval): 1"
        );
    }

    #[test]
    fn benchmark_without_iterations() {
        assert_eq!(
            render_benchmark(&IterationStats::default()),
            "No iterations recorded."
        );
    }

    #[test]
    fn summary_serializes_stop_reason_snake_case() {
        let mut r = report();
        r.stop = StopReason::WriteError;
        let summary = RunSummary::from_report(&r, detect_machine_info());
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"stop_reason\":\"write_error\""));
        assert!(json.contains("\"started_at\":\"1970-01-01T00:00:00Z\""));
    }

    #[test]
    fn summary_written_and_readable() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("run.json");
        let summary = RunSummary::from_report(&report(), detect_machine_info());
        summary.write(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let back: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(back["version"], 1);
        assert_eq!(back["rows_written"], 6);
        assert_eq!(back["iterations"]["count"], 3);
        assert_eq!(back["iterations"]["overruns"], 1);
        assert_eq!(back["stop_reason"], "duration");
        assert_eq!(back["domains"][1], "dram");
        assert_eq!(back["id"].as_str().unwrap().len(), 36);
    }

    #[test]
    fn summary_write_failure_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("missing").join("run.json");
        let summary = RunSummary::from_report(&report(), detect_machine_info());
        let err = summary.write(&path).unwrap_err();
        assert!(matches!(err, Error::Summary { .. }));
    }

    #[test]
    fn machine_info_is_populated() {
        let info = detect_machine_info();
        assert!(!info.os.is_empty());
        assert!(!info.arch.is_empty());
        assert!(info.cores > 0);
    }

    #[test]
    fn empty_stats_summary_has_no_timings() {
        let s = IterationSummary::from(&IterationStats::default());
        assert_eq!(s.count, 0);
        assert_eq!(s.avg_ms, None);
        assert_eq!(s.max_ms, None);
    }
}
