//! CLI for powerlog: fixed-cadence CPU power and idle-state telemetry.

mod commands;

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "powerlog")]
#[command(about = "powerlog: log RAPL power, frequency, utilization and idle-state residency to CSV")]
#[command(version = powerlog_core::VERSION)]
struct Cli {
    /// Duration to run in seconds (0 or omitted: until Ctrl+C / SIGTERM)
    #[arg(default_value_t = 0)]
    duration: u64,

    /// Output CSV file
    #[arg(short, long, default_value = powerlog_core::runner::DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Print iteration timing statistics after logging
    #[arg(long)]
    benchmark: bool,

    /// Sampling interval in seconds
    #[arg(long, default_value = "0.5", value_parser = commands::parse_interval)]
    interval: std::time::Duration,

    /// Rows buffered in memory between writes
    #[arg(long, default_value_t = powerlog_core::writer::DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Matrix dimension of the per-tick latency probe
    #[arg(
        long,
        default_value_t = powerlog_core::probe::DEFAULT_MATRIX_SIZE,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new()
            .range(1..=powerlog_core::probe::MAX_MATRIX_SIZE as u64)
    )]
    matrix_size: usize,

    /// Also write a JSON run summary to this path
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Read sysfs from this root instead of /sys (replaying a captured tree)
    #[arg(long, hide = true, default_value = "/sys")]
    sysfs_root: PathBuf,

    /// Read procfs from this root instead of /proc
    #[arg(long, hide = true, default_value = "/proc")]
    procfs_root: PathBuf,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    commands::record::run(&commands::record::RecordArgs {
        duration: cli.duration,
        output: cli.output,
        benchmark: cli.benchmark,
        interval: cli.interval,
        batch_size: cli.batch_size,
        matrix_size: cli.matrix_size,
        summary_json: cli.summary_json,
        sysfs_root: cli.sysfs_root,
        procfs_root: cli.procfs_root,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_size_defaults_and_bounds() {
        let cli = Cli::try_parse_from(["powerlog"]).unwrap();
        assert_eq!(cli.matrix_size, powerlog_core::probe::DEFAULT_MATRIX_SIZE);

        let cli = Cli::try_parse_from(["powerlog", "--matrix-size", "2048"]).unwrap();
        assert_eq!(cli.matrix_size, 2048);

        assert!(Cli::try_parse_from(["powerlog", "--matrix-size", "0"]).is_err());
        assert!(Cli::try_parse_from(["powerlog", "--matrix-size", "2049"]).is_err());
        assert!(
            Cli::try_parse_from(["powerlog", "--matrix-size", "18446744073709551615"]).is_err()
        );
    }
}
