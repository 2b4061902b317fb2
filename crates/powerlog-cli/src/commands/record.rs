//! `powerlog`: sample until the duration elapses or a termination signal
//! arrives, then report.

use std::path::PathBuf;
use std::time::Duration;

use powerlog_core::{
    MatrixProbe, MonotonicClock, RunFlag, RunSummary, SamplerConfig, SysPaths,
    detect_machine_info, install_termination_handler, render_benchmark,
};

pub struct RecordArgs {
    pub duration: u64,
    pub output: PathBuf,
    pub benchmark: bool,
    pub interval: Duration,
    pub batch_size: usize,
    pub matrix_size: usize,
    pub summary_json: Option<PathBuf>,
    pub sysfs_root: PathBuf,
    pub procfs_root: PathBuf,
}

/// Run the sampling command.
pub fn run(args: &RecordArgs) {
    let config = SamplerConfig {
        interval: args.interval,
        duration: super::run_duration(args.duration),
        batch_size: args.batch_size,
        output: args.output.clone(),
        paths: SysPaths::new(&args.sysfs_root, &args.procfs_root),
    };

    let flag = RunFlag::new();
    if let Err(e) = install_termination_handler(&flag) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let probe = Box::new(MatrixProbe::new(args.matrix_size));
    let report = match powerlog_core::run(&config, &flag, &MonotonicClock::new(), probe) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if args.benchmark {
        println!("\n{}", render_benchmark(&report.stats));
    }

    let mut failed = false;
    if let Some(path) = &args.summary_json {
        let summary = RunSummary::from_report(&report, detect_machine_info());
        if let Err(e) = summary.write(path) {
            eprintln!("Error: {e}");
            failed = true;
        }
    }

    if let Some(e) = &report.write_error {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    println!("Measurement complete. Data saved in {}", config.output.display());
    if failed {
        std::process::exit(1);
    }
}
