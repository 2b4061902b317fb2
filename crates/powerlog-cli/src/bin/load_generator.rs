//! powerlog-load: fluctuating CPU load to run alongside the sampler.
//!
//! One thread per core, pinned to that core. Each cycle the thread spins for
//! a random share of the cycle, then sleeps until the next absolute cycle
//! boundary so the duty cycle does not drift.

use std::hint::black_box;
use std::process;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use log::{info, warn};
use powerlog_core::{RunFlag, install_termination_handler};
use rand::Rng;

#[derive(Parser)]
#[command(name = "powerlog-load")]
#[command(about = "Generate a fluctuating per-core CPU load (random busy share of every cycle)")]
#[command(version = powerlog_core::VERSION)]
struct Cli {
    /// Minimum busy percentage per cycle
    #[arg(long, default_value_t = 40)]
    min_load: u8,

    /// Maximum busy percentage per cycle
    #[arg(long, default_value_t = 50)]
    max_load: u8,

    /// Cycle length in milliseconds
    #[arg(long, default_value_t = 100)]
    cycle_ms: u64,

    /// Number of cores to load (default: all online cores)
    #[arg(long)]
    cores: Option<usize>,
}

/// Busy/idle split of one load cycle.
#[derive(Debug, Clone, Copy)]
struct LoadProfile {
    min_pct: u8,
    max_pct: u8,
    cycle: Duration,
}

impl LoadProfile {
    fn new(min_pct: u8, max_pct: u8, cycle: Duration) -> Result<Self, String> {
        if min_pct > max_pct {
            return Err(format!(
                "--min-load ({min_pct}) must not exceed --max-load ({max_pct})"
            ));
        }
        if max_pct > 100 {
            return Err(format!("--max-load must be at most 100, got {max_pct}"));
        }
        if cycle.is_zero() {
            return Err("--cycle-ms must be positive".to_string());
        }
        Ok(Self {
            min_pct,
            max_pct,
            cycle,
        })
    }

    /// Busy time for a cycle at `pct` percent load.
    fn busy_for(&self, pct: u8) -> Duration {
        self.cycle * u32::from(pct) / 100
    }

    fn pick(&self, rng: &mut impl Rng) -> u8 {
        rng.random_range(self.min_pct..=self.max_pct)
    }
}

fn online_cores() -> usize {
    #[cfg(unix)]
    {
        // SAFETY: sysconf has no preconditions.
        let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
        if n > 0 {
            return n as usize;
        }
    }
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(target_os = "linux")]
fn pin_to_core(core: usize) -> bool {
    // SAFETY: `set` is a zero-initialized cpu_set_t owned by this frame, and
    // pid 0 targets the calling thread.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(core, &mut set);
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) == 0
    }
}

#[cfg(not(target_os = "linux"))]
fn pin_to_core(_core: usize) -> bool {
    false
}

/// Spin until `busy` has elapsed since `start`.
fn spin(start: Instant, busy: Duration) {
    let mut x: u64 = 1;
    while start.elapsed() < busy {
        x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
    }
    black_box(x);
}

fn load_core(core: usize, profile: LoadProfile, flag: &RunFlag) {
    if !pin_to_core(core) {
        warn!("could not pin load thread to core {core}");
    }
    let mut rng = rand::rng();
    let mut deadline = Instant::now();
    while flag.is_running() {
        let start = Instant::now();
        spin(start, profile.busy_for(profile.pick(&mut rng)));
        deadline += profile.cycle;
        thread::sleep(deadline.saturating_duration_since(Instant::now()));
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let profile = match LoadProfile::new(
        cli.min_load,
        cli.max_load,
        Duration::from_millis(cli.cycle_ms),
    ) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let flag = RunFlag::new();
    if let Err(e) = install_termination_handler(&flag) {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    let online = online_cores();
    let cores = cli.cores.map_or(online, |n| n.clamp(1, online));
    println!(
        "Generating fluctuating CPU load (random {}-{}% every {}ms) on {} cores...",
        profile.min_pct,
        profile.max_pct,
        profile.cycle.as_millis(),
        cores
    );

    let handles: Vec<_> = (0..cores)
        .map(|core| {
            let flag = flag.clone();
            thread::spawn(move || load_core(core, profile, &flag))
        })
        .collect();
    for handle in handles {
        if handle.join().is_err() {
            warn!("load thread panicked");
        }
    }
    info!("load generator stopped");
}
