//! Fake sysfs/procfs trees for unit tests.

use tempfile::TempDir;

use crate::sysfs::SysPaths;

pub struct FakeHost {
    dir: TempDir,
}

impl FakeHost {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sys")).unwrap();
        std::fs::create_dir_all(dir.path().join("proc")).unwrap();
        Self { dir }
    }

    /// Two cores, package + dram zones, active P-state, three idle states
    /// per core (C6 disabled on cpu1).
    pub fn standard() -> Self {
        let host = Self::new();
        host.rapl_zone("intel-rapl:0", Some("package-0"), 1_000_000, Some(1 << 32));
        host.rapl_zone("intel-rapl:0:0", Some("dram"), 500_000, None);
        for core in 0..2 {
            host.cpu(core);
            host.freq(core, "2400000");
            host.epp(core, "balance_performance");
            host.idle_state(core, 0, "POLL", false, 10);
            host.idle_state(core, 1, "C1", false, 1_000);
            host.idle_state(core, 2, "C6", core == 1, 50_000);
        }
        host.governor("powersave");
        host.pstate_status("active");
        host.proc_stat(&[(0, 100, 0, 900), (1, 200, 0, 800)]);
        host
    }

    pub fn paths(&self) -> SysPaths {
        SysPaths::new(self.dir.path().join("sys"), self.dir.path().join("proc"))
    }

    pub fn dir(&self, rel: &str) {
        std::fs::create_dir_all(self.dir.path().join("sys").join(rel)).unwrap();
    }

    pub fn file(&self, rel: &str, contents: &str) {
        let path = self.dir.path().join("sys").join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    pub fn remove(&self, rel: &str) {
        std::fs::remove_file(self.dir.path().join("sys").join(rel)).unwrap();
    }

    pub fn rapl_zone(&self, zone: &str, name: Option<&str>, energy: u64, max: Option<u64>) {
        let base = format!("class/powercap/{zone}");
        self.file(&format!("{base}/energy_uj"), &format!("{energy}\n"));
        if let Some(name) = name {
            self.file(&format!("{base}/name"), &format!("{name}\n"));
        }
        if let Some(max) = max {
            self.file(&format!("{base}/max_energy_range_uj"), &format!("{max}\n"));
        }
    }

    pub fn set_energy(&self, zone: &str, energy: u64) {
        self.file(
            &format!("class/powercap/{zone}/energy_uj"),
            &format!("{energy}\n"),
        );
    }

    pub fn cpu(&self, core: usize) {
        self.dir(&format!("devices/system/cpu/cpu{core}"));
    }

    pub fn freq(&self, core: usize, khz: &str) {
        self.file(
            &format!("devices/system/cpu/cpu{core}/cpufreq/scaling_cur_freq"),
            khz,
        );
    }

    pub fn governor(&self, gov: &str) {
        self.file(
            "devices/system/cpu/cpu0/cpufreq/scaling_governor",
            &format!("{gov}\n"),
        );
    }

    pub fn pstate_status(&self, status: &str) {
        self.file("devices/system/cpu/intel_pstate/status", status);
    }

    pub fn epp(&self, core: usize, pref: &str) {
        self.file(
            &format!("devices/system/cpu/cpu{core}/cpufreq/energy_performance_preference"),
            &format!("{pref}\n"),
        );
    }

    pub fn idle_state(&self, core: usize, idx: usize, name: &str, disabled: bool, time_us: u64) {
        let base = format!("devices/system/cpu/cpu{core}/cpuidle/state{idx}");
        self.file(&format!("{base}/name"), &format!("{name}\n"));
        self.file(
            &format!("{base}/disable"),
            if disabled { "1\n" } else { "0\n" },
        );
        self.file(&format!("{base}/time"), &format!("{time_us}\n"));
    }

    pub fn set_idle_time(&self, core: usize, idx: usize, time_us: u64) {
        self.file(
            &format!("devices/system/cpu/cpu{core}/cpuidle/state{idx}/time"),
            &format!("{time_us}\n"),
        );
    }

    /// Write `/proc/stat` from `(core, idle, iowait, busy)` tuples. Busy
    /// ticks are all attributed to `user`.
    pub fn proc_stat(&self, cores: &[(usize, u64, u64, u64)]) {
        let mut text = String::new();
        let (idle, iowait, busy) = cores.iter().fold((0, 0, 0), |acc, c| {
            (acc.0 + c.1, acc.1 + c.2, acc.2 + c.3)
        });
        text.push_str(&format!("cpu  {busy} 0 0 {idle} {iowait} 0 0 0 0 0\n"));
        for (core, idle, iowait, busy) in cores {
            text.push_str(&format!("cpu{core} {busy} 0 0 {idle} {iowait} 0 0 0 0 0\n"));
        }
        text.push_str("intr 12345 0 0\nctxt 999\nbtime 1700000000\n");
        std::fs::write(self.dir.path().join("proc").join("stat"), text).unwrap();
    }
}
