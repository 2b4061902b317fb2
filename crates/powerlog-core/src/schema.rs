//! Output schema and the typed row it describes.
//!
//! The [`Schema`] is fixed once from the discovered [`Topology`] before the
//! first row is written. Every [`SampleRow`] renders through the same path so
//! the header and each data line always have the same number of fields.

use crate::discovery::{PstateMode, Topology, UNKNOWN};

/// Sentinel for an unreadable numeric or per-core string field.
pub const NOT_AVAILABLE: &str = "N/A";

/// Name of the trailing probe column.
pub const LATENCY_COLUMN: &str = "Benchmark_Latency_ms";

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// A best-effort field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading<T> {
    Available(T),
    Unavailable,
}

impl<T> From<Option<T>> for Reading<T> {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => Self::Available(v),
            None => Self::Unavailable,
        }
    }
}

impl<T> Reading<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    fn render(&self, sentinel: &str, f: impl FnOnce(&T) -> String) -> String {
        match self {
            Self::Available(v) => f(v),
            Self::Unavailable => sentinel.to_string(),
        }
    }
}

/// Replace characters that would break the comma-separated layout.
pub fn sanitize(s: &str) -> String {
    s.replace([',', '\r', '\n'], " ")
}

// ---------------------------------------------------------------------------
// Row
// ---------------------------------------------------------------------------

/// Frequency and utilization of one core.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreSample {
    pub freq_mhz: Reading<f64>,
    pub utilization_pct: Reading<f64>,
}

/// P-state fields, shaped by the startup [`PstateMode`].
#[derive(Debug, Clone, PartialEq)]
pub enum PstateFields {
    /// Preference string per active-mode core.
    PerCore(Vec<Reading<String>>),
    /// Driver status string.
    Status(Reading<String>),
}

/// One tick's record, positionally aligned with [`Schema`].
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRow {
    pub timestamp: String,
    pub power_w: Vec<Reading<f64>>,
    pub cores: Vec<CoreSample>,
    pub governor: Reading<String>,
    pub pstate: PstateFields,
    /// Space-joined enabled idle-state names per core.
    pub enabled_states: Vec<String>,
    /// Residency delta per schema idle-state column.
    pub residency_ms: Vec<f64>,
    pub latency_ms: f64,
}

impl SampleRow {
    /// Render every field in schema order.
    pub fn fields(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.field_count());
        out.push(sanitize(&self.timestamp));
        for p in &self.power_w {
            out.push(p.render(NOT_AVAILABLE, |w| format!("{w:.3}")));
        }
        for core in &self.cores {
            out.push(core.freq_mhz.render(NOT_AVAILABLE, |mhz| format!("{mhz:.1}")));
            out.push(
                core.utilization_pct
                    .render(NOT_AVAILABLE, |pct| format!("{pct:.2}")),
            );
        }
        out.push(self.governor.render(UNKNOWN, |g| sanitize(g)));
        match &self.pstate {
            PstateFields::PerCore(prefs) => {
                for p in prefs {
                    out.push(p.render(NOT_AVAILABLE, |s| sanitize(s)));
                }
            }
            PstateFields::Status(status) => out.push(status.render(UNKNOWN, |s| sanitize(s))),
        }
        for label in &self.enabled_states {
            out.push(sanitize(label));
        }
        for ms in &self.residency_ms {
            out.push(format!("{ms:.3}"));
        }
        out.push(format!("{:.3}", self.latency_ms));
        out
    }

    /// Number of fields [`fields`](Self::fields) produces.
    pub fn field_count(&self) -> usize {
        let pstate = match &self.pstate {
            PstateFields::PerCore(p) => p.len(),
            PstateFields::Status(_) => 1,
        };
        1 + self.power_w.len()
            + 2 * self.cores.len()
            + 1
            + pstate
            + self.enabled_states.len()
            + self.residency_ms.len()
            + 1
    }

    /// Comma-joined line without the trailing newline.
    pub fn to_csv_line(&self) -> String {
        self.fields().join(",")
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Ordered, immutable column list for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
    domains: usize,
    cores: Vec<usize>,
    /// `Some(n)` for per-core preference columns, `None` for one status
    /// column.
    pstate_columns: Option<usize>,
    idle_keys: Vec<String>,
}

impl Schema {
    /// Build the schema from a completed discovery.
    pub fn from_topology(topology: &Topology) -> Self {
        let idle_keys = topology.idle_keys();
        let mut columns = vec!["Timestamp".to_string()];
        for d in &topology.domains {
            columns.push(format!("{} (W)", sanitize(&d.name)));
        }
        for core in &topology.cores {
            columns.push(format!("CPU{core}_Freq (MHz)"));
            columns.push(format!("CPU{core}_Utilization (%)"));
        }
        columns.push("Governor".to_string());
        let pstate_columns = match &topology.pstate {
            PstateMode::Active { cores } => {
                for core in cores {
                    columns.push(format!("CPU{core}_P-State"));
                }
                Some(cores.len())
            }
            PstateMode::Status => {
                columns.push("P-State".to_string());
                None
            }
        };
        for core in &topology.cores {
            columns.push(format!("CPU{core}_Enabled_CStates"));
        }
        for key in &idle_keys {
            columns.push(format!("{} (ms)", sanitize(key)));
        }
        columns.push(LATENCY_COLUMN.to_string());

        Self {
            columns,
            domains: topology.domains.len(),
            cores: topology.cores.clone(),
            pstate_columns,
            idle_keys,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Comma-joined header without the trailing newline.
    pub fn header_line(&self) -> String {
        self.columns.join(",")
    }

    /// Sorted idle-state keys that have a residency column.
    pub fn idle_keys(&self) -> &[String] {
        &self.idle_keys
    }

    /// Position of `key` among the residency columns.
    pub fn residency_index(&self, key: &str) -> Option<usize> {
        self.idle_keys
            .binary_search_by(|k| k.as_str().cmp(key))
            .ok()
    }

    /// Whether a row has exactly the shape this schema describes.
    pub fn conforms(&self, row: &SampleRow) -> bool {
        let pstate_ok = match &row.pstate {
            PstateFields::PerCore(p) => self.pstate_columns == Some(p.len()),
            PstateFields::Status(_) => self.pstate_columns.is_none(),
        };
        row.power_w.len() == self.domains
            && row.cores.len() == self.cores.len()
            && pstate_ok
            && row.enabled_states.len() == self.cores.len()
            && row.residency_ms.len() == self.idle_keys.len()
            && row.field_count() == self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::discover;
    use crate::testutil::FakeHost;

    fn row_for(schema: &Schema, pstate: PstateFields) -> SampleRow {
        SampleRow {
            timestamp: "2026-01-01 00:00:00.000".into(),
            power_w: vec![Reading::Available(12.3456), Reading::Unavailable],
            cores: vec![
                CoreSample {
                    freq_mhz: Reading::Available(2400.0),
                    utilization_pct: Reading::Available(12.346),
                },
                CoreSample {
                    freq_mhz: Reading::Unavailable,
                    utilization_pct: Reading::Available(0.0),
                },
            ],
            governor: Reading::Unavailable,
            pstate,
            enabled_states: vec!["POLL C1 C6".into(), "POLL C1".into()],
            residency_ms: vec![0.0; schema.idle_keys().len()],
            latency_ms: 21.5,
        }
    }

    #[test]
    fn header_matches_column_contract() {
        let host = FakeHost::standard();
        let schema = Schema::from_topology(&discover(&host.paths()).unwrap());
        assert_eq!(
            schema.header_line(),
            "Timestamp,package-0 (W),dram (W),\
CPU0_Freq (MHz),CPU0_Utilization (%),CPU1_Freq (MHz),CPU1_Utilization (%),\
Governor,CPU0_P-State,CPU1_P-State,\
CPU0_Enabled_CStates,CPU1_Enabled_CStates,\
CPU0_C1 (ms),CPU0_C6 (ms),CPU0_POLL (ms),CPU1_C1 (ms),CPU1_C6 (ms),CPU1_POLL (ms),\
Benchmark_Latency_ms"
        );
    }

    #[test]
    fn status_mode_has_single_pstate_column() {
        let host = FakeHost::standard();
        host.pstate_status("passive");
        let schema = Schema::from_topology(&discover(&host.paths()).unwrap());
        assert!(schema.columns().iter().any(|c| c == "P-State"));
        assert!(!schema.columns().iter().any(|c| c.ends_with("_P-State")));
    }

    #[test]
    fn row_renders_with_sentinels() {
        let host = FakeHost::standard();
        let schema = Schema::from_topology(&discover(&host.paths()).unwrap());
        let row = row_for(
            &schema,
            PstateFields::PerCore(vec![
                Reading::Available("performance".into()),
                Reading::Unavailable,
            ]),
        );
        assert!(schema.conforms(&row));
        let fields = row.fields();
        assert_eq!(fields.len(), schema.len());
        assert_eq!(fields[1], "12.346");
        assert_eq!(fields[2], NOT_AVAILABLE);
        assert_eq!(fields[3], "2400.0");
        assert_eq!(fields[4], "12.35");
        assert_eq!(fields[5], NOT_AVAILABLE);
        assert_eq!(fields[7], UNKNOWN);
        assert_eq!(fields[8], "performance");
        assert_eq!(fields[9], NOT_AVAILABLE);
        assert_eq!(fields[10], "POLL C1 C6");
        assert_eq!(fields.last().unwrap(), "21.500");
    }

    #[test]
    fn mismatched_pstate_shape_does_not_conform() {
        let host = FakeHost::standard();
        let schema = Schema::from_topology(&discover(&host.paths()).unwrap());
        let row = row_for(&schema, PstateFields::Status(Reading::Unavailable));
        assert!(!schema.conforms(&row));
    }

    #[test]
    fn commas_in_strings_do_not_add_fields() {
        let host = FakeHost::standard();
        let schema = Schema::from_topology(&discover(&host.paths()).unwrap());
        let mut row = row_for(
            &schema,
            PstateFields::PerCore(vec![Reading::Unavailable, Reading::Unavailable]),
        );
        row.governor = Reading::Available("weird,gov\n".into());
        let line = row.to_csv_line();
        assert_eq!(line.split(',').count(), schema.len());
    }

    #[test]
    fn residency_index_follows_sorted_keys() {
        let host = FakeHost::standard();
        let schema = Schema::from_topology(&discover(&host.paths()).unwrap());
        assert_eq!(schema.residency_index("CPU0_C1"), Some(0));
        assert_eq!(schema.residency_index("CPU1_POLL"), Some(5));
        assert_eq!(schema.residency_index("CPU2_C1"), None);
    }
}
