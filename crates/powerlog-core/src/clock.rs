//! Monotonic clock abstraction and wall-clock timestamp formatting.

use std::cell::Cell;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Time source for the scheduler.
///
/// `now` is monotonic and relative to an arbitrary origin; `sleep` blocks
/// for the given duration (or advances virtual time).
pub trait Clock {
    fn now(&self) -> Duration;
    fn sleep(&self, d: Duration);
}

/// Real clock backed by [`Instant`] and [`std::thread::sleep`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, d: Duration) {
        if !d.is_zero() {
            std::thread::sleep(d);
        }
    }
}

/// Virtual clock that only moves when told to. Sleeping advances it.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
    slept: Cell<Duration>,
    sleeps: Cell<u64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        self.now.set(self.now.get() + d);
    }

    /// Total time spent in `sleep`.
    pub fn total_slept(&self) -> Duration {
        self.slept.get()
    }

    /// Number of non-zero sleeps.
    pub fn sleep_count(&self) -> u64 {
        self.sleeps.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        self.advance(d);
        self.slept.set(self.slept.get() + d);
        self.sleeps.set(self.sleeps.get() + 1);
    }
}

// ---------------------------------------------------------------------------
// Wall-clock formatting
// ---------------------------------------------------------------------------

/// Wall-clock time since the Unix epoch.
pub fn since_epoch() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

/// Row timestamp in local time with millisecond precision.
/// Example: `2026-02-15 02:30:00.125`
pub fn format_row_timestamp(since_epoch: Duration) -> String {
    format_with_offset(since_epoch, local_offset_secs(since_epoch.as_secs()))
}

/// Row timestamp shifted by a fixed UTC offset in seconds.
fn format_with_offset(since_epoch: Duration, offset_secs: i64) -> String {
    let secs = since_epoch.as_secs().saturating_add_signed(offset_secs);
    let (year, month, day, hour, min, sec) = secs_to_utc(secs);
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
        year,
        month,
        day,
        hour,
        min,
        sec,
        since_epoch.subsec_millis()
    )
}

/// Offset of local time from UTC at `secs`, per the process time zone
/// (`TZ` or `/etc/localtime`). Zero when it cannot be determined.
pub fn local_offset_secs(secs: u64) -> i64 {
    let Ok(t) = libc::time_t::try_from(secs) else {
        return 0;
    };
    // SAFETY: `tm` is plain data and `localtime_r` only writes into it.
    unsafe {
        let mut tm: libc::tm = std::mem::zeroed();
        if libc::localtime_r(&t, &mut tm).is_null() {
            return 0;
        }
        i64::from(tm.tm_gmtoff)
    }
}

/// Full ISO-8601 timestamp.
/// Example: `2026-02-15T01:30:00Z`
pub fn format_iso8601(since_epoch: Duration) -> String {
    let (year, month, day, hour, min, sec) = secs_to_utc(since_epoch.as_secs());
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year, month, day, hour, min, sec
    )
}

/// Convert seconds since Unix epoch to (year, month, day, hour, minute, second) UTC.
/// No leap second handling.
fn secs_to_utc(secs: u64) -> (u64, u64, u64, u64, u64, u64) {
    let sec = secs % 60;
    let min = (secs / 60) % 60;
    let hour = (secs / 3600) % 24;

    let mut days = secs / 86400;
    let mut year = 1970u64;

    loop {
        let days_in_year = if is_leap(year) { 366 } else { 365 };
        if days < days_in_year {
            break;
        }
        days -= days_in_year;
        year += 1;
    }

    let months_days: [u64; 12] = if is_leap(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };

    let mut month = 0u64;
    for (i, &md) in months_days.iter().enumerate() {
        if days < md {
            month = i as u64 + 1;
            break;
        }
        days -= md;
    }
    let day = days + 1;

    (year, month, day, hour, min, sec)
}

fn is_leap(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}
