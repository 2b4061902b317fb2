pub mod record;

use std::time::Duration;

/// Parse a positive interval in (fractional) seconds.
pub fn parse_interval(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("invalid interval '{s}': expected seconds, e.g. 0.5"))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("interval must be positive, got '{s}'"));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid interval '{s}': {e}"))
}

/// `0` means no limit.
pub fn run_duration(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_accepts_fractional_seconds() {
        assert_eq!(parse_interval("0.5"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_interval("2"), Ok(Duration::from_secs(2)));
        assert_eq!(parse_interval(" 0.25 "), Ok(Duration::from_millis(250)));
    }

    #[test]
    fn interval_rejects_non_positive() {
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("-1").is_err());
        assert!(parse_interval("abc").is_err());
        assert!(parse_interval("inf").is_err());
        assert!(parse_interval("NaN").is_err());
    }

    #[test]
    fn zero_duration_is_unlimited() {
        assert_eq!(run_duration(0), None);
        assert_eq!(run_duration(30), Some(Duration::from_secs(30)));
    }
}
