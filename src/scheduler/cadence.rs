use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

/// UNIX エポックを起点に `interval` ごとの境界へ揃える実行間隔。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalCadence {
    interval_secs: i64,
}

impl IntervalCadence {
    /// Returns `None` for a zero interval or one that does not fit in an `i64` of seconds.
    #[must_use]
    pub fn new(interval: Duration) -> Option<Self> {
        let interval_secs = i64::try_from(interval.as_secs()).ok()?;
        (interval_secs > 0).then_some(Self { interval_secs })
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.unsigned_abs())
    }

    /// `now` 以降で最初の境界。`now` がちょうど境界ならそのまま返す。
    #[must_use]
    pub fn next_run_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let secs = now.timestamp();
        let on_boundary = secs.rem_euclid(self.interval_secs) == 0 && now.timestamp_subsec_nanos() == 0;
        if on_boundary {
            return now;
        }
        let next = (secs.div_euclid(self.interval_secs) + 1).saturating_mul(self.interval_secs);
        Utc.timestamp_opt(next, 0).single().unwrap_or(now)
    }
}

#[cfg(test)]
mod tests {
    use super::IntervalCadence;
    use chrono::{DateTime, Utc};
    use std::time::Duration;

    fn parse_utc(ts: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(ts)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn every_15_minutes() -> IntervalCadence {
        IntervalCadence::new(Duration::from_secs(15 * 60)).expect("non-zero interval")
    }

    #[test]
    fn next_run_rounds_up_to_boundary() {
        let now = parse_utc("2025-11-08T18:31:10Z");
        let expected = parse_utc("2025-11-08T18:45:00Z");
        assert_eq!(every_15_minutes().next_run_from(now), expected);
    }

    #[test]
    fn next_run_immediate_when_exact_boundary() {
        let now = parse_utc("2025-11-08T19:00:00Z");
        assert_eq!(every_15_minutes().next_run_from(now), now);
    }

    #[test]
    fn sub_second_offset_moves_to_next_boundary() {
        let now = parse_utc("2025-11-08T19:00:00.250Z");
        let expected = parse_utc("2025-11-08T19:15:00Z");
        assert_eq!(every_15_minutes().next_run_from(now), expected);
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(IntervalCadence::new(Duration::ZERO).is_none());
    }
}
