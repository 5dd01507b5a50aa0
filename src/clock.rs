//! Epoch conversions and device/host clock skew correction.

use chrono::{Local, NaiveDateTime, TimeZone};

/// Break epoch seconds down in the host's local timezone. Used by devices
/// without timezone information of their own.
pub fn localtime(ticks: i64) -> Option<NaiveDateTime> {
    Local
        .timestamp_opt(ticks, 0)
        .single()
        .map(|dt| dt.naive_local())
}

/// Break epoch seconds down in UTC.
pub fn gmtime(ticks: i64) -> Option<NaiveDateTime> {
    NaiveDateTime::from_timestamp_opt(ticks, 0)
}

/// The host's UNIX time.
pub fn now() -> i64 {
    Local::now().timestamp()
}

/// A (device tick counter, host UNIX time) pair recorded when the download
/// started, for devices that only store timestamps relative to their own
/// free-running clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceClock {
    /// Device tick counter at download time.
    pub devtime: u32,
    /// Host UNIX time at download time.
    pub systime: i64,
}

impl DeviceClock {
    pub fn new(devtime: u32, systime: i64) -> Self {
        DeviceClock { devtime, systime }
    }

    /// Translate a device timestamp into host UNIX time, for clocks that
    /// tick once per second.
    pub fn resolve(&self, timestamp: u32) -> i64 {
        self.systime - (self.devtime as i64 - timestamp as i64)
    }

    /// Translate a device timestamp for clocks that tick twice per second
    /// (the Memomouse and Smart families).
    pub fn resolve_half_ticks(&self, timestamp: u32) -> i64 {
        self.systime - (self.devtime as i64 - timestamp as i64) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skew_correction_is_monotone() {
        let clock = DeviceClock::new(10_000, 1_700_000_000);
        let mut previous = i64::MIN;
        for t in (0..10_000).step_by(997) {
            let resolved = clock.resolve(t);
            assert!(resolved > previous);
            previous = resolved;
        }
        assert_eq!(clock.resolve(10_000), 1_700_000_000);
        assert_eq!(clock.resolve(9_000), 1_699_999_000);
    }

    #[test]
    fn half_tick_clocks_halve_the_delta() {
        let clock = DeviceClock::new(10_000, 1_700_000_000);
        assert_eq!(clock.resolve_half_ticks(8_000), 1_699_999_000);
    }

    #[test]
    fn gmtime_breaks_down_utc() {
        let dt = gmtime(0).unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "1970-01-01 00:00:00");
    }
}
