use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Nanoseconds since the Unix epoch.
pub fn nanos_since_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Clock source for arrival timestamps.
///
/// Matching only needs time of arrival to be monotonically non-decreasing;
/// the wall clock can step backwards (NTP), so readings are clamped against
/// the last value handed out.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_nanos: AtomicU64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            last_nanos: AtomicU64::new(0),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let system = nanos_since_epoch();
        let previous = self.last_nanos.fetch_max(system, Ordering::Relaxed);
        DateTime::from_timestamp_nanos(previous.max(system) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nanos_since_epoch_advances() {
        let first = nanos_since_epoch();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let second = nanos_since_epoch();
        assert!(second > first);
    }

    #[test]
    fn test_monotonic_clock_never_decreases() {
        let clock = MonotonicClock::new();
        let mut previous = clock.now();
        for _ in 0..1000 {
            let current = clock.now();
            assert!(current >= previous);
            previous = current;
        }
    }
}
