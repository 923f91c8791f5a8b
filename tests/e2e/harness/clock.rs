use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Controllable time shared by every store handle a scenario opens.
///
/// Each read advances the clock by one millisecond so events written in
/// quick succession still get strictly increasing timestamps.
#[derive(Clone)]
pub struct MockClock {
    /// Milliseconds since the Unix epoch.
    current: Arc<AtomicI64>,
}

impl MockClock {
    /// Create a mock clock starting at 2026-01-01T00:00:00Z.
    pub fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .unwrap()
            .timestamp_millis();
        Self {
            current: Arc::new(AtomicI64::new(start)),
        }
    }

    /// A clock function suitable for `ContextStore::with_clock`.
    pub fn as_clock(&self) -> impl Fn() -> DateTime<Utc> + Send + Sync + 'static {
        let current = self.current.clone();
        move || {
            let millis = current.fetch_add(1, Ordering::SeqCst);
            Utc.timestamp_millis_opt(millis).unwrap()
        }
    }

    /// Current time without advancing.
    pub fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.current.load(Ordering::SeqCst))
            .unwrap()
    }

    /// Advance time by duration
    pub fn advance(&self, duration: Duration) {
        let millis = ChronoDuration::from_std(duration)
            .map(|d| d.num_milliseconds())
            .unwrap_or(i64::MAX / 2);
        self.current.fetch_add(millis, Ordering::SeqCst);
    }

    /// Advance time by hours
    pub fn advance_hours(&self, hours: u64) {
        self.advance(Duration::from_secs(hours * 3600));
    }

    /// Advance time by days
    pub fn advance_days(&self, days: u64) {
        self.advance(Duration::from_secs(days * 86400));
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}
