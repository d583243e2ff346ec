//! Watchdog for the host's `refresh` cadence. Diagnostic only.

use embassy_time::{Duration, Instant};

use crate::config::DEFAULT_LOOP_TIMEOUT;

/// Tracks when `refresh` last ran.
#[derive(Debug, Clone, Copy)]
pub struct Liveness {
    last_refresh: Option<Instant>,
    max_interval: Duration,
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new(DEFAULT_LOOP_TIMEOUT)
    }
}

impl Liveness {
    pub const fn new(max_interval: Duration) -> Self {
        Self {
            last_refresh: None,
            max_interval,
        }
    }

    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    pub fn set_max_interval(&mut self, max_interval: Duration) {
        self.max_interval = max_interval;
    }

    /// Records a refresh at `now`.
    ///
    /// Returns the time since the previous refresh if it exceeds the
    /// configured interval. The first refresh is never late.
    pub fn tick(&mut self, now: Instant) -> Option<Duration> {
        let late = self
            .last_refresh
            .and_then(|last| now.checked_duration_since(last))
            .filter(|elapsed| *elapsed > self.max_interval);
        self.last_refresh = Some(now);
        late
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_is_never_late() {
        let mut liveness = Liveness::default();
        assert_eq!(liveness.tick(Instant::from_millis(60_000)), None);
    }

    #[test]
    fn gap_beyond_interval_is_reported() {
        let mut liveness = Liveness::default();
        liveness.tick(Instant::from_millis(1_000));
        assert_eq!(liveness.tick(Instant::from_millis(11_000)), None);
        assert_eq!(
            liveness.tick(Instant::from_millis(21_001)),
            Some(Duration::from_millis(10_001))
        );
    }

    #[test]
    fn interval_is_configurable() {
        let mut liveness = Liveness::new(Duration::from_millis(100));
        liveness.tick(Instant::from_millis(0));
        assert!(liveness.tick(Instant::from_millis(150)).is_some());

        liveness.set_max_interval(Duration::from_millis(500));
        assert!(liveness.tick(Instant::from_millis(300)).is_none());
        assert_eq!(liveness.max_interval(), Duration::from_millis(500));
    }
}
