use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Source of "now" for the windows. Injected so tests and replays can drive
/// time explicitly instead of reading the wall clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. Starts at the instant it was created.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset_us: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self { base: Instant::now(), offset_us: AtomicU64::new(0) }
    }

    /// The instant this clock reported when it was created.
    pub fn start(&self) -> Instant {
        self.base
    }

    pub fn advance(&self, by: Duration) {
        self.offset_us.fetch_add(micros(by), Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Jump to `elapsed` past the start instant.
    pub fn set(&self, elapsed: Duration) {
        self.offset_us.store(micros(elapsed), Ordering::SeqCst);
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.offset_us.load(Ordering::SeqCst))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base
            .checked_add(self.elapsed())
            .unwrap_or(self.base)
    }
}

fn micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_advanced() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        assert_eq!(clock.now(), t0);

        clock.advance_ms(50);
        assert_eq!(clock.now().duration_since(t0), Duration::from_millis(50));

        clock.set(Duration::from_millis(10));
        assert_eq!(clock.now().duration_since(t0), Duration::from_millis(10));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
