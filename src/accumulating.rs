use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::clock::Clock;
use crate::error::WindowError;

type Reduce<T> = Box<dyn Fn(T, T) -> T + Send + Sync>;
type Report<T> = Box<dyn Fn(T, usize) -> T + Send + Sync>;

#[derive(Debug)]
struct Bucket<T> {
    value: T,
    entries: usize,
    expires_at: Instant,
}

/// Rolling, time-bucketed aggregate: a fixed ring of buckets, each covering
/// `bucket_duration`, with new values folded into the current bucket by
/// `reduce`. In database terms, an aggregation grouped by time.
///
/// Example: minute-by-minute event counts over the last 30 minutes.
///
/// ```
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # use input_stats::{AccumulatingWindow, SystemClock};
/// let mut per_minute = AccumulatingWindow::new(
///     30,
///     Duration::from_secs(60),
///     Arc::new(SystemClock),
///     0u64,
///     |total, n| total + n,
/// )
/// .unwrap();
/// per_minute.add(1);
/// assert_eq!(per_minute.iter().count(), 30);
/// ```
///
/// The current bucket is found lazily on every `add` and `iter`: the head
/// moves forward once per elapsed bucket period, resetting each bucket it
/// lands on to `default`. Each new expiry is chained from the previous one,
/// so bucket boundaries stay on the grid laid down at construction no matter
/// how long the window sat idle.
///
/// Iteration always yields `bucket_count` values, oldest first. Buckets that
/// saw no entries yield their stored value unchanged; the others go through
/// `report` (if set) together with their entry count.
pub struct AccumulatingWindow<T> {
    buckets: Vec<Bucket<T>>,
    head: usize,
    bucket_duration: Duration,
    default: T,
    reduce: Reduce<T>,
    report: Option<Report<T>>,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> AccumulatingWindow<T> {
    pub fn new<F>(
        bucket_count: usize,
        bucket_duration: Duration,
        clock: Arc<dyn Clock>,
        default: T,
        reduce: F,
    ) -> Result<Self, WindowError>
    where
        F: Fn(T, T) -> T + Send + Sync + 'static,
    {
        if bucket_count == 0 {
            return Err(WindowError::InvalidConfig(
                "accumulating window needs at least one bucket".into(),
            ));
        }
        if bucket_duration.is_zero() {
            return Err(WindowError::InvalidConfig(
                "accumulating window bucket duration must be positive".into(),
            ));
        }
        debug!(
            bucket_count,
            bucket_ms = bucket_duration.as_millis() as u64,
            "accumulating window created"
        );

        // Only the head's expiry is ever consulted; the others are assigned as
        // the head reaches them.
        let now = clock.now();
        let buckets = (0..bucket_count)
            .map(|i| Bucket {
                value: default.clone(),
                entries: 0,
                expires_at: if i == 0 { now + bucket_duration } else { now },
            })
            .collect();

        Ok(Self {
            buckets,
            head: 0,
            bucket_duration,
            default,
            reduce: Box::new(reduce),
            report: None,
            clock,
        })
    }

    /// Transform applied to every non-empty bucket when it is read, given the
    /// reduced value and the number of entries folded into it.
    pub fn with_report<G>(mut self, report: G) -> Self
    where
        G: Fn(T, usize) -> T + Send + Sync + 'static,
    {
        self.report = Some(Box::new(report));
        self
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn bucket_duration(&self) -> Duration {
        self.bucket_duration
    }

    pub fn add(&mut self, value: T) {
        let now = self.clock.now();
        self.advance(now);

        let bucket = &mut self.buckets[self.head];
        let current = std::mem::replace(&mut bucket.value, self.default.clone());
        bucket.value = (self.reduce)(current, value);
        bucket.entries += 1;
    }

    /// Oldest bucket first, always `bucket_count` items.
    pub fn iter(&mut self) -> Iter<'_, T> {
        let now = self.clock.now();
        self.advance(now);
        let len = self.buckets.len();
        let pos = (self.head + 1) % len;
        Iter { window: self, pos, remaining: len }
    }

    pub fn remove(&mut self, _value: &T) -> Result<(), WindowError> {
        Err(WindowError::Unsupported("AccumulatingWindow does not support removal"))
    }

    pub fn contains(&mut self, _value: &T) -> Result<bool, WindowError> {
        Err(WindowError::Unsupported("AccumulatingWindow does not support containment tests"))
    }

    pub fn clear(&mut self) -> Result<(), WindowError> {
        Err(WindowError::Unsupported("AccumulatingWindow buckets only reset by aging out"))
    }

    fn advance(&mut self, now: Instant) {
        let head_expiry = self.buckets[self.head].expires_at;
        if head_expiry > now {
            return;
        }

        let len = self.buckets.len();
        let behind = now.duration_since(head_expiry);
        let period_ns = self.bucket_duration.as_nanos();
        let periods = behind.as_nanos() / period_ns + 1;

        if periods < len as u128 {
            for _ in 0..periods {
                let next_expiry = self.buckets[self.head].expires_at + self.bucket_duration;
                self.head = (self.head + 1) % len;
                self.reset_head(next_expiry);
            }
        } else {
            // Every bucket ages out; land directly on the grid slot holding `now`.
            let remainder = Duration::from_nanos((behind.as_nanos() % period_ns) as u64);
            let next_expiry = head_expiry + (behind - remainder) + self.bucket_duration;
            for bucket in &mut self.buckets {
                bucket.value = self.default.clone();
                bucket.entries = 0;
            }
            self.head = (self.head + (periods % len as u128) as usize) % len;
            self.reset_head(next_expiry);
        }

        if periods > 1 {
            trace!(skipped = periods as u64, "accumulating window skipped idle buckets");
        }
    }

    fn reset_head(&mut self, expires_at: Instant) {
        let bucket = &mut self.buckets[self.head];
        bucket.value = self.default.clone();
        bucket.entries = 0;
        bucket.expires_at = expires_at;
    }

    fn read(&self, index: usize) -> T {
        let bucket = &self.buckets[index];
        match (&self.report, bucket.entries) {
            (_, 0) | (None, _) => bucket.value.clone(),
            (Some(report), entries) => report(bucket.value.clone(), entries),
        }
    }
}

impl<T> std::fmt::Debug for AccumulatingWindow<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccumulatingWindow")
            .field("bucket_count", &self.buckets.len())
            .field("bucket_duration", &self.bucket_duration)
            .field("head", &self.head)
            .field("has_report", &self.report.is_some())
            .finish()
    }
}

pub struct Iter<'a, T> {
    window: &'a AccumulatingWindow<T>,
    pos: usize,
    remaining: usize,
}

impl<T: Clone> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.remaining == 0 {
            return None;
        }
        let value = self.window.read(self.pos);
        self.pos = (self.pos + 1) % self.window.buckets.len();
        self.remaining -= 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T: Clone> ExactSizeIterator for Iter<'_, T> {}

impl<T: Clone> std::iter::FusedIterator for Iter<'_, T> {}
