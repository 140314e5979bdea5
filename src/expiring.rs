use std::iter::FusedIterator;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::clock::Clock;
use crate::error::WindowError;

#[derive(Debug)]
struct Slot<T> {
    value: T,
    expires_at: Instant,
}

/// Fixed-capacity ring of timestamped values that drops entries once their
/// time-to-live has passed, and overwrites the oldest entry once full.
///
/// The ring holds `capacity + 1` slots. `tail` is always the next slot to be
/// written and is never part of the window, so `head == tail` means empty and
/// no separate count is needed. Expired entries are only skipped when the
/// window is read; nothing runs in the background.
///
/// Iteration yields values oldest to newest.
pub struct ExpiringWindow<T> {
    slots: Vec<Option<Slot<T>>>,
    head: usize,
    tail: usize,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<T> ExpiringWindow<T> {
    pub fn new(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Result<Self, WindowError> {
        if capacity == 0 {
            return Err(WindowError::InvalidConfig(
                "expiring window capacity must be positive".into(),
            ));
        }
        if ttl.is_zero() {
            return Err(WindowError::InvalidConfig("expiring window ttl must be positive".into()));
        }
        debug!(capacity, ttl_ms = ttl.as_millis() as u64, "expiring window created");

        let mut slots = Vec::with_capacity(capacity + 1);
        slots.resize_with(capacity + 1, || None);
        Ok(Self { slots, head: 0, tail: 0, ttl, clock })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// O(1). When the window is already full the oldest entry is dropped,
    /// whether or not it had expired.
    pub fn insert(&mut self, value: T) {
        let expires_at = self.clock.now() + self.ttl;
        self.slots[self.tail] = Some(Slot { value, expires_at });
        self.tail = self.next(self.tail);
        if self.head == self.tail {
            self.head = self.next(self.head);
        }
    }

    /// Skips past expired entries, then iterates what is left, oldest first.
    /// Every call re-scans from the (possibly advanced) head.
    pub fn iter(&mut self) -> Iter<'_, T> {
        let now = self.clock.now();
        self.evict_expired(now);
        Iter { slots: &self.slots, pos: self.head, tail: self.tail }
    }

    pub fn len(&mut self) -> usize {
        self.iter().len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.iter().next().is_none()
    }

    /// O(1): forgets every entry without touching the slots.
    pub fn clear(&mut self) {
        self.head = self.tail;
    }

    /// Linear scan over the live entries.
    pub fn contains(&mut self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.iter().any(|v| v == value)
    }

    pub fn remove(&mut self, _value: &T) -> Result<(), WindowError> {
        Err(WindowError::Unsupported(
            "ExpiringWindow does not support removal of individual entries",
        ))
    }

    fn evict_expired(&mut self, now: Instant) {
        while self.head != self.tail {
            match &self.slots[self.head] {
                Some(slot) if slot.expires_at > now => break,
                _ => self.head = self.next(self.head),
            }
        }
    }

    fn next(&self, index: usize) -> usize {
        (index + 1) % self.slots.len()
    }
}

impl<T> std::fmt::Debug for ExpiringWindow<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringWindow")
            .field("capacity", &self.capacity())
            .field("ttl", &self.ttl)
            .field("head", &self.head)
            .field("tail", &self.tail)
            .finish()
    }
}

/// Borrowing iterator over the live entries of an [`ExpiringWindow`].
pub struct Iter<'a, T> {
    slots: &'a [Option<Slot<T>>],
    pos: usize,
    tail: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let slots = self.slots;
        while self.pos != self.tail {
            let slot = &slots[self.pos];
            self.pos = (self.pos + 1) % slots.len();
            if let Some(slot) = slot {
                return Some(&slot.value);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.slots.len();
        let remaining = (self.tail + len - self.pos) % len;
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}
