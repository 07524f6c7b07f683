//! Keyed debounce scheduling for graph updates.
//!
//! The coordinator posts work under string-like keys; re-posting the same key
//! replaces the queued deadline, so a burst of mutations against one project
//! collapses into a single update once the delay elapses. Every key uses the
//! same fixed delay: there is no priority queue, just a map from key to
//! deadline drained by the host event loop.
//!
//! The debouncer holds no tasks and spawns no threads: callers own the clock
//! (every entry point takes an [`Instant`]) and interpret due keys
//! themselves, which keeps it trivially deterministic under test.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Delay between the last mutation touching a key and its task running.
pub const DEFAULT_THROTTLE_DELAY: Duration = Duration::from_millis(250);

/// A map from key to deadline with replace-on-schedule semantics.
#[derive(Debug)]
pub struct Debounce<K> {
    delay: Duration,
    deadlines: HashMap<K, Instant>,
}

impl<K> Debounce<K>
where
    K: Clone + Eq + Hash + Ord,
{
    pub fn new(delay: Duration) -> Self {
        Self { delay, deadlines: HashMap::new() }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Queue `key` to fire after the delay, replacing any queued deadline for
    /// the same key.
    pub fn schedule(&mut self, key: K, now: Instant) {
        self.deadlines.insert(key, now + self.delay);
    }

    pub fn cancel(&mut self, key: &K) -> bool {
        self.deadlines.remove(key).is_some()
    }

    pub fn is_scheduled(&self, key: &K) -> bool {
        self.deadlines.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    /// The earliest queued deadline, for the event loop's timeout.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Remove and return every key whose deadline has passed, in key order
    /// for determinism.
    pub fn take_due(&mut self, now: Instant) -> Vec<K> {
        let mut due: Vec<K> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        due.sort();
        for key in &due {
            self.deadlines.remove(key);
        }
        due
    }

    /// Remove and return every queued key regardless of deadline, in key
    /// order. Used by tests and by shutdown paths that flush outstanding
    /// work.
    pub fn take_all(&mut self) -> Vec<K> {
        let mut all: Vec<K> = self.deadlines.drain().map(|(key, _)| key).collect();
        all.sort();
        all
    }
}

impl<K> Default for Debounce<K>
where
    K: Clone + Eq + Hash + Ord,
{
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rescheduling_replaces_the_deadline() {
        let mut debounce: Debounce<&str> = Debounce::new(Duration::from_millis(100));
        let t0 = Instant::now();
        debounce.schedule("a", t0);
        debounce.schedule("a", t0 + Duration::from_millis(50));
        assert_eq!(debounce.len(), 1);

        // The original deadline has passed but the replacement has not.
        assert!(debounce.take_due(t0 + Duration::from_millis(120)).is_empty());
        assert_eq!(debounce.take_due(t0 + Duration::from_millis(150)), vec!["a"]);
        assert!(debounce.is_empty());
    }

    #[test]
    fn due_keys_return_sorted_and_once() {
        let mut debounce: Debounce<&str> = Debounce::new(Duration::from_millis(10));
        let t0 = Instant::now();
        debounce.schedule("b", t0);
        debounce.schedule("a", t0);
        debounce.schedule("c", t0 + Duration::from_secs(10));

        let due = debounce.take_due(t0 + Duration::from_millis(20));
        assert_eq!(due, vec!["a", "b"]);
        assert!(debounce.take_due(t0 + Duration::from_millis(20)).is_empty());
        assert!(debounce.is_scheduled(&"c"));
    }

    #[test]
    fn next_deadline_is_the_minimum() {
        let mut debounce: Debounce<u32> = Debounce::new(Duration::from_millis(10));
        let t0 = Instant::now();
        assert_eq!(debounce.next_deadline(), None);
        debounce.schedule(2, t0 + Duration::from_millis(5));
        debounce.schedule(1, t0);
        assert_eq!(debounce.next_deadline(), Some(t0 + Duration::from_millis(10)));
    }

    #[test]
    fn cancel_removes_the_key() {
        let mut debounce: Debounce<&str> = Debounce::new(Duration::from_millis(10));
        debounce.schedule("a", Instant::now());
        assert!(debounce.cancel(&"a"));
        assert!(!debounce.cancel(&"a"));
        assert!(debounce.is_empty());
    }
}
