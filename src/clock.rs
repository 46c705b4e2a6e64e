//! Monotonic clock abstraction
//!
//! Timers, reconnection cooldowns and reading timestamps all read time
//! through [`Clock`]. Blocking waits also go through it, so a
//! [`ManualClock`] makes every window and cooldown deterministic in tests.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Source of monotonic time since start
pub trait Clock {
    /// Milliseconds since the clock started
    fn now_millis(&self) -> u64;

    /// Block the caller for `duration`
    fn sleep(&self, duration: Duration);
}

/// Wall-clock backed implementation
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Start counting from now
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Hand-driven clock; clones share the same time
///
/// `sleep` advances time instantly.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    /// Clock at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock at a given time
    pub fn starting_at(millis: u64) -> Self {
        let clock = Self::new();
        clock.set(millis);
        clock
    }

    /// Move time forward
    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration.as_millis() as u64);
    }

    /// Jump to an absolute time
    pub fn set(&self, millis: u64) {
        self.now.set(millis);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        clock.advance(Duration::from_millis(1500));
        assert_eq!(handle.now_millis(), 1500);

        handle.sleep(Duration::from_secs(2));
        assert_eq!(clock.now_millis(), 3500);
    }

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_millis();
        clock.sleep(Duration::from_millis(5));
        assert!(clock.now_millis() >= a + 5);
    }
}
