//! # Simulated Clock
//!
//! Deterministic tick counter driving the whole machine.
//!
//! ## Philosophy
//!
//! **Determinism enables thorough testing.**
//!
//! The clock only advances when explicitly told to. There is no background
//! thread and no observer list: every tick produced by [`Clock::tick`] is
//! queued, and the kernel drains the queue with [`Clock::poll`], running its
//! per-tick work once for each tick in order.

use std::collections::VecDeque;

/// Simulated clock with controllable time progression
///
/// # Examples
///
/// ```
/// use sim_kernel::timer::Clock;
///
/// let mut clock = Clock::new();
/// clock.tick(2);
/// assert_eq!(clock.now(), 2);
/// assert_eq!(clock.poll(), Some(1));
/// assert_eq!(clock.poll(), Some(2));
/// assert_eq!(clock.poll(), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Clock {
    /// Current tick count
    ticks: u64,
    /// Ticks not yet observed by the kernel
    pending: VecDeque<u64>,
}

impl Clock {
    /// Creates a new clock starting at tick 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock starting at a specific tick count
    ///
    /// Useful for tests that need to start with a non-zero time.
    pub fn with_initial_ticks(ticks: u64) -> Self {
        Self {
            ticks,
            pending: VecDeque::new(),
        }
    }

    /// Advances the clock by `delta` ticks, queueing each one
    pub fn tick(&mut self, delta: u64) {
        for _ in 0..delta {
            self.ticks = self.ticks.saturating_add(1);
            self.pending.push_back(self.ticks);
        }
    }

    /// Takes the oldest unobserved tick
    pub fn poll(&mut self) -> Option<u64> {
        self.pending.pop_front()
    }

    /// Returns the current tick count
    pub fn now(&self) -> u64 {
        self.ticks
    }

    /// Number of ticks not yet polled
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clock_starts_at_zero() {
        let clock = Clock::new();
        assert_eq!(clock.now(), 0);
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn test_clock_with_initial_ticks() {
        let clock = Clock::with_initial_ticks(1000);
        assert_eq!(clock.now(), 1000);
    }

    #[test]
    fn test_tick_queues_every_tick_in_order() {
        let mut clock = Clock::new();
        clock.tick(3);
        assert_eq!(clock.now(), 3);
        assert_eq!(clock.pending(), 3);
        assert_eq!(clock.poll(), Some(1));
        assert_eq!(clock.poll(), Some(2));
        assert_eq!(clock.poll(), Some(3));
        assert_eq!(clock.poll(), None);
    }

    #[test]
    fn test_ticks_queued_while_polling_are_observed() {
        let mut clock = Clock::new();
        clock.tick(1);
        let first = clock.poll();
        clock.tick(1);
        assert_eq!(first, Some(1));
        assert_eq!(clock.poll(), Some(2));
    }

    #[test]
    fn test_zero_tick() {
        let mut clock = Clock::new();
        clock.tick(0);
        assert_eq!(clock.now(), 0);
        assert_eq!(clock.poll(), None);
    }

    #[test]
    fn test_monotonic_progression() {
        let mut clock = Clock::with_initial_ticks(10);
        let t1 = clock.now();
        clock.tick(5);
        let t2 = clock.now();
        assert!(t2 > t1);
        assert_eq!(t2 - t1, 5);
    }
}
