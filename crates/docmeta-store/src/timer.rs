//! One-shot debounce timer
//!
//! Holds at most one pending deadline. Arming an armed timer is a no-op, so
//! a burst of mutations produces a single flush `delay` after the first one.
//! Instants come from `tokio::time` so a paused runtime clock drives it.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct DebounceTimer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl DebounceTimer {
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule a fire at `now + delay` unless one is already pending
    ///
    /// Returns `true` if this call armed the timer.
    pub fn arm(&mut self, now: Instant) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(now + self.delay);
        true
    }

    /// Drop the pending deadline, returning whether one was pending
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarm and return `true` if the deadline has passed
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_once() {
        let mut timer = DebounceTimer::new(Duration::from_secs(2));
        let start = Instant::now();

        assert!(timer.arm(start));
        assert!(!timer.arm(start + Duration::from_secs(1)));
        assert_eq!(timer.deadline(), Some(start + Duration::from_secs(2)));
    }

    #[test]
    fn test_fire_if_due() {
        let mut timer = DebounceTimer::new(Duration::from_secs(2));
        let start = Instant::now();
        timer.arm(start);

        assert!(!timer.fire_if_due(start + Duration::from_millis(1999)));
        assert!(timer.is_armed());
        assert!(timer.fire_if_due(start + Duration::from_secs(2)));
        assert!(!timer.is_armed());

        // One-shot: nothing left to fire
        assert!(!timer.fire_if_due(start + Duration::from_secs(10)));
    }

    #[test]
    fn test_cancel() {
        let mut timer = DebounceTimer::new(Duration::from_secs(2));
        assert!(!timer.cancel());

        let start = Instant::now();
        timer.arm(start);
        assert!(timer.cancel());
        assert!(!timer.fire_if_due(start + Duration::from_secs(5)));

        // Re-arming after cancel starts a fresh window
        let later = start + Duration::from_secs(7);
        assert!(timer.arm(later));
        assert_eq!(timer.deadline(), Some(later + Duration::from_secs(2)));
    }
}
