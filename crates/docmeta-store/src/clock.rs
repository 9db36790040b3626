//! Wall-clock source for last-access times

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time in milliseconds since the Unix epoch
pub trait Clock {
    fn now_millis(&self) -> i64;
}

/// Reads the system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
    }
}

/// Manually advanced clock for deterministic tests
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct ManualClock(std::rc::Rc<std::cell::Cell<i64>>);

#[cfg(test)]
impl ManualClock {
    pub(crate) fn starting_at(millis: i64) -> Self {
        Self(std::rc::Rc::new(std::cell::Cell::new(millis)))
    }

    pub(crate) fn advance(&self, millis: i64) {
        self.0.set(self.0.get() + millis);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.0.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::starting_at(1_000);
        let other = clock.clone();
        clock.advance(250);
        assert_eq!(other.now_millis(), 1_250);
    }
}
