//! Dispatch gate - pacing between fetch submissions
//!
//! The gate answers one question for the scheduler: may a dispatch happen
//! now, and if not, how long until it may? It combines the per-mode minimum
//! interval (a leaky-bucket tick: at most one dispatch per interval,
//! regardless of free concurrency slots) with the global cool-down pushed by
//! rate-limit and gateway-timeout responses. It is deliberately independent
//! of the concurrency cap, which is enforced separately by the scheduler's
//! semaphore.

use std::time::{Duration, Instant};

/// Interval gate with a global backoff window
#[derive(Debug)]
pub struct DispatchGate {
    /// Minimum time between two dispatches
    min_interval: Duration,

    /// Earliest instant the next dispatch may happen due to pacing
    next_dispatch: Option<Instant>,

    /// End of the current global cool-down, if one is active
    backoff_until: Option<Instant>,
}

impl DispatchGate {
    /// Creates a gate with the given minimum dispatch interval
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_dispatch: None,
            backoff_until: None,
        }
    }

    /// Returns how long to wait before the next dispatch is allowed
    ///
    /// # Arguments
    ///
    /// * `now` - The current time instant
    ///
    /// # Returns
    ///
    /// * `None` - A dispatch may happen immediately
    /// * `Some(wait)` - The remaining wait imposed by pacing or cool-down
    pub fn ready_in(&self, now: Instant) -> Option<Duration> {
        let pace = self
            .next_dispatch
            .filter(|t| *t > now)
            .map(|t| t - now)
            .unwrap_or(Duration::ZERO);
        let cool = self
            .backoff_until
            .filter(|t| *t > now)
            .map(|t| t - now)
            .unwrap_or(Duration::ZERO);

        let wait = pace.max(cool);
        if wait.is_zero() {
            None
        } else {
            Some(wait)
        }
    }

    /// Records that a dispatch happened at `now`
    pub fn record_dispatch(&mut self, now: Instant) {
        self.next_dispatch = Some(now + self.min_interval);
    }

    /// Pushes a global cool-down ending `cooldown` from `now`
    ///
    /// An already-active longer cool-down is kept.
    pub fn push_back(&mut self, now: Instant, cooldown: Duration) {
        let until = now + cooldown;
        self.backoff_until = Some(match self.backoff_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });
    }

    /// Returns true if a global cool-down is active at `now`
    pub fn in_backoff(&self, now: Instant) -> bool {
        self.backoff_until.is_some_and(|t| t > now)
    }
}
