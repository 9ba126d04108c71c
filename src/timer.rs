//! One-shot countdown timer.
//!
//! A timer is armed with a duration relative to "now" and reports readiness
//! once the deadline passes.  Readiness is **sticky**: an expired timer stays
//! ready on every poll until the caller re-arms it.  Every branch that acts
//! on `is_ready()` must call `arm()` before the next poll or it fires again
//! on every loop iteration.
//!
//! ```text
//!   Disarmed ──arm()──▶ Armed ──now ≥ deadline──▶ Expired
//!                         ▲                          │
//!                         └──────────arm()───────────┘
//! ```
//!
//! Time is passed in explicitly as milliseconds of uptime so the timer is
//! a plain value and can be driven by a simulated clock in tests.

/// Observable timer status at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStatus {
    /// Never armed.
    Disarmed,
    /// Armed, deadline not yet reached.
    Armed,
    /// Deadline reached; stays here until re-armed.
    Expired,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OneShotTimer {
    deadline_ms: u64,
    armed: bool,
}

impl OneShotTimer {
    pub const fn new() -> Self {
        Self {
            deadline_ms: 0,
            armed: false,
        }
    }

    /// Set the deadline to `now_ms + duration_ms`.
    pub fn arm(&mut self, now_ms: u64, duration_ms: u32) {
        self.deadline_ms = now_ms.saturating_add(u64::from(duration_ms));
        self.armed = true;
    }

    pub fn is_ready(&self, now_ms: u64) -> bool {
        self.armed && now_ms >= self.deadline_ms
    }

    pub fn status(&self, now_ms: u64) -> TimerStatus {
        match (self.armed, now_ms >= self.deadline_ms) {
            (false, _) => TimerStatus::Disarmed,
            (true, false) => TimerStatus::Armed,
            (true, true) => TimerStatus::Expired,
        }
    }

    /// Milliseconds until expiry (0 once expired or when disarmed).
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        if self.armed {
            self.deadline_ms.saturating_sub(now_ms)
        } else {
            0
        }
    }

    pub fn deadline_ms(&self) -> Option<u64> {
        self.armed.then_some(self.deadline_ms)
    }
}
