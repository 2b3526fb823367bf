//! Rate-limited restart bookkeeping

use std::time::{Duration, Instant};

/// Crash budget: at most `max_restarts` recoveries per `window`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub window: Duration,
    pub max_restarts: u32,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_restarts: 10,
        }
    }
}

/// What to do about the crash just recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    Recover { count: u32 },
    Escalate { count: u32 },
}

/// Crashes counted since `window_start`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestartLedger {
    count: u32,
    window_start: Option<Instant>,
}

impl RestartLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn window_start(&self) -> Option<Instant> {
        self.window_start
    }

    /// Count a crash at `now`, opening a fresh window first if the current
    /// one is unset or has elapsed
    pub fn record_crash(&mut self, now: Instant, policy: &RestartPolicy) -> RestartDecision {
        let expired = match self.window_start {
            None => true,
            Some(start) => now.saturating_duration_since(start) > policy.window,
        };
        if expired {
            self.window_start = Some(now);
            self.count = 0;
        }

        self.count += 1;
        if self.count > policy.max_restarts {
            RestartDecision::Escalate { count: self.count }
        } else {
            RestartDecision::Recover { count: self.count }
        }
    }
}
