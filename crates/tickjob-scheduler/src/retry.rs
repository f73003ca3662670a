//! Bounded auto-restart, as the host applies it to a failing job.
//!
//! The host owns this behaviour once a job is registered. `RestartTracker`
//! reproduces it so the in-memory gateway can fire jobs the same way, and so
//! the policy itself can be tested.

use std::time::Duration;

use crate::types::RetrySettings;

/// What the host does after the job's process exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// The run succeeded; nothing more until the next trigger.
    Done,
    /// Relaunch after waiting `after`.
    Relaunch { attempt: u32, after: Duration },
    /// Restart budget exhausted; the job stays failed until the next trigger.
    GiveUp,
}

/// Counts consecutive failures within one trigger window.
#[derive(Debug, Clone)]
pub struct RestartTracker {
    max_restarts: u32,
    interval: Duration,
    restarts: u32,
}

impl RestartTracker {
    pub fn new(settings: &RetrySettings) -> Self {
        Self {
            max_restarts: settings.max_restarts,
            interval: settings.restart_interval,
            restarts: 0,
        }
    }

    /// Record an exit and decide what happens next.
    pub fn record_exit(&mut self, success: bool) -> RestartDecision {
        if success {
            self.restarts = 0;
            return RestartDecision::Done;
        }
        if self.restarts >= self.max_restarts {
            return RestartDecision::GiveUp;
        }
        self.restarts += 1;
        RestartDecision::Relaunch {
            attempt: self.restarts,
            after: self.interval,
        }
    }

    /// Relaunches used so far in this window.
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// A new trigger firing opens a fresh window.
    pub fn reset(&mut self) {
        self.restarts = 0;
    }
}
