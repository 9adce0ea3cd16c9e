//! Bounded-retry polling for asynchronous cloud operations.

use serde::Serialize;
use std::time::Duration;

use crate::error::Result;

pub const DEFAULT_POLL_ATTEMPTS: u32 = 10;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_POLL_ATTEMPTS,
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    Pending,
    Completed,
    TimedOut,
}

/// Progress of one polling session. `attempt` counts failed checks so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollState {
    pub attempt: u32,
    pub max_attempts: u32,
    pub interval_ms: u64,
    pub status: PollStatus,
}

impl PollState {
    pub fn new(settings: PollSettings) -> Self {
        let status = if settings.max_attempts == 0 {
            PollStatus::TimedOut
        } else {
            PollStatus::Pending
        };
        Self {
            attempt: 0,
            max_attempts: settings.max_attempts,
            interval_ms: settings.interval.as_millis() as u64,
            status,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status != PollStatus::Pending
    }

    /// Apply the result of one check. Returns true when the caller should
    /// sleep before the next check.
    fn advance(&mut self, satisfied: bool) -> bool {
        if satisfied {
            self.status = PollStatus::Completed;
            return false;
        }
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            self.status = PollStatus::TimedOut;
        }
        true
    }
}

/// Blocks the current thread between checks.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

pub struct StabilizationPoller<'a> {
    settings: PollSettings,
    sleeper: &'a dyn Sleeper,
}

impl<'a> StabilizationPoller<'a> {
    pub fn new(settings: PollSettings, sleeper: &'a dyn Sleeper) -> Self {
        Self { settings, sleeper }
    }

    /// Run `check` until it returns true or the attempts run out.
    ///
    /// `check` receives the 1-based attempt number. A check error stops
    /// polling and is returned as-is. A satisfied check never sleeps.
    pub fn poll<F>(&self, mut check: F) -> Result<PollState>
    where
        F: FnMut(u32) -> Result<bool>,
    {
        let mut state = PollState::new(self.settings);

        while !state.is_finished() {
            let satisfied = check(state.attempt + 1)?;
            if state.advance(satisfied) {
                self.sleeper.sleep(self.settings.interval);
            }
        }

        Ok(state)
    }
}
