//! Poll cadence state machine
//!
//! Transitions are driven only by poll outcomes and the playback status of
//! the latest snapshot. The machine decides how long to wait before the next
//! poll; it never performs I/O itself.

use std::time::Duration;

use tokio::time::Instant;
use xschedule_client::PlaybackStatus;

use crate::config::PollConfig;

/// Cadence state after the most recent poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Nothing loaded; polling at the idle interval
    Idle,
    /// Playing or paused; polling at the active interval
    Active,
    /// Last poll failed
    Error {
        retry_count: u32,
        backoff_until: Instant,
    },
}

impl PollState {
    pub fn retry_count(&self) -> u32 {
        match self {
            PollState::Error { retry_count, .. } => *retry_count,
            _ => 0,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PollState::Error { .. })
    }
}

/// Decides the delay before each poll
#[derive(Debug, Clone)]
pub struct PollScheduler {
    config: PollConfig,
    state: PollState,
}

impl PollScheduler {
    pub fn new(config: PollConfig) -> Self {
        Self {
            config,
            state: PollState::Idle,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Record a successful poll; returns the delay until the next one
    pub fn on_success(&mut self, status: PlaybackStatus) -> Duration {
        if status.is_active() {
            self.state = PollState::Active;
            self.config.interval_playing
        } else {
            self.state = PollState::Idle;
            self.config.interval_idle
        }
    }

    /// Record a failed poll; returns the backoff before the next attempt
    pub fn on_failure(&mut self, now: Instant) -> Duration {
        let retry_count = self.state.retry_count().saturating_add(1);
        let delay = self.backoff(retry_count);
        self.state = PollState::Error {
            retry_count,
            // Deadlines the clock cannot represent collapse to `now`.
            backoff_until: now.checked_add(delay).unwrap_or(now),
        };
        delay
    }

    /// `min(idle_interval * 2^(n-1), max_backoff)` for the n-th consecutive failure
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let exponent = retry_count.saturating_sub(1).min(16);
        self.config
            .interval_idle
            .saturating_mul(1u32 << exponent)
            .min(self.config.max_backoff)
    }
}
