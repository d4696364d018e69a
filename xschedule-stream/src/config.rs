//! Configuration for the polling task

use std::time::Duration;

use crate::error::PollingError;

/// Upper bound for every interval and the backoff ceiling
pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for [`PollingTask`](crate::PollingTask)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Interval while a playlist is playing or paused
    /// Default: 2 seconds
    pub interval_playing: Duration,

    /// Interval while idle; also the base of the error backoff
    /// Default: 2 seconds
    pub interval_idle: Duration,

    /// Ceiling for the error backoff
    /// Default: 60 seconds
    pub max_backoff: Duration,

    /// Consecutive failures that mark the device unavailable; the N-th
    /// failure in a row flips it, so 3 tolerates two transient misses
    /// Default: 3
    pub unavailable_after_failures: u32,

    /// Capacity of the event broadcast channel
    /// Default: 256
    pub event_buffer_size: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_playing: Duration::from_secs(2),
            interval_idle: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
            unavailable_after_failures: 3,
            event_buffer_size: 256,
        }
    }
}

impl PollConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Poll rarely while idle, e.g. for installations dark most of the year
    pub fn resource_efficient() -> Self {
        Self {
            interval_idle: Duration::from_secs(10),
            max_backoff: Duration::from_secs(120),
            event_buffer_size: 64,
            ..Default::default()
        }
    }

    /// Validate the configuration and return the first issue found
    pub fn validate(&self) -> Result<(), PollingError> {
        if self.interval_playing.is_zero() || self.interval_idle.is_zero() {
            return Err(PollingError::Configuration(
                "Polling intervals must be greater than 0".to_string(),
            ));
        }

        if self.max_backoff < self.interval_idle {
            return Err(PollingError::Configuration(
                "Max backoff must not be shorter than the idle interval".to_string(),
            ));
        }

        if self.interval_playing > MAX_INTERVAL
            || self.interval_idle > MAX_INTERVAL
            || self.max_backoff > MAX_INTERVAL
        {
            return Err(PollingError::Configuration(format!(
                "Polling intervals and max backoff must not exceed {}s",
                MAX_INTERVAL.as_secs()
            )));
        }

        if self.unavailable_after_failures == 0 {
            return Err(PollingError::Configuration(
                "Unavailable threshold must be at least 1".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(PollingError::Configuration(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_intervals(mut self, playing: Duration, idle: Duration) -> Self {
        self.interval_playing = playing;
        self.interval_idle = idle;
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    pub fn with_unavailable_after(mut self, failures: u32) -> Self {
        self.unavailable_after_failures = failures;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }
}
