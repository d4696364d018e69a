//! Error types for the xschedule-stream crate.

/// Errors from the polling task
///
/// Device failures are not errors here: the task absorbs them into its
/// backoff and reports them through [`PollStatus`](crate::PollStatus).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollingError {
    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The background task panicked or could not be joined
    #[error("Polling task failed: {0}")]
    TaskJoin(String),
}

/// Type alias for polling operation results
pub type PollingResult<T> = Result<T, PollingError>;
