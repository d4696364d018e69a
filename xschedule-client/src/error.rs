//! Error types for the xSchedule client

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while talking to an xSchedule instance
///
/// Every variant describes the outcome of a single attempt. The client never
/// retries on its own; callers decide whether and when to try again.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// The device could not be reached (connection refused, DNS, reset, ...)
    #[error("Device unreachable: {0}")]
    Unreachable(String),

    /// The device did not answer within the configured request timeout
    #[error("Request timed out")]
    Timeout,

    /// The device refused the configured password
    ///
    /// This is not a transient condition: it persists until the password is
    /// corrected.
    #[error("Authentication rejected by device")]
    AuthRejected,

    /// The device answered, but the body could not be understood
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Copyable discriminant of [`DeviceError`], used for health reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceErrorKind {
    Unreachable,
    Timeout,
    AuthRejected,
    MalformedResponse,
}

impl DeviceError {
    /// The kind of this error without its payload
    pub fn kind(&self) -> DeviceErrorKind {
        match self {
            DeviceError::Unreachable(_) => DeviceErrorKind::Unreachable,
            DeviceError::Timeout => DeviceErrorKind::Timeout,
            DeviceError::AuthRejected => DeviceErrorKind::AuthRejected,
            DeviceError::MalformedResponse(_) => DeviceErrorKind::MalformedResponse,
        }
    }

    /// Whether the integration stays inoperable until configuration changes
    pub fn is_fatal(&self) -> bool {
        matches!(self, DeviceError::AuthRejected)
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        DeviceError::MalformedResponse(msg.into())
    }
}

impl From<reqwest::Error> for DeviceError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            DeviceError::Timeout
        } else if error.is_decode() {
            DeviceError::MalformedResponse(error.to_string())
        } else {
            DeviceError::Unreachable(error.to_string())
        }
    }
}

impl From<serde_json::Error> for DeviceError {
    fn from(error: serde_json::Error) -> Self {
        DeviceError::MalformedResponse(error.to_string())
    }
}

/// Type alias for results returned by the client
pub type Result<T> = std::result::Result<T, DeviceError>;
