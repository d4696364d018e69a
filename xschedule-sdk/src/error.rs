use thiserror::Error;
use xschedule_client::DeviceError;
use xschedule_stream::PollingError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdkError {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Rejected locally; nothing was sent to the device
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The device answered with a non-ok result
    #[error("Command '{command}' rejected by device: {message}")]
    CommandRejected { command: String, message: String },

    #[error("Media browsing is disabled")]
    BrowseDisabled,

    #[error("Unknown media type: {0}")]
    UnknownMediaType(String),

    #[error("No status has been read from the device yet")]
    NotConnected,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Polling error: {0}")]
    Polling(#[from] PollingError),
}

impl SdkError {
    /// Whether the device refused the configured credentials
    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, SdkError::Device(DeviceError::AuthRejected))
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;
