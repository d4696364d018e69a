//! Bridge configuration
//!
//! [`BridgeOptions`] carries the tunables a platform exposes to users;
//! [`BridgeConfig`] adds the device connection. Options deserialize from JSON
//! with every field defaulted, so a partial file is valid.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use xschedule_client::{DeviceConfig, DEFAULT_PORT};
use xschedule_state::MetadataConfig;
use xschedule_stream::PollConfig;

use crate::error::{Result, SdkError};

/// User-facing tunables of the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeOptions {
    /// Seconds between polls while playing or paused
    pub poll_interval_playing: u64,
    /// Seconds between polls while idle
    pub poll_interval_idle: u64,
    /// Playlist list TTL in seconds
    pub lists_refresh_secs: u64,
    /// Step list TTL in seconds; must be shorter than `lists_refresh_secs`
    pub steps_refresh_secs: u64,
    pub enable_browse_media: bool,
    /// Unavailable once this many polls in a row have failed
    pub unavailable_after_failures: u32,
    pub max_backoff_secs: u64,
    pub event_buffer_size: usize,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            poll_interval_playing: 2,
            poll_interval_idle: 2,
            lists_refresh_secs: 15,
            steps_refresh_secs: 5,
            enable_browse_media: true,
            unavailable_after_failures: 3,
            max_backoff_secs: 60,
            event_buffer_size: 256,
        }
    }
}

impl BridgeOptions {
    pub fn poll_config(&self) -> PollConfig {
        PollConfig::default()
            .with_intervals(
                Duration::from_secs(self.poll_interval_playing),
                Duration::from_secs(self.poll_interval_idle),
            )
            .with_max_backoff(Duration::from_secs(self.max_backoff_secs))
            .with_unavailable_after(self.unavailable_after_failures)
            .with_buffer_size(self.event_buffer_size)
    }

    pub fn metadata_config(&self) -> MetadataConfig {
        MetadataConfig {
            playlist_ttl: Duration::from_secs(self.lists_refresh_secs),
            steps_ttl: Duration::from_secs(self.steps_refresh_secs),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.lists_refresh_secs == 0 {
            return Err(SdkError::Config(
                "lists_refresh_secs must be greater than 0".to_string(),
            ));
        }
        if self.steps_refresh_secs >= self.lists_refresh_secs {
            return Err(SdkError::Config(format!(
                "steps_refresh_secs ({}) must be shorter than lists_refresh_secs ({})",
                self.steps_refresh_secs, self.lists_refresh_secs
            )));
        }
        self.poll_config().validate()?;
        Ok(())
    }

    pub fn with_poll_intervals(mut self, playing_secs: u64, idle_secs: u64) -> Self {
        self.poll_interval_playing = playing_secs;
        self.poll_interval_idle = idle_secs;
        self
    }

    pub fn with_refresh(mut self, lists_secs: u64, steps_secs: u64) -> Self {
        self.lists_refresh_secs = lists_secs;
        self.steps_refresh_secs = steps_secs;
        self
    }

    pub fn with_browse_media(mut self, enabled: bool) -> Self {
        self.enable_browse_media = enabled;
        self
    }

    pub fn with_unavailable_after(mut self, failures: u32) -> Self {
        self.unavailable_after_failures = failures;
        self
    }
}

/// On-disk shape of a bridge configuration file
#[derive(Debug, Deserialize)]
struct ConfigFile {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    request_timeout_secs: Option<u64>,
    #[serde(default)]
    options: BridgeOptions,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Device connection plus bridge options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub device: DeviceConfig,
    pub options: BridgeOptions,
}

impl BridgeConfig {
    pub fn new(device: DeviceConfig) -> Self {
        Self {
            device,
            options: BridgeOptions::default(),
        }
    }

    /// Load from a JSON file
    ///
    /// ```json
    /// { "host": "192.168.1.50", "port": 8080, "password": "secret",
    ///   "options": { "poll_interval_idle": 10 } }
    /// ```
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let file: ConfigFile = serde_json::from_str(&text)
            .map_err(|e| SdkError::Config(format!("invalid config {}: {}", path.display(), e)))?;

        let mut device = DeviceConfig::new(file.host).with_port(file.port);
        if let Some(password) = file.password {
            device = device.with_password(password);
        }
        if let Some(secs) = file.request_timeout_secs {
            device = device.with_request_timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            device,
            options: file.options,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.device.host.trim().is_empty() {
            return Err(SdkError::Config("host must not be empty".to_string()));
        }
        if self.device.port == 0 {
            return Err(SdkError::Config("port must not be 0".to_string()));
        }
        if self.device.request_timeout.is_zero() {
            return Err(SdkError::Config(
                "request timeout must be greater than 0".to_string(),
            ));
        }
        self.options.validate()
    }

    pub fn with_options(mut self, options: BridgeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.device = self.device.with_password(password);
        self
    }
}
