//! Client for the xLights scheduler (xSchedule) web API
//!
//! [`XScheduleClient`] talks to one xSchedule instance over HTTP/JSON and
//! turns its answers into typed values:
//!
//! - [`Snapshot`] for a single playback status read
//! - [`PlaylistEntry`] and [`StepEntry`] for the show data loaded on the device
//! - [`Ack`] for command acknowledgements
//!
//! Code that polls or controls a device should depend on the [`DeviceApi`]
//! trait rather than the concrete client, so it can be driven by the scripted
//! [`MockDevice`] (feature `test-support`) in tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use xschedule_client::{DeviceApi, DeviceConfig, XScheduleClient};
//!
//! # async fn run() -> Result<(), xschedule_client::DeviceError> {
//! let client = XScheduleClient::new(DeviceConfig::new("192.168.1.50").with_password("secret"))?;
//! let snapshot = client.fetch_status().await?;
//! println!("{} {:?}", snapshot.status, snapshot.playlist_name());
//! # Ok(())
//! # }
//! ```

mod api;
mod auth;
mod client;
mod command;
mod config;
mod error;
mod model;
mod wire;

#[cfg(any(test, feature = "test-support"))]
mod mock;

pub use api::DeviceApi;
pub use client::{XScheduleClient, REFERENCE};
pub use command::{Command, TestModeRequest, TestPattern};
pub use config::{DeviceConfig, DeviceId, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT};
pub use error::{DeviceError, DeviceErrorKind, Result};
pub use model::{
    Ack, NextScheduled, PlaybackStatus, PlaylistEntry, PlaylistRef, ScheduleRef, Snapshot,
    StepEntry, StepRef, TestMode, Version,
};

#[cfg(any(test, feature = "test-support"))]
pub use mock::MockDevice;
