//! The seam between the bridge and a device

use async_trait::async_trait;

use crate::command::Command;
use crate::config::DeviceId;
use crate::error::Result;
use crate::model::{Ack, PlaylistEntry, Snapshot, StepEntry};

/// Operations the bridge needs from an xSchedule instance
///
/// Every call is a single attempt. Implementations never retry on their own,
/// except for the re-login that is part of the authentication handshake.
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// Identity used in logs and event payloads
    fn device_id(&self) -> &DeviceId;

    /// Read the current playback status
    ///
    /// Returns within the configured request timeout once logged in; a login
    /// handshake adds its own requests.
    async fn fetch_status(&self) -> Result<Snapshot>;

    /// List the playlists loaded on the device
    async fn fetch_playlists(&self) -> Result<Vec<PlaylistEntry>>;

    /// List the steps of a playlist, by name or id
    async fn fetch_steps(&self, playlist: &str) -> Result<Vec<StepEntry>>;

    /// Send a command and return the device's acknowledgement
    async fn send_command(&self, command: &Command) -> Result<Ack>;
}
