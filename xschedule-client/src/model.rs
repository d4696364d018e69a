//! Parsed device state
//!
//! These are the immutable values produced by the client's parse step. A
//! [`Snapshot`] is one point-in-time status read; [`PlaylistEntry`] and
//! [`StepEntry`] describe the show data loaded on the device.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Playback status reported by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Playing,
    Paused,
    #[default]
    Idle,
}

impl PlaybackStatus {
    /// Parse the device's status string (case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "playing" => Some(PlaybackStatus::Playing),
            "paused" => Some(PlaybackStatus::Paused),
            "idle" => Some(PlaybackStatus::Idle),
            _ => None,
        }
    }

    /// Playing or paused: a playlist is loaded
    pub fn is_active(&self) -> bool {
        matches!(self, PlaybackStatus::Playing | PlaybackStatus::Paused)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::Idle => "idle",
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Version string reported by the device
///
/// Only compared for equality: any change means the loaded show data may have
/// changed (restart or upgrade).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The playlist a snapshot reports as active
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaylistRef {
    pub id: Option<String>,
    pub name: String,
}

impl PlaylistRef {
    pub fn new(id: Option<&str>, name: &str) -> Self {
        Self {
            id: id.map(str::to_string),
            name: name.to_string(),
        }
    }

    /// Identity used for comparisons: the id when reported, else the name
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

/// The step a snapshot reports as active
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepRef {
    pub id: Option<String>,
    pub name: String,
}

impl StepRef {
    pub fn new(id: Option<&str>, name: &str) -> Self {
        Self {
            id: id.map(str::to_string),
            name: name.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

/// A running schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRef {
    pub id: String,
    pub name: Option<String>,
    pub end: Option<String>,
}

/// Test mode as reported by the device
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TestMode {
    pub active: bool,
    pub mode: Option<String>,
}

/// The next playlist the scheduler will start on its own
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NextScheduled {
    pub start: Option<String>,
    pub end: Option<String>,
    pub playlist: Option<String>,
    pub schedule: Option<String>,
}

/// One parsed status read
///
/// Superseded, never mutated: each successful poll produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub status: PlaybackStatus,
    pub playlist: Option<PlaylistRef>,
    pub step: Option<StepRef>,
    pub position_ms: u64,
    pub length_ms: u64,
    pub volume: Option<u8>,
    pub brightness: Option<u8>,
    pub playlist_looping: bool,
    pub output_to_lights: bool,
    pub test_mode: TestMode,
    pub schedule: Option<ScheduleRef>,
    pub trigger: Option<String>,
    pub next_scheduled: Option<NextScheduled>,
    pub version: Option<Version>,
    pub fetched_at: DateTime<Utc>,
}

/// Builders for scripting snapshots in tests
#[cfg(any(test, feature = "test-support"))]
impl Snapshot {
    /// An idle snapshot with nothing loaded
    pub fn idle() -> Self {
        Self {
            status: PlaybackStatus::Idle,
            playlist: None,
            step: None,
            position_ms: 0,
            length_ms: 0,
            volume: None,
            brightness: None,
            playlist_looping: false,
            output_to_lights: false,
            test_mode: TestMode::default(),
            schedule: None,
            trigger: None,
            next_scheduled: None,
            version: None,
            fetched_at: Utc::now(),
        }
    }

    /// A playing snapshot of `playlist` at `step`
    pub fn playing(playlist: &str, step: &str) -> Self {
        Self {
            status: PlaybackStatus::Playing,
            playlist: Some(PlaylistRef::new(None, playlist)),
            step: Some(StepRef::new(None, step)),
            ..Self::idle()
        }
    }

    pub fn with_status(mut self, status: PlaybackStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(Version::new(version));
        self
    }

    pub fn with_volume(mut self, volume: u8) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_step(mut self, step: Option<StepRef>) -> Self {
        self.step = step;
        self
    }

    pub fn with_schedule(mut self, id: &str, name: Option<&str>) -> Self {
        self.schedule = Some(ScheduleRef {
            id: id.to_string(),
            name: name.map(str::to_string),
            end: None,
        });
        self
    }

    pub fn with_output_to_lights(mut self, on: bool) -> Self {
        self.output_to_lights = on;
        self
    }

    pub fn with_playlist_looping(mut self, looping: bool) -> Self {
        self.playlist_looping = looping;
        self
    }

    pub fn with_test_mode(mut self, mode: Option<&str>) -> Self {
        self.test_mode = TestMode {
            active: mode.is_some(),
            mode: mode.map(str::to_string),
        };
        self
    }
}

impl Snapshot {
    /// Muted is modelled as a volume of zero
    pub fn is_muted(&self) -> bool {
        self.volume == Some(0)
    }

    pub fn playlist_name(&self) -> Option<&str> {
        self.playlist.as_ref().map(|p| p.name.as_str())
    }

    pub fn step_name(&self) -> Option<&str> {
        self.step.as_ref().map(|s| s.name.as_str())
    }
}

/// A playlist loaded on the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub id: Option<String>,
    pub name: String,
    pub length_ms: Option<u64>,
    /// Known once the playlist's steps have been fetched
    pub step_count: Option<usize>,
}

impl PlaylistEntry {
    pub fn new(id: Option<&str>, name: &str) -> Self {
        Self {
            id: id.map(str::to_string),
            name: name.to_string(),
            length_ms: None,
            step_count: None,
        }
    }

    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

/// A step within a playlist; `index` is its zero-based position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEntry {
    pub id: Option<String>,
    pub name: String,
    pub index: usize,
    /// The playlist name or id the steps were requested for
    pub playlist: String,
    pub length_ms: Option<u64>,
}

/// Device answer to a command
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ack {
    pub result: String,
    pub message: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            result: "ok".to_string(),
            message: None,
        }
    }

    pub fn failed(message: &str) -> Self {
        Self {
            result: "failed".to_string(),
            message: Some(message.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.eq_ignore_ascii_case("ok")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_status_parse() {
        assert_eq!(PlaybackStatus::parse("Playing"), Some(PlaybackStatus::Playing));
        assert_eq!(PlaybackStatus::parse(" paused "), Some(PlaybackStatus::Paused));
        assert_eq!(PlaybackStatus::parse("idle"), Some(PlaybackStatus::Idle));
        assert_eq!(PlaybackStatus::parse("stopped"), None);
        assert!(PlaybackStatus::Paused.is_active());
        assert!(!PlaybackStatus::Idle.is_active());
    }

    #[test]
    fn test_refs_prefer_id_for_identity() {
        let with_id = PlaylistRef::new(Some("12"), "Holiday Show");
        assert_eq!(with_id.key(), "12");
        let without_id = PlaylistRef::new(None, "Holiday Show");
        assert_eq!(without_id.key(), "Holiday Show");
    }

    #[test]
    fn test_mute_is_zero_volume() {
        assert!(Snapshot::idle().with_volume(0).is_muted());
        assert!(!Snapshot::idle().with_volume(40).is_muted());
        assert!(!Snapshot::idle().is_muted());
    }

    #[test]
    fn test_ack_result() {
        assert!(Ack::ok().is_ok());
        assert!(!Ack::failed("unknown command").is_ok());
    }
}
