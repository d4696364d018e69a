//! Domain events derived from consecutive snapshots

use serde::{Deserialize, Serialize};
use xschedule_client::{DeviceId, PlaybackStatus};

/// Prefix shared by every event name on the platform bus
pub const EVENT_PREFIX: &str = "xlights_scheduler";

/// A transition observed between two snapshots
///
/// Each variant carries only the fields relevant to its kind. Events are
/// plain values: created by the deriver, consumed once by subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    ScheduleStarted {
        device: DeviceId,
        schedule_id: String,
        schedule_name: Option<String>,
        playlist_id: Option<String>,
        playlist: Option<String>,
        schedule_end: Option<String>,
        trigger: Option<String>,
    },

    ScheduleEnded {
        device: DeviceId,
        schedule_id: String,
        schedule_name: Option<String>,
    },

    PlaylistStarted {
        device: DeviceId,
        playlist_id: Option<String>,
        playlist: String,
        status: PlaybackStatus,
        trigger: Option<String>,
    },

    PlaylistEnded {
        device: DeviceId,
        playlist_id: Option<String>,
        playlist: String,
        status: PlaybackStatus,
    },

    StepChanged {
        device: DeviceId,
        playlist_id: Option<String>,
        playlist: Option<String>,
        step_id: Option<String>,
        step: String,
        previous_step_id: Option<String>,
        previous_step: Option<String>,
        status: PlaybackStatus,
    },

    OutputToggled {
        device: DeviceId,
        state: bool,
        playlist_id: Option<String>,
        playlist: Option<String>,
        status: PlaybackStatus,
    },

    PlaylistLoopChanged {
        device: DeviceId,
        #[serde(rename = "loop")]
        looping: bool,
        playlist_id: Option<String>,
        playlist: Option<String>,
        status: PlaybackStatus,
    },

    TestModeStarted {
        device: DeviceId,
        mode: Option<String>,
    },

    TestModeStopped {
        device: DeviceId,
    },

    VersionChanged {
        device: DeviceId,
        version: String,
        previous_version: Option<String>,
    },
}

impl DomainEvent {
    /// Snake-case kind, e.g. `playlist_started`
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::ScheduleStarted { .. } => "schedule_started",
            DomainEvent::ScheduleEnded { .. } => "schedule_ended",
            DomainEvent::PlaylistStarted { .. } => "playlist_started",
            DomainEvent::PlaylistEnded { .. } => "playlist_ended",
            DomainEvent::StepChanged { .. } => "step_changed",
            DomainEvent::OutputToggled { .. } => "output_toggled",
            DomainEvent::PlaylistLoopChanged { .. } => "playlist_loop_changed",
            DomainEvent::TestModeStarted { .. } => "test_mode_started",
            DomainEvent::TestModeStopped { .. } => "test_mode_stopped",
            DomainEvent::VersionChanged { .. } => "version_changed",
        }
    }

    /// Full event name as fired on the platform bus
    pub fn event_type(&self) -> String {
        format!("{}_{}", EVENT_PREFIX, self.kind())
    }

    pub fn device(&self) -> &DeviceId {
        match self {
            DomainEvent::ScheduleStarted { device, .. }
            | DomainEvent::ScheduleEnded { device, .. }
            | DomainEvent::PlaylistStarted { device, .. }
            | DomainEvent::PlaylistEnded { device, .. }
            | DomainEvent::StepChanged { device, .. }
            | DomainEvent::OutputToggled { device, .. }
            | DomainEvent::PlaylistLoopChanged { device, .. }
            | DomainEvent::TestModeStarted { device, .. }
            | DomainEvent::TestModeStopped { device }
            | DomainEvent::VersionChanged { device, .. } => device,
        }
    }
}

/// All events derived from one poll tick, in emission order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBatch {
    pub device: DeviceId,
    /// Poll counter of the tick that produced the batch
    pub poll: u64,
    pub events: Vec<DomainEvent>,
}
