//! Turns consecutive snapshots into domain events
//!
//! Rules are evaluated in a fixed order so one poll tick can emit several
//! events deterministically:
//!
//! 1. version change
//! 2. schedule end, then schedule start
//! 3. playlist end, then playlist start
//! 4. step change
//! 5. flag transitions (output to lights, playlist loop, test mode)
//!
//! Identical snapshots produce no events.

use std::sync::Arc;

use tracing::{debug, info};
use xschedule_client::{DeviceId, Snapshot};

use crate::events::DomainEvent;
use crate::metadata_cache::MetadataCache;
use crate::snapshot_cache::SnapshotPair;

/// Diff two snapshots into the ordered list of events between them
pub fn diff_snapshots(device: &DeviceId, previous: &Snapshot, current: &Snapshot) -> Vec<DomainEvent> {
    let mut events = Vec::new();

    version_events(device, previous, current, &mut events);
    schedule_events(device, previous, current, &mut events);
    playlist_events(device, previous, current, &mut events);
    step_events(device, previous, current, &mut events);
    flag_events(device, previous, current, &mut events);

    events
}

fn version_events(device: &DeviceId, previous: &Snapshot, current: &Snapshot, out: &mut Vec<DomainEvent>) {
    // A missing version is not evidence of a change.
    if let (Some(old), Some(new)) = (&previous.version, &current.version) {
        if old != new {
            out.push(DomainEvent::VersionChanged {
                device: device.clone(),
                version: new.to_string(),
                previous_version: Some(old.to_string()),
            });
        }
    }
}

fn schedule_events(device: &DeviceId, previous: &Snapshot, current: &Snapshot, out: &mut Vec<DomainEvent>) {
    let old = previous.schedule.as_ref();
    let new = current.schedule.as_ref();
    if old.map(|s| &s.id) == new.map(|s| &s.id) {
        return;
    }

    if let Some(old) = old {
        out.push(DomainEvent::ScheduleEnded {
            device: device.clone(),
            schedule_id: old.id.clone(),
            schedule_name: old.name.clone(),
        });
    }
    if let Some(new) = new {
        out.push(DomainEvent::ScheduleStarted {
            device: device.clone(),
            schedule_id: new.id.clone(),
            schedule_name: new.name.clone(),
            playlist_id: current.playlist.as_ref().and_then(|p| p.id.clone()),
            playlist: current.playlist_name().map(str::to_string),
            schedule_end: new.end.clone(),
            trigger: current.trigger.clone(),
        });
    }
}

fn playlist_events(device: &DeviceId, previous: &Snapshot, current: &Snapshot, out: &mut Vec<DomainEvent>) {
    let old = previous.playlist.as_ref();
    let new = current.playlist.as_ref();
    if old.map(|p| p.key()) == new.map(|p| p.key()) {
        return;
    }

    if let Some(old) = old {
        out.push(DomainEvent::PlaylistEnded {
            device: device.clone(),
            playlist_id: old.id.clone(),
            playlist: old.name.clone(),
            status: current.status,
        });
    }
    if let Some(new) = new {
        out.push(DomainEvent::PlaylistStarted {
            device: device.clone(),
            playlist_id: new.id.clone(),
            playlist: new.name.clone(),
            status: current.status,
            trigger: current.trigger.clone(),
        });
    }
}

fn step_events(device: &DeviceId, previous: &Snapshot, current: &Snapshot, out: &mut Vec<DomainEvent>) {
    // A step disappearing is covered by the playlist ending.
    let Some(step) = current.step.as_ref() else {
        return;
    };
    let old = previous.step.as_ref();
    let same_playlist =
        previous.playlist.as_ref().map(|p| p.key()) == current.playlist.as_ref().map(|p| p.key());
    if same_playlist && old.map(|s| s.key()) == Some(step.key()) {
        return;
    }

    // Carrying a step over from another playlist would be misleading.
    let old = old.filter(|_| same_playlist);
    out.push(DomainEvent::StepChanged {
        device: device.clone(),
        playlist_id: current.playlist.as_ref().and_then(|p| p.id.clone()),
        playlist: current.playlist_name().map(str::to_string),
        step_id: step.id.clone(),
        step: step.name.clone(),
        previous_step_id: old.and_then(|s| s.id.clone()),
        previous_step: old.map(|s| s.name.clone()),
        status: current.status,
    });
}

fn flag_events(device: &DeviceId, previous: &Snapshot, current: &Snapshot, out: &mut Vec<DomainEvent>) {
    let playlist_id = || current.playlist.as_ref().and_then(|p| p.id.clone());
    let playlist = || current.playlist_name().map(str::to_string);

    if previous.output_to_lights != current.output_to_lights {
        out.push(DomainEvent::OutputToggled {
            device: device.clone(),
            state: current.output_to_lights,
            playlist_id: playlist_id(),
            playlist: playlist(),
            status: current.status,
        });
    }

    // Loop is a property of the running playlist; only a toggle on the same
    // playlist is a loop change.
    let same_playlist = current.playlist.is_some()
        && previous.playlist.as_ref().map(|p| p.key()) == current.playlist.as_ref().map(|p| p.key());
    if same_playlist && previous.playlist_looping != current.playlist_looping {
        out.push(DomainEvent::PlaylistLoopChanged {
            device: device.clone(),
            looping: current.playlist_looping,
            playlist_id: playlist_id(),
            playlist: playlist(),
            status: current.status,
        });
    }

    match (previous.test_mode.active, current.test_mode.active) {
        (false, true) => out.push(DomainEvent::TestModeStarted {
            device: device.clone(),
            mode: current.test_mode.mode.clone(),
        }),
        (true, false) => out.push(DomainEvent::TestModeStopped {
            device: device.clone(),
        }),
        _ => {}
    }
}

/// Derives events for one device and invalidates metadata on version changes
#[derive(Debug, Clone)]
pub struct EventDeriver {
    device: DeviceId,
    metadata: Arc<MetadataCache>,
}

impl EventDeriver {
    pub fn new(device: DeviceId, metadata: Arc<MetadataCache>) -> Self {
        Self { device, metadata }
    }

    /// Events between the two snapshots of `pair`
    ///
    /// A version change only marks the playlist cache stale; the refetch is
    /// deferred to the next metadata access.
    pub fn derive(&self, pair: &SnapshotPair) -> Vec<DomainEvent> {
        if pair.is_initial() {
            return Vec::new();
        }

        let events = diff_snapshots(&self.device, &pair.previous, &pair.current);
        for event in &events {
            match event {
                DomainEvent::VersionChanged { version, .. } => {
                    info!(device = %self.device, version = %version, "Device version changed");
                    self.metadata.invalidate_playlists();
                }
                other => debug!(device = %self.device, event = other.kind(), "Derived event"),
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xschedule_client::{PlaybackStatus, StepRef};

    fn device() -> DeviceId {
        DeviceId::new("show-pc", 8080)
    }

    fn kinds(events: &[DomainEvent]) -> Vec<&'static str> {
        events.iter().map(DomainEvent::kind).collect()
    }

    #[test]
    fn test_idle_to_playing() {
        let events = diff_snapshots(
            &device(),
            &Snapshot::idle(),
            &Snapshot::playing("Holiday Show", "Step 1"),
        );
        assert_eq!(kinds(&events), vec!["playlist_started", "step_changed"]);
        match &events[1] {
            DomainEvent::StepChanged {
                step, previous_step, ..
            } => {
                assert_eq!(step, "Step 1");
                assert!(previous_step.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_playing_to_idle_ends_playlist_only() {
        let events = diff_snapshots(
            &device(),
            &Snapshot::playing("Holiday Show", "Step 3"),
            &Snapshot::idle(),
        );
        assert_eq!(kinds(&events), vec!["playlist_ended"]);
    }

    #[test]
    fn test_playlist_switch_ends_before_start() {
        let events = diff_snapshots(
            &device(),
            &Snapshot::playing("Halloween", "Intro"),
            &Snapshot::playing("Holiday Show", "Intro"),
        );
        assert_eq!(
            kinds(&events),
            vec!["playlist_ended", "playlist_started", "step_changed"]
        );
        match &events[2] {
            DomainEvent::StepChanged { previous_step, .. } => assert!(previous_step.is_none()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_step_change_within_playlist() {
        let events = diff_snapshots(
            &device(),
            &Snapshot::playing("Holiday Show", "Step 1"),
            &Snapshot::playing("Holiday Show", "Step 2"),
        );
        assert_eq!(
            events,
            vec![DomainEvent::StepChanged {
                device: device(),
                playlist_id: None,
                playlist: Some("Holiday Show".into()),
                step_id: None,
                step: "Step 2".into(),
                previous_step_id: None,
                previous_step: Some("Step 1".into()),
                status: PlaybackStatus::Playing,
            }]
        );
    }

    #[test]
    fn test_pause_alone_emits_nothing() {
        let events = diff_snapshots(
            &device(),
            &Snapshot::playing("Holiday Show", "Step 1"),
            &Snapshot::playing("Holiday Show", "Step 1").with_status(PlaybackStatus::Paused),
        );
        assert!(events.is_empty());
    }

    #[test]
    fn test_schedule_switch() {
        let base = Snapshot::playing("Holiday Show", "Step 1");
        let events = diff_snapshots(
            &device(),
            &base.clone().with_schedule("1", Some("Evenings")),
            &base.clone().with_schedule("2", Some("Weekend")),
        );
        assert_eq!(kinds(&events), vec!["schedule_ended", "schedule_started"]);
    }

    #[test]
    fn test_flags_coexist_with_step_change() {
        let previous = Snapshot::playing("Holiday Show", "Step 1");
        let current = Snapshot::playing("Holiday Show", "Step 1")
            .with_step(Some(StepRef::new(None, "Step 2")))
            .with_output_to_lights(true)
            .with_playlist_looping(true)
            .with_test_mode(Some("A-B-C"));
        let events = diff_snapshots(&device(), &previous, &current);
        assert_eq!(
            kinds(&events),
            vec![
                "step_changed",
                "output_toggled",
                "playlist_loop_changed",
                "test_mode_started"
            ]
        );
    }

    #[test]
    fn test_test_mode_stop() {
        let events = diff_snapshots(
            &device(),
            &Snapshot::idle().with_test_mode(Some("Alternate")),
            &Snapshot::idle(),
        );
        assert_eq!(kinds(&events), vec!["test_mode_stopped"]);
    }

    #[test]
    fn test_version_first() {
        let events = diff_snapshots(
            &device(),
            &Snapshot::idle().with_version("3"),
            &Snapshot::playing("Holiday Show", "Step 1").with_version("4"),
        );
        assert_eq!(events[0].kind(), "version_changed");
    }

    #[test]
    fn test_missing_version_is_not_a_change() {
        let events = diff_snapshots(&device(), &Snapshot::idle(), &Snapshot::idle().with_version("4"));
        assert!(events.is_empty());
    }
}
