//! JSON wire format of the xSchedule web API
//!
//! The scheduler reports nearly every value as a string, but some builds emit
//! bare numbers or booleans. Fields are therefore read leniently into
//! `Option<String>` and converted into typed values in one place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{DeviceError, Result};
use crate::model::{
    Ack, NextScheduled, PlaybackStatus, PlaylistEntry, PlaylistRef, ScheduleRef, Snapshot,
    StepEntry, StepRef, TestMode, Version,
};

/// Result string the device uses when a session has expired
pub(crate) const NOT_LOGGED_IN: &str = "not logged in";

fn lenient<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected a scalar, got {}",
                other
            )))
        }
    })
}

/// Trimmed, non-empty text
fn text(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn flag(value: &Option<String>) -> bool {
    text(value).map_or(false, |s| s.eq_ignore_ascii_case("true"))
}

fn number(field: &str, value: &Option<String>) -> Result<Option<u64>> {
    match text(value) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| DeviceError::malformed(format!("field '{}' is not a number: {}", field, raw))),
    }
}

fn percent(field: &str, value: &Option<String>) -> Result<Option<u8>> {
    Ok(number(field, value)?.map(|v| v.min(100) as u8))
}

/// Common envelope: every answer may carry a `result`
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default, deserialize_with = "lenient")]
    pub result: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub ip: Option<String>,
}

impl Envelope {
    pub fn is_not_logged_in(&self) -> bool {
        text(&self.result).map_or(false, |r| r.eq_ignore_ascii_case(NOT_LOGGED_IN))
    }

    pub fn is_ok(&self) -> bool {
        text(&self.result).map_or(false, |r| r.eq_ignore_ascii_case("ok"))
    }

    /// An object without `result` is an acknowledgement
    pub fn into_ack(self) -> Ack {
        Ack {
            result: text(&self.result).unwrap_or("ok").to_string(),
            message: text(&self.message).map(str::to_string),
        }
    }
}

/// `GetPlayingStatus` body
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PlayingStatusWire {
    #[serde(default, deserialize_with = "lenient")]
    status: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    playlist: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    playlistid: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    playlistlooping: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    step: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    stepid: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    lengthms: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    positionms: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    volume: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    brightness: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    outputtolights: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    testmode: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    testmodename: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    scheduleid: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    schedulename: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    scheduleend: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    trigger: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    version: Option<String>,
}

impl PlayingStatusWire {
    /// Convert into a [`Snapshot`]; anything partial is rejected whole
    pub fn into_snapshot(
        self,
        next_scheduled: Option<NextScheduled>,
        fetched_at: DateTime<Utc>,
    ) -> Result<Snapshot> {
        let raw_status = text(&self.status)
            .ok_or_else(|| DeviceError::malformed("status response has no 'status' field"))?;
        let status = PlaybackStatus::parse(raw_status)
            .ok_or_else(|| DeviceError::malformed(format!("unknown playback status: {}", raw_status)))?;

        let position_ms = number("positionms", &self.positionms)?.unwrap_or(0);
        let length_ms = number("lengthms", &self.lengthms)?.unwrap_or(0);
        let volume = percent("volume", &self.volume)?;
        let brightness = percent("brightness", &self.brightness)?;

        // Playlist, step and schedule only mean something while a show is loaded.
        let active = status.is_active();
        let playlist = text(&self.playlist)
            .filter(|_| active)
            .map(|name| PlaylistRef::new(text(&self.playlistid), name));
        let step = text(&self.step)
            .filter(|_| active)
            .map(|name| StepRef::new(text(&self.stepid), name));
        let schedule = text(&self.scheduleid)
            .filter(|id| active && !id.eq_ignore_ascii_case("N/A"))
            .map(|id| ScheduleRef {
                id: id.to_string(),
                name: text(&self.schedulename).map(str::to_string),
                end: text(&self.scheduleend).map(str::to_string),
            });

        let test_active = flag(&self.testmode);
        let test_mode = TestMode {
            active: test_active,
            mode: text(&self.testmodename)
                .filter(|_| test_active)
                .map(str::to_string),
        };

        Ok(Snapshot {
            status,
            playlist,
            step,
            position_ms,
            length_ms,
            volume,
            brightness,
            playlist_looping: active && flag(&self.playlistlooping),
            output_to_lights: flag(&self.outputtolights),
            test_mode,
            schedule,
            trigger: text(&self.trigger).filter(|_| active).map(str::to_string),
            next_scheduled,
            version: text(&self.version).map(Version::new),
            fetched_at,
        })
    }
}

/// `GetNextScheduledPlayList` body
#[derive(Debug, Default, Deserialize)]
pub(crate) struct NextScheduledWire {
    #[serde(default, deserialize_with = "lenient")]
    start: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    end: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    playlistname: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    schedulename: Option<String>,
}

impl NextScheduledWire {
    pub fn into_model(self) -> Option<NextScheduled> {
        let next = NextScheduled {
            start: text(&self.start).map(str::to_string),
            end: text(&self.end).map(str::to_string),
            playlist: text(&self.playlistname).map(str::to_string),
            schedule: text(&self.schedulename).map(str::to_string),
        };
        if next == NextScheduled::default() {
            None
        } else {
            Some(next)
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlaylistWire {
    #[serde(default, deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    lengthms: Option<String>,
}

/// `GetPlayLists` body
#[derive(Debug, Deserialize)]
pub(crate) struct PlaylistsWire {
    #[serde(default)]
    playlists: Vec<PlaylistWire>,
}

impl PlaylistsWire {
    pub fn into_entries(self) -> Vec<PlaylistEntry> {
        let mut entries: Vec<PlaylistEntry> = Vec::with_capacity(self.playlists.len());
        for pl in self.playlists {
            let Some(name) = text(&pl.name) else { continue };
            let mut entry = PlaylistEntry::new(text(&pl.id), name);
            entry.length_ms = text(&pl.lengthms).and_then(|v| v.parse().ok());
            // Unique by identity: keep the first occurrence.
            if entries.iter().any(|e| e.key() == entry.key()) {
                continue;
            }
            entries.push(entry);
        }
        entries
    }
}

#[derive(Debug, Deserialize)]
struct StepWire {
    #[serde(default, deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    lengthms: Option<String>,
}

/// `GetPlayListSteps` body
#[derive(Debug, Deserialize)]
pub(crate) struct StepsWire {
    #[serde(default)]
    steps: Vec<StepWire>,
}

impl StepsWire {
    pub fn into_entries(self, playlist: &str) -> Vec<StepEntry> {
        self.steps
            .into_iter()
            .filter_map(|st| {
                let name = text(&st.name)?.to_string();
                Some((name, st))
            })
            .enumerate()
            .map(|(index, (name, st))| StepEntry {
                id: text(&st.id).map(str::to_string),
                name,
                index,
                playlist: playlist.to_string(),
                length_ms: text(&st.lengthms).and_then(|v| v.parse().ok()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_status(json: &str) -> Result<Snapshot> {
        let wire: PlayingStatusWire = serde_json::from_str(json)?;
        wire.into_snapshot(None, Utc::now())
    }

    #[test]
    fn test_playing_status() {
        let snapshot = parse_status(
            r#"{"status":"playing","playlist":"Holiday Show","playlistid":"7",
                "step":"Step 1","stepid":"70","lengthms":"180000","positionms":"12000",
                "volume":"65","brightness":"100","outputtolights":"true",
                "playlistlooping":"true","scheduleid":"3","schedulename":"Evenings",
                "scheduleend":"22:00","trigger":"scheduled","version":"2024.05"}"#,
        )
        .unwrap();

        assert_eq!(snapshot.status, PlaybackStatus::Playing);
        assert_eq!(snapshot.playlist, Some(PlaylistRef::new(Some("7"), "Holiday Show")));
        assert_eq!(snapshot.step, Some(StepRef::new(Some("70"), "Step 1")));
        assert_eq!(snapshot.length_ms, 180_000);
        assert_eq!(snapshot.position_ms, 12_000);
        assert_eq!(snapshot.volume, Some(65));
        assert!(snapshot.output_to_lights);
        assert!(snapshot.playlist_looping);
        assert_eq!(snapshot.schedule.as_ref().unwrap().id, "3");
        assert_eq!(snapshot.version, Some(Version::new("2024.05")));
    }

    #[test]
    fn test_idle_drops_show_fields() {
        let snapshot = parse_status(
            r#"{"status":"idle","playlist":"Leftover","scheduleid":"3","outputtolights":"false","version":"2024.05"}"#,
        )
        .unwrap();
        assert_eq!(snapshot.status, PlaybackStatus::Idle);
        assert!(snapshot.playlist.is_none());
        assert!(snapshot.schedule.is_none());
    }

    #[test]
    fn test_na_schedule_is_none() {
        let snapshot = parse_status(r#"{"status":"playing","playlist":"A","scheduleid":"N/A"}"#).unwrap();
        assert!(snapshot.schedule.is_none());
    }

    #[test]
    fn test_numbers_accepted_as_json_numbers() {
        let snapshot = parse_status(r#"{"status":"paused","volume":40,"positionms":5}"#).unwrap();
        assert_eq!(snapshot.volume, Some(40));
        assert_eq!(snapshot.position_ms, 5);
    }

    #[test]
    fn test_missing_status_is_malformed() {
        let err = parse_status(r#"{"playlist":"A"}"#).unwrap_err();
        assert!(matches!(err, DeviceError::MalformedResponse(_)));
    }

    #[test]
    fn test_unknown_status_is_malformed() {
        let err = parse_status(r#"{"status":"exploded"}"#).unwrap_err();
        assert!(matches!(err, DeviceError::MalformedResponse(_)));
    }

    #[test]
    fn test_non_numeric_field_is_malformed() {
        let err = parse_status(r#"{"status":"playing","positionms":"soon"}"#).unwrap_err();
        assert!(matches!(err, DeviceError::MalformedResponse(_)));
    }

    #[test]
    fn test_test_mode_fields() {
        let snapshot =
            parse_status(r#"{"status":"idle","testmode":"true","testmodename":"A-B-C"}"#).unwrap();
        assert!(snapshot.test_mode.active);
        assert_eq!(snapshot.test_mode.mode.as_deref(), Some("A-B-C"));
    }

    #[test]
    fn test_playlists_skip_unnamed_and_duplicates() {
        let wire: PlaylistsWire = serde_json::from_str(
            r#"{"playlists":[{"name":"A","id":"1"},{"name":""},{"name":"B","id":"2","lengthms":"1000"},{"name":"A again","id":"1"}]}"#,
        )
        .unwrap();
        let entries = wire.into_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].name, "B");
        assert_eq!(entries[1].length_ms, Some(1000));
    }

    #[test]
    fn test_steps_are_indexed_in_order() {
        let wire: StepsWire = serde_json::from_str(
            r#"{"steps":[{"name":"Intro","id":"10"},{"name":"Main","id":"11"},{"name":"Outro"}]}"#,
        )
        .unwrap();
        let steps = wire.into_entries("Holiday Show");
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[2].index, 2);
        assert_eq!(steps[2].playlist, "Holiday Show");
        assert!(steps[2].id.is_none());
    }

    #[test]
    fn test_empty_next_scheduled_is_none() {
        let wire: NextScheduledWire = serde_json::from_str("{}").unwrap();
        assert!(wire.into_model().is_none());
        let wire: NextScheduledWire =
            serde_json::from_str(r#"{"start":"2024-12-01 17:00","playlistname":"Holiday Show"}"#).unwrap();
        let next = wire.into_model().unwrap();
        assert_eq!(next.playlist.as_deref(), Some("Holiday Show"));
    }
}
