//! Command dispatch
//!
//! Every operation validates its arguments, sends exactly one command and
//! waits for the acknowledgement. Cached state is never touched here: the
//! next poll observes the effect, and an acknowledged command asks for that
//! poll to happen right away.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};
use xschedule_client::{Ack, Command, DeviceApi, PlaybackStatus, TestModeRequest};
use xschedule_state::{MetadataCache, SnapshotCache};
use xschedule_stream::RefreshHandle;

use crate::error::{Result, SdkError};

/// Volume restored on unmute when no earlier volume was seen
pub const DEFAULT_UNMUTE_VOLUME: u8 = 50;

/// Sends commands to one device
pub struct CommandDispatcher {
    device: Arc<dyn DeviceApi>,
    snapshots: Arc<SnapshotCache>,
    metadata: Arc<MetadataCache>,
    refresh: Option<RefreshHandle>,
    selected_playlist: Mutex<Option<String>>,
}

impl CommandDispatcher {
    pub fn new(
        device: Arc<dyn DeviceApi>,
        snapshots: Arc<SnapshotCache>,
        metadata: Arc<MetadataCache>,
        refresh: Option<RefreshHandle>,
    ) -> Self {
        Self {
            device,
            snapshots,
            metadata,
            refresh,
            selected_playlist: Mutex::new(None),
        }
    }

    /// Validate, send and confirm a single command
    ///
    /// Transport errors are returned as-is and never retried: commands such
    /// as `adjust_volume` are not idempotent.
    pub async fn send(&self, command: Command) -> Result<Ack> {
        command.validate().map_err(SdkError::InvalidParameter)?;

        debug!(device = %self.device.device_id(), %command, "Sending command");
        let ack = self.device.send_command(&command).await.map_err(|e| {
            warn!(device = %self.device.device_id(), %command, error = %e, "Command failed");
            SdkError::Device(e)
        })?;

        if !ack.is_ok() {
            return Err(SdkError::CommandRejected {
                command: command.name().to_string(),
                message: ack.message.unwrap_or(ack.result),
            });
        }

        if let Some(refresh) = &self.refresh {
            refresh.request();
        }
        Ok(ack)
    }

    pub async fn play_playlist(&self, playlist: &str, looped: bool) -> Result<Ack> {
        self.send(Command::PlayPlaylist {
            playlist: playlist.to_string(),
            looped,
        })
        .await
    }

    pub async fn play_step(&self, playlist: &str, step: &str, looped: bool) -> Result<Ack> {
        self.send(Command::PlayStep {
            playlist: playlist.to_string(),
            step: step.to_string(),
            looped,
        })
        .await
    }

    pub async fn stop_playlist(&self) -> Result<Ack> {
        self.send(Command::Stop).await
    }

    pub async fn stop_all_now(&self) -> Result<Ack> {
        self.send(Command::StopAllNow).await
    }

    pub async fn pause_toggle(&self) -> Result<Ack> {
        self.send(Command::PauseToggle).await
    }

    pub async fn next_step(&self) -> Result<Ack> {
        self.send(Command::NextStep).await
    }

    pub async fn prior_step(&self) -> Result<Ack> {
        self.send(Command::PriorStep).await
    }

    pub async fn restart_step(&self) -> Result<Ack> {
        self.send(Command::RestartStep).await
    }

    /// Seek within the current step
    pub async fn seek_ms(&self, position_ms: i64) -> Result<Ack> {
        let position_ms = u64::try_from(position_ms).map_err(|_| {
            SdkError::InvalidParameter(format!("seek position {} is negative", position_ms))
        })?;
        self.send(Command::SeekMs { position_ms }).await
    }

    /// Set the volume; anything outside 0..=100 is rejected without a request
    pub async fn set_volume(&self, volume: i64) -> Result<Ack> {
        let volume = percent(volume, "volume")?;
        self.send(Command::SetVolume { volume }).await
    }

    pub async fn adjust_volume(&self, delta: i64) -> Result<Ack> {
        let delta = i32::try_from(delta)
            .ok()
            .filter(|d| (-100..=100).contains(d))
            .ok_or_else(|| {
                SdkError::InvalidParameter(format!("volume delta {} is outside -100..=100", delta))
            })?;
        self.send(Command::AdjustVolume { delta }).await
    }

    /// Mute sets the volume to zero; unmute restores the last non-zero volume
    pub async fn mute(&self, muted: bool) -> Result<Ack> {
        let volume = if muted {
            0
        } else {
            self.snapshots
                .recall()
                .last_volume
                .unwrap_or(DEFAULT_UNMUTE_VOLUME)
        };
        self.send(Command::SetVolume { volume }).await
    }

    pub async fn toggle_playlist_loop(&self) -> Result<Ack> {
        self.send(Command::TogglePlaylistLoop).await
    }

    /// Toggle the loop flag only if it differs from `looping`
    pub async fn set_playlist_loop(&self, looping: bool) -> Result<Ack> {
        let current = self.current_flag(|s| s.playlist_looping)?;
        if current == looping {
            return Ok(Ack::ok());
        }
        self.toggle_playlist_loop().await
    }

    pub async fn toggle_output_to_lights(&self) -> Result<Ack> {
        self.send(Command::ToggleOutputToLights).await
    }

    /// Toggle output to lights only if it differs from `on`
    pub async fn set_output_to_lights(&self, on: bool) -> Result<Ack> {
        let current = self.current_flag(|s| s.output_to_lights)?;
        if current == on {
            return Ok(Ack::ok());
        }
        self.toggle_output_to_lights().await
    }

    pub async fn start_test_mode(&self, request: TestModeRequest) -> Result<Ack> {
        self.send(Command::StartTestMode(request)).await
    }

    pub async fn stop_test_mode(&self) -> Result<Ack> {
        self.send(Command::StopTestMode).await
    }

    pub async fn set_brightness(&self, percent_value: i64) -> Result<Ack> {
        let percent = percent(percent_value, "brightness")?;
        self.send(Command::SetBrightness { percent }).await
    }

    pub async fn set_background_playlist(&self, playlist: &str) -> Result<Ack> {
        self.send(Command::SetBackgroundPlaylist {
            playlist: playlist.to_string(),
        })
        .await
    }

    pub async fn clear_background_playlist(&self) -> Result<Ack> {
        self.send(Command::ClearBackgroundPlaylist).await
    }

    pub async fn close_scheduler(&self) -> Result<Ack> {
        self.send(Command::CloseScheduler).await
    }

    /// Resume when paused, otherwise start a playlist
    ///
    /// The playlist is the selected one, else the last one seen playing,
    /// else the first one on the device.
    pub async fn media_play(&self) -> Result<Ack> {
        let current = self.snapshots.current();
        if current.as_ref().map(|s| s.status) == Some(PlaybackStatus::Paused) {
            return self.pause_toggle().await;
        }

        let chosen = match self.selected_playlist() {
            Some(name) => Some(name),
            None => self.snapshots.recall().last_playlist,
        };
        let playlist = match chosen {
            Some(name) => name,
            None => self
                .metadata
                .playlists()
                .await?
                .into_iter()
                .next()
                .map(|p| p.name)
                .ok_or_else(|| {
                    SdkError::InvalidParameter("no playlists are loaded on the device".to_string())
                })?,
        };
        self.play_playlist(&playlist, false).await
    }

    /// Remember `playlist` for `media_play` and `select_step`; sends nothing
    pub fn select_playlist(&self, playlist: &str) -> Result<()> {
        if playlist.trim().is_empty() {
            return Err(SdkError::InvalidParameter(
                "playlist name must not be empty".to_string(),
            ));
        }
        *self.selected_playlist.lock() = Some(playlist.to_string());
        Ok(())
    }

    pub fn selected_playlist(&self) -> Option<String> {
        self.selected_playlist.lock().clone()
    }

    /// Play `step` in the selected playlist, or the active one
    pub async fn select_step(&self, step: &str) -> Result<Ack> {
        let playlist = self
            .selected_playlist()
            .or_else(|| {
                self.snapshots
                    .current()
                    .and_then(|s| s.playlist_name().map(str::to_string))
            })
            .ok_or_else(|| {
                SdkError::InvalidParameter("no playlist is selected or playing".to_string())
            })?;
        self.play_step(&playlist, step, false).await
    }

    fn current_flag(&self, flag: impl Fn(&xschedule_client::Snapshot) -> bool) -> Result<bool> {
        self.snapshots
            .current()
            .map(|s| flag(&s))
            .ok_or(SdkError::NotConnected)
    }
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("device", self.device.device_id())
            .field("selected_playlist", &*self.selected_playlist.lock())
            .finish()
    }
}

fn percent(value: i64, what: &str) -> Result<u8> {
    u8::try_from(value)
        .ok()
        .filter(|v| *v <= 100)
        .ok_or_else(|| SdkError::InvalidParameter(format!("{} {} is outside 0..=100", what, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use xschedule_client::{DeviceError, MockDevice, PlaylistEntry, Snapshot, TestPattern};
    use xschedule_state::MetadataConfig;

    fn dispatcher(mock: &Arc<MockDevice>) -> (CommandDispatcher, Arc<SnapshotCache>) {
        let device: Arc<dyn DeviceApi> = mock.clone();
        let snapshots = Arc::new(SnapshotCache::new());
        let metadata = Arc::new(MetadataCache::new(
            Arc::clone(&device),
            MetadataConfig::default(),
        ));
        (
            CommandDispatcher::new(device, Arc::clone(&snapshots), metadata, None),
            snapshots,
        )
    }

    #[tokio::test]
    async fn test_volume_out_of_range_never_reaches_device() {
        let mock = Arc::new(MockDevice::new());
        let (dispatcher, _) = dispatcher(&mock);

        for bad in [150, 101, -1] {
            let err = dispatcher.set_volume(bad).await.unwrap_err();
            assert!(matches!(err, SdkError::InvalidParameter(_)), "{}", bad);
        }
        assert!(dispatcher.seek_ms(-5).await.is_err());
        assert!(dispatcher.adjust_volume(101).await.is_err());
        assert!(dispatcher.set_brightness(255).await.is_err());
        assert!(mock.commands().is_empty());
    }

    #[tokio::test]
    async fn test_each_operation_sends_one_command() {
        let mock = Arc::new(MockDevice::new());
        let (dispatcher, _) = dispatcher(&mock);

        dispatcher.set_volume(100).await.unwrap();
        dispatcher.seek_ms(1500).await.unwrap();
        dispatcher.next_step().await.unwrap();
        dispatcher
            .start_test_mode(TestModeRequest::new(TestPattern::Abc))
            .await
            .unwrap();

        assert_eq!(
            mock.commands(),
            vec![
                Command::SetVolume { volume: 100 },
                Command::SeekMs { position_ms: 1500 },
                Command::NextStep,
                Command::StartTestMode(TestModeRequest::new(TestPattern::Abc)),
            ]
        );
    }

    #[tokio::test]
    async fn test_rejected_ack_is_an_error() {
        let mock = Arc::new(MockDevice::new());
        mock.push_ack(Ok(Ack::failed("Unknown playlist")));
        let (dispatcher, _) = dispatcher(&mock);

        let err = dispatcher.play_playlist("Nope", false).await.unwrap_err();
        assert_eq!(
            err,
            SdkError::CommandRejected {
                command: "Play specified playlist".to_string(),
                message: "Unknown playlist".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_transport_error_is_not_retried() {
        let mock = Arc::new(MockDevice::new());
        mock.push_ack(Err(DeviceError::Timeout));
        let (dispatcher, _) = dispatcher(&mock);

        let err = dispatcher.adjust_volume(10).await.unwrap_err();
        assert_eq!(err, SdkError::Device(DeviceError::Timeout));
        assert_eq!(mock.commands().len(), 1);
    }

    #[tokio::test]
    async fn test_unmute_restores_last_volume() {
        let mock = Arc::new(MockDevice::new());
        let (dispatcher, snapshots) = dispatcher(&mock);

        dispatcher.mute(false).await.unwrap();
        snapshots.commit(Snapshot::idle().with_volume(70));
        snapshots.commit(Snapshot::idle().with_volume(0));
        dispatcher.mute(true).await.unwrap();
        dispatcher.mute(false).await.unwrap();

        assert_eq!(
            mock.commands(),
            vec![
                Command::SetVolume { volume: DEFAULT_UNMUTE_VOLUME },
                Command::SetVolume { volume: 0 },
                Command::SetVolume { volume: 70 },
            ]
        );
    }

    #[tokio::test]
    async fn test_set_flags_only_toggle_on_change() {
        let mock = Arc::new(MockDevice::new());
        let (dispatcher, snapshots) = dispatcher(&mock);

        assert_eq!(
            dispatcher.set_output_to_lights(true).await.unwrap_err(),
            SdkError::NotConnected
        );

        snapshots.commit(Snapshot::idle().with_output_to_lights(true));
        dispatcher.set_output_to_lights(true).await.unwrap();
        dispatcher.set_playlist_loop(false).await.unwrap();
        assert!(mock.commands().is_empty());

        dispatcher.set_output_to_lights(false).await.unwrap();
        dispatcher.set_playlist_loop(true).await.unwrap();
        assert_eq!(
            mock.commands(),
            vec![Command::ToggleOutputToLights, Command::TogglePlaylistLoop]
        );
    }

    #[tokio::test]
    async fn test_media_play_choice() {
        let mock = Arc::new(MockDevice::new());
        mock.set_playlists(Ok(vec![
            PlaylistEntry::new(None, "Overture"),
            PlaylistEntry::new(None, "Finale"),
        ]));
        let (dispatcher, snapshots) = dispatcher(&mock);

        // Nothing seen: first playlist on the device
        dispatcher.media_play().await.unwrap();

        // Paused: resume
        snapshots.commit(
            Snapshot::playing("Finale", "Step 1").with_status(PlaybackStatus::Paused),
        );
        dispatcher.media_play().await.unwrap();

        // Stopped after playing: last-seen playlist
        snapshots.commit(Snapshot::idle());
        dispatcher.media_play().await.unwrap();

        // Explicit selection wins
        dispatcher.select_playlist("Overture").unwrap();
        dispatcher.media_play().await.unwrap();

        let play = |name: &str| Command::PlayPlaylist {
            playlist: name.to_string(),
            looped: false,
        };
        assert_eq!(
            mock.commands(),
            vec![
                play("Overture"),
                Command::PauseToggle,
                play("Finale"),
                play("Overture"),
            ]
        );
    }

    #[tokio::test]
    async fn test_select_step_uses_selection_or_active_playlist() {
        let mock = Arc::new(MockDevice::new());
        let (dispatcher, snapshots) = dispatcher(&mock);

        assert!(matches!(
            dispatcher.select_step("Step 2").await,
            Err(SdkError::InvalidParameter(_))
        ));

        snapshots.commit(Snapshot::playing("Holiday Show", "Step 1"));
        dispatcher.select_step("Step 2").await.unwrap();
        dispatcher.select_playlist("Finale").unwrap();
        dispatcher.select_step("Bows").await.unwrap();

        assert_eq!(
            mock.commands(),
            vec![
                Command::PlayStep {
                    playlist: "Holiday Show".into(),
                    step: "Step 2".into(),
                    looped: false
                },
                Command::PlayStep {
                    playlist: "Finale".into(),
                    step: "Bows".into(),
                    looped: false
                },
            ]
        );
    }
}
