//! XScheduleSystem - main entry point for the SDK
//!
//! Wires one device into the polling loop, the caches, the dispatcher and the
//! browse tree, and exposes the read accessors a platform entity needs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::info;
use xschedule_client::{
    Ack, DeviceApi, DeviceId, NextScheduled, PlaybackStatus, PlaylistEntry, Snapshot, StepEntry,
    TestMode, XScheduleClient,
};
use xschedule_state::{EventBatch, MetadataCache, SnapshotCache};
use xschedule_stream::{PollStatus, Poller, PollingTask};

use crate::browse::{parse_step_content_id, BrowseKind, BrowseNode, BrowseTree};
use crate::config::{BridgeConfig, BridgeOptions};
use crate::dispatcher::CommandDispatcher;
use crate::error::{Result, SdkError};

/// Reported as the software version when the device does not send one
pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identity block for the device registry of a hosting platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub sw_version: String,
}

/// A connected xSchedule device
///
/// Reads come from the last committed snapshot and never touch the network,
/// except the step helpers which go through the metadata cache.
///
/// # Example
///
/// ```rust,no_run
/// use xschedule_client::DeviceConfig;
/// use xschedule_sdk::{BridgeConfig, XScheduleSystem};
///
/// # async fn run() -> Result<(), xschedule_sdk::SdkError> {
/// let config = BridgeConfig::new(DeviceConfig::new("192.168.1.50").with_password("secret"));
/// let system = XScheduleSystem::connect(config).await?;
///
/// println!("{:?} {:?}", system.playback_status(), system.media_title());
/// system.commands().play_playlist("Holiday Show", false).await?;
///
/// let mut events = system.events();
/// while let Ok(batch) = events.recv().await {
///     for event in batch.events {
///         println!("{}", event.event_type());
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct XScheduleSystem {
    device: Arc<dyn DeviceApi>,
    options: BridgeOptions,
    snapshots: Arc<SnapshotCache>,
    metadata: Arc<MetadataCache>,
    dispatcher: CommandDispatcher,
    browse: BrowseTree,
    polling: PollingTask,
}

impl XScheduleSystem {
    /// Connect to the device described by `config`
    ///
    /// This will:
    /// 1. Validate the configuration
    /// 2. Build the HTTP client
    /// 3. Run the first poll, failing if the device cannot be read
    /// 4. Start the background polling task
    pub async fn connect(config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        let client = XScheduleClient::new(config.device)?;
        Self::with_device(Arc::new(client), config.options).await
    }

    /// Build a system around any [`DeviceApi`]
    pub async fn with_device(device: Arc<dyn DeviceApi>, options: BridgeOptions) -> Result<Self> {
        options.validate()?;
        let device_id = device.device_id().clone();

        let snapshots = Arc::new(SnapshotCache::new());
        let metadata = Arc::new(MetadataCache::new(
            Arc::clone(&device),
            options.metadata_config(),
        ));

        let mut poller = Poller::new(
            Arc::clone(&device),
            Arc::clone(&snapshots),
            Arc::clone(&metadata),
            options.poll_config(),
        );
        poller.poll_once().await?;

        let initial_delay = poller.next_delay();
        let polling = PollingTask::spawn(poller, device_id.clone(), initial_delay);
        let dispatcher = CommandDispatcher::new(
            Arc::clone(&device),
            Arc::clone(&snapshots),
            Arc::clone(&metadata),
            Some(polling.refresh_handle()),
        );
        let browse = BrowseTree::new(Arc::clone(&metadata), options.enable_browse_media);

        info!(device = %device_id, "Connected to xSchedule");
        Ok(Self {
            device,
            options,
            snapshots,
            metadata,
            dispatcher,
            browse,
            polling,
        })
    }

    pub fn device_id(&self) -> &DeviceId {
        self.device.device_id()
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    // ========================================================================
    // Read accessors
    // ========================================================================

    /// The last committed snapshot
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshots.current()
    }

    /// Receiver that always holds the latest snapshot
    pub fn snapshot_receiver(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.snapshots.subscribe()
    }

    fn read<T>(&self, f: impl FnOnce(&Snapshot) -> T) -> Option<T> {
        self.snapshots.current().map(|s| f(&s))
    }

    pub fn playback_status(&self) -> PlaybackStatus {
        self.read(|s| s.status).unwrap_or_default()
    }

    /// `"{playlist}:  {step}"`, or whichever of the two is known
    pub fn media_title(&self) -> Option<String> {
        self.read(|s| match (s.playlist_name(), s.step_name()) {
            (Some(playlist), Some(step)) => Some(format!("{}:  {}", playlist, step)),
            (Some(name), None) | (None, Some(name)) => Some(name.to_string()),
            (None, None) => None,
        })
        .flatten()
    }

    pub fn media_position_secs(&self) -> Option<u64> {
        self.read(|s| s.position_ms / 1000)
    }

    pub fn media_duration_secs(&self) -> Option<u64> {
        self.read(|s| s.length_ms / 1000)
    }

    /// Fetch time of the snapshot while playing, so progress can be
    /// extrapolated between polls
    pub fn position_updated_at(&self) -> Option<DateTime<Utc>> {
        self.read(|s| (s.status == PlaybackStatus::Playing).then_some(s.fetched_at))
            .flatten()
    }

    /// Volume as 0.0..=1.0
    pub fn volume_level(&self) -> Option<f32> {
        self.read(|s| s.volume.map(|v| f32::from(v.min(100)) / 100.0))
            .flatten()
    }

    pub fn is_muted(&self) -> Option<bool> {
        self.read(|s| s.volume.map(|v| v == 0)).flatten()
    }

    pub fn playlist_looping(&self) -> Option<bool> {
        self.read(|s| s.playlist_looping)
    }

    pub fn output_to_lights(&self) -> Option<bool> {
        self.read(|s| s.output_to_lights)
    }

    pub fn test_mode(&self) -> Option<TestMode> {
        self.read(|s| s.test_mode.clone())
    }

    pub fn brightness(&self) -> Option<u8> {
        self.read(|s| s.brightness).flatten()
    }

    /// Name of the active playlist
    pub fn source(&self) -> Option<String> {
        self.read(|s| s.playlist_name().map(str::to_string)).flatten()
    }

    /// Playlist names from the metadata cache
    pub async fn source_list(&self) -> Result<Vec<String>> {
        Ok(self
            .metadata
            .playlists()
            .await?
            .into_iter()
            .map(|p| p.name)
            .collect())
    }

    pub fn current_step(&self) -> Option<String> {
        self.read(|s| s.step_name().map(str::to_string)).flatten()
    }

    /// Zero-based position of the active step within the active playlist
    ///
    /// Matched by id when the device reports one; names may repeat.
    pub async fn current_step_index(&self) -> Result<Option<usize>> {
        let (playlist, step) =
            match self.read(|s| s.playlist_name().map(str::to_string).zip(s.step.clone())) {
                Some(Some(pair)) => pair,
                _ => return Ok(None),
            };
        let steps = self.metadata.steps(&playlist).await?;
        let by_id = step
            .id
            .as_deref()
            .and_then(|id| steps.iter().find(|s| s.id.as_deref() == Some(id)));
        Ok(by_id
            .or_else(|| steps.iter().find(|s| s.name == step.name))
            .map(|s| s.index))
    }

    /// Number of steps in the selected playlist, else the active one
    pub async fn playlist_step_count(&self) -> Result<usize> {
        let playlist = self
            .dispatcher
            .selected_playlist()
            .or_else(|| self.source());
        match playlist {
            Some(playlist) => Ok(self.metadata.steps(&playlist).await?.len()),
            None => Ok(0),
        }
    }

    pub fn next_scheduled(&self) -> Option<NextScheduled> {
        self.read(|s| s.next_scheduled.clone()).flatten()
    }

    pub fn device_info(&self) -> DeviceInfo {
        let sw_version = self
            .read(|s| s.version.as_ref().map(|v| v.to_string()))
            .flatten()
            .unwrap_or_else(|| CRATE_VERSION.to_string());
        DeviceInfo {
            id: self.device.device_id().clone(),
            name: "xLights Scheduler".to_string(),
            manufacturer: "xLights".to_string(),
            model: "xSchedule".to_string(),
            sw_version,
        }
    }

    pub fn is_available(&self) -> bool {
        self.polling.status().available
    }

    pub fn poll_status(&self) -> PollStatus {
        self.polling.status()
    }

    pub fn poll_status_receiver(&self) -> watch::Receiver<PollStatus> {
        self.polling.status_receiver()
    }

    // ========================================================================
    // Metadata and browse
    // ========================================================================

    pub async fn playlists(&self) -> Result<Vec<PlaylistEntry>> {
        Ok(self.metadata.playlists().await?)
    }

    pub async fn steps(&self, playlist: &str) -> Result<Vec<StepEntry>> {
        Ok(self.metadata.steps(playlist).await?)
    }

    pub fn browse_tree(&self) -> &BrowseTree {
        &self.browse
    }

    /// Browse by media content type string and content id
    ///
    /// An empty content id always yields the root.
    pub async fn browse(&self, content_type: Option<&str>, content_id: &str) -> Result<BrowseNode> {
        let kind = match content_type {
            _ if content_id.is_empty() => BrowseKind::Root,
            Some(content_type) => content_type.parse::<BrowseKind>()?,
            None => BrowseKind::Root,
        };
        self.browse.browse(kind, content_id).await
    }

    /// Play a browse node: a playlist or a `playlist|step` id
    pub async fn play_media(&self, content_type: &str, content_id: &str) -> Result<Ack> {
        match content_type.parse::<BrowseKind>()? {
            BrowseKind::Playlist => self.dispatcher.play_playlist(content_id, false).await,
            BrowseKind::Step => {
                let (playlist, step) = parse_step_content_id(content_id)?;
                self.dispatcher.play_step(playlist, step, false).await
            }
            other => Err(SdkError::UnknownMediaType(other.to_string())),
        }
    }

    /// Start the named playlist
    pub async fn select_source(&self, playlist: &str) -> Result<Ack> {
        self.dispatcher.play_playlist(playlist, false).await
    }

    // ========================================================================
    // Commands and events
    // ========================================================================

    pub fn commands(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Subscribe to per-poll event batches
    pub fn events(&self) -> broadcast::Receiver<EventBatch> {
        self.polling.subscribe()
    }

    /// Poll now instead of waiting for the next tick
    pub fn refresh(&self) {
        self.polling.request_refresh();
    }

    /// Stop polling; no poll starts after this returns
    pub async fn shutdown(self) -> Result<()> {
        info!(device = %self.device.device_id(), "Shutting down");
        self.polling.shutdown().await?;
        Ok(())
    }
}

impl std::fmt::Debug for XScheduleSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XScheduleSystem")
            .field("device", self.device.device_id())
            .field("options", &self.options)
            .field("poll_status", &self.polling.status())
            .finish()
    }
}
