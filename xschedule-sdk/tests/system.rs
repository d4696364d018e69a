//! End-to-end behavior of XScheduleSystem against a scripted device

use std::sync::Arc;
use std::time::Duration;

use xschedule_client::{
    Command, DeviceApi, DeviceError, MockDevice, PlaybackStatus, PlaylistEntry, Snapshot,
    StepEntry, StepRef,
};
use xschedule_sdk::{BridgeOptions, DomainEvent, SdkError, XScheduleSystem};

async fn connect(mock: &Arc<MockDevice>, options: BridgeOptions) -> XScheduleSystem {
    let device: Arc<dyn DeviceApi> = mock.clone();
    XScheduleSystem::with_device(device, options).await.unwrap()
}

fn show_snapshot() -> Snapshot {
    let mut snapshot = Snapshot::playing("Holiday Show", "Step 1")
        .with_volume(40)
        .with_version("2024.18");
    snapshot.position_ms = 61_500;
    snapshot.length_ms = 120_000;
    snapshot
}

// ============================================================================
// Connection
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_connect_fails_when_first_poll_fails() {
    let mock = Arc::new(MockDevice::new());
    mock.push_status(Err(DeviceError::Unreachable("connection refused".into())));

    let device: Arc<dyn DeviceApi> = mock.clone();
    let err = XScheduleSystem::with_device(device, BridgeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::Device(DeviceError::Unreachable(_))));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_options_are_rejected_before_polling() {
    let mock = Arc::new(MockDevice::new());
    let device: Arc<dyn DeviceApi> = mock.clone();

    let options = BridgeOptions::default().with_refresh(5, 10);
    let err = XScheduleSystem::with_device(device, options).await.unwrap_err();
    assert!(matches!(err, SdkError::Config(_)));
    assert_eq!(mock.status_calls(), 0);
}

// ============================================================================
// Read accessors
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_accessors_reflect_current_snapshot() {
    let mock = Arc::new(MockDevice::new());
    mock.push_status(Ok(show_snapshot()));
    let system = connect(&mock, BridgeOptions::default()).await;

    assert_eq!(system.playback_status(), PlaybackStatus::Playing);
    assert_eq!(system.media_title().as_deref(), Some("Holiday Show:  Step 1"));
    assert_eq!(system.media_position_secs(), Some(61));
    assert_eq!(system.media_duration_secs(), Some(120));
    assert_eq!(system.volume_level(), Some(0.4));
    assert_eq!(system.is_muted(), Some(false));
    assert!(system.position_updated_at().is_some());
    assert_eq!(system.source().as_deref(), Some("Holiday Show"));
    assert_eq!(system.current_step().as_deref(), Some("Step 1"));
    assert!(system.is_available());

    let info = system.device_info();
    assert_eq!(info.manufacturer, "xLights");
    assert_eq!(info.model, "xSchedule");
    assert_eq!(info.sw_version, "2024.18");
}

#[tokio::test(start_paused = true)]
async fn test_idle_device_has_no_title_or_progress_timestamp() {
    let mock = Arc::new(MockDevice::new());
    mock.push_status(Ok(Snapshot::idle().with_volume(0)));
    let system = connect(&mock, BridgeOptions::default()).await;

    assert_eq!(system.playback_status(), PlaybackStatus::Idle);
    assert_eq!(system.media_title(), None);
    assert_eq!(system.position_updated_at(), None);
    assert_eq!(system.is_muted(), Some(true));
    assert_eq!(system.device_info().sw_version, xschedule_sdk::CRATE_VERSION);
}

#[tokio::test(start_paused = true)]
async fn test_step_index_and_count_use_metadata() {
    let mock = Arc::new(MockDevice::new());
    mock.push_status(Ok(Snapshot::playing("Holiday Show", "Carol")))
        .set_steps("Holiday Show", &["Intro", "Carol", "Finale"])
        .set_steps("Encore", &["Bows"]);
    let system = connect(&mock, BridgeOptions::default()).await;

    assert_eq!(system.current_step_index().await.unwrap(), Some(1));
    assert_eq!(system.playlist_step_count().await.unwrap(), 3);

    system.commands().select_playlist("Encore").unwrap();
    assert_eq!(system.playlist_step_count().await.unwrap(), 1);
    assert!(mock.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_step_index_prefers_id_over_repeated_name() {
    let entry = |id: &str, index: usize| StepEntry {
        id: Some(id.to_string()),
        name: "Carol".to_string(),
        index,
        playlist: "Holiday Show".to_string(),
        length_ms: None,
    };
    let snapshot = Snapshot::playing("Holiday Show", "Carol")
        .with_step(Some(StepRef::new(Some("72"), "Carol")));

    let mock = Arc::new(MockDevice::new());
    mock.push_status(Ok(snapshot))
        .set_step_entries("Holiday Show", vec![entry("70", 0), entry("71", 1), entry("72", 2)]);
    let system = connect(&mock, BridgeOptions::default()).await;

    assert_eq!(system.current_step_index().await.unwrap(), Some(2));
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::test(start_paused = true)]
async fn scenario_volume_out_of_range_is_rejected_locally() {
    let mock = Arc::new(MockDevice::new());
    mock.push_status(Ok(Snapshot::idle()));
    let system = connect(&mock, BridgeOptions::default()).await;

    let err = system.commands().set_volume(150).await.unwrap_err();
    assert!(matches!(err, SdkError::InvalidParameter(_)));
    assert!(mock.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_acknowledged_command_triggers_immediate_poll() {
    let mock = Arc::new(MockDevice::new());
    mock.push_status(Ok(Snapshot::idle()))
        .push_status(Ok(Snapshot::playing("Holiday Show", "Step 1")));
    let system = connect(&mock, BridgeOptions::default().with_poll_intervals(30, 30)).await;
    let mut events = system.events();

    system.commands().play_playlist("Holiday Show", false).await.unwrap();

    let batch = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("poll should follow the command without waiting for the interval")
        .unwrap();
    assert_eq!(batch.poll, 2);
    assert!(matches!(batch.events[0], DomainEvent::PlaylistStarted { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_play_media_routes_by_kind() {
    let mock = Arc::new(MockDevice::new());
    mock.push_status(Ok(Snapshot::idle()));
    let system = connect(&mock, BridgeOptions::default()).await;

    system.play_media("xlights_playlist", "Holiday Show").await.unwrap();
    system.play_media("xlights_step", "Holiday Show|Carol").await.unwrap();

    assert_eq!(
        system.play_media("music", "x").await,
        Err(SdkError::UnknownMediaType("music".to_string()))
    );
    assert!(matches!(
        system.play_media("xlights_playlists", "playlists").await,
        Err(SdkError::UnknownMediaType(_))
    ));
    assert!(matches!(
        system.play_media("xlights_step", "no-separator").await,
        Err(SdkError::InvalidParameter(_))
    ));

    assert_eq!(
        mock.commands(),
        vec![
            Command::PlayPlaylist {
                playlist: "Holiday Show".into(),
                looped: false
            },
            Command::PlayStep {
                playlist: "Holiday Show".into(),
                step: "Carol".into(),
                looped: false
            },
        ]
    );
}

// ============================================================================
// Browse
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_browse_from_root() {
    let mock = Arc::new(MockDevice::new());
    mock.push_status(Ok(Snapshot::idle()))
        .set_playlists(Ok(vec![PlaylistEntry::new(None, "Holiday Show")]))
        .set_steps("Holiday Show", &["Intro"]);
    let system = connect(&mock, BridgeOptions::default()).await;

    let root = system.browse(None, "").await.unwrap();
    assert_eq!(root.children[0].content_id, "playlists");

    let playlists = system.browse(Some("xlights_playlists"), "playlists").await.unwrap();
    assert_eq!(playlists.children[0].title, "Holiday Show");

    let show = system.browse(Some("xlights_playlist"), "Holiday Show").await.unwrap();
    assert_eq!(show.children[0].content_id, "Holiday Show|Intro");
}

#[tokio::test(start_paused = true)]
async fn test_browse_disabled_by_option() {
    let mock = Arc::new(MockDevice::new());
    mock.push_status(Ok(Snapshot::idle()));
    let system = connect(&mock, BridgeOptions::default().with_browse_media(false)).await;

    assert_eq!(system.browse(None, "").await, Err(SdkError::BrowseDisabled));
}

// ============================================================================
// Events and teardown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn scenario_idle_to_playing_reaches_subscribers() {
    let mock = Arc::new(MockDevice::new());
    mock.push_status(Ok(Snapshot::idle()))
        .push_status(Ok(Snapshot::playing("Holiday Show", "Step 1")));
    let system = connect(&mock, BridgeOptions::default()).await;
    let mut events = system.events();

    let batch = events.recv().await.unwrap();
    let kinds: Vec<_> = batch.events.iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, vec!["playlist_started", "step_changed"]);
    assert_eq!(batch.device, *system.device_id());
}

#[tokio::test(start_paused = true)]
async fn test_no_polls_after_shutdown() {
    let mock = Arc::new(MockDevice::new());
    mock.push_status(Ok(Snapshot::idle()));
    let system = connect(&mock, BridgeOptions::default()).await;

    system.shutdown().await.unwrap();
    let calls = mock.status_calls();

    tokio::time::advance(Duration::from_secs(30)).await;
    tokio::task::yield_now().await;
    assert_eq!(mock.status_calls(), calls);
}
