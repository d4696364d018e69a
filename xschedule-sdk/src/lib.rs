//! # xSchedule SDK - bridge an xLights scheduler into a home-automation platform
//!
//! ```rust,no_run
//! use xschedule_client::DeviceConfig;
//! use xschedule_sdk::{BridgeConfig, XScheduleSystem};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), xschedule_sdk::SdkError> {
//!     let system = XScheduleSystem::connect(BridgeConfig::new(DeviceConfig::new("show-pc.local"))).await?;
//!
//!     println!("{} {:?}", system.playback_status(), system.media_title());
//!     system.commands().set_volume(60).await?;
//!
//!     system.shutdown().await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! xschedule-sdk (XScheduleSystem, CommandDispatcher, BrowseTree)
//!     ↓
//! xschedule-stream (polling task, cadence and backoff)
//!     ↓
//! xschedule-state (snapshot cache, metadata cache, event deriver)
//!     ↓
//! xschedule-client (HTTP/JSON device client)
//! ```
//!
//! State flows one way: polls commit snapshots, the deriver turns consecutive
//! snapshots into events. Commands never write state; they ask for a poll.

mod browse;
mod config;
mod dispatcher;
mod error;
mod system;

pub use browse::{
    parse_step_content_id, step_content_id, BrowseKind, BrowseNode, BrowseTree, STEP_ID_SEPARATOR,
};
pub use config::{BridgeConfig, BridgeOptions};
pub use dispatcher::{CommandDispatcher, DEFAULT_UNMUTE_VOLUME};
pub use error::{Result, SdkError};
pub use system::{DeviceInfo, XScheduleSystem, CRATE_VERSION};

// Re-export the types consumers handle directly
pub use xschedule_client::{
    Ack, DeviceConfig, DeviceId, NextScheduled, PlaybackStatus, PlaylistEntry, StepEntry,
    TestModeRequest, TestPattern,
};
pub use xschedule_state::{DomainEvent, EventBatch};
pub use xschedule_stream::{PollState, PollStatus};
