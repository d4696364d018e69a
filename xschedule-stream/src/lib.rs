//! Polling and event streaming for xschedule-sdk
//!
//! The device exposes no push channel, so state changes are observed by
//! polling and diffing consecutive snapshots. This crate owns that loop:
//!
//! - cadence follows playback status (active vs idle interval)
//! - failures back off exponentially up to a ceiling
//! - derived events are broadcast per poll tick as an [`EventBatch`]
//! - health is published as a [`PollStatus`]
//!
//! [`EventBatch`]: xschedule_state::EventBatch

pub mod config;
pub mod error;
pub mod polling;

pub use config::{PollConfig, MAX_INTERVAL};
pub use error::{PollingError, PollingResult};
pub use polling::{PollScheduler, PollState, PollStatus, Poller, PollingTask, RefreshHandle};
