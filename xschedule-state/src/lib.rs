//! State layer for xschedule-sdk
//!
//! - [`SnapshotCache`] keeps the current and previous status snapshots
//! - [`MetadataCache`] serves playlist and step lists with TTL and
//!   version-gated validity
//! - [`EventDeriver`] diffs consecutive snapshots into [`DomainEvent`]s
//!
//! Nothing here talks to the network on its own schedule: the polling task in
//! `xschedule-stream` drives commits, and metadata is fetched lazily on access.

mod deriver;
mod events;
pub mod logging;
mod metadata_cache;
mod snapshot_cache;

pub use deriver::{diff_snapshots, EventDeriver};
pub use events::{DomainEvent, EventBatch, EVENT_PREFIX};
pub use metadata_cache::{
    CacheEntry, MetadataCache, MetadataConfig, DEFAULT_PLAYLIST_TTL, DEFAULT_STEPS_TTL,
};
pub use snapshot_cache::{Recall, SnapshotCache, SnapshotPair};
