//! Playlist and step lists with TTL and version-gated validity
//!
//! An entry is served from cache only while it is younger than its TTL *and*
//! was fetched under the device version currently observed. A version change
//! therefore forces a refetch on the next access regardless of remaining TTL.
//! Refetches happen lazily inside the accessors, never in the poll cycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};
use xschedule_client::{DeviceApi, DeviceError, PlaylistEntry, StepEntry, Version};

/// Default playlist list TTL
pub const DEFAULT_PLAYLIST_TTL: Duration = Duration::from_secs(15);

/// Default step list TTL; shorter than the playlist TTL
pub const DEFAULT_STEPS_TTL: Duration = Duration::from_secs(5);

/// Cached metadata with the time and device version it was fetched under
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: Instant,
    pub version: Option<Version>,
    epoch: u64,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, fetched_at: Instant, version: Option<Version>) -> Self {
        Self {
            value,
            fetched_at,
            version,
            epoch: 0,
        }
    }

    /// Valid iff `now - fetched_at < ttl` and the version still matches
    pub fn is_valid(&self, now: Instant, ttl: Duration, current_version: Option<&Version>) -> bool {
        now.saturating_duration_since(self.fetched_at) < ttl
            && self.version.as_ref() == current_version
    }
}

/// TTLs for the two cached lists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataConfig {
    pub playlist_ttl: Duration,
    pub steps_ttl: Duration,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            playlist_ttl: DEFAULT_PLAYLIST_TTL,
            steps_ttl: DEFAULT_STEPS_TTL,
        }
    }
}

#[derive(Debug, Default)]
struct Entries {
    version: Option<Version>,
    /// Bumped by `invalidate_playlists`; entries from an older epoch are stale
    playlist_epoch: u64,
    playlists: Option<CacheEntry<Vec<PlaylistEntry>>>,
    steps: HashMap<String, CacheEntry<Vec<StepEntry>>>,
}

impl Entries {
    fn valid_playlists(&self, now: Instant, ttl: Duration) -> Option<&Vec<PlaylistEntry>> {
        self.playlists
            .as_ref()
            .filter(|e| e.epoch == self.playlist_epoch && e.is_valid(now, ttl, self.version.as_ref()))
            .map(|e| &e.value)
    }

    fn valid_steps(&self, playlist: &str, now: Instant, ttl: Duration) -> Option<&Vec<StepEntry>> {
        self.steps
            .get(playlist)
            .filter(|e| e.is_valid(now, ttl, self.version.as_ref()))
            .map(|e| &e.value)
    }

    /// Fill in step counts from whatever step lists are cached
    fn with_step_counts(&self, playlists: &[PlaylistEntry]) -> Vec<PlaylistEntry> {
        playlists
            .iter()
            .map(|pl| {
                let mut pl = pl.clone();
                pl.step_count = self
                    .steps
                    .get(&pl.name)
                    .or_else(|| pl.id.as_ref().and_then(|id| self.steps.get(id)))
                    .map(|e| e.value.len());
                pl
            })
            .collect()
    }
}

/// Lazily refreshed playlist and step lists for one device
pub struct MetadataCache {
    device: Arc<dyn DeviceApi>,
    config: MetadataConfig,
    entries: RwLock<Entries>,
    // One refetch at a time; concurrent callers wait and reuse its result.
    refresh: Mutex<()>,
}

impl MetadataCache {
    pub fn new(device: Arc<dyn DeviceApi>, config: MetadataConfig) -> Self {
        Self {
            device,
            config,
            entries: RwLock::new(Entries::default()),
            refresh: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &MetadataConfig {
        &self.config
    }

    /// Record the version reported by the latest snapshot
    pub fn observe_version(&self, version: Option<&Version>) {
        let mut entries = self.entries.write();
        if entries.version.as_ref() != version {
            debug!(
                from = ?entries.version.as_ref().map(Version::as_str),
                to = ?version.map(Version::as_str),
                "Metadata version changed"
            );
            entries.version = version.cloned();
        }
    }

    /// Mark the playlist list stale so the next access refetches
    ///
    /// Does not fetch. The last known value stays available as a fallback.
    pub fn invalidate_playlists(&self) {
        let mut entries = self.entries.write();
        entries.playlist_epoch += 1;
        debug!(epoch = entries.playlist_epoch, "Playlist cache invalidated");
    }

    /// The playlist list, refetched when the cached one is no longer valid
    ///
    /// A failed refetch falls back to the last known list; with nothing
    /// cached the error is returned.
    pub async fn playlists(&self) -> Result<Vec<PlaylistEntry>, DeviceError> {
        let ttl = self.config.playlist_ttl;
        {
            let entries = self.entries.read();
            if let Some(list) = entries.valid_playlists(Instant::now(), ttl) {
                return Ok(entries.with_step_counts(list));
            }
        }

        let _guard = self.refresh.lock().await;
        let (version, epoch) = {
            let entries = self.entries.read();
            if let Some(list) = entries.valid_playlists(Instant::now(), ttl) {
                return Ok(entries.with_step_counts(list));
            }
            (entries.version.clone(), entries.playlist_epoch)
        };

        debug!("Fetching playlists");
        match self.device.fetch_playlists().await {
            Ok(list) => {
                let mut entries = self.entries.write();
                let out = entries.with_step_counts(&list);
                let mut entry = CacheEntry::new(list, Instant::now(), version);
                entry.epoch = epoch;
                entries.playlists = Some(entry);
                Ok(out)
            }
            Err(e) => {
                let entries = self.entries.read();
                match entries.playlists.as_ref() {
                    Some(stale) => {
                        warn!(error = %e, "Playlist refresh failed, serving last known list");
                        Ok(entries.with_step_counts(&stale.value))
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Steps of `playlist` (name or id), same policy as [`playlists`](Self::playlists)
    pub async fn steps(&self, playlist: &str) -> Result<Vec<StepEntry>, DeviceError> {
        let ttl = self.config.steps_ttl;
        if let Some(steps) = self.entries.read().valid_steps(playlist, Instant::now(), ttl) {
            return Ok(steps.clone());
        }

        let _guard = self.refresh.lock().await;
        let version = {
            let entries = self.entries.read();
            if let Some(steps) = entries.valid_steps(playlist, Instant::now(), ttl) {
                return Ok(steps.clone());
            }
            entries.version.clone()
        };

        debug!(playlist, "Fetching steps");
        match self.device.fetch_steps(playlist).await {
            Ok(steps) => {
                // Tagged with the version seen at fetch start: if the device
                // changed meanwhile, the entry is already stale.
                self.entries.write().steps.insert(
                    playlist.to_string(),
                    CacheEntry::new(steps.clone(), Instant::now(), version),
                );
                Ok(steps)
            }
            Err(e) => match self.entries.read().steps.get(playlist) {
                Some(stale) => {
                    warn!(playlist, error = %e, "Step refresh failed, serving last known steps");
                    Ok(stale.value.clone())
                }
                None => Err(e),
            },
        }
    }

    /// Cached steps without touching the device, valid or not
    pub fn cached_steps(&self, playlist: &str) -> Option<Vec<StepEntry>> {
        self.entries.read().steps.get(playlist).map(|e| e.value.clone())
    }

    /// Cached playlists without touching the device, valid or not
    pub fn cached_playlists(&self) -> Option<Vec<PlaylistEntry>> {
        let entries = self.entries.read();
        entries
            .playlists
            .as_ref()
            .map(|e| entries.with_step_counts(&e.value))
    }
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache")
            .field("device", self.device.device_id())
            .field("config", &self.config)
            .finish()
    }
}
