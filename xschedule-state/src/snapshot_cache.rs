//! Current and previous status snapshots

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use xschedule_client::Snapshot;

/// The two most recent snapshots, always updated together
#[derive(Debug, Clone)]
pub struct SnapshotPair {
    pub previous: Arc<Snapshot>,
    pub current: Arc<Snapshot>,
}

impl SnapshotPair {
    /// True for the pair produced by the very first commit
    pub fn is_initial(&self) -> bool {
        Arc::ptr_eq(&self.previous, &self.current)
    }
}

/// Values remembered across snapshots for commands that restore state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recall {
    /// Name of the most recent playlist seen playing or paused
    pub last_playlist: Option<String>,
    /// Most recent non-zero volume, restored on unmute
    pub last_volume: Option<u8>,
}

/// Holds the `current` and `previous` snapshot slots
///
/// Readers take a clone of the whole pair under one lock, so they never see
/// `current` updated without `previous` shifted.
#[derive(Debug)]
pub struct SnapshotCache {
    pair: RwLock<Option<SnapshotPair>>,
    recall: RwLock<Recall>,
    latest: watch::Sender<Option<Arc<Snapshot>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            pair: RwLock::new(None),
            recall: RwLock::new(Recall::default()),
            latest,
        }
    }

    /// Shift `current` into `previous` and store `snapshot` as `current`
    ///
    /// On the first commit both slots hold the new snapshot, so the first
    /// diff yields no transitions.
    pub fn commit(&self, snapshot: Snapshot) -> SnapshotPair {
        {
            let mut recall = self.recall.write();
            if let Some(name) = snapshot.playlist_name() {
                recall.last_playlist = Some(name.to_string());
            }
            if let Some(volume) = snapshot.volume.filter(|v| *v > 0) {
                recall.last_volume = Some(volume);
            }
        }
        let current = Arc::new(snapshot);
        let pair = {
            let mut slot = self.pair.write();
            let previous = slot
                .as_ref()
                .map(|p| Arc::clone(&p.current))
                .unwrap_or_else(|| Arc::clone(&current));
            let pair = SnapshotPair {
                previous,
                current: Arc::clone(&current),
            };
            *slot = Some(pair.clone());
            pair
        };
        self.latest.send_replace(Some(current));
        pair
    }

    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.pair.read().as_ref().map(|p| Arc::clone(&p.current))
    }

    pub fn previous(&self) -> Option<Arc<Snapshot>> {
        self.pair.read().as_ref().map(|p| Arc::clone(&p.previous))
    }

    pub fn pair(&self) -> Option<SnapshotPair> {
        self.pair.read().clone()
    }

    pub fn recall(&self) -> Recall {
        self.recall.read().clone()
    }

    /// Receiver that always holds the latest committed snapshot
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.latest.subscribe()
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xschedule_client::PlaybackStatus;

    #[test]
    fn test_first_commit_fills_both_slots() {
        let cache = SnapshotCache::new();
        assert!(cache.current().is_none());

        let pair = cache.commit(Snapshot::playing("Holiday Show", "Step 1"));
        assert!(pair.is_initial());
        assert_eq!(pair.previous, pair.current);
    }

    #[test]
    fn test_commit_shifts_current_into_previous() {
        let cache = SnapshotCache::new();
        cache.commit(Snapshot::idle());
        let pair = cache.commit(Snapshot::playing("Holiday Show", "Step 1"));

        assert!(!pair.is_initial());
        assert_eq!(pair.previous.status, PlaybackStatus::Idle);
        assert_eq!(pair.current.status, PlaybackStatus::Playing);
        assert_eq!(cache.previous().unwrap().status, PlaybackStatus::Idle);
    }

    #[test]
    fn test_recall_survives_idle_and_mute() {
        let cache = SnapshotCache::new();
        cache.commit(Snapshot::playing("Holiday Show", "Step 1").with_volume(70));
        cache.commit(Snapshot::idle().with_volume(0));

        let recall = cache.recall();
        assert_eq!(recall.last_playlist.as_deref(), Some("Holiday Show"));
        assert_eq!(recall.last_volume, Some(70));
    }

    #[test]
    fn test_subscribers_see_latest() {
        let cache = SnapshotCache::new();
        let rx = cache.subscribe();
        assert!(rx.borrow().is_none());

        cache.commit(Snapshot::idle().with_volume(30));
        assert_eq!(rx.borrow().as_ref().unwrap().volume, Some(30));
    }

    #[test]
    fn test_readers_never_see_torn_pair() {
        let cache = Arc::new(SnapshotCache::new());
        cache.commit(Snapshot::idle().with_volume(0));

        let writer = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for v in 1..=100u8 {
                    cache.commit(Snapshot::idle().with_volume(v));
                }
            })
        };

        for _ in 0..1000 {
            let pair = cache.pair().unwrap();
            let previous = pair.previous.volume.unwrap();
            let current = pair.current.volume.unwrap();
            assert!(current == previous + 1 || (current == 0 && previous == 0));
        }
        writer.join().unwrap();
    }
}
