//! One poll cycle: fetch, commit, derive, publish

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, error, warn};
use xschedule_client::{DeviceApi, DeviceError, DeviceErrorKind};
use xschedule_state::{DomainEvent, EventBatch, EventDeriver, MetadataCache, SnapshotCache};

use crate::config::PollConfig;
use crate::polling::scheduler::{PollScheduler, PollState};

/// Health of the polling loop, published after every cycle
#[derive(Debug, Clone, PartialEq)]
pub struct PollStatus {
    pub state: PollState,
    pub consecutive_failures: u32,
    pub last_error: Option<DeviceErrorKind>,
    /// False once failures reach the configured threshold or auth is rejected
    pub available: bool,
    /// Completed polls, successful or not
    pub polls: u64,
    pub last_success: Option<DateTime<Utc>>,
}

impl Default for PollStatus {
    fn default() -> Self {
        Self {
            state: PollState::Idle,
            consecutive_failures: 0,
            last_error: None,
            // Unknown until the first poll completes
            available: false,
            polls: 0,
            last_success: None,
        }
    }
}

/// Runs poll cycles against one device
///
/// Owns the cadence state machine. Cycles are strictly sequential: the
/// caller awaits [`poll_once`](Self::poll_once) before starting another.
pub struct Poller {
    device: Arc<dyn DeviceApi>,
    snapshots: Arc<SnapshotCache>,
    metadata: Arc<MetadataCache>,
    deriver: EventDeriver,
    scheduler: PollScheduler,
    config: PollConfig,
    next_delay: Duration,
    status: watch::Sender<PollStatus>,
    events: broadcast::Sender<EventBatch>,
}

impl Poller {
    pub fn new(
        device: Arc<dyn DeviceApi>,
        snapshots: Arc<SnapshotCache>,
        metadata: Arc<MetadataCache>,
        config: PollConfig,
    ) -> Self {
        let deriver = EventDeriver::new(device.device_id().clone(), Arc::clone(&metadata));
        let (status, _) = watch::channel(PollStatus::default());
        let (events, _) = broadcast::channel(config.event_buffer_size.max(1));
        Self {
            device,
            snapshots,
            metadata,
            deriver,
            scheduler: PollScheduler::new(config.clone()),
            next_delay: config.interval_idle,
            config,
            status,
            events,
        }
    }

    /// Poll the device once
    ///
    /// On success the snapshot is committed and the derived events are
    /// broadcast and returned. On failure nothing is committed and no events
    /// are produced; the error only feeds the backoff and health status.
    pub async fn poll_once(&mut self) -> Result<Vec<DomainEvent>, DeviceError> {
        let result = self.device.fetch_status().await;
        match result {
            Ok(snapshot) => {
                let status = snapshot.status;
                let pair = self.snapshots.commit(snapshot);
                let events = self.deriver.derive(&pair);
                self.metadata.observe_version(pair.current.version.as_ref());
                self.next_delay = self.scheduler.on_success(status);

                let polls = self.status.borrow().polls + 1;
                if !self.status.borrow().available {
                    debug!(device = %self.device.device_id(), "Device available");
                }
                self.status.send_replace(PollStatus {
                    state: self.scheduler.state(),
                    consecutive_failures: 0,
                    last_error: None,
                    available: true,
                    polls,
                    last_success: Some(pair.current.fetched_at),
                });

                if !events.is_empty() {
                    debug!(device = %self.device.device_id(), count = events.len(), "Publishing events");
                    // No subscribers is not an error.
                    let _ = self.events.send(EventBatch {
                        device: self.device.device_id().clone(),
                        poll: polls,
                        events: events.clone(),
                    });
                }
                Ok(events)
            }
            Err(e) => {
                self.next_delay = self.scheduler.on_failure(Instant::now());
                let previous = self.status.borrow().clone();
                let failures = previous.consecutive_failures.saturating_add(1);
                // Reaching the threshold counts as exceeding the tolerated misses.
                let available = previous.available
                    && !e.is_fatal()
                    && failures < self.config.unavailable_after_failures;

                if e.is_fatal() {
                    error!(device = %self.device.device_id(), error = %e, "Poll failed; check the configured password");
                } else {
                    warn!(
                        device = %self.device.device_id(),
                        error = %e,
                        failures,
                        retry_in = ?self.next_delay,
                        "Poll failed"
                    );
                }
                if previous.available && !available {
                    warn!(device = %self.device.device_id(), "Device unavailable");
                }

                self.status.send_replace(PollStatus {
                    state: self.scheduler.state(),
                    consecutive_failures: failures,
                    last_error: Some(e.kind()),
                    available,
                    polls: previous.polls + 1,
                    last_success: previous.last_success,
                });
                Err(e)
            }
        }
    }

    /// Delay chosen by the last cycle
    pub fn next_delay(&self) -> Duration {
        self.next_delay
    }

    pub fn state(&self) -> PollState {
        self.scheduler.state()
    }

    pub fn status(&self) -> PollStatus {
        self.status.borrow().clone()
    }

    pub fn status_receiver(&self) -> watch::Receiver<PollStatus> {
        self.status.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventBatch> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<EventBatch> {
        self.events.clone()
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("device", self.device.device_id())
            .field("state", &self.scheduler.state())
            .field("next_delay", &self.next_delay)
            .finish()
    }
}
