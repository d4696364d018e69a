//! Background task driving the poller

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use xschedule_client::DeviceId;
use xschedule_state::EventBatch;

use crate::error::{PollingError, PollingResult};
use crate::polling::poller::{PollStatus, Poller};

/// Cloneable handle for requesting an immediate poll
#[derive(Debug, Clone)]
pub struct RefreshHandle(Arc<Notify>);

impl RefreshHandle {
    /// Poll as soon as the current cycle allows, skipping the remaining wait
    ///
    /// Requests made while a poll is in flight trigger one more poll right
    /// after it; repeated requests coalesce.
    pub fn request(&self) {
        self.0.notify_one();
    }
}

/// A running polling loop for one device
///
/// The loop waits for the delay chosen by the last cycle, or for a refresh
/// request, then polls. Only one poll is ever in flight. Cancellation
/// interrupts both the wait and an in-flight poll.
#[derive(Debug)]
pub struct PollingTask {
    device: DeviceId,
    task_handle: Option<JoinHandle<()>>,
    cancel: CancellationToken,
    refresh: Arc<Notify>,
    status: watch::Receiver<PollStatus>,
    events: broadcast::Sender<EventBatch>,
}

impl PollingTask {
    /// Spawn the loop; the first poll happens after `initial_delay`
    pub fn spawn(poller: Poller, device: DeviceId, initial_delay: Duration) -> Self {
        let cancel = CancellationToken::new();
        let refresh = Arc::new(Notify::new());
        let status = poller.status_receiver();
        let events = poller.event_sender();

        let task_handle = tokio::spawn(Self::polling_loop(
            poller,
            device.clone(),
            initial_delay,
            cancel.clone(),
            Arc::clone(&refresh),
        ));

        Self {
            device,
            task_handle: Some(task_handle),
            cancel,
            refresh,
            status,
            events,
        }
    }

    async fn polling_loop(
        mut poller: Poller,
        device: DeviceId,
        initial_delay: Duration,
        cancel: CancellationToken,
        refresh: Arc<Notify>,
    ) {
        info!(device = %device, "Polling started");
        let mut delay = initial_delay;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = refresh.notified() => debug!(device = %device, "Refresh requested"),
                _ = tokio::time::sleep(delay) => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                // Failures are absorbed into the backoff and health status.
                _ = poller.poll_once() => {}
            }
            delay = poller.next_delay();
        }

        info!(device = %device, "Polling stopped");
    }

    pub fn request_refresh(&self) {
        self.refresh.notify_one();
    }

    pub fn refresh_handle(&self) -> RefreshHandle {
        RefreshHandle(Arc::clone(&self.refresh))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventBatch> {
        self.events.subscribe()
    }

    pub fn status(&self) -> PollStatus {
        self.status.borrow().clone()
    }

    pub fn status_receiver(&self) -> watch::Receiver<PollStatus> {
        self.status.clone()
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn is_running(&self) -> bool {
        self.task_handle
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Stop polling and wait for the loop to exit
    ///
    /// No poll starts after this returns.
    pub async fn shutdown(mut self) -> PollingResult<()> {
        self.cancel.cancel();
        match self.task_handle.take() {
            Some(handle) => handle
                .await
                .map_err(|e| PollingError::TaskJoin(e.to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for PollingTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
