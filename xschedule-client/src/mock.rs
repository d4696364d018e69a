//! Scripted [`DeviceApi`] for tests
//!
//! Status results are queued and served in order; once the queue is empty the
//! last served snapshot repeats. Commands are recorded, and each call kind is
//! counted so tests can assert how often the device was hit.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::api::DeviceApi;
use crate::command::Command;
use crate::config::DeviceId;
use crate::error::{DeviceError, Result};
use crate::model::{Ack, PlaylistEntry, Snapshot, StepEntry};

#[derive(Debug, Default)]
struct Script {
    statuses: VecDeque<Result<Snapshot>>,
    last_status: Option<Snapshot>,
    playlists: Option<Result<Vec<PlaylistEntry>>>,
    steps: HashMap<String, Result<Vec<StepEntry>>>,
    acks: VecDeque<Result<Ack>>,
    commands: Vec<Command>,
}

/// In-memory device with scripted answers
#[derive(Debug)]
pub struct MockDevice {
    id: DeviceId,
    script: Mutex<Script>,
    latency: Mutex<Option<Duration>>,
    status_calls: AtomicUsize,
    playlist_calls: AtomicUsize,
    step_calls: AtomicUsize,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            id: DeviceId::new("mock", 8080),
            script: Mutex::new(Script::default()),
            latency: Mutex::new(None),
            status_calls: AtomicUsize::new(0),
            playlist_calls: AtomicUsize::new(0),
            step_calls: AtomicUsize::new(0),
        }
    }

    /// Queue the result of the next `fetch_status`
    pub fn push_status(&self, status: Result<Snapshot>) -> &Self {
        self.script.lock().statuses.push_back(status);
        self
    }

    pub fn set_playlists(&self, playlists: Result<Vec<PlaylistEntry>>) -> &Self {
        self.script.lock().playlists = Some(playlists);
        self
    }

    /// Steps served for `playlist`, with `index` filled in from position
    pub fn set_steps(&self, playlist: &str, names: &[&str]) -> &Self {
        let steps = names
            .iter()
            .enumerate()
            .map(|(index, name)| StepEntry {
                id: None,
                name: name.to_string(),
                index,
                playlist: playlist.to_string(),
                length_ms: None,
            })
            .collect();
        self.script.lock().steps.insert(playlist.to_string(), Ok(steps));
        self
    }

    /// Script full step entries, ids included
    pub fn set_step_entries(&self, playlist: &str, steps: Vec<StepEntry>) -> &Self {
        self.script.lock().steps.insert(playlist.to_string(), Ok(steps));
        self
    }

    pub fn fail_steps(&self, playlist: &str, error: DeviceError) -> &Self {
        self.script.lock().steps.insert(playlist.to_string(), Err(error));
        self
    }

    /// Queue the answer to the next command; unscripted commands are acknowledged
    pub fn push_ack(&self, ack: Result<Ack>) -> &Self {
        self.script.lock().acks.push_back(ack);
        self
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) -> &Self {
        *self.latency.lock() = Some(latency);
        self
    }

    pub fn commands(&self) -> Vec<Command> {
        self.script.lock().commands.clone()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn playlist_calls(&self) -> usize {
        self.playlist_calls.load(Ordering::SeqCst)
    }

    pub fn step_calls(&self) -> usize {
        self.step_calls.load(Ordering::SeqCst)
    }

    async fn delay(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceApi for MockDevice {
    fn device_id(&self) -> &DeviceId {
        &self.id
    }

    async fn fetch_status(&self) -> Result<Snapshot> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        let mut script = self.script.lock();
        match script.statuses.pop_front() {
            Some(Ok(snapshot)) => {
                script.last_status = Some(snapshot.clone());
                Ok(snapshot)
            }
            Some(Err(e)) => Err(e),
            None => script
                .last_status
                .clone()
                .ok_or_else(|| DeviceError::Unreachable("no scripted status".to_string())),
        }
    }

    async fn fetch_playlists(&self) -> Result<Vec<PlaylistEntry>> {
        self.playlist_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.script.lock().playlists.clone().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn fetch_steps(&self, playlist: &str) -> Result<Vec<StepEntry>> {
        self.step_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.script
            .lock()
            .steps
            .get(playlist)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn send_command(&self, command: &Command) -> Result<Ack> {
        self.delay().await;
        let mut script = self.script.lock();
        script.commands.push(command.clone());
        script.acks.pop_front().unwrap_or_else(|| Ok(Ack::ok()))
    }
}
