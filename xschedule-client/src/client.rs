//! HTTP client for xSchedule's web API

use async_trait::async_trait;
use chrono::Utc;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::api::DeviceApi;
use crate::auth::{self, Session};
use crate::command::Command;
use crate::config::{DeviceConfig, DeviceId};
use crate::error::{DeviceError, Result};
use crate::model::{Ack, PlaylistEntry, Snapshot, StepEntry};
use crate::wire::{Envelope, NextScheduledWire, PlayingStatusWire, PlaylistsWire, StepsWire};

/// Reference attached to every request so the device can attribute it
pub const REFERENCE: &str = "ha:xlights_scheduler";

/// Characters escaped in query values. Spaces must become `%20`; the device
/// does not decode `+` as a space.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b',')
    .remove(b':')
    .remove(b'+')
    .remove(b'|')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.');

fn encode(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

fn query_string(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Client for a single xSchedule instance
///
/// Construct one per device; the client holds that device's login session.
#[derive(Debug)]
pub struct XScheduleClient {
    config: DeviceConfig,
    device_id: DeviceId,
    http: reqwest::Client,
    session: Mutex<Session>,
}

impl XScheduleClient {
    /// Create a client; no request is made until the first call
    pub fn new(config: DeviceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            device_id: config.device_id(),
            config,
            http,
            session: Mutex::new(Session::default()),
        })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Run a query endpoint and return the raw JSON body
    pub async fn query(&self, query: &str, parameters: &str) -> Result<Value> {
        let path = format!(
            "/xScheduleQuery?{}",
            query_string(&[("Query", query), ("Parameters", parameters), ("Reference", REFERENCE)])
        );
        self.authenticated_get(&path).await
    }

    /// Send a command and return the device's acknowledgement
    pub async fn command(&self, command: &Command) -> Result<Ack> {
        let parameters = command.parameters();
        let path = format!(
            "/xScheduleCommand?{}",
            query_string(&[
                ("Command", command.name()),
                ("Parameters", parameters.as_str()),
                ("Reference", REFERENCE),
            ])
        );
        let body = self.authenticated_get(&path).await?;
        let ack = Envelope::deserialize(&body)
            .map_err(|e| DeviceError::malformed(format!("unreadable command answer: {}", e)))?
            .into_ack();
        debug!(device = %self.device_id, command = %command, result = %ack.result, "Command sent");
        Ok(ack)
    }

    /// Log in now instead of lazily on the first request
    ///
    /// A no-op when no password is configured.
    pub async fn login(&self) -> Result<()> {
        let Some(password) = self.config.password.as_deref() else {
            return Ok(());
        };
        let mut session = self.session.lock().await;
        session.logged_in = false;
        self.login_locked(&mut session, password).await
    }

    async fn ensure_login(&self) -> Result<()> {
        let Some(password) = self.config.password.as_deref() else {
            return Ok(());
        };
        let mut session = self.session.lock().await;
        if session.logged_in {
            return Ok(());
        }
        self.login_locked(&mut session, password).await
    }

    async fn login_locked(&self, session: &mut Session, password: &str) -> Result<()> {
        // A previously seen address usually still works.
        if let Some(ip) = session.seen_ip.clone() {
            if self.try_credential(&auth::credential(&ip, password)).await? {
                session.logged_in = true;
                return Ok(());
            }
        }

        let probe = self.login_request(auth::PROBE_CREDENTIAL).await?;
        let Some(ip) = probe.ip.filter(|ip| !ip.trim().is_empty()) else {
            error!(device = %self.device_id, "Device did not report the client address; cannot log in");
            return Err(DeviceError::AuthRejected);
        };
        debug!(device = %self.device_id, seen_ip = %ip, "Device reported client address");

        let accepted = self.try_credential(&auth::credential(&ip, password)).await?;
        session.seen_ip = Some(ip);
        if accepted {
            session.logged_in = true;
            debug!(device = %self.device_id, "Logged in");
            Ok(())
        } else {
            error!(device = %self.device_id, "Password rejected by device");
            Err(DeviceError::AuthRejected)
        }
    }

    async fn try_credential(&self, credential: &str) -> Result<bool> {
        Ok(self.login_request(credential).await?.is_ok())
    }

    async fn login_request(&self, credential: &str) -> Result<Envelope> {
        let path = format!(
            "/xScheduleLogin?{}",
            query_string(&[("Credential", credential), ("Reference", REFERENCE)])
        );
        let body = self.get(&path).await?;
        Ok(Envelope::deserialize(&body).unwrap_or_default())
    }

    async fn authenticated_get(&self, path: &str) -> Result<Value> {
        self.ensure_login().await?;
        let body = self.get(path).await?;
        if !is_not_logged_in(&body) {
            return Ok(body);
        }

        let Some(password) = self.config.password.as_deref() else {
            error!(device = %self.device_id, "Device requires a password but none is configured");
            return Err(DeviceError::AuthRejected);
        };

        // Session expired: one re-login and one resend.
        warn!(device = %self.device_id, "Session expired, logging in again");
        {
            let mut session = self.session.lock().await;
            session.logged_in = false;
            self.login_locked(&mut session, password).await?;
        }
        let body = self.get(path).await?;
        if is_not_logged_in(&body) {
            error!(device = %self.device_id, "Device still reports not logged in after login");
            return Err(DeviceError::AuthRejected);
        }
        Ok(body)
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.config.base_url(), path);
        debug!(url = %url, "GET");
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            DeviceError::malformed(format!("HTTP {} with unreadable body: {}", status, e))
        })
    }
}

fn is_not_logged_in(body: &Value) -> bool {
    Envelope::deserialize(body)
        .map(|envelope| envelope.is_not_logged_in())
        .unwrap_or(false)
}

#[async_trait]
impl DeviceApi for XScheduleClient {
    fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// The next-scheduled query only gets what remains of `request_timeout`
    async fn fetch_status(&self) -> Result<Snapshot> {
        let started = Instant::now();
        let body = self.query("GetPlayingStatus", "").await?;
        let wire = PlayingStatusWire::deserialize(&body)?;

        // The next-scheduled query is supplementary: its failure is not a failed poll.
        let remaining = self.config.request_timeout.saturating_sub(started.elapsed());
        let next_scheduled =
            match tokio::time::timeout(remaining, self.query("GetNextScheduledPlayList", "")).await {
                Ok(Ok(body)) => NextScheduledWire::deserialize(&body)
                    .ok()
                    .and_then(NextScheduledWire::into_model),
                Ok(Err(e)) => {
                    debug!(device = %self.device_id, error = %e, "Next scheduled playlist unavailable");
                    None
                }
                Err(_) => {
                    debug!(device = %self.device_id, "Next scheduled playlist query out of time");
                    None
                }
            };

        wire.into_snapshot(next_scheduled, Utc::now())
    }

    async fn fetch_playlists(&self) -> Result<Vec<PlaylistEntry>> {
        let body = self.query("GetPlayLists", "").await?;
        Ok(PlaylistsWire::deserialize(&body)?.into_entries())
    }

    async fn fetch_steps(&self, playlist: &str) -> Result<Vec<StepEntry>> {
        let body = self.query("GetPlayListSteps", playlist).await?;
        Ok(StepsWire::deserialize(&body)?.into_entries(playlist))
    }

    async fn send_command(&self, command: &Command) -> Result<Ack> {
        self.command(command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spaces_encode_as_percent_20() {
        assert_eq!(encode("Holiday Show"), "Holiday%20Show");
        assert_eq!(encode("A,B|c:d-e_f.g+h"), "A,B|c:d-e_f.g+h");
        assert_eq!(encode("50%"), "50%25");
        assert_eq!(encode("a&b=c"), "a%26b%3Dc");
    }

    #[test]
    fn test_query_string() {
        assert_eq!(
            query_string(&[("Query", "GetPlayListSteps"), ("Parameters", "Holiday Show")]),
            "Query=GetPlayListSteps&Parameters=Holiday%20Show"
        );
    }

    #[test]
    fn test_not_logged_in_detection() {
        assert!(is_not_logged_in(&serde_json::json!({"result": "not logged in"})));
        assert!(!is_not_logged_in(&serde_json::json!({"result": "ok"})));
        assert!(!is_not_logged_in(&serde_json::json!({"status": "idle"})));
        assert!(!is_not_logged_in(&serde_json::json!([1, 2])));
    }
}
