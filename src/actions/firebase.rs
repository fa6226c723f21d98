// src/actions/firebase.rs

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tracing::debug;

use crate::actions::{AlertRecord, AlertSink, TelemetrySink};
use crate::error::SinkError;
use crate::sensor_data::SensorSnapshot;

pub const LIVE_STATUS_PATH: &str = "walker/live-status";
pub const ALERTS_PATH: &str = "walker/alerts";

/// Realtime Database over its REST interface. Both telemetry and alerts
/// are written with `PUT`, alerts under their own id.
#[derive(Debug, Clone)]
pub struct FirebaseSink {
    client: Client,
    root: String,
}

impl FirebaseSink {
    pub fn new(database_url: &str, timeout: Duration) -> Result<Self, SinkError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, root: database_url.trim().trim_end_matches('/').to_string() })
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}.json", self.root, path)
    }

    fn put(&self, path: &str, value: &impl Serialize) -> Result<(), SinkError> {
        let body = serde_json::to_vec(value)?;
        let url = self.url_for(path);
        let response = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status(status.as_u16()));
        }
        debug!(%url, "stored");
        Ok(())
    }
}

impl TelemetrySink for FirebaseSink {
    fn put_latest(&mut self, snapshot: &SensorSnapshot) -> Result<(), SinkError> {
        self.put(LIVE_STATUS_PATH, snapshot)
    }
}

impl AlertSink for FirebaseSink {
    fn push_alert(&mut self, alert: &AlertRecord) -> Result<(), SinkError> {
        self.put(&format!("{ALERTS_PATH}/{}", alert.id), alert)
    }
}

/// Stand-in when no database is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineSink;

impl TelemetrySink for OfflineSink {
    fn put_latest(&mut self, snapshot: &SensorSnapshot) -> Result<(), SinkError> {
        debug!(front_cm = snapshot.ultrasonic.data.front_cm, "offline: live status not stored");
        Ok(())
    }
}

impl AlertSink for OfflineSink {
    fn push_alert(&mut self, alert: &AlertRecord) -> Result<(), SinkError> {
        debug!(id = %alert.id, kind = %alert.kind, "offline: alert not stored");
        Ok(())
    }
}
