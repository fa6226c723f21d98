// src/actions/mod.rs

pub mod firebase;
pub mod speech;

use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::Receiver;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ActionConfig;
use crate::error::SinkError;
use crate::sensor_data::{Command, SensorSnapshot};

use self::firebase::{FirebaseSink, OfflineSink};
use self::speech::CommandSpeech;

const SINK_TIMEOUT: Duration = Duration::from_secs(10);

/// Latest-value store: each put overwrites the previous one.
pub trait TelemetrySink: Send {
    fn put_latest(&mut self, snapshot: &SensorSnapshot) -> Result<(), SinkError>;
}

/// Append-only alert log.
pub trait AlertSink: Send {
    fn push_alert(&mut self, alert: &AlertRecord) -> Result<(), SinkError>;
}

pub trait SpeechOutput: Send {
    fn say(&mut self, text: &str) -> Result<(), SinkError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRecord {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub details: serde_json::Value,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl AlertRecord {
    pub fn new(kind: String, message: String, details: serde_json::Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            message,
            details,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Sole consumer of the command queue.
pub struct ActionDispatcher {
    telemetry: Box<dyn TelemetrySink>,
    alerts: Box<dyn AlertSink>,
    speech: Box<dyn SpeechOutput>,
}

impl ActionDispatcher {
    pub fn new(
        telemetry: Box<dyn TelemetrySink>,
        alerts: Box<dyn AlertSink>,
        speech: Box<dyn SpeechOutput>,
    ) -> Self {
        Self { telemetry, alerts, speech }
    }

    /// Firebase sinks when a database is configured, offline ones otherwise.
    pub fn from_config(config: &ActionConfig) -> Result<Self, SinkError> {
        let speech = Box::new(CommandSpeech::new(config));
        if config.database_url.trim().is_empty() {
            info!("no database configured, running sinks offline");
            return Ok(Self::new(Box::new(OfflineSink), Box::new(OfflineSink), speech));
        }
        let firebase = FirebaseSink::new(&config.database_url, SINK_TIMEOUT)?;
        Ok(Self::new(Box::new(firebase.clone()), Box::new(firebase), speech))
    }

    /// Runs one command. Failures are logged and dropped.
    pub fn dispatch(&mut self, command: Command) {
        let result = match command {
            Command::UpdateTelemetry(snapshot) => {
                debug!("updating live status");
                self.telemetry.put_latest(&snapshot).map_err(|e| ("telemetry", e))
            }
            Command::CriticalAlert { kind, message, details } => {
                let alert = AlertRecord::new(kind, message, details);
                info!(id = %alert.id, kind = %alert.kind, "pushing alert");
                self.alerts.push_alert(&alert).map_err(|e| ("alert", e))
            }
            Command::Speak(text) => {
                info!("ACTION: SPEAK <<< {text} >>>");
                self.speech.say(&text).map_err(|e| ("speech", e))
            }
        };

        if let Err((sink, e)) = result {
            warn!(sink, error = %e, "ACTION FAILED: discarded");
        }
    }

    /// Blocks on the queue until every sender is gone. Returns how many
    /// commands were handled.
    pub fn run(mut self, commands: Receiver<Command>) -> usize {
        info!("action dispatcher started");
        let mut handled = 0;
        for command in commands.iter() {
            self.dispatch(command);
            handled += 1;
        }
        info!(handled, "command queue closed, dispatcher exiting");
        handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor_data::{GpsFix, Motion, Range, SensorReading, Vitals};
    use crossbeam_channel::bounded;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        telemetry: Arc<Mutex<Vec<f64>>>,
        alerts: Arc<Mutex<Vec<AlertRecord>>>,
        spoken: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl Recorder {
        fn outcome(&self) -> Result<(), SinkError> {
            if self.fail {
                Err(SinkError::Status(503))
            } else {
                Ok(())
            }
        }
    }

    impl TelemetrySink for Recorder {
        fn put_latest(&mut self, snapshot: &SensorSnapshot) -> Result<(), SinkError> {
            self.telemetry.lock().unwrap().push(snapshot.ultrasonic.data.front_cm);
            self.outcome()
        }
    }

    impl AlertSink for Recorder {
        fn push_alert(&mut self, alert: &AlertRecord) -> Result<(), SinkError> {
            self.alerts.lock().unwrap().push(alert.clone());
            self.outcome()
        }
    }

    impl SpeechOutput for Recorder {
        fn say(&mut self, text: &str) -> Result<(), SinkError> {
            self.spoken.lock().unwrap().push(text.to_string());
            self.outcome()
        }
    }

    fn dispatcher(recorder: &Recorder) -> ActionDispatcher {
        ActionDispatcher::new(
            Box::new(recorder.clone()),
            Box::new(recorder.clone()),
            Box::new(recorder.clone()),
        )
    }

    fn snapshot(front_cm: f64) -> SensorSnapshot {
        SensorSnapshot {
            timestamp: Utc::now(),
            gps: SensorReading::ok(GpsFix { lat: 12.9, lon: 77.7 }),
            imu: SensorReading::ok(Motion { g_magnitude: 1.0 }),
            ultrasonic: SensorReading::ok(Range { front_cm }),
            pulse_ox: SensorReading::ok(Vitals { hr: 80, spo2: 97 }),
        }
    }

    fn alert() -> Command {
        Command::CriticalAlert {
            kind: "fall".into(),
            message: "possible fall".into(),
            details: serde_json::json!({ "g": 2.4 }),
        }
    }

    #[test]
    fn routes_each_command_kind() {
        let recorder = Recorder::default();
        let mut actions = dispatcher(&recorder);
        actions.dispatch(Command::UpdateTelemetry(snapshot(42.0)));
        actions.dispatch(alert());
        actions.dispatch(Command::Speak("hello".into()));

        assert_eq!(*recorder.telemetry.lock().unwrap(), vec![42.0]);
        assert_eq!(*recorder.spoken.lock().unwrap(), vec!["hello".to_string()]);
        let alerts = recorder.alerts.lock().unwrap();
        assert_eq!(alerts[0].kind, "fall");
        assert_eq!(alerts[0].details["g"], 2.4);
    }

    #[test]
    fn alert_record_shape() {
        let record = AlertRecord::new("fall".into(), "possible fall".into(), serde_json::Value::Null);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "fall");
        assert_eq!(json["id"], record.id.to_string());
        assert!(json["timestamp"].as_i64().unwrap() > 1_600_000_000_000);

        let later = AlertRecord::new("fall".into(), String::new(), serde_json::Value::Null);
        assert_ne!(record.id, later.id);
    }

    #[test]
    fn failures_do_not_stop_the_loop() {
        let recorder = Recorder { fail: true, ..Recorder::default() };
        let (tx, rx) = bounded(5);
        tx.send(Command::Speak("one".into())).unwrap();
        tx.send(alert()).unwrap();
        tx.send(Command::Speak("two".into())).unwrap();
        drop(tx);

        assert_eq!(dispatcher(&recorder).run(rx), 3);
        assert_eq!(recorder.spoken.lock().unwrap().len(), 2);
        assert_eq!(recorder.alerts.lock().unwrap().len(), 1);
    }

    #[test]
    fn empty_database_url_runs_offline() {
        let mut actions = ActionDispatcher::from_config(&ActionConfig {
            synth_command: vec!["true".into()],
            play_command: vec!["true".into()],
            ..ActionConfig::default()
        })
        .unwrap();
        actions.dispatch(Command::UpdateTelemetry(snapshot(80.0)));
        actions.dispatch(alert());
    }
}
