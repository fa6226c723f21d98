// src/sensor_data.rs

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// The four sensor kinds every snapshot carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Gps,
    Imu,
    Ultrasonic,
    PulseOx,
}

impl SensorKind {
    pub const ALL: [SensorKind; 4] = [
        SensorKind::Gps,
        SensorKind::Imu,
        SensorKind::Ultrasonic,
        SensorKind::PulseOx,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SensorKind::Gps => "gps",
            SensorKind::Imu => "imu",
            SensorKind::Ultrasonic => "ultrasonic",
            SensorKind::PulseOx => "pulse_ox",
        }
    }
}

/// `Simulated` means the value is a fallback, not live hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "SIMULATED")]
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading<T> {
    pub data: T,
    pub status: SensorStatus,
}

impl<T> SensorReading<T> {
    pub fn ok(data: T) -> Self {
        Self { data, status: SensorStatus::Ok }
    }

    pub fn simulated(data: T) -> Self {
        Self { data, status: SensorStatus::Simulated }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    pub g_magnitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub front_cm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vitals {
    pub hr: u32,
    pub spo2: u32,
}

/// One reading per tracked kind at a point in time. The fields make the
/// one-entry-per-kind invariant structural.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub timestamp: DateTime<Utc>,
    pub gps: SensorReading<GpsFix>,
    pub imu: SensorReading<Motion>,
    pub ultrasonic: SensorReading<Range>,
    pub pulse_ox: SensorReading<Vitals>,
}

impl SensorSnapshot {
    pub fn status(&self, kind: SensorKind) -> SensorStatus {
        match kind {
            SensorKind::Gps => self.gps.status,
            SensorKind::Imu => self.imu.status,
            SensorKind::Ultrasonic => self.ultrasonic.status,
            SensorKind::PulseOx => self.pulse_ox.status,
        }
    }

    /// Front distance used for decisions. Fallback values participate too.
    pub fn distance_cm(&self) -> Option<f64> {
        match self.ultrasonic.status {
            SensorStatus::Ok | SensorStatus::Simulated => Some(self.ultrasonic.data.front_cm),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionObservation {
    pub timestamp: DateTime<Utc>,
    pub description: Option<String>,
    pub scene_changed: bool,
}

/// Messages from the decision loop to the action dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    UpdateTelemetry(SensorSnapshot),
    CriticalAlert {
        kind: String,
        message: String,
        details: serde_json::Value,
    },
    Speak(String),
}
