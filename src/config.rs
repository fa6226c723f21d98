// src/config.rs
//
// TOML configuration with environment overrides. Every field has a default,
// so a missing file yields a runnable simulated setup.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "walker.toml";
pub const CONFIG_PATH_ENV: &str = "WALKER_CONFIG_PATH";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkerConfig {
    pub sensors: SensorConfig,
    pub vision: VisionConfig,
    pub decision: DecisionConfig,
    pub queues: QueueConfig,
    pub actions: ActionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Simulated,
    Linux,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub period_ms: u64,
    pub backend: Backend,
    /// Probability that a simulated device read fails.
    pub fault_rate: f64,
    pub gps_device: PathBuf,
    /// Longest wait for one NMEA line from the serial device.
    pub gps_timeout_ms: u64,
    pub ultrasonic: UltrasonicConfig,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            period_ms: 1000,
            backend: Backend::Simulated,
            fault_rate: 0.0,
            gps_device: PathBuf::from("/dev/serial0"),
            gps_timeout_ms: 250,
            ultrasonic: UltrasonicConfig::default(),
        }
    }
}

impl SensorConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn gps_timeout(&self) -> Duration {
        Duration::from_millis(self.gps_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UltrasonicConfig {
    pub trigger_pin: u32,
    pub echo_pin: u32,
    pub timeout_ms: u64,
}

impl Default for UltrasonicConfig {
    fn default() -> Self {
        Self { trigger_pin: 23, echo_pin: 24, timeout_ms: 100 }
    }
}

impl UltrasonicConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub video_source: String,
    pub poll_interval_ms: u64,
    pub frame_budget_ms: u64,
    pub frame_timeout_ms: u64,
    pub no_frame_delay_ms: u64,
    pub error_backoff_ms: u64,
    pub description_interval_ms: u64,
    pub scene_change_threshold: f64,
    pub api_url: String,
    pub model: String,
    pub api_key: String,
    pub request_timeout_ms: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            video_source: "http://127.0.0.1:8080/video_feed".to_string(),
            poll_interval_ms: 500,
            frame_budget_ms: 700,
            frame_timeout_ms: 3000,
            no_frame_delay_ms: 1000,
            error_backoff_ms: 2000,
            description_interval_ms: 5000,
            scene_change_threshold: 8.0,
            api_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key: String::new(),
            request_timeout_ms: 45_000,
        }
    }
}

impl VisionConfig {
    pub fn description_interval(&self) -> Duration {
        Duration::from_millis(self.description_interval_ms)
    }

    pub fn describer_enabled(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub tick_ms: u64,
    pub obstacle_threshold_cm: f64,
    pub speak_cooldown_ms: u64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self { tick_ms: 100, obstacle_threshold_cm: 100.0, speak_cooldown_ms: 6000 }
    }
}

impl DecisionConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    /// Realtime database root; empty keeps the sinks offline.
    pub database_url: String,
    pub synth_command: Vec<String>,
    pub play_command: Vec<String>,
    pub audio_file: PathBuf,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            synth_command: ["espeak-ng", "-w", "{out}", "{text}"].map(String::from).to_vec(),
            play_command: ["aplay", "-q", "{out}"].map(String::from).to_vec(),
            audio_file: PathBuf::from("response.wav"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

/// Resolve the config file: explicit path, then `WALKER_CONFIG_PATH`, then
/// `./walker.toml`. `Ok(None)` means run on defaults.
pub fn find_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    if let Ok(env_path) = env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::FileNotFound(format!(
            "{} (from {})",
            path.display(),
            CONFIG_PATH_ENV
        )));
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    Ok(local.exists().then_some(local))
}

pub fn load_config(explicit: Option<&Path>) -> Result<WalkerConfig, ConfigError> {
    let mut config = match find_config_file(explicit)? {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => WalkerConfig::default(),
    };
    apply_environment_overrides(&mut config);
    validate_config(&config)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<WalkerConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Supported variables:
/// - `WALKER_VIDEO_SOURCE` -> `vision.video_source`
/// - `WALKER_API_KEY` -> `vision.api_key`
/// - `WALKER_DATABASE_URL` -> `actions.database_url`
/// - `WALKER_SENSOR_BACKEND` -> `sensors.backend`
/// - `WALKER_LOG_LEVEL` -> `logging.level`
pub fn apply_environment_overrides(config: &mut WalkerConfig) {
    if let Ok(value) = env::var("WALKER_VIDEO_SOURCE") {
        config.vision.video_source = value;
    }
    if let Ok(value) = env::var("WALKER_API_KEY") {
        config.vision.api_key = value;
    }
    if let Ok(value) = env::var("WALKER_DATABASE_URL") {
        config.actions.database_url = value;
    }
    if let Ok(value) = env::var("WALKER_SENSOR_BACKEND") {
        match value.to_ascii_lowercase().as_str() {
            "simulated" => config.sensors.backend = Backend::Simulated,
            "linux" => config.sensors.backend = Backend::Linux,
            _ => {}
        }
    }
    if let Ok(value) = env::var("WALKER_LOG_LEVEL") {
        config.logging.level = value;
    }
}

pub fn validate_config(config: &WalkerConfig) -> Result<(), ConfigError> {
    let periods = [
        ("sensors.period_ms", config.sensors.period_ms),
        ("sensors.gps_timeout_ms", config.sensors.gps_timeout_ms),
        ("sensors.ultrasonic.timeout_ms", config.sensors.ultrasonic.timeout_ms),
        ("vision.poll_interval_ms", config.vision.poll_interval_ms),
        ("vision.frame_budget_ms", config.vision.frame_budget_ms),
        ("vision.frame_timeout_ms", config.vision.frame_timeout_ms),
        ("decision.tick_ms", config.decision.tick_ms),
    ];
    for (name, value) in periods {
        if value == 0 {
            return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
        }
    }

    if config.queues.capacity == 0 {
        return Err(ConfigError::Invalid("queues.capacity must be greater than zero".into()));
    }

    let thresholds = [
        ("vision.scene_change_threshold", config.vision.scene_change_threshold),
        ("decision.obstacle_threshold_cm", config.decision.obstacle_threshold_cm),
    ];
    for (name, value) in thresholds {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::Invalid(format!("{name} must be a non-negative number")));
        }
    }

    if !(0.0..=1.0).contains(&config.sensors.fault_rate) {
        return Err(ConfigError::Invalid("sensors.fault_rate must be within [0, 1]".into()));
    }

    if config.actions.synth_command.is_empty() || config.actions.play_command.is_empty() {
        return Err(ConfigError::Invalid("speech commands must not be empty".into()));
    }

    Ok(())
}
