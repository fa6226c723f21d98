// src/error.rs

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("{0} not initialized")]
    NotInitialized(&'static str),

    #[error("bus error: {0}")]
    Bus(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("echo timed out")]
    EchoTimeout,

    #[error("distance {0:.1}cm outside plausible range")]
    OutOfRange(f64),

    #[error("no position sentence in {0} lines")]
    NoFix(usize),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("description service throttled the request")]
    Throttled,

    #[error("description service returned status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("stream read failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sink returned status {0}")]
    Status(u16),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{program} exited with {code:?}")]
    Command { program: String, code: Option<i32> },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(String),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration value: {0}")]
    Invalid(String),
}
