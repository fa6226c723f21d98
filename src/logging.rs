// src/logging.rs

use anyhow::{anyhow, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// `RUST_LOG` wins when set; otherwise `level` applies to the whole process.
pub fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Console logging for the walker. Fails if a subscriber is already set.
pub fn init_logging(level: &str) -> Result<()> {
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_names(true)
        .with_filter(filter_for(level));

    Registry::default()
        .with(console)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}
