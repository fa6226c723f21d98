// src/main.rs

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use smart_walker::actions::ActionDispatcher;
use smart_walker::config::{load_config, Backend};
use smart_walker::decision::{DecisionEngine, DecisionPolicy};
use smart_walker::hardware::open_drivers;
use smart_walker::logging::init_logging;
use smart_walker::queue::channel;
use smart_walker::scheduler::Scheduler;
use smart_walker::sensor::SensorAcquisition;
use smart_walker::vision::describe::{GeminiDescriber, SceneDescriber};
use smart_walker::vision::frame::MjpegSource;
use smart_walker::vision::{VisionCadence, VisionDescriber};

/// Sensor and decision ticks share this many pool threads.
const TICK_THREADS: usize = 2;

#[derive(Debug, Parser)]
#[command(name = "smart-walker", version, about = "Smart walker navigation controller")]
struct Cli {
    /// Path to walker.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level or filter directive, e.g. `debug` or `smart_walker=trace`
    #[arg(long)]
    log_level: Option<String>,

    #[arg(long, value_enum)]
    backend: Option<Backend>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref()).context("loading configuration")?;
    if let Some(backend) = cli.backend {
        config.sensors.backend = backend;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_logging(&config.logging.level)?;
    info!(backend = ?config.sensors.backend, "smart walker starting");

    let running = Arc::new(AtomicBool::new(true));
    let capacity = config.queues.capacity;
    let (snapshot_tx, snapshot_rx) = channel("snapshots", capacity);
    let (observation_tx, observation_rx) = channel("observations", capacity);
    let (command_tx, command_rx) = channel("commands", capacity);

    // Actions
    let dispatcher = ActionDispatcher::from_config(&config.actions).context("building action sinks")?;
    thread::Builder::new()
        .name("actions".into())
        .spawn(move || dispatcher.run(command_rx))
        .context("spawning action dispatcher")?;

    // Vision
    let source = MjpegSource::new(&config.vision).context("building frame source")?;
    let describer: Option<Box<dyn SceneDescriber>> = if config.vision.describer_enabled() {
        Some(Box::new(GeminiDescriber::new(&config.vision).context("building scene describer")?))
    } else {
        warn!("no API key configured, scene descriptions disabled");
        None
    };
    let vision = VisionDescriber::new(Box::new(source), describer, &config.vision, observation_tx);
    let cadence = VisionCadence::from(&config.vision);
    let vision_running = running.clone();
    thread::Builder::new()
        .name("vision".into())
        .spawn(move || vision.run(vision_running, cadence))
        .context("spawning vision loop")?;

    // Sensors and decisions
    let mut acquisition = SensorAcquisition::new(open_drivers(&config.sensors), snapshot_tx);
    info!(live = ?acquisition.live_kinds(), "sensors ready");
    let mut engine = DecisionEngine::new(
        snapshot_rx,
        observation_rx,
        command_tx,
        DecisionPolicy::from(&config.decision),
    );

    let mut scheduler = Scheduler::new(TICK_THREADS, running.clone());
    scheduler.every("sensors", config.sensors.period(), move |_| {
        acquisition.tick();
    });
    scheduler.every("decision", config.decision.tick(), move |now| {
        engine.tick(now);
    });

    wait_for_ctrl_c()?;
    info!("shutdown requested");
    running.store(false, Ordering::Relaxed);
    scheduler.shutdown();
    info!("smart walker stopped");
    Ok(())
}

fn wait_for_ctrl_c() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building signal runtime")?;
    runtime.block_on(tokio::signal::ctrl_c()).context("listening for ctrl-c")
}
