// src/vision/mod.rs

pub mod describe;
pub mod frame;
pub mod signature;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::VisionConfig;
use crate::error::VisionError;
use crate::queue::Outbox;
use crate::sensor_data::VisionObservation;

use self::describe::SceneDescriber;
use self::frame::{Frame, FrameSource};
use self::signature::{SceneChangeDetector, SceneSignature};

/// Sleep lengths for the three ways a poll can end.
#[derive(Debug, Clone, Copy)]
pub struct VisionCadence {
    pub poll_interval: Duration,
    pub no_frame_delay: Duration,
    pub error_backoff: Duration,
}

impl From<&VisionConfig> for VisionCadence {
    fn from(config: &VisionConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            no_frame_delay: Duration::from_millis(config.no_frame_delay_ms),
            error_backoff: Duration::from_millis(config.error_backoff_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    NoFrame,
    Emitted { queued: bool },
}

/// Watches the camera, asks for a description when the scene changes and
/// the cooldown allows, and emits one observation per frame.
pub struct VisionDescriber {
    source: Box<dyn FrameSource>,
    detector: SceneChangeDetector,
    describer: Option<Box<dyn SceneDescriber>>,
    interval: Duration,
    last_call: Option<Instant>,
    outbox: Outbox<VisionObservation>,
}

impl VisionDescriber {
    /// Without a describer, scene changes are still reported but nothing is
    /// ever described.
    pub fn new(
        source: Box<dyn FrameSource>,
        describer: Option<Box<dyn SceneDescriber>>,
        config: &VisionConfig,
        outbox: Outbox<VisionObservation>,
    ) -> Self {
        Self {
            source,
            detector: SceneChangeDetector::new(config.scene_change_threshold),
            describer,
            interval: config.description_interval(),
            last_call: None,
            outbox,
        }
    }

    pub fn last_call(&self) -> Option<Instant> {
        self.last_call
    }

    pub fn observe(&mut self, frame: &Frame, now: Instant) -> VisionObservation {
        let scene_changed = self.detector.observe(SceneSignature::of(&frame.image));
        let description = if scene_changed { self.describe(frame, now) } else { None };
        VisionObservation { timestamp: Utc::now(), description, scene_changed }
    }

    fn call_due(&self, now: Instant) -> bool {
        match self.last_call {
            None => true,
            Some(at) => now.saturating_duration_since(at) > self.interval,
        }
    }

    fn describe(&mut self, frame: &Frame, now: Instant) -> Option<String> {
        if self.describer.is_none() || !self.call_due(now) {
            return None;
        }
        // The cooldown restarts on every attempt, whatever the outcome.
        self.last_call = Some(now);
        let describer = self.describer.as_ref()?;

        match describer.describe(&frame.jpeg) {
            Ok(description) => {
                debug!(?description, "scene described");
                description
            }
            Err(VisionError::Throttled) => {
                warn!("DESCRIPTION THROTTLED: waiting for next interval");
                None
            }
            Err(e) => {
                warn!(error = %e, "DESCRIPTION FAILED");
                None
            }
        }
    }

    /// `clock` is read once the frame is in hand, so a slow frame read does
    /// not shorten the spacing between descriptions.
    pub fn poll(&mut self, clock: impl FnOnce() -> Instant) -> Result<Poll, VisionError> {
        let Some(frame) = self.source.latest_frame()? else {
            return Ok(Poll::NoFrame);
        };
        let observation = self.observe(&frame, clock());
        Ok(Poll::Emitted { queued: self.outbox.offer(observation) })
    }

    pub fn run(mut self, running: Arc<AtomicBool>, cadence: VisionCadence) {
        info!(describer = self.describer.is_some(), "vision loop started");
        while running.load(Ordering::Relaxed) {
            let pause = match self.poll(Instant::now) {
                Ok(Poll::Emitted { .. }) => cadence.poll_interval,
                Ok(Poll::NoFrame) => {
                    debug!("no frame within budget");
                    cadence.no_frame_delay
                }
                Err(e) => {
                    warn!(error = %e, "VISION LOOP ERROR: backing off");
                    cadence.error_backoff
                }
            };
            thread::sleep(pause);
        }
        info!("vision loop stopped");
    }
}
