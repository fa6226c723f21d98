// src/decision.rs

use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use tracing::{debug, info};

use crate::config::DecisionConfig;
use crate::queue::Outbox;
use crate::sensor_data::{Command, SensorSnapshot, VisionObservation};

/// Distance under which a description is prefixed with a warning.
pub const VERY_CLOSE_CM: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionPolicy {
    pub obstacle_threshold_cm: f64,
    pub cooldown: Duration,
}

impl From<&DecisionConfig> for DecisionPolicy {
    fn from(config: &DecisionConfig) -> Self {
        Self {
            obstacle_threshold_cm: config.obstacle_threshold_cm,
            cooldown: Duration::from_millis(config.speak_cooldown_ms),
        }
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self::from(&DecisionConfig::default())
    }
}

/// What to say about the nearest obstacle, if anything.
pub fn compose_message(distance_cm: Option<f64>, description: Option<&str>, threshold_cm: f64) -> Option<String> {
    let distance = distance_cm.filter(|d| *d < threshold_cm)?;
    let message = match description.filter(|d| !d.is_empty()) {
        Some(desc) if distance < VERY_CLOSE_CM => format!(
            "Warning! {desc}. Object very close at about {} centimeters.",
            distance.trunc() as i64
        ),
        Some(desc) => format!("{desc}. Object about {distance:.1} cm away."),
        None => format!("Careful. Nearest object {distance:.1} cm."),
    };
    Some(message)
}

/// Memory of the last utterance. Only changes when a Speak is sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecisionState {
    pub last_spoken_text: Option<String>,
    pub last_spoken_at: Option<Instant>,
}

impl DecisionState {
    pub fn should_speak(&self, message: &str, now: Instant, cooldown: Duration) -> bool {
        let (Some(text), Some(at)) = (&self.last_spoken_text, self.last_spoken_at) else {
            return true;
        };
        text != message || now.saturating_duration_since(at) >= cooldown
    }

    fn spoke(&mut self, message: &str, now: Instant) {
        self.last_spoken_text = Some(message.to_string());
        self.last_spoken_at = Some(now);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    NoSnapshot,
    /// A snapshot arrived without an observation and was discarded.
    NoObservation,
    Paired { spoken: Option<String> },
}

/// Pairs sensor snapshots with vision observations and turns them into
/// telemetry updates and debounced speech.
pub struct DecisionEngine {
    snapshots: Receiver<SensorSnapshot>,
    observations: Receiver<VisionObservation>,
    commands: Outbox<Command>,
    policy: DecisionPolicy,
    state: DecisionState,
}

impl DecisionEngine {
    pub fn new(
        snapshots: Receiver<SensorSnapshot>,
        observations: Receiver<VisionObservation>,
        commands: Outbox<Command>,
        policy: DecisionPolicy,
    ) -> Self {
        Self { snapshots, observations, commands, policy, state: DecisionState::default() }
    }

    pub fn state(&self) -> &DecisionState {
        &self.state
    }

    /// Both inputs must be available in the same tick. A snapshot without a
    /// matching observation is dropped, not held over.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let Ok(snapshot) = self.snapshots.try_recv() else {
            return TickOutcome::NoSnapshot;
        };
        let Ok(observation) = self.observations.try_recv() else {
            debug!("no observation this tick, snapshot discarded");
            return TickOutcome::NoObservation;
        };

        let distance = snapshot.distance_cm();
        self.commands.offer(Command::UpdateTelemetry(snapshot));
        let spoken = self.decide(distance, &observation, now);
        TickOutcome::Paired { spoken }
    }

    /// Composes the message for one pair and sends it unless debounced. A
    /// Speak the command queue refuses does not count as spoken.
    pub fn decide(&mut self, distance_cm: Option<f64>, observation: &VisionObservation, now: Instant) -> Option<String> {
        let message = compose_message(
            distance_cm,
            observation.description.as_deref(),
            self.policy.obstacle_threshold_cm,
        )?;
        if !self.state.should_speak(&message, now, self.policy.cooldown) {
            debug!(%message, "debounced");
            return None;
        }

        if !self.commands.offer(Command::Speak(message.clone())) {
            debug!(%message, "speak dropped, will retry on a later tick");
            return None;
        }
        info!("DECISION: Speak -> '{message}'");
        self.state.spoke(&message, now);
        Some(message)
    }
}
