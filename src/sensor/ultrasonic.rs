// src/sensor/ultrasonic.rs

use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::SensorError;
use crate::hardware::EchoPins;
use crate::sensor::SensorDriver;
use crate::sensor_data::Range;

/// Half the speed of sound in cm/s: the echo travels out and back.
pub const SOUND_CM_PER_S: f64 = 17150.0;
pub const MIN_RANGE_CM: f64 = 2.0;
pub const MAX_RANGE_CM: f64 = 400.0;
pub const WINDOW_LEN: usize = 5;

const TRIGGER_SETTLE: Duration = Duration::from_millis(20);
const TRIGGER_PULSE: Duration = Duration::from_micros(10);

/// Measures the width of one echo pulse.
pub trait EchoTimer: Send {
    fn echo_duration(&mut self) -> Result<Duration, SensorError>;
}

/// Trigger/echo protocol over a pair of pins.
pub struct PulseEcho<P> {
    pins: P,
    timeout: Duration,
}

impl<P: EchoPins> PulseEcho<P> {
    pub fn new(pins: P, timeout: Duration) -> Self {
        Self { pins, timeout }
    }
}

impl<P: EchoPins> EchoTimer for PulseEcho<P> {
    fn echo_duration(&mut self) -> Result<Duration, SensorError> {
        self.pins.set_trigger(false)?;
        thread::sleep(TRIGGER_SETTLE);
        self.pins.set_trigger(true)?;
        thread::sleep(TRIGGER_PULSE);
        self.pins.set_trigger(false)?;

        // Both edges share one absolute deadline.
        let deadline = Instant::now() + self.timeout;
        while !self.pins.echo_high()? {
            if Instant::now() > deadline {
                return Err(SensorError::EchoTimeout);
            }
        }
        let rise = Instant::now();
        while self.pins.echo_high()? {
            if Instant::now() > deadline {
                return Err(SensorError::EchoTimeout);
            }
        }
        Ok(rise.elapsed())
    }
}

/// Range finder with a sliding-mean smoother over the last accepted readings.
pub struct Ultrasonic<E> {
    echo: E,
    window: VecDeque<f64>,
}

impl<E: EchoTimer> Ultrasonic<E> {
    pub fn new(echo: E) -> Self {
        Self { echo, window: VecDeque::with_capacity(WINDOW_LEN + 1) }
    }

    pub fn window(&self) -> impl Iterator<Item = f64> + '_ {
        self.window.iter().copied()
    }
}

impl<E: EchoTimer> SensorDriver for Ultrasonic<E> {
    type Output = Range;

    fn read(&mut self) -> Result<Option<Range>, SensorError> {
        let elapsed = self.echo.echo_duration()?;
        let distance = elapsed.as_secs_f64() * SOUND_CM_PER_S;
        if !(MIN_RANGE_CM..=MAX_RANGE_CM).contains(&distance) {
            return Err(SensorError::OutOfRange(distance));
        }

        self.window.push_back(distance);
        if self.window.len() > WINDOW_LEN {
            self.window.pop_front();
        }
        let mean = self.window.iter().sum::<f64>() / self.window.len() as f64;
        Ok(Some(Range { front_cm: round2(mean) }))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
