// src/sensor/mod.rs

pub mod gps;
pub mod imu;
pub mod pulse_ox;
pub mod ultrasonic;

use std::panic::{self, AssertUnwindSafe};

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::SensorError;
use crate::queue::Outbox;
use crate::sensor_data::{GpsFix, Motion, Range, SensorKind, SensorReading, SensorSnapshot, Vitals};

/// Uniform read capability every sensor driver exposes.
///
/// `Ok(None)` means the device answered but produced nothing usable this
/// time; acquisition treats it like an error.
pub trait SensorDriver: Send {
    type Output;

    fn read(&mut self) -> Result<Option<Self::Output>, SensorError>;
}

/// Deterministic substitute reported when a live reading is unavailable.
pub trait Fallback: Sized {
    const KIND: SensorKind;

    fn fallback() -> Self;
}

impl Fallback for GpsFix {
    const KIND: SensorKind = SensorKind::Gps;

    fn fallback() -> Self {
        GpsFix { lat: 12.9649, lon: 77.7126 }
    }
}

impl Fallback for Motion {
    const KIND: SensorKind = SensorKind::Imu;

    fn fallback() -> Self {
        Motion { g_magnitude: 1.0 }
    }
}

impl Fallback for Range {
    const KIND: SensorKind = SensorKind::Ultrasonic;

    fn fallback() -> Self {
        Range { front_cm: 500.0 }
    }
}

impl Fallback for Vitals {
    const KIND: SensorKind = SensorKind::PulseOx;

    fn fallback() -> Self {
        Vitals { hr: 80, spo2: 98 }
    }
}

pub type BoxedDriver<T> = Box<dyn SensorDriver<Output = T>>;

/// Result of constructing one driver.
pub type DriverSlot<T> = Result<BoxedDriver<T>, SensorError>;

pub fn boxed<D, T>(driver: D) -> BoxedDriver<T>
where
    D: SensorDriver<Output = T> + 'static,
{
    Box::new(driver)
}

pub struct SensorDrivers {
    pub gps: DriverSlot<GpsFix>,
    pub imu: DriverSlot<Motion>,
    pub ultrasonic: DriverSlot<Range>,
    pub pulse_ox: DriverSlot<Vitals>,
}

/// Samples every sensor kind once per tick and emits a complete snapshot.
///
/// A kind whose driver failed to construct stays fallback-only for the life
/// of this instance.
pub struct SensorAcquisition {
    gps: Option<BoxedDriver<GpsFix>>,
    imu: Option<BoxedDriver<Motion>>,
    ultrasonic: Option<BoxedDriver<Range>>,
    pulse_ox: Option<BoxedDriver<Vitals>>,
    outbox: Outbox<SensorSnapshot>,
}

impl SensorAcquisition {
    pub fn new(drivers: SensorDrivers, outbox: Outbox<SensorSnapshot>) -> Self {
        Self {
            gps: settle(drivers.gps),
            imu: settle(drivers.imu),
            ultrasonic: settle(drivers.ultrasonic),
            pulse_ox: settle(drivers.pulse_ox),
            outbox,
        }
    }

    /// Kinds that still have a live driver.
    pub fn live_kinds(&self) -> Vec<SensorKind> {
        let live = [
            (SensorKind::Gps, self.gps.is_some()),
            (SensorKind::Imu, self.imu.is_some()),
            (SensorKind::Ultrasonic, self.ultrasonic.is_some()),
            (SensorKind::PulseOx, self.pulse_ox.is_some()),
        ];
        live.into_iter().filter(|(_, up)| *up).map(|(kind, _)| kind).collect()
    }

    pub fn sample(&mut self) -> SensorSnapshot {
        SensorSnapshot {
            timestamp: Utc::now(),
            gps: read_or_fallback(&mut self.gps),
            imu: read_or_fallback(&mut self.imu),
            ultrasonic: read_or_fallback(&mut self.ultrasonic),
            pulse_ox: read_or_fallback(&mut self.pulse_ox),
        }
    }

    /// One acquisition period: sample and offer. Returns whether the
    /// snapshot was queued; a full queue drops it silently.
    pub fn tick(&mut self) -> bool {
        let snapshot = self.sample();
        debug!(
            front_cm = snapshot.ultrasonic.data.front_cm,
            ultrasonic = ?snapshot.ultrasonic.status,
            "snapshot sampled"
        );
        self.outbox.offer(snapshot)
    }
}

fn settle<T: Fallback>(slot: DriverSlot<T>) -> Option<BoxedDriver<T>> {
    match slot {
        Ok(driver) => Some(driver),
        Err(e) => {
            warn!(sensor = T::KIND.name(), error = %e, "DRIVER INIT FAILED: using fallback for the rest of the run");
            None
        }
    }
}

fn read_or_fallback<T: Fallback>(slot: &mut Option<BoxedDriver<T>>) -> SensorReading<T> {
    let Some(driver) = slot.as_mut() else {
        return SensorReading::simulated(T::fallback());
    };

    match panic::catch_unwind(AssertUnwindSafe(|| driver.read())) {
        Ok(Ok(Some(value))) => SensorReading::ok(value),
        Ok(Ok(None)) => {
            debug!(sensor = T::KIND.name(), "no reading, using fallback");
            SensorReading::simulated(T::fallback())
        }
        Ok(Err(e)) => {
            debug!(sensor = T::KIND.name(), error = %e, "read failed, using fallback");
            SensorReading::simulated(T::fallback())
        }
        Err(_) => {
            warn!(sensor = T::KIND.name(), "driver panicked, using fallback");
            SensorReading::simulated(T::fallback())
        }
    }
}
