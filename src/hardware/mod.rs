// src/hardware/mod.rs

//! Bus abstractions the sensor drivers are written against, and the
//! backends that provide them.

pub mod linux;
pub mod sim;

use std::io::BufReader;

use tracing::info;

use crate::config::{Backend, SensorConfig};
use crate::error::SensorError;
use crate::sensor::gps::Gps;
use crate::sensor::imu::{Imu, MPU6050_ADDRESS};
use crate::sensor::pulse_ox::{PulseOximeter, MAX30100_ADDRESS};
use crate::sensor::ultrasonic::{PulseEcho, Ultrasonic};
use crate::sensor::{boxed, SensorDrivers};

/// Register access to a single device on an I2C-style bus.
pub trait RegisterBus: Send {
    fn write_byte(&mut self, register: u8, value: u8) -> Result<(), SensorError>;
    fn read_byte(&mut self, register: u8) -> Result<u8, SensorError>;
    fn read_block(&mut self, register: u8, buf: &mut [u8]) -> Result<(), SensorError>;
}

/// Trigger output and echo input of a pulse-echo range finder.
pub trait EchoPins: Send {
    fn set_trigger(&mut self, high: bool) -> Result<(), SensorError>;
    fn echo_high(&mut self) -> Result<bool, SensorError>;
}

/// Constructs every driver for the configured backend. Construction errors
/// are kept per kind so acquisition can downgrade only that kind.
pub fn open_drivers(config: &SensorConfig) -> SensorDrivers {
    info!(backend = ?config.backend, "opening sensor drivers");
    match config.backend {
        Backend::Simulated => simulated_drivers(config),
        Backend::Linux => linux_drivers(config),
    }
}

fn simulated_drivers(config: &SensorConfig) -> SensorDrivers {
    let faults = sim::FaultInjector::new(config.fault_rate);
    let timeout = config.ultrasonic.timeout();

    SensorDrivers {
        gps: Ok(boxed(Gps::new(BufReader::new(sim::SimNmeaStream::new(faults))))),
        imu: Imu::new(sim::SimImuBus::new(faults)).map(boxed),
        ultrasonic: Ok(boxed(Ultrasonic::new(PulseEcho::new(sim::SimEchoPins::new(faults), timeout)))),
        pulse_ox: PulseOximeter::new(sim::SimPulseOxBus::new(faults)).map(boxed),
    }
}

fn linux_drivers(config: &SensorConfig) -> SensorDrivers {
    let pins = &config.ultrasonic;

    SensorDrivers {
        gps: linux::open_serial(&config.gps_device, config.gps_timeout()).map(|port| boxed(Gps::new(port))),
        imu: Err(linux::no_i2c_backend(MPU6050_ADDRESS)),
        ultrasonic: linux::SysfsPins::open(pins.trigger_pin, pins.echo_pin)
            .map(|io| boxed(Ultrasonic::new(PulseEcho::new(io, pins.timeout())))),
        pulse_ox: Err(linux::no_i2c_backend(MAX30100_ADDRESS)),
    }
}
