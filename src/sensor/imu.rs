// src/sensor/imu.rs

use crate::error::SensorError;
use crate::hardware::RegisterBus;
use crate::sensor::SensorDriver;
use crate::sensor_data::Motion;

pub const MPU6050_ADDRESS: u8 = 0x68;
pub const PWR_MGMT_1: u8 = 0x6B;
pub const ACCEL_XOUT_H: u8 = 0x3B;
/// LSB per g at the default +-2g range.
pub const ACCEL_LSB_PER_G: f64 = 16384.0;

/// MPU-6050 accelerometer reporting the magnitude of the acceleration vector.
pub struct Imu<B> {
    bus: B,
}

impl<B: RegisterBus> Imu<B> {
    /// Wakes the device; fails if the bus does not answer.
    pub fn new(mut bus: B) -> Result<Self, SensorError> {
        bus.write_byte(PWR_MGMT_1, 0)?;
        Ok(Self { bus })
    }
}

impl<B: RegisterBus> SensorDriver for Imu<B> {
    type Output = Motion;

    fn read(&mut self) -> Result<Option<Motion>, SensorError> {
        let mut raw = [0u8; 6];
        self.bus.read_block(ACCEL_XOUT_H, &mut raw)?;

        let axis = |i: usize| i16::from_be_bytes([raw[i], raw[i + 1]]) as f64 / ACCEL_LSB_PER_G;
        let (x, y, z) = (axis(0), axis(2), axis(4));
        Ok(Some(Motion { g_magnitude: (x * x + y * y + z * z).sqrt() }))
    }
}
