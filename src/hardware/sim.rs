// src/hardware/sim.rs

//! Simulated devices for running the walker without hardware. Each device
//! behaves like the real part on its bus and can inject faults at a fixed
//! probability per transaction.

use std::io::{self, Read};
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::SensorError;
use crate::hardware::{EchoPins, RegisterBus};
use crate::sensor::gps::{with_checksum, MAX_LINES_PER_READ};
use crate::sensor::imu::{ACCEL_LSB_PER_G, ACCEL_XOUT_H, PWR_MGMT_1};
use crate::sensor::pulse_ox::{FIFO_DATA, MODE_CONFIG};
use crate::sensor::ultrasonic::SOUND_CM_PER_S;

const HOME_LAT: f64 = 12.9649;
const HOME_LON: f64 = 77.7126;

#[derive(Debug, Clone, Copy)]
pub struct FaultInjector {
    rate: f64,
}

impl FaultInjector {
    pub fn new(rate: f64) -> Self {
        Self { rate: rate.clamp(0.0, 1.0) }
    }

    pub fn trip(&self, rng: &mut impl Rng) -> bool {
        self.rate > 0.0 && rng.random_bool(self.rate)
    }
}

fn seeded() -> StdRng {
    StdRng::from_rng(&mut rand::rng())
}

/// NMEA receiver wandering around the home position. A fault is a burst of
/// no-fix sentences long enough to fail one driver read.
pub struct SimNmeaStream {
    rng: StdRng,
    faults: FaultInjector,
    pending: Vec<u8>,
    cursor: usize,
    no_fix_lines: usize,
    sentences: u64,
}

impl SimNmeaStream {
    pub fn new(faults: FaultInjector) -> Self {
        Self {
            rng: seeded(),
            faults,
            pending: Vec::new(),
            cursor: 0,
            no_fix_lines: 0,
            sentences: 0,
        }
    }

    fn next_sentence(&mut self) -> String {
        self.sentences += 1;
        let time = Utc::now().format("%H%M%S");

        if self.no_fix_lines == 0 && self.faults.trip(&mut self.rng) {
            self.no_fix_lines = MAX_LINES_PER_READ;
        }
        if self.no_fix_lines > 0 {
            self.no_fix_lines -= 1;
            return with_checksum(&format!("GPGGA,{time},,,,,0,00,,,M,,M,,"));
        }

        if self.sentences % 3 == 0 {
            return with_checksum("GPGSV,3,1,11,03,03,111,00,04,15,270,00,06,01,010,00,13,06,292,00");
        }

        let lat = HOME_LAT + (self.rng.random::<f64>() - 0.5) * 0.0001;
        let lon = HOME_LON + (self.rng.random::<f64>() - 0.5) * 0.0001;
        let (lat, ns) = nmea_coordinate(lat, 2, 'N', 'S');
        let (lon, ew) = nmea_coordinate(lon, 3, 'E', 'W');
        with_checksum(&format!("GPGGA,{time},{lat},{ns},{lon},{ew},1,08,0.9,545.4,M,46.9,M,,"))
    }
}

impl Read for SimNmeaStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cursor >= self.pending.len() {
            self.pending = self.next_sentence().into_bytes();
            self.cursor = 0;
        }
        let n = buf.len().min(self.pending.len() - self.cursor);
        buf[..n].copy_from_slice(&self.pending[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(n)
    }
}

fn nmea_coordinate(value: f64, degree_digits: usize, positive: char, negative: char) -> (String, char) {
    let hemisphere = if value < 0.0 { negative } else { positive };
    let abs = value.abs();
    let degrees = abs.trunc();
    let minutes = (abs - degrees) * 60.0;
    (
        format!("{:0width$}{:07.4}", degrees as u32, minutes, width = degree_digits),
        hemisphere,
    )
}

/// MPU-6050 at walking pace: about 1.1g with the occasional jolt.
pub struct SimImuBus {
    rng: StdRng,
    faults: FaultInjector,
    awake: bool,
}

impl SimImuBus {
    pub fn new(faults: FaultInjector) -> Self {
        Self { rng: seeded(), faults, awake: false }
    }

    fn sample(&mut self) -> [f64; 3] {
        let mut g = 1.1 + (self.rng.random::<f64>() - 0.5) * 0.3;
        if self.rng.random_bool(0.1) {
            g += 0.5;
        }
        let tilt = self.rng.random_range(0.0..0.2_f64);
        let heading = self.rng.random_range(0.0..std::f64::consts::TAU);
        [
            g * tilt.sin() * heading.cos(),
            g * tilt.sin() * heading.sin(),
            g * tilt.cos(),
        ]
    }
}

impl RegisterBus for SimImuBus {
    fn write_byte(&mut self, register: u8, value: u8) -> Result<(), SensorError> {
        if register == PWR_MGMT_1 {
            self.awake = value & 0x40 == 0;
        }
        Ok(())
    }

    fn read_byte(&mut self, _register: u8) -> Result<u8, SensorError> {
        Ok(0)
    }

    fn read_block(&mut self, register: u8, buf: &mut [u8]) -> Result<(), SensorError> {
        if !self.awake {
            return Err(SensorError::Bus("imu asleep".into()));
        }
        if register != ACCEL_XOUT_H || buf.len() < 6 {
            return Err(SensorError::Bus(format!("unsupported read at 0x{register:02x}")));
        }
        if self.faults.trip(&mut self.rng) {
            return Err(SensorError::Bus("imu nack".into()));
        }
        for (chunk, g) in buf.chunks_mut(2).zip(self.sample()) {
            let raw = (g * ACCEL_LSB_PER_G).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
            chunk.copy_from_slice(&raw.to_be_bytes());
        }
        Ok(())
    }
}

/// MAX30100 whose IR channel encodes a resting heart rate of about 85 bpm.
pub struct SimPulseOxBus {
    rng: StdRng,
    faults: FaultInjector,
    regs: [u8; 256],
}

impl SimPulseOxBus {
    pub fn new(faults: FaultInjector) -> Self {
        Self { rng: seeded(), faults, regs: [0; 256] }
    }
}

impl RegisterBus for SimPulseOxBus {
    fn write_byte(&mut self, register: u8, value: u8) -> Result<(), SensorError> {
        self.regs[register as usize] = value;
        Ok(())
    }

    fn read_byte(&mut self, register: u8) -> Result<u8, SensorError> {
        Ok(self.regs[register as usize])
    }

    fn read_block(&mut self, register: u8, buf: &mut [u8]) -> Result<(), SensorError> {
        if register != FIFO_DATA || buf.len() < 4 {
            return Err(SensorError::Bus(format!("unsupported read at 0x{register:02x}")));
        }
        if self.faults.trip(&mut self.rng) {
            return Err(SensorError::Bus("pulse oximeter nack".into()));
        }
        // Mode bits 0 mean the part is shut down and the FIFO stays empty.
        if self.regs[MODE_CONFIG as usize] & 0x07 == 0 {
            buf[..4].fill(0);
            return Ok(());
        }
        let hr: u16 = 85u16.saturating_add_signed(self.rng.random_range(-4..=4));
        let ir = self.rng.random_range(200u16..2000) * 20 + (hr - 70);
        let red = (f64::from(ir) * self.rng.random_range(0.85..0.95)) as u16;
        buf[..2].copy_from_slice(&ir.to_be_bytes());
        buf[2..4].copy_from_slice(&red.to_be_bytes());
        Ok(())
    }
}

/// HC-SR04 in front of a walker: the obstacle distance drifts, sometimes
/// jumps close or out of range. A fault swallows the echo entirely.
pub struct SimEchoPins {
    rng: StdRng,
    faults: FaultInjector,
    distance_cm: f64,
    jump_rate: f64,
    trigger_high: bool,
    echo: Option<(Instant, Instant)>,
}

impl SimEchoPins {
    pub fn new(faults: FaultInjector) -> Self {
        Self {
            rng: seeded(),
            faults,
            distance_cm: 180.0,
            jump_rate: 0.05,
            trigger_high: false,
            echo: None,
        }
    }

    fn fire(&mut self) {
        if self.faults.trip(&mut self.rng) {
            self.echo = None;
            return;
        }
        self.distance_cm += self.rng.random_range(-15.0..15.0);
        if self.rng.random_bool(self.jump_rate) {
            self.distance_cm = self.rng.random_range(20.0..150.0);
        } else if self.rng.random_bool(self.jump_rate) {
            self.distance_cm = self.rng.random_range(300.0..450.0);
        }
        self.distance_cm = self.distance_cm.clamp(5.0, 450.0);

        let start = Instant::now() + Duration::from_micros(200);
        let width = Duration::from_secs_f64(self.distance_cm / SOUND_CM_PER_S);
        self.echo = Some((start, start + width));
    }
}

impl EchoPins for SimEchoPins {
    fn set_trigger(&mut self, high: bool) -> Result<(), SensorError> {
        if self.trigger_high && !high {
            self.fire();
        }
        self.trigger_high = high;
        Ok(())
    }

    fn echo_high(&mut self) -> Result<bool, SensorError> {
        let now = Instant::now();
        Ok(matches!(self.echo, Some((start, end)) if now >= start && now < end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::gps::{parse_position, Gps};
    use crate::sensor::imu::Imu;
    use crate::sensor::pulse_ox::PulseOximeter;
    use crate::sensor::ultrasonic::{PulseEcho, Ultrasonic};
    use crate::sensor::SensorDriver;
    use std::io::BufReader;

    #[test]
    fn coordinates_round_trip_through_nmea() {
        let (lat, ns) = nmea_coordinate(12.9649, 2, 'N', 'S');
        let (lon, ew) = nmea_coordinate(-77.7126, 3, 'E', 'W');
        assert_eq!((lat.as_str(), ns), ("1257.8940", 'N'));
        assert_eq!((lon.as_str(), ew), ("07742.7560", 'W'));
        let line = with_checksum(&format!("GPGGA,000000,{lat},{ns},{lon},{ew},1,08,0.9,1,M,1,M,,"));
        let fix = parse_position(&line).unwrap();
        assert!((fix.lon + 77.7126).abs() < 1e-6);
    }

    #[test]
    fn healthy_devices_produce_live_readings() {
        let none = FaultInjector::new(0.0);

        let mut gps = Gps::new(BufReader::new(SimNmeaStream::new(none)));
        let fix = gps.read().unwrap().unwrap();
        assert!((fix.lat - HOME_LAT).abs() < 0.001);

        let mut imu = Imu::new(SimImuBus::new(none)).unwrap();
        let g = imu.read().unwrap().unwrap().g_magnitude;
        assert!((0.9..1.8).contains(&g));

        let mut oximeter = PulseOximeter::new(SimPulseOxBus::new(none)).unwrap();
        let vitals = oximeter.read().unwrap().unwrap();
        assert!((81..=89).contains(&vitals.hr));
    }

    #[test]
    fn echo_simulation_follows_trigger_protocol() {
        let mut pins = SimEchoPins::new(FaultInjector::new(0.0));
        pins.jump_rate = 0.0;
        let mut ranger = Ultrasonic::new(PulseEcho::new(pins, Duration::from_millis(100)));
        let range = ranger.read().unwrap().unwrap();
        assert!((150.0..220.0).contains(&range.front_cm));
    }

    #[test]
    fn certain_faults_fail_every_read() {
        let always = FaultInjector::new(1.0);

        let mut gps = Gps::new(BufReader::new(SimNmeaStream::new(always)));
        assert!(gps.read().is_err());

        let mut imu = Imu::new(SimImuBus::new(always)).unwrap();
        assert!(imu.read().is_err());

        let mut oximeter = PulseOximeter::new(SimPulseOxBus::new(always)).unwrap();
        assert!(oximeter.read().is_err());

        let mut ranger = Ultrasonic::new(PulseEcho::new(SimEchoPins::new(always), Duration::from_millis(5)));
        assert!(ranger.read().is_err());
    }
}
