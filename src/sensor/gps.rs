// src/sensor/gps.rs

use std::io::BufRead;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::SensorError;
use crate::sensor::SensorDriver;
use crate::sensor_data::GpsFix;

pub const MAX_LINES_PER_READ: usize = 10;

/// NMEA receiver on a line-oriented stream.
pub struct Gps<R> {
    reader: R,
    line: Vec<u8>,
}

impl<R: BufRead + Send> Gps<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, line: Vec::with_capacity(96) }
    }
}

impl<R: BufRead + Send> SensorDriver for Gps<R> {
    type Output = GpsFix;

    fn read(&mut self) -> Result<Option<GpsFix>, SensorError> {
        for _ in 0..MAX_LINES_PER_READ {
            self.line.clear();
            self.reader.read_until(b'\n', &mut self.line)?;
            let text = String::from_utf8_lossy(&self.line);
            if let Some(fix) = parse_position(&text) {
                return Ok(Some(fix));
            }
        }
        Err(SensorError::NoFix(MAX_LINES_PER_READ))
    }
}

/// Extracts a position from a `$GPGGA` or `$GPRMC` sentence. Any other
/// sentence, a bad checksum, empty fields or a zero latitude yields `None`.
pub fn parse_position(sentence: &str) -> Option<GpsFix> {
    let sentence = sentence.trim();
    let body = sentence.strip_prefix('$')?;
    let body = match body.split_once('*') {
        Some((payload, checksum)) => {
            if !checksum_matches(payload, checksum) {
                return None;
            }
            payload
        }
        None => body,
    };

    let fields: Vec<&str> = body.split(',').collect();
    let (lat_at, lon_at) = match fields[0] {
        "GPGGA" => (2, 4),
        "GPRMC" => (3, 5),
        _ => return None,
    };

    let lat = coordinate(fields.get(lat_at)?, fields.get(lat_at + 1)?, 2)?;
    let lon = coordinate(fields.get(lon_at)?, fields.get(lon_at + 1)?, 3)?;
    // Receivers without a fix report latitude 0, often with a stale longitude.
    if lat == 0.0 {
        return None;
    }
    Some(GpsFix { lat, lon })
}

fn checksum_matches(payload: &str, checksum: &str) -> bool {
    let expected = payload.bytes().fold(0u8, |acc, b| acc ^ b);
    u8::from_str_radix(checksum.trim(), 16).map_or(false, |given| given == expected)
}

/// `ddmm.mmmm` / `dddmm.mmmm` plus hemisphere to signed decimal degrees.
fn coordinate(value: &str, hemisphere: &str, degree_digits: usize) -> Option<f64> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{2,3}?)(\d{2}(?:\.\d+)?)$").expect("coordinate pattern is valid")
    });

    let caps = pattern.captures(value)?;
    if caps[1].len() != degree_digits {
        return None;
    }
    let degrees: f64 = caps[1].parse().ok()?;
    let minutes: f64 = caps[2].parse().ok()?;
    let unsigned = degrees + minutes / 60.0;

    match hemisphere {
        "N" | "E" => Some(unsigned),
        "S" | "W" => Some(-unsigned),
        _ => None,
    }
}

/// Formats a sentence body with its checksum, e.g. for simulated receivers.
pub fn with_checksum(payload: &str) -> String {
    let checksum = payload.bytes().fold(0u8, |acc, b| acc ^ b);
    format!("${payload}*{checksum:02X}\r\n")
}
