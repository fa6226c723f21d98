// src/hardware/linux.rs

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use crate::error::SensorError;
use crate::hardware::EchoPins;

const GPIO_ROOT: &str = "/sys/class/gpio";

/// Lines held between ticks. A receiver at 1 Hz emits well under this.
const SERIAL_BACKLOG: usize = 32;

/// Opens a serial device that the OS has already configured (baud rate set
/// by udev or `stty`). Waits for a line never exceed `timeout`.
pub fn open_serial(path: &Path, timeout: Duration) -> Result<SerialLines, SensorError> {
    let port = File::open(path)?;
    debug!(device = %path.display(), "serial port opened");
    SerialLines::spawn(port, timeout)
}

/// Line stream fed by a dedicated reader thread, so a quiet device turns
/// into a `TimedOut` error instead of a blocked caller.
pub struct SerialLines {
    lines: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    pos: usize,
    timeout: Duration,
}

impl SerialLines {
    pub fn spawn<R: Read + Send + 'static>(port: R, timeout: Duration) -> Result<Self, SensorError> {
        let (tx, rx) = bounded(SERIAL_BACKLOG);
        thread::Builder::new()
            .name("gps-serial".into())
            .spawn(move || pump_lines(BufReader::new(port), tx))?;
        Ok(Self { lines: rx, pending: Vec::new(), pos: 0, timeout })
    }
}

fn pump_lines<R: BufRead>(mut port: R, lines: Sender<Vec<u8>>) {
    loop {
        let mut line = Vec::with_capacity(96);
        match port.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                if lines.send(line).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(error = %e, "serial read failed");
                break;
            }
        }
    }
    debug!("serial reader stopped");
}

impl Read for SerialLines {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for SerialLines {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.pending.len() {
            match self.lines.recv_timeout(self.timeout) {
                Ok(line) => {
                    self.pending = line;
                    self.pos = 0;
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "no serial data"));
                }
                // Reader gone: report end of stream.
                Err(RecvTimeoutError::Disconnected) => return Ok(&[]),
            }
        }
        Ok(&self.pending[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.pending.len());
    }
}

/// Register buses are not wired up on this backend.
pub fn no_i2c_backend(address: u8) -> SensorError {
    SensorError::Unavailable(format!("no i2c backend for device 0x{address:02x}"))
}

/// Trigger/echo pins through the sysfs GPIO interface.
pub struct SysfsPins {
    trigger: File,
    echo: File,
}

impl SysfsPins {
    pub fn open(trigger_pin: u32, echo_pin: u32) -> Result<Self, SensorError> {
        export(trigger_pin, "out")?;
        export(echo_pin, "in")?;
        Ok(Self {
            trigger: OpenOptions::new().write(true).open(pin_dir(trigger_pin).join("value"))?,
            echo: File::open(pin_dir(echo_pin).join("value"))?,
        })
    }
}

fn pin_dir(pin: u32) -> PathBuf {
    Path::new(GPIO_ROOT).join(format!("gpio{pin}"))
}

fn export(pin: u32, direction: &str) -> Result<(), SensorError> {
    let dir = pin_dir(pin);
    if !dir.exists() {
        fs::write(Path::new(GPIO_ROOT).join("export"), pin.to_string())?;
    }
    fs::write(dir.join("direction"), direction)?;
    Ok(())
}

impl EchoPins for SysfsPins {
    fn set_trigger(&mut self, high: bool) -> Result<(), SensorError> {
        self.trigger.seek(SeekFrom::Start(0))?;
        self.trigger.write_all(if high { b"1" } else { b"0" })?;
        Ok(())
    }

    fn echo_high(&mut self) -> Result<bool, SensorError> {
        let mut value = [0u8; 1];
        self.echo.seek(SeekFrom::Start(0))?;
        self.echo.read_exact(&mut value)?;
        Ok(value[0] == b'1')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::channel;
    use crate::sensor::gps::Gps;
    use crate::sensor::{boxed, SensorAcquisition, SensorDriver, SensorDrivers};
    use crate::sensor_data::SensorStatus;
    use std::os::unix::net::UnixStream;
    use std::time::Instant;

    const WAIT: Duration = Duration::from_millis(50);
    const GGA: &str = "$GPGGA,123519,1257.8940,N,07742.7560,E,1,08,0.9,545.4,M,46.9,M,,\r\n";

    #[test]
    fn serial_reads_lines_from_device_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "$GPGSV,1,1,00").unwrap();
        let mut port = open_serial(file.path(), WAIT).unwrap();
        let mut line = String::new();
        port.read_line(&mut line).unwrap();
        assert!(line.starts_with("$GPGSV"));
        line.clear();
        assert_eq!(port.read_line(&mut line).unwrap(), 0);
    }

    #[test]
    fn missing_serial_device_is_io_error() {
        assert!(matches!(open_serial(Path::new("/nonexistent/ttyS9"), WAIT), Err(SensorError::Io(_))));
    }

    #[test]
    fn silent_receiver_times_out() {
        let (_device, port) = UnixStream::pair().unwrap();
        let mut gps = Gps::new(SerialLines::spawn(port, WAIT).unwrap());

        let started = Instant::now();
        let err = gps.read().unwrap_err();
        assert!(matches!(err, SensorError::Io(ref e) if e.kind() == io::ErrorKind::TimedOut));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn receiver_that_resumes_is_read_again() {
        let (mut device, port) = UnixStream::pair().unwrap();
        let mut gps = Gps::new(SerialLines::spawn(port, WAIT).unwrap());
        assert!(gps.read().is_err());

        device.write_all(GGA.as_bytes()).unwrap();
        let fix = gps.read().unwrap().unwrap();
        assert!((fix.lat - 12.9649).abs() < 1e-6);
    }

    #[test]
    fn silent_gps_does_not_stall_acquisition() {
        let (_device, port) = UnixStream::pair().unwrap();
        let gps = Gps::new(SerialLines::spawn(port, WAIT).unwrap());
        let drivers = SensorDrivers {
            gps: Ok(boxed(gps)),
            imu: Err(no_i2c_backend(0x68)),
            ultrasonic: Err(SensorError::Unavailable("no pins".into())),
            pulse_ox: Err(no_i2c_backend(0x57)),
        };
        let (outbox, snapshots) = channel("snapshots", 5);
        let mut acquisition = SensorAcquisition::new(drivers, outbox);

        let (done_tx, done_rx) = bounded(1);
        thread::spawn(move || {
            acquisition.tick();
            let _ = done_tx.send(());
        });
        assert!(done_rx.recv_timeout(Duration::from_secs(2)).is_ok());

        let snapshot = snapshots.try_recv().unwrap();
        assert_eq!(snapshot.gps.status, SensorStatus::Simulated);
        assert_eq!(snapshot.imu.status, SensorStatus::Simulated);
    }

    #[test]
    fn i2c_devices_report_address() {
        let err = no_i2c_backend(0x68);
        assert!(err.to_string().contains("0x68"));
    }
}
