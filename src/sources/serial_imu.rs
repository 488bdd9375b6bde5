//! Serial IMU head tracker source
//!
//! Reads a WitMotion-family IMU strapped to the headphone band. Frame
//! format (11 bytes): `[0x55] [ID] [8-byte payload] [CHECKSUM]`, checksum
//! is the low byte of the sum of the first 10 bytes. Two frame IDs matter
//! here:
//!
//! - `0x59` orientation quaternion: 4 × i16 LE in w,x,y,z order, scale
//!   1/32768
//! - `0x52` angular velocity: 3 × i16 LE, full scale ±2000 °/s, trailing
//!   word unused
//!
//! A motion sample is emitted per orientation frame, carrying the most
//! recent angular-rate frame seen so far.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::core::source::{MotionSource, SampleCallback};
use crate::core::types::{now_epoch_ms, MotionSample, Quaternion, SensorLocation};
use crate::error::{Error, Result};

/// Frame sync byte
pub const FRAME_SYNC: u8 = 0x55;
/// Full frame size including sync and checksum
pub const FRAME_LEN: usize = 11;
/// Angular velocity frame ID
pub const FRAME_ID_ANGULAR_RATE: u8 = 0x52;
/// Orientation quaternion frame ID
pub const FRAME_ID_ORIENTATION: u8 = 0x59;

/// Angular rate full scale in °/s (i16 range maps to ±2000)
const RATE_FULL_SCALE_DEG: f32 = 2000.0;
/// Quaternion component scale (i16 range maps to ±1)
const QUAT_SCALE: f32 = 1.0 / 32768.0;

/// Port read timeout; bounds shutdown latency, not the sample rate
const READ_TIMEOUT: Duration = Duration::from_millis(20);

/// Serial head tracker settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Serial port path
    pub serial_port: String,
    /// Baud rate
    pub baud: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyUSB0".to_string(),
            baud: 115_200,
        }
    }
}

/// One decoded tracker frame
#[derive(Debug, Clone, Copy, PartialEq)]
enum TrackerFrame {
    /// Body-frame angular velocity, rad/s
    AngularRate([f32; 3]),
    Orientation(Quaternion),
}

fn read_i16(payload: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([payload[offset], payload[offset + 1]])
}

/// Scan `buf` for the next frame.
///
/// Returns the number of leading bytes to discard and the frame decoded at
/// that position, if any. `(0, None)` means the buffer holds no complete
/// frame yet and nothing can be discarded.
fn extract_frame(buf: &[u8]) -> (usize, Option<TrackerFrame>) {
    let Some(sync_at) = buf.iter().position(|&b| b == FRAME_SYNC) else {
        // Pure garbage, drop it all
        return (buf.len(), None);
    };

    if buf.len() - sync_at < FRAME_LEN {
        // Incomplete frame; drop only the garbage ahead of the sync byte
        return (sync_at, None);
    }

    let frame = &buf[sync_at..sync_at + FRAME_LEN];
    let checksum: u8 = frame[..FRAME_LEN - 1]
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b));
    if checksum != frame[FRAME_LEN - 1] {
        // Corrupt or false sync; resume the scan one byte further on
        return (sync_at + 1, None);
    }

    let payload = &frame[2..FRAME_LEN - 1];
    let decoded = match frame[1] {
        FRAME_ID_ANGULAR_RATE => {
            let to_rad_s = |raw: i16| {
                (raw as f32 * QUAT_SCALE * RATE_FULL_SCALE_DEG).to_radians()
            };
            Some(TrackerFrame::AngularRate([
                to_rad_s(read_i16(payload, 0)),
                to_rad_s(read_i16(payload, 2)),
                to_rad_s(read_i16(payload, 4)),
            ]))
        }
        FRAME_ID_ORIENTATION => {
            let w = read_i16(payload, 0) as f32 * QUAT_SCALE;
            let x = read_i16(payload, 2) as f32 * QUAT_SCALE;
            let y = read_i16(payload, 4) as f32 * QUAT_SCALE;
            let z = read_i16(payload, 6) as f32 * QUAT_SCALE;
            Some(TrackerFrame::Orientation(Quaternion::new(x, y, z, w)))
        }
        // Other frame kinds (acceleration, angles, ...) are valid but unused
        _ => None,
    };

    (sync_at + FRAME_LEN, decoded)
}

/// Incremental frame decoder with rate/orientation pairing.
///
/// Owns the carry-over byte buffer between serial reads so partial frames
/// survive chunk boundaries.
struct FrameAssembler {
    acc: Vec<u8>,
    last_rate: Option<[f32; 3]>,
}

impl FrameAssembler {
    fn new() -> Self {
        Self {
            acc: Vec::with_capacity(256),
            last_rate: None,
        }
    }

    /// Feed raw serial bytes, emitting one sample per orientation frame
    fn push<F: FnMut(MotionSample)>(&mut self, bytes: &[u8], mut emit: F) {
        self.acc.extend_from_slice(bytes);
        loop {
            let (consumed, frame) = extract_frame(&self.acc);
            if consumed == 0 {
                break;
            }
            self.acc.drain(..consumed);
            match frame {
                Some(TrackerFrame::AngularRate(rate)) => self.last_rate = Some(rate),
                Some(TrackerFrame::Orientation(quat)) => emit(MotionSample {
                    quat,
                    timestamp_ms: now_epoch_ms(),
                    angular_rate: self.last_rate,
                    location: SensorLocation::Unknown,
                }),
                None => {}
            }
        }
    }
}

/// Drops samples arriving faster than the configured ceiling.
///
/// Trackers commonly report at 200 Hz while the engine only wants 60; the
/// 0.9 factor tolerates sensor timing wobble so a slightly-early sample
/// does not halve the effective rate.
struct RateGate {
    min_interval: Option<Duration>,
    last: Option<Instant>,
}

impl RateGate {
    fn new(max_rate_hz: u32) -> Self {
        let min_interval = if max_rate_hz > 0 {
            Some(Duration::from_secs_f64(0.9 / max_rate_hz as f64))
        } else {
            None
        };
        Self {
            min_interval,
            last: None,
        }
    }

    fn admit(&mut self) -> bool {
        if let Some(min) = self.min_interval
            && let Some(last) = self.last
            && last.elapsed() < min
        {
            return false;
        }
        self.last = Some(Instant::now());
        true
    }
}

/// Motion source reading a serial-attached IMU head tracker.
///
/// Construction is cheap and never touches hardware; `start` opens the
/// port and reports [`Error::SourceUnavailable`] with the OS reason when it
/// cannot (absent device, permissions, port in use). Delivery is capped at
/// `max_rate_hz` samples per second (0 = uncapped).
pub struct SerialImuSource {
    config: DeviceConfig,
    max_rate_hz: u32,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SerialImuSource {
    pub fn new(config: DeviceConfig, max_rate_hz: u32) -> Self {
        Self {
            config,
            max_rate_hz,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

impl MotionSource for SerialImuSource {
    fn start(&mut self, callback: SampleCallback) -> Result<()> {
        if self.handle.is_some() {
            return Err(Error::Config("serial IMU source already started".to_string()));
        }

        let port = serialport::new(&self.config.serial_port, self.config.baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| Error::SourceUnavailable {
                reason: format!("cannot open {}: {}", self.config.serial_port, e),
            })?;

        info!(
            "✓ Serial IMU head tracker on {} at {} baud",
            self.config.serial_port, self.config.baud
        );

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let max_rate_hz = self.max_rate_hz;
        let handle = thread::Builder::new()
            .name("serial-imu".to_string())
            .spawn(move || reader_loop(port, running, max_rate_hz, callback))?;
        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            debug!("serial IMU source stopped");
        }
    }

    fn name(&self) -> &'static str {
        "serial_imu"
    }

    fn is_active(&self) -> bool {
        self.handle.is_some() && self.running.load(Ordering::SeqCst)
    }
}

impl Drop for SerialImuSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn reader_loop(
    mut port: Box<dyn SerialPort>,
    running: Arc<AtomicBool>,
    max_rate_hz: u32,
    mut callback: SampleCallback,
) {
    let mut assembler = FrameAssembler::new();
    let mut gate = RateGate::new(max_rate_hz);
    let mut chunk = [0u8; 64];

    while running.load(Ordering::Relaxed) {
        let n = match port.read(&mut chunk) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => 0,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => 0,
            Err(e) => {
                warn!("serial IMU read error, stopping capture: {}", e);
                break;
            }
        };
        if n == 0 {
            continue;
        }
        assembler.push(&chunk[..n], |sample| {
            if gate.admit() {
                callback(sample);
            }
        });
    }
}
