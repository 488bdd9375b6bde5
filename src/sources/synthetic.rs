//! Synthetic head-motion generator
//!
//! Produces a smooth listening-test orbit without any hardware attached:
//! a slow yaw sweep with smaller pitch and roll components at related
//! frequencies. With jitter disabled (the default) the angle sequence is a
//! pure function of the tick index, which keeps end-to-end tests
//! deterministic.

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::core::source::{MotionSource, SampleCallback};
use crate::core::types::{now_epoch_ms, MotionSample, Quaternion, SensorLocation};
use crate::error::{Error, Result};

/// Synthetic orbit parameters. The sample rate is a telemetry-level
/// setting and arrives separately at construction.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Peak yaw excursion, degrees
    pub yaw_amplitude_deg: f64,
    /// Peak pitch excursion, degrees
    pub pitch_amplitude_deg: f64,
    /// Peak roll excursion, degrees
    pub roll_amplitude_deg: f64,
    /// Yaw cycle frequency, Hz; pitch runs at half and roll at a quarter
    /// of this
    pub yaw_frequency_hz: f64,
    /// Gaussian angle noise, degrees (0 disables jitter)
    pub jitter_stddev_deg: f64,
    /// Jitter RNG seed; 0 seeds from entropy
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            yaw_amplitude_deg: 35.0,
            pitch_amplitude_deg: 10.0,
            roll_amplitude_deg: 5.0,
            yaw_frequency_hz: 0.25,
            jitter_stddev_deg: 0.0,
            seed: 0,
        }
    }
}

/// Euler angles of the orbit at elapsed time `t` seconds, in degrees
/// (yaw, pitch, roll)
fn orbit_angles(config: &SyntheticConfig, t: f64) -> (f64, f64, f64) {
    let yaw = config.yaw_amplitude_deg * (TAU * config.yaw_frequency_hz * t).sin();
    let pitch = config.pitch_amplitude_deg * (TAU * 0.5 * config.yaw_frequency_hz * t).sin();
    let roll = config.roll_amplitude_deg * (TAU * 0.25 * config.yaw_frequency_hz * t).cos();
    (yaw, pitch, roll)
}

/// Analytic time derivative of the orbit at `t`, mapped onto body axes
/// (x=roll, y=pitch, z=yaw) in rad/s.
///
/// Euler rates stand in for true body rates here; at the default
/// pitch/roll amplitudes the difference is within a few percent.
fn orbit_rates(config: &SyntheticConfig, t: f64) -> [f32; 3] {
    let w_yaw = TAU * config.yaw_frequency_hz;
    let w_pitch = TAU * 0.5 * config.yaw_frequency_hz;
    let w_roll = TAU * 0.25 * config.yaw_frequency_hz;

    let yaw_dot = config.yaw_amplitude_deg * w_yaw * (w_yaw * t).cos();
    let pitch_dot = config.pitch_amplitude_deg * w_pitch * (w_pitch * t).cos();
    let roll_dot = -config.roll_amplitude_deg * w_roll * (w_roll * t).sin();

    [
        roll_dot.to_radians() as f32,
        pitch_dot.to_radians() as f32,
        yaw_dot.to_radians() as f32,
    ]
}

/// Motion source backed by the orbit generator.
///
/// `start` spawns a worker thread that paces samples against an absolute
/// schedule (start instant + tick / rate), so the long-run sample rate does
/// not drift with per-tick sleep error.
pub struct SyntheticSource {
    config: SyntheticConfig,
    rate_hz: u32,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig, rate_hz: u32) -> Self {
        Self {
            config,
            rate_hz,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

impl MotionSource for SyntheticSource {
    fn start(&mut self, callback: SampleCallback) -> Result<()> {
        if self.handle.is_some() {
            return Err(Error::Config("synthetic source already started".to_string()));
        }
        if self.rate_hz == 0 {
            return Err(Error::Config("synthetic rate must be positive".to_string()));
        }

        self.running.store(true, Ordering::SeqCst);
        let config = self.config.clone();
        let rate_hz = self.rate_hz;
        let running = Arc::clone(&self.running);

        let handle = thread::Builder::new()
            .name("synthetic-motion".to_string())
            .spawn(move || generator_loop(config, rate_hz, running, callback))?;
        self.handle = Some(handle);

        info!(
            "✓ Synthetic motion source started ({} Hz, yaw ±{}° @ {} Hz)",
            self.rate_hz, self.config.yaw_amplitude_deg, self.config.yaw_frequency_hz
        );
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            debug!("synthetic motion source stopped");
        }
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn is_active(&self) -> bool {
        self.handle.is_some() && self.running.load(Ordering::SeqCst)
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn generator_loop(
    config: SyntheticConfig,
    rate_hz: u32,
    running: Arc<AtomicBool>,
    mut callback: SampleCallback,
) {
    let interval = Duration::from_secs_f64(1.0 / rate_hz as f64);
    let mut jitter = if config.jitter_stddev_deg > 0.0 {
        Some(if config.seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(config.seed)
        })
    } else {
        None
    };

    let start = Instant::now();
    let mut tick: u64 = 0;

    while running.load(Ordering::Relaxed) {
        let target = start + interval.mul_f64(tick as f64);
        let now = Instant::now();
        if target > now {
            thread::sleep(target - now);
        }
        if !running.load(Ordering::Relaxed) {
            break;
        }

        let t = tick as f64 / rate_hz as f64;
        let (mut yaw, mut pitch, mut roll) = orbit_angles(&config, t);
        if let Some(rng) = jitter.as_mut() {
            yaw += gaussian(rng, config.jitter_stddev_deg);
            pitch += gaussian(rng, config.jitter_stddev_deg);
            roll += gaussian(rng, config.jitter_stddev_deg);
        }

        callback(MotionSample {
            quat: Quaternion::from_yaw_pitch_roll_deg(yaw, pitch, roll),
            timestamp_ms: now_epoch_ms(),
            angular_rate: Some(orbit_rates(&config, t)),
            location: SensorLocation::Unknown,
        });

        tick += 1;
    }
}

fn gaussian(rng: &mut SmallRng, stddev: f64) -> f64 {
    let normal: f64 = rng.sample(StandardNormal);
    normal * stddev
}
