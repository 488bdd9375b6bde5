//! Motion source implementations
//!
//! Sources hide behind the [`MotionSource`] trait; the rest of the
//! companion never branches on which one is running.

pub mod serial_imu;
pub mod synthetic;

pub use serial_imu::{DeviceConfig, SerialImuSource};
pub use synthetic::{SyntheticConfig, SyntheticSource};

use crate::config::{AppConfig, SourceMode};
use crate::core::source::MotionSource;

/// Build the configured motion source.
///
/// Construction never fails and never touches hardware; availability is
/// checked in `start`.
pub fn create_source(config: &AppConfig) -> Box<dyn MotionSource> {
    match config.telemetry.mode {
        SourceMode::Synthetic => Box::new(SyntheticSource::new(
            config.synthetic.clone(),
            config.telemetry.hz,
        )),
        SourceMode::Device => Box::new(SerialImuSource::new(
            config.device.clone(),
            config.telemetry.hz,
        )),
    }
}
