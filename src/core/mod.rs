//! Core motion types and the source trait

pub mod source;
pub mod types;

pub use source::{MotionSource, SampleCallback};
pub use types::{now_epoch_ms, MotionSample, Quaternion, SensorLocation};
