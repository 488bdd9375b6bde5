//! LocusQ Companion - head-pose telemetry bridge for the LocusQ spatial audio engine
//!
//! # Architecture
//!
//! The crate is organized into 4 logical layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      bin/                           │  ← Executables
//! │        (locusq-companion, locusq_profile)           │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                 app / pipeline                      │  ← Orchestration
//! │        (runtime wiring, sequenced streaming)        │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌──────────────────────────┬──────────────────────────┐
//! │    sources / streaming   │  profile / headphones /  │  ← I/O
//! │  (IMU + synthetic poses, │         matching         │
//! │    wire codec, UDP)      │   (calibration state)    │
//! └──────────────────────────┴──────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                      core/                          │  ← Foundation
//! │            (types, MotionSource trait)              │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Data flow
//!
//! A [`MotionSource`] (synthetic orbit generator or serial head-tracker)
//! pushes [`MotionSample`]s into the [`TelemetryPipeline`], which assigns
//! sequence numbers, encodes each sample as a [`PosePacket`], and fires it
//! over UDP toward the audio engine. Calibration state lives beside the
//! stream: a JSON [`CalibrationProfile`] persisted at well-known paths and
//! an HRTF subject matcher that picks a measured profile from a listener
//! photo.

// ============================================================================
// Foundation (no internal deps)
// ============================================================================
pub mod core;
pub mod error;

// ============================================================================
// Configuration
// ============================================================================
pub mod config;

// ============================================================================
// I/O: motion sources, wire codec, UDP transport
// ============================================================================
pub mod sources;
pub mod streaming;

// ============================================================================
// Calibration: profile persistence, headphone detection, HRTF matching
// ============================================================================
pub mod headphones;
pub mod matching;
pub mod profile;

// ============================================================================
// Orchestration
// ============================================================================
pub mod app;
pub mod pipeline;

// ============================================================================
// Convenience re-exports (flat namespace for common use)
// ============================================================================

// Core types
pub use core::{MotionSample, MotionSource, Quaternion, SampleCallback, SensorLocation};

// Errors
pub use error::{Error, Result};

// Configuration
pub use config::{AppConfig, SourceMode, TelemetryConfig};

// Sources
pub use sources::{DeviceConfig, SerialImuSource, SyntheticConfig, SyntheticSource, create_source};

// Streaming
pub use streaming::{PosePacket, PoseV1, PoseV2, UdpPoseSender, WireVersion};

// Calibration
pub use headphones::DetectedHeadphone;
pub use matching::{SubjectEmbeddingEntry, SubjectMatch, SubjectMatcher};
pub use profile::{CalibrationProfile, ProfileStore};

// Orchestration
pub use app::{CompanionApp, RunReport, StopReason};
pub use pipeline::{PipelineStats, SendFailure, TelemetryPipeline};
