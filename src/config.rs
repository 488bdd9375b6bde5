//! Companion configuration
//!
//! Settings layer in three stages: built-in defaults, then an optional
//! TOML file, then CLI flags on top. The binaries own flag parsing; this
//! module owns the document shape, file loading, and validation.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sources::{DeviceConfig, SyntheticConfig};
use crate::streaming::WireVersion;

/// Which motion source the companion runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    #[default]
    Synthetic,
    Device,
}

impl SourceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceMode::Synthetic => "synthetic",
            SourceMode::Device => "device",
        }
    }
}

/// Destination, pacing, and wire settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub mode: SourceMode,
    /// Destination host; must be an IPv4 literal
    pub host: String,
    /// Destination UDP port
    pub port: u16,
    /// Target sample/send rate
    pub hz: u32,
    /// Run duration in seconds; 0 runs until a stop signal
    pub seconds: u64,
    /// Outgoing packet layout (1 or 2)
    pub wire_version: u32,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            mode: SourceMode::Synthetic,
            host: "127.0.0.1".to_string(),
            port: 19765,
            hz: 60,
            seconds: 0,
            wire_version: 2,
        }
    }
}

/// Top-level companion configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub telemetry: TelemetryConfig,
    pub synthetic: SyntheticConfig,
    pub device: DeviceConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Typed wire version, rejecting numbers this build does not emit
    pub fn wire_version(&self) -> Result<WireVersion> {
        WireVersion::from_u32(self.telemetry.wire_version).ok_or_else(|| {
            Error::Config(format!(
                "unsupported wire version {} (expected 1 or 2)",
                self.telemetry.wire_version
            ))
        })
    }

    /// Cross-field validation, run once after all layers are applied
    pub fn validate(&self) -> Result<()> {
        if self.telemetry.hz == 0 {
            return Err(Error::Config("hz must be positive".to_string()));
        }
        self.wire_version()?;

        let synth = &self.synthetic;
        if !(synth.yaw_frequency_hz > 0.0) || !synth.yaw_frequency_hz.is_finite() {
            return Err(Error::Config(format!(
                "yaw frequency must be positive, got {}",
                synth.yaw_frequency_hz
            )));
        }
        if !(synth.jitter_stddev_deg >= 0.0) || !synth.jitter_stddev_deg.is_finite() {
            return Err(Error::Config(format!(
                "jitter stddev must be non-negative, got {}",
                synth.jitter_stddev_deg
            )));
        }

        if self.device.baud == 0 {
            return Err(Error::Config("baud rate must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.telemetry.mode, SourceMode::Synthetic);
        assert_eq!(config.telemetry.host, "127.0.0.1");
        assert_eq!(config.telemetry.port, 19765);
        assert_eq!(config.telemetry.hz, 60);
        assert_eq!(config.telemetry.seconds, 0);
        assert_eq!(config.telemetry.wire_version, 2);
        assert_eq!(config.synthetic.yaw_amplitude_deg, 35.0);
        assert_eq!(config.synthetic.pitch_amplitude_deg, 10.0);
        assert_eq!(config.synthetic.roll_amplitude_deg, 5.0);
        assert_eq!(config.synthetic.yaw_frequency_hz, 0.25);
        assert_eq!(config.device.serial_port, "/dev/ttyUSB0");
        assert_eq!(config.device.baud, 115_200);
        config.validate().unwrap();
    }

    #[test]
    fn test_toml_serialization_has_all_sections() {
        let toml_string = toml::to_string_pretty(&AppConfig::default()).unwrap();
        assert!(toml_string.contains("[telemetry]"));
        assert!(toml_string.contains("[synthetic]"));
        assert!(toml_string.contains("[device]"));
        assert!(toml_string.contains("port = 19765"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml_content = r#"
[telemetry]
mode = "device"
port = 20000

[device]
serial_port = "/dev/ttyACM0"
"#;
        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.telemetry.mode, SourceMode::Device);
        assert_eq!(config.telemetry.port, 20000);
        // Untouched keys keep their defaults
        assert_eq!(config.telemetry.host, "127.0.0.1");
        assert_eq!(config.telemetry.hz, 60);
        assert_eq!(config.device.serial_port, "/dev/ttyACM0");
        assert_eq!(config.device.baud, 115_200);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.telemetry.hz = 0;
        assert!(config.validate().is_err(), "hz 0 must be rejected");

        let mut config = AppConfig::default();
        config.telemetry.wire_version = 3;
        assert!(config.validate().is_err(), "wire version 3 must be rejected");

        let mut config = AppConfig::default();
        config.synthetic.yaw_frequency_hz = 0.0;
        assert!(config.validate().is_err(), "zero frequency must be rejected");

        let mut config = AppConfig::default();
        config.synthetic.jitter_stddev_deg = -0.5;
        assert!(config.validate().is_err(), "negative jitter must be rejected");

        let mut config = AppConfig::default();
        config.device.baud = 0;
        assert!(config.validate().is_err(), "baud 0 must be rejected");
    }

    #[test]
    fn test_wire_version_mapping() {
        let mut config = AppConfig::default();
        assert_eq!(config.wire_version().unwrap(), WireVersion::V2);
        config.telemetry.wire_version = 1;
        assert_eq!(config.wire_version().unwrap(), WireVersion::V1);
    }
}
