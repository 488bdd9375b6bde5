//! Headphone model detection
//!
//! Maps audio-device display names onto the profile schema's hardware
//! entries so a freshly initialized profile starts from sane defaults.
//! Matching is substring-based on lowercased names; vendors rename
//! products across firmware versions, so the needles are deliberately
//! loose.

use crate::profile::{CalibrationProfile, HeadphoneMode, HeadphoneModel};

/// Detection result for one audio output device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedHeadphone {
    pub model: HeadphoneModel,
    /// ANC state the EQ defaults assume for this hardware
    pub default_mode: HeadphoneMode,
    /// Name to show the operator; falls back to a placeholder when the
    /// device reported an empty name
    pub display_name: String,
}

impl DetectedHeadphone {
    /// Hardware families with a usable head-motion sensor
    pub fn supports_head_tracking(&self) -> bool {
        matches!(
            self.model,
            HeadphoneModel::AirpodsPro1 | HeadphoneModel::AirpodsPro2 | HeadphoneModel::AirpodsPro3
        )
    }

    /// Seed a profile's hardware defaults from this detection.
    ///
    /// Only the hardware-derived fields change: model, measurement mode,
    /// and whether tracking starts enabled. EQ and subject selection are
    /// calibration results and stay untouched.
    pub fn apply_to(&self, profile: &mut CalibrationProfile) {
        profile.headphone.hp_model_id = self.model;
        profile.headphone.hp_mode = self.default_mode;
        profile.tracking.hp_tracking_enabled = self.supports_head_tracking();
    }
}

/// Classify an audio device by its reported name
pub fn detect(device_name: &str) -> DetectedHeadphone {
    let trimmed = device_name.trim();
    let lower = trimmed.to_lowercase();

    if lower.contains("wh-1000xm5") || lower.contains("wh1000xm5") {
        return DetectedHeadphone {
            model: HeadphoneModel::SonyWh1000Xm5,
            default_mode: HeadphoneMode::AncOn,
            display_name: trimmed.to_string(),
        };
    }

    if lower.contains("airpods pro") {
        let model = if contains_any(&lower, &["3rd generation", "gen 3", "pro 3"]) {
            HeadphoneModel::AirpodsPro3
        } else if contains_any(&lower, &["2nd generation", "gen 2", "pro 2"]) {
            HeadphoneModel::AirpodsPro2
        } else {
            HeadphoneModel::AirpodsPro1
        };
        return DetectedHeadphone {
            model,
            default_mode: HeadphoneMode::AncOn,
            display_name: trimmed.to_string(),
        };
    }

    DetectedHeadphone {
        model: HeadphoneModel::Generic,
        default_mode: HeadphoneMode::Default,
        display_name: if trimmed.is_empty() {
            "Generic Headphones".to_string()
        } else {
            trimmed.to_string()
        },
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
