//! Core motion data types shared across sources, pipeline, and wire format.

use std::time::{SystemTime, UNIX_EPOCH};

/// Orientation quaternion (x, y, z, w scalar-last).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    /// Identity rotation (no head movement)
    pub fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }

    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Build a unit quaternion from intrinsic ZYX euler angles in degrees.
    ///
    /// Yaw rotates about +Z, pitch about +Y, roll about +X, applied in
    /// yaw-pitch-roll order. Angles are converted with f64 intermediates to
    /// keep the half-angle products stable, then stored as f32.
    pub fn from_yaw_pitch_roll_deg(yaw_deg: f64, pitch_deg: f64, roll_deg: f64) -> Self {
        let half_yaw = yaw_deg.to_radians() * 0.5;
        let half_pitch = pitch_deg.to_radians() * 0.5;
        let half_roll = roll_deg.to_radians() * 0.5;

        let (sy, cy) = half_yaw.sin_cos();
        let (sp, cp) = half_pitch.sin_cos();
        let (sr, cr) = half_roll.sin_cos();

        let q = Self {
            x: (sr * cp * cy - cr * sp * sy) as f32,
            y: (cr * sp * cy + sr * cp * sy) as f32,
            z: (cr * cp * sy - sr * sp * cy) as f32,
            w: (cr * cp * cy + sr * sp * sy) as f32,
        };
        q.normalized()
    }

    /// Euclidean norm of the four components
    pub fn norm(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    /// Unit-norm copy. A degenerate (zero or non-finite norm) quaternion
    /// collapses to identity rather than propagating NaN downstream.
    pub fn normalized(&self) -> Self {
        let n = self.norm();
        if n.is_finite() && n > f32::EPSILON {
            Self {
                x: self.x / n,
                y: self.y / n,
                z: self.z / n,
                w: self.w / n,
            }
        } else {
            Self::identity()
        }
    }

    /// True when every component is a finite float
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.w.is_finite()
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

/// Where the reporting sensor sits on the listener's head.
///
/// Encoded into the low two bits of the v2 packet flags word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorLocation {
    #[default]
    Unknown,
    LeftEar,
    RightEar,
}

impl SensorLocation {
    /// Two-bit wire encoding
    pub fn to_bits(self) -> u32 {
        match self {
            SensorLocation::Unknown => 0,
            SensorLocation::LeftEar => 1,
            SensorLocation::RightEar => 2,
        }
    }

    /// Decode the low two bits of a flags word; unassigned values map
    /// to `Unknown`.
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0x3 {
            1 => SensorLocation::LeftEar,
            2 => SensorLocation::RightEar,
            _ => SensorLocation::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SensorLocation::Unknown => "unknown",
            SensorLocation::LeftEar => "headphone_left",
            SensorLocation::RightEar => "headphone_right",
        }
    }
}

/// One head-orientation sample as delivered by a motion source.
///
/// Samples are created fresh per callback and consumed synchronously by the
/// pipeline; nothing retains them afterwards. The quaternion is not
/// guaranteed normalized at this point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    /// Head orientation relative to the source's reference frame
    pub quat: Quaternion,
    /// Wall-clock capture time, milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    /// Body-frame angular velocity in rad/s, when the sensor reports one
    pub angular_rate: Option<[f32; 3]>,
    /// Reporting sensor position
    pub location: SensorLocation,
}

impl MotionSample {
    pub fn new(quat: Quaternion, timestamp_ms: u64) -> Self {
        Self {
            quat,
            timestamp_ms,
            angular_rate: None,
            location: SensorLocation::Unknown,
        }
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_unit_norm() {
        let q = Quaternion::identity();
        assert!((q.norm() - 1.0).abs() < 1e-6);
        assert_eq!(q.w, 1.0);
    }

    #[test]
    fn test_pure_yaw_rotation() {
        // 90 degrees of yaw: z = sin(45), w = cos(45), x = y = 0
        let q = Quaternion::from_yaw_pitch_roll_deg(90.0, 0.0, 0.0);
        let expected = (std::f32::consts::FRAC_PI_4).sin();
        assert!(q.x.abs() < 1e-6, "x should be 0, got {}", q.x);
        assert!(q.y.abs() < 1e-6, "y should be 0, got {}", q.y);
        assert!((q.z - expected).abs() < 1e-6, "z mismatch: {}", q.z);
        assert!((q.w - expected).abs() < 1e-6, "w mismatch: {}", q.w);
    }

    #[test]
    fn test_euler_quaternion_is_normalized() {
        let q = Quaternion::from_yaw_pitch_roll_deg(35.0, -10.0, 5.0);
        assert!(
            (q.norm() - 1.0).abs() < 1e-6,
            "expected unit norm, got {}",
            q.norm()
        );
    }

    #[test]
    fn test_degenerate_quaternion_normalizes_to_identity() {
        let zero = Quaternion::new(0.0, 0.0, 0.0, 0.0);
        assert_eq!(zero.normalized(), Quaternion::identity());

        let nan = Quaternion::new(f32::NAN, 0.0, 0.0, 1.0);
        assert_eq!(nan.normalized(), Quaternion::identity());
    }

    #[test]
    fn test_sensor_location_bits_round_trip() {
        for loc in [
            SensorLocation::Unknown,
            SensorLocation::LeftEar,
            SensorLocation::RightEar,
        ] {
            assert_eq!(SensorLocation::from_bits(loc.to_bits()), loc);
        }
        // Reserved bit pattern 3 decodes as unknown
        assert_eq!(SensorLocation::from_bits(3), SensorLocation::Unknown);
        // High bits outside the field are ignored
        assert_eq!(SensorLocation::from_bits(0x7FFF_FFF9), SensorLocation::LeftEar);
    }

    #[test]
    fn test_epoch_clock_is_plausible() {
        let ms = now_epoch_ms();
        // After 2020-01-01 and before 2100-01-01
        assert!(ms > 1_577_836_800_000, "clock before 2020: {}", ms);
        assert!(ms < 4_102_444_800_000, "clock after 2100: {}", ms);
    }
}
