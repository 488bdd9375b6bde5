//! Pose packet wire format
//!
//! Fixed-size little-endian packet layout, one datagram per sample:
//!
//! v1 (40 bytes): `[MAGIC u32] [VERSION=1 u32] [qx qy qz qw f32] [timestamp_ms u64] [sequence u32] [reserved u32]`
//!
//! v2 (52 bytes): `[MAGIC u32] [VERSION=2 u32] [qx qy qz qw f32] [timestamp_ms u64] [sequence u32] [ang_x ang_y ang_z f32] [flags u32]`
//!
//! Floats travel as raw IEEE-754 bit patterns, so NaN/Inf survive a
//! round trip. The receiver is responsible for sanitizing values; the
//! codec only validates framing (length, magic, version).

use crate::core::types::{Quaternion, SensorLocation};
use crate::error::{Error, Result};

/// Packet magic, "LQPT" read most-significant byte first
pub const POSE_MAGIC: u32 = 0x4C51_5054;

/// Wire version of the 40-byte quaternion-only layout
pub const VERSION_V1: u32 = 1;
/// Wire version of the 52-byte layout with angular rate and flags
pub const VERSION_V2: u32 = 2;

/// Total v1 packet size in bytes
pub const PACKET_V1_LEN: usize = 40;
/// Total v2 packet size in bytes
pub const PACKET_V2_LEN: usize = 52;

// ===== Shared Field Byte Offsets =====

/// Magic word offset
pub const OFFSET_MAGIC: usize = 0;
/// Version word offset
pub const OFFSET_VERSION: usize = 4;
/// Quaternion x component offset (y, z, w follow at 4-byte strides)
pub const OFFSET_QUAT: usize = 8;
/// Capture timestamp offset (u64, milliseconds since Unix epoch)
pub const OFFSET_TIMESTAMP: usize = 24;
/// Sequence number offset
pub const OFFSET_SEQUENCE: usize = 32;

// ===== v1-only Offsets =====

/// Reserved word offset (zero on encode, ignored on decode)
pub const OFFSET_RESERVED: usize = 36;

// ===== v2-only Offsets =====

/// Angular rate x component offset (y, z follow at 4-byte strides)
pub const OFFSET_ANGULAR_RATE: usize = 36;
/// Flags word offset
pub const OFFSET_FLAGS: usize = 48;

/// Flags field: low two bits encode the sensor location
pub const FLAG_LOCATION_MASK: u32 = 0x3;
/// Flags bit: angular rate fields carry sensor data (not padding zeros)
pub const FLAG_HAS_ANGULAR_RATE: u32 = 0x4;

/// Outgoing layout selector.
///
/// v2 is the default; v1 exists for receivers that predate the angular
/// rate fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireVersion {
    V1,
    #[default]
    V2,
}

impl WireVersion {
    /// Map a configured version number; unknown numbers return None
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            VERSION_V1 => Some(WireVersion::V1),
            VERSION_V2 => Some(WireVersion::V2),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            WireVersion::V1 => VERSION_V1,
            WireVersion::V2 => VERSION_V2,
        }
    }
}

/// Pack a v2 flags word from its components
pub fn pack_flags(location: SensorLocation, has_angular_rate: bool) -> u32 {
    let mut flags = location.to_bits() & FLAG_LOCATION_MASK;
    if has_angular_rate {
        flags |= FLAG_HAS_ANGULAR_RATE;
    }
    flags
}

/// v1 packet body: orientation only
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseV1 {
    pub quat: Quaternion,
    pub timestamp_ms: u64,
    pub sequence: u32,
}

/// v2 packet body: orientation plus angular rate and flags
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseV2 {
    pub quat: Quaternion,
    pub timestamp_ms: u64,
    pub sequence: u32,
    /// Body-frame angular velocity in rad/s; all-zero when absent
    pub angular_rate: [f32; 3],
    pub flags: u32,
}

impl PoseV2 {
    /// Sensor location decoded from the flags word
    pub fn sensor_location(&self) -> SensorLocation {
        SensorLocation::from_bits(self.flags)
    }

    /// True when the angular rate fields carry sensor data
    pub fn has_angular_rate(&self) -> bool {
        self.flags & FLAG_HAS_ANGULAR_RATE != 0
    }
}

/// A pose packet of either supported wire version.
///
/// The tag travels on the wire as the version word; decode returns the
/// matching variant so callers can branch without re-inspecting bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PosePacket {
    V1(PoseV1),
    V2(PoseV2),
}

impl PosePacket {
    /// Build a v1 packet
    pub fn v1(quat: Quaternion, timestamp_ms: u64, sequence: u32) -> Self {
        PosePacket::V1(PoseV1 {
            quat,
            timestamp_ms,
            sequence,
        })
    }

    /// Build a v2 packet; a missing angular rate encodes as zeros with
    /// the rate flag clear
    pub fn v2(
        quat: Quaternion,
        timestamp_ms: u64,
        sequence: u32,
        angular_rate: Option<[f32; 3]>,
        location: SensorLocation,
    ) -> Self {
        PosePacket::V2(PoseV2 {
            quat,
            timestamp_ms,
            sequence,
            angular_rate: angular_rate.unwrap_or([0.0; 3]),
            flags: pack_flags(location, angular_rate.is_some()),
        })
    }

    /// Wire version of this packet
    pub fn version(&self) -> u32 {
        match self {
            PosePacket::V1(_) => VERSION_V1,
            PosePacket::V2(_) => VERSION_V2,
        }
    }

    /// Encoded size in bytes
    pub fn encoded_len(&self) -> usize {
        match self {
            PosePacket::V1(_) => PACKET_V1_LEN,
            PosePacket::V2(_) => PACKET_V2_LEN,
        }
    }

    pub fn sequence(&self) -> u32 {
        match self {
            PosePacket::V1(p) => p.sequence,
            PosePacket::V2(p) => p.sequence,
        }
    }

    pub fn timestamp_ms(&self) -> u64 {
        match self {
            PosePacket::V1(p) => p.timestamp_ms,
            PosePacket::V2(p) => p.timestamp_ms,
        }
    }

    pub fn quat(&self) -> Quaternion {
        match self {
            PosePacket::V1(p) => p.quat,
            PosePacket::V2(p) => p.quat,
        }
    }

    /// Encode into a fresh buffer of exactly [`Self::encoded_len`] bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&POSE_MAGIC.to_le_bytes());
        buf.extend_from_slice(&self.version().to_le_bytes());

        let quat = self.quat();
        buf.extend_from_slice(&quat.x.to_le_bytes());
        buf.extend_from_slice(&quat.y.to_le_bytes());
        buf.extend_from_slice(&quat.z.to_le_bytes());
        buf.extend_from_slice(&quat.w.to_le_bytes());
        buf.extend_from_slice(&self.timestamp_ms().to_le_bytes());
        buf.extend_from_slice(&self.sequence().to_le_bytes());

        match self {
            PosePacket::V1(_) => {
                // Reserved word keeps v1 at a fixed 40 bytes
                buf.extend_from_slice(&0u32.to_le_bytes());
            }
            PosePacket::V2(p) => {
                for rate in &p.angular_rate {
                    buf.extend_from_slice(&rate.to_le_bytes());
                }
                buf.extend_from_slice(&p.flags.to_le_bytes());
            }
        }

        buf
    }

    /// Decode a received datagram.
    ///
    /// Validation order is fixed: total length must be one of the known
    /// packet sizes, then the magic word, then the version word, then the
    /// exact length for the declared version. Each failure maps to its own
    /// error variant so receivers can tell framing noise from version skew.
    pub fn decode(buf: &[u8]) -> Result<PosePacket> {
        if buf.len() != PACKET_V1_LEN && buf.len() != PACKET_V2_LEN {
            let expected = if buf.len() < PACKET_V1_LEN {
                PACKET_V1_LEN
            } else {
                PACKET_V2_LEN
            };
            return Err(Error::PacketLength {
                expected,
                actual: buf.len(),
            });
        }

        let magic = read_u32(buf, OFFSET_MAGIC);
        if magic != POSE_MAGIC {
            return Err(Error::PacketMagic { found: magic });
        }

        let version = read_u32(buf, OFFSET_VERSION);
        let expected_len = match version {
            VERSION_V1 => PACKET_V1_LEN,
            VERSION_V2 => PACKET_V2_LEN,
            other => return Err(Error::PacketVersion { found: other }),
        };
        if buf.len() != expected_len {
            return Err(Error::PacketLength {
                expected: expected_len,
                actual: buf.len(),
            });
        }

        let quat = Quaternion::new(
            read_f32(buf, OFFSET_QUAT),
            read_f32(buf, OFFSET_QUAT + 4),
            read_f32(buf, OFFSET_QUAT + 8),
            read_f32(buf, OFFSET_QUAT + 12),
        );
        let timestamp_ms = read_u64(buf, OFFSET_TIMESTAMP);
        let sequence = read_u32(buf, OFFSET_SEQUENCE);

        match version {
            VERSION_V1 => Ok(PosePacket::V1(PoseV1 {
                quat,
                timestamp_ms,
                sequence,
            })),
            _ => Ok(PosePacket::V2(PoseV2 {
                quat,
                timestamp_ms,
                sequence,
                angular_rate: [
                    read_f32(buf, OFFSET_ANGULAR_RATE),
                    read_f32(buf, OFFSET_ANGULAR_RATE + 4),
                    read_f32(buf, OFFSET_ANGULAR_RATE + 8),
                ],
                flags: read_u32(buf, OFFSET_FLAGS),
            })),
        }
    }
}

// Callers validate lengths before these run; offsets are compile-time
// constants within the checked sizes.

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

fn read_f32(buf: &[u8], offset: usize) -> f32 {
    f32::from_bits(read_u32(buf, offset))
}
