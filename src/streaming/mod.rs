//! Wire format and UDP transport

pub mod packet;
pub mod udp_sender;

pub use packet::{PosePacket, PoseV1, PoseV2, WireVersion};
pub use udp_sender::UdpPoseSender;
