//! Binary wire codec for the legacy detector protocol.
//!
//! All multi-byte fields are little-endian, strings are fixed-width and
//! NUL-padded. The layout is byte-exact: there is no schema negotiation
//! with the devices.

mod discovery;
mod event;

pub use discovery::{DISCOVERY_PACKET_LEN, DiscoveryPacket};
pub use event::{
    Classification, DetectorStatus, DetectorZones, EventPacket, MetalCounters, ZONE_SIDES,
    ZONES_PER_SIDE, ZoneConfig,
};

/// Discovery request / announcement.
pub const CMD_DISCOVERY: u8 = 0x00;
/// Detector status + zones notification.
pub const CMD_EVENT: u8 = 0x05;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("packet too short: got {actual} bytes, need {expected}")]
    TooShort { actual: usize, expected: usize },

    #[error("unexpected command byte {0:#04x}")]
    UnexpectedCommand(u8),
}
