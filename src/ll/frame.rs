//! Frame layout.
//!
//! Every request and reply occupies a single Ethernet frame. The first 60
//! bytes form a fixed header (padded out to the Ethernet minimum); the
//! operation payload starts immediately after it. Requests carry the remote
//! drive ordinal and operation code in bytes 58..60; replies reuse those two
//! bytes for the 16-bit result word (AX), low byte first.

use zerocopy::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Size of the send and receive buffers, and the largest frame ever emitted.
pub const FRAME_SIZE: usize = 1090;

/// Minimum length of a valid frame (Ethernet minimum, which the fixed
/// header fills completely).
pub const FRAME_MIN: usize = 60;

/// Offset of the operation payload within a frame.
pub const PAYLOAD_OFFSET: usize = 60;

/// EtherType identifying EtherDFS traffic, as it appears on the wire.
pub const ETHERTYPE: [u8; 2] = [0xED, 0xF5];

/// Protocol revision spoken by this engine.
pub const PROTO_VERSION: u8 = 2;

/// Bit 7 of the version byte advertises that the checksum field is live.
pub const PROTO_CKSUM_FLAG: u8 = 0x80;

/// Destination used while discovering a server.
pub const BROADCAST_MAC: [u8; 6] = [0xFF; 6];

/// First byte covered by the integrity checksum.
pub(crate) const CKSUM_START: usize = 56;

/// Fixed frame header. A view over the first [`FRAME_MIN`] bytes of a
/// frame buffer; every field is at its wire offset.
#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub(crate) struct FrameHeader {
    /// 0..6: destination MAC.
    pub(crate) dst: [u8; 6],
    /// 6..12: source MAC.
    pub(crate) src: [u8; 6],
    /// 12..14: EtherType, see [`ETHERTYPE`].
    pub(crate) ethertype: [u8; 2],
    /// 14..52: reserved.
    pub(crate) reserved: [u8; 38],
    /// 52..54: total frame length announced by the sender.
    pub(crate) frame_len: U16,
    /// 54..56: checksum over bytes 56..frame_len, when enabled.
    pub(crate) cksum: U16,
    /// 56: protocol version, bit 7 = checksum enabled.
    pub(crate) protover: u8,
    /// 57: sequence number; a reply echoes its request's value.
    pub(crate) sequence: u8,
    /// 58: remote drive ordinal (request) / AX low byte (reply).
    pub(crate) drive: u8,
    /// 59: operation code (request) / AX high byte (reply).
    pub(crate) op: u8,
}

impl FrameHeader {
    /// The 16-bit result word a reply carries in bytes 58..60.
    pub(crate) fn ax(&self) -> u16 {
        u16::from(self.drive) | (u16::from(self.op) << 8)
    }
}
