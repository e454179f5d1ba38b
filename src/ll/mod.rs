//! Low-level EtherDFS wire protocol.
//!
//! Types and definitions shared by requests and replies on the wire. The
//! protocol is carried directly in Ethernet II frames with a private
//! EtherType; all multi-byte fields are little-endian.

pub(crate) mod checksum;
pub mod frame;
pub mod opcode;
pub(crate) mod reply;
