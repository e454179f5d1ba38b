//! EtherDFS client-side redirector engine.
//!
//! Exposes remote directories as local drive letters over raw Ethernet,
//! without IP or TCP. Host filesystem calls are translated into a small
//! synchronous request/response protocol carried in Ethernet frames with
//! EtherType 0xF5ED: at most one request is in flight, replies are paired
//! by a sequence byte, and a weak rolling checksum guards frame integrity.
//!
//! The engine is re-entrant from arbitrary host contexts in the sense that
//! every call is a complete, synchronous dialog: the per-file and per-scan
//! state lives in host-owned control blocks the engine mutates in place,
//! never in allocations of its own. The packet driver is an external
//! collaborator behind [`LinkDriver`] and the [`Inbox`] callback protocol;
//! a Linux `AF_PACKET` shim is provided in [`packet`].

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub use crate::channel::{Channel, Inbox, LinkDriver, ReceiveSlot};
pub use crate::dispatch::{Dispatch, HostCall, Redirector, Regs};
pub use crate::host::{Cds, CdsFlags, DosError, FileAttr, FoundFile, SearchBlock, Sft};
pub use crate::ll::frame::{BROADCAST_MAC, FRAME_MIN, FRAME_SIZE, PAYLOAD_OFFSET};
pub use crate::ll::opcode::Opcode;
pub use crate::mapping::DriveTable;
pub use crate::session::{Config, InstallError, Session};
pub use crate::transport::{Reply, SystemTicks, TickSource, Transport, TransportError};

mod channel;
pub mod cli;
mod dispatch;
pub mod host;
pub mod ll;
pub mod mapping;
#[cfg(target_os = "linux")]
pub mod packet;
mod path;
pub mod session;
pub mod transport;
