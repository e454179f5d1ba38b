//! Request/response engine.
//!
//! Builds a request frame in the process-wide send buffer, emits it, and
//! waits for the matching reply with bounded retries. The protocol is
//! strictly synchronous: at most one request is in flight, and a reply is
//! paired with its request by the sequence byte. Retransmissions reuse the
//! sequence, so the first valid reply wins and late duplicates die against
//! the next request's bumped sequence and the cleared inbox.

use std::time::Instant;
use std::{error, fmt, thread};

use log::{debug, warn};
use smallvec::SmallVec;
use zerocopy::FromBytes;

use crate::channel::Channel;
use crate::ll::checksum::bsd_checksum;
use crate::ll::frame::{
    CKSUM_START, ETHERTYPE, FRAME_MIN, FRAME_SIZE, FrameHeader, PAYLOAD_OFFSET, PROTO_CKSUM_FLAG,
    PROTO_VERSION,
};
use crate::ll::opcode::Opcode;

/// Total transmissions of one request before giving up.
pub(crate) const ATTEMPTS: u32 = 5;

/// Per-attempt timeout, measured in wall-clock ticks. Two tick advances of
/// a ~55 ms tick bound the wait at roughly 100 ms.
const TIMEOUT_TICKS: u8 = 2;

/// Period of the wall-clock tick consulted by the reply wait.
const TICK_PERIOD_MS: u128 = 55;

/// Source of a free-running wall-clock tick.
///
/// Only the low byte matters: the timeout fires once the byte has advanced
/// by [`TIMEOUT_TICKS`], so any monotonic counter with a ~55 ms period works.
pub trait TickSource: Send {
    /// Low byte of the current tick count.
    fn tick(&self) -> u8;
}

/// [`TickSource`] over the system monotonic clock.
#[derive(Debug)]
pub struct SystemTicks(Instant);

impl SystemTicks {
    /// Start counting from now.
    pub fn new() -> SystemTicks {
        SystemTicks(Instant::now())
    }
}

impl Default for SystemTicks {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for SystemTicks {
    fn tick(&self) -> u8 {
        (self.0.elapsed().as_millis() / TICK_PERIOD_MS) as u8
    }
}

/// Error that may occur while exchanging a request for a reply.
///
/// The transport itself only ever reports `Network`; the other two kinds
/// are raised by the dispatcher when it interprets the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// No valid reply arrived within the retry budget.
    Network,
    /// The server answered with a nonzero result word.
    Peer(u16),
    /// The reply did not have the fixed size its operation requires.
    Length {
        /// Payload length the operation's contract demands.
        expected: usize,
        /// Payload length actually received.
        actual: usize,
    },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Network => {
                write!(f, "no reply from server after {ATTEMPTS} attempts")
            }
            TransportError::Peer(ax) => write!(f, "server error {ax:#06x}"),
            TransportError::Length { expected, actual } => {
                write!(f, "malformed reply ({actual} bytes, expected {expected})")
            }
        }
    }
}

impl error::Error for TransportError {}

/// A validated reply: the 16-bit result word from bytes 58..60 plus a copy
/// of the payload.
#[derive(Debug)]
pub struct Reply {
    /// Protocol-level result word; 0 means success for most operations.
    pub ax: u16,
    /// Payload bytes 60..announced-length.
    pub data: SmallVec<[u8; 64]>,
}

/// The request/response engine. Owns the send buffer, the sequence
/// counter and the peer address shared by all mapped drives.
pub struct Transport {
    channel: Channel,
    ticks: Box<dyn TickSource>,
    local_mac: [u8; 6],
    peer_mac: [u8; 6],
    sequence: u8,
    checksum: bool,
    sendbuf: Box<[u8; FRAME_SIZE]>,
}

impl Transport {
    /// Create a transport speaking to `peer_mac` (or the broadcast address
    /// until discovery has run).
    pub fn new(
        channel: Channel,
        ticks: Box<dyn TickSource>,
        local_mac: [u8; 6],
        peer_mac: [u8; 6],
        checksum: bool,
    ) -> Transport {
        Transport {
            channel,
            ticks,
            local_mac,
            peer_mac,
            sequence: 0,
            checksum,
            sendbuf: Box::new([0; FRAME_SIZE]),
        }
    }

    /// The server currently bound to all mappings.
    pub fn peer(&self) -> [u8; 6] {
        self.peer_mac
    }

    pub(crate) fn set_peer(&mut self, mac: [u8; 6]) {
        self.peer_mac = mac;
    }

    /// The payload area of the send buffer. Operations marshal their
    /// arguments here before calling [`Transport::request`].
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.sendbuf[PAYLOAD_OFFSET..]
    }

    /// Exchange the request staged in the payload area for a reply.
    ///
    /// Emits the frame and polls the inbox for up to ~100 ms, retrying the
    /// transmission until a validating reply arrives or [`ATTEMPTS`] runs
    /// out. With `learn_peer` set the source-address check is waived and
    /// the replying server becomes the new peer (discovery).
    pub fn request(
        &mut self,
        op: Opcode,
        drive: u8,
        payload_len: usize,
        learn_peer: bool,
    ) -> Result<Reply, TransportError> {
        let frame_len = PAYLOAD_OFFSET + payload_len;
        debug_assert!(frame_len <= FRAME_SIZE);
        self.sequence = self.sequence.wrapping_add(1);
        self.seal_frame(op, drive, frame_len);

        for attempt in 1..=ATTEMPTS {
            self.channel.inbox().clear();
            if let Err(err) = self.channel.send(&self.sendbuf[..frame_len]) {
                warn!("link driver send failed (attempt {attempt}): {err}");
            }
            let started = self.ticks.tick();
            loop {
                if let Some(len) = self.channel.inbox().ready_len() {
                    let verdict = {
                        let frame = self.channel.inbox().frame();
                        self.screen_reply(&frame[..len], learn_peer)
                    };
                    self.channel.inbox().clear();
                    if let Some((reply, src)) = verdict {
                        if learn_peer {
                            self.peer_mac = src;
                        }
                        return Ok(reply);
                    }
                }
                if self.ticks.tick().wrapping_sub(started) >= TIMEOUT_TICKS {
                    break;
                }
                thread::yield_now();
            }
            debug!(
                "no reply to op {:#04x} seq {} (attempt {attempt}/{ATTEMPTS})",
                u8::from(op),
                self.sequence
            );
        }
        Err(TransportError::Network)
    }

    /// Fill the fixed header around the staged payload.
    fn seal_frame(&mut self, op: Opcode, drive: u8, frame_len: usize) {
        let (hdr, _) = FrameHeader::mut_from_prefix(&mut self.sendbuf[..])
            .expect("send buffer starts with a frame header");
        hdr.dst = self.peer_mac;
        hdr.src = self.local_mac;
        hdr.ethertype = ETHERTYPE;
        hdr.frame_len.set(frame_len as u16);
        hdr.cksum.set(0);
        hdr.protover = if self.checksum {
            PROTO_VERSION | PROTO_CKSUM_FLAG
        } else {
            PROTO_VERSION
        };
        hdr.sequence = self.sequence;
        hdr.drive = drive;
        hdr.op = op.into();
        if self.checksum {
            let sum = bsd_checksum(&self.sendbuf[CKSUM_START..frame_len]);
            let (hdr, _) = FrameHeader::mut_from_prefix(&mut self.sendbuf[..])
                .expect("send buffer starts with a frame header");
            hdr.cksum.set(sum);
        }
    }

    /// Validate a candidate reply. Anything failing a check is dropped as
    /// if it never arrived.
    fn screen_reply(&self, frame: &[u8], learn_peer: bool) -> Option<(Reply, [u8; 6])> {
        if frame.len() < FRAME_MIN {
            return None;
        }
        let (hdr, _) = FrameHeader::ref_from_prefix(frame).ok()?;
        if hdr.dst != self.local_mac {
            return None;
        }
        if !learn_peer && hdr.src != self.peer_mac {
            return None;
        }
        if hdr.ethertype != ETHERTYPE {
            return None;
        }
        if hdr.sequence != self.sequence {
            debug!(
                "dropping reply with stale sequence {} (current {})",
                hdr.sequence, self.sequence
            );
            return None;
        }
        let announced = usize::from(hdr.frame_len.get());
        if announced < FRAME_MIN || announced > frame.len() {
            return None;
        }
        if hdr.protover & PROTO_CKSUM_FLAG != 0 {
            let sum = bsd_checksum(&frame[CKSUM_START..announced]);
            if sum != hdr.cksum.get() {
                debug!("dropping reply with bad checksum");
                return None;
            }
        }
        let data = SmallVec::from_slice(&frame[PAYLOAD_OFFSET..announced]);
        Some((Reply { ax: hdr.ax(), data }, hdr.src))
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("peer_mac", &self.peer_mac)
            .field("sequence", &self.sequence)
            .field("checksum", &self.checksum)
            .finish_non_exhaustive()
    }
}
