//! Link driver communication.
//!
//! Raw frame channel between the engine and the packet driver. Outbound
//! frames go through [`LinkDriver::send`] with no delivery confirmation.
//! Inbound frames arrive through the two-phase receive callback on
//! [`Inbox`]: the driver first asks for a buffer of the frame's length,
//! copies the frame in, then commits. The engine owns a single receive
//! buffer, so a frame arriving while another is pending is dropped on the
//! floor; the transport's retry loop absorbs the loss.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::ll::frame::FRAME_SIZE;

/// Outbound half of the packet-driver interface.
///
/// Implementations transmit a single raw Ethernet frame, best effort. The
/// inbound half is not a trait method: drivers deliver frames by calling
/// [`Inbox::begin_receive`] on the inbox they were handed at registration.
pub trait LinkDriver: Send + Sync {
    /// Emit one frame. No confirmation; an error is treated like a frame
    /// lost on the wire.
    fn send(&self, frame: &[u8]) -> io::Result<()>;
}

const EMPTY: i32 = 0;

/// Single-slot receive buffer shared between the engine and the driver.
///
/// The length word is the ownership token: `0` means empty (engine may
/// re-arm, driver may reserve), a negative value means the driver is
/// filling the buffer, a positive value means a frame of that length is
/// ready for the engine. Only the engine resets to empty, only the driver
/// publishes ready, so a single atomic plus the buffer lock is enough.
pub struct Inbox {
    len: AtomicI32,
    buf: Mutex<Box<[u8; FRAME_SIZE]>>,
}

impl Inbox {
    /// Create an empty inbox.
    pub fn new() -> Arc<Inbox> {
        Arc::new(Inbox {
            len: AtomicI32::new(EMPTY),
            buf: Mutex::new(Box::new([0; FRAME_SIZE])),
        })
    }

    /// Phase 1 of the driver callback: reserve the buffer for an incoming
    /// frame of `len` bytes. Refused (the frame must be dropped) when the
    /// frame does not fit or a previous frame is still pending.
    pub fn begin_receive(&self, len: usize) -> Option<ReceiveSlot<'_>> {
        if len == 0 || len > FRAME_SIZE {
            return None;
        }
        if self
            .len
            .compare_exchange(EMPTY, -(len as i32), Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        Some(ReceiveSlot {
            inbox: self,
            guard: self.buf.lock(),
            len,
            committed: false,
        })
    }

    /// Length of the frame waiting in the buffer, if any.
    pub(crate) fn ready_len(&self) -> Option<usize> {
        let v = self.len.load(Ordering::Acquire);
        (v > 0).then_some(v as usize)
    }

    /// Reset to empty. Called by the engine before each transmission and
    /// after consuming or discarding a frame.
    pub(crate) fn clear(&self) {
        self.len.store(EMPTY, Ordering::Release);
    }

    /// Lock the underlying buffer for inspection.
    pub(crate) fn frame(&self) -> MutexGuard<'_, Box<[u8; FRAME_SIZE]>> {
        self.buf.lock()
    }
}

impl fmt::Debug for Inbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inbox")
            .field("len", &self.len.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Reservation of the inbox buffer between the two callback phases.
///
/// Phase 2 is [`ReceiveSlot::commit`]; dropping the slot without committing
/// returns the inbox to empty, as if the frame never arrived.
pub struct ReceiveSlot<'a> {
    inbox: &'a Inbox,
    guard: MutexGuard<'a, Box<[u8; FRAME_SIZE]>>,
    len: usize,
    committed: bool,
}

impl ReceiveSlot<'_> {
    /// The buffer to copy the frame into, exactly as long as requested.
    pub fn buffer(&mut self) -> &mut [u8] {
        &mut self.guard[..self.len]
    }

    /// Phase 2: mark the frame ready for the engine.
    pub fn commit(mut self) {
        self.committed = true;
        self.inbox.len.store(self.len as i32, Ordering::Release);
    }
}

impl Drop for ReceiveSlot<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.inbox.clear();
        }
    }
}

impl fmt::Debug for ReceiveSlot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiveSlot")
            .field("len", &self.len)
            .field("committed", &self.committed)
            .finish()
    }
}

/// The engine's two endpoints with the link layer: the driver for sending
/// and the inbox the driver fills.
pub struct Channel {
    driver: Arc<dyn LinkDriver>,
    inbox: Arc<Inbox>,
}

impl Channel {
    /// Pair a driver with the inbox it was registered to fill.
    pub fn new(driver: Arc<dyn LinkDriver>, inbox: Arc<Inbox>) -> Channel {
        Channel { driver, inbox }
    }

    pub(crate) fn send(&self, frame: &[u8]) -> io::Result<()> {
        self.driver.send(frame)
    }

    pub(crate) fn inbox(&self) -> &Inbox {
        &self.inbox
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("inbox", &self.inbox)
            .finish_non_exhaustive()
    }
}
