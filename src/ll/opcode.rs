//! Operation codes.
//!
//! Byte 59 of a request frame. The values track the host redirector
//! subfunction numbers, which is why the sequence has holes.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Wire operation code of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    /// Remove a directory.
    RmDir = 0x01,
    /// Create a directory.
    MkDir = 0x03,
    /// Probe that a directory exists (the host updates its own CWD).
    ChDir = 0x05,
    /// Release an open file on the server.
    CloseFile = 0x06,
    /// Flush an open file. Never reaches the wire.
    CommitFile = 0x07,
    /// Read a chunk from an open file.
    ReadFile = 0x08,
    /// Write a chunk to an open file; a zero-length chunk truncates.
    WriteFile = 0x09,
    /// Acquire record locks.
    LockFile = 0x0A,
    /// Release record locks.
    UnlockFile = 0x0B,
    /// Query cluster geometry and free space.
    DiskSpace = 0x0C,
    /// Set the attribute byte of a path.
    SetAttr = 0x0E,
    /// Query attributes, size and timestamps of a path.
    GetAttr = 0x0F,
    /// Rename within one drive.
    Rename = 0x11,
    /// Delete files matching a path (wildcards allowed).
    Delete = 0x13,
    /// Open an existing file.
    OpenFile = 0x16,
    /// Create or truncate a file.
    CreateFile = 0x17,
    /// Start a directory enumeration.
    FindFirst = 0x1B,
    /// Continue a directory enumeration.
    FindNext = 0x1C,
    /// Seek relative to end-of-file.
    SeekFromEnd = 0x21,
    /// Open with action codes (DOS 4+ extended open).
    ExtendedOpen = 0x2E,
}
