//! Fixed reply shapes.
//!
//! Several operations answer with a payload of a fixed, contractual size.
//! These are views over the reply payload (frame bytes 60..), checked for
//! exact length by the dispatcher before casting.

use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

/// Reply to `OpenFile`, `CreateFile` and `ExtendedOpen`: 25 bytes.
#[repr(C)]
#[derive(Debug, FromBytes, KnownLayout, Immutable, Unaligned)]
pub(crate) struct OpenReply {
    pub(crate) attr: u8,
    /// 8+3 space-padded name, as the server's directory stores it.
    pub(crate) name: [u8; 11],
    pub(crate) time: U32,
    pub(crate) size: U32,
    /// Server-assigned identifier of the open file.
    pub(crate) fileid: U16,
    /// Low byte: granted open mode. Whole word: extended-open result,
    /// handed back in CX for `ExtendedOpen`.
    pub(crate) mode: U16,
    pub(crate) reserved: u8,
}

/// Expected payload length of an open-family reply.
pub(crate) const OPEN_REPLY_LEN: usize = 25;

/// Reply to `FindFirst` and `FindNext`: 24 bytes.
#[repr(C)]
#[derive(Debug, FromBytes, KnownLayout, Immutable, Unaligned)]
pub(crate) struct FindReply {
    pub(crate) attr: u8,
    pub(crate) name: [u8; 11],
    pub(crate) time: U16,
    pub(crate) date: U16,
    pub(crate) size: U32,
    /// Identifier of the directory being scanned.
    pub(crate) parent: U16,
    /// Index of the entry within that directory.
    pub(crate) dir_entry: U16,
}

/// Expected payload length of an enumeration reply.
pub(crate) const FIND_REPLY_LEN: usize = 24;

/// Reply to `DiskSpace`: 6 bytes, with sectors-per-cluster in the result
/// word itself.
#[repr(C)]
#[derive(Debug, FromBytes, KnownLayout, Immutable, Unaligned)]
pub(crate) struct DiskSpaceReply {
    pub(crate) total_clusters: U16,
    pub(crate) bytes_per_sector: U16,
    pub(crate) free_clusters: U16,
}

/// Expected payload length of a disk-space reply.
pub(crate) const DISKSPACE_REPLY_LEN: usize = 6;

/// Reply to `GetAttr`: 9 bytes.
#[repr(C)]
#[derive(Debug, FromBytes, KnownLayout, Immutable, Unaligned)]
pub(crate) struct GetAttrReply {
    pub(crate) time: U16,
    pub(crate) date: U16,
    pub(crate) size: U32,
    pub(crate) attr: u8,
}

/// Expected payload length of a get-attributes reply.
pub(crate) const GETATTR_REPLY_LEN: usize = 9;

/// Reply to `SeekFromEnd`: the new absolute file position, 4 bytes.
#[repr(C)]
#[derive(Debug, FromBytes, KnownLayout, Immutable, Unaligned)]
pub(crate) struct SeekReply {
    pub(crate) position: U32,
}

/// Expected payload length of a seek reply.
pub(crate) const SEEK_REPLY_LEN: usize = 4;
