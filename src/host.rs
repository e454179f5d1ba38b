//! Host-owned control blocks.
//!
//! The host allocates and owns the file table entry, the directory scan
//! cursor, the found-file record and the current-directory structure; the
//! engine only mutates them in place during a synchronous operation call.
//! They are bit-exact layouts, modeled as fixed-offset views onto
//! caller-provided byte ranges; the engine never allocates one.

use std::{error, fmt};

use bitflags::bitflags;
use memchr::memchr;
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::mapping;

/// Host-visible error code, as the redirector places it in AX.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DosError(pub u16);

impl DosError {
    /// Generic failure, also used for any transport failure.
    pub const FILE_NOT_FOUND: DosError = DosError(0x02);
    /// Bad or missing path.
    pub const PATH_NOT_FOUND: DosError = DosError(0x03);
    /// Operation conflicts with the file's open mode.
    pub const ACCESS_DENIED: DosError = DosError(0x05);
    /// Malformed file-table entry.
    pub const INVALID_HANDLE: DosError = DosError(0x06);
    /// Attempt to remove the working directory.
    pub const CURRENT_DIRECTORY: DosError = DosError(0x10);
    /// Directory enumeration ran dry.
    pub const NO_MORE_FILES: DosError = DosError(0x12);
}

impl fmt::Debug for DosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DosError({:#04x})", self.0)
    }
}

impl fmt::Display for DosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DosError::FILE_NOT_FOUND => write!(f, "file not found"),
            DosError::PATH_NOT_FOUND => write!(f, "path not found"),
            DosError::ACCESS_DENIED => write!(f, "access denied"),
            DosError::INVALID_HANDLE => write!(f, "invalid handle"),
            DosError::CURRENT_DIRECTORY => write!(f, "cannot remove current directory"),
            DosError::NO_MORE_FILES => write!(f, "no more files"),
            DosError(code) => write!(f, "host error {code:#04x}"),
        }
    }
}

impl error::Error for DosError {}

/// Access field of the open-mode word.
pub(crate) const OPEN_ACCESS_MASK: u16 = 0x0003;
/// Access value: read-only handle.
pub(crate) const OPEN_ACCESS_READ: u16 = 0;
/// Access value: write-only handle.
pub(crate) const OPEN_ACCESS_WRITE: u16 = 1;

/// Device-info word of a freshly opened remote file: network drive, not
/// yet written, drive ordinal in the low six bits.
pub(crate) const DEV_INFO_REMOTE: u16 = 0x8040;
/// Mask extracting the drive ordinal from a device-info word.
pub(crate) const DEV_INFO_DRIVE_MASK: u16 = 0x003F;

/// Network bit a scan cursor carries on its drive byte.
pub(crate) const SDB_DRIVE_NETWORK: u8 = 0x80;
/// Mask extracting the drive ordinal from a scan cursor's drive byte.
pub(crate) const SDB_DRIVE_MASK: u8 = 0x1F;

bitflags! {
    /// Flag word of a current-directory structure.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CdsFlags: u16 {
        /// The drive is redirected over the network.
        const NETWORK = 0x8000;
        /// The drive is usable.
        const PHYSICAL = 0x4000;
    }
}

bitflags! {
    /// DOS file attribute bits, as stored on the server.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileAttr: u8 {
        /// Write-protected.
        const READ_ONLY = 0x01;
        /// Hidden from plain enumeration.
        const HIDDEN = 0x02;
        /// System file.
        const SYSTEM = 0x04;
        /// Volume label entry.
        const VOLUME = 0x08;
        /// Directory entry.
        const DIRECTORY = 0x10;
        /// Modified since last backup.
        const ARCHIVE = 0x20;
    }
}

/// System File Table entry (43 bytes). One per open file; the host hands
/// the engine a view of it on every file-handle operation.
#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct Sft {
    /// Number of host handles referring to this entry.
    pub handle_count: U16,
    /// Open-mode word; bit 15 marks FCB opens.
    pub open_mode: U16,
    /// Attribute byte of the file.
    pub file_attr: u8,
    /// Device-info word; low six bits name the local drive.
    pub dev_info: U16,
    /// Device driver pointer. Opaque to the engine.
    pub driver_ptr: [u8; 4],
    /// Server-assigned file identifier (historically `start_sector`).
    pub fileid: U16,
    /// Packed DOS timestamp.
    pub file_time: U32,
    /// Size in bytes.
    pub file_size: U32,
    /// Current seek position.
    pub file_pos: U32,
    /// Relative cluster of the position. Meaningless on a network drive.
    pub rel_sector: U16,
    /// Absolute cluster of the position. Meaningless on a network drive.
    pub abs_sector: U16,
    /// Sector holding the directory entry. Meaningless on a network drive.
    pub dir_sector: U16,
    /// Index of the directory entry. Meaningless on a network drive.
    pub dir_entry_no: u8,
    /// 8+3 space-padded name.
    pub file_name: [u8; 11],
}

/// Byte length of a file-table entry.
pub const SFT_LEN: usize = 43;

impl Sft {
    /// Immutable view over a caller-provided byte range.
    pub fn view(bytes: &[u8]) -> Result<&Sft, DosError> {
        Sft::ref_from_prefix(bytes)
            .map(|(sft, _)| sft)
            .map_err(|_| DosError::INVALID_HANDLE)
    }

    /// Mutable view over a caller-provided byte range.
    pub fn view_mut(bytes: &mut [u8]) -> Result<&mut Sft, DosError> {
        Sft::mut_from_prefix(bytes)
            .map(|(sft, _)| sft)
            .map_err(|_| DosError::INVALID_HANDLE)
    }

    /// Local drive ordinal the entry belongs to.
    pub fn drive_ordinal(&self) -> u8 {
        (self.dev_info.get() & DEV_INFO_DRIVE_MASK) as u8
    }
}

/// Directory scan cursor (21 bytes). Written by FINDFIRST, consumed and
/// advanced by FINDNEXT.
#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct SearchBlock {
    /// Drive byte; bit 7 marks a network scan.
    pub drive: u8,
    /// 8+3 search template.
    pub template: [u8; 11],
    /// Attribute mask of the scan.
    pub attr_mask: u8,
    /// Index of the last entry delivered.
    pub dir_entry: U16,
    /// Identifier of the directory being scanned.
    pub parent: U16,
    /// Reserved for the host.
    pub reserved: [u8; 4],
}

/// Byte length of a scan cursor.
pub const SEARCH_BLOCK_LEN: usize = 21;

impl SearchBlock {
    /// Immutable view over a caller-provided byte range.
    pub fn view(bytes: &[u8]) -> Result<&SearchBlock, DosError> {
        SearchBlock::ref_from_prefix(bytes)
            .map(|(sdb, _)| sdb)
            .map_err(|_| DosError::FILE_NOT_FOUND)
    }

    /// Mutable view over a caller-provided byte range.
    pub fn view_mut(bytes: &mut [u8]) -> Result<&mut SearchBlock, DosError> {
        SearchBlock::mut_from_prefix(bytes)
            .map(|(sdb, _)| sdb)
            .map_err(|_| DosError::FILE_NOT_FOUND)
    }

    /// Local drive ordinal the scan runs on.
    pub fn drive_ordinal(&self) -> u8 {
        self.drive & SDB_DRIVE_MASK
    }
}

/// Found-file record (32 bytes), filled next to the scan cursor after a
/// successful enumeration step.
#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct FoundFile {
    /// 8+3 space-padded name of the entry.
    pub name: [u8; 11],
    /// Attribute byte of the entry.
    pub attr: u8,
    /// Reserved for the host.
    pub reserved: [u8; 10],
    /// Packed DOS time of last update.
    pub time: U16,
    /// Packed DOS date of last update.
    pub date: U16,
    /// Starting cluster. Meaningless on a network drive.
    pub cluster: U16,
    /// Size in bytes.
    pub size: U32,
}

/// Byte length of a found-file record.
pub const FOUND_FILE_LEN: usize = 32;

impl FoundFile {
    /// Mutable view over a caller-provided byte range.
    pub fn view_mut(bytes: &mut [u8]) -> Result<&mut FoundFile, DosError> {
        FoundFile::mut_from_prefix(bytes)
            .map(|(found, _)| found)
            .map_err(|_| DosError::FILE_NOT_FOUND)
    }
}

/// Current-directory structure, reduced to the prefix the engine touches:
/// the working path and the flag word.
#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct Cds {
    /// NUL-terminated working path, including the drive prefix.
    pub current_path: [u8; 67],
    /// See [`CdsFlags`].
    pub flags: U16,
}

/// Byte length of the engine-relevant CDS prefix.
pub const CDS_LEN: usize = 69;

impl Cds {
    /// Immutable view over a caller-provided byte range.
    pub fn view(bytes: &[u8]) -> Result<&Cds, DosError> {
        Cds::ref_from_prefix(bytes)
            .map(|(cds, _)| cds)
            .map_err(|_| DosError::PATH_NOT_FOUND)
    }

    /// Mutable view over a caller-provided byte range.
    pub fn view_mut(bytes: &mut [u8]) -> Result<&mut Cds, DosError> {
        Cds::mut_from_prefix(bytes)
            .map(|(cds, _)| cds)
            .map_err(|_| DosError::PATH_NOT_FOUND)
    }

    /// The working path up to its NUL terminator.
    pub fn path(&self) -> &[u8] {
        match memchr(0, &self.current_path) {
            Some(end) => &self.current_path[..end],
            None => &self.current_path[..],
        }
    }

    /// Local drive ordinal named by the working path.
    pub fn drive_ordinal(&self) -> Option<u8> {
        mapping::drive_ordinal(*self.current_path.first()?)
    }

    /// Mark the drive as a live network drive and reset its working path
    /// to the root. Done once per mapping at install time.
    pub fn attach(&mut self, local: u8) {
        self.current_path = [0; 67];
        self.current_path[0] = b'A' + local;
        self.current_path[1] = b':';
        self.current_path[2] = b'\\';
        self.flags
            .set((CdsFlags::NETWORK | CdsFlags::PHYSICAL).bits());
    }

    /// Clear the network flags at unload, handing the letter back to the
    /// host.
    pub fn detach(&mut self) {
        let flags = CdsFlags::from_bits_retain(self.flags.get())
            - (CdsFlags::NETWORK | CdsFlags::PHYSICAL);
        self.flags.set(flags.bits());
    }
}
