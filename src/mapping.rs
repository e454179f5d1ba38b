//! Drive mapping table.
//!
//! One slot per local drive letter. A mapped slot names the remote drive
//! ordinal served by the peer; all mappings share the single peer address
//! held by the transport.

use std::{error, fmt};

/// Number of drive letters the host knows (A..Z).
pub const DRIVE_COUNT: usize = 26;

/// Ordinal of a drive letter, accepting both cases.
pub fn drive_ordinal(letter: u8) -> Option<u8> {
    match letter {
        b'A'..=b'Z' => Some(letter - b'A'),
        b'a'..=b'z' => Some(letter - b'a'),
        _ => None,
    }
}

/// Upper-case letter of a drive ordinal.
pub fn drive_letter(ordinal: u8) -> char {
    char::from(b'A' + (ordinal % DRIVE_COUNT as u8))
}

/// Error raised when a mapping cannot be added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// Ordinal outside A..Z.
    OutOfRange(u8),
    /// The local letter already carries a mapping.
    Occupied(u8),
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::OutOfRange(ord) => write!(f, "drive ordinal {ord} out of range"),
            MapError::Occupied(ord) => {
                write!(f, "drive {}: already mapped", drive_letter(*ord))
            }
        }
    }
}

impl error::Error for MapError {}

/// Local-letter → remote-letter table. Unmapped slots are `None`.
#[derive(Debug, Clone, Default)]
pub struct DriveTable {
    slots: [Option<u8>; DRIVE_COUNT],
}

impl DriveTable {
    /// An empty table.
    pub fn new() -> DriveTable {
        DriveTable::default()
    }

    /// Bind local ordinal `local` to remote ordinal `remote`. Each local
    /// letter carries at most one mapping.
    pub fn map(&mut self, local: u8, remote: u8) -> Result<(), MapError> {
        if usize::from(local) >= DRIVE_COUNT {
            return Err(MapError::OutOfRange(local));
        }
        if usize::from(remote) >= DRIVE_COUNT {
            return Err(MapError::OutOfRange(remote));
        }
        let slot = &mut self.slots[usize::from(local)];
        if slot.is_some() {
            return Err(MapError::Occupied(local));
        }
        *slot = Some(remote);
        Ok(())
    }

    /// Remove the mapping of a local ordinal, if any.
    pub fn unmap(&mut self, local: u8) {
        if let Some(slot) = self.slots.get_mut(usize::from(local)) {
            *slot = None;
        }
    }

    /// Remote ordinal bound to `local`, or `None` when the letter is not
    /// ours.
    pub fn remote_of(&self, local: u8) -> Option<u8> {
        self.slots.get(usize::from(local)).copied().flatten()
    }

    /// First mapping in letter order, as `(local, remote)`.
    pub fn first_mapped(&self) -> Option<(u8, u8)> {
        self.iter_mapped().next()
    }

    /// All mappings in letter order, as `(local, remote)`.
    pub fn iter_mapped(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.map(|remote| (i as u8, remote)))
    }

    /// True when no letter is mapped.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Drop every mapping.
    pub fn clear(&mut self) {
        self.slots = [None; DRIVE_COUNT];
    }
}
