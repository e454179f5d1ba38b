//! Host operation dispatcher.
//!
//! Each recognized host filesystem call is marshaled into a request frame,
//! exchanged through the transport, and its reply written back into the
//! host-visible control blocks. The dispatcher first routes the call to a
//! local drive ordinal; calls naming a letter the engine does not serve are
//! chained to the previous handler untouched, producing no wire traffic.

use log::debug;
use zerocopy::FromBytes;

use crate::host::{
    Cds, DEV_INFO_REMOTE, DosError, FoundFile, OPEN_ACCESS_MASK, OPEN_ACCESS_READ,
    OPEN_ACCESS_WRITE, SDB_DRIVE_NETWORK, SearchBlock, Sft,
};
use crate::ll::frame::{BROADCAST_MAC, FRAME_SIZE, PAYLOAD_OFFSET};
use crate::ll::opcode::Opcode;
use crate::ll::reply::{
    DISKSPACE_REPLY_LEN, DiskSpaceReply, FIND_REPLY_LEN, FindReply, GETATTR_REPLY_LEN,
    GetAttrReply, OPEN_REPLY_LEN, OpenReply, SEEK_REPLY_LEN, SeekReply,
};
use crate::mapping::{self, DRIVE_COUNT, DriveTable};
use crate::path;
use crate::transport::{Reply, Transport, TransportError};

/// Largest data chunk of one read request.
const READ_CHUNK: usize = FRAME_SIZE - PAYLOAD_OFFSET;
/// Largest data chunk of one write request (the payload also carries the
/// six-byte offset/fileid header).
const WRITE_CHUNK: usize = FRAME_SIZE - PAYLOAD_OFFSET - 6;
/// Wire size of one record-lock range.
const LOCK_RECORD_LEN: usize = 8;

/// Register image handed back to the host on success.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Regs {
    /// AX: op-specific (attribute byte, sectors per cluster, position low).
    pub ax: u16,
    /// BX: op-specific (total clusters, size high word).
    pub bx: u16,
    /// CX: op-specific (byte count, time word, extended-open result).
    pub cx: u16,
    /// DX: op-specific (free clusters, date word, position high).
    pub dx: u16,
    /// DI: op-specific (size low word).
    pub di: u16,
}

/// A host filesystem call, carrying views of the host-owned blocks the
/// operation reads and mutates.
#[derive(Debug)]
pub enum HostCall<'a> {
    /// Remove a directory. The current-directory structure guards against
    /// removing the working directory.
    RemoveDir {
        /// Fully-qualified path with drive prefix.
        path: &'a [u8],
        /// CDS of the drive, for the working-directory guard.
        cds: &'a [u8],
    },
    /// Create a directory.
    MakeDir {
        /// Fully-qualified path with drive prefix.
        path: &'a [u8],
    },
    /// Probe a directory for existence; the host updates its own CDS.
    ChangeDir {
        /// Fully-qualified path with drive prefix.
        path: &'a [u8],
    },
    /// Close an open file.
    Close {
        /// File-table entry of the handle.
        sft: &'a mut [u8],
    },
    /// Commit an open file. Succeeds without wire traffic.
    Commit {
        /// File-table entry of the handle.
        sft: &'a [u8],
    },
    /// Read from an open file into the host's transfer area.
    Read {
        /// File-table entry of the handle.
        sft: &'a mut [u8],
        /// Disk transfer area receiving the data.
        dta: &'a mut [u8],
        /// Bytes requested.
        count: u16,
    },
    /// Write to an open file. An empty `data` truncates at the current
    /// position.
    Write {
        /// File-table entry of the handle.
        sft: &'a mut [u8],
        /// Bytes to write.
        data: &'a [u8],
    },
    /// Lock (`function` 0) or unlock (`function` 1) record ranges.
    Lock {
        /// File-table entry of the handle.
        sft: &'a [u8],
        /// Subfunction from BL; anything but 0 or 1 fails locally.
        function: u8,
        /// Packed 8-byte lock records.
        records: &'a [u8],
    },
    /// Query cluster geometry and free space.
    DiskSpace {
        /// CDS naming the drive to query.
        cds: &'a [u8],
    },
    /// Set the attribute byte of a path.
    SetAttr {
        /// Fully-qualified path with drive prefix.
        path: &'a [u8],
        /// New attribute byte.
        attr: u8,
    },
    /// Query attributes, timestamps and size of a path.
    GetAttr {
        /// Fully-qualified path with drive prefix.
        path: &'a [u8],
    },
    /// Rename within one drive.
    Rename {
        /// Existing fully-qualified path.
        old: &'a [u8],
        /// New fully-qualified path, same drive letter.
        new: &'a [u8],
    },
    /// Delete files matching a path.
    Delete {
        /// Fully-qualified path, wildcards allowed.
        path: &'a [u8],
    },
    /// Open an existing file.
    Open {
        /// File-table entry to populate.
        sft: &'a mut [u8],
        /// Fully-qualified path, no wildcards.
        path: &'a [u8],
        /// Open-mode word from the host stack.
        stack_word: u16,
    },
    /// Create or truncate a file.
    Create {
        /// File-table entry to populate.
        sft: &'a mut [u8],
        /// Fully-qualified path, no wildcards.
        path: &'a [u8],
        /// Attribute word from the host stack.
        stack_word: u16,
    },
    /// Extended open with action codes.
    ExtendedOpen {
        /// File-table entry to populate.
        sft: &'a mut [u8],
        /// Fully-qualified path, no wildcards.
        path: &'a [u8],
        /// Attribute word from the host stack.
        stack_word: u16,
        /// Action code (fail/open/replace if exists, fail/create if not).
        action: u16,
        /// Requested open mode.
        mode: u16,
    },
    /// Start a directory enumeration.
    FindFirst {
        /// Scan cursor to initialize.
        cursor: &'a mut [u8],
        /// Found-file record to fill.
        found: &'a mut [u8],
        /// Fully-qualified search path, wildcards allowed.
        path: &'a [u8],
        /// Attribute mask of the scan.
        attr: u8,
        /// CDS naming the drive the scan runs on.
        cds: &'a [u8],
    },
    /// Continue a directory enumeration.
    FindNext {
        /// Scan cursor from the previous step.
        cursor: &'a mut [u8],
        /// Found-file record to fill.
        found: &'a mut [u8],
    },
    /// Seek relative to end-of-file. The position stays host-owned: the
    /// engine reports the new absolute position without touching the
    /// file-table entry.
    SeekFromEnd {
        /// File-table entry of the handle.
        sft: &'a [u8],
        /// Signed offset from end-of-file.
        offset: i32,
    },
    /// Undocumented subfunction 0x2D; answered locally.
    Unknown2D {
        /// File-table entry the host passed along.
        sft: &'a [u8],
    },
}

impl HostCall<'_> {
    fn label(&self) -> &'static str {
        match self {
            HostCall::RemoveDir { .. } => "rmdir",
            HostCall::MakeDir { .. } => "mkdir",
            HostCall::ChangeDir { .. } => "chdir",
            HostCall::Close { .. } => "close",
            HostCall::Commit { .. } => "commit",
            HostCall::Read { .. } => "read",
            HostCall::Write { .. } => "write",
            HostCall::Lock { .. } => "lock",
            HostCall::DiskSpace { .. } => "diskspace",
            HostCall::SetAttr { .. } => "setattr",
            HostCall::GetAttr { .. } => "getattr",
            HostCall::Rename { .. } => "rename",
            HostCall::Delete { .. } => "delete",
            HostCall::Open { .. } => "open",
            HostCall::Create { .. } => "create",
            HostCall::ExtendedOpen { .. } => "spopen",
            HostCall::FindFirst { .. } => "findfirst",
            HostCall::FindNext { .. } => "findnext",
            HostCall::SeekFromEnd { .. } => "skfmend",
            HostCall::Unknown2D { .. } => "unknown2d",
        }
    }
}

/// Outcome of offering a host call to the engine.
#[derive(Debug)]
pub enum Dispatch {
    /// The call names a drive the engine does not serve; pass it to the
    /// previous handler unchanged.
    Chain,
    /// The call was ours; the register image or host error to return.
    Handled(Result<Regs, DosError>),
}

impl From<TransportError> for DosError {
    fn from(err: TransportError) -> DosError {
        match err {
            TransportError::Network => DosError::FILE_NOT_FOUND,
            TransportError::Peer(ax) => DosError(ax),
            TransportError::Length { .. } => DosError::FILE_NOT_FOUND,
        }
    }
}

/// Reject a reply whose result word or payload size breaks the operation's
/// contract.
fn expect_shape(reply: Reply, expected: usize) -> Result<Reply, TransportError> {
    if reply.ax != 0 {
        return Err(TransportError::Peer(reply.ax));
    }
    if reply.data.len() != expected {
        return Err(TransportError::Length {
            expected,
            actual: reply.data.len(),
        });
    }
    Ok(reply)
}

/// The redirector engine: transport plus drive mappings, mutating
/// host-owned blocks one synchronous call at a time.
#[derive(Debug)]
pub struct Redirector {
    transport: Transport,
    drives: DriveTable,
}

impl Redirector {
    /// Assemble an engine from a ready transport and a mapping table.
    pub fn new(transport: Transport, drives: DriveTable) -> Redirector {
        Redirector { transport, drives }
    }

    /// The mapping table.
    pub fn drives(&self) -> &DriveTable {
        &self.drives
    }

    /// The mapping table, for install/unload bookkeeping.
    pub fn drives_mut(&mut self) -> &mut DriveTable {
        &mut self.drives
    }

    /// The server bound to the mappings.
    pub fn peer(&self) -> [u8; 6] {
        self.transport.peer()
    }

    /// Offer a host call to the engine.
    pub fn dispatch(&mut self, call: HostCall<'_>) -> Dispatch {
        let Some(local) = Self::route(&call) else {
            return Dispatch::Chain;
        };
        let Some(remote) = self.drives.remote_of(local) else {
            return Dispatch::Chain;
        };
        debug!(
            "{} on local {} (remote {})",
            call.label(),
            mapping::drive_letter(local),
            mapping::drive_letter(remote),
        );
        Dispatch::Handled(self.execute(call, local, remote))
    }

    /// Compute the local drive ordinal a call is aimed at. Every op class
    /// has its own authoritative source.
    fn route(call: &HostCall<'_>) -> Option<u8> {
        let ordinal = match call {
            // File-handle ops: low six bits of the SFT device-info word.
            HostCall::Close { sft } => Sft::view(sft).ok()?.drive_ordinal(),
            HostCall::Commit { sft }
            | HostCall::Lock { sft, .. }
            | HostCall::SeekFromEnd { sft, .. }
            | HostCall::Unknown2D { sft } => Sft::view(sft).ok()?.drive_ordinal(),
            HostCall::Read { sft, .. } | HostCall::Write { sft, .. } => {
                Sft::view(sft).ok()?.drive_ordinal()
            }
            // Enumeration resume: low five bits of the cursor's drive byte.
            HostCall::FindNext { cursor, .. } => {
                SearchBlock::view(cursor).ok()?.drive_ordinal()
            }
            // Path ops: letter of the first filename argument.
            HostCall::RemoveDir { path, .. }
            | HostCall::MakeDir { path }
            | HostCall::ChangeDir { path }
            | HostCall::SetAttr { path, .. }
            | HostCall::GetAttr { path }
            | HostCall::Delete { path }
            | HostCall::Open { path, .. }
            | HostCall::Create { path, .. }
            | HostCall::ExtendedOpen { path, .. } => {
                mapping::drive_ordinal(*path.first()?)?
            }
            HostCall::Rename { old, .. } => mapping::drive_ordinal(*old.first()?)?,
            // Everything else: letter of the indicated working directory.
            HostCall::DiskSpace { cds } | HostCall::FindFirst { cds, .. } => {
                Cds::view(cds).ok()?.drive_ordinal()?
            }
        };
        (usize::from(ordinal) < DRIVE_COUNT).then_some(ordinal)
    }

    fn execute(&mut self, call: HostCall<'_>, local: u8, remote: u8) -> Result<Regs, DosError> {
        match call {
            HostCall::RemoveDir { path, cds } => self.remove_dir(remote, path, cds),
            HostCall::MakeDir { path } => self.subdir(Opcode::MkDir, remote, path),
            HostCall::ChangeDir { path } => self.subdir(Opcode::ChDir, remote, path),
            HostCall::Close { sft } => self.close(remote, sft),
            HostCall::Commit { .. } => Ok(Regs::default()),
            HostCall::Read { sft, dta, count } => self.read(remote, sft, dta, count),
            HostCall::Write { sft, data } => self.write(remote, sft, data),
            HostCall::Lock {
                sft,
                function,
                records,
            } => self.lock(remote, sft, function, records),
            HostCall::DiskSpace { .. } => self.disk_space(remote),
            HostCall::SetAttr { path, attr } => self.set_attr(remote, path, attr),
            HostCall::GetAttr { path } => self.get_attr(remote, path),
            HostCall::Rename { old, new } => self.rename(remote, old, new),
            HostCall::Delete { path } => self.delete(remote, path),
            HostCall::Open {
                sft,
                path,
                stack_word,
            } => self.open(Opcode::OpenFile, local, remote, sft, path, stack_word, 0, 0),
            HostCall::Create {
                sft,
                path,
                stack_word,
            } => self.open(
                Opcode::CreateFile,
                local,
                remote,
                sft,
                path,
                stack_word,
                0,
                0,
            ),
            HostCall::ExtendedOpen {
                sft,
                path,
                stack_word,
                action,
                mode,
            } => self.open(
                Opcode::ExtendedOpen,
                local,
                remote,
                sft,
                path,
                stack_word,
                action,
                mode,
            ),
            HostCall::FindFirst {
                cursor,
                found,
                path,
                attr,
                ..
            } => self.find_first(local, remote, cursor, found, path, attr),
            HostCall::FindNext { cursor, found } => self.find_next(remote, cursor, found),
            HostCall::SeekFromEnd { sft, offset } => self.seek_from_end(remote, sft, offset),
            HostCall::Unknown2D { .. } => Err(DosError::FILE_NOT_FOUND),
        }
    }

    /// Copy `parts` into the payload area back to back, returning the
    /// staged length.
    fn stage(&mut self, parts: &[&[u8]]) -> Result<usize, DosError> {
        let payload = self.transport.payload_mut();
        let total: usize = parts.iter().map(|p| p.len()).sum();
        if total > payload.len() {
            return Err(DosError::PATH_NOT_FOUND);
        }
        let mut at = 0;
        for part in parts {
            payload[at..at + part.len()].copy_from_slice(part);
            at += part.len();
        }
        Ok(total)
    }

    fn subdir(&mut self, op: Opcode, remote: u8, path: &[u8]) -> Result<Regs, DosError> {
        let tail = path::strip_drive(path).ok_or(DosError::PATH_NOT_FOUND)?;
        let len = self.stage(&[tail])?;
        let reply = self.transport.request(op, remote, len, false)?;
        expect_shape(reply, 0)?;
        Ok(Regs::default())
    }

    fn remove_dir(&mut self, remote: u8, path: &[u8], cds: &[u8]) -> Result<Regs, DosError> {
        let tail = path::strip_drive(path).ok_or(DosError::PATH_NOT_FOUND)?;
        let current = Cds::view(cds)?;
        let current_tail = path::strip_drive(current.path()).unwrap_or(b"");
        if tail.eq_ignore_ascii_case(current_tail) {
            return Err(DosError::CURRENT_DIRECTORY);
        }
        let len = self.stage(&[tail])?;
        let reply = self.transport.request(Opcode::RmDir, remote, len, false)?;
        expect_shape(reply, 0)?;
        Ok(Regs::default())
    }

    fn close(&mut self, remote: u8, sft_bytes: &mut [u8]) -> Result<Regs, DosError> {
        // Drop the host's handle first; the server is told afterwards so a
        // dead link cannot wedge the handle open.
        let fileid = {
            let sft = Sft::view_mut(sft_bytes)?;
            let handles = sft.handle_count.get();
            sft.handle_count.set(handles.saturating_sub(1));
            sft.fileid.get()
        };
        let len = self.stage(&[&fileid.to_le_bytes()])?;
        let reply = self
            .transport
            .request(Opcode::CloseFile, remote, len, false)?;
        expect_shape(reply, 0)?;
        Ok(Regs::default())
    }

    fn read(
        &mut self,
        remote: u8,
        sft_bytes: &mut [u8],
        dta: &mut [u8],
        count: u16,
    ) -> Result<Regs, DosError> {
        let (open_mode, fileid, start_pos) = {
            let sft = Sft::view(sft_bytes)?;
            (sft.open_mode.get(), sft.fileid.get(), sft.file_pos.get())
        };
        if open_mode & OPEN_ACCESS_MASK == OPEN_ACCESS_WRITE {
            return Err(DosError::ACCESS_DENIED);
        }
        if count == 0 {
            return Ok(Regs::default());
        }

        let want = usize::from(count).min(dta.len());
        let mut pos = start_pos;
        let mut done = 0;
        let mut outcome = Ok(());
        while done < want {
            let chunk = (want - done).min(READ_CHUNK);
            let mut header = [0u8; 8];
            header[0..4].copy_from_slice(&pos.to_le_bytes());
            header[4..6].copy_from_slice(&fileid.to_le_bytes());
            header[6..8].copy_from_slice(&(chunk as u16).to_le_bytes());
            let len = match self.stage(&[&header]) {
                Ok(len) => len,
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            };
            let reply = match self.transport.request(Opcode::ReadFile, remote, len, false) {
                Ok(reply) => reply,
                Err(err) => {
                    outcome = Err(err.into());
                    break;
                }
            };
            if reply.ax != 0 {
                outcome = Err(DosError(reply.ax));
                break;
            }
            let got = reply.data.len();
            if got > chunk {
                outcome = Err(DosError::FILE_NOT_FOUND);
                break;
            }
            dta[done..done + got].copy_from_slice(&reply.data);
            pos = pos.wrapping_add(got as u32);
            done += got;
            if got < chunk {
                break; // server end-of-file
            }
        }

        // Chunks the server acknowledged stay acknowledged, error or not.
        let sft = Sft::view_mut(sft_bytes)?;
        sft.file_pos.set(pos);
        outcome.map(|()| Regs {
            cx: done as u16,
            ..Regs::default()
        })
    }

    fn write(&mut self, remote: u8, sft_bytes: &mut [u8], data: &[u8]) -> Result<Regs, DosError> {
        let (open_mode, fileid, start_pos, start_size) = {
            let sft = Sft::view(sft_bytes)?;
            (
                sft.open_mode.get(),
                sft.fileid.get(),
                sft.file_pos.get(),
                sft.file_size.get(),
            )
        };
        if open_mode & OPEN_ACCESS_MASK == OPEN_ACCESS_READ {
            return Err(DosError::ACCESS_DENIED);
        }

        let mut pos = start_pos;
        let mut size = start_size;
        let mut done = 0;
        let mut outcome = Ok(());
        // A zero-byte write still sends one frame: it truncates the file at
        // the current position.
        loop {
            let chunk = (data.len() - done).min(WRITE_CHUNK);
            let mut header = [0u8; 6];
            header[0..4].copy_from_slice(&pos.to_le_bytes());
            header[4..6].copy_from_slice(&fileid.to_le_bytes());
            let len = match self.stage(&[&header, &data[done..done + chunk]]) {
                Ok(len) => len,
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            };
            let reply = match self.transport.request(Opcode::WriteFile, remote, len, false) {
                Ok(reply) => reply,
                Err(err) => {
                    outcome = Err(err.into());
                    break;
                }
            };
            if reply.ax != 0 {
                outcome = Err(DosError(reply.ax));
                break;
            }
            if reply.data.len() != 2 {
                outcome = Err(DosError::FILE_NOT_FOUND);
                break;
            }
            let accepted = usize::from(u16::from_le_bytes([reply.data[0], reply.data[1]]));
            if accepted > chunk {
                outcome = Err(DosError::FILE_NOT_FOUND);
                break;
            }
            pos = pos.wrapping_add(accepted as u32);
            if pos > size {
                size = pos;
            }
            done += accepted;
            if data.is_empty() {
                size = pos; // truncation
                break;
            }
            if accepted < chunk {
                break; // short write: partial success, reported by count
            }
            if done >= data.len() {
                break;
            }
        }

        let sft = Sft::view_mut(sft_bytes)?;
        sft.file_pos.set(pos);
        sft.file_size.set(size);
        outcome.map(|()| Regs {
            cx: done as u16,
            ..Regs::default()
        })
    }

    fn lock(
        &mut self,
        remote: u8,
        sft_bytes: &[u8],
        function: u8,
        records: &[u8],
    ) -> Result<Regs, DosError> {
        let op = match function {
            0 => Opcode::LockFile,
            1 => Opcode::UnlockFile,
            _ => return Err(DosError::FILE_NOT_FOUND),
        };
        if records.is_empty() || records.len() % LOCK_RECORD_LEN != 0 {
            return Err(DosError::FILE_NOT_FOUND);
        }
        let count = (records.len() / LOCK_RECORD_LEN) as u16;
        let fileid = Sft::view(sft_bytes)?.fileid.get();
        let mut header = [0u8; 4];
        header[0..2].copy_from_slice(&count.to_le_bytes());
        header[2..4].copy_from_slice(&fileid.to_le_bytes());
        let len = self.stage(&[&header, records])?;
        let reply = self.transport.request(op, remote, len, false)?;
        expect_shape(reply, 0)?;
        Ok(Regs::default())
    }

    fn disk_space(&mut self, remote: u8) -> Result<Regs, DosError> {
        let reply = self
            .transport
            .request(Opcode::DiskSpace, remote, 0, false)?;
        // The result word is data here: sectors per cluster.
        if reply.data.len() != DISKSPACE_REPLY_LEN {
            return Err(DosError::FILE_NOT_FOUND);
        }
        let info =
            DiskSpaceReply::ref_from_bytes(&reply.data).map_err(|_| DosError::FILE_NOT_FOUND)?;
        Ok(Regs {
            ax: reply.ax,
            bx: info.total_clusters.get(),
            cx: info.bytes_per_sector.get(),
            dx: info.free_clusters.get(),
            di: 0,
        })
    }

    fn set_attr(&mut self, remote: u8, path: &[u8], attr: u8) -> Result<Regs, DosError> {
        let tail = path::strip_drive(path).ok_or(DosError::FILE_NOT_FOUND)?;
        if tail.is_empty() {
            return Err(DosError::FILE_NOT_FOUND);
        }
        let len = self.stage(&[&[attr], tail])?;
        let reply = self.transport.request(Opcode::SetAttr, remote, len, false)?;
        expect_shape(reply, 0)?;
        Ok(Regs::default())
    }

    fn get_attr(&mut self, remote: u8, path: &[u8]) -> Result<Regs, DosError> {
        let tail = path::strip_drive(path).ok_or(DosError::FILE_NOT_FOUND)?;
        if tail.is_empty() {
            return Err(DosError::FILE_NOT_FOUND);
        }
        let len = self.stage(&[tail])?;
        let reply = self.transport.request(Opcode::GetAttr, remote, len, false)?;
        let reply = expect_shape(reply, GETATTR_REPLY_LEN)?;
        let info =
            GetAttrReply::ref_from_bytes(&reply.data).map_err(|_| DosError::FILE_NOT_FOUND)?;
        let size = info.size.get();
        Ok(Regs {
            ax: u16::from(info.attr),
            bx: (size >> 16) as u16,
            cx: info.time.get(),
            dx: info.date.get(),
            di: size as u16,
        })
    }

    fn rename(&mut self, remote: u8, old: &[u8], new: &[u8]) -> Result<Regs, DosError> {
        let old_drive = old.first().copied().and_then(mapping::drive_ordinal);
        let new_drive = new.first().copied().and_then(mapping::drive_ordinal);
        if old_drive.is_none() || old_drive != new_drive {
            return Err(DosError::FILE_NOT_FOUND);
        }
        let old_tail = path::strip_drive(old).ok_or(DosError::FILE_NOT_FOUND)?;
        let new_tail = path::strip_drive(new).ok_or(DosError::FILE_NOT_FOUND)?;
        if old_tail.len() < 2 || new_tail.len() < 2 || old_tail.len() > usize::from(u8::MAX) {
            return Err(DosError::FILE_NOT_FOUND);
        }
        if path::has_wildcard(new_tail) {
            return Err(DosError::PATH_NOT_FOUND);
        }
        let len = self.stage(&[&[old_tail.len() as u8], old_tail, new_tail])?;
        let reply = self.transport.request(Opcode::Rename, remote, len, false)?;
        expect_shape(reply, 0)?;
        Ok(Regs::default())
    }

    fn delete(&mut self, remote: u8, path: &[u8]) -> Result<Regs, DosError> {
        let tail = path::strip_drive(path).ok_or(DosError::FILE_NOT_FOUND)?;
        if tail.is_empty() {
            return Err(DosError::FILE_NOT_FOUND);
        }
        let len = self.stage(&[tail])?;
        let reply = self.transport.request(Opcode::Delete, remote, len, false)?;
        expect_shape(reply, 0)?;
        Ok(Regs::default())
    }

    #[allow(clippy::too_many_arguments)]
    fn open(
        &mut self,
        op: Opcode,
        local: u8,
        remote: u8,
        sft_bytes: &mut [u8],
        path: &[u8],
        stack_word: u16,
        action: u16,
        mode: u16,
    ) -> Result<Regs, DosError> {
        let tail = path::strip_drive(path).ok_or(DosError::PATH_NOT_FOUND)?;
        if tail.is_empty() || path::has_wildcard(tail) {
            return Err(DosError::PATH_NOT_FOUND);
        }
        // Action and mode only matter to the extended open but are always
        // transmitted.
        let mut header = [0u8; 6];
        header[0..2].copy_from_slice(&stack_word.to_le_bytes());
        header[2..4].copy_from_slice(&action.to_le_bytes());
        header[4..6].copy_from_slice(&mode.to_le_bytes());
        let len = self.stage(&[&header, tail])?;
        let reply = self.transport.request(op, remote, len, false)?;
        let reply = expect_shape(reply, OPEN_REPLY_LEN)?;
        let info = OpenReply::ref_from_bytes(&reply.data).map_err(|_| DosError::FILE_NOT_FOUND)?;

        let granted = info.mode.get();
        let sft = Sft::view_mut(sft_bytes)?;
        sft.open_mode
            .set((sft.open_mode.get() & 0xFF00) | (granted & 0x00FF));
        sft.file_attr = info.attr;
        sft.dev_info.set(DEV_INFO_REMOTE | u16::from(local));
        sft.fileid = info.fileid;
        sft.file_time = info.time;
        sft.file_size = info.size;
        sft.file_pos.set(0);
        sft.rel_sector.set(0xFFFF);
        sft.abs_sector.set(0xFFFF);
        sft.dir_entry_no = 0xFF;
        sft.file_name = info.name;

        let mut regs = Regs::default();
        if op == Opcode::ExtendedOpen {
            regs.cx = granted;
        }
        Ok(regs)
    }

    fn find_first(
        &mut self,
        local: u8,
        remote: u8,
        cursor: &mut [u8],
        found: &mut [u8],
        path: &[u8],
        attr: u8,
    ) -> Result<Regs, DosError> {
        let tail = path::strip_drive(path).ok_or(DosError::FILE_NOT_FOUND)?;
        let len = self.stage(&[&[attr], tail])?;
        let reply = self
            .transport
            .request(Opcode::FindFirst, remote, len, false)?;
        let reply = expect_shape(reply, FIND_REPLY_LEN)?;
        let entry = FindReply::ref_from_bytes(&reply.data).map_err(|_| DosError::FILE_NOT_FOUND)?;

        let sdb = SearchBlock::view_mut(cursor)?;
        sdb.drive = SDB_DRIVE_NETWORK | local;
        sdb.template = path::fcb_template(tail);
        sdb.attr_mask = attr;
        sdb.dir_entry = entry.dir_entry;
        sdb.parent = entry.parent;
        Self::fill_found(found, entry)?;
        Ok(Regs::default())
    }

    fn find_next(
        &mut self,
        remote: u8,
        cursor: &mut [u8],
        found: &mut [u8],
    ) -> Result<Regs, DosError> {
        let (parent, dir_entry, attr, template) = {
            let sdb = SearchBlock::view(cursor)?;
            (
                sdb.parent.get(),
                sdb.dir_entry.get(),
                sdb.attr_mask,
                sdb.template,
            )
        };
        let mut header = [0u8; 5];
        header[0..2].copy_from_slice(&parent.to_le_bytes());
        header[2..4].copy_from_slice(&dir_entry.to_le_bytes());
        header[4] = attr;
        let len = self.stage(&[&header, &template])?;
        let reply = self
            .transport
            .request(Opcode::FindNext, remote, len, false)
            .map_err(|err| match err {
                TransportError::Network => DosError::NO_MORE_FILES,
                other => other.into(),
            })?;
        let reply = expect_shape(reply, FIND_REPLY_LEN)?;
        let entry = FindReply::ref_from_bytes(&reply.data).map_err(|_| DosError::FILE_NOT_FOUND)?;

        let sdb = SearchBlock::view_mut(cursor)?;
        sdb.dir_entry = entry.dir_entry;
        sdb.parent = entry.parent;
        Self::fill_found(found, entry)?;
        Ok(Regs::default())
    }

    fn fill_found(found_bytes: &mut [u8], entry: &FindReply) -> Result<(), DosError> {
        let found = FoundFile::view_mut(found_bytes)?;
        found.name = entry.name;
        found.attr = entry.attr;
        found.time = entry.time;
        found.date = entry.date;
        found.cluster.set(0);
        found.size = entry.size;
        Ok(())
    }

    fn seek_from_end(
        &mut self,
        remote: u8,
        sft_bytes: &[u8],
        offset: i32,
    ) -> Result<Regs, DosError> {
        let fileid = Sft::view(sft_bytes)?.fileid.get();
        let mut header = [0u8; 6];
        header[0..4].copy_from_slice(&offset.to_le_bytes());
        header[4..6].copy_from_slice(&fileid.to_le_bytes());
        let len = self.stage(&[&header])?;
        let reply = self
            .transport
            .request(Opcode::SeekFromEnd, remote, len, false)?;
        let reply = expect_shape(reply, SEEK_REPLY_LEN)?;
        let info = SeekReply::ref_from_bytes(&reply.data).map_err(|_| DosError::FILE_NOT_FOUND)?;
        let position = info.position.get();
        Ok(Regs {
            ax: position as u16,
            dx: (position >> 16) as u16,
            ..Regs::default()
        })
    }

    /// Broadcast a disk-space probe and adopt the answering server as the
    /// peer for all subsequent requests.
    pub(crate) fn discover(&mut self) -> Result<(), TransportError> {
        let Some((_, remote)) = self.drives.first_mapped() else {
            return Err(TransportError::Network);
        };
        self.transport.set_peer(BROADCAST_MAC);
        self.transport
            .request(Opcode::DiskSpace, remote, 0, true)?;
        Ok(())
    }
}
