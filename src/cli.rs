//! Command-line parsing.
//!
//! `ethdfs SRVMAC rdrv-ldrv [rdrv2-ldrv2 …] [/p=HH] [/n] [/q] [/u]`
//!
//! `SRVMAC` is the server address or `::` to discover one by broadcast;
//! each `rdrv-ldrv` pair maps a remote letter onto a local one (`C-F`
//! serves the server's C: as the local F:). Switches may appear anywhere
//! and are case-insensitive.

use std::{error, fmt};

use crate::mapping::{self, drive_letter};

/// Usage text printed alongside parse errors.
pub const USAGE: &str = "\
usage: ethdfs SRVMAC rdrv-ldrv [rdrv2-ldrv2 ...] [/p=HH] [/n] [/q] [/u]

  SRVMAC      server MAC address (xx:xx:xx:xx:xx:xx), or :: to discover
  rdrv-ldrv   map remote drive onto local drive (example: C-F)
  /p=HH       packet driver vector in hex, 60..80 (default: scan)
  /n          disable frame checksums
  /q          quiet: report errors only
  /u          unload the resident engine (must appear alone)
";

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    /// Server address; `None` requests discovery.
    pub peer: Option<[u8; 6]>,
    /// Letter mappings as `(local, remote)` ordinals.
    pub mappings: Vec<(u8, u8)>,
    /// Packet driver interrupt vector, when pinned with `/p`.
    pub vector: Option<u8>,
    /// Frame checksums enabled (cleared by `/n`).
    pub checksum: bool,
    /// Suppress non-error output (`/q`).
    pub quiet: bool,
    /// Unload a resident engine instead of installing (`/u`).
    pub unload: bool,
}

/// Error that may occur while parsing the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// No server address given.
    MissingServer,
    /// Server address not a MAC nor `::`.
    BadServer(String),
    /// Mapping argument not of the `X-Y` letter form.
    BadMapping(String),
    /// Unrecognized `/` switch.
    BadSwitch(String),
    /// `/p` value not hex or outside the 60..80 scan window.
    BadVector(String),
    /// The same local letter mapped twice.
    DuplicateDrive(char),
    /// `/u` combined with a server or mappings.
    UnloadConflict,
    /// A server was given but no mapping.
    NoMappings,
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageError::MissingServer => write!(f, "missing server MAC address"),
            UsageError::BadServer(arg) => write!(f, "not a MAC address: {arg}"),
            UsageError::BadMapping(arg) => write!(f, "not a drive mapping: {arg}"),
            UsageError::BadSwitch(arg) => write!(f, "unknown switch: {arg}"),
            UsageError::BadVector(arg) => {
                write!(f, "bad packet driver vector (expect hex 60..80): {arg}")
            }
            UsageError::DuplicateDrive(letter) => {
                write!(f, "local drive {letter}: mapped twice")
            }
            UsageError::UnloadConflict => {
                write!(f, "/u cannot be combined with a server or mappings")
            }
            UsageError::NoMappings => write!(f, "no drive mappings given"),
        }
    }
}

impl error::Error for UsageError {}

/// Parse a command line (without the program name).
pub fn parse<S: AsRef<str>>(argv: &[S]) -> Result<Args, UsageError> {
    let mut args = Args {
        peer: None,
        mappings: Vec::new(),
        vector: None,
        checksum: true,
        quiet: false,
        unload: false,
    };
    // Outer None: no server argument seen yet. Inner None: discovery.
    let mut server: Option<Option<[u8; 6]>> = None;

    for raw in argv {
        let arg = raw.as_ref();
        if let Some(switch) = arg.strip_prefix('/') {
            match switch.to_ascii_lowercase().as_str() {
                "n" => args.checksum = false,
                "q" => args.quiet = true,
                "u" => args.unload = true,
                other => {
                    if let Some(hex) = other.strip_prefix("p=") {
                        let vector = u8::from_str_radix(hex, 16)
                            .map_err(|_| UsageError::BadVector(arg.to_string()))?;
                        if !(0x60..=0x80).contains(&vector) {
                            return Err(UsageError::BadVector(arg.to_string()));
                        }
                        args.vector = Some(vector);
                    } else {
                        return Err(UsageError::BadSwitch(arg.to_string()));
                    }
                }
            }
        } else if server.is_none() {
            server = Some(if arg == "::" {
                None
            } else {
                Some(parse_mac(arg).ok_or_else(|| UsageError::BadServer(arg.to_string()))?)
            });
        } else {
            let (local, remote) =
                parse_mapping(arg).ok_or_else(|| UsageError::BadMapping(arg.to_string()))?;
            if args.mappings.iter().any(|&(l, _)| l == local) {
                return Err(UsageError::DuplicateDrive(drive_letter(local)));
            }
            args.mappings.push((local, remote));
        }
    }

    if args.unload {
        if server.is_some() || !args.mappings.is_empty() {
            return Err(UsageError::UnloadConflict);
        }
        return Ok(args);
    }
    args.peer = server.ok_or(UsageError::MissingServer)?;
    if args.mappings.is_empty() {
        return Err(UsageError::NoMappings);
    }
    Ok(args)
}

/// `xx:xx:xx:xx:xx:xx`, any case.
fn parse_mac(arg: &str) -> Option<[u8; 6]> {
    let mut mac = [0u8; 6];
    let mut parts = arg.split(':');
    for byte in &mut mac {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 2 {
            return None;
        }
        *byte = u8::from_str_radix(part, 16).ok()?;
    }
    parts.next().is_none().then_some(mac)
}

/// `R-L` letter pair, returned as `(local, remote)` ordinals.
fn parse_mapping(arg: &str) -> Option<(u8, u8)> {
    let bytes = arg.as_bytes();
    if bytes.len() != 3 || bytes[1] != b'-' {
        return None;
    }
    let remote = mapping::drive_ordinal(bytes[0])?;
    let local = mapping::drive_ordinal(bytes[2])?;
    Some((local, remote))
}
