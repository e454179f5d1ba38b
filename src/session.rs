//! Engine lifecycle.
//!
//! A session binds a set of local drive letters to one server for the
//! lifetime of the engine. It begins by validating the mappings and, when
//! no server address was given, discovering one by broadcast; it ends by
//! dropping the mappings and releasing the link driver. While the session
//! lives, its redirector serves host calls for the mapped letters.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{env, error, fmt, fs, io};

use log::{debug, info};

use crate::channel::{Channel, Inbox, LinkDriver};
use crate::dispatch::Redirector;
use crate::ll::frame::BROADCAST_MAC;
use crate::mapping::{self, DriveTable, MapError};
use crate::transport::{TickSource, Transport, TransportError};

/// Install-time configuration, assembled by the command line or the
/// embedding host.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server address; `None` requests broadcast discovery.
    pub peer: Option<[u8; 6]>,
    /// Letter mappings as `(local, remote)` ordinals.
    pub mappings: Vec<(u8, u8)>,
    /// Whether frames carry the integrity checksum.
    pub checksum: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            peer: None,
            mappings: Vec::new(),
            checksum: true,
        }
    }
}

/// Error that may occur while installing the engine.
#[derive(Debug)]
pub enum InstallError {
    /// The configuration names no drive mapping.
    NoMappings,
    /// A mapping is invalid or collides with another.
    Mapping(MapError),
    /// Broadcast discovery drew no answer.
    Discovery(TransportError),
}

impl fmt::Display for InstallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallError::NoMappings => write!(f, "no drive mappings configured"),
            InstallError::Mapping(err) => write!(f, "bad drive mapping: {err}"),
            InstallError::Discovery(err) => write!(f, "server discovery failed: {err}"),
        }
    }
}

impl error::Error for InstallError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            InstallError::NoMappings => None,
            InstallError::Mapping(err) => Some(err),
            InstallError::Discovery(err) => Some(err),
        }
    }
}

impl From<MapError> for InstallError {
    fn from(err: MapError) -> InstallError {
        InstallError::Mapping(err)
    }
}

/// A live engine bound to one server.
#[derive(Debug)]
pub struct Session {
    redirector: Redirector,
}

impl Session {
    /// Install the engine: build the mapping table, and either adopt the
    /// configured server or discover one by broadcast. Discovery failure
    /// aborts the install.
    pub fn new(
        driver: Arc<dyn LinkDriver>,
        inbox: Arc<Inbox>,
        ticks: Box<dyn TickSource>,
        local_mac: [u8; 6],
        config: Config,
    ) -> Result<Session, InstallError> {
        if config.mappings.is_empty() {
            return Err(InstallError::NoMappings);
        }
        let mut drives = DriveTable::new();
        for &(local, remote) in &config.mappings {
            drives.map(local, remote)?;
        }

        let peer = config.peer.unwrap_or(BROADCAST_MAC);
        let transport = Transport::new(
            Channel::new(driver, inbox),
            ticks,
            local_mac,
            peer,
            config.checksum,
        );
        let mut redirector = Redirector::new(transport, drives);

        if config.peer.is_none() {
            redirector.discover().map_err(InstallError::Discovery)?;
            info!("discovered server {}", format_mac(redirector.peer()));
        }
        for (local, remote) in redirector.drives().iter_mapped() {
            debug!(
                "drive {}: bound to remote {}:",
                mapping::drive_letter(local),
                mapping::drive_letter(remote)
            );
        }
        Ok(Session { redirector })
    }

    /// The dispatcher serving host calls.
    pub fn redirector(&mut self) -> &mut Redirector {
        &mut self.redirector
    }

    /// The server all mappings are bound to.
    pub fn peer(&self) -> [u8; 6] {
        self.redirector.peer()
    }

    /// Tear the engine down: every mapped letter is handed back to the
    /// host. The caller clears the per-drive CDS flags with
    /// [`crate::host::Cds::detach`] and drops the session to release the
    /// driver.
    pub fn unmount(&mut self) {
        self.redirector.drives_mut().clear();
        info!("engine unmounted");
    }
}

/// `aa:bb:cc:dd:ee:ff` rendering of a MAC address.
pub fn format_mac(mac: [u8; 6]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

const PIDFILE_NAME: &str = "ethdfs.pid";

/// Directory holding the pidfile of a running instance.
pub fn runtime_dir() -> PathBuf {
    env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(env::temp_dir)
}

/// Record this process as the resident engine.
pub fn write_pidfile(dir: &Path) -> io::Result<PathBuf> {
    let path = dir.join(PIDFILE_NAME);
    fs::write(&path, format!("{}\n", std::process::id()))?;
    Ok(path)
}

/// Process id of the resident engine, if one is recorded.
pub fn read_pidfile(dir: &Path) -> io::Result<i32> {
    let path = dir.join(PIDFILE_NAME);
    let contents = fs::read_to_string(path)?;
    contents
        .trim()
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "malformed pidfile"))
}

/// Forget the resident engine.
pub fn remove_pidfile(dir: &Path) -> io::Result<()> {
    fs::remove_file(dir.join(PIDFILE_NAME))
}
