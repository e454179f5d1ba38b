//! Linux packet-driver shim.
//!
//! A raw `AF_PACKET` socket bound to one interface and filtered on the
//! EtherDFS EtherType, playing the role the DOS packet driver plays for
//! the original engine: transmit frames, and hand received frames to the
//! engine through the inbox's two-phase callback.

use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;
use std::{io, thread};

use log::debug;

use crate::channel::{Inbox, LinkDriver};
use crate::ll::frame::ETHERTYPE;

/// Staging buffer for frames coming off the socket. Anything larger than
/// the engine's receive buffer is refused by the inbox and dropped.
const STAGING_SIZE: usize = 2048;

/// Raw socket speaking EtherDFS on one interface.
#[derive(Debug)]
pub struct PacketSocket {
    fd: OwnedFd,
    mac: [u8; 6],
}

impl PacketSocket {
    /// Open a raw socket on `interface`, filtered to the EtherDFS
    /// EtherType.
    pub fn open(interface: &str) -> io::Result<Arc<PacketSocket>> {
        let ifindex = nix::net::if_::if_nametoindex(interface).map_err(io::Error::from)?;
        let proto = u16::from_be_bytes(ETHERTYPE);

        let fd = unsafe {
            libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW,
                libc::c_int::from(proto.to_be()),
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
        addr.sll_family = libc::AF_PACKET as libc::sa_family_t;
        addr.sll_protocol = proto.to_be();
        addr.sll_ifindex = ifindex as libc::c_int;
        let rc = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                std::ptr::from_ref(&addr).cast::<libc::sockaddr>(),
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        let mac = hardware_address(fd.as_raw_fd(), interface)?;
        Ok(Arc::new(PacketSocket { fd, mac }))
    }

    /// Hardware address of the bound interface, used as the engine's
    /// local MAC.
    pub fn local_mac(&self) -> [u8; 6] {
        self.mac
    }

    /// Start the receive thread feeding `inbox`. The thread ends when the
    /// socket is closed.
    pub fn spawn_receiver(self: Arc<Self>, inbox: Arc<Inbox>) -> io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name(String::from("ethdfs-recv"))
            .spawn(move || self.receive_loop(&inbox))
    }

    fn receive_loop(&self, inbox: &Inbox) {
        let mut staging = [0u8; STAGING_SIZE];
        loop {
            let n = unsafe {
                libc::recv(
                    self.fd.as_raw_fd(),
                    staging.as_mut_ptr().cast(),
                    staging.len(),
                    0,
                )
            };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                debug!("receive loop ending: {err}");
                return;
            }
            let len = n as usize;
            match inbox.begin_receive(len) {
                Some(mut slot) => {
                    slot.buffer().copy_from_slice(&staging[..len]);
                    slot.commit();
                }
                None => debug!("inbox busy, dropping a {len}-byte frame"),
            }
        }
    }
}

impl LinkDriver for PacketSocket {
    fn send(&self, frame: &[u8]) -> io::Result<()> {
        let n = unsafe {
            libc::send(
                self.fd.as_raw_fd(),
                frame.as_ptr().cast(),
                frame.len(),
                0,
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

/// Query the interface MAC through `SIOCGIFHWADDR`.
fn hardware_address(fd: RawFd, interface: &str) -> io::Result<[u8; 6]> {
    let mut req: libc::ifreq = unsafe { mem::zeroed() };
    let name = interface.as_bytes();
    if name.len() >= req.ifr_name.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "interface name too long",
        ));
    }
    for (dst, &src) in req.ifr_name.iter_mut().zip(name) {
        *dst = src as libc::c_char;
    }
    let rc = unsafe { libc::ioctl(fd, libc::SIOCGIFHWADDR, &mut req) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    let hwaddr = unsafe { req.ifr_ifru.ifru_hwaddr };
    let mut mac = [0u8; 6];
    for (dst, &src) in mac.iter_mut().zip(&hwaddr.sa_data[..6]) {
        *dst = src as u8;
    }
    Ok(mac)
}
