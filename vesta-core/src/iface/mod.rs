//! # Interface manager
//!
//! Owns every detected network interface and every socket the server
//! opens on them. One socket per (interface, address, port, family),
//! datagram I/O goes through `sendmsg`/`recvmsg` so the ingress
//! interface & destination address are preserved and the egress
//! interface of a reply can be pinned.
//!
//! One `IfaceMgr` value is constructed at startup and owned by the
//! [`Server`]; sockets close when their interface (and with it the
//! manager) is dropped or on [`IfaceMgr::close_sockets`].
//!
//! [`Server`]: crate::server::Server
use std::{
    fmt::{self, Write},
    io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddrV4, SocketAddrV6},
    os::unix::prelude::{AsRawFd, RawFd},
    path::Path,
};

use socket2::{Domain, Socket, Type};
use thiserror::Error;
use tracing::{debug, trace};

pub(crate) mod detect;
pub mod pkt;
pub(crate) mod pktinfo;

pub use pkt::{Pkt4, Pkt6};

use crate::config::cli::ALL_DHCP_RELAY_AGENTS_AND_SERVERS;

/// longest hardware address we keep
pub const MAX_MAC_LEN: usize = 20;

/// RFC 8415: server responses may not be fragmented, no support for
/// datagrams over ethernet MTU
const RCVBUFSIZE: usize = 1500;

/// Errors from interface & socket management
#[derive(Error, Debug)]
pub enum IfaceError {
    /// caller named an interface that was never detected
    #[error("there is no {0} interface present")]
    UnknownIface(String),
    /// a socket for this binding already exists
    #[error("socket already open on {addr} port {port}")]
    AlreadyOpen {
        /// requested bind address
        addr: IpAddr,
        /// requested bind port
        port: u16,
    },
    /// the OS refused a socket operation
    #[error("{ctx}: {source}")]
    Os {
        /// which operation failed
        ctx: &'static str,
        /// underlying OS error
        #[source]
        source: io::Error,
    },
    /// joining the DHCPv6 multicast group failed
    #[error("failed to join {group} on {ifname}: {source}")]
    Multicast {
        /// the group we tried to join
        group: Ipv6Addr,
        /// interface the join was for
        ifname: String,
        /// underlying OS error
        #[source]
        source: io::Error,
    },
    /// no open socket fits the requested operation
    #[error("interface {0} does not have any suitable sockets open")]
    NoSuitableSocket(String),
    /// interface detection came up empty
    #[error("no interfaces detected")]
    NoIfaces,
    /// the interface stub file had an unparseable line
    #[error("malformed line in interface stub file: {line:?}")]
    StubFile {
        /// offending line
        line: String,
    },
}

fn os_err(ctx: &'static str) -> impl FnOnce(io::Error) -> IfaceError {
    move |source| IfaceError::Os { ctx, source }
}

/// An open socket, bound to one address/port on its owning interface.
/// Exclusively owned; dropping it closes the descriptor.
#[derive(Debug)]
pub struct SocketInfo {
    socket: Socket,
    addr: IpAddr,
    port: u16,
}

impl SocketInfo {
    /// take ownership of `socket` bound at `addr`/`port`
    pub fn new(socket: Socket, addr: IpAddr, port: u16) -> Self {
        Self { socket, addr, port }
    }

    /// the raw descriptor
    pub fn fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }

    /// address this socket is bound to
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    /// port this socket is bound to
    pub fn port(&self) -> u16 {
        self.port
    }

    /// true for sockets bound to an IPv6 multicast address
    pub fn is_multicast(&self) -> bool {
        matches!(self.addr, IpAddr::V6(addr) if addr.is_multicast())
    }
}

/// One detected network interface: name & OS index, hardware address,
/// state flags, bound addresses and the sockets opened on it.
#[derive(Debug, Default)]
pub struct Iface {
    name: String,
    index: u32,
    hw_type: u16,
    mac: [u8; MAX_MAC_LEN],
    mac_len: usize,
    flag_loopback: bool,
    flag_up: bool,
    flag_running: bool,
    flag_multicast: bool,
    flag_broadcast: bool,
    addrs: Vec<IpAddr>,
    sockets: Vec<SocketInfo>,
}

impl Iface {
    /// new interface with all flags down and no addresses
    pub fn new(name: &str, index: u32) -> Self {
        Iface {
            name: name.to_owned(),
            index,
            ..Default::default()
        }
    }

    /// interface name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS interface index
    pub fn index(&self) -> u32 {
        self.index
    }

    /// `name/index`, the form used in logs
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.name, self.index)
    }

    /// hardware type (1 = Ethernet)
    pub fn hw_type(&self) -> u16 {
        self.hw_type
    }

    /// significant bytes of the hardware address
    pub fn mac(&self) -> &[u8] {
        &self.mac[..self.mac_len]
    }

    /// hardware address in `aa:bb:cc` form
    pub fn plain_mac(&self) -> String {
        self.mac()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":")
    }

    /// record the hardware type & address
    pub fn set_hw_addr(&mut self, hw_type: u16, mac: &[u8]) {
        let len = mac.len().min(MAX_MAC_LEN);
        self.hw_type = hw_type;
        self.mac[..len].copy_from_slice(&mac[..len]);
        self.mac_len = len;
    }

    /// record the interface state flags
    pub fn set_flags(
        &mut self,
        loopback: bool,
        up: bool,
        running: bool,
        multicast: bool,
        broadcast: bool,
    ) {
        self.flag_loopback = loopback;
        self.flag_up = up;
        self.flag_running = running;
        self.flag_multicast = multicast;
        self.flag_broadcast = broadcast;
    }

    /// is this the loopback interface
    pub fn is_loopback(&self) -> bool {
        self.flag_loopback
    }
    /// is the interface administratively up
    pub fn is_up(&self) -> bool {
        self.flag_up
    }
    /// is the interface operationally running
    pub fn is_running(&self) -> bool {
        self.flag_running
    }
    /// does the interface support multicast
    pub fn is_multicast(&self) -> bool {
        self.flag_multicast
    }
    /// does the interface support broadcast
    pub fn is_broadcast(&self) -> bool {
        self.flag_broadcast
    }

    /// addresses bound to the interface
    pub fn addresses(&self) -> &[IpAddr] {
        &self.addrs
    }

    /// record an address on the interface
    pub fn add_address(&mut self, addr: IpAddr) {
        self.addrs.push(addr);
    }

    /// forget `addr`; true if it was present
    pub fn del_address(&mut self, addr: IpAddr) -> bool {
        let before = self.addrs.len();
        self.addrs.retain(|a| *a != addr);
        self.addrs.len() != before
    }

    /// sockets open on this interface
    pub fn sockets(&self) -> &[SocketInfo] {
        &self.sockets
    }

    /// true if a socket for this (address, port) binding is open.
    /// Address equality covers the family.
    pub fn has_socket(&self, addr: IpAddr, port: u16) -> bool {
        self.sockets
            .iter()
            .any(|sock| sock.addr == addr && sock.port == port)
    }

    /// take ownership of an open socket
    pub fn add_socket(&mut self, socket: SocketInfo) {
        self.sockets.push(socket);
    }

    /// close & remove the socket with descriptor `fd`; true if found
    pub fn del_socket(&mut self, fd: RawFd) -> bool {
        let before = self.sockets.len();
        // dropping the SocketInfo closes the descriptor
        self.sockets.retain(|sock| sock.fd() != fd);
        self.sockets.len() != before
    }

    fn join_multicast(&self, fd: RawFd, group: &Ipv6Addr) -> Result<(), IfaceError> {
        let sock = self
            .sockets
            .iter()
            .find(|sock| sock.fd() == fd)
            .ok_or_else(|| IfaceError::NoSuitableSocket(self.full_name()))?;
        sock.socket
            .join_multicast_v6(group, self.index)
            .map_err(|source| IfaceError::Multicast {
                group: *group,
                ifname: self.name.clone(),
                source,
            })
    }
}

impl fmt::Display for Iface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, hwtype={}, maclen={}, mac={}, flags=({}{}{}{}{}), addrs=[{}]",
            self.full_name(),
            self.hw_type,
            self.mac_len,
            self.plain_mac(),
            if self.flag_loopback { "LOOPBACK " } else { "" },
            if self.flag_up { "UP " } else { "" },
            if self.flag_running { "RUNNING " } else { "" },
            if self.flag_multicast { "MULTICAST " } else { "" },
            if self.flag_broadcast { "BROADCAST" } else { "" },
            self.addrs
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

/// The interface & socket manager. See the [module docs](self).
#[derive(Debug, Default)]
pub struct IfaceMgr {
    ifaces: Vec<Iface>,
}

impl IfaceMgr {
    /// Detect local interfaces and build a manager over them.
    pub fn new() -> Result<Self, IfaceError> {
        Ok(IfaceMgr {
            ifaces: detect::detect_ifaces()?,
        })
    }

    /// Build a manager from a stub interface file (`<ifname>
    /// <link-local-addr>` per line) instead of OS detection.
    pub fn from_stub_file(path: &Path) -> Result<Self, IfaceError> {
        Ok(IfaceMgr {
            ifaces: detect::stub_detect_ifaces(path)?,
        })
    }

    /// Build a manager over a caller-supplied interface list.
    pub fn with_ifaces(ifaces: Vec<Iface>) -> Self {
        IfaceMgr { ifaces }
    }

    /// add another interface
    pub fn add_iface(&mut self, iface: Iface) {
        self.ifaces.push(iface);
    }

    /// every managed interface
    pub fn ifaces(&self) -> &[Iface] {
        &self.ifaces
    }

    /// look an interface up by OS index
    pub fn get_iface(&self, index: u32) -> Option<&Iface> {
        self.ifaces.iter().find(|iface| iface.index == index)
    }

    /// look an interface up by name
    pub fn get_iface_by_name(&self, name: &str) -> Option<&Iface> {
        self.ifaces.iter().find(|iface| iface.name == name)
    }

    /// number of open sockets across all interfaces
    pub fn socket_count(&self) -> usize {
        self.ifaces.iter().map(|iface| iface.sockets.len()).sum()
    }

    /// Close every open socket. Also happens implicitly when the
    /// manager is dropped.
    pub fn close_sockets(&mut self) {
        for iface in &mut self.ifaces {
            iface.sockets.clear();
        }
    }

    /// hardware type & address of the first usable interface, the seed
    /// for a DUID-LL server id
    pub fn first_mac(&self) -> Option<(u16, &[u8])> {
        self.ifaces
            .iter()
            .find(|iface| !iface.is_loopback() && iface.mac_len > 0)
            .map(|iface| (iface.hw_type, iface.mac()))
    }

    /// one line per detected interface, logged at startup
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for iface in &self.ifaces {
            let _ = writeln!(out, "detected interface {}", iface);
        }
        out
    }

    /// Open one UDP socket per IPv4 address of every usable interface
    /// (loopback, down and not-running interfaces are skipped).
    /// Returns true iff at least one socket was opened.
    pub fn open_sockets4(&mut self, port: u16) -> Result<bool, IfaceError> {
        let mut count = 0;
        for idx in 0..self.ifaces.len() {
            let iface = &self.ifaces[idx];
            trace!(iface = %iface.full_name(), "trying interface");
            if iface.flag_loopback || !iface.flag_up || !iface.flag_running {
                continue;
            }
            let addrs = iface.addrs.clone();
            for addr in addrs {
                let IpAddr::V4(addr) = addr else { continue };
                self.open_socket4(idx, addr, port)?;
                count += 1;
            }
        }
        Ok(count > 0)
    }

    /// Open one UDP socket per IPv6 address of every usable interface
    /// and join the All_DHCP_Relay_Agents_and_Servers group on it. On
    /// Linux a second socket bound to the multicast group itself is
    /// opened per interface; the BSDs don't take that bind.
    /// Returns true iff at least one socket was opened.
    pub fn open_sockets6(&mut self, port: u16) -> Result<bool, IfaceError> {
        let group = ALL_DHCP_RELAY_AGENTS_AND_SERVERS;
        let mut count = 0;
        for idx in 0..self.ifaces.len() {
            let iface = &self.ifaces[idx];
            if iface.flag_loopback || !iface.flag_up || !iface.flag_running {
                continue;
            }
            let addrs = iface.addrs.clone();
            for addr in addrs {
                let IpAddr::V6(addr) = addr else { continue };
                let fd = self.open_socket6(idx, addr, port)?;
                if !addr.is_multicast() {
                    if let Err(err) = self.ifaces[idx].join_multicast(fd, &group) {
                        self.ifaces[idx].del_socket(fd);
                        return Err(err);
                    }
                }
                count += 1;
                #[cfg(target_os = "linux")]
                {
                    // second socket bound to the group itself; this
                    // doesn't work too well on NetBSD
                    if let Err(err) = self.open_socket6(idx, group, port) {
                        self.ifaces[idx].del_socket(fd);
                        return Err(err);
                    }
                }
            }
        }
        Ok(count > 0)
    }

    /// Open a UDP socket on the named interface, bound to
    /// (`addr`, `port`). The socket is tracked by the interface and its
    /// descriptor returned.
    pub fn open_socket(
        &mut self,
        ifname: &str,
        addr: IpAddr,
        port: u16,
    ) -> Result<RawFd, IfaceError> {
        let idx = self
            .ifaces
            .iter()
            .position(|iface| iface.name == ifname)
            .ok_or_else(|| IfaceError::UnknownIface(ifname.to_owned()))?;
        match addr {
            IpAddr::V4(addr) => self.open_socket4(idx, addr, port),
            IpAddr::V6(addr) => self.open_socket6(idx, addr, port),
        }
    }

    fn open_socket4(
        &mut self,
        idx: usize,
        addr: Ipv4Addr,
        port: u16,
    ) -> Result<RawFd, IfaceError> {
        let iface = &mut self.ifaces[idx];
        debug!(iface = %iface.full_name(), %addr, port, "creating UDP4 socket");
        if iface.has_socket(addr.into(), port) {
            return Err(IfaceError::AlreadyOpen {
                addr: addr.into(),
                port,
            });
        }
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, None)
            .map_err(os_err("failed to create UDP4 socket"))?;
        socket
            .bind(&SocketAddrV4::new(addr, port).into())
            .map_err(os_err("failed to bind UDP4 socket"))?;
        // without packet info there is no telling where a datagram
        // came in; a failure drops (and closes) the socket
        #[cfg(target_os = "linux")]
        pktinfo::setsockopt_int(socket.as_raw_fd(), libc::IPPROTO_IP, libc::IP_PKTINFO, 1)
            .map_err(os_err("setsockopt: IP_PKTINFO failed"))?;

        let fd = socket.as_raw_fd();
        iface.add_socket(SocketInfo::new(socket, addr.into(), port));
        Ok(fd)
    }

    fn open_socket6(
        &mut self,
        idx: usize,
        addr: Ipv6Addr,
        port: u16,
    ) -> Result<RawFd, IfaceError> {
        let iface = &mut self.ifaces[idx];
        debug!(iface = %iface.full_name(), %addr, port, "creating UDP6 socket");
        if iface.has_socket(addr.into(), port) {
            return Err(IfaceError::AlreadyOpen {
                addr: addr.into(),
                port,
            });
        }
        let socket = Socket::new(Domain::IPV6, Type::DGRAM, None)
            .map_err(os_err("failed to create UDP6 socket"))?;
        // don't fail to start when we're being restarted
        socket
            .set_reuse_address(true)
            .map_err(os_err("failed to set SO_REUSEADDR"))?;
        let scope_id = if addr.is_loopback() { 0 } else { iface.index };
        socket
            .bind(&SocketAddrV6::new(addr, port, 0, scope_id).into())
            .map_err(os_err("failed to bind UDP6 socket"))?;
        // RFC 3542 option first, fall back to the RFC 2292 one
        pktinfo::setsockopt_int(
            socket.as_raw_fd(),
            libc::IPPROTO_IPV6,
            libc::IPV6_RECVPKTINFO,
            1,
        )
        .or_else(|_| {
            pktinfo::setsockopt_int(socket.as_raw_fd(), libc::IPPROTO_IPV6, libc::IPV6_PKTINFO, 1)
        })
        .map_err(os_err("setsockopt: IPV6_RECVPKTINFO failed"))?;
        if addr.is_multicast() {
            // the group is link-scoped so the join names the interface
            socket
                .join_multicast_v6(&addr, iface.index)
                .map_err(|source| IfaceError::Multicast {
                    group: addr,
                    ifname: iface.name.clone(),
                    source,
                })?;
        }

        let fd = socket.as_raw_fd();
        iface.add_socket(SocketInfo::new(socket, addr.into(), port));
        Ok(fd)
    }

    /// Send an IPv6 packet out the interface it names, pinning the
    /// egress interface via `IPV6_PKTINFO`.
    pub fn send6(&self, pkt: &Pkt6) -> Result<usize, IfaceError> {
        let fd = self.get_socket6(pkt)?;
        let sent = pktinfo::send_msg6(fd, &pkt.buf, pkt.remote, pkt.ifindex)
            .map_err(os_err("sendmsg failed"))?;
        debug!(
            bytes = sent,
            dst = %pkt.remote,
            iface = %pkt.ifname,
            "sent v6 datagram"
        );
        Ok(sent)
    }

    /// Send an IPv4 packet out the interface it names.
    pub fn send4(&self, pkt: &Pkt4) -> Result<usize, IfaceError> {
        let fd = self.get_socket4(pkt)?;
        let sent = pktinfo::send_msg4(fd, &pkt.buf, pkt.remote, pkt.ifindex)
            .map_err(os_err("sendmsg failed"))?;
        debug!(
            bytes = sent,
            dst = %pkt.remote,
            iface = %pkt.ifname,
            "sent v4 datagram"
        );
        Ok(sent)
    }

    /// Blocking receive of one IPv6 datagram.
    ///
    /// Prefers a socket bound to the multicast group, otherwise the
    /// first IPv6 socket found. Datagrams without packet info or from
    /// an unknown interface are discarded (`Ok(None)`); closing the
    /// socket out from under the call surfaces as an error.
    pub fn receive6(&self) -> Result<Option<Pkt6>, IfaceError> {
        if self.ifaces.is_empty() {
            return Err(IfaceError::NoIfaces);
        }
        let mut candidate: Option<(&Iface, &SocketInfo)> = None;
        'ifaces: for iface in &self.ifaces {
            for sock in &iface.sockets {
                if !matches!(sock.addr, IpAddr::V6(_)) {
                    continue;
                }
                if sock.is_multicast() {
                    candidate = Some((iface, sock));
                    break 'ifaces;
                }
                if candidate.is_none() {
                    // not multicast, but better than nothing
                    candidate = Some((iface, sock));
                }
            }
            if candidate.is_some() {
                break;
            }
        }
        let (_, sock) = candidate
            .ok_or_else(|| IfaceError::NoSuitableSocket("any".to_owned()))?;
        trace!(fd = sock.fd(), addr = %sock.addr, port = sock.port, "receiving over UDP6 socket");

        let mut buf = vec![0; RCVBUFSIZE];
        let meta =
            pktinfo::recv_msg6(sock.fd(), &mut buf).map_err(os_err("recvmsg failed"))?;
        let (dst, ifindex) = match (meta.dst, meta.ifindex) {
            (Some(dst), Some(ifindex)) => (dst, ifindex),
            _ => {
                debug!("no pktinfo on received datagram, discarding");
                return Ok(None);
            }
        };
        let received = match self.get_iface(ifindex) {
            Some(iface) => iface,
            None => {
                debug!(ifindex, "received packet over unknown interface, discarding");
                return Ok(None);
            }
        };
        buf.truncate(meta.len);
        debug!(
            bytes = meta.len,
            src = %meta.src,
            dst = %dst,
            iface = %received.full_name(),
            "received v6 datagram"
        );
        Ok(Some(Pkt6 {
            buf,
            ifname: received.name.clone(),
            ifindex,
            local_addr: dst,
            local_port: sock.port,
            remote: meta.src,
        }))
    }

    /// Blocking receive of one IPv4 datagram on the first IPv4 socket.
    pub fn receive4(&self) -> Result<Option<Pkt4>, IfaceError> {
        let (iface, sock) = self
            .ifaces
            .iter()
            .find_map(|iface| {
                iface
                    .sockets
                    .iter()
                    .find(|sock| matches!(sock.addr, IpAddr::V4(_)))
                    .map(|sock| (iface, sock))
            })
            .ok_or_else(|| IfaceError::NoSuitableSocket("any".to_owned()))?;

        let mut buf = vec![0; RCVBUFSIZE];
        let meta =
            pktinfo::recv_msg4(sock.fd(), &mut buf).map_err(os_err("recvmsg failed"))?;
        // platforms with IP_PKTINFO must deliver it or the datagram is
        // unattributable; the rest fall back to the owning interface
        #[cfg(target_os = "linux")]
        let (dst, ifindex) = match (meta.dst, meta.ifindex) {
            (Some(dst), Some(ifindex)) => (dst, ifindex),
            _ => {
                debug!("no pktinfo on received datagram, discarding");
                return Ok(None);
            }
        };
        #[cfg(not(target_os = "linux"))]
        let (dst, ifindex) = (
            meta.dst.unwrap_or(Ipv4Addr::UNSPECIFIED),
            meta.ifindex.unwrap_or(iface.index),
        );

        let received = self.get_iface(ifindex).unwrap_or(iface);
        buf.truncate(meta.len);
        Ok(Some(Pkt4 {
            buf,
            ifname: received.name.clone(),
            ifindex,
            local_addr: dst,
            local_port: sock.port,
            remote: meta.src,
        }))
    }

    /// Select the socket a v6 packet leaves through: on the packet's
    /// interface, IPv6, and not bound to a multicast address.
    pub fn get_socket6(&self, pkt: &Pkt6) -> Result<RawFd, IfaceError> {
        let iface = self
            .get_iface_by_name(&pkt.ifname)
            .ok_or_else(|| IfaceError::UnknownIface(pkt.ifname.clone()))?;
        iface
            .sockets
            .iter()
            .find(|sock| matches!(sock.addr, IpAddr::V6(_)) && !sock.is_multicast())
            .map(SocketInfo::fd)
            .ok_or_else(|| IfaceError::NoSuitableSocket(iface.full_name()))
    }

    /// Select the socket a v4 packet leaves through.
    pub fn get_socket4(&self, pkt: &Pkt4) -> Result<RawFd, IfaceError> {
        let iface = self
            .get_iface_by_name(&pkt.ifname)
            .ok_or_else(|| IfaceError::UnknownIface(pkt.ifname.clone()))?;
        iface
            .sockets
            .iter()
            .find(|sock| matches!(sock.addr, IpAddr::V4(_)))
            .map(SocketInfo::fd)
            .ok_or_else(|| IfaceError::NoSuitableSocket(iface.full_name()))
    }
}
