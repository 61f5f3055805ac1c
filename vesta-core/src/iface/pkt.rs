//! Raw datagrams with their addressing & interface metadata
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddrV4, SocketAddrV6};

use vesta_proto::{Decodable, DecodeResult, Encodable, EncodeResult};

/// An IPv6 datagram as it came off (or goes onto) the wire, together
/// with everything the control data told us: the address it was sent
/// to, who sent it, and the interface it arrived on. For outbound
/// packets `ifindex` pins the egress interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pkt6 {
    /// raw message bytes
    pub buf: Vec<u8>,
    /// name of the interface the packet arrived on / leaves from
    pub ifname: String,
    /// OS index of that interface
    pub ifindex: u32,
    /// local (destination on receive, source on send) address
    pub local_addr: Ipv6Addr,
    /// local port
    pub local_port: u16,
    /// remote address & port
    pub remote: SocketAddrV6,
}

impl Pkt6 {
    /// Decode the payload
    pub fn to_msg<T: Decodable>(&self) -> DecodeResult<T> {
        T::from_bytes(&self.buf)
    }

    /// Build the reply packet for this one: same interface, destination
    /// is whoever sent it to us.
    pub fn reply_from<T: Encodable>(&self, msg: &T) -> EncodeResult<Pkt6> {
        Ok(Pkt6 {
            buf: msg.to_vec()?,
            ifname: self.ifname.clone(),
            ifindex: self.ifindex,
            local_addr: self.local_addr,
            local_port: self.local_port,
            remote: self.remote,
        })
    }
}

/// An IPv4 datagram with its addressing metadata. Carried whole, the
/// socket layer does not look inside v4 payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pkt4 {
    /// raw message bytes
    pub buf: Vec<u8>,
    /// name of the interface the packet arrived on / leaves from
    pub ifname: String,
    /// OS index of that interface
    pub ifindex: u32,
    /// local (destination on receive, source on send) address
    pub local_addr: Ipv4Addr,
    /// local port
    pub local_port: u16,
    /// remote address & port
    pub remote: SocketAddrV4,
}
