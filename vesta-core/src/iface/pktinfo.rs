//! `sendmsg`/`recvmsg` with packet-info control data.
//!
//! The ingress interface and destination address of a datagram, and the
//! egress interface of a reply, travel in `IP_PKTINFO`/`IPV6_PKTINFO`
//! ancillary (control) messages alongside the payload. Nothing in std
//! exposes those, so this module drops to `libc` for the `msghdr`
//! plumbing.
use std::{
    io, mem,
    net::{Ipv4Addr, Ipv6Addr, SocketAddrV4, SocketAddrV6},
    os::unix::prelude::RawFd,
    ptr,
};

/// Room for one pktinfo control message on every supported libc,
/// aligned the way `cmsghdr` wants.
#[repr(C, align(8))]
struct ControlBuf([u8; 128]);

impl ControlBuf {
    fn zeroed() -> Self {
        ControlBuf([0; 128])
    }
}

/// set a boolean-style socket option, the raw counterpart of what
/// `socket2` doesn't surface
pub(crate) fn setsockopt_int(
    fd: RawFd,
    level: libc::c_int,
    name: libc::c_int,
    value: libc::c_int,
) -> io::Result<()> {
    let res = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            &value as *const libc::c_int as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if res != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Send `buf` to `dst`, pinning the egress interface to `ifindex` via
/// an `IPV6_PKTINFO` control message. Single-entry iovec, we only ever
/// have one chunk of data to send.
pub(crate) fn send_msg6(
    fd: RawFd,
    buf: &[u8],
    dst: SocketAddrV6,
    ifindex: u32,
) -> io::Result<usize> {
    let mut to = libc::sockaddr_in6 {
        sin6_family: libc::AF_INET6 as libc::sa_family_t,
        sin6_port: dst.port().to_be(),
        sin6_addr: libc::in6_addr {
            s6_addr: dst.ip().octets(),
        },
        sin6_scope_id: ifindex,
        ..unsafe { mem::zeroed() }
    };

    let mut iov = libc::iovec {
        iov_base: buf.as_ptr() as *mut libc::c_void,
        iov_len: buf.len(),
    };

    let mut control = ControlBuf::zeroed();
    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_name = &mut to as *mut libc::sockaddr_in6 as *mut libc::c_void;
    msg.msg_namelen = mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t;
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = control.0.as_mut_ptr() as *mut libc::c_void;
    msg.msg_controllen = unsafe {
        libc::CMSG_SPACE(mem::size_of::<libc::in6_pktinfo>() as libc::c_uint)
    } as _;

    unsafe {
        let cmsg = libc::CMSG_FIRSTHDR(&msg);
        (*cmsg).cmsg_level = libc::IPPROTO_IPV6;
        (*cmsg).cmsg_type = libc::IPV6_PKTINFO;
        (*cmsg).cmsg_len =
            libc::CMSG_LEN(mem::size_of::<libc::in6_pktinfo>() as libc::c_uint) as _;
        let pktinfo = libc::CMSG_DATA(cmsg) as *mut libc::in6_pktinfo;
        let mut info: libc::in6_pktinfo = mem::zeroed();
        // source address stays zeroed, the kernel picks it
        info.ipi6_ifindex = ifindex as _;
        ptr::write_unaligned(pktinfo, info);
        msg.msg_controllen = (*cmsg).cmsg_len;
    }

    let result = unsafe { libc::sendmsg(fd, &msg, 0) };
    if result < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(result as usize)
}

/// Send `buf` to an IPv4 destination. On Linux the egress interface is
/// pinned with `IP_PKTINFO`; elsewhere routing decides.
pub(crate) fn send_msg4(
    fd: RawFd,
    buf: &[u8],
    dst: SocketAddrV4,
    #[allow(unused_variables)] ifindex: u32,
) -> io::Result<usize> {
    let mut to = libc::sockaddr_in {
        sin_family: libc::AF_INET as libc::sa_family_t,
        sin_port: dst.port().to_be(),
        sin_addr: libc::in_addr {
            s_addr: u32::from_ne_bytes(dst.ip().octets()),
        },
        ..unsafe { mem::zeroed() }
    };

    let mut iov = libc::iovec {
        iov_base: buf.as_ptr() as *mut libc::c_void,
        iov_len: buf.len(),
    };

    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_name = &mut to as *mut libc::sockaddr_in as *mut libc::c_void;
    msg.msg_namelen = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;

    #[cfg(target_os = "linux")]
    let mut control = ControlBuf::zeroed();
    #[cfg(target_os = "linux")]
    unsafe {
        msg.msg_control = control.0.as_mut_ptr() as *mut libc::c_void;
        msg.msg_controllen =
            libc::CMSG_SPACE(mem::size_of::<libc::in_pktinfo>() as libc::c_uint) as _;
        let cmsg = libc::CMSG_FIRSTHDR(&msg);
        (*cmsg).cmsg_level = libc::IPPROTO_IP;
        (*cmsg).cmsg_type = libc::IP_PKTINFO;
        (*cmsg).cmsg_len = libc::CMSG_LEN(mem::size_of::<libc::in_pktinfo>() as libc::c_uint) as _;
        let pktinfo = libc::CMSG_DATA(cmsg) as *mut libc::in_pktinfo;
        let mut info: libc::in_pktinfo = mem::zeroed();
        info.ipi_ifindex = ifindex as _;
        ptr::write_unaligned(pktinfo, info);
        msg.msg_controllen = (*cmsg).cmsg_len;
    }

    let result = unsafe { libc::sendmsg(fd, &msg, 0) };
    if result < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(result as usize)
}

/// What `recvmsg` learned about an inbound IPv6 datagram
#[derive(Debug, Clone, Copy)]
pub(crate) struct RecvMeta6 {
    pub(crate) len: usize,
    pub(crate) src: SocketAddrV6,
    /// destination address from `IPV6_PKTINFO`, absent when the kernel
    /// sent no control message
    pub(crate) dst: Option<Ipv6Addr>,
    pub(crate) ifindex: Option<u32>,
}

/// Blocking receive of one IPv6 datagram with its control data.
pub(crate) fn recv_msg6(fd: RawFd, buf: &mut [u8]) -> io::Result<RecvMeta6> {
    let mut from: libc::sockaddr_in6 = unsafe { mem::zeroed() };
    let mut iov = libc::iovec {
        iov_base: buf.as_mut_ptr() as *mut libc::c_void,
        iov_len: buf.len(),
    };
    let mut control = ControlBuf::zeroed();

    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_name = &mut from as *mut libc::sockaddr_in6 as *mut libc::c_void;
    msg.msg_namelen = mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t;
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = control.0.as_mut_ptr() as *mut libc::c_void;
    msg.msg_controllen = mem::size_of_val(&control.0) as _;

    let result = unsafe { libc::recvmsg(fd, &mut msg, 0) };
    if result < 0 {
        return Err(io::Error::last_os_error());
    }

    // walk the control messages for the destination address & ingress
    // interface
    let mut dst = None;
    let mut ifindex = None;
    unsafe {
        let mut cmsg = libc::CMSG_FIRSTHDR(&msg);
        while !cmsg.is_null() {
            if (*cmsg).cmsg_level == libc::IPPROTO_IPV6 && (*cmsg).cmsg_type == libc::IPV6_PKTINFO
            {
                let info: libc::in6_pktinfo =
                    ptr::read_unaligned(libc::CMSG_DATA(cmsg) as *const libc::in6_pktinfo);
                dst = Some(Ipv6Addr::from(info.ipi6_addr.s6_addr));
                ifindex = Some(info.ipi6_ifindex as u32);
            }
            cmsg = libc::CMSG_NXTHDR(&msg, cmsg);
        }
    }

    Ok(RecvMeta6 {
        len: result as usize,
        src: SocketAddrV6::new(
            Ipv6Addr::from(from.sin6_addr.s6_addr),
            u16::from_be(from.sin6_port),
            from.sin6_flowinfo,
            from.sin6_scope_id,
        ),
        dst,
        ifindex,
    })
}

/// What `recvmsg` learned about an inbound IPv4 datagram
#[derive(Debug, Clone, Copy)]
pub(crate) struct RecvMeta4 {
    pub(crate) len: usize,
    pub(crate) src: SocketAddrV4,
    pub(crate) dst: Option<Ipv4Addr>,
    pub(crate) ifindex: Option<u32>,
}

/// Blocking receive of one IPv4 datagram. Destination & ingress
/// interface come from `IP_PKTINFO` where the platform has it.
pub(crate) fn recv_msg4(fd: RawFd, buf: &mut [u8]) -> io::Result<RecvMeta4> {
    let mut from: libc::sockaddr_in = unsafe { mem::zeroed() };
    let mut iov = libc::iovec {
        iov_base: buf.as_mut_ptr() as *mut libc::c_void,
        iov_len: buf.len(),
    };
    let mut control = ControlBuf::zeroed();

    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_name = &mut from as *mut libc::sockaddr_in as *mut libc::c_void;
    msg.msg_namelen = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = control.0.as_mut_ptr() as *mut libc::c_void;
    msg.msg_controllen = mem::size_of_val(&control.0) as _;

    let result = unsafe { libc::recvmsg(fd, &mut msg, 0) };
    if result < 0 {
        return Err(io::Error::last_os_error());
    }

    let mut dst = None;
    let mut ifindex = None;
    #[cfg(target_os = "linux")]
    unsafe {
        let mut cmsg = libc::CMSG_FIRSTHDR(&msg);
        while !cmsg.is_null() {
            if (*cmsg).cmsg_level == libc::IPPROTO_IP && (*cmsg).cmsg_type == libc::IP_PKTINFO {
                let info: libc::in_pktinfo =
                    ptr::read_unaligned(libc::CMSG_DATA(cmsg) as *const libc::in_pktinfo);
                dst = Some(Ipv4Addr::from(info.ipi_addr.s_addr.to_ne_bytes()));
                ifindex = Some(info.ipi_ifindex as u32);
            }
            cmsg = libc::CMSG_NXTHDR(&msg, cmsg);
        }
    }

    Ok(RecvMeta4 {
        len: result as usize,
        src: SocketAddrV4::new(
            Ipv4Addr::from(from.sin_addr.s_addr.to_ne_bytes()),
            u16::from_be(from.sin_port),
        ),
        dst,
        ifindex,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket;
    use std::os::unix::prelude::AsRawFd;

    // loopback send/recv exercising the cmsg walk end to end
    #[test]
    fn v6_pktinfo_roundtrip() {
        let recv = UdpSocket::bind("[::1]:0").unwrap();
        setsockopt_int(
            recv.as_raw_fd(),
            libc::IPPROTO_IPV6,
            libc::IPV6_RECVPKTINFO,
            1,
        )
        .unwrap();
        let port = recv.local_addr().unwrap().port();

        let send = UdpSocket::bind("[::1]:0").unwrap();
        let dst = SocketAddrV6::new(Ipv6Addr::LOCALHOST, port, 0, 0);
        // loopback: ifindex 0 lets the kernel route
        let sent = send_msg6(send.as_raw_fd(), b"hello", dst, 0).unwrap();
        assert_eq!(sent, 5);

        let mut buf = [0u8; 64];
        let meta = recv_msg6(recv.as_raw_fd(), &mut buf).unwrap();
        assert_eq!(meta.len, 5);
        assert_eq!(&buf[..meta.len], b"hello");
        assert_eq!(meta.dst, Some(Ipv6Addr::LOCALHOST));
        assert_eq!(*meta.src.ip(), Ipv6Addr::LOCALHOST);
        assert!(meta.ifindex.is_some());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn v4_pktinfo_roundtrip() {
        let recv = UdpSocket::bind("127.0.0.1:0").unwrap();
        setsockopt_int(recv.as_raw_fd(), libc::IPPROTO_IP, libc::IP_PKTINFO, 1).unwrap();
        let port = recv.local_addr().unwrap().port();

        let send = UdpSocket::bind("127.0.0.1:0").unwrap();
        let dst = SocketAddrV4::new(Ipv4Addr::LOCALHOST, port);
        send_msg4(send.as_raw_fd(), b"ping", dst, 0).unwrap();

        let mut buf = [0u8; 64];
        let meta = recv_msg4(recv.as_raw_fd(), &mut buf).unwrap();
        assert_eq!(meta.len, 4);
        assert_eq!(meta.dst, Some(Ipv4Addr::LOCALHOST));
        assert!(meta.ifindex.is_some());
    }
}
