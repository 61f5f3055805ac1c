//! Interface detection.
//!
//! Real detection goes through `pnet` (getifaddrs/netlink underneath).
//! Platforms without that support fall back to a stub that reads a
//! two-column `interfaces.txt` so tests stay portable.
use std::{ffi::CString, fs, path::Path};

#[cfg(any(
    target_os = "linux",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "macos"
))]
use pnet::datalink;
use tracing::{debug, warn};

use super::{Iface, IfaceError};

/// hardware type for Ethernet, the only one we report
#[cfg(any(
    target_os = "linux",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "macos"
))]
const HTYPE_ETHER: u16 = 1;

#[cfg(any(
    target_os = "linux",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "macos"
))]
pub(crate) fn detect_ifaces() -> Result<Vec<Iface>, IfaceError> {
    let ifaces = datalink::interfaces()
        .into_iter()
        .map(iface_from_pnet)
        .collect::<Vec<_>>();
    if ifaces.is_empty() {
        return Err(IfaceError::NoIfaces);
    }
    Ok(ifaces)
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "macos"
)))]
pub(crate) fn detect_ifaces() -> Result<Vec<Iface>, IfaceError> {
    stub_detect_ifaces(Path::new("interfaces.txt"))
}

#[cfg(any(
    target_os = "linux",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "macos"
))]
fn iface_from_pnet(int: datalink::NetworkInterface) -> Iface {
    let mut iface = Iface::new(&int.name, int.index);
    if let Some(mac) = int.mac {
        iface.set_hw_addr(HTYPE_ETHER, &mac.octets());
    }
    iface.set_flags(
        int.is_loopback(),
        int.is_up(),
        int.is_running(),
        int.is_multicast(),
        int.is_broadcast(),
    );
    for ip in &int.ips {
        iface.add_address(ip.ip());
    }
    debug!(name = %iface.full_name(), addrs = ?iface.addresses(), "detected interface");
    iface
}

/// Stub detection for platforms without getifaddrs: read
/// `<ifname> <link-local-address>` pairs, one per line, from `path` in
/// the working directory. Flags are left unset, the stub exists so
/// sockets can be opened by explicit interface name.
pub(crate) fn stub_detect_ifaces(path: &Path) -> Result<Vec<Iface>, IfaceError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            warn!(?path, ?err, "interface stub file not available, no interfaces detected");
            return Ok(Vec::new());
        }
    };
    let mut ifaces = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut cols = line.split_whitespace();
        let (name, addr) = match (cols.next(), cols.next()) {
            (Some(name), Some(addr)) => (name, addr),
            _ => {
                return Err(IfaceError::StubFile {
                    line: line.to_owned(),
                })
            }
        };
        let addr = addr.parse().map_err(|_| IfaceError::StubFile {
            line: line.to_owned(),
        })?;
        let mut iface = Iface::new(name, if_nametoindex(name));
        iface.add_address(addr);
        debug!(name, %addr, "detected interface (stub)");
        ifaces.push(iface);
    }
    Ok(ifaces)
}

/// look up the OS index for an interface name, 0 when unknown
fn if_nametoindex(name: &str) -> u32 {
    CString::new(name)
        .map(|cname| unsafe { libc::if_nametoindex(cname.as_ptr()) })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn tmp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn stub_parses_name_and_link_local() {
        let path = tmp_file("vesta-stub-ok.txt", "eth7 fe80::1\n");
        let ifaces = stub_detect_ifaces(&path).unwrap();
        assert_eq!(ifaces.len(), 1);
        assert_eq!(ifaces[0].name(), "eth7");
        assert_eq!(
            ifaces[0].addresses(),
            ["fe80::1".parse::<std::net::IpAddr>().unwrap()]
        );
        // stub interfaces carry no flags
        assert!(!ifaces[0].is_up());
    }

    #[test]
    fn stub_missing_file_detects_nothing() {
        let ifaces =
            stub_detect_ifaces(Path::new("/nonexistent/vesta-interfaces.txt")).unwrap();
        assert!(ifaces.is_empty());
    }

    #[test]
    fn stub_malformed_line_is_error() {
        let path = tmp_file("vesta-stub-bad.txt", "eth7\n");
        assert!(matches!(
            stub_detect_ifaces(&path),
            Err(IfaceError::StubFile { .. })
        ));
    }

    #[test]
    fn stub_bad_address_is_error() {
        let path = tmp_file("vesta-stub-badaddr.txt", "eth7 not-an-addr\n");
        assert!(stub_detect_ifaces(&path).is_err());
    }
}
