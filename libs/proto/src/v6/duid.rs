//! DUID (DHCP unique identifier) for DHCPv6
use std::fmt;

/// DUID, stored as opaque bytes. Identifies a client or server
/// across restarts; compared byte for byte.
/// <https://datatracker.ietf.org/doc/html/rfc8415#section-11>
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Duid(Vec<u8>);

impl Duid {
    /// create a DUID-LL (type 3) from a hardware type & link-layer address
    pub fn link_layer(htype: u16, addr: &[u8]) -> Self {
        let mut buf = Vec::with_capacity(4 + addr.len());
        buf.extend_from_slice(&3u16.to_be_bytes());
        buf.extend_from_slice(&htype.to_be_bytes());
        buf.extend_from_slice(addr);
        Duid(buf)
    }

    /// length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// true if the DUID holds no bytes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Duid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duid({})", hex::encode(&self.0))
    }
}

impl AsRef<[u8]> for Duid {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Duid {
    fn from(buf: Vec<u8>) -> Self {
        Duid(buf)
    }
}

impl From<&[u8]> for Duid {
    fn from(buf: &[u8]) -> Self {
        Duid(buf.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_layer_layout() {
        let duid = Duid::link_layer(1, &[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert_eq!(
            duid.as_ref(),
            &[0x00, 0x03, 0x00, 0x01, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]
        );
    }
}
