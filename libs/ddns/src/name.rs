//! Hostname canonicalization & synthesis
use std::net::Ipv6Addr;
use std::str::FromStr;

use vesta_proto::{v6::DomainName, DecodeError};

/// Canonical form of a client-supplied name: ASCII lower-case, partial
/// names completed with `suffix` so the result is fully qualified.
pub fn qualify(name: &DomainName, suffix: &DomainName) -> DomainName {
    name.to_lowercase().join(suffix)
}

/// Synthesize a hostname from a leased address, used when the client
/// sent an empty name. The address keeps its received text form (zero
/// groups are not expanded) with every `:` replaced by `-`:
/// `2001:db8:1:1::dead:beef` becomes
/// `host-2001-db8-1-1--dead-beef.<suffix>`.
pub fn generate_from_addr(
    addr: &Ipv6Addr,
    suffix: &DomainName,
) -> Result<DomainName, DecodeError> {
    let label = format!("host-{}", addr.to_string().replace(':', "-"));
    Ok(DomainName::from_str(&label)?.join(suffix))
}
