//! # ddns
//!
//! DDNS coordination for the DHCPv6 server: negotiates the Client FQDN
//! option (RFC 4704) with clients, canonicalizes and synthesizes
//! hostnames, computes DHCID identifiers (RFC 4701) and emits name
//! change requests to the downstream DNS updater.
#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::net::Ipv6Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use vesta_proto::v6::{
    ClientFqdn, DhcpOption, DomainName, Duid, FqdnFlags, Message, OptionCode,
};

pub mod dhcid;
pub mod name;
pub mod ncr;

use crate::dhcid::DhcId;
use crate::ncr::{NameChangeRequest, NameChangeType, NcrQueue};

#[derive(thiserror::Error, Debug)]
pub enum DdnsError {
    /// an answer about to produce name change requests must identify the client
    #[error("answer carries no client id, cannot compute DHCID")]
    MissingClientId,
    #[error("error manipulating domain name {0:?}")]
    DomainError(#[from] vesta_proto::DecodeError),
}

/// Server DDNS policy, deserialized from the server config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DdnsPolicy {
    /// master switch, nothing is updated when false
    pub enable_updates: bool,
    /// whether a client may perform its own AAAA update
    pub allow_client_update: bool,
    /// take over the AAAA update even from clients that asked to do it
    pub override_client_update: bool,
    /// synthesize a hostname from the leased address when the client
    /// sends an empty name
    pub generate_name_when_empty: bool,
    /// suffix completing partial and generated names, e.g. `example.com.`
    pub default_suffix: String,
}

impl Default for DdnsPolicy {
    fn default() -> Self {
        Self {
            enable_updates: true,
            allow_client_update: true,
            override_client_update: false,
            generate_name_when_empty: true,
            default_suffix: "example.com.".into(),
        }
    }
}

/// What the server decided to do about one client's FQDN option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FqdnDecision {
    /// server performs the AAAA update
    pub forward: bool,
    /// server performs the PTR update
    pub reverse: bool,
    /// the option to return to the client; flags reflect who updates
    /// what, the name is fully qualified or empty-partial when it is
    /// yet to be generated from the leased address
    pub fqdn: ClientFqdn,
}

impl FqdnDecision {
    /// true if either mapping will be updated by the server
    pub fn updates_dns(&self) -> bool {
        self.forward || self.reverse
    }
}

/// Negotiates FQDNs and emits name change requests into a shared FIFO
/// queue.
#[derive(Debug, Clone)]
pub struct DdnsUpdate {
    policy: DdnsPolicy,
    suffix: DomainName,
    queue: NcrQueue,
}

impl DdnsUpdate {
    pub fn new(policy: DdnsPolicy) -> Result<Self, DdnsError> {
        let mut suffix = DomainName::from_str(&policy.default_suffix)?;
        // names completed with the suffix must come out fully qualified
        suffix.set_fqdn(true);
        Ok(Self {
            policy,
            suffix,
            queue: NcrQueue::new(),
        })
    }

    /// a shared handle on the request queue
    pub fn queue(&self) -> NcrQueue {
        self.queue.clone()
    }

    pub fn policy(&self) -> &DdnsPolicy {
        &self.policy
    }

    /// true when an empty client name gets a synthesized replacement
    pub fn generates_names(&self) -> bool {
        self.policy.generate_name_when_empty
    }

    /// Synthesize the hostname for a leased address
    pub fn generate_fqdn(&self, addr: &Ipv6Addr) -> Result<DomainName, DdnsError> {
        Ok(name::generate_from_addr(addr, &self.suffix)?)
    }

    /// Negotiate the Client FQDN option of `req`, if it carries one.
    ///
    /// Applies the N/S/O flag rules and returns the reply option
    /// together with which updates this server performs. The reply
    /// option must go back to the client whether or not its ORO listed
    /// the FQDN option.
    pub fn process_client_fqdn(&self, req: &Message) -> Option<FqdnDecision> {
        let fqdn = match req.opts().get(OptionCode::ClientFqdn) {
            Some(DhcpOption::ClientFqdn(fqdn)) => fqdn,
            _ => return None,
        };
        trace!(flags = ?fqdn.flags(), domain = %fqdn.domain(), "client sent fqdn option");

        let (flags, forward, reverse) = self.handle_flags(fqdn.flags());

        // empty in, empty out: a name is generated from the lease
        // address once one is assigned, until then the reply carries an
        // empty partial name
        let domain = if fqdn.domain().is_empty() {
            DomainName::empty()
        } else {
            name::qualify(fqdn.domain(), &self.suffix)
        };

        Some(FqdnDecision {
            forward,
            reverse,
            fqdn: ClientFqdn::new(flags, domain),
        })
    }

    /// Apply the RFC 4704 N/S flag rules against server policy.
    ///
    /// Per RFC 4704 section 5, the client N and S flags request one of:
    ///
    ///  N flag  S flag   Option
    /// ------------------------------------------------------------------
    ///    0       0      client wants to do the AAAA update itself
    ///    0       1      client wants the server to do the AAAA update
    ///    1       0      client wants no one to do updates
    ///
    /// (1/1 is invalid and already rejected by the decoder.)
    ///
    /// The PTR record is never delegated, whenever any update happens
    /// the reverse one is ours.
    fn handle_flags(&self, client: FqdnFlags) -> (FqdnFlags, bool, bool) {
        let server = FqdnFlags::default();
        if !self.policy.enable_updates {
            // nothing gets updated; O signals when that differs from
            // what the client asked for
            return (server.set_n(true).set_o(client.s()), false, false);
        }
        match (client.n(), client.s()) {
            // client wants no updates at all
            (true, _) => (server.set_n(true), false, false),
            // client delegates the AAAA to us
            (false, true) => (server.set_s(true), true, true),
            // client wants to do its own AAAA update
            (false, false) => {
                if self.policy.allow_client_update && !self.policy.override_client_update {
                    (server, false, true)
                } else {
                    (server.set_s(true).set_o(true), true, true)
                }
            }
        }
    }

    /// Emit the `Add` request for a committed answer.
    ///
    /// Reads the FQDN option and client id off the already-built
    /// answer: the S flag says whether we do the forward update, N that
    /// no update happens at all. One forward name maps to a single
    /// record, so exactly one request is produced, for the first
    /// address of the first IA_NA that has one; remaining IAs get no
    /// DNS entries.
    pub fn create_name_change_requests(&self, answer: &Message) -> Result<(), DdnsError> {
        let duid = match answer.opts().get(OptionCode::ClientId) {
            Some(DhcpOption::ClientId(duid)) => duid.clone(),
            _ => return Err(DdnsError::MissingClientId),
        };
        let fqdn = match answer.opts().get(OptionCode::ClientFqdn) {
            Some(DhcpOption::ClientFqdn(fqdn)) => fqdn,
            _ => {
                debug!("answer has no fqdn option, no DNS update");
                return Ok(());
            }
        };
        if fqdn.domain().is_empty() {
            debug!("fqdn name still empty, no DNS update");
            return Ok(());
        }
        if fqdn.flags().n() {
            debug!("updates disabled for this client, no DNS update");
            return Ok(());
        }
        let forward = fqdn.flags().s();

        for opt in answer.opts().get_all(OptionCode::IANA) {
            let iana = match opt {
                DhcpOption::IANA(iana) => iana,
                _ => continue,
            };
            if let Some(iaaddr) = iana.first_addr() {
                let domain = fqdn.domain().to_lowercase();
                let dhcid = DhcId::duid(duid.as_ref()).rdata_hex(&domain);
                debug!(addr = %iaaddr.addr, %domain, forward, "queueing DNS add");
                self.queue.push(NameChangeRequest::new(
                    NameChangeType::Add,
                    forward,
                    true,
                    iaaddr.addr,
                    dhcid,
                    iaaddr.valid_life,
                ));
                break;
            }
        }
        Ok(())
    }

    /// Emit the `Remove` request undoing whatever a lease holds in DNS.
    ///
    /// Silently does nothing when the lease never got DNS entries or
    /// its recorded hostname is empty or malformed.
    pub fn create_removal_name_change_request(
        &self,
        addr: Ipv6Addr,
        duid: &Duid,
        hostname: &str,
        fqdn_fwd: bool,
        fqdn_rev: bool,
        valid_lft: u32,
    ) {
        if !(fqdn_fwd || fqdn_rev) {
            return;
        }
        if hostname.is_empty() {
            debug!(%addr, "lease has no hostname, nothing to remove");
            return;
        }
        let domain = match DomainName::from_str(hostname) {
            Ok(domain) if !domain.is_empty() => domain.to_lowercase(),
            _ => {
                debug!(%addr, hostname, "lease hostname is not a valid fqdn, nothing to remove");
                return;
            }
        };
        let dhcid = DhcId::duid(duid.as_ref()).rdata_hex(&domain);
        debug!(%addr, %domain, fqdn_fwd, fqdn_rev, "queueing DNS remove");
        self.queue.push(NameChangeRequest::new(
            NameChangeType::Remove,
            fqdn_fwd,
            fqdn_rev,
            addr,
            dhcid,
            valid_lft,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesta_proto::v6::{DhcpOptions, IAAddr, MessageType, IANA};

    fn test_duid() -> Duid {
        (0u8..32).map(|i| 100 + i).collect::<Vec<_>>().into()
    }

    fn updater(policy: DdnsPolicy) -> DdnsUpdate {
        DdnsUpdate::new(policy).unwrap()
    }

    fn harness(
        cli: FqdnFlags,
        (enable, allow_client, override_client): (bool, bool, bool),
        expected_server: FqdnFlags,
        expected_forward: bool,
        expected_reverse: bool,
    ) {
        let ddns = updater(DdnsPolicy {
            enable_updates: enable,
            allow_client_update: allow_client,
            override_client_update: override_client,
            ..Default::default()
        });
        let (server, forward, reverse) = ddns.handle_flags(cli);
        assert_eq!(server, expected_server);
        assert_eq!(forward, expected_forward, "forward");
        assert_eq!(reverse, expected_reverse, "reverse");
    }

    // N 0 S 0
    #[test]
    fn test_flags_client_update() {
        // client wants to update & may
        harness(
            FqdnFlags::default(),
            (true, true, false),
            FqdnFlags::default(),
            false,
            true,
        );
        // not allowed: override
        harness(
            FqdnFlags::default(),
            (true, false, false),
            FqdnFlags::default().set_s(true).set_o(true),
            true,
            true,
        );
        // allowed but server configured to take over anyway
        harness(
            FqdnFlags::default(),
            (true, true, true),
            FqdnFlags::default().set_s(true).set_o(true),
            true,
            true,
        );
        // updates disabled entirely
        harness(
            FqdnFlags::default(),
            (false, true, false),
            FqdnFlags::default().set_n(true),
            false,
            false,
        );
    }

    // N 0 S 1
    #[test]
    fn test_flags_server_update() {
        harness(
            FqdnFlags::default().set_s(true),
            (true, true, false),
            FqdnFlags::default().set_s(true),
            true,
            true,
        );
        // updates disabled: the O flag records the override
        harness(
            FqdnFlags::default().set_s(true),
            (false, true, false),
            FqdnFlags::default().set_n(true).set_o(true),
            false,
            false,
        );
    }

    // N 1 S 0
    #[test]
    fn test_flags_no_update() {
        harness(
            FqdnFlags::default().set_n(true),
            (true, true, false),
            FqdnFlags::default().set_n(true),
            false,
            false,
        );
        harness(
            FqdnFlags::default().set_n(true),
            (false, true, false),
            FqdnFlags::default().set_n(true),
            false,
            false,
        );
    }

    // non-empty names are sent fully qualified, the wire type is what
    // matters, not the trailing dot in the test string
    fn request_with_fqdn(flags: FqdnFlags, domain: &str) -> Message {
        let mut name: DomainName = domain.parse().unwrap();
        name.set_fqdn(!name.is_empty());
        request_with_name(flags, name)
    }

    fn request_with_partial_fqdn(flags: FqdnFlags, domain: &str) -> Message {
        request_with_name(flags, domain.parse().unwrap())
    }

    fn request_with_name(flags: FqdnFlags, name: DomainName) -> Message {
        let mut msg = Message::new_with_id(MessageType::Request, [0x12, 0x34, 0x56]);
        msg.opts_mut().insert(DhcpOption::ClientId(test_duid()));
        msg.opts_mut()
            .insert(DhcpOption::ClientFqdn(ClientFqdn::new(flags, name)));
        msg
    }

    #[test]
    fn full_name_canonicalized() {
        let ddns = updater(DdnsPolicy::default());
        let req = request_with_fqdn(FqdnFlags::default().set_s(true), "MyHost.Example.Com");
        let decision = ddns.process_client_fqdn(&req).unwrap();
        assert!(decision.forward && decision.reverse);
        assert!(decision.fqdn.flags().s());
        assert_eq!(decision.fqdn.domain().to_string(), "myhost.example.com.");
        assert!(decision.fqdn.domain().is_fqdn());
    }

    #[test]
    fn partial_name_completed() {
        let ddns = updater(DdnsPolicy::default());
        let req = request_with_partial_fqdn(FqdnFlags::default().set_s(true), "myhost");
        let decision = ddns.process_client_fqdn(&req).unwrap();
        assert_eq!(decision.fqdn.domain().to_string(), "myhost.example.com.");
        assert!(decision.fqdn.domain().is_fqdn());
    }

    #[test]
    fn empty_name_stays_empty_partial() {
        let ddns = updater(DdnsPolicy::default());
        let req = request_with_fqdn(FqdnFlags::default().set_s(true), "");
        let decision = ddns.process_client_fqdn(&req).unwrap();
        assert!(decision.fqdn.domain().is_empty());
        assert!(!decision.fqdn.domain().is_fqdn());
    }

    #[test]
    fn no_fqdn_option_no_decision() {
        let ddns = updater(DdnsPolicy::default());
        let mut msg = Message::new(MessageType::Request);
        msg.opts_mut().insert(DhcpOption::ClientId(test_duid()));
        assert!(ddns.process_client_fqdn(&msg).is_none());
    }

    fn answer_with(opts: Vec<DhcpOption>) -> Message {
        let mut msg = Message::new_with_id(MessageType::Reply, [0x12, 0x34, 0x56]);
        for opt in opts {
            msg.opts_mut().insert(opt);
        }
        msg
    }

    fn ia_na(iaid: u32, addr: &str, valid: u32) -> DhcpOption {
        let mut opts = DhcpOptions::new();
        opts.insert(DhcpOption::IAAddr(IAAddr {
            addr: addr.parse().unwrap(),
            preferred_life: 300,
            valid_life: valid,
            opts: DhcpOptions::new(),
        }));
        DhcpOption::IANA(IANA {
            id: iaid,
            t1: 1500,
            t2: 3000,
            opts,
        })
    }

    fn server_fqdn(domain: &str) -> DhcpOption {
        DhcpOption::ClientFqdn(ClientFqdn::new(
            FqdnFlags::default().set_s(true),
            domain.parse().unwrap(),
        ))
    }

    #[test]
    fn create_ncrs_requires_client_id() {
        let ddns = updater(DdnsPolicy::default());
        let answer = answer_with(vec![server_fqdn("myhost.example.com.")]);
        assert!(matches!(
            ddns.create_name_change_requests(&answer),
            Err(DdnsError::MissingClientId)
        ));
    }

    #[test]
    fn create_ncrs_no_fqdn_is_noop() {
        let ddns = updater(DdnsPolicy::default());
        let answer = answer_with(vec![DhcpOption::ClientId(test_duid())]);
        ddns.create_name_change_requests(&answer).unwrap();
        assert!(ddns.queue().is_empty());
    }

    #[test]
    fn create_ncrs_no_address_is_noop() {
        let ddns = updater(DdnsPolicy::default());
        let answer = answer_with(vec![
            DhcpOption::ClientId(test_duid()),
            server_fqdn("myhost.example.com."),
        ]);
        ddns.create_name_change_requests(&answer).unwrap();
        assert!(ddns.queue().is_empty());
    }

    // an answer holding 3 IAs still produces exactly one request, for
    // the first address of the first IA; the name in upper case hashes
    // the same as lower case
    #[test]
    fn create_ncrs_single_request_first_ia() {
        let ddns = updater(DdnsPolicy::default());
        let answer = answer_with(vec![
            DhcpOption::ClientId(test_duid()),
            ia_na(1234, "2001:db8:1::1", 500),
            ia_na(2345, "2001:db8:1::2", 500),
            ia_na(3456, "2001:db8:1::3", 500),
            server_fqdn("MYHOST.EXAMPLE.COM"),
        ]);
        ddns.create_name_change_requests(&answer).unwrap();
        let queue = ddns.queue();
        assert_eq!(queue.len(), 1);
        let ncr = queue.pop().unwrap();
        assert_eq!(ncr.change_type(), NameChangeType::Add);
        assert!(ncr.is_forward_change());
        assert!(ncr.is_reverse_change());
        assert_eq!(ncr.ip_address(), "2001:db8:1::1");
        assert_eq!(
            ncr.dhcid(),
            "000201415AA33D1187D148275136FA30300478FAAAA3EBD29826B5C907B2C9268A6F52"
        );
        assert_eq!(ncr.lease_expires_on(), 0);
        assert_eq!(ncr.lease_length(), 500);
    }

    #[test]
    fn removal_fwd_rev() {
        let ddns = updater(DdnsPolicy::default());
        // mixed case hostname hashes like lower case
        ddns.create_removal_name_change_request(
            "2001:db8:1::1".parse().unwrap(),
            &test_duid(),
            "MYHOST.example.com.",
            true,
            true,
            502,
        );
        let ncr = ddns.queue().pop().unwrap();
        assert_eq!(ncr.change_type(), NameChangeType::Remove);
        assert!(ncr.is_forward_change());
        assert!(ncr.is_reverse_change());
        assert_eq!(ncr.ip_address(), "2001:db8:1::1");
        assert_eq!(
            ncr.dhcid(),
            "000201415AA33D1187D148275136FA30300478FAAAA3EBD29826B5C907B2C9268A6F52"
        );
        assert_eq!(ncr.lease_length(), 502);
    }

    #[test]
    fn removal_rev_only() {
        let ddns = updater(DdnsPolicy::default());
        ddns.create_removal_name_change_request(
            "2001:db8:1::1".parse().unwrap(),
            &test_duid(),
            "myhost.example.com.",
            false,
            true,
            502,
        );
        let ncr = ddns.queue().pop().unwrap();
        assert!(!ncr.is_forward_change());
        assert!(ncr.is_reverse_change());
    }

    #[test]
    fn removal_without_dns_is_noop() {
        let ddns = updater(DdnsPolicy::default());
        ddns.create_removal_name_change_request(
            "2001:db8:1::1".parse().unwrap(),
            &test_duid(),
            "myhost.example.com.",
            false,
            false,
            502,
        );
        assert!(ddns.queue().is_empty());
    }

    #[test]
    fn removal_empty_hostname_is_noop() {
        let ddns = updater(DdnsPolicy::default());
        ddns.create_removal_name_change_request(
            "2001:db8:1::1".parse().unwrap(),
            &test_duid(),
            "",
            true,
            true,
            502,
        );
        assert!(ddns.queue().is_empty());
    }

    #[test]
    fn removal_invalid_hostname_is_noop() {
        let ddns = updater(DdnsPolicy::default());
        ddns.create_removal_name_change_request(
            "2001:db8:1::1".parse().unwrap(),
            &test_duid(),
            "myhost..example.com.",
            true,
            true,
            502,
        );
        assert!(ddns.queue().is_empty());
    }

    #[test]
    fn generated_fqdn_from_lease_addr() {
        let ddns = updater(DdnsPolicy::default());
        let name = ddns
            .generate_fqdn(&"2001:db8:1:1::dead:beef".parse().unwrap())
            .unwrap();
        assert_eq!(name.to_string(), "host-2001-db8-1-1--dead-beef.example.com.");
    }
}
