#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]
#![deny(rustdoc::broken_intra_doc_links)]
#![allow(clippy::cognitive_complexity)]

//! # leases
//!
//! Stateful DHCPv6 address assignment with DNS coordination.
//!
//! Drives the Solicit/Request/Renew/Release flows: negotiates the
//! Client FQDN option, allocates or reuses an address, records the
//! hostname & update flags on the lease, and hands name change
//! requests to the [`ddns`] queue in the right order (removals for a
//! previous name or tenant always precede the add for the new one).
//! A Solicit never touches the lease database and never queues DNS
//! work.

use std::{fmt, net::Ipv6Addr, sync::Arc, time::SystemTime};

use chrono::{DateTime, SecondsFormat, Utc};
use ddns::{ncr::NcrQueue, DdnsError, DdnsUpdate, FqdnDecision};
use vesta_core::{
    prelude::*,
    vesta_proto::v6::{
        DhcpOption, DhcpOptions, Duid, IAAddr, Message, MessageType, OptionCode, Status,
        StatusCode, IANA,
    },
    Register,
};

pub mod config;
pub mod metrics;
pub mod store;

use config::DhcpConfig;
use store::{Lease6, LeaseStore, LeaseType, MemoryStore};

/// Lease & DDNS handling for DHCPv6 messages
pub struct Leases<S>
where
    S: LeaseStore,
{
    cfg: Arc<DhcpConfig>,
    store: S,
    ddns: DdnsUpdate,
}

impl<S> fmt::Debug for Leases<S>
where
    S: LeaseStore,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Leases").field("cfg", &self.cfg).finish()
    }
}

/// Convenience alias for the in-memory variant the binary wires up
pub type MemoryLeases = Leases<MemoryStore>;

impl<S> Leases<S>
where
    S: LeaseStore,
{
    pub fn new(cfg: Arc<DhcpConfig>, store: S) -> Result<Self, DdnsError> {
        let ddns = DdnsUpdate::new(cfg.ddns.clone())?;
        Ok(Self { cfg, store, ddns })
    }

    /// handle on the queue the downstream DNS updater consumes
    pub fn ncr_queue(&self) -> NcrQueue {
        self.ddns.queue()
    }
}

impl<S> Plugin<Message> for Leases<S>
where
    S: LeaseStore,
{
    #[instrument(level = "debug", skip_all)]
    fn handle(&self, ctx: &mut MsgContext<Message>) -> Result<Action> {
        match ctx.decoded_msg().msg_type() {
            MessageType::Solicit => self.solicit(ctx),
            MessageType::Request | MessageType::Renew | MessageType::Rebind => self.request(ctx),
            MessageType::Release => self.release(ctx),
            other => {
                debug!(msg_type = ?other, "message type not handled");
                Ok(Action::NoResponse)
            }
        }
    }
}

impl<S> Register<Message> for Leases<S>
where
    S: LeaseStore,
{
    fn register(self, srv: &mut Server<Message>) {
        srv.plugin(self);
    }
}

/// How the allocator answered a client's IA
enum Alloc {
    /// the client already holds this lease
    Existing(Lease6),
    /// an expired lease of another holder gets recycled
    Reused(Lease6),
    /// a never-leased address
    New(Ipv6Addr),
    /// nothing left in the pool
    Exhausted,
}

impl<S> Leases<S>
where
    S: LeaseStore,
{
    fn solicit(&self, ctx: &mut MsgContext<Message>) -> Result<Action> {
        let req = ctx.decoded_msg();
        let Some(duid) = client_duid(req) else {
            debug!("solicit without client id");
            return Ok(Action::NoResponse);
        };
        let iana = client_iana(req);
        let mut decision = self.ddns.process_client_fqdn(req);

        // offer what a Request would get, commit nothing
        if let Some(iana) = iana {
            match self.allocate(&duid, iana.id)? {
                Alloc::Exhausted => {
                    resp_insert(
                        ctx,
                        self.build_ia_na_error(iana.id, Status::NoAddrsAvail, "no addresses left"),
                    )?;
                }
                outcome => {
                    let addr = alloc_addr(&outcome);
                    if let Some(decision) = decision.as_mut() {
                        self.finalize_fqdn(decision, &addr)?;
                    }
                    resp_insert(ctx, self.build_ia_na(iana.id, addr))?;
                }
            }
        }
        if let Some(decision) = decision {
            resp_insert(ctx, DhcpOption::ClientFqdn(decision.fqdn))?;
        }
        Ok(Action::Continue)
    }

    fn request(&self, ctx: &mut MsgContext<Message>) -> Result<Action> {
        let req = ctx.decoded_msg();
        let Some(duid) = client_duid(req) else {
            debug!("request without client id");
            return Ok(Action::NoResponse);
        };
        let iana = client_iana(req);
        let mut decision = self.ddns.process_client_fqdn(req);

        let Some(iana) = iana else {
            // nothing to lease, but the fqdn negotiation still answers
            if let Some(decision) = decision {
                resp_insert(ctx, DhcpOption::ClientFqdn(decision.fqdn))?;
            }
            return Ok(Action::Continue);
        };

        let outcome = self.allocate(&duid, iana.id)?;
        if matches!(outcome, Alloc::Exhausted) {
            metrics::NO_ADDRS_AVAIL.inc();
            debug!(subnet = self.cfg.network.subnet_id, "address pool exhausted");
            resp_insert(
                ctx,
                self.build_ia_na_error(iana.id, Status::NoAddrsAvail, "no addresses left"),
            )?;
            if let Some(decision) = decision {
                resp_insert(ctx, DhcpOption::ClientFqdn(decision.fqdn))?;
            }
            return Ok(Action::Continue);
        }
        let addr = alloc_addr(&outcome);
        if let Some(decision) = decision.as_mut() {
            self.finalize_fqdn(decision, &addr)?;
        }

        // what the lease records about DNS
        let (hostname, fqdn_fwd, fqdn_rev) = match &decision {
            Some(d) if !d.fqdn.domain().is_empty() => (
                d.fqdn.domain().to_string(),
                d.forward,
                d.reverse,
            ),
            _ => (String::new(), false, false),
        };

        let net = &self.cfg.network;
        let lease = Lease6 {
            lease_type: LeaseType::Na,
            addr,
            duid: duid.clone(),
            iaid: iana.id,
            preferred_lft: net.preferred_lft,
            valid_lft: net.valid_lft,
            cltt: SystemTime::now(),
            subnet_id: net.subnet_id,
            hostname: hostname.clone(),
            fqdn_fwd,
            fqdn_rev,
        };

        // removals for a stale name or the previous tenant go out
        // before the add for the new state
        let emit_add = match &outcome {
            Alloc::Existing(old) => {
                let changed = old.hostname != hostname
                    || old.fqdn_fwd != fqdn_fwd
                    || old.fqdn_rev != fqdn_rev;
                if changed {
                    self.removal(old);
                }
                changed
            }
            Alloc::Reused(prior) => {
                self.removal(prior);
                true
            }
            Alloc::New(_) => true,
            Alloc::Exhausted => unreachable!("exhausted handled above"),
        };

        debug!(
            %addr,
            client_id = ?duid,
            iaid = iana.id,
            expires_at = %DateTime::<Utc>::from(lease.expires_at()).to_rfc3339_opts(SecondsFormat::Secs, true),
            hostname = %lease.hostname,
            subnet = net.subnet_id,
            "assigned lease"
        );
        self.store.upsert(lease).map_err(anyhow::Error::new)?;
        metrics::LEASES_ASSIGNED.inc();

        resp_insert(ctx, self.build_ia_na(iana.id, addr))?;
        if let Some(decision) = &decision {
            resp_insert(ctx, DhcpOption::ClientFqdn(decision.fqdn.clone()))?;
        }
        if emit_add {
            if let Some(resp) = ctx.decoded_resp_msg() {
                self.ddns.create_name_change_requests(resp)?;
            }
        }
        Ok(Action::Continue)
    }

    fn release(&self, ctx: &mut MsgContext<Message>) -> Result<Action> {
        let req = ctx.decoded_msg();
        let Some(duid) = client_duid(req) else {
            debug!("release without client id");
            return Ok(Action::NoResponse);
        };
        let decision = self.ddns.process_client_fqdn(req);
        let Some(iana) = client_iana(req) else {
            resp_insert(
                ctx,
                DhcpOption::StatusCode(StatusCode {
                    status: Status::NoBinding,
                    msg: "release without an IA".into(),
                }),
            )?;
            return Ok(Action::Continue);
        };
        let released = iana.first_addr().map(|iaaddr| iaaddr.addr);

        let lease = match released {
            Some(addr) => self
                .store
                .get(LeaseType::Na, addr)
                .map_err(anyhow::Error::new)?,
            None => None,
        };
        match lease {
            Some(lease) if lease.duid == duid && lease.iaid == iana.id => {
                // undo whatever the lease holds in DNS, then drop it
                self.removal(&lease);
                self.store
                    .delete(LeaseType::Na, lease.addr)
                    .map_err(anyhow::Error::new)?;
                metrics::LEASES_RELEASED.inc();
                debug!(addr = %lease.addr, client_id = ?duid, "released lease");
                resp_insert(
                    ctx,
                    DhcpOption::StatusCode(StatusCode {
                        status: Status::Success,
                        msg: "lease released".into(),
                    }),
                )?;
            }
            _ => {
                debug!(addr = ?released, client_id = ?duid, "release for unknown binding");
                resp_insert(
                    ctx,
                    self.build_ia_na_error(iana.id, Status::NoBinding, "no binding for address"),
                )?;
            }
        }
        if let Some(decision) = decision {
            resp_insert(ctx, DhcpOption::ClientFqdn(decision.fqdn))?;
        }
        Ok(Action::Continue)
    }

    /// Find the address for (duid, iaid): their current lease if one
    /// exists, otherwise the first never-leased address of the pool,
    /// otherwise the first expired lease to recycle.
    fn allocate(&self, duid: &Duid, iaid: u32) -> Result<Alloc> {
        if let Some(lease) = self
            .store
            .get_by_client(LeaseType::Na, duid, iaid)
            .map_err(anyhow::Error::new)?
        {
            return Ok(Alloc::Existing(lease));
        }
        let mut first_expired = None;
        for addr in self.cfg.network.range() {
            match self.store.get(LeaseType::Na, addr).map_err(anyhow::Error::new)? {
                None => return Ok(Alloc::New(addr)),
                Some(lease) if lease.expired() && first_expired.is_none() => {
                    first_expired = Some(lease);
                }
                _ => {}
            }
        }
        Ok(match first_expired {
            Some(prior) => Alloc::Reused(prior),
            None => Alloc::Exhausted,
        })
    }

    /// Replace an empty negotiated name with one generated from the
    /// assigned address, when so configured.
    fn finalize_fqdn(&self, decision: &mut FqdnDecision, addr: &Ipv6Addr) -> Result<(), DdnsError> {
        if decision.fqdn.domain().is_empty() && self.ddns.generates_names() {
            decision.fqdn.set_domain(self.ddns.generate_fqdn(addr)?);
        }
        Ok(())
    }

    fn removal(&self, lease: &Lease6) {
        self.ddns.create_removal_name_change_request(
            lease.addr,
            &lease.duid,
            &lease.hostname,
            lease.fqdn_fwd,
            lease.fqdn_rev,
            lease.valid_lft,
        );
    }

    fn build_ia_na(&self, iaid: u32, addr: Ipv6Addr) -> DhcpOption {
        let net = &self.cfg.network;
        let mut opts = DhcpOptions::new();
        opts.insert(DhcpOption::IAAddr(IAAddr {
            addr,
            preferred_life: net.preferred_lft,
            valid_life: net.valid_lft,
            opts: DhcpOptions::new(),
        }));
        DhcpOption::IANA(IANA {
            id: iaid,
            t1: net.t1,
            t2: net.t2,
            opts,
        })
    }

    fn build_ia_na_error(&self, iaid: u32, status: Status, msg: &str) -> DhcpOption {
        let mut opts = DhcpOptions::new();
        opts.insert(DhcpOption::StatusCode(StatusCode {
            status,
            msg: msg.to_owned(),
        }));
        DhcpOption::IANA(IANA {
            id: iaid,
            t1: 0,
            t2: 0,
            opts,
        })
    }
}

fn alloc_addr(outcome: &Alloc) -> Ipv6Addr {
    match outcome {
        Alloc::Existing(lease) | Alloc::Reused(lease) => lease.addr,
        Alloc::New(addr) => *addr,
        Alloc::Exhausted => unreachable!("exhausted carries no address"),
    }
}

fn client_duid(req: &Message) -> Option<Duid> {
    match req.opts().get(OptionCode::ClientId) {
        Some(DhcpOption::ClientId(duid)) => Some(duid.clone()),
        _ => None,
    }
}

fn client_iana(req: &Message) -> Option<IANA> {
    match req.opts().get(OptionCode::IANA) {
        Some(DhcpOption::IANA(iana)) => Some(iana.clone()),
        _ => None,
    }
}

fn resp_insert(ctx: &mut MsgContext<Message>, opt: DhcpOption) -> Result<()> {
    ctx.decoded_resp_msg_mut()
        .as_mut()
        .context("response message must be set before leases runs")?
        .opts_mut()
        .insert(opt);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddns::ncr::{NameChangeRequest, NameChangeType};
    use ddns::DdnsPolicy;
    use std::time::Duration;
    use vesta_core::iface::Pkt6;
    use vesta_core::vesta_proto::{
        v6::{ClientFqdn, FqdnFlags},
        Encodable,
    };

    const ADDR: &str = "2001:db8:1:1::dead:beef";
    const DHCID_MYHOST: &str =
        "000201415AA33D1187D148275136FA30300478FAAAA3EBD29826B5C907B2C9268A6F52";
    const DHCID_OTHERHOST: &str =
        "000201D422AA463306223D269B6CB7AFE7AAD265FCEA97F93623019B2E0D14E5323D5A";
    const DHCID_GENERATED: &str =
        "0002018D6874B105A5C92DBBD6E4F6C80A93161BC03996F0CD0EB75800DEF997C29961";

    fn test_duid() -> Duid {
        (0u8..32).map(|i| 100 + i).collect::<Vec<_>>().into()
    }

    fn other_duid() -> Duid {
        vec![0, 1, 0, 1, 0xde, 0xad].into()
    }

    fn server_duid() -> Duid {
        vec![0, 3, 0, 1, 9, 9, 9, 9, 9, 9].into()
    }

    fn test_cfg(policy: DdnsPolicy) -> Arc<DhcpConfig> {
        Arc::new(DhcpConfig {
            network: config::Network {
                subnet_id: 1,
                range_start: ADDR.parse().unwrap(),
                range_end: ADDR.parse().unwrap(),
                preferred_lft: 3000,
                valid_lft: 4000,
                t1: 1000,
                t2: 2000,
            },
            ddns: policy,
        })
    }

    fn plugin() -> MemoryLeases {
        plugin_with(DdnsPolicy::default())
    }

    fn plugin_with(policy: DdnsPolicy) -> MemoryLeases {
        Leases::new(test_cfg(policy), MemoryStore::new()).unwrap()
    }

    // non-empty names go out fully qualified, the wire type is what
    // matters, not the trailing dot in the test string
    fn fqdn(flags: FqdnFlags, name: &str) -> DhcpOption {
        let mut name: vesta_core::vesta_proto::v6::DomainName = name.parse().unwrap();
        name.set_fqdn(!name.is_empty());
        DhcpOption::ClientFqdn(ClientFqdn::new(flags, name))
    }

    fn fqdn_partial(flags: FqdnFlags, name: &str) -> DhcpOption {
        DhcpOption::ClientFqdn(ClientFqdn::new(flags, name.parse().unwrap()))
    }

    fn s_flag() -> FqdnFlags {
        FqdnFlags::default().set_s(true)
    }

    fn message(
        msg_type: MessageType,
        duid: Duid,
        fqdn_opt: Option<DhcpOption>,
        include_oro: bool,
    ) -> Message {
        let mut msg = Message::new_with_id(msg_type, [0x12, 0x34, 0x56]);
        msg.opts_mut().insert(DhcpOption::ClientId(duid));
        let mut ia_opts = DhcpOptions::new();
        ia_opts.insert(DhcpOption::IAAddr(IAAddr {
            addr: ADDR.parse().unwrap(),
            preferred_life: 300,
            valid_life: 500,
            opts: DhcpOptions::new(),
        }));
        msg.opts_mut().insert(DhcpOption::IANA(IANA {
            id: 234,
            t1: 1500,
            t2: 3000,
            opts: ia_opts,
        }));
        if let Some(opt) = fqdn_opt {
            msg.opts_mut().insert(opt);
        }
        if include_oro {
            msg.opts_mut().insert(DhcpOption::ORO(
                vesta_core::vesta_proto::v6::ORO {
                    opts: vec![OptionCode::ClientFqdn],
                },
            ));
        }
        msg
    }

    fn process(plugin: &MemoryLeases, msg: Message) -> Option<Message> {
        let pkt = Pkt6 {
            buf: msg.to_vec().unwrap(),
            ifname: "eth0".into(),
            ifindex: 2,
            local_addr: "ff02::1:2".parse().unwrap(),
            local_port: 547,
            remote: "[fe80::abcd]:546".parse().unwrap(),
        };
        let mut ctx: MsgContext<Message> = MsgContext::new(pkt).unwrap();
        ctx.init_response(&server_duid());
        match plugin.handle(&mut ctx).unwrap() {
            Action::Continue | Action::Respond => ctx.decoded_resp_msg().cloned(),
            Action::NoResponse => None,
        }
    }

    fn resp_fqdn(resp: &Message) -> ClientFqdn {
        match resp.opts().get(OptionCode::ClientFqdn) {
            Some(DhcpOption::ClientFqdn(fqdn)) => fqdn.clone(),
            other => panic!("expected fqdn option, got {:?}", other),
        }
    }

    fn resp_ia_addr(resp: &Message) -> IAAddr {
        match resp.opts().get(OptionCode::IANA) {
            Some(DhcpOption::IANA(iana)) => iana.first_addr().expect("IA has an address").clone(),
            other => panic!("expected IA_NA, got {:?}", other),
        }
    }

    /// pop the queue head & check every field
    fn verify_ncr(
        ncr: NameChangeRequest,
        change_type: NameChangeType,
        forward: bool,
        reverse: bool,
        addr: &str,
        dhcid: &str,
        lease_length: u32,
    ) {
        assert_eq!(ncr.change_type(), change_type);
        assert_eq!(ncr.is_forward_change(), forward, "forward");
        assert_eq!(ncr.is_reverse_change(), reverse, "reverse");
        assert_eq!(ncr.ip_address(), addr);
        assert_eq!(ncr.dhcid(), dhcid);
        assert_eq!(ncr.lease_expires_on(), 0);
        assert_eq!(ncr.lease_length(), lease_length);
        assert_eq!(ncr.status(), ddns::ncr::NcrStatus::New);
    }

    #[test]
    fn solicit_server_aaaa_update() {
        let plugin = plugin();
        let resp = process(
            &plugin,
            message(
                MessageType::Solicit,
                test_duid(),
                Some(fqdn(s_flag(), "myhost.example.com")),
                true,
            ),
        )
        .unwrap();
        assert_eq!(resp.msg_type(), MessageType::Advertise);
        let answ = resp_fqdn(&resp);
        assert!(answ.flags().s());
        assert!(!answ.flags().o() && !answ.flags().n());
        assert_eq!(answ.domain().to_string(), "myhost.example.com.");
        assert!(answ.domain().is_fqdn());
        // advertise offers the pool address
        assert_eq!(resp_ia_addr(&resp).addr.to_string(), ADDR);
        // no lease recorded, no DNS work queued
        assert!(plugin.store.is_empty().unwrap());
        assert!(plugin.ncr_queue().is_empty());
    }

    #[test]
    fn solicit_partial_name_completed() {
        let plugin = plugin();
        let resp = process(
            &plugin,
            message(
                MessageType::Solicit,
                test_duid(),
                Some(fqdn_partial(s_flag(), "myhost")),
                true,
            ),
        )
        .unwrap();
        assert_eq!(resp_fqdn(&resp).domain().to_string(), "myhost.example.com.");
    }

    #[test]
    fn client_update_denied_gets_override() {
        let plugin = plugin_with(DdnsPolicy {
            allow_client_update: false,
            ..Default::default()
        });
        let resp = process(
            &plugin,
            message(
                MessageType::Solicit,
                test_duid(),
                Some(fqdn(FqdnFlags::default(), "myhost.example.com.")),
                true,
            ),
        )
        .unwrap();
        let answ = resp_fqdn(&resp);
        assert!(answ.flags().s() && answ.flags().o());
        assert_eq!(answ.domain().to_string(), "myhost.example.com.");
    }

    #[test]
    fn request_creates_lease_and_add() {
        let plugin = plugin();
        let resp = process(
            &plugin,
            message(
                MessageType::Request,
                test_duid(),
                Some(fqdn(s_flag(), "myhost.example.com")),
                true,
            ),
        )
        .unwrap();
        assert_eq!(resp.msg_type(), MessageType::Reply);
        let iaaddr = resp_ia_addr(&resp);
        assert_eq!(iaaddr.addr.to_string(), ADDR);
        assert_eq!(iaaddr.valid_life, 4000);

        let lease = plugin
            .store
            .get(LeaseType::Na, ADDR.parse().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(lease.hostname, "myhost.example.com.");
        assert!(lease.fqdn_fwd && lease.fqdn_rev);
        assert_eq!(lease.iaid, 234);

        let queue = plugin.ncr_queue();
        assert_eq!(queue.len(), 1);
        verify_ncr(
            queue.pop().unwrap(),
            NameChangeType::Add,
            true,
            true,
            ADDR,
            DHCID_MYHOST,
            4000,
        );
    }

    // a second Request with a different name replaces the DNS entries:
    // remove for the old name first, then the add for the new one
    #[test]
    fn two_requests_different_name() {
        let plugin = plugin();
        process(
            &plugin,
            message(
                MessageType::Request,
                test_duid(),
                Some(fqdn(s_flag(), "myhost.example.com")),
                true,
            ),
        )
        .unwrap();
        process(
            &plugin,
            message(
                MessageType::Request,
                test_duid(),
                Some(fqdn(s_flag(), "otherhost.example.com")),
                true,
            ),
        )
        .unwrap();

        let queue = plugin.ncr_queue();
        assert_eq!(queue.len(), 3);
        verify_ncr(
            queue.pop().unwrap(),
            NameChangeType::Add,
            true,
            true,
            ADDR,
            DHCID_MYHOST,
            4000,
        );
        verify_ncr(
            queue.pop().unwrap(),
            NameChangeType::Remove,
            true,
            true,
            ADDR,
            DHCID_MYHOST,
            4000,
        );
        verify_ncr(
            queue.pop().unwrap(),
            NameChangeType::Add,
            true,
            true,
            ADDR,
            DHCID_OTHERHOST,
            4000,
        );
        let lease = plugin
            .store
            .get(LeaseType::Na, ADDR.parse().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(lease.hostname, "otherhost.example.com.");
    }

    #[test]
    fn renew_with_new_name_replaces_entries() {
        let plugin = plugin();
        process(
            &plugin,
            message(
                MessageType::Request,
                test_duid(),
                Some(fqdn(s_flag(), "myhost.example.com")),
                true,
            ),
        )
        .unwrap();
        process(
            &plugin,
            message(
                MessageType::Renew,
                test_duid(),
                Some(fqdn(s_flag(), "otherhost.example.com")),
                true,
            ),
        )
        .unwrap();
        let queue = plugin.ncr_queue();
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().unwrap().change_type(), NameChangeType::Add);
        let remove = queue.pop().unwrap();
        assert_eq!(remove.change_type(), NameChangeType::Remove);
        assert_eq!(remove.dhcid(), DHCID_MYHOST);
        let add = queue.pop().unwrap();
        assert_eq!(add.change_type(), NameChangeType::Add);
        assert_eq!(add.dhcid(), DHCID_OTHERHOST);
    }

    // renewing under the same name must not touch DNS again
    #[test]
    fn renew_same_name_no_new_ncr() {
        let plugin = plugin();
        for msg_type in [MessageType::Request, MessageType::Renew] {
            process(
                &plugin,
                message(
                    msg_type,
                    test_duid(),
                    Some(fqdn(s_flag(), "myhost.example.com")),
                    true,
                ),
            )
            .unwrap();
        }
        assert_eq!(plugin.ncr_queue().len(), 1);
    }

    // a returning client's Solicit never mutates leases or the queue,
    // even when it carries a different name
    #[test]
    fn solicit_after_request_commits_nothing() {
        let plugin = plugin();
        process(
            &plugin,
            message(
                MessageType::Request,
                test_duid(),
                Some(fqdn(s_flag(), "myhost.example.com")),
                true,
            ),
        )
        .unwrap();
        let queue = plugin.ncr_queue();
        assert_eq!(queue.len(), 1);
        queue.pop();

        process(
            &plugin,
            message(
                MessageType::Solicit,
                test_duid(),
                Some(fqdn(s_flag(), "otherhost.example.com")),
                true,
            ),
        )
        .unwrap();
        assert!(queue.is_empty());
        let lease = plugin
            .store
            .get(LeaseType::Na, ADDR.parse().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(lease.hostname, "myhost.example.com.");
    }

    // the reply carries the fqdn option whether or not the ORO asked
    // for it
    #[test]
    fn reply_has_fqdn_without_oro() {
        let plugin = plugin();
        let resp = process(
            &plugin,
            message(
                MessageType::Request,
                test_duid(),
                Some(fqdn(s_flag(), "myhost.example.com")),
                false,
            ),
        )
        .unwrap();
        assert_eq!(resp_fqdn(&resp).domain().to_string(), "myhost.example.com.");
        assert_eq!(plugin.ncr_queue().len(), 1);
    }

    #[test]
    fn empty_name_synthesized_from_address() {
        let plugin = plugin();
        let resp = process(
            &plugin,
            message(
                MessageType::Request,
                test_duid(),
                Some(fqdn(s_flag(), "")),
                false,
            ),
        )
        .unwrap();
        let answ = resp_fqdn(&resp);
        assert_eq!(
            answ.domain().to_string(),
            "host-2001-db8-1-1--dead-beef.example.com."
        );
        assert!(answ.domain().is_fqdn());

        let lease = plugin
            .store
            .get(LeaseType::Na, ADDR.parse().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(lease.hostname, "host-2001-db8-1-1--dead-beef.example.com.");

        let queue = plugin.ncr_queue();
        assert_eq!(queue.len(), 1);
        verify_ncr(
            queue.pop().unwrap(),
            NameChangeType::Add,
            true,
            true,
            ADDR,
            DHCID_GENERATED,
            4000,
        );
    }

    // client does its own AAAA update: lease & NCR only cover the PTR
    #[test]
    fn client_update_allowed_reverse_only() {
        let plugin = plugin();
        let resp = process(
            &plugin,
            message(
                MessageType::Request,
                test_duid(),
                Some(fqdn(FqdnFlags::default(), "myhost.example.com.")),
                true,
            ),
        )
        .unwrap();
        let answ = resp_fqdn(&resp);
        assert!(!answ.flags().s() && !answ.flags().n() && !answ.flags().o());

        let lease = plugin
            .store
            .get(LeaseType::Na, ADDR.parse().unwrap())
            .unwrap()
            .unwrap();
        assert!(!lease.fqdn_fwd && lease.fqdn_rev);

        let ncr = plugin.ncr_queue().pop().unwrap();
        assert!(!ncr.is_forward_change());
        assert!(ncr.is_reverse_change());
    }

    // an expired lease left by a previous holder is recycled: its DNS
    // entries are removed before the new tenant's are added
    #[test]
    fn expired_lease_reuse_removes_prior_tenant() {
        let plugin = plugin();
        // the single pool address expired under another IA with a
        // different name
        plugin
            .store
            .upsert(Lease6 {
                lease_type: LeaseType::Na,
                addr: ADDR.parse().unwrap(),
                duid: test_duid(),
                iaid: 999,
                preferred_lft: 3,
                valid_lft: 5,
                cltt: SystemTime::now() - Duration::from_secs(10),
                subnet_id: 2,
                hostname: "otherhost.example.com.".into(),
                fqdn_fwd: true,
                fqdn_rev: true,
            })
            .unwrap();

        process(
            &plugin,
            message(
                MessageType::Request,
                test_duid(),
                Some(fqdn(s_flag(), "myhost.example.com.")),
                true,
            ),
        )
        .unwrap();

        let queue = plugin.ncr_queue();
        assert_eq!(queue.len(), 2);
        verify_ncr(
            queue.pop().unwrap(),
            NameChangeType::Remove,
            true,
            true,
            ADDR,
            DHCID_OTHERHOST,
            5,
        );
        verify_ncr(
            queue.pop().unwrap(),
            NameChangeType::Add,
            true,
            true,
            ADDR,
            DHCID_MYHOST,
            4000,
        );
    }

    #[test]
    fn release_removes_dns_and_lease() {
        let plugin = plugin();
        process(
            &plugin,
            message(
                MessageType::Request,
                test_duid(),
                Some(fqdn(s_flag(), "myhost.example.com")),
                true,
            ),
        )
        .unwrap();
        let queue = plugin.ncr_queue();
        queue.pop();

        let resp = process(
            &plugin,
            message(MessageType::Release, test_duid(), None, false),
        )
        .unwrap();
        assert!(matches!(
            resp.opts().get(OptionCode::StatusCode),
            Some(DhcpOption::StatusCode(status)) if status.status == Status::Success
        ));
        assert_eq!(queue.len(), 1);
        verify_ncr(
            queue.pop().unwrap(),
            NameChangeType::Remove,
            true,
            true,
            ADDR,
            DHCID_MYHOST,
            4000,
        );
        assert!(plugin.store.is_empty().unwrap());
    }

    // a lease that never got DNS entries releases without queueing
    // anything
    #[test]
    fn release_without_dns_queues_nothing() {
        let plugin = plugin();
        process(
            &plugin,
            message(MessageType::Request, test_duid(), None, false),
        )
        .unwrap();
        process(
            &plugin,
            message(MessageType::Release, test_duid(), None, false),
        )
        .unwrap();
        assert!(plugin.ncr_queue().is_empty());
        assert!(plugin.store.is_empty().unwrap());
    }

    #[test]
    fn release_wrong_client_is_no_binding() {
        let plugin = plugin();
        process(
            &plugin,
            message(
                MessageType::Request,
                test_duid(),
                Some(fqdn(s_flag(), "myhost.example.com")),
                true,
            ),
        )
        .unwrap();
        let queue = plugin.ncr_queue();
        queue.pop();

        let resp = process(
            &plugin,
            message(MessageType::Release, other_duid(), None, false),
        )
        .unwrap();
        let iana = match resp.opts().get(OptionCode::IANA) {
            Some(DhcpOption::IANA(iana)) => iana.clone(),
            other => panic!("expected IA_NA, got {:?}", other),
        };
        assert!(matches!(
            iana.opts.get(OptionCode::StatusCode),
            Some(DhcpOption::StatusCode(status)) if status.status == Status::NoBinding
        ));
        assert!(queue.is_empty());
        assert_eq!(plugin.store.len().unwrap(), 1);
    }

    #[test]
    #[tracing_test::traced_test]
    fn pool_exhaustion_no_lease_no_ncr() {
        let plugin = plugin();
        process(
            &plugin,
            message(
                MessageType::Request,
                test_duid(),
                Some(fqdn(s_flag(), "myhost.example.com")),
                true,
            ),
        )
        .unwrap();
        let queue = plugin.ncr_queue();
        queue.pop();

        let resp = process(
            &plugin,
            message(
                MessageType::Request,
                other_duid(),
                Some(fqdn(s_flag(), "second.example.com")),
                true,
            ),
        )
        .unwrap();
        let iana = match resp.opts().get(OptionCode::IANA) {
            Some(DhcpOption::IANA(iana)) => iana.clone(),
            other => panic!("expected IA_NA, got {:?}", other),
        };
        assert!(matches!(
            iana.opts.get(OptionCode::StatusCode),
            Some(DhcpOption::StatusCode(status)) if status.status == Status::NoAddrsAvail
        ));
        // the losing client gets no lease and no DNS work
        assert!(queue.is_empty());
        assert_eq!(plugin.store.len().unwrap(), 1);
        assert!(logs_contain("address pool exhausted"));
    }
}
