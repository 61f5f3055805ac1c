//! The lease view: what the DDNS path reads & writes about leases.
use std::collections::BTreeMap;
use std::net::Ipv6Addr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use thiserror::Error;
use vesta_core::vesta_proto::v6::Duid;

/// Lease categories, mirroring the IA container the address came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LeaseType {
    /// non-temporary address (IA_NA)
    Na,
    /// temporary address (IA_TA)
    Ta,
    /// delegated prefix (IA_PD)
    Pd,
}

/// One DHCPv6 lease with the DNS bookkeeping the DDNS path maintains.
///
/// When either `fqdn_fwd` or `fqdn_rev` is set, `hostname` holds the
/// canonical (lower-case, trailing dot) name those DNS entries were
/// made under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease6 {
    pub lease_type: LeaseType,
    pub addr: Ipv6Addr,
    pub duid: Duid,
    pub iaid: u32,
    pub preferred_lft: u32,
    pub valid_lft: u32,
    /// client last transmission time
    pub cltt: SystemTime,
    pub subnet_id: u32,
    /// canonical fqdn, empty when the client has no name
    pub hostname: String,
    /// an AAAA record exists for this lease
    pub fqdn_fwd: bool,
    /// a PTR record exists for this lease
    pub fqdn_rev: bool,
}

impl Lease6 {
    /// when the valid lifetime runs out
    pub fn expires_at(&self) -> SystemTime {
        self.cltt + Duration::from_secs(u64::from(self.valid_lft))
    }

    /// has the valid lifetime run out
    pub fn expired(&self) -> bool {
        self.expires_at() < SystemTime::now()
    }

    /// does this lease hold DNS entries
    pub fn has_dns(&self) -> bool {
        self.fqdn_fwd || self.fqdn_rev
    }
}

/// Storage operations the message processors need. Everything is keyed
/// by (lease type, address); a client's current binding is found via
/// (duid, iaid).
pub trait LeaseStore: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// lease currently recorded for an address
    fn get(&self, lease_type: LeaseType, addr: Ipv6Addr) -> Result<Option<Lease6>, Self::Error>;

    /// lease currently bound to (duid, iaid)
    fn get_by_client(
        &self,
        lease_type: LeaseType,
        duid: &Duid,
        iaid: u32,
    ) -> Result<Option<Lease6>, Self::Error>;

    /// insert or replace the lease for its (type, address)
    fn upsert(&self, lease: Lease6) -> Result<(), Self::Error>;

    /// remove & return the lease for an address
    fn delete(&self, lease_type: LeaseType, addr: Ipv6Addr)
        -> Result<Option<Lease6>, Self::Error>;

    /// number of stored leases
    fn len(&self) -> Result<usize, Self::Error>;

    /// true when nothing is stored
    fn is_empty(&self) -> Result<bool, Self::Error> {
        Ok(self.len()? == 0)
    }
}

#[derive(Debug, Error)]
pub enum MemoryError {
    // in-memory operations are infallible; the variant keeps the
    // Storage error contract honest for fallible backends
    #[error("memory store poisoned")]
    Poisoned,
}

/// In-memory lease storage
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<BTreeMap<(LeaseType, Ipv6Addr), Lease6>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeaseStore for MemoryStore {
    type Error = MemoryError;

    fn get(&self, lease_type: LeaseType, addr: Ipv6Addr) -> Result<Option<Lease6>, Self::Error> {
        let guard = self.inner.lock().map_err(|_| MemoryError::Poisoned)?;
        Ok(guard.get(&(lease_type, addr)).cloned())
    }

    fn get_by_client(
        &self,
        lease_type: LeaseType,
        duid: &Duid,
        iaid: u32,
    ) -> Result<Option<Lease6>, Self::Error> {
        let guard = self.inner.lock().map_err(|_| MemoryError::Poisoned)?;
        Ok(guard
            .values()
            .find(|lease| lease.lease_type == lease_type && lease.duid == *duid && lease.iaid == iaid)
            .cloned())
    }

    fn upsert(&self, lease: Lease6) -> Result<(), Self::Error> {
        let mut guard = self.inner.lock().map_err(|_| MemoryError::Poisoned)?;
        guard.insert((lease.lease_type, lease.addr), lease);
        Ok(())
    }

    fn delete(
        &self,
        lease_type: LeaseType,
        addr: Ipv6Addr,
    ) -> Result<Option<Lease6>, Self::Error> {
        let mut guard = self.inner.lock().map_err(|_| MemoryError::Poisoned)?;
        Ok(guard.remove(&(lease_type, addr)))
    }

    fn len(&self) -> Result<usize, Self::Error> {
        let guard = self.inner.lock().map_err(|_| MemoryError::Poisoned)?;
        Ok(guard.len())
    }
}
