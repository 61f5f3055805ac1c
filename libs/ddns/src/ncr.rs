//! Name change requests & the queue they travel through.
//!
//! A `NameChangeRequest` is the unit of work handed to the downstream
//! DNS updater: add or remove the forward/reverse mappings for one
//! address. Requests are serialized to the updater's JSON protocol
//! with the DHCID in uppercase hex.
use std::collections::VecDeque;
use std::net::Ipv6Addr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Serialize, Serializer};

/// Whether the request adds or removes DNS entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameChangeType {
    /// add forward/reverse entries
    Add,
    /// remove forward/reverse entries
    Remove,
}

impl Serialize for NameChangeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // wire protocol uses 0 = add, 1 = remove
        serializer.serialize_u8(match self {
            NameChangeType::Add => 0,
            NameChangeType::Remove => 1,
        })
    }
}

/// Processing state of a queued request. Requests are enqueued `New`;
/// later transitions belong to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NcrStatus {
    #[default]
    New,
    Pending,
    Completed,
    Failed,
}

/// A single name change request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameChangeRequest {
    #[serde(rename = "change-type")]
    change_type: NameChangeType,
    #[serde(rename = "forward-change")]
    forward_change: bool,
    #[serde(rename = "reverse-change")]
    reverse_change: bool,
    #[serde(rename = "ip-address")]
    ip_address: String,
    /// DHCID rdata in uppercase hex
    dhcid: String,
    /// absolute lease expiry in epoch seconds; emitted 0, the consumer
    /// fills it in
    #[serde(rename = "lease-expires-on")]
    lease_expires_on: u64,
    /// valid lifetime of the lease, seconds
    #[serde(rename = "lease-length")]
    lease_length: u32,
    #[serde(skip)]
    status: NcrStatus,
}

impl NameChangeRequest {
    /// Create a new request. At least one of `forward`/`reverse` must be
    /// set, callers skip emission entirely when neither applies.
    pub fn new(
        change_type: NameChangeType,
        forward: bool,
        reverse: bool,
        addr: Ipv6Addr,
        dhcid: String,
        lease_length: u32,
    ) -> Self {
        debug_assert!(forward || reverse, "ncr with no change to make");
        Self {
            change_type,
            forward_change: forward,
            reverse_change: reverse,
            ip_address: addr.to_string(),
            dhcid,
            lease_expires_on: 0,
            lease_length,
            status: NcrStatus::New,
        }
    }

    pub fn change_type(&self) -> NameChangeType {
        self.change_type
    }
    pub fn is_forward_change(&self) -> bool {
        self.forward_change
    }
    pub fn is_reverse_change(&self) -> bool {
        self.reverse_change
    }
    pub fn ip_address(&self) -> &str {
        &self.ip_address
    }
    pub fn dhcid(&self) -> &str {
        &self.dhcid
    }
    pub fn lease_expires_on(&self) -> u64 {
        self.lease_expires_on
    }
    /// set by the consumer once it knows the absolute expiry
    pub fn set_lease_expires_on(&mut self, expires: u64) {
        self.lease_expires_on = expires;
    }
    pub fn lease_length(&self) -> u32 {
        self.lease_length
    }
    pub fn status(&self) -> NcrStatus {
        self.status
    }
    pub fn set_status(&mut self, status: NcrStatus) {
        self.status = status;
    }

    /// the request in the updater's JSON form
    pub fn to_json(&self) -> String {
        // serialization of a struct of primitives cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// FIFO queue of name change requests. Cheap to clone, all clones share
/// the same queue. Producers push at the tail, the consumer pops the
/// head.
#[derive(Debug, Clone, Default)]
pub struct NcrQueue {
    inner: Arc<Mutex<VecDeque<NameChangeRequest>>>,
}

impl NcrQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// enqueue a request at the tail
    pub fn push(&self, ncr: NameChangeRequest) {
        self.inner.lock().push_back(ncr);
    }

    /// dequeue the request at the head
    pub fn pop(&self) -> Option<NameChangeRequest> {
        self.inner.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
