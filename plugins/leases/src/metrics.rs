#![allow(missing_docs)]

//! lease plugin metrics
use lazy_static::lazy_static;
use prometheus::{register_int_counter, IntCounter};

lazy_static! {
    /// leases created or renewed
    pub static ref LEASES_ASSIGNED: IntCounter =
        register_int_counter!("v6_leases_assigned", "count of v6 leases assigned or renewed").unwrap();
    /// leases released by clients
    pub static ref LEASES_RELEASED: IntCounter =
        register_int_counter!("v6_leases_released", "count of v6 leases released").unwrap();
    /// requests that found the pool exhausted
    pub static ref NO_ADDRS_AVAIL: IntCounter =
        register_int_counter!("v6_no_addrs_avail", "count of requests answered NoAddrsAvail").unwrap();
}
