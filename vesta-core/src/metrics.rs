#![allow(missing_docs)]

//! # metrics
//!
//! contains statistics for server metrics
use std::time::Instant;

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter, IntCounterVec,
    IntGauge,
};
use vesta_proto::v6::MessageType;

lazy_static! {
    /// When the server started
    pub static ref START_TIME: Instant = Instant::now();

    /// bytes sent DHCPv6
    pub static ref DHCPV6_BYTES_SENT: IntCounter = register_int_counter!("dhcpv6_bytes_sent", "DHCPv6 bytes sent").unwrap();
    /// bytes recv DHCPv6
    pub static ref DHCPV6_BYTES_RECV: IntCounter = register_int_counter!("dhcpv6_bytes_recv", "DHCPv6 bytes recv").unwrap();

    /// aggregate count of all recv'd message types
    pub static ref V6_RECV_COUNT_VEC: IntCounterVec = register_int_counter_vec!(
        "v6_recv_type_counts",
        "V6 Recv Type Counts",
        &["v6_message_type"]
    )
    .unwrap();
    /// aggregate count of all sent message types
    pub static ref V6_SENT_COUNT_VEC: IntCounterVec = register_int_counter_vec!(
        "v6_sent_type_counts",
        "V6 Sent Type Counts",
        &["v6_message_type"]
    )
    .unwrap();

    /// server uptime
    pub static ref UPTIME: IntGauge = register_int_gauge!("uptime", "server uptime (seconds)").unwrap();
}

/// label for a v6 message type in the counter vecs
pub fn v6_msg_type_label(msg_type: MessageType) -> &'static str {
    use MessageType::*;
    match msg_type {
        Solicit => "solicit",
        Advertise => "advertise",
        Request => "request",
        Confirm => "confirm",
        Renew => "renew",
        Rebind => "rebind",
        Reply => "reply",
        Release => "release",
        Decline => "decline",
        Reconfigure => "reconf",
        InformationRequest => "inforeq",
        RelayForw => "relayforw",
        RelayRepl => "relayrepl",
        Unknown(_) => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use prometheus::gather;

    use super::*;

    #[test]
    fn counters_are_registered_and_exposed() {
        V6_RECV_COUNT_VEC
            .with_label_values(&[v6_msg_type_label(MessageType::Solicit)])
            .inc();
        V6_SENT_COUNT_VEC
            .with_label_values(&[v6_msg_type_label(MessageType::Advertise)])
            .inc();

        let families = gather();
        let names = families
            .iter()
            .map(|family| family.get_name().to_string())
            .collect::<HashSet<_>>();

        assert!(
            names.contains("v6_recv_type_counts"),
            "registered metric families: {names:?}"
        );
        assert!(
            names.contains("v6_sent_type_counts"),
            "registered metric families: {names:?}"
        );
    }
}
