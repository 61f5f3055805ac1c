use std::{sync::Arc, thread, time::Duration};

use anyhow::Result;

use leases::{config::DhcpConfig, store::MemoryStore, Leases};
use vesta_core::{
    config::{
        cli::{self, Parser},
        trace,
    },
    iface::IfaceMgr,
    tracing::{debug, info},
    vesta_proto::v6,
    Register, Server,
};

fn main() -> Result<()> {
    // parses from cli or environment var
    let config = cli::Config::parse();
    let trace_config = trace::Config::parse(&config.vesta_log)?;
    debug!(?config, ?trace_config);

    debug!("parsing DHCP config");
    let dhcp_cfg = Arc::new(DhcpConfig::parse(&config.config_path)?);

    info!("detecting interfaces");
    let iface_mgr = IfaceMgr::new()?;

    info!("starting v6 server");
    let mut v6: Server<v6::Message> = Server::new(config, iface_mgr)?;
    let leases = Leases::new(Arc::clone(&dhcp_cfg), MemoryStore::new())?;
    let queue = leases.ncr_queue();
    leases.register(&mut v6);

    // hand queued name change requests to the downstream updater; this
    // build emits them in wire form on the log
    thread::spawn(move || loop {
        match queue.pop() {
            Some(ncr) => info!(ncr = %ncr.to_json(), "name change request"),
            None => thread::sleep(Duration::from_millis(200)),
        }
    });

    v6.listen()
}
