//! # Server
//!
//! Contains the main server code which reads datagrams off the
//! interface manager and drives the handlers/plugins to completion.
//!
//! The request loop is single threaded and cooperative: the blocking
//! receive is the only suspension point, and one message runs through
//! every handler (negotiation, lease mutation, NCR enqueue) before the
//! next is received.
use anyhow::{bail, Result};
use rand::Rng;
use tracing::{debug, error, info, instrument, warn};
use vesta_proto::v6::{self, Duid};

use std::{fmt, sync::Arc};

pub mod context;

use crate::{
    config::cli::Config,
    handler::{Action, Plugin},
    iface::{IfaceMgr, Pkt6},
    server::context::MsgContext,
};

/// Handy type alias for the `handle` trait objects
pub(crate) type PluginFn<T> = Arc<dyn Plugin<T>>;

/// hardware type used for a generated server DUID
const HTYPE_ETHER: u16 = 1;

/// Holds the plugin list and the interface manager; drives one message
/// at a time through the plugins via [`MsgContext`].
///
/// [`MsgContext`]: crate::server::context::MsgContext
pub struct Server<T> {
    /// all the plugins the server will run, in registration order
    plugins: Vec<PluginFn<T>>,
    /// server config
    config: Config,
    /// interface & socket manager, owned here and torn down with us
    iface_mgr: IfaceMgr,
    /// our DUID, attached to every response
    server_id: Duid,
}

impl<T> fmt::Debug for Server<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("server_id", &self.server_id)
            .finish()
    }
}

impl<T: 'static> Server<T> {
    /// Make a new instance of vesta over detected interfaces
    pub fn new(config: Config, iface_mgr: IfaceMgr) -> Result<Server<T>> {
        let server_id = match iface_mgr.first_mac() {
            Some((hw_type, mac)) => Duid::link_layer(hw_type, mac),
            None => {
                // no usable hardware address, make something stable-ish up
                let mac: [u8; 6] = rand::thread_rng().gen();
                debug!("no interface with a hardware address, generated server id");
                Duid::link_layer(HTYPE_ETHER, &mac)
            }
        };
        info!(?server_id, "server identity");
        for line in iface_mgr.summary().lines() {
            info!("{}", line);
        }
        Ok(Server {
            plugins: Vec::new(),
            config,
            iface_mgr,
            server_id,
        })
    }

    /// Add plugin to the list of handlers. Plugins run in registration
    /// order.
    pub fn plugin<P, U>(&mut self, plugin: U) -> &mut Self
    where
        U: Into<Arc<P>>,
        P: Plugin<T>,
    {
        self.plugins.push(plugin.into());
        self
    }

    /// the server DUID
    pub fn server_id(&self) -> &Duid {
        &self.server_id
    }

    /// the interface manager
    pub fn iface_mgr(&self) -> &IfaceMgr {
        &self.iface_mgr
    }

    /// mutable access to the interface manager
    pub fn iface_mgr_mut(&mut self) -> &mut IfaceMgr {
        &mut self.iface_mgr
    }

    /// Drive the plugins over `ctx` in registration order. Returns true
    /// when the response held in `ctx` should be encoded and sent; a
    /// plugin error or an explicit `NoResponse` silences the reply.
    fn run_handlers(&self, ctx: &mut MsgContext<T>) -> bool {
        for plugin in &self.plugins {
            let action = match plugin.handle(ctx) {
                Ok(action) => action,
                Err(err) => {
                    warn!(?err, "plugin failed, dropping reply");
                    return false;
                }
            };
            match action {
                Action::Continue => {}
                Action::Respond => return true,
                Action::NoResponse => {
                    // a deliberate no-answer also discards whatever
                    // response was built so far
                    ctx.decoded_resp_msg_mut().take();
                    return false;
                }
            }
        }
        // the whole chain ran, send what it built
        true
    }
}

impl Server<v6::Message> {
    /// Open the per-interface DHCPv6 sockets and serve until the
    /// sockets are closed out from under us (which surfaces as an
    /// error), consumes messages one at a time.
    pub fn listen(&mut self) -> Result<()> {
        let port = self.config.v6_port;
        if !self.iface_mgr.open_sockets6(port)? {
            bail!("failed to open any DHCPv6 sockets");
        }
        info!(port, sockets = self.iface_mgr.socket_count(), "listening for DHCPv6");
        loop {
            let pkt = match self.iface_mgr.receive6()? {
                Some(pkt) => pkt,
                // discarded datagram (no pktinfo / unknown interface)
                None => continue,
            };
            if let Err(err) = self.process_pkt(pkt) {
                error!(?err, "error processing message");
            }
        }
    }

    /// Run one received packet through decode, the handler chain, and
    /// the reply send. Wire-level decode failures drop the packet and
    /// are not errors.
    #[instrument(name = "v6", level = "debug", skip_all)]
    pub fn process_pkt(&self, pkt: Pkt6) -> Result<()> {
        let mut ctx: MsgContext<v6::Message> = match MsgContext::new(pkt) {
            Ok(ctx) => ctx,
            Err(err) => {
                warn!(?err, "dropping malformed packet");
                return Ok(());
            }
        };
        ctx.recv_metrics();
        ctx.init_response(&self.server_id);
        debug!(msg_type = ?ctx.decoded_msg().msg_type(), src = %ctx.pkt().remote, "received message");

        if !self.run_handlers(&mut ctx) {
            return Ok(());
        }
        let resp = match ctx.resp_pkt() {
            Ok(Some(resp)) => resp,
            Ok(None) => return Ok(()),
            Err(err) => {
                error!(?err, "failed to encode response");
                return Ok(());
            }
        };
        match self.iface_mgr.send6(&resp) {
            Ok(sent) => ctx.sent_metrics(sent),
            Err(err) => error!(?err, "failed to send response"),
        }
        Ok(())
    }
}
