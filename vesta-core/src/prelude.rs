//! vesta prelude

pub use crate::{
    anyhow::{self, Context, Result},
    handler::{Action, Plugin},
    iface::{Iface, IfaceMgr, Pkt4, Pkt6},
    server::{context::MsgContext, Server},
    tracing::{self, debug, error, info, instrument, trace, warn},
    vesta_proto,
};

pub use std::{io, sync::Arc};
