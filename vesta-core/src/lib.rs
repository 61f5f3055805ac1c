//! # vesta
//!
#![warn(
    missing_debug_implementations,
    missing_docs,
    missing_copy_implementations,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]
#![allow(clippy::cognitive_complexity)]
#![deny(rustdoc::broken_intra_doc_links)]
pub use anyhow;
pub use chrono;
pub use pnet;
pub use tracing;
pub use vesta_proto;

pub use crate::server::Server;

pub mod config;
pub mod handler;
pub mod iface;
pub mod metrics;
pub mod prelude;
pub mod server;

/// Register a plugin with the server
pub trait Register<T> {
    /// add plugin to the server's plugin list in the implementation of
    /// this method
    fn register(self, srv: &mut Server<T>);
}
