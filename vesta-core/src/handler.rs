//! Plugins register into the request lifecycle by implementing these
//! traits. The server drives every registered plugin in order for each
//! decoded message.
use anyhow::Result;

pub use crate::server::context::MsgContext;

/// Action for the server to take after the plugin returns
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum Action {
    /// Respond with `decoded_resp_msg` from `MsgContext`
    Respond,
    /// Don't respond
    NoResponse,
    /// Continue executing the next plugin
    Continue,
}

/// define a plugin which will mutate a MsgContext<T> where T is the Message type
pub trait Plugin<T>: Send + Sync + 'static {
    /// what to execute during this step in the message lifecycle.
    ///
    /// ORDERING: the server completes every handler for one message
    /// before receiving the next, lease mutation & NCR enqueue for a
    /// packet always precede processing of the packet after it.
    fn handle(&self, ctx: &mut MsgContext<T>) -> Result<Action>;
}
