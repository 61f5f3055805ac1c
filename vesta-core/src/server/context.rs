//! context of current server message
use chrono::{DateTime, Utc};
use vesta_proto::{
    v6::{self, DhcpOption, Duid, MessageType, OptionCode},
    Decodable, DecodeResult, Encodable, EncodeResult,
};

use crate::{
    iface::Pkt6,
    metrics::{v6_msg_type_label, DHCPV6_BYTES_RECV, DHCPV6_BYTES_SENT, V6_RECV_COUNT_VEC, V6_SENT_COUNT_VEC},
};

/// Context is what will be passed to the [handler] traits and mutated by
/// the plugins to enrich with data.
///
/// [handler]: crate::handler
#[derive(Debug)]
pub struct MsgContext<T> {
    /// the packet as received, with its addressing & interface metadata.
    /// `pkt.remote` is always the address we received the message from
    /// and that the response goes back to.
    pkt: Pkt6,
    /// time this context was created
    time: DateTime<Utc>,
    /// decoded from pkt
    msg: T,
    /// decoded response msg
    resp_msg: Option<T>,
}

impl<T> MsgContext<T>
where
    T: Decodable,
{
    /// Decode the packet payload and wrap both in a context
    pub fn new(pkt: Pkt6) -> DecodeResult<Self> {
        let msg = pkt.to_msg::<T>()?;
        Ok(MsgContext {
            pkt,
            time: Utc::now(),
            msg,
            resp_msg: None,
        })
    }
}

impl<T> MsgContext<T> {
    /// the raw packet & its metadata
    pub fn pkt(&self) -> &Pkt6 {
        &self.pkt
    }

    /// Get the `DateTime` that we first created this `MsgContext`
    ///
    /// [`DateTime`]: chrono::DateTime
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// the decoded message we received
    pub fn decoded_msg(&self) -> &T {
        &self.msg
    }

    /// the response being built, if any
    pub fn decoded_resp_msg(&self) -> Option<&T> {
        self.resp_msg.as_ref()
    }

    /// mutable access to the response being built
    pub fn decoded_resp_msg_mut(&mut self) -> &mut Option<T> {
        &mut self.resp_msg
    }

    /// replace the response
    pub fn set_resp_msg(&mut self, msg: T) {
        self.resp_msg = Some(msg);
    }
}

impl<T> MsgContext<T>
where
    T: Encodable,
{
    /// Encode the response into a packet addressed back to the sender,
    /// leaving on the interface the request came in on.
    pub fn resp_pkt(&self) -> EncodeResult<Option<Pkt6>> {
        match &self.resp_msg {
            Some(resp) => Ok(Some(self.pkt.reply_from(resp)?)),
            None => Ok(None),
        }
    }
}

impl MsgContext<v6::Message> {
    /// Seed the response skeleton for the received message type:
    /// ADVERTISE for a Solicit, REPLY for the committing types, nothing
    /// for messages a server doesn't answer. Transaction id and the
    /// client's Client Identifier are echoed, our Server Identifier
    /// attached.
    pub fn init_response(&mut self, server_id: &Duid) {
        use MessageType::*;
        let resp_type = match self.msg.msg_type() {
            Solicit => Advertise,
            Request | Renew | Rebind | Confirm | Release | Decline | InformationRequest => Reply,
            _ => return,
        };
        let mut resp = v6::Message::new_with_id(resp_type, self.msg.xid());
        if let Some(DhcpOption::ClientId(client_id)) = self.msg.opts().get(OptionCode::ClientId) {
            resp.opts_mut()
                .insert(DhcpOption::ClientId(client_id.clone()));
        }
        resp.opts_mut()
            .insert(DhcpOption::ServerId(server_id.clone()));
        self.resp_msg = Some(resp);
    }

    /// count the received message
    pub fn recv_metrics(&self) {
        DHCPV6_BYTES_RECV.inc_by(self.pkt.buf.len() as u64);
        V6_RECV_COUNT_VEC
            .with_label_values(&[v6_msg_type_label(self.msg.msg_type())])
            .inc();
    }

    /// count the sent response
    pub fn sent_metrics(&self, bytes: usize) {
        DHCPV6_BYTES_SENT.inc_by(bytes as u64);
        if let Some(resp) = &self.resp_msg {
            V6_SENT_COUNT_VEC
                .with_label_values(&[v6_msg_type_label(resp.msg_type())])
                .inc();
        }
    }
}
