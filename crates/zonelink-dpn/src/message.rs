use crate::msg_id::VendorMsgId;
use crate::status::TransportCode;

/// Runtime-assigned participant identity. 0 means "no participant" (used by
/// session-wide messages and by connection attempts that have no identity
/// assigned yet).
pub type PeerId = u32;

/// Opaque handle to a runtime-owned receive buffer. Must be handed back via
/// [`Transport::return_buffer`](crate::transport::Transport::return_buffer)
/// once the payload has been copied out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// Caller-chosen token attached to an asynchronous send. The runtime echoes
/// it back in [`RawMessage::SendComplete`] so the submitter can release the
/// payload it kept alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SendToken(pub u64);

/// A raw callback message as delivered by the session runtime.
///
/// Borrowed payloads are valid only for the duration of the callback; the
/// sink must copy anything it wants to keep.
#[derive(Debug)]
pub enum RawMessage<'a> {
    /// A prospective client is enumerating hosts.
    EnumHostsQuery,
    /// A connection attempt arrived. No identity is assigned yet.
    IndicateConnect {
        /// Best-effort remote address URL, when the runtime can produce one.
        address_url: Option<&'a str>,
        /// Application data supplied by the connecting client.
        user_data: &'a [u8],
    },
    /// A connection attempt this host initiated or accepted has finished.
    ConnectComplete { result: TransportCode },
    /// A participant joined the session.
    CreatePlayer { peer: PeerId },
    /// A participant left the session.
    DestroyPlayer { peer: PeerId },
    /// The session was torn down by the runtime.
    TerminateSession { result: TransportCode },
    /// Inbound payload bytes. `buffer` must be returned before long-term
    /// processing; the data slice is only valid during the callback.
    Receive {
        peer: PeerId,
        data: &'a [u8],
        buffer: BufferHandle,
    },
    /// An asynchronous send finished; `token` identifies the submission.
    SendComplete {
        token: SendToken,
        result: TransportCode,
    },
    /// The runtime handed a buffer back, optionally with the submitter's
    /// context token attached.
    ReturnBuffer { token: Option<SendToken> },
    /// Any message id the bridge does not model.
    Other { msg_id: u32 },
}

impl RawMessage<'_> {
    /// The vendor id this message was delivered under.
    pub fn msg_id(&self) -> u32 {
        match self {
            RawMessage::EnumHostsQuery => VendorMsgId::EnumHostsQuery as u32,
            RawMessage::IndicateConnect { .. } => VendorMsgId::IndicateConnect as u32,
            RawMessage::ConnectComplete { .. } => VendorMsgId::ConnectComplete as u32,
            RawMessage::CreatePlayer { .. } => VendorMsgId::CreatePlayer as u32,
            RawMessage::DestroyPlayer { .. } => VendorMsgId::DestroyPlayer as u32,
            RawMessage::TerminateSession { .. } => VendorMsgId::TerminateSession as u32,
            RawMessage::Receive { .. } => VendorMsgId::Receive as u32,
            RawMessage::SendComplete { .. } => VendorMsgId::SendComplete as u32,
            RawMessage::ReturnBuffer { .. } => VendorMsgId::ReturnBuffer as u32,
            RawMessage::Other { msg_id } => *msg_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msg_id_matches_vendor_table() {
        assert_eq!(
            RawMessage::EnumHostsQuery.msg_id(),
            VendorMsgId::EnumHostsQuery as u32
        );
        assert_eq!(
            RawMessage::Receive {
                peer: 7,
                data: b"x",
                buffer: BufferHandle(1),
            }
            .msg_id(),
            VendorMsgId::Receive as u32
        );
        assert_eq!(RawMessage::Other { msg_id: 0xDEAD }.msg_id(), 0xDEAD);
    }
}
