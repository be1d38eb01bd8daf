//! The callback entry point: raw runtime messages in, normalized events out.
//!
//! The dispatcher is deliberately permissive. Rejecting a message class the
//! runtime does not expect to be rejected can abort the whole session, so
//! every arm returns `Accept`, unknown ids and malformed bodies included.
//! Errors the dispatcher cannot propagate (there is no channel back to the
//! runtime that does not kill the session) are swallowed after logging.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use tracing::{debug, info, warn};
use zonelink_dpn::msg_id::msg_name;
use zonelink_dpn::{DispatchStatus, MessageSink, PeerId, RawMessage, Transport};

use crate::event::EventKind;
use crate::queue::EventQueue;
use crate::send::SendRegistry;

pub struct Dispatcher<T: Transport> {
    queue: Arc<EventQueue>,
    sends: Arc<SendRegistry>,
    /// Weak because the transport owns an `Arc` of this sink; a cycle here
    /// would keep both alive past `stop`.
    transport: Weak<T>,
    /// Most recently created remote identity. Advisory/diagnostic only;
    /// relaxed ordering is fine.
    last_created_peer: AtomicU32,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(queue: Arc<EventQueue>, sends: Arc<SendRegistry>, transport: Weak<T>) -> Self {
        Dispatcher {
            queue,
            sends,
            transport,
            last_created_peer: AtomicU32::new(0),
        }
    }

    pub fn last_created_peer(&self) -> PeerId {
        self.last_created_peer.load(Ordering::Relaxed)
    }
}

impl<T: Transport> MessageSink for Dispatcher<T> {
    fn on_message(&self, msg: RawMessage<'_>) -> DispatchStatus {
        match msg {
            // Allow enumeration; nothing the consumer needs to see.
            RawMessage::EnumHostsQuery => {}
            RawMessage::IndicateConnect {
                address_url,
                user_data,
            } => {
                // Identity is not assigned at this stage. The URL can carry
                // a machine name, so it is forwarded as payload for the
                // consumer to sanitize, not logged here.
                debug!(
                    has_url = address_url.is_some(),
                    user_data_len = user_data.len(),
                    "connection indicated"
                );
                let url = address_url.unwrap_or_default();
                self.queue
                    .push(EventKind::ConnectIndicated, 0, url.as_bytes());
            }
            RawMessage::ConnectComplete { result } => {
                // The attempt's result code is logged but not forwarded in
                // the event payload.
                debug!(code = result.0, "connect complete");
                self.queue.push(EventKind::ConnectComplete, 0, &[]);
            }
            RawMessage::CreatePlayer { peer } => {
                self.last_created_peer.store(peer, Ordering::Relaxed);
                let url = self
                    .transport
                    .upgrade()
                    .and_then(|t| t.peer_url(peer))
                    .unwrap_or_default();
                info!(peer = %format!("{peer:#010x}"), "player created");
                self.queue.push(EventKind::PlayerCreated, peer, url.as_bytes());
            }
            RawMessage::DestroyPlayer { peer } => {
                info!(peer = %format!("{peer:#010x}"), "player destroyed");
                self.queue.push(EventKind::PlayerDestroyed, peer, &[]);
            }
            RawMessage::TerminateSession { result } => {
                info!(code = result.0, "session terminated");
                self.queue.push(EventKind::SessionTerminated, 0, &[]);
            }
            RawMessage::Receive { peer, data, buffer } => {
                debug!(
                    peer = %format!("{peer:#010x}"),
                    len = data.len(),
                    "data received"
                );
                self.queue.push(EventKind::DataReceived, peer, data);
                // Inspect-and-drop: the receive buffer goes back to the
                // runtime before this callback returns.
                match self.transport.upgrade() {
                    Some(t) => t.return_buffer(buffer),
                    None => warn!("transport gone, cannot return receive buffer"),
                }
            }
            RawMessage::SendComplete { token, result } => {
                if result.is_failure() {
                    debug!(token = token.0, code = result.0, "send failed");
                }
                if !self.sends.release(token) {
                    warn!(token = token.0, "completion for an unknown send");
                }
                // Pure resource cleanup; no consumer-visible event.
            }
            RawMessage::ReturnBuffer { token } => {
                if let Some(token) = token
                    && !self.sends.release(token)
                {
                    warn!(token = token.0, "returned buffer with an unknown context");
                }
                self.queue.push(EventKind::BufferReturned, 0, &[]);
            }
            RawMessage::Other { msg_id } => {
                debug!(msg = %msg_name(msg_id), "ignoring unhandled message");
            }
        }
        DispatchStatus::Accept
    }
}
