//! In-memory transport for exercising sinks without a native runtime.
//!
//! `LoopbackTransport` honors the full [`Transport`] contract, including
//! close-time cancellation of pending sends and quiescence, and adds the
//! knobs tests need: failure injection, receive-buffer accounting, manual or
//! automatic send completion, and peer connect/disconnect simulation. All
//! callbacks run on the caller's thread; the internal lock is never held
//! across a sink call, so sinks are free to call back into the transport.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::message::{BufferHandle, PeerId, RawMessage, SendToken};
use crate::status::{SendFlags, SubmitStatus, TransportCode, codes};
use crate::transport::{DispatchStatus, HostDesc, MessageSink, Transport};

thread_local! {
    // Per-thread so concurrently running tests never observe each other's
    // instances.
    static LATEST: RefCell<Option<Arc<LoopbackTransport>>> = const { RefCell::new(None) };
}

/// One payload handed to [`Transport::send_to`].
#[derive(Debug, Clone)]
pub struct SentRecord {
    pub peer: PeerId,
    pub data: Vec<u8>,
    pub flags: SendFlags,
    pub token: SendToken,
}

#[derive(Default)]
struct Inner {
    sink: Option<Arc<dyn MessageSink>>,
    display_name: Option<String>,
    hosted: Option<HostDesc>,
    closed: bool,
    host_calls: u32,
    peers: HashMap<PeerId, String>,
    /// Outstanding receive buffers, by handle. Anything left here after a
    /// delivery callback returns is a buffer the sink failed to return.
    buffers: HashMap<u64, Vec<u8>>,
    next_buffer: u64,
    /// Tokens of accepted async sends that have not completed yet.
    pending: Vec<SendToken>,
    sent: Vec<SentRecord>,
    fail_next_host: Option<i32>,
    fail_next_send: Option<i32>,
    auto_complete: bool,
}

pub struct LoopbackTransport {
    inner: Mutex<Inner>,
}

impl LoopbackTransport {
    /// The instance most recently attached on this thread, if any. Lets
    /// tests that drive a session through an exported ABI reach the
    /// transport underneath.
    pub fn latest() -> Option<Arc<LoopbackTransport>> {
        LATEST.with(|slot| slot.borrow().clone())
    }

    /// Simulate a client connecting: an INDICATE_CONNECT with the remote URL
    /// followed by a CREATE_PLAYER once the runtime assigns `peer`.
    pub fn connect_peer(&self, peer: PeerId, url: &str) {
        {
            let mut inner = self.inner.lock();
            inner.peers.insert(peer, url.to_owned());
        }
        self.dispatch(RawMessage::IndicateConnect {
            address_url: Some(url),
            user_data: &[],
        });
        self.dispatch(RawMessage::CreatePlayer { peer });
    }

    /// Simulate a client disconnecting.
    pub fn drop_peer(&self, peer: PeerId) {
        self.inner.lock().peers.remove(&peer);
        self.dispatch(RawMessage::DestroyPlayer { peer });
    }

    /// Simulate a host-enumeration probe.
    pub fn enum_hosts_query(&self) -> Option<DispatchStatus> {
        self.dispatch(RawMessage::EnumHostsQuery)
    }

    /// Simulate a finished connection attempt.
    pub fn connect_complete(&self, result: TransportCode) {
        self.dispatch(RawMessage::ConnectComplete { result });
    }

    /// Simulate the runtime tearing the session down.
    pub fn terminate_session(&self, result: TransportCode) {
        self.dispatch(RawMessage::TerminateSession { result });
    }

    /// Deliver inbound bytes from `peer`. The sink receives a RECEIVE
    /// message with a tracked buffer handle; returns `true` when a sink was
    /// registered to take it.
    pub fn deliver(&self, peer: PeerId, data: &[u8]) -> bool {
        let (sink, handle) = {
            let mut inner = self.inner.lock();
            if inner.closed || inner.sink.is_none() {
                return false;
            }
            inner.next_buffer += 1;
            let handle = BufferHandle(inner.next_buffer);
            inner.buffers.insert(handle.0, data.to_vec());
            (inner.sink.clone(), handle)
        };
        if let Some(sink) = sink {
            sink.on_message(RawMessage::Receive {
                peer,
                data,
                buffer: handle,
            });
            true
        } else {
            false
        }
    }

    /// Complete an accepted async send.
    pub fn complete_send(&self, token: SendToken, result: TransportCode) {
        let known = {
            let mut inner = self.inner.lock();
            let before = inner.pending.len();
            inner.pending.retain(|t| *t != token);
            inner.pending.len() != before
        };
        if !known {
            warn!(token = token.0, "completing a send that was never pending");
        }
        self.dispatch(RawMessage::SendComplete { token, result });
    }

    /// Fail the next `host` call with `code`.
    pub fn fail_next_host(&self, code: i32) {
        self.inner.lock().fail_next_host = Some(code);
    }

    /// Fail the next `send_to` call with `code`.
    pub fn fail_next_send(&self, code: i32) {
        self.inner.lock().fail_next_send = Some(code);
    }

    /// When set, async sends complete successfully from inside `send_to`.
    pub fn set_auto_complete(&self, on: bool) {
        self.inner.lock().auto_complete = on;
    }

    /// Receive buffers the sink has not returned.
    pub fn outstanding_buffers(&self) -> usize {
        self.inner.lock().buffers.len()
    }

    /// Accepted async sends awaiting completion.
    pub fn pending_sends(&self) -> Vec<SendToken> {
        self.inner.lock().pending.clone()
    }

    /// Every payload submitted so far, oldest first.
    pub fn sent(&self) -> Vec<SentRecord> {
        self.inner.lock().sent.clone()
    }

    pub fn host_calls(&self) -> u32 {
        self.inner.lock().host_calls
    }

    pub fn hosted_port(&self) -> Option<u16> {
        self.inner.lock().hosted.as_ref().map(|d| d.port)
    }

    pub fn display_name(&self) -> Option<String> {
        self.inner.lock().display_name.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    fn dispatch(&self, msg: RawMessage<'_>) -> Option<DispatchStatus> {
        let sink = {
            let inner = self.inner.lock();
            if inner.closed {
                return None;
            }
            inner.sink.clone()
        };
        sink.map(|s| s.on_message(msg))
    }
}

impl Transport for LoopbackTransport {
    fn attach() -> Result<Arc<Self>, TransportCode> {
        let transport = Arc::new(LoopbackTransport {
            inner: Mutex::new(Inner::default()),
        });
        LATEST.with(|slot| *slot.borrow_mut() = Some(transport.clone()));
        Ok(transport)
    }

    fn register_sink(&self, sink: Arc<dyn MessageSink>) -> Result<(), TransportCode> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(TransportCode(codes::UNINITIALIZED));
        }
        inner.sink = Some(sink);
        Ok(())
    }

    fn set_display_name(&self, name: &str) -> Result<(), TransportCode> {
        self.inner.lock().display_name = Some(name.to_owned());
        Ok(())
    }

    fn host(&self, desc: &HostDesc) -> Result<(), TransportCode> {
        let mut inner = self.inner.lock();
        inner.host_calls += 1;
        if let Some(code) = inner.fail_next_host.take() {
            return Err(TransportCode(code));
        }
        if inner.sink.is_none() {
            return Err(TransportCode(codes::NOT_READY));
        }
        if desc.instance_id == [0u8; 16] {
            return Err(TransportCode(codes::INVALID_PARAM));
        }
        inner.hosted = Some(desc.clone());
        debug!(port = desc.port, name = %desc.session_name, "loopback hosting");
        Ok(())
    }

    fn send_to(
        &self,
        peer: PeerId,
        data: &[u8],
        token: SendToken,
        flags: SendFlags,
    ) -> SubmitStatus {
        let auto = {
            let mut inner = self.inner.lock();
            if inner.closed || inner.hosted.is_none() {
                return SubmitStatus::Failed(TransportCode(codes::UNINITIALIZED));
            }
            if let Some(code) = inner.fail_next_send.take() {
                return SubmitStatus::Failed(TransportCode(code));
            }
            if !inner.peers.contains_key(&peer) {
                return SubmitStatus::Failed(TransportCode(codes::INVALID_PLAYER));
            }
            inner.sent.push(SentRecord {
                peer,
                data: data.to_vec(),
                flags,
                token,
            });
            if flags.contains(SendFlags::SYNC) {
                return SubmitStatus::Sent;
            }
            inner.pending.push(token);
            inner.auto_complete
        };
        if auto {
            self.complete_send(token, TransportCode::OK);
        }
        SubmitStatus::Pending
    }

    fn peer_url(&self, peer: PeerId) -> Option<String> {
        self.inner.lock().peers.get(&peer).cloned()
    }

    fn return_buffer(&self, buffer: BufferHandle) {
        if self.inner.lock().buffers.remove(&buffer.0).is_none() {
            warn!(handle = buffer.0, "returning an unknown receive buffer");
        }
    }

    fn close(&self) {
        let (sink, pending) = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return;
            }
            inner.closed = true;
            inner.hosted = None;
            inner.peers.clear();
            let pending = std::mem::take(&mut inner.pending);
            (inner.sink.take(), pending)
        };
        // Cancellation completions are the last callbacks a session makes.
        if let Some(sink) = sink {
            for token in pending {
                sink.on_message(RawMessage::SendComplete {
                    token,
                    result: TransportCode(codes::USER_CANCEL),
                });
            }
        }
    }
}
