//! The seam between the bridge and the session runtime.
//!
//! A [`Transport`] wraps one session object of the underlying runtime. The
//! runtime pushes messages into a registered [`MessageSink`] from threads it
//! owns; everything else is host-driven calls into the transport.

use std::sync::Arc;

use crate::message::{BufferHandle, PeerId, RawMessage, SendToken};
use crate::status::{SendFlags, SubmitStatus, TransportCode};

/// Returned by the sink for each delivered message.
///
/// Rejecting a message class the runtime does not expect to be rejected can
/// abort the whole session, so sinks are expected to be permissive and
/// reserve `Reject` for messages whose contract explicitly allows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Accept,
    Reject(TransportCode),
}

/// Callback target for runtime messages.
///
/// Implementations must be safe under parallel invocation: the runtime may
/// deliver messages from any number of its own threads concurrently, and a
/// sink call may itself call back into the transport (for example to return
/// a receive buffer).
pub trait MessageSink: Send + Sync {
    fn on_message(&self, msg: RawMessage<'_>) -> DispatchStatus;
}

/// Session topology requested when hosting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTopology {
    ClientServer,
    PeerToPeer,
}

/// Everything the runtime needs to start hosting a session.
#[derive(Debug, Clone)]
pub struct HostDesc {
    /// Local port to listen on.
    pub port: u16,
    /// Session name advertised to enumerating clients.
    pub session_name: String,
    /// Fixed application identity clients match against.
    pub application_id: [u8; 16],
    /// Per-host instance identity; must not be all-zero (some runtimes
    /// refuse a nil instance id).
    pub instance_id: [u8; 16],
    pub topology: SessionTopology,
}

/// One session object of the underlying runtime.
///
/// All methods take `&self`: the runtime object is internally synchronized
/// and is shared between host threads and the runtime's callback threads.
///
/// # Send ownership
///
/// For an async submission that returns [`SubmitStatus::Pending`], the
/// payload bytes must stay valid until the matching
/// [`RawMessage::SendComplete`] is delivered; the caller keeps the backing
/// allocation alive and releases it from the completion. A submission with
/// [`SendFlags::SYNC`] completes during the call and never produces a
/// completion message.
///
/// # Close
///
/// `close` delivers [`RawMessage::SendComplete`] with a cancellation code
/// for every outstanding pending send, then quiesces: once `close` returns,
/// the runtime makes no further sink invocations.
pub trait Transport: Send + Sync + Sized + 'static {
    /// Attach to the runtime and construct a session object.
    fn attach() -> Result<Arc<Self>, TransportCode>;

    /// Register the sole callback target. Must be called before `host`.
    fn register_sink(&self, sink: Arc<dyn MessageSink>) -> Result<(), TransportCode>;

    /// Set the display name some clients query after connecting.
    fn set_display_name(&self, name: &str) -> Result<(), TransportCode>;

    /// Start hosting. After a successful return the runtime may begin
    /// delivering messages at any time.
    fn host(&self, desc: &HostDesc) -> Result<(), TransportCode>;

    /// Submit `data` to `peer`. See the trait docs for the ownership
    /// contract; `token` is echoed back in the completion for async sends.
    fn send_to(
        &self,
        peer: PeerId,
        data: &[u8],
        token: SendToken,
        flags: SendFlags,
    ) -> SubmitStatus;

    /// Best-effort remote address URL for a connected participant.
    fn peer_url(&self, peer: PeerId) -> Option<String>;

    /// Hand a receive buffer back to the runtime.
    fn return_buffer(&self, buffer: BufferHandle);

    /// Close the session. Idempotent; see the trait docs for completion and
    /// quiescence guarantees.
    fn close(&self);
}
