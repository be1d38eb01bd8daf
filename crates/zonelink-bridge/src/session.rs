//! Session lifecycle: one transport session owned end to end.
//!
//! A [`SessionHandle`] bundles the event queue, the send registry and the
//! session state machine behind one object, preserving the
//! one-session-per-process usage pattern without global mutable state.
//! `start`/`stop` serialize on an inner mutex; `send_to` and `poll_event`
//! only snapshot state under it and never hold it across a transport call.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use zonelink_dpn::{
    HostDesc, PeerId, SendFlags, SessionTopology, SubmitStatus, Transport, TransportCode,
};

use crate::dispatch::Dispatcher;
use crate::error::{BridgeError, SendOutcome};
use crate::event::DEFAULT_QUEUE_CAPACITY;
use crate::queue::{EventQueue, Popped};
use crate::send::{SendArena, SendRegistry};

/// Application identity advertised to clients,
/// `77E2D9C2-504E-459F-8416-0848130BBE1E` in its canonical form.
pub const APPLICATION_ID: [u8; 16] = [
    0xC2, 0xD9, 0xE2, 0x77, 0x4E, 0x50, 0x9F, 0x45, 0x84, 0x16, 0x08, 0x48, 0x13, 0x0B, 0xBE, 0x1E,
];

/// Name advertised as both the session and the server display name; some
/// clients query it after connecting.
pub const DEFAULT_SERVER_NAME: &str = "CompatServer";

/// Session lifecycle state machine.
///
/// `Initializing` and `Closed` are transient: they are observable through
/// [`SessionHandle::state`] while a `start` or `stop` is in progress on
/// another thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Hosting,
    Closed,
}

/// Construction-time settings.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub server_name: String,
    pub application_id: [u8; 16],
    pub queue_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            server_name: DEFAULT_SERVER_NAME.to_owned(),
            application_id: APPLICATION_ID,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

struct SessionInner<T: Transport> {
    transport: Option<Arc<T>>,
    dispatcher: Option<Arc<Dispatcher<T>>>,
}

pub struct SessionHandle<T: Transport> {
    config: BridgeConfig,
    queue: Arc<EventQueue>,
    sends: Arc<SendRegistry>,
    state: Mutex<SessionState>,
    inner: Mutex<SessionInner<T>>,
}

impl<T: Transport> SessionHandle<T> {
    pub fn new(config: BridgeConfig) -> Self {
        let queue = Arc::new(EventQueue::new(config.queue_capacity));
        SessionHandle {
            config,
            queue,
            sends: Arc::new(SendRegistry::new()),
            state: Mutex::new(SessionState::Uninitialized),
            inner: Mutex::new(SessionInner {
                transport: None,
                dispatcher: None,
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Attach to the runtime and start hosting on `port`. Idempotent while
    /// hosting. Any step failure unwinds all partially-acquired resources
    /// and leaves the session back at `Uninitialized`.
    pub fn start(&self, port: u16) -> Result<(), BridgeError> {
        let mut inner = self.inner.lock();
        if inner.transport.is_some() {
            debug!(port, "start while hosting is a no-op");
            return Ok(());
        }
        self.set_state(SessionState::Initializing);

        let transport = match T::attach() {
            Ok(t) => t,
            Err(code) => {
                self.set_state(SessionState::Uninitialized);
                warn!(code = code.0, "runtime attach failed");
                return Err(BridgeError::Transport(code.0));
            }
        };
        let dispatcher = Arc::new(Dispatcher::new(
            self.queue.clone(),
            self.sends.clone(),
            Arc::downgrade(&transport),
        ));

        let hosted = (|| -> Result<(), TransportCode> {
            transport.register_sink(dispatcher.clone())?;
            transport.set_display_name(&self.config.server_name)?;
            transport.host(&HostDesc {
                port,
                session_name: self.config.server_name.clone(),
                application_id: self.config.application_id,
                instance_id: fresh_instance_id(),
                topology: SessionTopology::ClientServer,
            })?;
            Ok(())
        })();

        match hosted {
            Ok(()) => {
                inner.transport = Some(transport);
                inner.dispatcher = Some(dispatcher);
                self.set_state(SessionState::Hosting);
                info!(port, name = %self.config.server_name, "hosting session");
                Ok(())
            }
            Err(code) => {
                // Unwind: the session object is closed and released, the
                // sink registration dies with it.
                transport.close();
                self.set_state(SessionState::Uninitialized);
                warn!(port, code = code.0, "start failed");
                Err(BridgeError::Transport(code.0))
            }
        }
    }

    /// Close and release the session. Best-effort and idempotent; never
    /// fails observably. After `stop` the handle is back to `Uninitialized`
    /// and `start` may be called again.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        let Some(transport) = inner.transport.take() else {
            debug!("stop with no session is a no-op");
            return;
        };
        self.set_state(SessionState::Closed);

        // Close cancels outstanding pending sends (the dispatcher releases
        // their arenas from the cancellation completions) and quiesces
        // callbacks.
        transport.close();
        inner.dispatcher = None;

        let leaked = self.sends.clear();
        if leaked > 0 {
            warn!(leaked, "send contexts survived close; discarding");
        }
        self.queue.clear();
        self.set_state(SessionState::Uninitialized);
        info!("session stopped");
    }

    /// Copy `data` and submit it to `peer`. On an accepted async submission
    /// the copy stays alive until the runtime's completion releases it; on
    /// immediate failure it is released before returning.
    pub fn send_to(
        &self,
        peer: PeerId,
        data: &[u8],
        flags: SendFlags,
    ) -> Result<SendOutcome, BridgeError> {
        let transport = {
            let inner = self.inner.lock();
            match &inner.transport {
                Some(t) if *self.state.lock() == SessionState::Hosting => t.clone(),
                _ => return Err(BridgeError::NotInitialized),
            }
        };
        if data.is_empty() {
            return Err(BridgeError::InvalidArgument);
        }

        let arena = Arc::new(SendArena::copy_from(data)?);
        let token = self.sends.allocate_token();
        // Registered before submission so an inline completion finds it.
        self.sends.insert(token, arena.clone());

        match transport.send_to(peer, arena.as_slice(), token, flags) {
            SubmitStatus::Sent => {
                self.sends.release(token);
                Ok(SendOutcome::Delivered)
            }
            SubmitStatus::Pending if flags.contains(SendFlags::SYNC) => {
                // A sync submission must not produce a completion; do not
                // wait for one that may never come.
                warn!(token = token.0, "sync send reported pending");
                self.sends.release(token);
                Ok(SendOutcome::Delivered)
            }
            SubmitStatus::Pending => Ok(SendOutcome::Pending),
            SubmitStatus::Failed(code) => {
                self.sends.release(token);
                debug!(peer = %format!("{peer:#010x}"), code = code.0, "send rejected");
                Err(BridgeError::Transport(code.0))
            }
        }
    }

    /// Dequeue the oldest event; see [`EventQueue::pop`]. Non-blocking.
    pub fn poll_event(&self, out: Option<&mut [u8]>) -> Option<Popped> {
        self.queue.pop(out)
    }

    /// Best-effort queued event count.
    pub fn queue_depth(&self) -> u32 {
        self.queue.depth()
    }

    /// Lifetime count of events lost to drop-oldest eviction. Overflow is
    /// silent data loss by design; monitor this, not error returns.
    pub fn dropped_events(&self) -> u64 {
        self.queue.dropped()
    }

    /// Sends awaiting a completion from the runtime.
    pub fn sends_in_flight(&self) -> usize {
        self.sends.in_flight()
    }

    /// Most recently created remote identity; advisory only.
    pub fn last_created_peer(&self) -> PeerId {
        self.inner
            .lock()
            .dispatcher
            .as_ref()
            .map(|d| d.last_created_peer())
            .unwrap_or(0)
    }

    /// The live transport, if hosting. Diagnostic and test access.
    pub fn transport(&self) -> Option<Arc<T>> {
        self.inner.lock().transport.clone()
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock() = state;
    }
}

impl<T: Transport> Drop for SessionHandle<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Some runtimes refuse a nil instance id, so roll until nonzero.
fn fresh_instance_id() -> [u8; 16] {
    loop {
        let id: [u8; 16] = rand::random();
        if id != [0u8; 16] {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use std::sync::atomic::{AtomicBool, Ordering};
    use zonelink_dpn::loopback::LoopbackTransport;
    use zonelink_dpn::status::codes;
    use zonelink_dpn::{BufferHandle, MessageSink, SendToken};

    fn handle() -> SessionHandle<LoopbackTransport> {
        SessionHandle::new(BridgeConfig::default())
    }

    struct AttachFails;

    impl Transport for AttachFails {
        fn attach() -> Result<Arc<Self>, TransportCode> {
            Err(TransportCode(codes::NOT_READY))
        }
        fn register_sink(&self, _sink: Arc<dyn MessageSink>) -> Result<(), TransportCode> {
            Ok(())
        }
        fn set_display_name(&self, _name: &str) -> Result<(), TransportCode> {
            Ok(())
        }
        fn host(&self, _desc: &HostDesc) -> Result<(), TransportCode> {
            Ok(())
        }
        fn send_to(
            &self,
            _peer: PeerId,
            _data: &[u8],
            _token: SendToken,
            _flags: SendFlags,
        ) -> SubmitStatus {
            SubmitStatus::Failed(TransportCode(codes::UNINITIALIZED))
        }
        fn peer_url(&self, _peer: PeerId) -> Option<String> {
            None
        }
        fn return_buffer(&self, _buffer: BufferHandle) {}
        fn close(&self) {}
    }

    static HOST_FAILS_CLOSED: AtomicBool = AtomicBool::new(false);

    struct HostFails;

    impl Transport for HostFails {
        fn attach() -> Result<Arc<Self>, TransportCode> {
            HOST_FAILS_CLOSED.store(false, Ordering::SeqCst);
            Ok(Arc::new(HostFails))
        }
        fn register_sink(&self, _sink: Arc<dyn MessageSink>) -> Result<(), TransportCode> {
            Ok(())
        }
        fn set_display_name(&self, _name: &str) -> Result<(), TransportCode> {
            Ok(())
        }
        fn host(&self, _desc: &HostDesc) -> Result<(), TransportCode> {
            Err(TransportCode(codes::SESSION_FULL))
        }
        fn send_to(
            &self,
            _peer: PeerId,
            _data: &[u8],
            _token: SendToken,
            _flags: SendFlags,
        ) -> SubmitStatus {
            SubmitStatus::Failed(TransportCode(codes::UNINITIALIZED))
        }
        fn peer_url(&self, _peer: PeerId) -> Option<String> {
            None
        }
        fn return_buffer(&self, _buffer: BufferHandle) {}
        fn close(&self) {
            HOST_FAILS_CLOSED.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn start_is_idempotent_while_hosting() {
        let h = handle();
        h.start(6112).expect("start");
        let first = h.transport().expect("transport");
        assert_eq!(first.hosted_port(), Some(6112));

        h.start(6112).expect("second start");
        let second = h.transport().expect("transport");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.host_calls(), 1);
        assert_eq!(h.state(), SessionState::Hosting);
    }

    #[test]
    fn attach_failure_surfaces_code() {
        let h: SessionHandle<AttachFails> = SessionHandle::new(BridgeConfig::default());
        assert_eq!(
            h.start(6112),
            Err(BridgeError::Transport(codes::NOT_READY))
        );
        assert_eq!(h.state(), SessionState::Uninitialized);
        assert!(h.transport().is_none());
    }

    #[test]
    fn host_failure_unwinds_to_uninitialized() {
        let h: SessionHandle<HostFails> = SessionHandle::new(BridgeConfig::default());
        assert_eq!(
            h.start(6112),
            Err(BridgeError::Transport(codes::SESSION_FULL))
        );
        assert_eq!(h.state(), SessionState::Uninitialized);
        assert!(h.transport().is_none());
        // The partial session object was closed during the unwind.
        assert!(HOST_FAILS_CLOSED.load(Ordering::SeqCst));
        // The handle is still usable afterwards.
        assert_eq!(h.queue_depth(), 0);
    }

    #[test]
    fn stop_is_idempotent() {
        let h = handle();
        h.start(6112).expect("start");
        h.stop();
        assert_eq!(h.state(), SessionState::Uninitialized);
        h.stop();
        assert_eq!(h.state(), SessionState::Uninitialized);
        // And restartable after a full stop.
        h.start(6113).expect("restart");
        assert_eq!(h.transport().expect("transport").hosted_port(), Some(6113));
    }

    #[test]
    fn send_requires_hosting_and_nonempty_payload() {
        let h = handle();
        assert_eq!(
            h.send_to(1, b"x", SendFlags::GUARANTEED),
            Err(BridgeError::NotInitialized)
        );
        h.start(6112).expect("start");
        assert_eq!(
            h.send_to(1, b"", SendFlags::GUARANTEED),
            Err(BridgeError::InvalidArgument)
        );
    }

    #[test]
    fn failed_send_releases_arena_immediately() {
        let h = handle();
        h.start(6112).expect("start");
        let t = h.transport().expect("transport");
        t.connect_peer(8, "x-tcp://192.0.2.2:2300");

        t.fail_next_send(codes::NO_CONNECTION);
        let err = h.send_to(8, b"data", SendFlags::GUARANTEED);
        assert_eq!(err, Err(BridgeError::Transport(codes::NO_CONNECTION)));
        assert_eq!(h.sends_in_flight(), 0);
    }

    #[test]
    fn pending_send_releases_on_completion() {
        let h = handle();
        h.start(6112).expect("start");
        let t = h.transport().expect("transport");
        t.connect_peer(8, "x-tcp://192.0.2.2:2300");

        let out = h.send_to(8, b"data", SendFlags::GUARANTEED).expect("send");
        assert_eq!(out, SendOutcome::Pending);
        assert_eq!(h.sends_in_flight(), 1);

        let token = t.pending_sends()[0];
        t.complete_send(token, TransportCode::OK);
        assert_eq!(h.sends_in_flight(), 0);
    }

    #[test]
    fn inline_completion_is_handled() {
        let h = handle();
        h.start(6112).expect("start");
        let t = h.transport().expect("transport");
        t.connect_peer(8, "x-tcp://192.0.2.2:2300");
        t.set_auto_complete(true);

        let out = h.send_to(8, b"data", SendFlags::GUARANTEED).expect("send");
        assert_eq!(out, SendOutcome::Pending);
        assert_eq!(h.sends_in_flight(), 0);
    }

    #[test]
    fn sync_send_leaves_nothing_in_flight() {
        let h = handle();
        h.start(6112).expect("start");
        let t = h.transport().expect("transport");
        t.connect_peer(8, "x-tcp://192.0.2.2:2300");

        let out = h
            .send_to(8, b"data", SendFlags::SYNC | SendFlags::GUARANTEED)
            .expect("send");
        assert_eq!(out, SendOutcome::Delivered);
        assert_eq!(h.sends_in_flight(), 0);
        assert_eq!(t.sent().len(), 1);
    }

    #[test]
    fn stop_cancels_pending_sends_exactly_once() {
        let h = handle();
        h.start(6112).expect("start");
        let t = h.transport().expect("transport");
        t.connect_peer(8, "x-tcp://192.0.2.2:2300");

        h.send_to(8, b"data", SendFlags::GUARANTEED).expect("send");
        assert_eq!(h.sends_in_flight(), 1);
        h.stop();
        // Released by the close-time cancellation completion, not leaked to
        // the teardown sweep.
        assert_eq!(h.sends_in_flight(), 0);
    }

    #[test]
    fn stop_clears_the_queue() {
        let h = handle();
        h.start(6112).expect("start");
        let t = h.transport().expect("transport");
        t.connect_peer(8, "x-tcp://192.0.2.2:2300");
        assert!(h.queue_depth() > 0);
        h.stop();
        assert_eq!(h.queue_depth(), 0);
        assert_eq!(h.poll_event(None), None);
    }

    #[test]
    fn last_created_peer_tracks_and_resets() {
        let h = handle();
        assert_eq!(h.last_created_peer(), 0);
        h.start(6112).expect("start");
        let t = h.transport().expect("transport");
        t.connect_peer(0x42, "x-tcp://192.0.2.2:2300");
        assert_eq!(h.last_created_peer(), 0x42);
        h.stop();
        assert_eq!(h.last_created_peer(), 0);
    }

    #[test]
    fn poll_returns_events_in_dispatch_order() {
        let h = handle();
        h.start(6112).expect("start");
        let t = h.transport().expect("transport");
        t.connect_peer(1, "x-tcp://192.0.2.2:2300");
        t.deliver(1, b"hello");

        let kinds: Vec<_> =
            std::iter::from_fn(|| h.poll_event(None).and_then(|p| p.record.kind())).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::ConnectIndicated,
                EventKind::PlayerCreated,
                EventKind::DataReceived,
            ]
        );
    }
}
