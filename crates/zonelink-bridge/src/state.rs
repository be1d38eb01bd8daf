use std::slice;

use zonelink_dpn::{SendFlags, Transport};

use crate::error::{BridgeError, abi};
use crate::event::EventRecord;
use crate::session::{BridgeConfig, SessionHandle};

/// Process-wide session wrapper behind the exported C surface.
///
/// The raw-pointer entry points live here so the
/// [`export_bridge_abi`](crate::export_bridge_abi) macro body stays a thin
/// set of `extern "C"` shims, mirroring how the safe API is one
/// [`SessionHandle`] per process.
#[doc(hidden)]
pub struct BridgeInstance<T: Transport> {
    handle: SessionHandle<T>,
}

impl<T: Transport> BridgeInstance<T> {
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        BridgeInstance {
            handle: SessionHandle::new(config),
        }
    }

    pub fn handle(&self) -> &SessionHandle<T> {
        &self.handle
    }

    pub fn start_server(&self, port: u16) -> i32 {
        match self.handle.start(port) {
            Ok(()) => abi::ZL_OK,
            Err(err) => err.to_raw(),
        }
    }

    pub fn stop_server(&self) {
        self.handle.stop();
    }

    /// Pop the next queued event into `out_evt`/`out_buf`.
    ///
    /// Returns 1 when an event was delivered, 0 when the queue is empty,
    /// −1 for invalid arguments. A null `out_buf` (or zero `out_cap`) drops
    /// the payload but still delivers the metadata.
    ///
    /// # Safety
    /// `out_evt` must be valid for writes; `out_buf`, when non-null, must be
    /// valid for `out_cap` writable bytes.
    pub unsafe fn pop_event(
        &self,
        out_evt: *mut EventRecord,
        out_buf: *mut u8,
        out_cap: u32,
    ) -> i32 {
        if out_evt.is_null() {
            return -1;
        }
        let out = if out_buf.is_null() || out_cap == 0 {
            None
        } else {
            Some(unsafe { slice::from_raw_parts_mut(out_buf, out_cap as usize) })
        };
        match self.handle.poll_event(out) {
            Some(popped) => {
                unsafe { *out_evt = popped.record };
                1
            }
            None => {
                unsafe { *out_evt = EventRecord::default() };
                0
            }
        }
    }

    pub fn queue_depth(&self) -> u32 {
        self.handle.queue_depth()
    }

    /// Submit `len` bytes to `peer`; `flags` is the vendor flags word.
    ///
    /// # Safety
    /// `buf`, when non-null, must be valid for `len` readable bytes.
    pub unsafe fn send_to(&self, peer: u32, buf: *const u8, len: u32, flags: u32) -> i32 {
        if buf.is_null() || len == 0 {
            return BridgeError::InvalidArgument.to_raw();
        }
        let data = unsafe { slice::from_raw_parts(buf, len as usize) };
        match self.handle.send_to(peer, data, SendFlags::from_raw(flags)) {
            Ok(outcome) => outcome.to_raw(),
            Err(err) => err.to_raw(),
        }
    }
}

impl<T: Transport> Default for BridgeInstance<T> {
    fn default() -> Self {
        Self::new()
    }
}
