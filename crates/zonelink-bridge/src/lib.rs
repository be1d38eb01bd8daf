#![doc = include_str!("../README.md")]

mod dispatch;
mod error;
mod event;
mod queue;
mod send;
mod session;
mod state;

#[doc(hidden)]
pub mod __private {
    pub use crate::state::BridgeInstance;
}

pub use crate::dispatch::Dispatcher;
pub use crate::error::{BridgeError, SendOutcome, abi};
pub use crate::event::{
    DEFAULT_QUEUE_CAPACITY, EventKind, EventRecord, FLAG_TRUNCATED, MAX_EVENT_PAYLOAD,
};
pub use crate::queue::{EventQueue, Popped};
pub use crate::send::{SendArena, SendRegistry};
pub use crate::session::{
    APPLICATION_ID, BridgeConfig, DEFAULT_SERVER_NAME, SessionHandle, SessionState,
};

/// Exports the stable `zl_*` C surface over the given
/// [`Transport`](zonelink_dpn::Transport) implementation.
///
/// Invoke once, from the crate that is built as the host-loadable library:
///
/// ```rust,ignore
/// zonelink_bridge::export_bridge_abi!(MyVendorTransport);
/// ```
///
/// The generated entry points share one process-wide session instance,
/// constructed lazily on first use. `zl_start_server` installs a default
/// `tracing` subscriber when the host process has not set one up.
#[macro_export]
macro_rules! export_bridge_abi {
    ($transport:ty) => {
        const _: () = {
            fn __zonelink_bridge_state() -> &'static $crate::__private::BridgeInstance<$transport> {
                static STATE: ::once_cell::sync::Lazy<
                    $crate::__private::BridgeInstance<$transport>,
                > = ::once_cell::sync::Lazy::new(|| {
                    $crate::__private::BridgeInstance::<$transport>::new()
                });
                &STATE
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn zl_start_server(port: u16) -> i32 {
                let _ = ::tracing_subscriber::fmt::try_init();
                __zonelink_bridge_state().start_server(port)
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn zl_stop_server() {
                __zonelink_bridge_state().stop_server();
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn zl_pop_event(
                out_evt: *mut $crate::EventRecord,
                out_buf: *mut u8,
                out_cap: u32,
            ) -> i32 {
                unsafe { __zonelink_bridge_state().pop_event(out_evt, out_buf, out_cap) }
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn zl_get_queue_depth() -> u32 {
                __zonelink_bridge_state().queue_depth()
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn zl_send_to(
                peer: u32,
                buf: *const u8,
                len: u32,
                flags: u32,
            ) -> i32 {
                unsafe { __zonelink_bridge_state().send_to(peer, buf, len, flags) }
            }
        };
    };
}
