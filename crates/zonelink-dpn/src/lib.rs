//! Vendor-facing half of the zonelink bridge.
//!
//! This crate defines everything that touches the underlying session runtime:
//!
//! - [`msg_id`]: the runtime's raw message-id taxonomy
//! - [`message`]: typed callback payloads ([`RawMessage`])
//! - [`status`]: vendor status codes, submission results and send flags
//! - [`transport`]: the [`Transport`] and [`MessageSink`] traits
//! - [`loopback`]: an in-memory transport for tests and embedder test suites
//!
//! The runtime itself is a black box. Real deployments implement
//! [`Transport`] over the vendor library; everything above this crate is
//! transport-agnostic.

pub mod loopback;
pub mod message;
pub mod msg_id;
pub mod status;
pub mod transport;

pub use loopback::LoopbackTransport;
pub use message::{BufferHandle, PeerId, RawMessage, SendToken};
pub use msg_id::VendorMsgId;
pub use status::{SendFlags, SubmitStatus, TransportCode};
pub use transport::{DispatchStatus, HostDesc, MessageSink, SessionTopology, Transport};
