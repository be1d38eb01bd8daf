use bitflags::bitflags;

/// Opaque vendor status code. 0 is success; any nonzero value is a
/// runtime-defined failure and is passed through the bridge unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportCode(pub i32);

impl TransportCode {
    pub const OK: TransportCode = TransportCode(0);

    pub fn is_failure(self) -> bool {
        self.0 != 0
    }
}

/// Codes produced by the in-tree [`LoopbackTransport`](crate::loopback::LoopbackTransport).
///
/// Real transports have their own code space; the bridge treats every
/// nonzero value the same way, so these only need to be distinct.
pub mod codes {
    pub const UNINITIALIZED: i32 = -101;
    pub const INVALID_PARAM: i32 = -102;
    pub const NO_CONNECTION: i32 = -103;
    pub const INVALID_PLAYER: i32 = -104;
    pub const NOT_READY: i32 = -105;
    pub const USER_CANCEL: i32 = -106;
    pub const SESSION_FULL: i32 = -107;
}

/// Result of a send submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    /// The payload was delivered during the call (synchronous path).
    Sent,
    /// The runtime accepted the send and took (conceptual) ownership of the
    /// payload; a `SendComplete` carrying the token will follow.
    Pending,
    /// Submission failed outright; no completion will be delivered.
    Failed(TransportCode),
}

bitflags! {
    /// Vendor send flags. The bridge interprets only [`SendFlags::SYNC`];
    /// the rest pass through to the runtime.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SendFlags: u32 {
        /// Complete the send before returning. A synchronous submission
        /// must not request a completion notification.
        const SYNC = 0x8000_0000;
        /// Suppress the completion notification for an async send.
        const NOCOMPLETE = 0x0002;
        /// Retransmit until acknowledged.
        const GUARANTEED = 0x0008;
    }
}

impl SendFlags {
    /// Interpret an ABI flags word, keeping unknown bits.
    pub fn from_raw(raw: u32) -> SendFlags {
        SendFlags::from_bits_retain(raw)
    }
}
