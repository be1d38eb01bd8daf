use strum::FromRepr;

/// Per-event payload capacity. Inbound data larger than this is truncated
/// at enqueue time and the record is flagged.
pub const MAX_EVENT_PAYLOAD: usize = 16 * 1024;

/// Default ring capacity of the event queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 512;

/// `EventRecord::flags` bit0: the payload was truncated, either to the
/// queue's per-event capacity or to the consumer's buffer at pop time.
pub const FLAG_TRUNCATED: u32 = 1;

/// Consumer-visible event taxonomy.
///
/// Discriminants are part of the cross-boundary contract: they appear in
/// [`EventRecord::msg_id`] and are append-only. `EnumHostsQuery` and
/// `SendCompleted` exist in the taxonomy but the dispatcher handles them
/// without emitting an event.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
pub enum EventKind {
    EnumHostsQuery = 1,
    ConnectIndicated = 2,
    ConnectComplete = 3,
    PlayerCreated = 4,
    PlayerDestroyed = 5,
    SessionTerminated = 6,
    DataReceived = 7,
    SendCompleted = 8,
    BufferReturned = 9,
}

/// Fixed-size event metadata handed to the consumer.
///
/// Byte-stable: 24 bytes, no padding, field order frozen. Extensions must
/// append fields, never reorder or resize existing ones.
///
/// - `msg_id`: an [`EventKind`] discriminant
/// - `peer_id`: remote participant, 0 when not applicable
/// - `data_len`: bytes copied out for this event
/// - `flags`: bit0 = [`FLAG_TRUNCATED`]
/// - `timestamp_ms`: UTC milliseconds since the Unix epoch, captured at
///   enqueue time
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EventRecord {
    pub msg_id: u32,
    pub peer_id: u32,
    pub data_len: u32,
    pub flags: u32,
    pub timestamp_ms: u64,
}

impl EventRecord {
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_repr(self.msg_id)
    }

    pub fn truncated(&self) -> bool {
        self.flags & FLAG_TRUNCATED != 0
    }
}
