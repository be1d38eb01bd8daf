//! Bounded event ring shared between callback threads and the polling
//! consumer.
//!
//! One mutex guards the whole ring. Critical sections are a bounded copy of
//! a fixed-size slot and are never held across a transport call. The queue
//! never blocks a callback thread: when full, the logically oldest unread
//! event is discarded to make room (drop-oldest), which keeps ordering among
//! retained events but makes the sequence non-contiguous under overflow.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::trace;
use zonelink_dpn::PeerId;

use crate::event::{EventKind, EventRecord, FLAG_TRUNCATED, MAX_EVENT_PAYLOAD};

/// Result of a successful pop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Popped {
    /// Event metadata; `data_len` reflects the bytes actually copied out.
    pub record: EventRecord,
    /// Bytes written into the caller's buffer (equals `record.data_len`).
    pub copied: usize,
}

struct Slot {
    record: EventRecord,
    used: usize,
    data: [u8; MAX_EVENT_PAYLOAD],
}

impl Slot {
    fn empty() -> Slot {
        Slot {
            record: EventRecord::default(),
            used: 0,
            data: [0; MAX_EVENT_PAYLOAD],
        }
    }
}

struct Inner {
    slots: Box<[Slot]>,
    head: usize,
    len: usize,
    dropped: u64,
}

pub struct EventQueue {
    inner: Mutex<Inner>,
}

impl EventQueue {
    /// `capacity` must be nonzero.
    pub fn new(capacity: usize) -> EventQueue {
        assert!(capacity > 0, "queue capacity must be nonzero");
        EventQueue {
            inner: Mutex::new(Inner {
                slots: (0..capacity).map(|_| Slot::empty()).collect(),
                head: 0,
                len: 0,
                dropped: 0,
            }),
        }
    }

    /// Enqueue an event. Never fails; on a full ring the oldest unread
    /// event is evicted first. Payloads beyond [`MAX_EVENT_PAYLOAD`] are
    /// truncated and flagged. The timestamp is stamped here.
    pub fn push(&self, kind: EventKind, peer: PeerId, payload: &[u8]) {
        let now = unix_ms_now();
        let mut inner = self.inner.lock();
        let capacity = inner.slots.len();
        if inner.len == capacity {
            inner.head = (inner.head + 1) % capacity;
            inner.len -= 1;
            inner.dropped += 1;
            trace!(kind = ?kind, "queue full, dropped oldest event");
        }

        let tail = (inner.head + inner.len) % capacity;
        let take = payload.len().min(MAX_EVENT_PAYLOAD);
        let slot = &mut inner.slots[tail];
        slot.record = EventRecord {
            msg_id: kind as u32,
            peer_id: peer,
            data_len: take as u32,
            flags: if payload.len() > MAX_EVENT_PAYLOAD {
                FLAG_TRUNCATED
            } else {
                0
            },
            timestamp_ms: now,
        };
        slot.data[..take].copy_from_slice(&payload[..take]);
        slot.used = take;
        inner.len += 1;
    }

    /// Dequeue the oldest event, copying at most `out.len()` payload bytes.
    /// Passing `None` drops the payload but still delivers the metadata
    /// (with `data_len` reporting 0). Non-blocking; `None` when empty.
    pub fn pop(&self, out: Option<&mut [u8]>) -> Option<Popped> {
        let mut inner = self.inner.lock();
        if inner.len == 0 {
            return None;
        }
        let head = inner.head;
        let capacity = inner.slots.len();
        let slot = &mut inner.slots[head];

        let mut record = slot.record;
        let copied = match out {
            Some(buf) if !buf.is_empty() && slot.used > 0 => {
                let n = slot.used.min(buf.len());
                if n < slot.used {
                    record.flags |= FLAG_TRUNCATED;
                }
                buf[..n].copy_from_slice(&slot.data[..n]);
                n
            }
            _ => 0,
        };
        record.data_len = copied as u32;

        slot.record = EventRecord::default();
        slot.used = 0;
        inner.head = (head + 1) % capacity;
        inner.len -= 1;
        Some(Popped { record, copied })
    }

    /// Best-effort current length.
    pub fn depth(&self) -> u32 {
        self.inner.lock().len as u32
    }

    /// Lifetime count of events discarded by drop-oldest eviction.
    pub fn dropped(&self) -> u64 {
        self.inner.lock().dropped
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// Discard all queued events (session teardown). The drop counter is
    /// not advanced; it tracks overflow eviction only.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.head = 0;
        inner.len = 0;
    }
}

fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
