//! Outbound payload lifetime across the asynchronous send boundary.
//!
//! Every send copies the caller's bytes into a [`SendArena`] so the caller's
//! buffer can go away immediately. For an async submission the runtime may
//! reference those bytes until it delivers the completion, so the arena is
//! parked in the [`SendRegistry`] keyed by its token. Release is
//! [`SendRegistry::release`], a map removal, so for any given token exactly
//! one of the two release sites (failed-submission path in the session,
//! completion path in the dispatcher) can free the arena.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use zonelink_dpn::SendToken;

use crate::error::BridgeError;

/// Owned heap copy of one outbound payload.
pub struct SendArena {
    bytes: Box<[u8]>,
}

impl SendArena {
    /// Allocation failure surfaces as [`BridgeError::OutOfMemory`] instead
    /// of aborting; the callback side has no way to report it otherwise.
    pub fn copy_from(data: &[u8]) -> Result<SendArena, BridgeError> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(data.len())
            .map_err(|_| BridgeError::OutOfMemory)?;
        bytes.extend_from_slice(data);
        Ok(SendArena {
            bytes: bytes.into_boxed_slice(),
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// In-flight arenas, keyed by send token.
pub struct SendRegistry {
    next_token: AtomicU64,
    in_flight: Mutex<HashMap<u64, Arc<SendArena>>>,
}

impl SendRegistry {
    pub fn new() -> SendRegistry {
        SendRegistry {
            next_token: AtomicU64::new(0),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Tokens are never reused within a session.
    pub fn allocate_token(&self) -> SendToken {
        SendToken(self.next_token.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Park an arena until one of the release sites claims it. The arena is
    /// registered before submission so a completion racing the submitting
    /// thread still finds it.
    pub fn insert(&self, token: SendToken, arena: Arc<SendArena>) {
        self.in_flight.lock().insert(token.0, arena);
    }

    /// Free the arena for `token`. Returns `false` when the token is not
    /// registered (already released, or never ours); callers treat that as
    /// a diagnostic, never an error.
    pub fn release(&self, token: SendToken) -> bool {
        self.in_flight.lock().remove(&token.0).is_some()
    }

    /// Arenas currently parked.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Drop everything still parked (session teardown). Returns how many
    /// arenas were discarded.
    pub fn clear(&self) -> usize {
        let mut map = self.in_flight.lock();
        let n = map.len();
        map.clear();
        n
    }
}

impl Default for SendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_nonzero() {
        let reg = SendRegistry::new();
        let a = reg.allocate_token();
        let b = reg.allocate_token();
        assert_ne!(a.0, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn release_succeeds_exactly_once() {
        let reg = SendRegistry::new();
        let token = reg.allocate_token();
        reg.insert(token, Arc::new(SendArena::copy_from(b"abc").expect("arena")));
        assert_eq!(reg.in_flight(), 1);
        assert!(reg.release(token));
        assert!(!reg.release(token));
        assert_eq!(reg.in_flight(), 0);
    }

    #[test]
    fn arena_preserves_bytes() {
        let arena = SendArena::copy_from(b"payload").expect("arena");
        assert_eq!(arena.as_slice(), b"payload");
        assert_eq!(arena.len(), 7);
        assert!(!arena.is_empty());
    }

    #[test]
    fn clear_reports_leftovers() {
        let reg = SendRegistry::new();
        for _ in 0..3 {
            let t = reg.allocate_token();
            reg.insert(t, Arc::new(SendArena::copy_from(b"x").expect("arena")));
        }
        assert_eq!(reg.clear(), 3);
        assert_eq!(reg.in_flight(), 0);
    }

    #[test]
    fn concurrent_release_frees_once() {
        let reg = Arc::new(SendRegistry::new());
        for _ in 0..100 {
            let token = reg.allocate_token();
            reg.insert(token, Arc::new(SendArena::copy_from(b"x").expect("arena")));
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let reg = reg.clone();
                    std::thread::spawn(move || reg.release(token))
                })
                .collect();
            let released = handles
                .into_iter()
                .map(|h| h.join().expect("join"))
                .filter(|&r| r)
                .count();
            assert_eq!(released, 1);
            assert_eq!(reg.in_flight(), 0);
        }
    }
}
