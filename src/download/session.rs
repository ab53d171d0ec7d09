//! Per-user cancellable download sessions
//!
//! One active download per user. The tracker maps a Telegram user id to the
//! cancel flag of that user's running fetch; the flag is created on register,
//! set at most once by `/stop`, and discarded on release. Cancellation is
//! cooperative: the fetch side polls the flag at progress-callback points
//! only, so a stalled extractor that produces no output cannot be
//! interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

/// Cloneable handle to a single download's cancellation state.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Setting an already-set flag is a no-op.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Polled by the fetch operation inside progress callbacks.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Registry of active downloads, keyed by Telegram user id.
///
/// Owned by the handler dependencies and shared across requests via `Arc`.
/// `DashMap` gives atomic single-key insert-if-absent, lookup and remove,
/// which is all the design needs: each entry is touched only by the request
/// that owns it and by `/stop` from the same user.
#[derive(Debug, Default)]
pub struct SessionTracker {
    active: DashMap<u64, CancelFlag>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a download for `user_id` and return its fresh cancel flag.
    ///
    /// Returns `None` when a download is already active for that user. The
    /// earlier flag stays in place, so `/stop` keeps reaching the running
    /// download instead of an orphaned one.
    pub fn register(&self, user_id: u64) -> Option<CancelFlag> {
        match self.active.entry(user_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let flag = CancelFlag::new();
                slot.insert(flag.clone());
                Some(flag)
            }
        }
    }

    /// Set the cancel flag for `user_id` if a download is active.
    ///
    /// Returns whether an entry existed. Idempotent: a second call sets an
    /// already-set flag, which has no further effect.
    pub fn cancel(&self, user_id: u64) -> bool {
        match self.active.get(&user_id) {
            Some(flag) => {
                flag.cancel();
                true
            }
            None => false,
        }
    }

    /// Remove the entry for `user_id` unconditionally.
    ///
    /// Called on every exit path of a download: success, failure and
    /// cancellation.
    pub fn release(&self, user_id: u64) {
        self.active.remove(&user_id);
    }

    /// Whether a download is currently tracked for `user_id`.
    pub fn is_active(&self, user_id: u64) -> bool {
        self.active.contains_key(&user_id)
    }
}
