//! Command sequencing and result callbacks.
//!
//! The registry owns the 64-bit sequence counter and the map of pending
//! result callbacks. The counter starts at 1 and only ever increases for
//! the lifetime of the session, including across redials, so a reply
//! from an earlier connection can never be confused with a newer
//! command's.
//!
//! Mutation discipline is single-writer: the synchronized send path
//! inserts, only the read loop removes.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::identifiers::SequenceId;
use crate::protocol::ResultMessage;

// ============================================================================
// Types
// ============================================================================

/// Callback invoked with the result of a numbered command.
pub type ResultCallback = Box<dyn FnOnce(ResultMessage) + Send>;

/// Map of sequence ids to one-shot result callbacks.
type CallbackMap = FxHashMap<SequenceId, ResultCallback>;

// ============================================================================
// CommandRegistry
// ============================================================================

pub(crate) struct CommandRegistry {
    sequence: AtomicI64,
    callbacks: Mutex<CallbackMap>,
}

impl CommandRegistry {
    pub(crate) fn new() -> Self {
        Self {
            sequence: AtomicI64::new(1),
            callbacks: Mutex::new(CallbackMap::default()),
        }
    }

    /// Assigns the next sequence id.
    pub(crate) fn next_id(&self) -> SequenceId {
        SequenceId::new(self.sequence.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a callback under an id.
    ///
    /// Must happen before the frame is enqueued so a fast reply cannot
    /// race the registration.
    pub(crate) fn register(&self, id: SequenceId, callback: ResultCallback) {
        self.callbacks.lock().insert(id, callback);
    }

    /// Removes and returns the callback for an id, if one is registered.
    ///
    /// Removal and invocation belong together: taking the entry is what
    /// makes the at-most-once guarantee hold.
    pub(crate) fn take(&self, id: SequenceId) -> Option<ResultCallback> {
        self.callbacks.lock().remove(&id)
    }

    /// Number of callbacks still awaiting results.
    pub(crate) fn pending(&self) -> usize {
        self.callbacks.lock().len()
    }
}

// ============================================================================
// Tests
// ============================================================================
