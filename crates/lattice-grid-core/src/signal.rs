//! Signal/slot notifications for the grid engine.
//!
//! Collection views, source collections and descriptor models all publish
//! their changes through [`Signal`]. A signal owns a set of connected slots
//! (closures) and invokes each of them, in connection order, every time it
//! is emitted.
//!
//! The engine runs on a single logical thread, so every slot is invoked
//! directly on the emitting thread. Slots are collected before invocation,
//! which means a slot may freely connect, disconnect or emit other signals
//! (including this one) without dead-locking.
//!
//! # Example
//!
//! Owners queue what they want to announce while their state is locked and
//! emit once the lock is gone, so slots can read the owner back:
//!
//! ```
//! use std::sync::Arc;
//! use lattice_grid_core::{CallGuard, Signal};
//! use parking_lot::Mutex;
//!
//! struct Counter {
//!     value: Mutex<i32>,
//!     guard: CallGuard,
//!     changed: Signal<i32>,
//! }
//!
//! impl Counter {
//!     fn bump(&self) {
//!         let queued = {
//!             let _scope = self.guard.enter("bump").unwrap();
//!             let mut value = self.value.lock();
//!             *value += 1;
//!             *value
//!         };
//!         self.changed.emit(queued);
//!     }
//! }
//!
//! let counter = Arc::new(Counter {
//!     value: Mutex::new(0),
//!     guard: CallGuard::new("counter"),
//!     changed: Signal::new(),
//! });
//! let reader = Arc::downgrade(&counter);
//! counter.changed.connect(move |&value| {
//!     let counter = reader.upgrade().unwrap();
//!     assert!(!counter.guard.is_busy());
//!     assert_eq!(*counter.value.lock(), value);
//! });
//! counter.bump();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};

use crate::logging::targets;

new_key_type! {
    /// Handle of one connected slot, kept by subscribers that disconnect on
    /// drop.
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A list of slots invoked with `&Args` on every emission.
pub struct Signal<Args> {
    /// All active connections, keyed by id. Slot map order is not connection
    /// order, so a sequence number is kept alongside each slot.
    connections: Mutex<SlotMap<ConnectionId, (u64, Slot<Args>)>>,
    next_sequence: Mutex<u64>,
    /// Whether signal emission is temporarily blocked.
    blocked: AtomicBool,
}

static_assertions::assert_impl_all!(Signal<()>: Send, Sync);

impl<Args: Clone + Send + 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: Clone + Send + 'static> Signal<Args> {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
            next_sequence: Mutex::new(0),
            blocked: AtomicBool::new(false),
        }
    }

    /// Adds a slot. A slot connected while the signal is emitting first runs
    /// on the next emission.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let sequence = {
            let mut next = self.next_sequence.lock();
            *next += 1;
            *next
        };
        self.connections.lock().insert((sequence, Arc::new(slot)))
    }

    /// Removes a slot. Returns `false` for an unknown or already removed id.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    pub fn disconnect_all(&self) {
        self.connections.lock().clear();
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Mutes the signal: emissions are dropped, not queued.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Invokes the slots connected at the time of the call, oldest first.
    #[tracing::instrument(skip_all, target = "lattice_grid_core::signal", level = "trace")]
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "signal blocked, skipping emit");
            return;
        }

        let mut slots: Vec<(u64, Slot<Args>)> = self
            .connections
            .lock()
            .values()
            .map(|(sequence, slot)| (*sequence, slot.clone()))
            .collect();
        slots.sort_by_key(|(sequence, _)| *sequence);
        tracing::trace!(target: targets::SIGNAL, connection_count = slots.len(), "emitting signal");

        for (_, slot) in slots {
            slot(&args);
        }
    }
}
