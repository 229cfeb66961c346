//! Scope guards for single-threaded re-entrancy control.
//!
//! - [`CallGuard`] marks a non-reentrant region. Entering it while it is
//!   already held fails instead of recursing, and the region is released when
//!   the returned [`CallScope`] drops.
//! - [`SuppressFlag`] is a nesting counter used to silence feedback paths
//!   (for example "ignore source notifications while I am writing to the
//!   source"). It is raised for the lifetime of a [`SuppressScope`].
//!
//! Both replace the try/finally flag toggling that single-threaded UI code
//! tends to accumulate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::ThreadId;

use parking_lot::Mutex;

use crate::error::GuardError;
use crate::logging::targets;

#[derive(Debug, Clone, Copy)]
struct Holder {
    operation: &'static str,
    thread: ThreadId,
}

/// A non-reentrant region guard.
///
/// # Example
///
/// ```
/// use lattice_grid_core::CallGuard;
///
/// let guard = CallGuard::new("view");
/// let scope = guard.enter("refresh").unwrap();
/// assert!(guard.enter("add_new").is_err());
/// drop(scope);
/// assert!(guard.enter("add_new").is_ok());
/// ```
#[derive(Debug)]
pub struct CallGuard {
    name: &'static str,
    holder: Mutex<Option<Holder>>,
}

impl CallGuard {
    /// Creates an idle guard. `name` identifies the guarded object in errors
    /// and log output.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            holder: Mutex::new(None),
        }
    }

    /// Enters the guarded region for `operation`.
    pub fn enter(&self, operation: &'static str) -> Result<CallScope<'_>, GuardError> {
        let mut holder = self.holder.lock();
        if let Some(active) = *holder {
            tracing::debug!(
                target: targets::GUARD,
                guard = self.name,
                active = active.operation,
                requested = operation,
                "re-entrant call refused"
            );
            return Err(GuardError::Busy {
                guard: self.name,
                active: active.operation,
                requested: operation,
            });
        }
        *holder = Some(Holder {
            operation,
            thread: std::thread::current().id(),
        });
        Ok(CallScope { guard: self })
    }

    /// Returns `true` while some scope holds the region.
    pub fn is_busy(&self) -> bool {
        self.holder.lock().is_some()
    }

    /// Returns the operation holding the region if it was entered on the
    /// calling thread.
    pub fn held_by_current_thread(&self) -> Option<&'static str> {
        let current = std::thread::current().id();
        let holder = *self.holder.lock();
        holder
            .filter(|holder| holder.thread == current)
            .map(|holder| holder.operation)
    }

    fn release(&self) {
        *self.holder.lock() = None;
    }
}

/// RAII scope returned by [`CallGuard::enter`]; releases the region on drop.
#[must_use = "the guarded region is released as soon as the scope is dropped"]
#[derive(Debug)]
pub struct CallScope<'a> {
    guard: &'a CallGuard,
}

impl Drop for CallScope<'_> {
    fn drop(&mut self) {
        self.guard.release();
    }
}

/// A nesting suppression counter.
#[derive(Debug, Default)]
pub struct SuppressFlag {
    depth: AtomicUsize,
}

impl SuppressFlag {
    /// Creates a lowered flag.
    pub const fn new() -> Self {
        Self {
            depth: AtomicUsize::new(0),
        }
    }

    /// Raises the flag until the returned scope drops. Scopes nest.
    pub fn suppress(&self) -> SuppressScope<'_> {
        self.depth.fetch_add(1, Ordering::SeqCst);
        SuppressScope { flag: self }
    }

    /// Returns `true` while at least one scope is alive.
    pub fn is_raised(&self) -> bool {
        self.depth.load(Ordering::SeqCst) > 0
    }
}

/// RAII scope returned by [`SuppressFlag::suppress`].
#[must_use = "suppression ends as soon as the scope is dropped"]
#[derive(Debug)]
pub struct SuppressScope<'a> {
    flag: &'a SuppressFlag,
}

impl Drop for SuppressScope<'_> {
    fn drop(&mut self) {
        self.flag.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_guard_refuses_nested_entry() {
        let guard = CallGuard::new("test");
        let scope = guard.enter("outer").unwrap();
        assert!(guard.is_busy());
        assert_eq!(guard.held_by_current_thread(), Some("outer"));

        match guard.enter("inner") {
            Err(GuardError::Busy { active, requested, .. }) => {
                assert_eq!(active, "outer");
                assert_eq!(requested, "inner");
            }
            Ok(_) => panic!("nested entry should fail"),
        }

        drop(scope);
        assert!(!guard.is_busy());
        assert_eq!(guard.held_by_current_thread(), None);
    }

    #[test]
    fn call_guard_released_on_unwind() {
        let guard = CallGuard::new("test");
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = guard.enter("panicking").unwrap();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(!guard.is_busy());
    }

    #[test]
    fn suppress_flag_nests() {
        let flag = SuppressFlag::new();
        assert!(!flag.is_raised());
        {
            let _outer = flag.suppress();
            {
                let _inner = flag.suppress();
                assert!(flag.is_raised());
            }
            assert!(flag.is_raised());
        }
        assert!(!flag.is_raised());
    }
}
