//! Error types for the core crate.

/// Errors raised by [`CallGuard`](crate::CallGuard).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    /// The region is already held by another operation.
    #[error("{guard}: cannot start '{requested}' while '{active}' is in progress")]
    Busy {
        guard: &'static str,
        active: &'static str,
        requested: &'static str,
    },
}
