//! Error types for the collection view engine.
//!
//! Only caller contract violations surface as errors. Data problems found while
//! filtering or sorting (values that do not compare, bounds that do not
//! convert) are absorbed where they occur and degrade to "no match" or
//! "unsorted order".

use lattice_grid_core::GuardError;

/// Result type alias for collection view operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the collection view engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The operation conflicts with the current state of the view.
    #[error("'{operation}' is not allowed: {reason}")]
    InvalidOperation {
        operation: &'static str,
        reason: String,
    },

    /// The operation needs an up-to-date view but a refresh is deferred.
    #[error("'{operation}' cannot run while a refresh is deferred")]
    RefreshDeferred { operation: &'static str },

    /// A mutation was started from inside another mutation.
    #[error(transparent)]
    Reentrant(#[from] GuardError),

    /// The item being edited does not support cancelling its edit.
    #[error("the item being edited does not support cancelling an edit")]
    CancelNotSupported,

    /// New items cannot be added to this view.
    #[error("cannot add new items: {0}")]
    AddNotSupported(String),

    /// Items cannot be removed through this view.
    #[error("cannot remove items: {0}")]
    RemoveNotSupported(String),

    /// The item rejected the commit of its pending edit.
    #[error("commit rejected by item: {0}")]
    CommitRejected(String),

    /// An index outside the valid range was supplied.
    #[error("index {index} is out of range (valid range is {min}..={max})")]
    IndexOutOfRange { index: isize, min: isize, max: isize },

    /// The item is not part of the view.
    #[error("item is not part of the view")]
    ItemNotFound,

    /// A custom comparer failed while sorting; the view is left unsorted.
    #[error("sort failed on key {key}: {message}")]
    SortFailed { key: usize, message: String },

    /// No accessor could be resolved for a column in accessors-only mode.
    #[error("no value accessor for column '{column_id}'")]
    MissingAccessor { column_id: String },
}

impl Error {
    /// Create an invalid-operation error.
    pub fn invalid_operation(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            operation,
            reason: reason.into(),
        }
    }

    /// Create a deferred-refresh error.
    pub fn refresh_deferred(operation: &'static str) -> Self {
        Self::RefreshDeferred { operation }
    }

    /// Create an out-of-range error for a position in `min..=max`.
    pub fn index_out_of_range(index: isize, min: isize, max: isize) -> Self {
        Self::IndexOutOfRange { index, min, max }
    }

    /// Create a missing-accessor error.
    pub fn missing_accessor(column_id: impl Into<String>) -> Self {
        Self::MissingAccessor {
            column_id: column_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_operation() {
        let err = Error::invalid_operation("set_page_size", "the pending edit was rejected");
        assert_eq!(
            err.to_string(),
            "'set_page_size' is not allowed: the pending edit was rejected"
        );
        assert_eq!(
            Error::refresh_deferred("add_new").to_string(),
            "'add_new' cannot run while a refresh is deferred"
        );
    }

    #[test]
    fn guard_errors_convert() {
        let guard = lattice_grid_core::CallGuard::new("view");
        let _scope = guard.enter("refresh").unwrap();
        let err: Error = guard.enter("add_new").unwrap_err().into();
        assert!(matches!(err, Error::Reentrant(_)));
    }
}
