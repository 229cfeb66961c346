//! Logging facilities for the grid engine.
//!
//! Lattice Grid uses the `tracing` crate for instrumentation. To see logs,
//! install a tracing subscriber in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt::init();
//!     // Your application code...
//! }
//! ```
//!
//! Every subsystem logs under one of the [`targets`] so that directives such
//! as `RUST_LOG=lattice_grid::currency=trace` isolate it.

/// Span names used throughout the engine for tracing.
pub mod span_names {
    /// Full refresh of a collection view.
    pub const REFRESH: &str = "lattice_grid::refresh";
    /// Sorting of the internal list.
    pub const SORT: &str = "lattice_grid::sort";
    /// Group root rebuild.
    pub const GROUP: &str = "lattice_grid::group";
}

/// Target names for log filtering.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "lattice_grid_core";
    /// Signal emission.
    pub const SIGNAL: &str = "lattice_grid_core::signal";
    /// Re-entrancy guards.
    pub const GUARD: &str = "lattice_grid_core::guard";
    /// Collection view structure (refresh, projection, change propagation).
    pub const VIEW: &str = "lattice_grid::view";
    /// Currency tracking.
    pub const CURRENCY: &str = "lattice_grid::currency";
    /// Add/edit transactions.
    pub const EDITING: &str = "lattice_grid::editing";
    /// Paging window.
    pub const PAGING: &str = "lattice_grid::paging";
    /// Grouping engine.
    pub const GROUPING: &str = "lattice_grid::grouping";
    /// Sorting/filtering adapters.
    pub const ADAPTER: &str = "lattice_grid::adapter";
    /// Culture and collation.
    pub const CULTURE: &str = "lattice_grid::culture";
}

/// A guard that keeps a tracing span entered until dropped.
///
/// This is useful for tracking the duration of operations.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    ///
    /// The span will be active until the guard is dropped.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "lattice_grid::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }

    /// Create a performance span carrying an item count.
    pub fn with_items(name: &'static str, items: usize) -> Self {
        let span =
            tracing::info_span!(target: "lattice_grid::perf", "perf", operation = name, items);
        Self {
            span: span.entered(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perf_span_drops_cleanly() {
        let _span = PerfSpan::new("test_operation");
        let _nested = PerfSpan::with_items(span_names::SORT, 10);
    }

    #[test]
    fn targets_share_prefix() {
        for target in [
            targets::VIEW,
            targets::CURRENCY,
            targets::EDITING,
            targets::PAGING,
            targets::GROUPING,
            targets::ADAPTER,
            targets::CULTURE,
        ] {
            assert!(target.starts_with("lattice_grid::"));
        }
        assert!(targets::SIGNAL.starts_with(targets::CORE));
    }
}
