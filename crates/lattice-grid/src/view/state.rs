//! Mutable state behind a collection view.
//!
//! One struct per concern instead of a flag word: paging, the pending
//! transaction, refresh deferral and currency each carry only the data that
//! is meaningful for them.

use std::sync::Arc;

use lattice_grid_core::SuppressFlag;

use super::currency::Currency;
use super::events::EventQueue;
use crate::accessor::DataItem;
use crate::culture::Culture;
use crate::error::{Error, Result};
use crate::group::{GroupDescription, GroupRoot};
use crate::options::{ItemFactory, ViewOptions};
use crate::sort::SortDescription;
use crate::source::CollectionSource;

/// A filter predicate: `true` keeps the item.
pub type FilterFn<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Paging window.
#[derive(Debug, Clone, Default)]
pub(crate) struct PagingState {
    pub(crate) page_size: usize,
    pub(crate) page_index: usize,
    /// Page size requested while refresh was deferred.
    pub(crate) queued_size: Option<usize>,
    /// Page index requested while refresh was deferred.
    pub(crate) queued_index: Option<usize>,
}

impl PagingState {
    pub(crate) fn is_paging(&self) -> bool {
        self.page_size > 0
    }

    /// Offset of the current page in the ordered item sequence.
    pub(crate) fn start(&self) -> usize {
        self.page_size * self.page_index
    }
}

/// The single pending add or edit.
pub(crate) enum Transaction<T> {
    Idle,
    Adding {
        item: Arc<T>,
        /// Currency to restore if the add is cancelled.
        previous: Currency<T>,
    },
    Editing {
        item: Arc<T>,
    },
}

impl<T> Transaction<T> {
    pub(crate) fn is_idle(&self) -> bool {
        matches!(self, Transaction::Idle)
    }

    pub(crate) fn adding_item(&self) -> Option<&Arc<T>> {
        match self {
            Transaction::Adding { item, .. } => Some(item),
            _ => None,
        }
    }

    pub(crate) fn editing_item(&self) -> Option<&Arc<T>> {
        match self {
            Transaction::Editing { item } => Some(item),
            _ => None,
        }
    }
}

/// Refresh deferral.
#[derive(Debug, Clone, Default)]
pub(crate) struct RefreshState {
    pub(crate) defer_level: usize,
    pub(crate) needs_refresh: bool,
}

impl RefreshState {
    pub(crate) fn is_deferred(&self) -> bool {
        self.defer_level > 0
    }
}

pub(crate) struct ViewState<T> {
    pub(crate) source: CollectionSource<T>,
    /// Raised while the view writes to its own source.
    pub(crate) source_writes: Arc<SuppressFlag>,
    /// Version of a polled source at the last rebuild.
    pub(crate) source_version: Option<u64>,
    /// Filtered and sorted items, before paging and grouping. Never holds
    /// the pending add item.
    pub(crate) internal: Vec<Arc<T>>,
    pub(crate) filter: Option<FilterFn<T>>,
    pub(crate) sort: Vec<SortDescription<T>>,
    pub(crate) group_descriptions: Vec<GroupDescription<T>>,
    /// Groups of the visible page.
    pub(crate) groups: Option<GroupRoot<T>>,
    /// Groups of the whole item set; only used while paging.
    pub(crate) temp_groups: Option<GroupRoot<T>>,
    pub(crate) currency: Currency<T>,
    pub(crate) paging: PagingState,
    pub(crate) transaction: Transaction<T>,
    pub(crate) refresh: RefreshState,
    pub(crate) culture: Culture,
    pub(crate) source_is_sorted: bool,
    pub(crate) item_factory: Option<ItemFactory<T>>,
}

impl<T: DataItem> ViewState<T> {
    pub(crate) fn new(
        source: CollectionSource<T>,
        source_writes: Arc<SuppressFlag>,
        options: ViewOptions<T>,
    ) -> Self {
        Self {
            source,
            source_writes,
            source_version: None,
            internal: Vec::new(),
            filter: None,
            sort: Vec::new(),
            group_descriptions: Vec::new(),
            groups: None,
            temp_groups: None,
            currency: Currency::Empty,
            paging: PagingState {
                page_size: options.page_size,
                ..PagingState::default()
            },
            transaction: Transaction::Idle,
            refresh: RefreshState::default(),
            culture: options.culture,
            source_is_sorted: options.source_is_sorted,
            item_factory: options.item_factory,
        }
    }

    pub(crate) fn ensure_not_deferred(&self, operation: &'static str) -> Result<()> {
        if self.refresh.is_deferred() {
            return Err(Error::refresh_deferred(operation));
        }
        Ok(())
    }

    /// Commits a pending add or edit before an operation that restructures
    /// the view.
    pub(crate) fn commit_pending(&mut self, operation: &'static str, events: &mut EventQueue<T>) -> Result<()> {
        let outcome = match &self.transaction {
            Transaction::Idle => return Ok(()),
            Transaction::Adding { .. } => self.commit_new_inner(events),
            Transaction::Editing { .. } => self.commit_edit_inner(events),
        };
        outcome.map_err(|err| match err {
            Error::CommitRejected(reason) => Error::invalid_operation(
                operation,
                format!("the pending transaction could not be committed: {reason}"),
            ),
            other => other,
        })
    }
}
