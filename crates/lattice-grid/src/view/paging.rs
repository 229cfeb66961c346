//! Paging window.

use lattice_grid_core::logging::targets;

use super::events::{EventQueue, PageChange, ViewChange, ViewEvent};
use super::state::ViewState;
use super::CollectionView;
use crate::accessor::DataItem;
use crate::error::Result;

impl<T: DataItem> ViewState<T> {
    /// Shows another page: `page_changing`, a reset, the cursor on the first
    /// item, then `page_changed`.
    pub(crate) fn move_to_page_inner(&mut self, index: usize, events: &mut EventQueue<T>) {
        let change = PageChange {
            old_index: self.paging.page_index,
            new_index: index,
        };
        events.push(ViewEvent::PageChanging(change));
        let old_position = self.current_position();
        let mark = events.mark();
        self.paging.page_index = index;
        self.reslice_groups();
        events.change(ViewChange::Reset);
        let first = self.currency_at(0);
        self.set_currency(first, old_position, mark, events);
        events.push(ViewEvent::PageChanged(change));
        tracing::debug!(target: targets::PAGING, from = change.old_index, to = index, "page changed");
    }

    /// Applies page requests queued during a deferred refresh. Returns the
    /// page index before them.
    pub(crate) fn apply_queued_paging(&mut self) -> Option<usize> {
        if self.paging.queued_size.is_none() && self.paging.queued_index.is_none() {
            return None;
        }
        let old_index = self.paging.page_index;
        if let Some(size) = self.paging.queued_size.take() {
            self.paging.page_size = size;
            self.paging.page_index = 0;
        }
        if let Some(index) = self.paging.queued_index.take() {
            self.paging.page_index = index;
        }
        Some(old_index)
    }
}

impl<T: DataItem> CollectionView<T> {
    /// Items per page; `0` turns paging off.
    pub fn page_size(&self) -> usize {
        self.read(|state| state.paging.page_size)
    }

    /// Index of the current page.
    pub fn page_index(&self) -> usize {
        self.read(|state| state.paging.page_index)
    }

    /// Number of pages; `1` when paging is off or the view is empty.
    pub fn page_count(&self) -> usize {
        self.read(|state| state.page_count())
    }

    pub fn can_change_page(&self) -> bool {
        self.read(|state| state.paging.is_paging())
    }

    /// Sets the page size and returns to the first page. `0` turns paging
    /// off.
    pub fn set_page_size(&self, page_size: usize) -> Result<()> {
        self.mutate("set_page_size", |state, events| {
            if state.refresh.is_deferred() {
                state.paging.queued_size = Some(page_size);
                return Ok(());
            }
            state.commit_pending("set_page_size", events)?;
            if state.paging.page_size == page_size {
                return Ok(());
            }
            let old_index = state.paging.page_index;
            state.paging.page_size = page_size;
            state.paging.page_index = 0;
            let mark = events.mark();
            let outcome = state.refresh_view(events);
            if old_index != 0 {
                let change = PageChange {
                    old_index,
                    new_index: 0,
                };
                events.insert(mark, ViewEvent::PageChanging(change));
                events.push(ViewEvent::PageChanged(change));
            }
            tracing::debug!(target: targets::PAGING, page_size, "page size changed");
            outcome
        })
    }

    /// Moves to page `index`.
    ///
    /// Returns `Ok(false)` when the page does not exist. While refresh is
    /// deferred the move is queued and `Ok(true)` is returned.
    pub fn move_to_page(&self, index: usize) -> Result<bool> {
        self.mutate("move_to_page", |state, events| {
            if state.refresh.is_deferred() {
                state.paging.queued_index = Some(index);
                return Ok(true);
            }
            if index >= state.page_count() {
                return Ok(false);
            }
            state.commit_pending("move_to_page", events)?;
            if index >= state.page_count() {
                return Ok(false);
            }
            if index != state.paging.page_index {
                state.move_to_page_inner(index, events);
            }
            Ok(true)
        })
    }

    pub fn move_to_first_page(&self) -> Result<bool> {
        self.move_to_page(0)
    }

    pub fn move_to_last_page(&self) -> Result<bool> {
        let last = self.page_count().saturating_sub(1);
        self.move_to_page(last)
    }

    pub fn move_to_next_page(&self) -> Result<bool> {
        let next = self.page_index() + 1;
        self.move_to_page(next)
    }

    pub fn move_to_previous_page(&self) -> Result<bool> {
        match self.page_index().checked_sub(1) {
            Some(previous) => self.move_to_page(previous),
            None => Ok(false),
        }
    }
}
