//! Index projection.
//!
//! The view exposes its items through three layers:
//!
//! 1. the *internal list*: source items that pass the filter, in sort order;
//! 2. the *page window*: a slice of the internal list (or of the grouped
//!    leaves) when paging is on;
//! 3. the *group tree* of the page, when grouping is on.
//!
//! The pending add item is never part of the internal list. It is shown at
//! the end of the current page (or at the root level of the group tree) until
//! it is committed or cancelled.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use lattice_grid_core::logging::{span_names, targets};
use lattice_grid_core::PerfSpan;

use super::currency::CurrencyHint;
use super::events::{EventQueue, ViewChange};
use super::state::{Transaction, ViewState};
use crate::accessor::DataItem;
use crate::error::Result;
use crate::group::GroupRoot;
use crate::sort::{find_insert_index, sort_items, MergedComparer};

fn rank_map<T>(items: &[Arc<T>]) -> HashMap<*const T, usize> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| (Arc::as_ptr(item), index))
        .collect()
}

impl<T: DataItem> ViewState<T> {
    pub(crate) fn is_grouping(&self) -> bool {
        !self.group_descriptions.is_empty()
    }

    pub(crate) fn pending_add(&self) -> Option<&Arc<T>> {
        self.transaction.adding_item()
    }

    pub(crate) fn passes_filter(&self, item: &T) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(item))
    }

    /// Filters and sorts a source snapshot into a new internal list.
    ///
    /// On a sort failure the filtered items come back in source order
    /// together with the error.
    pub(crate) fn prepare_local_array(&self, snapshot: Vec<Arc<T>>) -> (Vec<Arc<T>>, Result<()>) {
        let pending = self.pending_add();
        let mut items: Vec<Arc<T>> = snapshot
            .into_iter()
            .filter(|item| !pending.is_some_and(|p| Arc::ptr_eq(p, item)))
            .filter(|item| self.passes_filter(item))
            .collect();
        let sorted = if self.source_is_sorted {
            Ok(())
        } else {
            sort_items(&mut items, &self.sort, &self.culture)
        };
        (items, sorted)
    }

    /// Ends a transaction whose item has left the source.
    fn drop_orphaned_transaction(&mut self, snapshot: &[Arc<T>]) {
        let orphan = match &self.transaction {
            Transaction::Idle => return,
            Transaction::Adding { item, .. } | Transaction::Editing { item } => {
                !snapshot.iter().any(|x| Arc::ptr_eq(x, item))
            }
        };
        if orphan {
            tracing::debug!(target: targets::EDITING, "transaction item left the source, transaction dropped");
            self.transaction = Transaction::Idle;
        }
    }

    /// Rebuilds the internal list and the projection from the source.
    pub(crate) fn rebuild_from_source(&mut self) -> Result<()> {
        let _span = PerfSpan::new(span_names::REFRESH);
        let snapshot = self.source.snapshot();
        self.source_version = self.source.version();
        self.drop_orphaned_transaction(&snapshot);
        let source_len = snapshot.len();
        let (items, sorted) = self.prepare_local_array(snapshot);
        self.internal = items;
        self.clamp_page_index();
        self.rebuild_projection();
        tracing::debug!(
            target: targets::VIEW,
            source = source_len,
            visible = self.internal.len(),
            "rebuilt internal list"
        );
        sorted
    }

    /// Rebuilds from the source and announces a reset.
    pub(crate) fn refresh_view(&mut self, events: &mut EventQueue<T>) -> Result<()> {
        let old_position = self.current_position();
        let mark = events.mark();
        let outcome = self.rebuild_from_source();
        self.refresh.needs_refresh = false;
        events.change(ViewChange::Reset);
        self.sync_currency(CurrencyHint::Reset, old_position, mark, events);
        outcome
    }

    /// Refreshes now, or marks the view for a refresh when deferral ends.
    pub(crate) fn refresh_or_defer(&mut self, events: &mut EventQueue<T>) -> Result<()> {
        if self.refresh.is_deferred() {
            self.refresh.needs_refresh = true;
            return Ok(());
        }
        self.refresh_view(events)
    }

    /// Whether a polled source moved on since the last rebuild.
    pub(crate) fn source_changed_since_rebuild(&self) -> bool {
        self.source_version.is_some() && self.source.version() != self.source_version
    }

    pub(crate) fn page_count(&self) -> usize {
        if !self.paging.is_paging() {
            return 1;
        }
        self.internal.len().div_ceil(self.paging.page_size).max(1)
    }

    pub(crate) fn clamp_page_index(&mut self) {
        let last = self.page_count() - 1;
        if self.paging.page_index > last {
            self.paging.page_index = last;
        }
    }

    /// The slice of an ordered sequence of `len` items shown on the current
    /// page. A pending add item takes the last slot of the page.
    fn page_range(&self, len: usize) -> Range<usize> {
        if !self.paging.is_paging() {
            return 0..len;
        }
        let take = self.paging.page_size - usize::from(self.pending_add().is_some());
        let start = self.paging.start().min(len);
        start..(start + take).min(len)
    }

    /// Rebuilds the group trees from the internal list.
    pub(crate) fn rebuild_projection(&mut self) {
        if !self.is_grouping() {
            self.groups = None;
            self.temp_groups = None;
            return;
        }
        let mut root = GroupRoot::new(self.group_descriptions.clone(), self.culture.clone());
        root.build(&self.internal);
        if self.paging.is_paging() {
            self.temp_groups = Some(root);
            self.reslice_groups();
        } else {
            if let Some(item) = self.pending_add() {
                root.insert_special(item.clone());
            }
            self.groups = Some(root);
            self.temp_groups = None;
        }
    }

    /// Regroups the current page of the full group tree.
    pub(crate) fn reslice_groups(&mut self) {
        let Some(temp) = &self.temp_groups else {
            return;
        };
        let leaves = temp.leaves();
        let range = self.page_range(leaves.len());
        let mut root = GroupRoot::new(self.group_descriptions.clone(), self.culture.clone());
        root.build(&leaves[range]);
        if let Some(item) = self.pending_add() {
            root.insert_special(item.clone());
        }
        self.groups = Some(root);
    }

    /// Shows the pending add item in the group tree.
    pub(crate) fn show_pending(&mut self) {
        if self.temp_groups.is_some() {
            self.reslice_groups();
        } else if let (Some(root), Some(item)) = (self.groups.as_mut(), self.transaction.adding_item()) {
            root.insert_special(item.clone());
        }
    }

    /// Takes a former pending add item out of the group tree.
    pub(crate) fn hide_pending(&mut self, item: &Arc<T>) {
        if self.temp_groups.is_some() {
            self.reslice_groups();
        } else if let Some(root) = self.groups.as_mut() {
            root.remove_special(item);
        }
    }

    /// Snapshot of what the view shows, in display order.
    pub(crate) fn visible_items(&self) -> Vec<Arc<T>> {
        if let Some(root) = &self.groups {
            return root.leaves();
        }
        let mut items = self.internal[self.page_range(self.internal.len())].to_vec();
        if let Some(item) = self.pending_add() {
            items.push(item.clone());
        }
        items
    }

    pub(crate) fn count(&self) -> usize {
        if let Some(root) = &self.groups {
            return root.item_count();
        }
        self.page_range(self.internal.len()).len() + usize::from(self.pending_add().is_some())
    }

    pub(crate) fn item_at(&self, index: usize) -> Option<Arc<T>> {
        if let Some(root) = &self.groups {
            return root.leaf_at(index).cloned();
        }
        let range = self.page_range(self.internal.len());
        if index < range.len() {
            return Some(self.internal[range.start + index].clone());
        }
        if index == range.len() {
            return self.pending_add().cloned();
        }
        None
    }

    pub(crate) fn index_of(&self, item: &Arc<T>) -> Option<usize> {
        if let Some(root) = &self.groups {
            return root.leaf_index_of(item);
        }
        let range = self.page_range(self.internal.len());
        let page = &self.internal[range.clone()];
        if let Some(index) = page.iter().position(|x| Arc::ptr_eq(x, item)) {
            return Some(index);
        }
        self.pending_add()
            .filter(|pending| Arc::ptr_eq(pending, item))
            .map(|_| page.len())
    }

    /// Position of a page-relative index in the internal list.
    pub(crate) fn convert_to_internal_index(&self, index: usize) -> usize {
        if self.paging.is_paging() {
            index + self.paging.start()
        } else {
            index
        }
    }

    pub(crate) fn contains_internal(&self, item: &Arc<T>) -> bool {
        self.internal.iter().any(|x| Arc::ptr_eq(x, item))
    }

    /// Where an item goes when the view is unsorted: after every item that
    /// precedes it in the source.
    fn source_rank_position(&self, item: &Arc<T>) -> usize {
        let ranks = rank_map(&self.source.snapshot());
        let Some(&target) = ranks.get(&Arc::as_ptr(item)) else {
            return self.internal.len();
        };
        self.internal
            .partition_point(|probe| ranks.get(&Arc::as_ptr(probe)).is_some_and(|&rank| rank < target))
    }

    pub(crate) fn sorts_locally(&self) -> bool {
        !self.sort.is_empty() && !self.source_is_sorted
    }

    /// Inserts an item into the internal list and the group trees.
    pub(crate) fn insert_internal(&mut self, item: Arc<T>) {
        let index = if self.sorts_locally() {
            find_insert_index(&self.internal, &item, &self.sort, &self.culture)
        } else {
            self.source_rank_position(&item)
        };
        self.internal.insert(index, item.clone());
        self.add_to_groups(item);
    }

    fn add_to_groups(&mut self, item: Arc<T>) {
        if !self.is_grouping() {
            return;
        }
        let ranks = rank_map(&self.internal);
        let rank = |probe: &Arc<T>| ranks.get(&Arc::as_ptr(probe)).copied().unwrap_or(usize::MAX);
        if let Some(temp) = self.temp_groups.as_mut() {
            temp.add_to_subgroups(item, &rank);
            self.reslice_groups();
        } else if let Some(root) = self.groups.as_mut() {
            root.add_to_subgroups(item, &rank);
        }
    }

    fn remove_from_groups(&mut self, item: &Arc<T>) {
        if let Some(temp) = self.temp_groups.as_mut() {
            temp.remove_from_subgroups(item);
            self.reslice_groups();
        } else if let Some(root) = self.groups.as_mut() {
            root.remove_from_subgroups(item);
        }
    }

    /// Removes an item from the internal list and the group trees.
    pub(crate) fn remove_internal(&mut self, item: &Arc<T>) -> bool {
        let Some(index) = self.internal.iter().position(|x| Arc::ptr_eq(x, item)) else {
            return false;
        };
        self.internal.remove(index);
        self.remove_from_groups(item);
        true
    }

    /// Whether the item at `index` still sits between its neighbors.
    fn is_in_place(&self, index: usize) -> bool {
        if !self.sorts_locally() {
            return true;
        }
        let comparer = MergedComparer::new(&self.sort, &self.culture);
        let item = &self.internal[index];
        let after_previous = index == 0 || comparer.compare(&self.internal[index - 1], item).is_le();
        let before_next = self
            .internal
            .get(index + 1)
            .is_none_or(|next| comparer.compare(item, next).is_le());
        // An item that cannot be compared keeps its place.
        comparer.warn_on_failure("reposition") || (after_previous && before_next)
    }

    /// Re-evaluates filter membership and sort position of an item whose
    /// data changed. An item still in order keeps its place.
    pub(crate) fn reevaluate(&mut self, item: &Arc<T>) {
        let position = self.internal.iter().position(|x| Arc::ptr_eq(x, item));
        match (position, self.passes_filter(item)) {
            (None, false) => {}
            (None, true) => self.insert_internal(item.clone()),
            (Some(_), false) => {
                self.remove_internal(item);
            }
            (Some(index), true) if self.is_in_place(index) => {
                if self.is_grouping() {
                    self.remove_from_groups(item);
                    self.add_to_groups(item.clone());
                }
            }
            (Some(_), true) => {
                self.remove_internal(item);
                self.insert_internal(item.clone());
            }
        }
    }
}
