//! Propagation of source changes into the view.
//!
//! A delta patches the internal list, then the group trees, then the cursor.
//! Notifications are derived from the visible items before and after the
//! patch, so paged and grouped views report exactly what their consumers
//! saw change.

use std::sync::Arc;

use lattice_grid_core::logging::targets;

use super::currency::{Currency, CurrencyHint};
use super::events::{diff_transition, EventQueue, ViewChange};
use super::state::{Transaction, ViewState};
use crate::accessor::DataItem;
use crate::error::Result;
use crate::source::SourceDelta;

/// Where the cursor goes after a visible change.
pub(crate) enum Settle<T> {
    /// Follow the current item.
    Follow(CurrencyHint),
    /// Land on this item.
    OnItem(Arc<T>),
    /// Return to an earlier cursor, re-anchored to the current contents.
    Restore(Currency<T>),
}

impl<T: DataItem> ViewState<T> {
    /// Runs `patch` and queues the changes it made to the visible items,
    /// followed by the resulting cursor move.
    pub(crate) fn apply_visible_change<R>(
        &mut self,
        events: &mut EventQueue<T>,
        allow_replace: bool,
        settle: Settle<T>,
        patch: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let before = self.visible_items();
        let old_position = self.current_position();
        let mark = events.mark();

        let result = patch(self);

        let after = self.visible_items();
        diff_transition(&before, &after, allow_replace, events);
        let target = match settle {
            Settle::Follow(hint) => self.resolved_currency(hint),
            Settle::OnItem(item) => match self.index_of(&item) {
                Some(position) => Currency::OnItem { position, item },
                None => self.resolved_currency(CurrencyHint::Incremental),
            },
            Settle::Restore(previous) => {
                let current = std::mem::replace(&mut self.currency, previous);
                let target = self.resolved_currency(CurrencyHint::Incremental);
                self.currency = current;
                target
            }
        };
        self.set_currency(target, old_position, mark, events);
        result
    }

    /// Applies one source delta.
    pub(crate) fn apply_source_delta(&mut self, delta: SourceDelta<T>, events: &mut EventQueue<T>) -> Result<()> {
        tracing::trace!(target: targets::VIEW, ?delta, "source changed");
        match delta {
            SourceDelta::Reset => self.refresh_view(events),
            SourceDelta::Moved { item, .. } if self.moves_directly() => {
                self.move_item(&item, events);
                Ok(())
            }
            delta => {
                let allow_replace = matches!(delta, SourceDelta::Replaced { .. });
                self.apply_visible_change(
                    events,
                    allow_replace,
                    Settle::Follow(CurrencyHint::Incremental),
                    |state| state.patch_internal(delta),
                );
                Ok(())
            }
        }
    }

    /// Whether a source move can be reported as a single `Move`.
    fn moves_directly(&self) -> bool {
        !self.is_grouping() && !self.paging.is_paging() && (self.sort.is_empty() || self.source_is_sorted)
    }

    fn move_item(&mut self, item: &Arc<T>, events: &mut EventQueue<T>) {
        let Some(old_index) = self.internal.iter().position(|x| Arc::ptr_eq(x, item)) else {
            return;
        };
        let old_position = self.current_position();
        let mark = events.mark();
        self.remove_internal(item);
        self.insert_internal(item.clone());
        let Some(new_index) = self.internal.iter().position(|x| Arc::ptr_eq(x, item)) else {
            return;
        };
        if new_index == old_index {
            return;
        }
        events.change(ViewChange::Move {
            item: item.clone(),
            new_index,
            old_index,
        });
        self.sync_currency(CurrencyHint::Incremental, old_position, mark, events);
    }

    fn is_transaction_item(&self, item: &Arc<T>) -> bool {
        match &self.transaction {
            Transaction::Idle => false,
            Transaction::Adding { item: pending, .. } | Transaction::Editing { item: pending } => {
                Arc::ptr_eq(pending, item)
            }
        }
    }

    fn source_added(&mut self, item: Arc<T>) {
        if self.is_transaction_item(&item) || self.contains_internal(&item) {
            return;
        }
        if self.passes_filter(&item) {
            self.insert_internal(item);
        }
    }

    fn source_removed(&mut self, item: &Arc<T>) {
        if self.is_transaction_item(item) {
            tracing::debug!(target: targets::EDITING, "transaction item removed from the source");
            let pending = self.transaction.adding_item().cloned();
            self.transaction = Transaction::Idle;
            if let Some(pending) = pending {
                self.hide_pending(&pending);
            }
        }
        self.remove_internal(item);
    }

    fn patch_internal(&mut self, delta: SourceDelta<T>) {
        match delta {
            SourceDelta::Added { items, .. } => {
                for item in items {
                    self.source_added(item);
                }
            }
            SourceDelta::Removed { items, .. } => {
                for item in &items {
                    self.source_removed(item);
                }
            }
            SourceDelta::Replaced { old, new, .. } => {
                self.source_removed(&old);
                self.source_added(new);
            }
            SourceDelta::Moved { item, .. } => {
                if self.contains_internal(&item) && !self.sorts_locally() {
                    self.remove_internal(&item);
                    self.insert_internal(item);
                }
            }
            SourceDelta::ItemChanged { item, .. } => {
                if !self.is_transaction_item(&item) {
                    self.reevaluate(&item);
                }
            }
            SourceDelta::Reset => {}
        }
    }
}
