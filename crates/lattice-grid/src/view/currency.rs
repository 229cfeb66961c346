//! The current-item cursor.

use std::sync::Arc;

use super::events::{CurrencyChange, EventQueue, ViewEvent};
use super::state::ViewState;
use super::CollectionView;
use crate::accessor::DataItem;
use crate::error::{Error, Result};
use lattice_grid_core::logging::targets;

/// Where the cursor stands.
pub(crate) enum Currency<T> {
    /// The view has no items.
    Empty,
    BeforeFirst,
    OnItem { position: usize, item: Arc<T> },
    AfterLast,
}

impl<T> Clone for Currency<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Empty => Self::Empty,
            Self::BeforeFirst => Self::BeforeFirst,
            Self::OnItem { position, item } => Self::OnItem {
                position: *position,
                item: item.clone(),
            },
            Self::AfterLast => Self::AfterLast,
        }
    }
}

impl<T> Currency<T> {
    pub(crate) fn item(&self) -> Option<&Arc<T>> {
        match self {
            Self::OnItem { item, .. } => Some(item),
            _ => None,
        }
    }

    fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty)
            | (Self::BeforeFirst, Self::BeforeFirst)
            | (Self::AfterLast, Self::AfterLast) => true,
            (
                Self::OnItem { position: a, item: x },
                Self::OnItem { position: b, item: y },
            ) => a == b && Arc::ptr_eq(x, y),
            _ => false,
        }
    }
}

/// How the cursor follows a change of the view's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CurrencyHint {
    /// Items were added, removed or moved one at a time: a lost current item
    /// is replaced by its neighbor.
    Incremental,
    /// The contents were rebuilt: a lost current item is replaced by the
    /// first item.
    Reset,
}

impl<T: DataItem> ViewState<T> {
    /// Current position, with `-1` before the first item and `count` after
    /// the last.
    pub(crate) fn current_position(&self) -> isize {
        match &self.currency {
            Currency::Empty | Currency::BeforeFirst => -1,
            Currency::OnItem { position, .. } => *position as isize,
            Currency::AfterLast => self.count() as isize,
        }
    }

    /// Cursor state for a position in `-1..=count`.
    pub(crate) fn currency_at(&self, position: isize) -> Currency<T> {
        let count = self.count();
        if count == 0 {
            return Currency::Empty;
        }
        if position < 0 {
            return Currency::BeforeFirst;
        }
        let position = position as usize;
        match self.item_at(position) {
            Some(item) => Currency::OnItem { position, item },
            None => Currency::AfterLast,
        }
    }

    /// Where the cursor lands after the contents changed.
    pub(crate) fn resolved_currency(&self, hint: CurrencyHint) -> Currency<T> {
        let count = self.count();
        if count == 0 {
            return Currency::Empty;
        }
        match &self.currency {
            Currency::Empty => match hint {
                CurrencyHint::Incremental => Currency::BeforeFirst,
                CurrencyHint::Reset => self.currency_at(0),
            },
            Currency::BeforeFirst => Currency::BeforeFirst,
            Currency::AfterLast => Currency::AfterLast,
            Currency::OnItem { position, item } => match self.index_of(item) {
                Some(position) => Currency::OnItem {
                    position,
                    item: item.clone(),
                },
                None => match hint {
                    CurrencyHint::Reset => self.currency_at(0),
                    CurrencyHint::Incremental => self.currency_at((*position).min(count - 1) as isize),
                },
            },
        }
    }

    /// Moves the cursor, announcing the move around the events queued since
    /// `mark`. Returns `true` if the cursor changed.
    pub(crate) fn set_currency(
        &mut self,
        new: Currency<T>,
        old_position: isize,
        mark: usize,
        events: &mut EventQueue<T>,
    ) -> bool {
        if self.currency.same_as(&new) {
            return false;
        }
        let old_item = self.currency.item().cloned();
        self.currency = new;
        let change = CurrencyChange {
            old_item,
            old_position,
            new_item: self.currency.item().cloned(),
            new_position: self.current_position(),
        };
        tracing::trace!(
            target: targets::CURRENCY,
            old = change.old_position,
            new = change.new_position,
            "current item changed"
        );
        events.insert(mark, ViewEvent::CurrentChanging(change.clone()));
        events.push(ViewEvent::CurrentChanged(change));
        true
    }

    /// Re-anchors the cursor after the contents changed.
    pub(crate) fn sync_currency(
        &mut self,
        hint: CurrencyHint,
        old_position: isize,
        mark: usize,
        events: &mut EventQueue<T>,
    ) {
        let new = self.resolved_currency(hint);
        self.set_currency(new, old_position, mark, events);
    }
}

impl<T: DataItem> CollectionView<T> {
    /// The item under the cursor.
    ///
    /// # Panics
    ///
    /// Panics when called from a callback the view is running.
    pub fn current_item(&self) -> Option<Arc<T>> {
        self.read(|state| state.currency.item().cloned())
    }

    /// Position of the cursor: `-1` before the first item, `count()` after
    /// the last.
    pub fn current_position(&self) -> isize {
        self.read(|state| state.current_position())
    }

    /// `true` when the cursor is before the first item or the view is empty.
    pub fn is_current_before_first(&self) -> bool {
        self.read(|state| matches!(state.currency, Currency::BeforeFirst | Currency::Empty))
    }

    /// `true` when the cursor is after the last item or the view is empty.
    pub fn is_current_after_last(&self) -> bool {
        self.read(|state| matches!(state.currency, Currency::AfterLast | Currency::Empty))
    }

    /// Moves the cursor to the first item.
    pub fn move_current_to_first(&self) -> Result<bool> {
        self.move_current("move_current_to_first", |_| 0)
    }

    /// Moves the cursor to the last item.
    pub fn move_current_to_last(&self) -> Result<bool> {
        self.move_current("move_current_to_last", |state| state.count() as isize - 1)
    }

    /// Moves the cursor one item forward, possibly past the last item.
    pub fn move_current_to_next(&self) -> Result<bool> {
        self.move_current("move_current_to_next", |state| {
            (state.current_position() + 1).min(state.count() as isize)
        })
    }

    /// Moves the cursor one item back, possibly before the first item.
    pub fn move_current_to_previous(&self) -> Result<bool> {
        self.move_current("move_current_to_previous", |state| {
            (state.current_position() - 1).max(-1)
        })
    }

    /// Moves the cursor to `position` in `-1..=count()`.
    pub fn move_current_to_position(&self, position: isize) -> Result<bool> {
        self.move_current_checked("move_current_to_position", move |state| {
            let count = state.count() as isize;
            if !(-1..=count).contains(&position) {
                return Err(Error::index_out_of_range(position, -1, count));
            }
            Ok(position)
        })
    }

    /// Moves the cursor to `item`, or before the first item for `None`.
    /// An item not in the view leaves the cursor unchanged.
    pub fn move_current_to(&self, item: Option<&Arc<T>>) -> Result<bool> {
        let item = item.cloned();
        self.move_current_checked("move_current_to", move |state| match &item {
            None => Ok(-1),
            Some(item) => Ok(state
                .index_of(item)
                .map_or(state.current_position(), |position| position as isize)),
        })
    }

    fn move_current<F>(&self, operation: &'static str, target: F) -> Result<bool>
    where
        F: FnOnce(&ViewState<T>) -> isize,
    {
        self.move_current_checked(operation, |state| Ok(target(state)))
    }

    /// Runs a cursor move. Returns `Ok(false)` without moving while currency
    /// handlers are running, and `Ok(true)` if the cursor ends on an item.
    fn move_current_checked<F>(&self, operation: &'static str, target: F) -> Result<bool>
    where
        F: FnOnce(&ViewState<T>) -> Result<isize>,
    {
        if self.currency_monitor.is_busy() {
            tracing::debug!(target: targets::CURRENCY, operation, "currency move refused inside a currency handler");
            return Ok(false);
        }
        self.mutate(operation, |state, events| {
            let position = target(state)?;
            let old_position = state.current_position();
            let new = state.currency_at(position);
            let mark = events.mark();
            state.set_currency(new, old_position, mark, events);
            Ok(state.currency.item().is_some())
        })
    }
}
