//! Collection views.
//!
//! A [`CollectionView`] sits on a source collection and exposes a filtered,
//! sorted, grouped and paged projection of it, with a current-item cursor
//! and add/edit transactions. Source changes are patched in incrementally and
//! announced through the view's [`ViewSignals`].
//!
//! # Re-entrancy
//!
//! Every mutating operation runs inside a [`CallGuard`] scope. Notifications
//! are delivered after the operation has finished and released the view, so
//! handlers may freely read and mutate the view. Callbacks that run *during*
//! an operation (filter predicates, comparers, group selectors, item edit
//! hooks) must not call back into the view: mutations from there fail with
//! [`Error::Reentrant`](crate::Error::Reentrant) and reads panic.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use lattice_grid::{CollectionView, DataItem, ObservableList, SortDescription, SortDirection, Value};
//!
//! struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! impl DataItem for Person {
//!     fn property(&self, name: &str) -> Option<Value> {
//!         match name {
//!             "name" => Some(self.name.as_str().into()),
//!             "age" => Some(self.age.into()),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! let people = Arc::new(ObservableList::new(vec![
//!     Person { name: "Bo".into(), age: 41 },
//!     Person { name: "Al".into(), age: 17 },
//! ]));
//! let view = CollectionView::new(people.clone());
//! view.set_filter_fn(|p: &Person| p.age >= 18).unwrap();
//! view.set_sort_descriptions(vec![SortDescription::by_path("name", SortDirection::Ascending)])
//!     .unwrap();
//!
//! people.push(Person { name: "Cy".into(), age: 30 });
//! let names: Vec<String> = view.items().iter().map(|p| p.name.clone()).collect();
//! assert_eq!(names, vec!["Bo", "Cy"]);
//! ```

mod changes;
mod currency;
mod editing;
mod events;
mod paging;
mod projection;
mod state;

pub use events::{CurrencyChange, PageChange, ViewChange};
pub use state::FilterFn;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use lattice_grid_core::logging::targets;
use lattice_grid_core::{CallGuard, Signal, SuppressFlag};

use crate::accessor::DataItem;
use crate::culture::Culture;
use crate::error::{Error, Result};
use crate::group::{CollectionGroup, GroupDescription};
use crate::options::ViewOptions;
use crate::sort::SortDescription;
use crate::source::{CollectionSource, SourceDelta, SourceSubscription};
use events::{EventQueue, ViewEvent};
use state::ViewState;

/// Signals emitted by a [`CollectionView`].
///
/// All signals fire after the operation that caused them has completed.
pub struct ViewSignals<T> {
    /// The visible items changed.
    pub collection_changed: Signal<ViewChange<T>>,
    /// The cursor is about to be reported as moved. Informational; handlers
    /// cannot veto the move.
    pub current_changing: Signal<CurrencyChange<T>>,
    /// The cursor moved.
    pub current_changed: Signal<CurrencyChange<T>>,
    pub page_changing: Signal<PageChange>,
    pub page_changed: Signal<PageChange>,
    pub sort_descriptions_changed: Signal<()>,
    pub filter_changed: Signal<()>,
    pub group_descriptions_changed: Signal<()>,
    /// A full refresh completed.
    pub refreshed: Signal<()>,
    /// A refresh that no caller waits on (end of a deferral, resync after a
    /// missed source change) could not sort. Carries [`Error::SortFailed`].
    pub sort_failed: Signal<Error>,
}

impl<T: DataItem> ViewSignals<T> {
    fn new() -> Self {
        Self {
            collection_changed: Signal::new(),
            current_changing: Signal::new(),
            current_changed: Signal::new(),
            page_changing: Signal::new(),
            page_changed: Signal::new(),
            sort_descriptions_changed: Signal::new(),
            filter_changed: Signal::new(),
            group_descriptions_changed: Signal::new(),
            refreshed: Signal::new(),
            sort_failed: Signal::new(),
        }
    }
}

/// A filtered, sorted, grouped and paged view over a source collection.
///
/// # Panics
///
/// Every getter (`count`, `items`, `current_item`, `page_index`, ...) panics
/// when called from a filter predicate, comparer, group selector, accessor
/// or edit hook while the view is running that callback. Such callbacks see
/// the item they are given, never the view.
pub struct CollectionView<T: DataItem> {
    source: CollectionSource<T>,
    state: Mutex<ViewState<T>>,
    guard: CallGuard,
    /// Held while currency notifications are delivered.
    currency_monitor: CallGuard,
    source_writes: Arc<SuppressFlag>,
    /// A source change arrived while an operation was running.
    stale: AtomicBool,
    /// Deferral scopes dropped but not yet released.
    pending_undefer: AtomicUsize,
    signals: ViewSignals<T>,
    _subscription: SourceSubscription<T>,
}

impl<T: DataItem> CollectionView<T> {
    /// Creates a view with default options.
    pub fn new(source: impl Into<CollectionSource<T>>) -> Arc<Self> {
        Self::with_options(source, ViewOptions::default())
    }

    /// Creates a view. The view starts with its cursor on the first item.
    pub fn with_options(source: impl Into<CollectionSource<T>>, options: ViewOptions<T>) -> Arc<Self> {
        let source = source.into();
        let source_writes = Arc::new(SuppressFlag::new());
        let mut state = ViewState::new(source.clone(), source_writes.clone(), options);
        if let Err(err) = state.rebuild_from_source() {
            tracing::warn!(target: targets::VIEW, error = %err, "initial build left the view unsorted");
        }
        state.currency = state.currency_at(0);

        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let subscription = source.subscribe(move |delta| {
                if let Some(view) = weak.upgrade() {
                    view.on_source_delta(delta);
                }
            });
            Self {
                source,
                state: Mutex::new(state),
                guard: CallGuard::new("collection_view"),
                currency_monitor: CallGuard::new("currency"),
                source_writes,
                stale: AtomicBool::new(false),
                pending_undefer: AtomicUsize::new(0),
                signals: ViewSignals::new(),
                _subscription: subscription,
            }
        })
    }

    pub fn signals(&self) -> &ViewSignals<T> {
        &self.signals
    }

    /// The source collection.
    pub fn source(&self) -> &CollectionSource<T> {
        &self.source
    }

    /// Runs a mutating operation and delivers its notifications.
    ///
    /// Notifications queued before a failure are delivered too.
    pub(crate) fn mutate<R>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut ViewState<T>, &mut EventQueue<T>) -> Result<R>,
    ) -> Result<R> {
        let scope = self.guard.enter(operation)?;
        let mut events = EventQueue::new();
        let result = {
            let mut state = self.state.lock();
            self.catch_up(&mut *state, &mut events);
            f(&mut *state, &mut events)
        };
        drop(scope);
        self.flush(events);
        result
    }

    /// Brings the state up to date with changes missed while busy and with
    /// deferral scopes that have ended.
    fn catch_up(&self, state: &mut ViewState<T>, events: &mut EventQueue<T>) {
        if self.stale.swap(false, Ordering::SeqCst) || state.source_changed_since_rebuild() {
            state.refresh.needs_refresh = true;
        }
        let released = self.pending_undefer.swap(0, Ordering::SeqCst);
        if released > 0 {
            state.release_deferral(released, events);
        } else if state.refresh.needs_refresh && !state.refresh.is_deferred() {
            if let Err(err) = state.refresh_view(events) {
                tracing::debug!(target: targets::VIEW, error = %err, "resync left the view unsorted");
                events.push(ViewEvent::SortFailed(err));
            }
        }
    }

    fn needs_catch_up(&self) -> bool {
        if self.guard.is_busy() {
            return false;
        }
        if self.stale.load(Ordering::SeqCst) || self.pending_undefer.load(Ordering::SeqCst) > 0 {
            return true;
        }
        let state = self.state.lock();
        state.source_changed_since_rebuild() && !state.refresh.is_deferred()
    }

    /// Reads the state.
    ///
    /// # Panics
    ///
    /// Panics when called from a callback that runs inside a view operation
    /// (filter, comparer, group selector or edit hook).
    pub(crate) fn read<R>(&self, f: impl FnOnce(&ViewState<T>) -> R) -> R {
        if let Some(operation) = self.guard.held_by_current_thread() {
            panic!("collection view read from inside '{operation}': callbacks must not call back into the view");
        }
        if self.needs_catch_up() {
            if let Err(err) = self.mutate("catch_up", |_, _| Ok(())) {
                tracing::debug!(target: targets::VIEW, error = %err, "catch-up skipped");
            }
        }
        let state = self.state.lock();
        f(&*state)
    }

    fn flush(&self, events: EventQueue<T>) {
        for event in events.into_events() {
            match event {
                ViewEvent::Collection(change) => self.signals.collection_changed.emit(change),
                ViewEvent::CurrentChanging(change) => {
                    let _monitor = self.currency_monitor.enter("current_changing").ok();
                    self.signals.current_changing.emit(change);
                }
                ViewEvent::CurrentChanged(change) => {
                    let _monitor = self.currency_monitor.enter("current_changed").ok();
                    self.signals.current_changed.emit(change);
                }
                ViewEvent::PageChanging(change) => self.signals.page_changing.emit(change),
                ViewEvent::PageChanged(change) => self.signals.page_changed.emit(change),
                ViewEvent::SortChanged => self.signals.sort_descriptions_changed.emit(()),
                ViewEvent::FilterChanged => self.signals.filter_changed.emit(()),
                ViewEvent::GroupingChanged => self.signals.group_descriptions_changed.emit(()),
                ViewEvent::Refreshed => self.signals.refreshed.emit(()),
                ViewEvent::SortFailed(err) => self.signals.sort_failed.emit(err),
            }
        }
    }

    fn on_source_delta(&self, delta: SourceDelta<T>) {
        if self.source_writes.is_raised() {
            return;
        }
        let outcome = self.mutate("source_changed", |state, events| {
            if state.refresh.is_deferred() {
                state.refresh.needs_refresh = true;
                return Ok(());
            }
            state.apply_source_delta(delta, events)
        });
        match outcome {
            Ok(()) => {}
            Err(Error::Reentrant(err)) => {
                tracing::debug!(target: targets::VIEW, error = %err, "source changed during an operation, resync scheduled");
                self.stale.store(true, Ordering::SeqCst);
            }
            Err(err) => {
                tracing::debug!(target: targets::VIEW, error = %err, "source change applied with errors");
            }
        }
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// Number of items the view shows (current page, pending new item
    /// included).
    ///
    /// # Panics
    ///
    /// Panics when called from a callback the view is running, like every
    /// other getter.
    pub fn count(&self) -> usize {
        self.read(|state| state.count())
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// The item at a view position.
    pub fn get_item_at(&self, index: usize) -> Option<Arc<T>> {
        self.read(|state| state.item_at(index))
    }

    /// View position of an item, by identity.
    pub fn index_of(&self, item: &Arc<T>) -> Option<usize> {
        self.read(|state| state.index_of(item))
    }

    pub fn contains(&self, item: &Arc<T>) -> bool {
        self.index_of(item).is_some()
    }

    /// Snapshot of the visible items in display order.
    ///
    /// # Panics
    ///
    /// Panics when called from a filter, comparer or other callback while the
    /// view is running it.
    pub fn items(&self) -> Vec<Arc<T>> {
        self.read(|state| state.visible_items())
    }

    /// Number of items passing the filter, across all pages. The pending new
    /// item is counted.
    pub fn item_count(&self) -> usize {
        self.read(|state| state.internal.len() + usize::from(state.pending_add().is_some()))
    }

    /// Number of items in the source.
    pub fn total_item_count(&self) -> usize {
        self.source.len()
    }

    /// Position in the filtered and sorted items of a page-relative index.
    pub fn convert_to_internal_index(&self, index: usize) -> usize {
        self.read(|state| state.convert_to_internal_index(index))
    }

    /// Snapshot of the filtered and sorted items across all pages, without
    /// the pending new item.
    pub fn internal_items(&self) -> Vec<Arc<T>> {
        self.read(|state| state.internal.clone())
    }

    pub fn culture(&self) -> Culture {
        self.read(|state| state.culture.clone())
    }

    // =========================================================================
    // Filter, sort and grouping
    // =========================================================================

    pub fn filter(&self) -> Option<FilterFn<T>> {
        self.read(|state| state.filter.clone())
    }

    /// Replaces the filter and refreshes. Any open transaction is committed
    /// first.
    pub fn set_filter(&self, filter: Option<FilterFn<T>>) -> Result<()> {
        self.mutate("set_filter", |state, events| {
            state.commit_pending("set_filter", events)?;
            state.filter = filter;
            events.push(ViewEvent::FilterChanged);
            state.refresh_or_defer(events)
        })
    }

    /// Sets a filter closure.
    pub fn set_filter_fn<F>(&self, filter: F) -> Result<()>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.set_filter(Some(Arc::new(filter)))
    }

    pub fn clear_filter(&self) -> Result<()> {
        self.set_filter(None)
    }

    pub fn sort_descriptions(&self) -> Vec<SortDescription<T>> {
        self.read(|state| state.sort.clone())
    }

    /// Replaces the sort descriptions and refreshes.
    ///
    /// When a comparer fails the new descriptions are kept, the items stay
    /// in filtered source order and [`Error::SortFailed`] is returned.
    pub fn set_sort_descriptions(&self, descriptions: Vec<SortDescription<T>>) -> Result<()> {
        self.mutate("set_sort_descriptions", |state, events| {
            if state.sort == descriptions {
                return Ok(());
            }
            state.commit_pending("set_sort_descriptions", events)?;
            state.sort = descriptions;
            events.push(ViewEvent::SortChanged);
            state.refresh_or_defer(events)
        })
    }

    pub fn clear_sort(&self) -> Result<()> {
        self.set_sort_descriptions(Vec::new())
    }

    pub fn group_descriptions(&self) -> Vec<GroupDescription<T>> {
        self.read(|state| state.group_descriptions.clone())
    }

    /// Replaces the group descriptions and refreshes.
    pub fn set_group_descriptions(&self, descriptions: Vec<GroupDescription<T>>) -> Result<()> {
        self.mutate("set_group_descriptions", |state, events| {
            if state.group_descriptions == descriptions {
                return Ok(());
            }
            state.commit_pending("set_group_descriptions", events)?;
            state.group_descriptions = descriptions;
            events.push(ViewEvent::GroupingChanged);
            state.refresh_or_defer(events)
        })
    }

    pub fn is_grouping(&self) -> bool {
        self.read(|state| state.is_grouping())
    }

    /// Snapshot of the top-level node of the current page's group tree.
    pub fn groups(&self) -> Option<CollectionGroup<T>> {
        self.read(|state| state.groups.as_ref().map(|root| root.root().clone()))
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Rebuilds the view from the source.
    pub fn refresh(&self) -> Result<()> {
        self.mutate("refresh", |state, events| {
            if state.refresh.is_deferred() {
                state.refresh.needs_refresh = true;
                return Ok(());
            }
            state.commit_pending("refresh", events)?;
            let outcome = state.refresh_view(events);
            events.push(ViewEvent::Refreshed);
            outcome
        })
    }

    /// Defers refreshes until the returned scope (and every other deferral
    /// scope) is dropped; then a single refresh runs.
    ///
    /// Fails while an add or edit transaction is open.
    pub fn defer_refresh(&self) -> Result<DeferRefresh<'_, T>> {
        self.mutate("defer_refresh", |state, _| {
            if !state.transaction.is_idle() {
                return Err(Error::invalid_operation(
                    "defer_refresh",
                    "an add or edit transaction is pending",
                ));
            }
            state.refresh.defer_level += 1;
            Ok(())
        })?;
        Ok(DeferRefresh { view: self })
    }

    pub fn is_refresh_deferred(&self) -> bool {
        self.read(|state| state.refresh.is_deferred())
    }

    /// Whether a refresh is owed, for example after changes made while
    /// refresh was deferred.
    pub fn needs_refresh(&self) -> bool {
        self.read(|state| state.refresh.needs_refresh)
    }
}

impl<T: DataItem> ViewState<T> {
    /// Ends `released` deferral scopes; the last one applies queued page
    /// requests and refreshes.
    fn release_deferral(&mut self, released: usize, events: &mut EventQueue<T>) {
        self.refresh.defer_level = self.refresh.defer_level.saturating_sub(released);
        if self.refresh.is_deferred() {
            return;
        }
        let old_page = self.apply_queued_paging();
        if !self.refresh.needs_refresh && old_page.is_none() {
            return;
        }
        let mark = events.mark();
        if let Err(err) = self.refresh_view(events) {
            tracing::warn!(target: targets::VIEW, error = %err, "deferred refresh left the view unsorted");
            events.push(ViewEvent::SortFailed(err));
        }
        events.push(ViewEvent::Refreshed);
        if let Some(old_index) = old_page.filter(|&old| old != self.paging.page_index) {
            let change = PageChange {
                old_index,
                new_index: self.paging.page_index,
            };
            events.insert(mark, ViewEvent::PageChanging(change));
            events.push(ViewEvent::PageChanged(change));
        }
    }
}

/// Scope returned by [`CollectionView::defer_refresh`].
#[must_use = "refresh is deferred only while the scope is alive"]
pub struct DeferRefresh<'a, T: DataItem> {
    view: &'a CollectionView<T>,
}

impl<T: DataItem> Drop for DeferRefresh<'_, T> {
    fn drop(&mut self) {
        self.view.pending_undefer.fetch_add(1, Ordering::SeqCst);
        if let Err(err) = self.view.mutate("end_defer", |_, _| Ok(())) {
            tracing::debug!(target: targets::VIEW, error = %err, "deferred refresh postponed to the next access");
        }
    }
}
