//! Add and edit transactions.
//!
//! At most one transaction is open at a time. A new item lives outside the
//! internal list until it is committed: it is shown at the end of the current
//! page, taking the place of the page's last item when the page is full.

use std::sync::Arc;

use lattice_grid_core::logging::targets;

use super::changes::Settle;
use super::currency::CurrencyHint;
use super::events::EventQueue;
use super::state::{Transaction, ViewState};
use super::CollectionView;
use crate::accessor::DataItem;
use crate::error::{Error, Result};

impl<T: DataItem> ViewState<T> {
    pub(crate) fn can_add_new(&self) -> bool {
        self.source.can_insert() && (self.item_factory.is_some() || self.source.creates_items())
    }

    pub(crate) fn can_remove(&self) -> bool {
        self.source.can_remove() && self.transaction.is_idle()
    }

    /// Appends an item created by the view to the source.
    fn push_to_source(&mut self, item: Arc<T>) -> Result<()> {
        let pushed = {
            let _writes = self.source_writes.suppress();
            self.source.push(item)
        };
        self.source_version = self.source.version();
        if pushed {
            Ok(())
        } else {
            Err(Error::AddNotSupported("the source rejected the new item".into()))
        }
    }

    /// Opens an add transaction for `item`, which is already in the source.
    fn begin_add(&mut self, item: Arc<T>, events: &mut EventQueue<T>) {
        let previous = self.currency.clone();
        self.apply_visible_change(events, false, Settle::OnItem(item.clone()), |state| {
            state.transaction = Transaction::Adding {
                item: item.clone(),
                previous,
            };
            state.show_pending();
        });
        if let Some(editable) = item.editable() {
            editable.begin_edit();
        }
        tracing::debug!(target: targets::EDITING, "add transaction started");
    }

    fn add_new_inner(&mut self, supplied: Option<Arc<T>>, events: &mut EventQueue<T>) -> Result<Arc<T>> {
        self.ensure_not_deferred("add_new")?;
        self.commit_pending("add_new", events)?;
        let item = match (supplied, self.item_factory.clone()) {
            (Some(item), _) => {
                self.push_to_source(item.clone())?;
                item
            }
            (None, Some(factory)) => {
                let item = factory();
                self.push_to_source(item.clone())?;
                item
            }
            (None, None) => {
                let created = {
                    let _writes = self.source_writes.suppress();
                    self.source.add_new_from_source()
                };
                created.ok_or_else(|| Error::AddNotSupported("the source did not create an item".into()))?
            }
        };
        self.begin_add(item.clone(), events);
        Ok(item)
    }

    /// Leaves an emptied page for the one before it.
    fn leave_empty_page(&mut self, events: &mut EventQueue<T>) {
        if self.paging.is_paging() && self.paging.page_index > 0 && self.count() == 0 {
            let previous = self.paging.page_index - 1;
            self.move_to_page_inner(previous, events);
        }
    }

    pub(crate) fn commit_new_inner(&mut self, events: &mut EventQueue<T>) -> Result<()> {
        let Some(item) = self.transaction.adding_item().cloned() else {
            return Ok(());
        };
        if let Some(editable) = item.editable() {
            editable.end_edit().map_err(Error::CommitRejected)?;
        }
        self.source.end_new(&item);
        self.apply_visible_change(events, false, Settle::Follow(CurrencyHint::Incremental), |state| {
            state.transaction = Transaction::Idle;
            state.hide_pending(&item);
            if state.passes_filter(&item) {
                state.insert_internal(item.clone());
            }
        });
        self.leave_empty_page(events);
        tracing::debug!(target: targets::EDITING, "add transaction committed");
        Ok(())
    }

    fn cancel_new_inner(&mut self, events: &mut EventQueue<T>) {
        let (item, previous) = match &self.transaction {
            Transaction::Adding { item, previous } => (item.clone(), previous.clone()),
            _ => return,
        };
        if let Some(editable) = item.editable() {
            editable.cancel_edit();
        }
        {
            let _writes = self.source_writes.suppress();
            self.source.cancel_new(&item);
        }
        self.source_version = self.source.version();
        self.apply_visible_change(events, false, Settle::Restore(previous), |state| {
            state.transaction = Transaction::Idle;
            state.hide_pending(&item);
        });
        tracing::debug!(target: targets::EDITING, "add transaction cancelled");
    }

    pub(crate) fn commit_edit_inner(&mut self, events: &mut EventQueue<T>) -> Result<()> {
        let Some(item) = self.transaction.editing_item().cloned() else {
            return Ok(());
        };
        if let Some(editable) = item.editable() {
            editable.end_edit().map_err(Error::CommitRejected)?;
        }
        self.apply_visible_change(events, false, Settle::Follow(CurrencyHint::Incremental), |state| {
            state.transaction = Transaction::Idle;
            state.reevaluate(&item);
        });
        self.leave_empty_page(events);
        tracing::debug!(target: targets::EDITING, "edit committed");
        Ok(())
    }

    fn remove_inner(&mut self, item: &Arc<T>, events: &mut EventQueue<T>) -> Result<()> {
        self.ensure_not_deferred("remove")?;
        if self.pending_add().is_some_and(|pending| Arc::ptr_eq(pending, item)) {
            self.cancel_new_inner(events);
            return Ok(());
        }
        if !self.transaction.is_idle() {
            return Err(Error::invalid_operation("remove", "an add or edit transaction is pending"));
        }
        if !self.source.can_remove() {
            return Err(Error::RemoveNotSupported("the source does not allow removal".into()));
        }
        let removed = {
            let _writes = self.source_writes.suppress();
            self.source.remove_item(item)
        };
        self.source_version = self.source.version();
        if !removed {
            return Err(Error::ItemNotFound);
        }
        self.apply_visible_change(events, false, Settle::Follow(CurrencyHint::Incremental), |state| {
            state.remove_internal(item);
        });
        self.leave_empty_page(events);
        Ok(())
    }
}

impl<T: DataItem> CollectionView<T> {
    /// Whether [`add_new`](Self::add_new) can create an item: the source must
    /// accept new items and either the view has an item factory or the source
    /// creates items itself.
    pub fn can_add_new(&self) -> bool {
        self.read(|state| state.can_add_new())
    }

    /// Starts adding a new item.
    ///
    /// Any open transaction is committed first. The item is appended to the
    /// source, shown at the end of the current page, made current and asked
    /// to begin an edit. It joins the filtered and sorted items only on
    /// [`commit_new`](Self::commit_new).
    pub fn add_new(&self) -> Result<Arc<T>> {
        self.mutate("add_new", |state, events| {
            state.ensure_not_deferred("add_new")?;
            if !state.can_add_new() {
                return Err(Error::AddNotSupported(
                    "the source is fixed-size or no item factory is configured".into(),
                ));
            }
            state.add_new_inner(None, events)
        })
    }

    /// Like [`add_new`](Self::add_new), with a caller-supplied item.
    pub fn add_new_item(&self, item: impl Into<Arc<T>>) -> Result<Arc<T>> {
        let item = item.into();
        self.mutate("add_new_item", |state, events| {
            if !state.source.can_insert() {
                return Err(Error::AddNotSupported("the source is fixed-size".into()));
            }
            state.add_new_inner(Some(item), events)
        })
    }

    /// Commits the pending new item into the filtered and sorted items.
    ///
    /// Does nothing when no add is pending. If the item rejects the commit,
    /// [`Error::CommitRejected`] is returned and the add stays open.
    pub fn commit_new(&self) -> Result<()> {
        self.mutate("commit_new", |state, events| {
            if state.transaction.editing_item().is_some() {
                return Err(Error::invalid_operation("commit_new", "an edit is in progress"));
            }
            state.commit_new_inner(events)
        })
    }

    /// Discards the pending new item and restores the cursor.
    pub fn cancel_new(&self) -> Result<()> {
        self.mutate("cancel_new", |state, events| {
            if state.transaction.editing_item().is_some() {
                return Err(Error::invalid_operation("cancel_new", "an edit is in progress"));
            }
            state.cancel_new_inner(events);
            Ok(())
        })
    }

    /// Starts editing `item`.
    ///
    /// Editing the pending new item or the item already being edited does
    /// nothing; any other open transaction is committed first.
    pub fn edit_item(&self, item: &Arc<T>) -> Result<()> {
        self.mutate("edit_item", |state, events| {
            state.ensure_not_deferred("edit_item")?;
            let open = state.pending_add().or(state.transaction.editing_item());
            if open.is_some_and(|open| Arc::ptr_eq(open, item)) {
                return Ok(());
            }
            state.commit_pending("edit_item", events)?;
            if let Some(editable) = item.editable() {
                editable.begin_edit();
            }
            state.transaction = Transaction::Editing { item: item.clone() };
            tracing::debug!(target: targets::EDITING, "edit started");
            Ok(())
        })
    }

    /// Commits the current edit, moving the item if its sort position or
    /// filter membership changed.
    pub fn commit_edit(&self) -> Result<()> {
        self.mutate("commit_edit", |state, events| {
            if state.pending_add().is_some() {
                return Err(Error::invalid_operation("commit_edit", "an add is in progress"));
            }
            state.commit_edit_inner(events)
        })
    }

    /// Cancels the current edit.
    ///
    /// Fails with [`Error::CancelNotSupported`] when the item has no
    /// [`EditableItem`](crate::EditableItem) capability.
    pub fn cancel_edit(&self) -> Result<()> {
        self.mutate("cancel_edit", |state, events| {
            if state.pending_add().is_some() {
                return Err(Error::invalid_operation("cancel_edit", "an add is in progress"));
            }
            let Some(item) = state.transaction.editing_item().cloned() else {
                return Ok(());
            };
            let editable = item.editable().ok_or(Error::CancelNotSupported)?;
            editable.cancel_edit();
            state.apply_visible_change(events, false, Settle::Follow(CurrencyHint::Incremental), |state| {
                state.transaction = Transaction::Idle;
                state.reevaluate(&item);
            });
            tracing::debug!(target: targets::EDITING, "edit cancelled");
            Ok(())
        })
    }

    /// Whether the item being edited can cancel its edit.
    pub fn can_cancel_edit(&self) -> bool {
        self.read(|state| {
            state
                .transaction
                .editing_item()
                .is_some_and(|item| item.editable().is_some())
        })
    }

    pub fn is_adding_new(&self) -> bool {
        self.read(|state| state.pending_add().is_some())
    }

    pub fn is_editing_item(&self) -> bool {
        self.read(|state| state.transaction.editing_item().is_some())
    }

    /// The pending new item.
    pub fn current_add_item(&self) -> Option<Arc<T>> {
        self.read(|state| state.pending_add().cloned())
    }

    /// The item being edited.
    pub fn current_edit_item(&self) -> Option<Arc<T>> {
        self.read(|state| state.transaction.editing_item().cloned())
    }

    /// Whether items can be removed through the view right now.
    pub fn can_remove(&self) -> bool {
        self.read(|state| state.can_remove())
    }

    /// Removes `item` from the source. Removing the pending new item cancels
    /// the add.
    pub fn remove(&self, item: &Arc<T>) -> Result<()> {
        self.mutate("remove", |state, events| state.remove_inner(item, events))
    }

    /// Removes the item at a view position.
    pub fn remove_at(&self, index: usize) -> Result<()> {
        self.mutate("remove_at", |state, events| {
            let Some(item) = state.item_at(index) else {
                let count = state.count() as isize;
                return Err(Error::index_out_of_range(index as isize, 0, count - 1));
            };
            state.remove_inner(&item, events)
        })
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::accessor::EditableItem;
    use crate::group::GroupDescription;
    use crate::options::ViewOptions;
    use crate::source::{BindingList, ObservableList};
    use crate::sort::{SortDescription, SortDirection};
    use crate::value::Value;

    #[derive(Debug, Default)]
    struct Contact {
        name: Mutex<String>,
        snapshot: Mutex<Option<String>>,
        reject: bool,
    }

    impl Contact {
        fn named(name: &str) -> Self {
            Self {
                name: Mutex::new(name.to_owned()),
                ..Self::default()
            }
        }

        fn rename(&self, name: &str) {
            *self.name.lock() = name.to_owned();
        }
    }

    impl DataItem for Contact {
        fn property(&self, name: &str) -> Option<Value> {
            (name == "name").then(|| self.name.lock().clone().into())
        }

        fn editable(&self) -> Option<&dyn EditableItem> {
            Some(self)
        }
    }

    impl EditableItem for Contact {
        fn begin_edit(&self) {
            *self.snapshot.lock() = Some(self.name.lock().clone());
        }

        fn end_edit(&self) -> std::result::Result<(), String> {
            if self.reject {
                return Err("rejected".into());
            }
            *self.snapshot.lock() = None;
            Ok(())
        }

        fn cancel_edit(&self) {
            if let Some(name) = self.snapshot.lock().take() {
                *self.name.lock() = name;
            }
        }
    }

    fn names(view: &CollectionView<Contact>) -> Vec<String> {
        view.items().iter().map(|c| c.name.lock().clone()).collect()
    }

    fn view(names: &[&str]) -> (Arc<ObservableList<Contact>>, Arc<CollectionView<Contact>>) {
        let list = Arc::new(ObservableList::new(names.iter().map(|n| Contact::named(n)).collect()));
        let view = CollectionView::with_options(
            list.clone(),
            ViewOptions::default().with_item_factory(|| Arc::new(Contact::named("new"))),
        );
        (list, view)
    }

    #[test]
    fn test_add_new_then_commit_sorts_item() {
        let (list, view) = view(&["b", "d"]);
        view.set_sort_descriptions(vec![SortDescription::by_path("name", SortDirection::Ascending)])
            .unwrap();

        let item = view.add_new().unwrap();
        assert!(view.is_adding_new());
        assert_eq!(list.len(), 3);
        assert_eq!(names(&view), vec!["b", "d", "new"]);
        assert!(Arc::ptr_eq(&view.current_item().unwrap(), &item));

        item.rename("c");
        view.commit_new().unwrap();
        assert!(!view.is_adding_new());
        assert_eq!(names(&view), vec!["b", "c", "d"]);
        assert_eq!(view.current_position(), 1);
    }

    #[test]
    fn test_cancel_new_restores_currency() {
        let (list, view) = view(&["a", "b"]);
        view.move_current_to_last().unwrap();
        let before = view.current_item();

        view.add_new().unwrap();
        view.cancel_new().unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(names(&view), vec!["a", "b"]);
        assert!(Arc::ptr_eq(&view.current_item().unwrap(), before.as_ref().unwrap()));
    }

    #[test]
    fn test_commit_rejected_keeps_transaction() {
        let list = Arc::new(ObservableList::new(vec![Contact::named("a")]));
        let view = CollectionView::with_options(
            list,
            ViewOptions::default().with_item_factory(|| {
                Arc::new(Contact {
                    reject: true,
                    ..Contact::named("x")
                })
            }),
        );
        view.add_new().unwrap();
        assert!(matches!(view.commit_new(), Err(Error::CommitRejected(_))));
        assert!(view.is_adding_new());
        assert!(matches!(view.refresh(), Err(Error::InvalidOperation { .. })));
        view.cancel_new().unwrap();
        assert_eq!(view.count(), 1);
    }

    #[test]
    fn test_edit_and_cancel() {
        let (_list, view) = view(&["a", "b"]);
        let item = view.get_item_at(0).unwrap();
        view.edit_item(&item).unwrap();
        assert!(view.can_cancel_edit());
        item.rename("z");
        view.cancel_edit().unwrap();
        assert_eq!(names(&view), vec!["a", "b"]);
        assert!(!view.is_editing_item());
    }

    #[test]
    fn test_edit_commit_moves_item() {
        let (_list, view) = view(&["a", "b", "c"]);
        view.set_sort_descriptions(vec![SortDescription::by_path("name", SortDirection::Ascending)])
            .unwrap();
        let item = view.get_item_at(0).unwrap();
        view.edit_item(&item).unwrap();
        item.rename("d");
        view.commit_edit().unwrap();
        assert_eq!(names(&view), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_remove_and_remove_at() {
        let (list, view) = view(&["a", "b", "c"]);
        let b = view.get_item_at(1).unwrap();
        view.remove(&b).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(names(&view), vec!["a", "c"]);
        assert!(matches!(view.remove(&b), Err(Error::ItemNotFound)));
        assert!(matches!(view.remove_at(5), Err(Error::IndexOutOfRange { .. })));
        view.remove_at(0).unwrap();
        assert_eq!(names(&view), vec!["c"]);
    }

    #[test]
    fn test_binding_list_creates_items() {
        let list = Arc::new(BindingList::new(vec![Contact::named("a")]).with_factory(|| Arc::new(Contact::named("n"))));
        let view = CollectionView::new(list.clone());
        assert!(view.can_add_new());
        let item = view.add_new().unwrap();
        assert!(list.pending_new().is_some());
        view.cancel_new().unwrap();
        assert!(list.pending_new().is_none());
        assert_eq!(list.len(), 1);
        assert!(list.index_of(&item).is_none());
    }

    #[test]
    fn test_fixed_size_source_refuses() {
        let list = Arc::new(ObservableList::new(vec![Contact::named("a")]).with_fixed_size(true));
        let view = CollectionView::new(list);
        assert!(!view.can_add_new());
        assert!(matches!(view.add_new(), Err(Error::AddNotSupported(_))));
        assert!(!view.can_remove());
    }

    /// A paged view over `names` hiding items renamed to "gone", showing its
    /// last page.
    fn paged_on_last_page(names: &[&str], grouped: bool) -> Arc<CollectionView<Contact>> {
        let (_list, view) = view(names);
        view.set_filter_fn(|c: &Contact| *c.name.lock() != "gone").unwrap();
        view.set_page_size(2).unwrap();
        if grouped {
            view.set_group_descriptions(vec![GroupDescription::by_path("name")])
                .unwrap();
        }
        assert!(view.move_to_last_page().unwrap());
        view
    }

    fn record(view: &CollectionView<Contact>) -> Arc<Mutex<Vec<String>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let signals = view.signals();
        let recv = log.clone();
        signals
            .collection_changed
            .connect(move |change| recv.lock().push(format!("{change:?}")));
        let recv = log.clone();
        signals
            .page_changing
            .connect(move |page| recv.lock().push(format!("PageChanging({} -> {})", page.old_index, page.new_index)));
        let recv = log.clone();
        signals
            .page_changed
            .connect(move |page| recv.lock().push(format!("PageChanged({} -> {})", page.old_index, page.new_index)));
        log
    }

    fn check_commit_edit_leaves_emptied_page(grouped: bool) {
        let view = paged_on_last_page(&["a", "b", "c"], grouped);
        assert_eq!(view.page_index(), 1);
        assert_eq!(names(&view), vec!["c"]);
        let item = view.get_item_at(0).unwrap();
        let log = record(&view);

        view.edit_item(&item).unwrap();
        item.rename("gone");
        view.commit_edit().unwrap();

        assert_eq!(
            *log.lock(),
            vec!["Remove(0)", "PageChanging(1 -> 0)", "Reset", "PageChanged(1 -> 0)"]
        );
        assert_eq!(view.page_index(), 0);
        assert_eq!(names(&view), vec!["a", "b"]);
        assert_eq!(view.current_position(), 0);
    }

    #[test]
    fn test_commit_edit_filtered_out_leaves_emptied_page() {
        check_commit_edit_leaves_emptied_page(false);
    }

    #[test]
    fn test_commit_edit_filtered_out_leaves_emptied_grouped_page() {
        check_commit_edit_leaves_emptied_page(true);
    }

    fn check_commit_new_filtered_out(grouped: bool) {
        let view = paged_on_last_page(&["a", "b", "c"], grouped);
        let item = view.add_new().unwrap();
        assert_eq!(names(&view), vec!["c", "new"]);
        let log = record(&view);

        item.rename("gone");
        view.commit_new().unwrap();

        assert_eq!(*log.lock(), vec!["Remove(1)"]);
        assert_eq!(view.page_index(), 1);
        assert_eq!(names(&view), vec!["c"]);
        assert_eq!(view.index_of(&item), None);
        assert_eq!(view.item_count(), 3);
    }

    #[test]
    fn test_commit_new_filtered_out_only_removes() {
        check_commit_new_filtered_out(false);
    }

    #[test]
    fn test_commit_new_filtered_out_only_removes_when_grouped() {
        check_commit_new_filtered_out(true);
    }

    #[test]
    fn test_edit_commit_keeps_place_when_comparer_fails() {
        let (_list, view) = view(&["a", "b", "c"]);
        view.set_sort_descriptions(vec![SortDescription::by_comparer(
            |a: &Contact, b: &Contact| {
                let a = a.name.lock().clone();
                let b = b.name.lock().clone();
                if a == "bad" || b == "bad" {
                    Err("bad is not comparable".to_string())
                } else {
                    Ok(a.cmp(&b))
                }
            },
            SortDirection::Ascending,
        )])
        .unwrap();
        let item = view.get_item_at(1).unwrap();

        view.edit_item(&item).unwrap();
        item.rename("bad");
        view.commit_edit().unwrap();

        assert_eq!(view.index_of(&item), Some(1));
        assert_eq!(names(&view), vec!["a", "bad", "c"]);
    }
}
