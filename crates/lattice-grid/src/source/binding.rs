//! Binding lists: lists that can create their own items.

use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lattice_grid_core::Signal;

use crate::options::ItemFactory;

/// A change notification of a [`BindingList`].
pub enum ListChanged<T> {
    /// An item was inserted at `index`.
    ItemAdded { index: usize, item: Arc<T> },
    /// The item formerly at `index` was deleted.
    ItemDeleted { index: usize, item: Arc<T> },
    /// The slot at `index` now holds a different item.
    ItemReplaced {
        index: usize,
        old: Arc<T>,
        new: Arc<T>,
    },
    /// A property of the item at `index` changed.
    ItemChanged { index: usize, item: Arc<T> },
    /// An item moved.
    ItemMoved {
        old_index: usize,
        new_index: usize,
        item: Arc<T>,
    },
    /// The list changed wholesale.
    Reset,
}

impl<T> Clone for ListChanged<T> {
    fn clone(&self) -> Self {
        match self {
            Self::ItemAdded { index, item } => Self::ItemAdded {
                index: *index,
                item: item.clone(),
            },
            Self::ItemDeleted { index, item } => Self::ItemDeleted {
                index: *index,
                item: item.clone(),
            },
            Self::ItemReplaced { index, old, new } => Self::ItemReplaced {
                index: *index,
                old: old.clone(),
                new: new.clone(),
            },
            Self::ItemChanged { index, item } => Self::ItemChanged {
                index: *index,
                item: item.clone(),
            },
            Self::ItemMoved {
                old_index,
                new_index,
                item,
            } => Self::ItemMoved {
                old_index: *old_index,
                new_index: *new_index,
                item: item.clone(),
            },
            Self::Reset => Self::Reset,
        }
    }
}

impl<T> fmt::Debug for ListChanged<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ItemAdded { index, .. } => write!(f, "ItemAdded({index})"),
            Self::ItemDeleted { index, .. } => write!(f, "ItemDeleted({index})"),
            Self::ItemReplaced { index, .. } => write!(f, "ItemReplaced({index})"),
            Self::ItemChanged { index, .. } => write!(f, "ItemChanged({index})"),
            Self::ItemMoved {
                old_index,
                new_index,
                ..
            } => write!(f, "ItemMoved({old_index} -> {new_index})"),
            Self::Reset => f.write_str("Reset"),
        }
    }
}

/// A list with add-new support and per-item change notifications.
///
/// `add_new` creates an item through the configured factory and appends it
/// as *pending*; the pending item is either kept with [`end_new`](Self::end_new)
/// or removed again with [`cancel_new`](Self::cancel_new).
pub struct BindingList<T> {
    items: RwLock<Vec<Arc<T>>>,
    factory: Option<ItemFactory<T>>,
    allow_new: AtomicBool,
    allow_remove: AtomicBool,
    pending_new: Mutex<Option<Arc<T>>>,
    /// Emitted after every change.
    pub list_changed: Signal<ListChanged<T>>,
}

impl<T: Send + Sync + 'static> BindingList<T> {
    /// Creates a list from owned items.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items.into_iter().map(Arc::new).collect()),
            factory: None,
            allow_new: AtomicBool::new(true),
            allow_remove: AtomicBool::new(true),
            pending_new: Mutex::new(None),
            list_changed: Signal::new(),
        }
    }

    /// Sets the factory used by [`add_new`](Self::add_new).
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Whether `add_new` may create items. Requires a factory.
    pub fn allow_new(&self) -> bool {
        self.factory.is_some() && self.allow_new.load(Ordering::SeqCst)
    }

    /// Enables or disables `add_new`.
    pub fn set_allow_new(&self, allow: bool) {
        self.allow_new.store(allow, Ordering::SeqCst);
    }

    /// Whether items may be removed through views.
    pub fn allow_remove(&self) -> bool {
        self.allow_remove.load(Ordering::SeqCst)
    }

    /// Enables or disables removal through views.
    pub fn set_allow_remove(&self, allow: bool) {
        self.allow_remove.store(allow, Ordering::SeqCst);
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns `true` if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Returns the item at `index`.
    pub fn get(&self, index: usize) -> Option<Arc<T>> {
        self.items.read().get(index).cloned()
    }

    /// Returns a snapshot of the items.
    pub fn items(&self) -> Vec<Arc<T>> {
        self.items.read().clone()
    }

    /// Position of an item by reference identity.
    pub fn index_of(&self, item: &Arc<T>) -> Option<usize> {
        self.items.read().iter().position(|x| Arc::ptr_eq(x, item))
    }

    /// The item created by `add_new` that is not yet committed.
    pub fn pending_new(&self) -> Option<Arc<T>> {
        self.pending_new.lock().clone()
    }

    /// Creates, appends and returns a pending new item.
    ///
    /// A previous pending item is committed first. Returns `None` when new
    /// items are not allowed.
    pub fn add_new(&self) -> Option<Arc<T>> {
        if !self.allow_new() {
            return None;
        }
        let factory = self.factory.clone()?;
        let item = factory();
        self.push(item.clone());
        *self.pending_new.lock() = Some(item.clone());
        Some(item)
    }

    /// Commits the pending item if it is `item`.
    pub fn end_new(&self, item: &Arc<T>) {
        let mut pending = self.pending_new.lock();
        if pending.as_ref().is_some_and(|p| Arc::ptr_eq(p, item)) {
            *pending = None;
        }
    }

    /// Removes the pending item if it is `item`.
    pub fn cancel_new(&self, item: &Arc<T>) -> bool {
        let is_pending = {
            let mut pending = self.pending_new.lock();
            let hit = pending.as_ref().is_some_and(|p| Arc::ptr_eq(p, item));
            if hit {
                *pending = None;
            }
            hit
        };
        is_pending && self.remove_item(item).is_some()
    }

    /// Appends an item.
    pub fn push(&self, item: impl Into<Arc<T>>) {
        let item = item.into();
        let index = {
            let mut items = self.items.write();
            items.push(item.clone());
            items.len() - 1
        };
        self.list_changed.emit(ListChanged::ItemAdded { index, item });
    }

    /// Inserts an item at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`.
    pub fn insert(&self, index: usize, item: impl Into<Arc<T>>) {
        let item = item.into();
        self.items.write().insert(index, item.clone());
        self.list_changed.emit(ListChanged::ItemAdded { index, item });
    }

    /// Removes and returns the item at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn remove(&self, index: usize) -> Arc<T> {
        let item = self.items.write().remove(index);
        self.end_new(&item);
        self.list_changed.emit(ListChanged::ItemDeleted {
            index,
            item: item.clone(),
        });
        item
    }

    /// Removes an item by reference identity, returning its former index.
    pub fn remove_item(&self, item: &Arc<T>) -> Option<usize> {
        let index = self.index_of(item)?;
        self.remove(index);
        Some(index)
    }

    /// Replaces the item at `index`, returning the old one.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn set(&self, index: usize, item: impl Into<Arc<T>>) -> Arc<T> {
        let new = item.into();
        let old = std::mem::replace(&mut self.items.write()[index], new.clone());
        self.list_changed.emit(ListChanged::ItemReplaced {
            index,
            old: old.clone(),
            new,
        });
        old
    }

    /// Moves the item at `old_index` to `new_index`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    pub fn move_item(&self, old_index: usize, new_index: usize) {
        let item = {
            let mut items = self.items.write();
            let item = items.remove(old_index);
            items.insert(new_index, item.clone());
            item
        };
        self.list_changed.emit(ListChanged::ItemMoved {
            old_index,
            new_index,
            item,
        });
    }

    /// Announces that a property of the item at `index` changed.
    pub fn notify_item_changed(&self, index: usize) {
        if let Some(item) = self.get(index) {
            self.list_changed.emit(ListChanged::ItemChanged { index, item });
        }
    }

    /// Removes all items.
    pub fn clear(&self) {
        self.items.write().clear();
        *self.pending_new.lock() = None;
        self.list_changed.emit(ListChanged::Reset);
    }
}
