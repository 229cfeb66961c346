//! A list that announces its own structural changes.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use lattice_grid_core::Signal;

/// A structural change of an [`ObservableList`].
pub enum CollectionChange<T> {
    /// `items` were inserted starting at `index`.
    Added { index: usize, items: Vec<Arc<T>> },
    /// `items` were removed starting at `index`.
    Removed { index: usize, items: Vec<Arc<T>> },
    /// The item at `index` was replaced.
    Replaced {
        index: usize,
        old: Arc<T>,
        new: Arc<T>,
    },
    /// An item moved from `old_index` to `new_index`.
    Moved {
        old_index: usize,
        new_index: usize,
        item: Arc<T>,
    },
    /// The contents changed wholesale.
    Reset,
}

impl<T> Clone for CollectionChange<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Added { index, items } => Self::Added {
                index: *index,
                items: items.clone(),
            },
            Self::Removed { index, items } => Self::Removed {
                index: *index,
                items: items.clone(),
            },
            Self::Replaced { index, old, new } => Self::Replaced {
                index: *index,
                old: old.clone(),
                new: new.clone(),
            },
            Self::Moved {
                old_index,
                new_index,
                item,
            } => Self::Moved {
                old_index: *old_index,
                new_index: *new_index,
                item: item.clone(),
            },
            Self::Reset => Self::Reset,
        }
    }
}

impl<T> fmt::Debug for CollectionChange<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added { index, items } => write!(f, "Added({index}, {} items)", items.len()),
            Self::Removed { index, items } => write!(f, "Removed({index}, {} items)", items.len()),
            Self::Replaced { index, .. } => write!(f, "Replaced({index})"),
            Self::Moved {
                old_index,
                new_index,
                ..
            } => write!(f, "Moved({old_index} -> {new_index})"),
            Self::Reset => f.write_str("Reset"),
        }
    }
}

/// A shared, observable list of items.
///
/// Every structural change emits [`collection_changed`](Self::collection_changed)
/// after the internal lock is released, so handlers may read the list.
///
/// # Example
///
/// ```
/// use lattice_grid::ObservableList;
///
/// let list = ObservableList::new(vec!["one".to_string()]);
/// list.collection_changed.connect(|change| println!("{change:?}"));
/// list.push("two".to_string());
/// assert_eq!(list.len(), 2);
/// ```
pub struct ObservableList<T> {
    items: RwLock<Vec<Arc<T>>>,
    fixed_size: bool,
    /// Emitted after every structural change.
    pub collection_changed: Signal<CollectionChange<T>>,
}

impl<T: Send + Sync + 'static> ObservableList<T> {
    /// Creates a list from owned items.
    pub fn new(items: Vec<T>) -> Self {
        Self::from_shared(items.into_iter().map(Arc::new).collect())
    }

    /// Creates a list from already shared items.
    pub fn from_shared(items: Vec<Arc<T>>) -> Self {
        Self {
            items: RwLock::new(items),
            fixed_size: false,
            collection_changed: Signal::new(),
        }
    }

    /// Creates an empty list.
    pub fn empty() -> Self {
        Self::from_shared(Vec::new())
    }

    /// Marks the list as fixed-size. Views over it refuse to add or remove
    /// items; the list's own methods are unaffected.
    pub fn with_fixed_size(mut self, fixed_size: bool) -> Self {
        self.fixed_size = fixed_size;
        self
    }

    /// Whether views may add or remove items.
    pub fn is_fixed_size(&self) -> bool {
        self.fixed_size
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

    /// Appends an item and returns its shared handle.
    pub fn push(&self, item: impl Into<Arc<T>>) -> Arc<T> {
        let item = item.into();
        let index = {
            let mut items = self.items.write();
            items.push(item.clone());
            items.len() - 1
        };
        self.collection_changed.emit(CollectionChange::Added {
            index,
            items: vec![item.clone()],
        });
        item
    }

    /// Appends several items with a single notification.
    pub fn extend(&self, new_items: impl IntoIterator<Item = T>) {
        let new_items: Vec<Arc<T>> = new_items.into_iter().map(Arc::new).collect();
        if new_items.is_empty() {
            return;
        }
        let index = {
            let mut items = self.items.write();
            let index = items.len();
            items.extend(new_items.iter().cloned());
            index
        };
        self.collection_changed.emit(CollectionChange::Added {
            index,
            items: new_items,
        });
    }

    /// Inserts an item at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`.
    pub fn insert(&self, index: usize, item: impl Into<Arc<T>>) {
        let item = item.into();
        self.items.write().insert(index, item.clone());
        self.collection_changed.emit(CollectionChange::Added {
            index,
            items: vec![item],
        });
    }

    /// Removes and returns the item at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn remove(&self, index: usize) -> Arc<T> {
        let removed = self.items.write().remove(index);
        self.collection_changed.emit(CollectionChange::Removed {
            index,
            items: vec![removed.clone()],
        });
        removed
    }

    /// Removes an item by reference identity, returning its former index.
    pub fn remove_item(&self, item: &Arc<T>) -> Option<usize> {
        let index = {
            let mut items = self.items.write();
            let index = items.iter().position(|x| Arc::ptr_eq(x, item))?;
            items.remove(index);
            index
        };
        self.collection_changed.emit(CollectionChange::Removed {
            index,
            items: vec![item.clone()],
        });
        Some(index)
    }

    /// Replaces the item at `index`, returning the old one.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn replace(&self, index: usize, item: impl Into<Arc<T>>) -> Arc<T> {
        let new = item.into();
        let old = std::mem::replace(&mut self.items.write()[index], new.clone());
        self.collection_changed.emit(CollectionChange::Replaced {
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
        self.collection_changed.emit(CollectionChange::Moved {
            old_index,
            new_index,
            item,
        });
    }

    /// Removes all items.
    pub fn clear(&self) {
        self.items.write().clear();
        self.collection_changed.emit(CollectionChange::Reset);
    }

    /// Replaces all items.
    pub fn set_items(&self, items: Vec<T>) {
        *self.items.write() = items.into_iter().map(Arc::new).collect();
        self.collection_changed.emit(CollectionChange::Reset);
    }

    /// Sorts the list in place, announcing a reset.
    pub fn sort_by<F>(&self, mut compare: F)
    where
        F: FnMut(&T, &T) -> std::cmp::Ordering,
    {
        self.items.write().sort_by(|a, b| compare(a, b));
        self.collection_changed.emit(CollectionChange::Reset);
    }
}
