//! Source collections a view can sit on.
//!
//! Three kinds of source are supported:
//!
//! - [`ObservableList`]: announces structural changes through a signal.
//! - [`BindingList`]: announces changes (including per-item changes) and can
//!   create new items itself.
//! - Any [`PolledCollection`], such as [`PolledList`]: has no notifications;
//!   the view compares version stamps on access and rebuilds when they differ.
//!
//! Whatever the kind, the view sees a uniform [`SourceDelta`] stream.

mod binding;
mod observable;

pub use binding::{BindingList, ListChanged};
pub use observable::{CollectionChange, ObservableList};

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lattice_grid_core::ConnectionId;

/// A change to the source, normalized across source kinds.
pub enum SourceDelta<T> {
    /// Items inserted at `index`.
    Added { index: usize, items: Vec<Arc<T>> },
    /// Items removed from `index`.
    Removed { index: usize, items: Vec<Arc<T>> },
    /// The item at `index` was replaced.
    Replaced {
        index: usize,
        old: Arc<T>,
        new: Arc<T>,
    },
    /// An item moved.
    Moved {
        old_index: usize,
        new_index: usize,
        item: Arc<T>,
    },
    /// A property of an item changed.
    ItemChanged { index: usize, item: Arc<T> },
    /// Anything else; the view rebuilds.
    Reset,
}

impl<T> Clone for SourceDelta<T> {
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
            Self::ItemChanged { index, item } => Self::ItemChanged {
                index: *index,
                item: item.clone(),
            },
            Self::Reset => Self::Reset,
        }
    }
}

impl<T> fmt::Debug for SourceDelta<T> {
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
            Self::ItemChanged { index, .. } => write!(f, "ItemChanged({index})"),
            Self::Reset => f.write_str("Reset"),
        }
    }
}

impl<T> From<CollectionChange<T>> for SourceDelta<T> {
    fn from(change: CollectionChange<T>) -> Self {
        match change {
            CollectionChange::Added { index, items } => Self::Added { index, items },
            CollectionChange::Removed { index, items } => Self::Removed { index, items },
            CollectionChange::Replaced { index, old, new } => Self::Replaced { index, old, new },
            CollectionChange::Moved {
                old_index,
                new_index,
                item,
            } => Self::Moved {
                old_index,
                new_index,
                item,
            },
            CollectionChange::Reset => Self::Reset,
        }
    }
}

impl<T> From<ListChanged<T>> for SourceDelta<T> {
    fn from(change: ListChanged<T>) -> Self {
        match change {
            ListChanged::ItemAdded { index, item } => Self::Added {
                index,
                items: vec![item],
            },
            ListChanged::ItemDeleted { index, item } => Self::Removed {
                index,
                items: vec![item],
            },
            ListChanged::ItemReplaced { index, old, new } => Self::Replaced { index, old, new },
            ListChanged::ItemChanged { index, item } => Self::ItemChanged { index, item },
            ListChanged::ItemMoved {
                old_index,
                new_index,
                item,
            } => Self::Moved {
                old_index,
                new_index,
                item,
            },
            ListChanged::Reset => Self::Reset,
        }
    }
}

/// A collection without change notifications.
///
/// The view snapshots it and remembers [`version`](Self::version); when the
/// version moves on, the next access rebuilds the view.
pub trait PolledCollection<T>: Send + Sync {
    /// Current items.
    fn snapshot(&self) -> Vec<Arc<T>>;

    /// A stamp that changes whenever the contents change.
    fn version(&self) -> u64;

    /// Number of items.
    fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Returns `true` if the collection is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether views may add or remove items.
    fn is_fixed_size(&self) -> bool {
        true
    }

    /// Appends an item; returns `false` if unsupported.
    fn push(&self, _item: Arc<T>) -> bool {
        false
    }

    /// Removes an item by identity; returns `false` if unsupported or absent.
    fn remove_item(&self, _item: &Arc<T>) -> bool {
        false
    }
}

/// A growable list implementing [`PolledCollection`].
pub struct PolledList<T> {
    items: RwLock<Vec<Arc<T>>>,
    version: AtomicU64,
}

impl<T: Send + Sync + 'static> PolledList<T> {
    /// Creates a list from owned items.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items.into_iter().map(Arc::new).collect()),
            version: AtomicU64::new(0),
        }
    }

    fn bump(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    /// Inserts an item at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`.
    pub fn insert(&self, index: usize, item: impl Into<Arc<T>>) {
        self.items.write().insert(index, item.into());
        self.bump();
    }

    /// Removes and returns the item at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn remove(&self, index: usize) -> Arc<T> {
        let item = self.items.write().remove(index);
        self.bump();
        item
    }

    /// Replaces all items.
    pub fn set_items(&self, items: Vec<T>) {
        *self.items.write() = items.into_iter().map(Arc::new).collect();
        self.bump();
    }
}

impl<T: Send + Sync + 'static> PolledCollection<T> for PolledList<T> {
    fn snapshot(&self) -> Vec<Arc<T>> {
        self.items.read().clone()
    }

    fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    fn len(&self) -> usize {
        self.items.read().len()
    }

    fn is_fixed_size(&self) -> bool {
        false
    }

    fn push(&self, item: Arc<T>) -> bool {
        self.items.write().push(item);
        self.bump();
        true
    }

    fn remove_item(&self, item: &Arc<T>) -> bool {
        let removed = {
            let mut items = self.items.write();
            match items.iter().position(|x| Arc::ptr_eq(x, item)) {
                Some(index) => {
                    items.remove(index);
                    true
                }
                None => false,
            }
        };
        if removed {
            self.bump();
        }
        removed
    }
}

/// The source a view is built over.
pub enum CollectionSource<T> {
    /// A list with collection-changed notifications.
    Observable(Arc<ObservableList<T>>),
    /// A binding list.
    Binding(Arc<BindingList<T>>),
    /// A collection without notifications.
    Polled(Arc<dyn PolledCollection<T>>),
}

impl<T> Clone for CollectionSource<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Observable(list) => Self::Observable(list.clone()),
            Self::Binding(list) => Self::Binding(list.clone()),
            Self::Polled(list) => Self::Polled(list.clone()),
        }
    }
}

impl<T> fmt::Debug for CollectionSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Observable(_) => "Observable",
            Self::Binding(_) => "Binding",
            Self::Polled(_) => "Polled",
        };
        f.debug_tuple("CollectionSource").field(&kind).finish()
    }
}

impl<T> From<Arc<ObservableList<T>>> for CollectionSource<T> {
    fn from(list: Arc<ObservableList<T>>) -> Self {
        Self::Observable(list)
    }
}

impl<T> From<Arc<BindingList<T>>> for CollectionSource<T> {
    fn from(list: Arc<BindingList<T>>) -> Self {
        Self::Binding(list)
    }
}

impl<T: Send + Sync + 'static> From<Arc<PolledList<T>>> for CollectionSource<T> {
    fn from(list: Arc<PolledList<T>>) -> Self {
        Self::Polled(list)
    }
}

impl<T: Send + Sync + 'static> CollectionSource<T> {
    /// Current items.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        match self {
            Self::Observable(list) => list.items(),
            Self::Binding(list) => list.items(),
            Self::Polled(list) => list.snapshot(),
        }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        match self {
            Self::Observable(list) => list.len(),
            Self::Binding(list) => list.len(),
            Self::Polled(list) => list.len(),
        }
    }

    /// Returns `true` if the source is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Version stamp for polled sources; `None` for notifying sources.
    pub fn version(&self) -> Option<u64> {
        match self {
            Self::Polled(list) => Some(list.version()),
            _ => None,
        }
    }

    /// Whether the view may append items.
    pub fn can_insert(&self) -> bool {
        match self {
            Self::Observable(list) => !list.is_fixed_size(),
            Self::Binding(list) => list.allow_new(),
            Self::Polled(list) => !list.is_fixed_size(),
        }
    }

    /// Whether the view may remove items.
    pub fn can_remove(&self) -> bool {
        match self {
            Self::Observable(list) => !list.is_fixed_size(),
            Self::Binding(list) => list.allow_remove(),
            Self::Polled(list) => !list.is_fixed_size(),
        }
    }

    /// Whether the source creates new items itself.
    pub fn creates_items(&self) -> bool {
        matches!(self, Self::Binding(list) if list.allow_new())
    }

    /// Asks a binding list for a new pending item.
    pub(crate) fn add_new_from_source(&self) -> Option<Arc<T>> {
        match self {
            Self::Binding(list) => list.add_new(),
            _ => None,
        }
    }

    /// Appends an item.
    pub(crate) fn push(&self, item: Arc<T>) -> bool {
        match self {
            Self::Observable(list) => {
                list.push(item);
                true
            }
            Self::Binding(list) => {
                list.push(item);
                true
            }
            Self::Polled(list) => list.push(item),
        }
    }

    /// Removes an item by identity.
    pub(crate) fn remove_item(&self, item: &Arc<T>) -> bool {
        match self {
            Self::Observable(list) => list.remove_item(item).is_some(),
            Self::Binding(list) => list.remove_item(item).is_some(),
            Self::Polled(list) => list.remove_item(item),
        }
    }

    /// Commits a pending binding-list item.
    pub(crate) fn end_new(&self, item: &Arc<T>) {
        if let Self::Binding(list) = self {
            list.end_new(item);
        }
    }

    /// Discards a new item: binding lists drop their pending item, other
    /// sources remove it.
    pub(crate) fn cancel_new(&self, item: &Arc<T>) -> bool {
        match self {
            Self::Binding(list) => list.cancel_new(item) || list.remove_item(item).is_some(),
            _ => self.remove_item(item),
        }
    }

    /// Forwards every change as a [`SourceDelta`] until the subscription
    /// drops. Polled sources produce no deltas.
    pub fn subscribe<F>(&self, handler: F) -> SourceSubscription<T>
    where
        F: Fn(SourceDelta<T>) + Send + Sync + 'static,
    {
        let connection = match self {
            Self::Observable(list) => Some(
                list.collection_changed
                    .connect(move |change| handler(change.clone().into())),
            ),
            Self::Binding(list) => Some(
                list.list_changed
                    .connect(move |change| handler(change.clone().into())),
            ),
            Self::Polled(_) => None,
        };
        SourceSubscription {
            source: self.clone(),
            connection,
        }
    }
}

/// Keeps a source subscription alive; disconnects on drop.
pub struct SourceSubscription<T: Send + Sync + 'static> {
    source: CollectionSource<T>,
    connection: Option<ConnectionId>,
}

impl<T: Send + Sync + 'static> Drop for SourceSubscription<T> {
    fn drop(&mut self) {
        let Some(id) = self.connection.take() else {
            return;
        };
        match &self.source {
            CollectionSource::Observable(list) => {
                list.collection_changed.disconnect(id);
            }
            CollectionSource::Binding(list) => {
                list.list_changed.disconnect(id);
            }
            CollectionSource::Polled(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_subscription_normalizes_and_disconnects() {
        let list = Arc::new(ObservableList::new(vec![1, 2]));
        let source = CollectionSource::from(list.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let recv = seen.clone();
        let subscription = source.subscribe(move |delta| recv.lock().push(format!("{delta:?}")));
        list.push(3);
        list.move_item(0, 1);
        assert_eq!(list.collection_changed.connection_count(), 1);

        drop(subscription);
        assert_eq!(list.collection_changed.connection_count(), 0);
        list.push(4);

        assert_eq!(*seen.lock(), vec!["Added(2, 1 items)", "Moved(0 -> 1)"]);
    }

    #[test]
    fn test_binding_item_changed_maps() {
        let list = Arc::new(BindingList::new(vec!["a".to_string()]));
        let source = CollectionSource::from(list.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let recv = seen.clone();
        let _subscription = source.subscribe(move |delta| recv.lock().push(format!("{delta:?}")));
        list.notify_item_changed(0);
        assert_eq!(*seen.lock(), vec!["ItemChanged(0)"]);
        assert!(!source.creates_items());
    }

    #[test]
    fn test_polled_version_moves() {
        let list = Arc::new(PolledList::new(vec![1, 2, 3]));
        let source = CollectionSource::from(list.clone());
        let before = source.version();
        list.remove(0);
        assert_ne!(source.version(), before);
        assert_eq!(source.len(), 2);
        assert!(source.push(Arc::new(9)));
        assert_eq!(source.snapshot().last().map(|x| **x), Some(9));
    }
}
