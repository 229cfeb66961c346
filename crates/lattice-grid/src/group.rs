//! Grouping engine.
//!
//! A [`GroupRoot`] partitions a flat, already filtered and sorted item
//! sequence into a tree: one level per [`GroupDescription`], leaf items in
//! the bottom groups. Leaves keep the order of the flat sequence, so walking
//! the tree depth-first yields the display order of a grouped view.

use std::fmt;
use std::sync::Arc;

use lattice_grid_core::logging::{span_names, targets};
use lattice_grid_core::PerfSpan;

use crate::accessor::{resolve_path, DataItem};
use crate::culture::Culture;
use crate::sort::SortDirection;
use crate::value::{compare_for_sort, values_equal, Value};

/// Computes a group key from an item.
pub type GroupKeyFn<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;

/// Where a group key comes from.
pub enum GroupKey<T> {
    /// A dotted property path.
    PropertyPath(String),
    /// A key selector closure.
    Selector(GroupKeyFn<T>),
}

impl<T> Clone for GroupKey<T> {
    fn clone(&self) -> Self {
        match self {
            GroupKey::PropertyPath(path) => GroupKey::PropertyPath(path.clone()),
            GroupKey::Selector(selector) => GroupKey::Selector(selector.clone()),
        }
    }
}

/// One grouping level.
pub struct GroupDescription<T> {
    key: GroupKey<T>,
    sort: Option<SortDirection>,
}

impl<T> GroupDescription<T> {
    /// Groups by a property path.
    pub fn by_path(path: impl Into<String>) -> Self {
        Self {
            key: GroupKey::PropertyPath(path.into()),
            sort: None,
        }
    }

    /// Groups by a key selector.
    pub fn by_selector<F>(selector: F) -> Self
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        Self {
            key: GroupKey::Selector(Arc::new(selector)),
            sort: None,
        }
    }

    /// Orders the groups of this level by key. Without it groups appear in
    /// the order their first item appears.
    pub fn with_sort(mut self, direction: SortDirection) -> Self {
        self.sort = Some(direction);
        self
    }

    /// The key source.
    pub fn key(&self) -> &GroupKey<T> {
        &self.key
    }

    /// The group order, if any.
    pub fn sort(&self) -> Option<SortDirection> {
        self.sort
    }
}

impl<T: DataItem> GroupDescription<T> {
    /// Computes the group key of `item`; missing values group under
    /// [`Value::None`].
    pub fn key_for(&self, item: &T) -> Value {
        match &self.key {
            GroupKey::PropertyPath(path) => resolve_path(item, path).unwrap_or_default(),
            GroupKey::Selector(selector) => selector(item),
        }
    }
}

impl<T> Clone for GroupDescription<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            sort: self.sort,
        }
    }
}

impl<T> PartialEq for GroupDescription<T> {
    fn eq(&self, other: &Self) -> bool {
        let same_key = match (&self.key, &other.key) {
            (GroupKey::PropertyPath(a), GroupKey::PropertyPath(b)) => a == b,
            (GroupKey::Selector(a), GroupKey::Selector(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        same_key && self.sort == other.sort
    }
}

impl<T> fmt::Debug for GroupDescription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match &self.key {
            GroupKey::PropertyPath(path) => path.as_str(),
            GroupKey::Selector(_) => "<selector>",
        };
        f.debug_struct("GroupDescription")
            .field("key", &key)
            .field("sort", &self.sort)
            .finish()
    }
}

/// An entry of a group: a nested group or a leaf item.
pub enum GroupEntry<T> {
    /// A subgroup.
    Group(CollectionGroup<T>),
    /// A leaf item.
    Item(Arc<T>),
}

impl<T> Clone for GroupEntry<T> {
    fn clone(&self) -> Self {
        match self {
            GroupEntry::Group(group) => GroupEntry::Group(group.clone()),
            GroupEntry::Item(item) => GroupEntry::Item(item.clone()),
        }
    }
}

/// A node of the group tree.
pub struct CollectionGroup<T> {
    key: Value,
    level: usize,
    entries: Vec<GroupEntry<T>>,
    item_count: usize,
}

impl<T> Clone for CollectionGroup<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            level: self.level,
            entries: self.entries.clone(),
            item_count: self.item_count,
        }
    }
}

impl<T> fmt::Debug for CollectionGroup<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionGroup")
            .field("key", &self.key)
            .field("level", &self.level)
            .field("item_count", &self.item_count)
            .field("groups", &self.subgroups().count())
            .finish()
    }
}

type LevelKey = (Value, Option<SortDirection>);

impl<T> CollectionGroup<T> {
    fn new(key: Value, level: usize) -> Self {
        Self {
            key,
            level,
            entries: Vec::new(),
            item_count: 0,
        }
    }

    /// The group key. The root's key is [`Value::None`].
    pub fn key(&self) -> &Value {
        &self.key
    }

    /// Depth in the tree; the root is level 0.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Entries in display order.
    pub fn entries(&self) -> &[GroupEntry<T>] {
        &self.entries
    }

    /// Number of leaf items below this group.
    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Direct subgroups.
    pub fn subgroups(&self) -> impl Iterator<Item = &CollectionGroup<T>> {
        self.entries.iter().filter_map(|entry| match entry {
            GroupEntry::Group(group) => Some(group),
            GroupEntry::Item(_) => None,
        })
    }

    /// Returns `true` if the group holds items rather than subgroups.
    pub fn is_bottom_level(&self) -> bool {
        !self.entries.iter().any(|entry| matches!(entry, GroupEntry::Group(_)))
    }

    /// Leaf items in display order.
    pub fn leaves(&self) -> Vec<Arc<T>> {
        let mut out = Vec::with_capacity(self.item_count);
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves(&self, out: &mut Vec<Arc<T>>) {
        for entry in &self.entries {
            match entry {
                GroupEntry::Group(group) => group.collect_leaves(out),
                GroupEntry::Item(item) => out.push(item.clone()),
            }
        }
    }

    /// The leaf at a depth-first position.
    pub fn leaf_at(&self, mut index: usize) -> Option<&Arc<T>> {
        for entry in &self.entries {
            match entry {
                GroupEntry::Item(item) => {
                    if index == 0 {
                        return Some(item);
                    }
                    index -= 1;
                }
                GroupEntry::Group(group) => {
                    if index < group.item_count {
                        return group.leaf_at(index);
                    }
                    index -= group.item_count;
                }
            }
        }
        None
    }

    /// Depth-first position of a leaf, by reference identity.
    pub fn leaf_index_of(&self, item: &Arc<T>) -> Option<usize> {
        let mut offset = 0;
        for entry in &self.entries {
            match entry {
                GroupEntry::Item(leaf) => {
                    if Arc::ptr_eq(leaf, item) {
                        return Some(offset);
                    }
                    offset += 1;
                }
                GroupEntry::Group(group) => {
                    if let Some(index) = group.leaf_index_of(item) {
                        return Some(offset + index);
                    }
                    offset += group.item_count;
                }
            }
        }
        None
    }

    fn first_item_entry(&self) -> usize {
        self.entries
            .iter()
            .position(|entry| matches!(entry, GroupEntry::Item(_)))
            .unwrap_or(self.entries.len())
    }

    fn insert_leaf(
        &mut self,
        item: Arc<T>,
        keys: &[LevelKey],
        rank: Option<&dyn Fn(&Arc<T>) -> usize>,
        culture: &Culture,
    ) {
        self.item_count += 1;
        let Some(((key, sort), rest)) = keys.split_first() else {
            let position = match rank {
                Some(rank) => {
                    let target = rank(&item);
                    self.entries
                        .iter()
                        .position(|entry| matches!(entry, GroupEntry::Item(leaf) if rank(leaf) > target))
                        .unwrap_or(self.entries.len())
                }
                None => self.entries.len(),
            };
            self.entries.insert(position, GroupEntry::Item(item));
            return;
        };

        let existing = self.entries.iter().position(
            |entry| matches!(entry, GroupEntry::Group(group) if values_equal(&group.key, key)),
        );
        let index = match existing {
            Some(index) => index,
            None => {
                let end = self.first_item_entry();
                let index = match sort {
                    Some(direction) => self.entries[..end]
                        .iter()
                        .position(|entry| match entry {
                            GroupEntry::Group(group) => {
                                direction.apply(compare_for_sort(&group.key, key, culture))
                                    == std::cmp::Ordering::Greater
                            }
                            GroupEntry::Item(_) => false,
                        })
                        .unwrap_or(end),
                    None => end,
                };
                tracing::trace!(target: targets::GROUPING, level = self.level + 1, key = %key, "created group");
                self.entries
                    .insert(index, GroupEntry::Group(CollectionGroup::new(key.clone(), self.level + 1)));
                index
            }
        };
        if let GroupEntry::Group(group) = &mut self.entries[index] {
            group.insert_leaf(item, rest, rank, culture);
        }
    }

    fn remove_leaf(&mut self, item: &Arc<T>) -> bool {
        let mut found = None;
        for (index, entry) in self.entries.iter_mut().enumerate() {
            let hit = match entry {
                GroupEntry::Item(leaf) => Arc::ptr_eq(leaf, item).then_some(true),
                GroupEntry::Group(group) => group.remove_leaf(item).then(|| group.item_count == 0),
            };
            if let Some(drop_entry) = hit {
                found = Some((index, drop_entry));
                break;
            }
        }
        match found {
            Some((index, drop_entry)) => {
                if drop_entry {
                    self.entries.remove(index);
                }
                self.item_count -= 1;
                true
            }
            None => false,
        }
    }
}

/// Root of a group tree built from a set of group descriptions.
pub struct GroupRoot<T> {
    descriptions: Vec<GroupDescription<T>>,
    culture: Culture,
    root: CollectionGroup<T>,
}

impl<T> fmt::Debug for GroupRoot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupRoot")
            .field("descriptions", &self.descriptions)
            .field("root", &self.root)
            .finish()
    }
}

impl<T: DataItem> GroupRoot<T> {
    /// Creates an empty root.
    pub fn new(descriptions: Vec<GroupDescription<T>>, culture: Culture) -> Self {
        Self {
            descriptions,
            culture,
            root: CollectionGroup::new(Value::None, 0),
        }
    }

    fn keys_for(&self, item: &T) -> Vec<LevelKey> {
        self.descriptions
            .iter()
            .map(|description| (description.key_for(item), description.sort))
            .collect()
    }

    /// Rebuilds the tree from a flat sequence.
    pub fn build(&mut self, items: &[Arc<T>]) {
        let _span = PerfSpan::with_items(span_names::GROUP, items.len());
        self.root = CollectionGroup::new(Value::None, 0);
        for item in items {
            let keys = self.keys_for(item);
            self.root.insert_leaf(item.clone(), &keys, None, &self.culture);
        }
        tracing::debug!(
            target: targets::GROUPING,
            items = items.len(),
            groups = self.root.subgroups().count(),
            "rebuilt group tree"
        );
    }

    /// Inserts one item into its groups without a rebuild.
    ///
    /// `rank` gives each item's position in the flat sequence; the new leaf
    /// goes before the first sibling that ranks after it.
    pub fn add_to_subgroups(&mut self, item: Arc<T>, rank: &dyn Fn(&Arc<T>) -> usize) {
        let keys = self.keys_for(&item);
        // Pending special items stay at the end of the root.
        self.root.insert_leaf(item, &keys, Some(rank), &self.culture);
    }

    /// Removes one item, pruning groups that become empty.
    pub fn remove_from_subgroups(&mut self, item: &Arc<T>) -> bool {
        self.root.remove_leaf(item)
    }

    /// Appends an item at the root level, outside every group.
    pub fn insert_special(&mut self, item: Arc<T>) {
        self.root.item_count += 1;
        self.root.entries.push(GroupEntry::Item(item));
    }

    /// Removes an item previously added with [`insert_special`](Self::insert_special).
    pub fn remove_special(&mut self, item: &Arc<T>) -> bool {
        let position = self
            .root
            .entries
            .iter()
            .position(|entry| matches!(entry, GroupEntry::Item(leaf) if Arc::ptr_eq(leaf, item)));
        match position {
            Some(index) => {
                self.root.entries.remove(index);
                self.root.item_count -= 1;
                true
            }
            None => false,
        }
    }
}

impl<T> GroupRoot<T> {
    /// The group descriptions.
    pub fn descriptions(&self) -> &[GroupDescription<T>] {
        &self.descriptions
    }

    /// The root node.
    pub fn root(&self) -> &CollectionGroup<T> {
        &self.root
    }

    /// Top-level groups.
    pub fn groups(&self) -> impl Iterator<Item = &CollectionGroup<T>> {
        self.root.subgroups()
    }

    /// Number of leaves, special items included.
    pub fn item_count(&self) -> usize {
        self.root.item_count
    }

    /// Leaf at a display position.
    pub fn leaf_at(&self, index: usize) -> Option<&Arc<T>> {
        self.root.leaf_at(index)
    }

    /// Display position of a leaf.
    pub fn leaf_index_of(&self, item: &Arc<T>) -> Option<usize> {
        self.root.leaf_index_of(item)
    }

    /// All leaves in display order.
    pub fn leaves(&self) -> Vec<Arc<T>> {
        self.root.leaves()
    }
}
