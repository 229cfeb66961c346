//! Sort descriptions and the multi-key comparer.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use lattice_grid_core::logging::{span_names, targets};
use lattice_grid_core::PerfSpan;

use crate::accessor::{resolve_path, DataItem, SharedAccessor};
use crate::culture::Culture;
use crate::error::{Error, Result};
use crate::value::{compare_for_sort, Value};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

impl SortDirection {
    /// Returns the opposite direction.
    pub fn reversed(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    /// Applies the direction to an ascending comparison result.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// A fallible item comparer. `Err` means the comparison could not be made.
pub type ItemComparer<T> = Arc<dyn Fn(&T, &T) -> std::result::Result<Ordering, String> + Send + Sync>;

/// What a sort description orders by.
pub enum SortKey<T> {
    /// A dotted property path resolved through [`DataItem::property`].
    PropertyPath(String),
    /// A typed accessor.
    Accessor(SharedAccessor<T>),
    /// A custom comparer over whole items.
    Comparer(ItemComparer<T>),
}

impl<T> Clone for SortKey<T> {
    fn clone(&self) -> Self {
        match self {
            SortKey::PropertyPath(path) => SortKey::PropertyPath(path.clone()),
            SortKey::Accessor(accessor) => SortKey::Accessor(accessor.clone()),
            SortKey::Comparer(comparer) => SortKey::Comparer(comparer.clone()),
        }
    }
}

impl<T> PartialEq for SortKey<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SortKey::PropertyPath(a), SortKey::PropertyPath(b)) => a == b,
            (SortKey::Accessor(a), SortKey::Accessor(b)) => Arc::ptr_eq(a, b),
            (SortKey::Comparer(a), SortKey::Comparer(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<T> fmt::Debug for SortKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::PropertyPath(path) => f.debug_tuple("PropertyPath").field(path).finish(),
            SortKey::Accessor(_) => f.write_str("Accessor"),
            SortKey::Comparer(_) => f.write_str("Comparer"),
        }
    }
}

/// One key of a multi-key sort.
pub struct SortDescription<T> {
    key: SortKey<T>,
    direction: SortDirection,
    culture: Option<Culture>,
    column_id: Option<String>,
}

impl<T> SortDescription<T> {
    /// Creates a description from a key and direction.
    pub fn new(key: SortKey<T>, direction: SortDirection) -> Self {
        Self {
            key,
            direction,
            culture: None,
            column_id: None,
        }
    }

    /// Sorts by a property path.
    pub fn by_path(path: impl Into<String>, direction: SortDirection) -> Self {
        Self::new(SortKey::PropertyPath(path.into()), direction)
    }

    /// Sorts by a typed accessor.
    pub fn by_accessor(accessor: SharedAccessor<T>, direction: SortDirection) -> Self {
        Self::new(SortKey::Accessor(accessor), direction)
    }

    /// Sorts with a custom comparer.
    pub fn by_comparer<F>(comparer: F, direction: SortDirection) -> Self
    where
        F: Fn(&T, &T) -> std::result::Result<Ordering, String> + Send + Sync + 'static,
    {
        Self::new(SortKey::Comparer(Arc::new(comparer)), direction)
    }

    /// Overrides the view culture for this key.
    pub fn with_culture(mut self, culture: Culture) -> Self {
        self.culture = Some(culture);
        self
    }

    /// Tags the description with the column it came from.
    pub fn with_column_id(mut self, column_id: impl Into<String>) -> Self {
        self.column_id = Some(column_id.into());
        self
    }

    /// The sort key.
    pub fn key(&self) -> &SortKey<T> {
        &self.key
    }

    /// The direction.
    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    /// The culture override, if any.
    pub fn culture(&self) -> Option<&Culture> {
        self.culture.as_ref()
    }

    /// The column tag, if any.
    pub fn column_id(&self) -> Option<&str> {
        self.column_id.as_deref()
    }

    /// The property path, for path keys.
    pub fn property_path(&self) -> Option<&str> {
        match &self.key {
            SortKey::PropertyPath(path) => Some(path),
            _ => None,
        }
    }
}

impl<T> Clone for SortDescription<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            direction: self.direction,
            culture: self.culture.clone(),
            column_id: self.column_id.clone(),
        }
    }
}

impl<T> PartialEq for SortDescription<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.direction == other.direction
            && self.culture == other.culture
            && self.column_id == other.column_id
    }
}

impl<T> fmt::Debug for SortDescription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortDescription")
            .field("key", &self.key)
            .field("direction", &self.direction)
            .field("column_id", &self.column_id)
            .finish()
    }
}

/// Compares items key by key until one differs.
///
/// A failing custom comparer counts as "equal" for the pair and is recorded;
/// the first failure is reported by [`MergedComparer::take_failure`].
pub(crate) struct MergedComparer<'a, T> {
    descriptions: &'a [SortDescription<T>],
    culture: &'a Culture,
    failure: RefCell<Option<(usize, String)>>,
}

impl<'a, T: DataItem> MergedComparer<'a, T> {
    pub(crate) fn new(descriptions: &'a [SortDescription<T>], culture: &'a Culture) -> Self {
        Self {
            descriptions,
            culture,
            failure: RefCell::new(None),
        }
    }

    fn key_value(description: &SortDescription<T>, item: &T) -> Value {
        match &description.key {
            SortKey::PropertyPath(path) => resolve_path(item, path).unwrap_or_default(),
            SortKey::Accessor(accessor) => accessor.get(item),
            SortKey::Comparer(_) => Value::None,
        }
    }

    pub(crate) fn compare(&self, a: &T, b: &T) -> Ordering {
        for (index, description) in self.descriptions.iter().enumerate() {
            let ordering = match &description.key {
                SortKey::Comparer(comparer) => match comparer(a, b) {
                    Ok(ordering) => ordering,
                    Err(message) => {
                        self.failure.borrow_mut().get_or_insert((index, message));
                        Ordering::Equal
                    }
                },
                _ => {
                    let culture = description.culture.as_ref().unwrap_or(self.culture);
                    compare_for_sort(
                        &Self::key_value(description, a),
                        &Self::key_value(description, b),
                        culture,
                    )
                }
            };
            let ordering = description.direction.apply(ordering);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    pub(crate) fn take_failure(&self) -> Option<(usize, String)> {
        self.failure.borrow_mut().take()
    }

    /// Logs a recorded comparer failure. Returns whether there was one.
    pub(crate) fn warn_on_failure(&self, operation: &'static str) -> bool {
        let Some((key, message)) = self.take_failure() else {
            return false;
        };
        tracing::warn!(target: targets::VIEW, key, %message, operation, "comparer failed");
        true
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "comparer panicked".to_owned())
}

/// Stable multi-key sort.
///
/// On failure `items` is left in its incoming order and
/// [`Error::SortFailed`] names the failing key.
pub(crate) fn sort_items<T: DataItem>(
    items: &mut Vec<Arc<T>>,
    descriptions: &[SortDescription<T>],
    culture: &Culture,
) -> Result<()> {
    if descriptions.is_empty() || items.len() < 2 {
        return Ok(());
    }
    let _span = PerfSpan::with_items(span_names::SORT, items.len());

    let comparer = MergedComparer::new(descriptions, culture);
    let mut sorted = items.clone();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        sorted.sort_by(|a, b| comparer.compare(a, b));
    }));

    let failure = match outcome {
        Ok(()) => comparer.take_failure(),
        Err(payload) => Some((0, panic_message(payload.as_ref()))),
    };
    if let Some((key, message)) = failure {
        tracing::warn!(target: targets::VIEW, key, %message, "sort failed, keeping unsorted order");
        return Err(Error::SortFailed { key, message });
    }
    *items = sorted;
    Ok(())
}

/// Upper-bound insertion index of `item` in a slice sorted by `descriptions`.
///
/// Items comparing equal to `item` stay before it, which keeps inserts stable.
/// When a comparer fails the item goes to the end.
pub(crate) fn find_insert_index<T: DataItem>(
    items: &[Arc<T>],
    item: &T,
    descriptions: &[SortDescription<T>],
    culture: &Culture,
) -> usize {
    if descriptions.is_empty() {
        return items.len();
    }
    let comparer = MergedComparer::new(descriptions, culture);
    let index = items.partition_point(|probe| comparer.compare(probe, item) != Ordering::Greater);
    if comparer.warn_on_failure("insert") {
        return items.len();
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::FnAccessor;

    #[derive(Debug)]
    struct Row {
        name: &'static str,
        rank: i32,
    }

    impl DataItem for Row {
        fn property(&self, name: &str) -> Option<Value> {
            match name {
                "name" => Some(self.name.into()),
                "rank" => Some(self.rank.into()),
                _ => None,
            }
        }
    }

    fn rows(data: &[(&'static str, i32)]) -> Vec<Arc<Row>> {
        data.iter()
            .map(|&(name, rank)| Arc::new(Row { name, rank }))
            .collect()
    }

    fn names(items: &[Arc<Row>]) -> Vec<&'static str> {
        items.iter().map(|row| row.name).collect()
    }

    #[test]
    fn multi_key_sort_is_stable() {
        let mut items = rows(&[("d", 2), ("a", 1), ("c", 2), ("b", 1)]);
        let descriptions = vec![SortDescription::by_path("rank", SortDirection::Descending)];
        sort_items(&mut items, &descriptions, &Culture::invariant()).unwrap();
        assert_eq!(names(&items), vec!["d", "c", "a", "b"]);

        let descriptions = vec![
            SortDescription::by_path("rank", SortDirection::Ascending),
            SortDescription::by_accessor(
                FnAccessor::new(|row: &Row| row.name.into()).shared(),
                SortDirection::Ascending,
            ),
        ];
        sort_items(&mut items, &descriptions, &Culture::invariant()).unwrap();
        assert_eq!(names(&items), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn strings_use_culture() {
        let mut items = rows(&[("Zebra", 0), ("apple", 0), ("Mango", 0)]);
        let descriptions = vec![SortDescription::by_path("name", SortDirection::Ascending)];
        sort_items(&mut items, &descriptions, &Culture::invariant()).unwrap();
        assert_eq!(names(&items), vec!["apple", "Mango", "Zebra"]);

        sort_items(&mut items, &descriptions, &Culture::ordinal()).unwrap();
        assert_eq!(names(&items), vec!["Mango", "Zebra", "apple"]);
    }

    #[test]
    fn failing_comparer_leaves_order_untouched() {
        let mut items = rows(&[("b", 0), ("a", 0), ("c", 0)]);
        let descriptions = vec![
            SortDescription::by_path("rank", SortDirection::Ascending),
            SortDescription::by_comparer(
                |a: &Row, _: &Row| {
                    if a.name == "a" {
                        Err("cannot compare a".to_string())
                    } else {
                        Ok(Ordering::Equal)
                    }
                },
                SortDirection::Ascending,
            ),
        ];
        let err = sort_items(&mut items, &descriptions, &Culture::invariant()).unwrap_err();
        assert_eq!(
            err,
            Error::SortFailed {
                key: 1,
                message: "cannot compare a".into()
            }
        );
        assert_eq!(names(&items), vec!["b", "a", "c"]);
    }

    #[test]
    fn panicking_comparer_is_contained() {
        let mut items = rows(&[("b", 0), ("a", 0)]);
        let descriptions = vec![SortDescription::by_comparer(
            |_: &Row, _: &Row| -> std::result::Result<Ordering, String> { panic!("bad comparer") },
            SortDirection::Ascending,
        )];
        let err = sort_items(&mut items, &descriptions, &Culture::invariant()).unwrap_err();
        assert!(matches!(err, Error::SortFailed { ref message, .. } if message == "bad comparer"));
        assert_eq!(names(&items), vec!["b", "a"]);
    }

    #[test]
    fn insert_index_is_upper_bound() {
        let items = rows(&[("a", 1), ("b", 2), ("c", 2), ("d", 5)]);
        let descriptions = vec![SortDescription::by_path("rank", SortDirection::Ascending)];
        let culture = Culture::invariant();
        assert_eq!(find_insert_index(&items, &Row { name: "x", rank: 2 }, &descriptions, &culture), 3);
        assert_eq!(find_insert_index(&items, &Row { name: "x", rank: 0 }, &descriptions, &culture), 0);
        assert_eq!(find_insert_index(&items, &Row { name: "x", rank: 9 }, &descriptions, &culture), 4);
        assert_eq!(find_insert_index(&items, &Row { name: "x", rank: 9 }, &[], &culture), 4);
    }

    #[test]
    fn failing_comparer_inserts_at_end() {
        let items = rows(&[("a", 1), ("b", 2), ("c", 3)]);
        let descriptions = vec![SortDescription::by_comparer(
            |a: &Row, b: &Row| {
                if a.name == "x" || b.name == "x" {
                    Err("x is not comparable".to_string())
                } else {
                    Ok(a.rank.cmp(&b.rank))
                }
            },
            SortDirection::Ascending,
        )];
        let culture = Culture::invariant();
        assert_eq!(find_insert_index(&items, &Row { name: "x", rank: 0 }, &descriptions, &culture), 3);
        assert_eq!(find_insert_index(&items, &Row { name: "y", rank: 0 }, &descriptions, &culture), 0);
    }
}
