//! Configuration for views and adapters.

use std::fmt;
use std::sync::Arc;

use crate::culture::{Culture, StringComparison};

/// Creates new items for [`CollectionView::add_new`](crate::CollectionView::add_new).
pub type ItemFactory<T> = Arc<dyn Fn() -> Arc<T> + Send + Sync>;

/// Construction options for a [`CollectionView`](crate::CollectionView).
///
/// # Example
///
/// ```
/// use lattice_grid::{Culture, ViewOptions};
///
/// struct Row;
///
/// let options = ViewOptions::<Row>::default()
///     .with_culture(Culture::new("sv-SE"))
///     .with_page_size(25);
/// assert_eq!(options.page_size, 25);
/// ```
pub struct ViewOptions<T> {
    /// Culture for string sorting.
    pub culture: Culture,
    /// Skip sorting on refresh; the source is already in sort order.
    pub source_is_sorted: bool,
    /// Initial page size; 0 disables paging.
    pub page_size: usize,
    /// Factory used by `add_new`.
    pub item_factory: Option<ItemFactory<T>>,
}

impl<T> Default for ViewOptions<T> {
    fn default() -> Self {
        Self {
            culture: Culture::invariant(),
            source_is_sorted: false,
            page_size: 0,
            item_factory: None,
        }
    }
}

impl<T> ViewOptions<T> {
    /// Sets the culture.
    pub fn with_culture(mut self, culture: Culture) -> Self {
        self.culture = culture;
        self
    }

    /// Marks the source as pre-sorted.
    pub fn with_source_sorted(mut self, sorted: bool) -> Self {
        self.source_is_sorted = sorted;
        self
    }

    /// Sets the initial page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the item factory.
    pub fn with_item_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        self.item_factory = Some(Arc::new(factory));
        self
    }
}

impl<T> Clone for ViewOptions<T> {
    fn clone(&self) -> Self {
        Self {
            culture: self.culture.clone(),
            source_is_sorted: self.source_is_sorted,
            page_size: self.page_size,
            item_factory: self.item_factory.clone(),
        }
    }
}

impl<T> fmt::Debug for ViewOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewOptions")
            .field("culture", &self.culture)
            .field("source_is_sorted", &self.source_is_sorted)
            .field("page_size", &self.page_size)
            .field("item_factory", &self.item_factory.is_some())
            .finish()
    }
}

/// Options shared by the sorting and filtering adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterOptions {
    /// Accessors-only mode: never fall back to property-path lookup.
    pub fast_path: bool,
    /// In fast-path mode, fail with `Error::MissingAccessor` instead of
    /// skipping a column that has no accessor.
    pub throw_on_missing_accessor: bool,
    /// Toggling a column adds to the existing sort instead of replacing it.
    pub multi_sort: bool,
    /// Comparison used by string filter operators unless a descriptor
    /// overrides it.
    pub string_comparison: StringComparison,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            fast_path: false,
            throw_on_missing_accessor: false,
            multi_sort: true,
            string_comparison: StringComparison::OrdinalIgnoreCase,
        }
    }
}

impl AdapterOptions {
    /// Enables or disables accessors-only mode.
    pub fn with_fast_path(mut self, fast_path: bool) -> Self {
        self.fast_path = fast_path;
        self
    }

    /// Fails on missing accessors in fast-path mode.
    pub fn with_throw_on_missing_accessor(mut self, throw: bool) -> Self {
        self.throw_on_missing_accessor = throw;
        self
    }

    /// Enables or disables multi-column sorting.
    pub fn with_multi_sort(mut self, multi_sort: bool) -> Self {
        self.multi_sort = multi_sort;
        self
    }

    /// Sets the default string comparison.
    pub fn with_string_comparison(mut self, comparison: StringComparison) -> Self {
        self.string_comparison = comparison;
        self
    }
}
