//! Column definitions shared by the adapters.

use std::fmt;
use std::sync::Arc;

use crate::accessor::{SharedAccessor, ValueAccessor};
use crate::sort::ItemComparer;
use crate::view::FilterFn;

use super::filtering::FilterDescriptor;

/// Builds a predicate for a filter descriptor on one column. Returning
/// `None` lets the next resolution step handle the descriptor.
pub type PredicateFactory<T> = Arc<dyn Fn(&FilterDescriptor<T>) -> Option<FilterFn<T>> + Send + Sync>;

/// How one column reads, sorts and filters its values.
///
/// Everything is optional; a bare column resolves its values through the
/// property path named by its id.
pub struct ColumnDefinition<T> {
    column_id: String,
    accessor: Option<SharedAccessor<T>>,
    property_path: Option<String>,
    comparer: Option<ItemComparer<T>>,
    predicate_factory: Option<PredicateFactory<T>>,
}

impl<T> ColumnDefinition<T> {
    pub fn new(column_id: impl Into<String>) -> Self {
        Self {
            column_id: column_id.into(),
            accessor: None,
            property_path: None,
            comparer: None,
            predicate_factory: None,
        }
    }

    /// Sets a typed accessor.
    pub fn with_accessor(mut self, accessor: impl ValueAccessor<T> + 'static) -> Self {
        self.accessor = Some(Arc::new(accessor));
        self
    }

    /// Sets an already shared accessor.
    pub fn with_shared_accessor(mut self, accessor: SharedAccessor<T>) -> Self {
        self.accessor = Some(accessor);
        self
    }

    /// Sets the property path used when no accessor is configured.
    pub fn with_property_path(mut self, path: impl Into<String>) -> Self {
        self.property_path = Some(path.into());
        self
    }

    /// Sets a comparer that replaces value comparison when sorting.
    pub fn with_comparer<F>(mut self, comparer: F) -> Self
    where
        F: Fn(&T, &T) -> Result<std::cmp::Ordering, String> + Send + Sync + 'static,
    {
        self.comparer = Some(Arc::new(comparer));
        self
    }

    /// Sets a factory that builds this column's filter predicates.
    pub fn with_predicate_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&FilterDescriptor<T>) -> Option<FilterFn<T>> + Send + Sync + 'static,
    {
        self.predicate_factory = Some(Arc::new(factory));
        self
    }

    pub fn column_id(&self) -> &str {
        &self.column_id
    }

    pub fn accessor(&self) -> Option<&SharedAccessor<T>> {
        self.accessor.as_ref()
    }

    pub fn property_path(&self) -> Option<&str> {
        self.property_path.as_deref()
    }

    pub fn comparer(&self) -> Option<&ItemComparer<T>> {
        self.comparer.as_ref()
    }

    pub fn predicate_factory(&self) -> Option<&PredicateFactory<T>> {
        self.predicate_factory.as_ref()
    }
}

impl<T> Clone for ColumnDefinition<T> {
    fn clone(&self) -> Self {
        Self {
            column_id: self.column_id.clone(),
            accessor: self.accessor.clone(),
            property_path: self.property_path.clone(),
            comparer: self.comparer.clone(),
            predicate_factory: self.predicate_factory.clone(),
        }
    }
}

impl<T> fmt::Debug for ColumnDefinition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDefinition")
            .field("column_id", &self.column_id)
            .field("accessor", &self.accessor.is_some())
            .field("property_path", &self.property_path)
            .field("comparer", &self.comparer.is_some())
            .field("predicate_factory", &self.predicate_factory.is_some())
            .finish()
    }
}

/// Finds a column by id.
pub(crate) fn find_column<'a, T>(columns: &'a [ColumnDefinition<T>], column_id: &str) -> Option<&'a ColumnDefinition<T>> {
    columns.iter().find(|column| column.column_id == column_id)
}

/// Address of a shared object, used as its identity in cache keys.
pub(crate) fn identity<U: ?Sized>(shared: &Arc<U>) -> usize {
    Arc::as_ptr(shared) as *const () as usize
}
