//! Column filters bound to a view.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use lattice_grid_core::logging::targets;
use lattice_grid_core::{ConnectionId, Signal, SuppressFlag};

use crate::accessor::{DataItem, PropertyPathAccessor, SharedAccessor};
use crate::culture::{Culture, StringComparison};
use crate::error::{Error, Result};
use crate::options::AdapterOptions;
use crate::value::Value;
use crate::view::{CollectionView, FilterFn};

use super::column::{find_column, identity, ColumnDefinition};
use super::predicate::{evaluate, FilterOperator, PredicateCache, PredicateKey};

/// One column filter.
pub struct FilterDescriptor<T> {
    column_id: String,
    operator: FilterOperator,
    values: Vec<Value>,
    property_path: Option<String>,
    string_comparison: Option<StringComparison>,
    predicate: Option<FilterFn<T>>,
}

impl<T> FilterDescriptor<T> {
    pub fn new(column_id: impl Into<String>, operator: FilterOperator, values: Vec<Value>) -> Self {
        Self {
            column_id: column_id.into(),
            operator,
            values,
            property_path: None,
            string_comparison: None,
            predicate: None,
        }
    }

    /// Filters with a predicate over whole items.
    pub fn custom<F>(column_id: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::new(column_id, FilterOperator::Custom, Vec::new()).with_predicate(predicate)
    }

    pub fn with_property_path(mut self, path: impl Into<String>) -> Self {
        self.property_path = Some(path.into());
        self
    }

    /// Overrides the adapter's string comparison for this filter.
    pub fn with_string_comparison(mut self, comparison: StringComparison) -> Self {
        self.string_comparison = Some(comparison);
        self
    }

    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn column_id(&self) -> &str {
        &self.column_id
    }

    pub fn operator(&self) -> FilterOperator {
        self.operator
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn property_path(&self) -> Option<&str> {
        self.property_path.as_deref()
    }

    pub fn string_comparison(&self) -> Option<StringComparison> {
        self.string_comparison
    }

    pub fn predicate(&self) -> Option<&FilterFn<T>> {
        self.predicate.as_ref()
    }
}

impl<T> Clone for FilterDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            column_id: self.column_id.clone(),
            operator: self.operator,
            values: self.values.clone(),
            property_path: self.property_path.clone(),
            string_comparison: self.string_comparison,
            predicate: self.predicate.clone(),
        }
    }
}

impl<T> PartialEq for FilterDescriptor<T> {
    fn eq(&self, other: &Self) -> bool {
        let same_predicate = match (&self.predicate, &other.predicate) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_predicate
            && self.column_id == other.column_id
            && self.operator == other.operator
            && self.values == other.values
            && self.property_path == other.property_path
            && self.string_comparison == other.string_comparison
    }
}

impl<T> fmt::Debug for FilterDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterDescriptor")
            .field("column_id", &self.column_id)
            .field("operator", &self.operator)
            .field("values", &self.values)
            .field("property_path", &self.property_path)
            .field("string_comparison", &self.string_comparison)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

/// Ordered filters, at most one per column.
pub struct FilteringModel<T> {
    descriptors: Mutex<Vec<FilterDescriptor<T>>>,
    /// Emitted after every change.
    pub changed: Signal<()>,
}

impl<T> Default for FilteringModel<T> {
    fn default() -> Self {
        Self {
            descriptors: Mutex::new(Vec::new()),
            changed: Signal::new(),
        }
    }
}

impl<T> FilteringModel<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter, replacing any filter on the same column.
    pub fn set(&self, descriptor: FilterDescriptor<T>) {
        {
            let mut descriptors = self.descriptors.lock();
            match descriptors.iter_mut().find(|d| d.column_id == descriptor.column_id) {
                Some(existing) => *existing = descriptor,
                None => descriptors.push(descriptor),
            }
        }
        self.changed.emit(());
    }

    /// Removes the filter on `column_id`. Returns `false` if there was none.
    pub fn remove(&self, column_id: &str) -> bool {
        let removed = {
            let mut descriptors = self.descriptors.lock();
            let before = descriptors.len();
            descriptors.retain(|d| d.column_id != column_id);
            descriptors.len() != before
        };
        if removed {
            self.changed.emit(());
        }
        removed
    }

    pub fn clear(&self) {
        let had_any = {
            let mut descriptors = self.descriptors.lock();
            let had_any = !descriptors.is_empty();
            descriptors.clear();
            had_any
        };
        if had_any {
            self.changed.emit(());
        }
    }

    pub fn replace_all(&self, descriptors: Vec<FilterDescriptor<T>>) {
        *self.descriptors.lock() = descriptors;
        self.changed.emit(());
    }

    pub fn descriptors(&self) -> Vec<FilterDescriptor<T>> {
        self.descriptors.lock().clone()
    }

    pub fn get(&self, column_id: &str) -> Option<FilterDescriptor<T>> {
        self.descriptors.lock().iter().find(|d| d.column_id == column_id).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.lock().is_empty()
    }
}

/// Keeps a view's filter in step with a [`FilteringModel`].
///
/// Every descriptor becomes one predicate; the view filter is their
/// conjunction. Predicates are cached, so re-applying an unchanged model
/// leaves the view alone. When something else replaces the view filter the
/// model is cleared.
pub struct FilteringAdapter<T: DataItem> {
    view: Arc<CollectionView<T>>,
    model: Arc<FilteringModel<T>>,
    columns: Vec<ColumnDefinition<T>>,
    options: AdapterOptions,
    cache: Mutex<PredicateCache<T>>,
    active: Mutex<Vec<FilterFn<T>>>,
    suppress_view_sync: SuppressFlag,
    suppress_model_sync: SuppressFlag,
    connections: Mutex<(Option<ConnectionId>, Option<ConnectionId>)>,
    /// Emitted with the column id when a filter has no accessor in
    /// fast-path mode.
    pub missing_accessor: Signal<String>,
}

impl<T: DataItem> FilteringAdapter<T> {
    /// Binds `model` to `view` and applies the model's current filters.
    pub fn new(
        view: Arc<CollectionView<T>>,
        model: Arc<FilteringModel<T>>,
        columns: Vec<ColumnDefinition<T>>,
        options: AdapterOptions,
    ) -> Arc<Self> {
        let adapter = Arc::new(Self {
            view,
            model,
            columns,
            options,
            cache: Mutex::new(PredicateCache::default()),
            active: Mutex::new(Vec::new()),
            suppress_view_sync: SuppressFlag::new(),
            suppress_model_sync: SuppressFlag::new(),
            connections: Mutex::new((None, None)),
            missing_accessor: Signal::new(),
        });
        adapter.connect();
        if !adapter.model.is_empty() {
            if let Err(err) = adapter.apply() {
                tracing::warn!(target: targets::ADAPTER, error = %err, "initial filters not applied");
            }
        }
        adapter
    }

    fn connect(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let model_conn = self.model.changed.connect(move |_| {
            if let Some(adapter) = weak.upgrade() {
                adapter.on_model_changed();
            }
        });
        let weak: Weak<Self> = Arc::downgrade(self);
        let view_conn = self.view.signals().filter_changed.connect(move |_| {
            if let Some(adapter) = weak.upgrade() {
                adapter.on_view_filter_changed();
            }
        });
        *self.connections.lock() = (Some(model_conn), Some(view_conn));
    }

    pub fn view(&self) -> &Arc<CollectionView<T>> {
        &self.view
    }

    pub fn model(&self) -> &Arc<FilteringModel<T>> {
        &self.model
    }

    pub fn columns(&self) -> &[ColumnDefinition<T>] {
        &self.columns
    }

    /// Rebuilds the view filter from the model.
    ///
    /// Returns [`Error::MissingAccessor`] in fast-path mode when a column has
    /// no accessor and `throw_on_missing_accessor` is set; the view is left
    /// as it was.
    pub fn apply(&self) -> Result<()> {
        let culture = self.view.culture();
        let mut predicates = Vec::new();
        for descriptor in self.model.descriptors() {
            if let Some(predicate) = self.resolve(&descriptor, &culture)? {
                predicates.push(predicate);
            }
        }

        {
            let active = self.active.lock();
            let unchanged = active.len() == predicates.len()
                && active.iter().zip(&predicates).all(|(a, b)| Arc::ptr_eq(a, b));
            if unchanged {
                tracing::trace!(target: targets::ADAPTER, count = predicates.len(), "filter set unchanged");
                return Ok(());
            }
        }

        let combined: Option<FilterFn<T>> = match predicates.len() {
            0 => None,
            1 => Some(predicates[0].clone()),
            _ => {
                let all = predicates.clone();
                Some(Arc::new(move |item: &T| all.iter().all(|predicate| predicate(item))))
            }
        };
        tracing::debug!(target: targets::ADAPTER, count = predicates.len(), "applying filters");
        {
            let _suppress = self.suppress_view_sync.suppress();
            self.view.set_filter(combined)?;
        }
        // Only a filter the view accepted counts as active.
        *self.active.lock() = predicates;
        Ok(())
    }

    /// Returns the predicate for one descriptor, or `None` when the
    /// descriptor is skipped for lack of an accessor.
    ///
    /// Equal descriptors resolved through the same column return the same
    /// `Arc`.
    pub fn predicate_for(&self, descriptor: &FilterDescriptor<T>) -> Result<Option<FilterFn<T>>> {
        let culture = self.view.culture();
        self.resolve(descriptor, &culture)
    }

    fn resolve(&self, descriptor: &FilterDescriptor<T>, culture: &Culture) -> Result<Option<FilterFn<T>>> {
        let column = find_column(&self.columns, &descriptor.column_id);
        let comparison = descriptor
            .string_comparison
            .unwrap_or(self.options.string_comparison);

        if let Some(factory) = column.and_then(ColumnDefinition::predicate_factory) {
            let key = self.key(descriptor, comparison, None, identity(factory));
            if let Some(cached) = self.cache.lock().get(&key) {
                return Ok(Some(cached));
            }
            if let Some(predicate) = factory(descriptor) {
                self.cache.lock().insert(key, predicate.clone());
                return Ok(Some(predicate));
            }
        }

        if let Some(predicate) = &descriptor.predicate {
            return Ok(Some(predicate.clone()));
        }

        if let Some(accessor) = column.and_then(ColumnDefinition::accessor) {
            let key = self.key(descriptor, comparison, None, identity(accessor));
            return Ok(Some(self.cached_operator(key, accessor.clone(), descriptor, comparison, culture)));
        }

        if self.options.fast_path {
            self.missing_accessor.emit(descriptor.column_id.clone());
            if self.options.throw_on_missing_accessor {
                return Err(Error::missing_accessor(&descriptor.column_id));
            }
            tracing::warn!(target: targets::ADAPTER, column = %descriptor.column_id, "no accessor for filtered column, filter skipped");
            return Ok(None);
        }

        let path = descriptor
            .property_path
            .as_deref()
            .or_else(|| column.and_then(ColumnDefinition::property_path))
            .unwrap_or(&descriptor.column_id)
            .to_owned();
        let key = self.key(descriptor, comparison, Some(path.clone()), 0);
        let accessor: SharedAccessor<T> = Arc::new(PropertyPathAccessor::new(path));
        Ok(Some(self.cached_operator(key, accessor, descriptor, comparison, culture)))
    }

    fn key(
        &self,
        descriptor: &FilterDescriptor<T>,
        comparison: StringComparison,
        path: Option<String>,
        resolved: usize,
    ) -> PredicateKey {
        PredicateKey {
            column_id: descriptor.column_id.clone(),
            operator: descriptor.operator,
            operands: descriptor.values.clone(),
            property_path: path,
            comparison,
            resolved,
        }
    }

    fn cached_operator(
        &self,
        key: PredicateKey,
        accessor: SharedAccessor<T>,
        descriptor: &FilterDescriptor<T>,
        comparison: StringComparison,
        culture: &Culture,
    ) -> FilterFn<T> {
        let mut cache = self.cache.lock();
        if let Some(cached) = cache.get(&key) {
            return cached;
        }
        let operator = descriptor.operator;
        let operands = descriptor.values.clone();
        let culture = culture.clone();
        let predicate: FilterFn<T> =
            Arc::new(move |item: &T| evaluate(operator, &accessor.get(item), &operands, comparison, &culture));
        cache.insert(key, predicate.clone());
        predicate
    }

    /// Drops every cached predicate.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    fn on_model_changed(&self) {
        if self.suppress_model_sync.is_raised() {
            return;
        }
        if let Err(err) = self.apply() {
            tracing::warn!(target: targets::ADAPTER, error = %err, "filters not applied");
        }
    }

    fn on_view_filter_changed(&self) {
        if self.suppress_view_sync.is_raised() {
            return;
        }
        tracing::debug!(target: targets::ADAPTER, "view filter replaced externally, clearing filter model");
        self.active.lock().clear();
        let _suppress = self.suppress_model_sync.suppress();
        self.model.clear();
    }
}

impl<T: DataItem> Drop for FilteringAdapter<T> {
    fn drop(&mut self) {
        let (model_conn, view_conn) = *self.connections.lock();
        if let Some(id) = model_conn {
            self.model.changed.disconnect(id);
        }
        if let Some(id) = view_conn {
            self.view.signals().filter_changed.disconnect(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::FnAccessor;
    use crate::source::ObservableList;

    #[derive(Debug)]
    struct Row {
        name: &'static str,
        score: i64,
    }

    impl DataItem for Row {
        fn property(&self, name: &str) -> Option<Value> {
            match name {
                "name" => Some(self.name.into()),
                "score" => Some(self.score.into()),
                _ => None,
            }
        }
    }

    fn setup(
        columns: Vec<ColumnDefinition<Row>>,
        options: AdapterOptions,
    ) -> (Arc<CollectionView<Row>>, Arc<FilteringModel<Row>>, Arc<FilteringAdapter<Row>>) {
        let rows = [("ada", 1), ("bob", 5), ("cy", 9), ("dee", 12)]
            .into_iter()
            .map(|(name, score)| Row { name, score })
            .collect();
        let view = CollectionView::new(Arc::new(ObservableList::new(rows)));
        let model = Arc::new(FilteringModel::new());
        let adapter = FilteringAdapter::new(view.clone(), model.clone(), columns, options);
        (view, model, adapter)
    }

    fn names(view: &CollectionView<Row>) -> Vec<&'static str> {
        view.items().iter().map(|row| row.name).collect()
    }

    #[test]
    fn test_model_drives_view_filter() {
        let (view, model, _adapter) = setup(Vec::new(), AdapterOptions::default());
        model.set(FilterDescriptor::new("score", FilterOperator::GreaterThan, vec!["4".into()]));
        assert_eq!(names(&view), vec!["bob", "cy", "dee"]);

        model.set(FilterDescriptor::new("name", FilterOperator::Contains, vec!["E".into()]));
        assert_eq!(names(&view), vec!["dee"]);

        model.remove("name");
        model.set(FilterDescriptor::new("score", FilterOperator::LessThan, vec![Value::I32(6)]));
        assert_eq!(names(&view), vec!["ada", "bob"]);

        model.clear();
        assert_eq!(view.count(), 4);
        assert!(view.filter().is_none());
    }

    #[test]
    fn test_unchanged_model_keeps_view_filter() {
        let (view, model, adapter) = setup(Vec::new(), AdapterOptions::default());
        let equals = FilterDescriptor::new("score", FilterOperator::Equals, vec![Value::I32(5)]);
        model.set(equals.clone());
        let first = view.filter().unwrap();
        assert_eq!(names(&view), vec!["bob"]);

        model.replace_all(vec![equals.clone()]);
        assert!(Arc::ptr_eq(&view.filter().unwrap(), &first));

        let a = adapter.predicate_for(&equals).unwrap().unwrap();
        let b = adapter.predicate_for(&equals.clone()).unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &first));
    }

    #[test]
    fn test_accessor_and_factory_resolution() {
        let columns = vec![
            ColumnDefinition::new("score").with_accessor(FnAccessor::new(|row: &Row| Value::I64(row.score))),
            ColumnDefinition::new("initial").with_predicate_factory(|descriptor: &FilterDescriptor<Row>| {
                let initial = descriptor.values().first()?.as_str()?.chars().next()?;
                Some(Arc::new(move |row: &Row| row.name.starts_with(initial)) as FilterFn<Row>)
            }),
        ];
        let (view, model, _adapter) = setup(columns, AdapterOptions::default());
        model.set(FilterDescriptor::new(
            "score",
            FilterOperator::Between,
            vec![Value::I32(5), Value::I32(10)],
        ));
        assert_eq!(names(&view), vec!["bob", "cy"]);

        model.set(FilterDescriptor::new("initial", FilterOperator::Custom, vec!["c".into()]));
        assert_eq!(names(&view), vec!["cy"]);
    }

    #[test]
    fn test_descriptor_predicate() {
        let (view, model, _adapter) = setup(Vec::new(), AdapterOptions::default());
        model.set(FilterDescriptor::custom("even", |row: &Row| row.score % 2 == 0));
        assert_eq!(names(&view), vec!["dee"]);
    }

    #[test]
    fn test_fast_path_missing_accessor() {
        let columns =
            vec![ColumnDefinition::new("score").with_accessor(FnAccessor::new(|row: &Row| Value::I64(row.score)))];
        let (view, model, adapter) = setup(columns.clone(), AdapterOptions::default().with_fast_path(true));
        let missing = Arc::new(Mutex::new(Vec::new()));
        let recv = missing.clone();
        adapter.missing_accessor.connect(move |column| recv.lock().push(column.clone()));

        model.replace_all(vec![
            FilterDescriptor::new("name", FilterOperator::Equals, vec!["ada".into()]),
            FilterDescriptor::new("score", FilterOperator::GreaterThanOrEqual, vec![Value::I64(9)]),
        ]);
        assert_eq!(*missing.lock(), vec!["name".to_string()]);
        assert_eq!(names(&view), vec!["cy", "dee"]);

        let (view, model, adapter) = setup(
            columns,
            AdapterOptions::default()
                .with_fast_path(true)
                .with_throw_on_missing_accessor(true),
        );
        model.set(FilterDescriptor::new("name", FilterOperator::Equals, vec!["ada".into()]));
        assert_eq!(
            adapter.apply(),
            Err(Error::MissingAccessor {
                column_id: "name".into()
            })
        );
        assert_eq!(view.count(), 4);
    }

    #[test]
    fn test_external_filter_clears_model() {
        let (view, model, _adapter) = setup(Vec::new(), AdapterOptions::default());
        model.set(FilterDescriptor::new("score", FilterOperator::Equals, vec![Value::I64(1)]));
        assert_eq!(view.count(), 1);

        view.set_filter_fn(|row: &Row| row.score > 1).unwrap();
        assert!(model.is_empty());
        assert_eq!(names(&view), vec!["bob", "cy", "dee"]);
    }

    #[test]
    fn test_dropped_adapter_disconnects() {
        let (view, model, adapter) = setup(Vec::new(), AdapterOptions::default());
        drop(adapter);
        assert_eq!(model.changed.connection_count(), 0);
        assert_eq!(view.signals().filter_changed.connection_count(), 0);
        model.set(FilterDescriptor::new("score", FilterOperator::Equals, vec![Value::I64(1)]));
        assert_eq!(view.count(), 4);
    }
}
