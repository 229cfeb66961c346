//! Column sorting bound to a view.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use lattice_grid_core::logging::targets;
use lattice_grid_core::{ConnectionId, Signal, SuppressFlag};

use crate::accessor::DataItem;
use crate::culture::Culture;
use crate::error::{Error, Result};
use crate::options::AdapterOptions;
use crate::sort::{SortDescription, SortDirection, SortKey};
use crate::view::CollectionView;

use super::column::{find_column, ColumnDefinition};

/// Sort state of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortDescriptor {
    pub column_id: String,
    pub direction: SortDirection,
    /// Overrides the column's property path.
    pub property_path: Option<String>,
    /// Overrides the view culture.
    pub culture: Option<Culture>,
}

impl SortDescriptor {
    pub fn new(column_id: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column_id: column_id.into(),
            direction,
            property_path: None,
            culture: None,
        }
    }

    pub fn ascending(column_id: impl Into<String>) -> Self {
        Self::new(column_id, SortDirection::Ascending)
    }

    pub fn descending(column_id: impl Into<String>) -> Self {
        Self::new(column_id, SortDirection::Descending)
    }

    pub fn with_property_path(mut self, path: impl Into<String>) -> Self {
        self.property_path = Some(path.into());
        self
    }

    pub fn with_culture(mut self, culture: Culture) -> Self {
        self.culture = Some(culture);
        self
    }
}

/// Ordered sort keys, at most one per column. The first descriptor is the
/// primary key.
#[derive(Default)]
pub struct SortingModel {
    descriptors: Mutex<Vec<SortDescriptor>>,
    /// Emitted after every change.
    pub changed: Signal<()>,
}

impl SortingModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sort of a column, keeping its position if it is already
    /// sorted.
    pub fn set(&self, descriptor: SortDescriptor) {
        {
            let mut descriptors = self.descriptors.lock();
            match descriptors.iter_mut().find(|d| d.column_id == descriptor.column_id) {
                Some(existing) => *existing = descriptor,
                None => descriptors.push(descriptor),
            }
        }
        self.changed.emit(());
    }

    /// Cycles a column through ascending, descending and unsorted.
    ///
    /// Without `multi` every other column is unsorted first.
    pub fn toggle(&self, column_id: &str, multi: bool) {
        {
            let mut descriptors = self.descriptors.lock();
            if !multi {
                descriptors.retain(|d| d.column_id == column_id);
            }
            match descriptors.iter().position(|d| d.column_id == column_id) {
                None => descriptors.push(SortDescriptor::ascending(column_id)),
                Some(index) if descriptors[index].direction == SortDirection::Ascending => {
                    descriptors[index].direction = SortDirection::Descending;
                }
                Some(index) => {
                    descriptors.remove(index);
                }
            }
        }
        self.changed.emit(());
    }

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

    pub fn replace_all(&self, descriptors: Vec<SortDescriptor>) {
        *self.descriptors.lock() = descriptors;
        self.changed.emit(());
    }

    pub fn descriptors(&self) -> Vec<SortDescriptor> {
        self.descriptors.lock().clone()
    }

    /// Direction of a sorted column.
    pub fn direction_of(&self, column_id: &str) -> Option<SortDirection> {
        self.descriptors
            .lock()
            .iter()
            .find(|d| d.column_id == column_id)
            .map(|d| d.direction)
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.lock().is_empty()
    }
}

struct LastGood<T> {
    descriptions: Vec<SortDescription<T>>,
    descriptors: Vec<SortDescriptor>,
}

#[derive(Default, Clone, Copy)]
struct Connections {
    model: Option<ConnectionId>,
    view_sort: Option<ConnectionId>,
    sort_failed: Option<ConnectionId>,
    refreshed: Option<ConnectionId>,
}

/// Keeps a view's sort descriptions in step with a [`SortingModel`].
///
/// Model changes are pushed into the view. Sort changes made directly on the
/// view are mirrored back into the model. When a sort fails both sides roll
/// back to the last sort that worked.
pub struct SortingAdapter<T: DataItem> {
    view: Arc<CollectionView<T>>,
    model: Arc<SortingModel>,
    columns: Vec<ColumnDefinition<T>>,
    options: AdapterOptions,
    last_good: Mutex<LastGood<T>>,
    /// Applied while the view deferred refresh; not yet known to sort.
    unconfirmed: Mutex<Option<LastGood<T>>>,
    suppress_view_sync: SuppressFlag,
    suppress_model_sync: SuppressFlag,
    connections: Mutex<Connections>,
    /// Emitted with the column id when a sorted column has no accessor in
    /// fast-path mode.
    pub missing_accessor: Signal<String>,
}

impl<T: DataItem> SortingAdapter<T> {
    /// Binds `model` to `view` and applies the model's current sort.
    pub fn new(
        view: Arc<CollectionView<T>>,
        model: Arc<SortingModel>,
        columns: Vec<ColumnDefinition<T>>,
        options: AdapterOptions,
    ) -> Arc<Self> {
        let last_good = LastGood {
            descriptions: view.sort_descriptions(),
            descriptors: model.descriptors(),
        };
        let adapter = Arc::new(Self {
            view,
            model,
            columns,
            options,
            last_good: Mutex::new(last_good),
            unconfirmed: Mutex::new(None),
            suppress_view_sync: SuppressFlag::new(),
            suppress_model_sync: SuppressFlag::new(),
            connections: Mutex::new(Connections::default()),
            missing_accessor: Signal::new(),
        });
        adapter.connect();
        if !adapter.model.is_empty() {
            if let Err(err) = adapter.apply() {
                tracing::warn!(target: targets::ADAPTER, error = %err, "initial sort not applied");
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
        let view_conn = self.view.signals().sort_descriptions_changed.connect(move |_| {
            if let Some(adapter) = weak.upgrade() {
                adapter.on_view_sort_changed();
            }
        });
        let weak: Weak<Self> = Arc::downgrade(self);
        let failed_conn = self.view.signals().sort_failed.connect(move |err| {
            if let Some(adapter) = weak.upgrade() {
                adapter.on_view_sort_failed(err);
            }
        });
        let weak: Weak<Self> = Arc::downgrade(self);
        let refreshed_conn = self.view.signals().refreshed.connect(move |_| {
            if let Some(adapter) = weak.upgrade() {
                adapter.on_view_refreshed();
            }
        });
        *self.connections.lock() = Connections {
            model: Some(model_conn),
            view_sort: Some(view_conn),
            sort_failed: Some(failed_conn),
            refreshed: Some(refreshed_conn),
        };
    }

    pub fn view(&self) -> &Arc<CollectionView<T>> {
        &self.view
    }

    pub fn model(&self) -> &Arc<SortingModel> {
        &self.model
    }

    pub fn columns(&self) -> &[ColumnDefinition<T>] {
        &self.columns
    }

    /// Toggles a column, adding to the sort when multi-sort is enabled.
    pub fn toggle(&self, column_id: &str) {
        self.model.toggle(column_id, self.options.multi_sort);
    }

    /// Pushes the model into the view.
    ///
    /// A failing comparer is not an error: both the view and the model are
    /// rolled back and the failure is logged. While the view defers refresh
    /// the outcome is settled when the deferral ends.
    pub fn apply(&self) -> Result<()> {
        let descriptors = self.model.descriptors();
        let mut descriptions = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            if let Some(description) = self.describe(descriptor)? {
                descriptions.push(description);
            }
        }

        let outcome = {
            let _suppress = self.suppress_view_sync.suppress();
            self.view.set_sort_descriptions(descriptions.clone())
        };
        match outcome {
            Ok(()) => {
                let applied = LastGood {
                    descriptions,
                    descriptors,
                };
                if self.view.is_refresh_deferred() {
                    *self.unconfirmed.lock() = Some(applied);
                } else {
                    *self.unconfirmed.lock() = None;
                    *self.last_good.lock() = applied;
                }
                Ok(())
            }
            Err(Error::SortFailed { key, message }) => {
                tracing::warn!(
                    target: targets::ADAPTER,
                    column = descriptors.get(key).map(|d| d.column_id.as_str()).unwrap_or_default(),
                    %message,
                    "sort failed, restoring previous sort"
                );
                self.roll_back();
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn roll_back(&self) {
        let (descriptions, descriptors) = {
            let last_good = self.last_good.lock();
            (last_good.descriptions.clone(), last_good.descriptors.clone())
        };
        {
            let _suppress = self.suppress_view_sync.suppress();
            if let Err(err) = self.view.set_sort_descriptions(descriptions) {
                tracing::warn!(target: targets::ADAPTER, error = %err, "previous sort could not be restored");
            }
        }
        let _suppress = self.suppress_model_sync.suppress();
        self.model.replace_all(descriptors);
    }

    /// Builds the view sort description for one column.
    fn describe(&self, descriptor: &SortDescriptor) -> Result<Option<SortDescription<T>>> {
        let column = find_column(&self.columns, &descriptor.column_id);
        let direction = descriptor.direction;

        let description = if let Some(comparer) = column.and_then(ColumnDefinition::comparer) {
            SortDescription::new(SortKey::Comparer(comparer.clone()), direction)
        } else if let Some(accessor) = column.and_then(ColumnDefinition::accessor) {
            SortDescription::by_accessor(accessor.clone(), direction)
        } else if self.options.fast_path {
            self.missing_accessor.emit(descriptor.column_id.clone());
            if self.options.throw_on_missing_accessor {
                return Err(Error::missing_accessor(&descriptor.column_id));
            }
            tracing::warn!(target: targets::ADAPTER, column = %descriptor.column_id, "no accessor for sorted column, key skipped");
            return Ok(None);
        } else {
            let path = descriptor
                .property_path
                .as_deref()
                .or_else(|| column.and_then(ColumnDefinition::property_path))
                .unwrap_or(&descriptor.column_id);
            SortDescription::by_path(path, direction)
        };

        let description = description.with_column_id(&descriptor.column_id);
        Ok(Some(match &descriptor.culture {
            Some(culture) => description.with_culture(culture.clone()),
            None => description,
        }))
    }

    fn on_model_changed(&self) {
        if self.suppress_model_sync.is_raised() {
            return;
        }
        if let Err(err) = self.apply() {
            tracing::warn!(target: targets::ADAPTER, error = %err, "sort not applied");
        }
    }

    fn on_view_sort_failed(&self, err: &Error) {
        let had_unconfirmed = self.unconfirmed.lock().take().is_some();
        tracing::warn!(
            target: targets::ADAPTER,
            error = %err,
            deferred = had_unconfirmed,
            "view could not sort, restoring previous sort"
        );
        self.roll_back();
    }

    fn on_view_refreshed(&self) {
        if let Some(applied) = self.unconfirmed.lock().take() {
            *self.last_good.lock() = applied;
        }
    }

    /// Mirrors a sort set directly on the view into the model.
    fn on_view_sort_changed(&self) {
        if self.suppress_view_sync.is_raised() {
            return;
        }
        let descriptions = self.view.sort_descriptions();
        let descriptors: Vec<SortDescriptor> = descriptions
            .iter()
            .filter_map(|description| {
                let (column_id, property_path) = match (description.column_id(), description.property_path()) {
                    (Some(column_id), path) => (column_id, path.filter(|path| *path != column_id)),
                    (None, Some(path)) => (path, None),
                    (None, None) => return None,
                };
                Some(SortDescriptor {
                    column_id: column_id.to_owned(),
                    direction: description.direction(),
                    property_path: property_path.map(str::to_owned),
                    culture: description.culture().cloned(),
                })
            })
            .collect();
        tracing::debug!(target: targets::ADAPTER, keys = descriptors.len(), "view sort changed externally, updating sort model");
        *self.unconfirmed.lock() = None;
        *self.last_good.lock() = LastGood {
            descriptions,
            descriptors: descriptors.clone(),
        };
        let _suppress = self.suppress_model_sync.suppress();
        self.model.replace_all(descriptors);
    }
}

impl<T: DataItem> Drop for SortingAdapter<T> {
    fn drop(&mut self) {
        let connections = *self.connections.lock();
        let signals = self.view.signals();
        if let Some(id) = connections.model {
            self.model.changed.disconnect(id);
        }
        if let Some(id) = connections.view_sort {
            signals.sort_descriptions_changed.disconnect(id);
        }
        if let Some(id) = connections.sort_failed {
            signals.sort_failed.disconnect(id);
        }
        if let Some(id) = connections.refreshed {
            signals.refreshed.disconnect(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::*;
    use crate::accessor::FnAccessor;
    use crate::source::ObservableList;
    use crate::value::Value;

    #[derive(Debug)]
    struct Row {
        name: &'static str,
        team: &'static str,
        score: i64,
    }

    impl DataItem for Row {
        fn property(&self, name: &str) -> Option<Value> {
            match name {
                "name" => Some(self.name.into()),
                "team" => Some(self.team.into()),
                "score" => Some(self.score.into()),
                _ => None,
            }
        }
    }

    fn setup(
        columns: Vec<ColumnDefinition<Row>>,
        options: AdapterOptions,
    ) -> (Arc<CollectionView<Row>>, Arc<SortingModel>, Arc<SortingAdapter<Row>>) {
        let rows = [("cy", "red", 9), ("ada", "blue", 1), ("dee", "red", 12), ("bob", "blue", 5)]
            .into_iter()
            .map(|(name, team, score)| Row { name, team, score })
            .collect();
        let view = CollectionView::new(Arc::new(ObservableList::new(rows)));
        let model = Arc::new(SortingModel::new());
        let adapter = SortingAdapter::new(view.clone(), model.clone(), columns, options);
        (view, model, adapter)
    }

    fn names(view: &CollectionView<Row>) -> Vec<&'static str> {
        view.items().iter().map(|row| row.name).collect()
    }

    #[test]
    fn test_toggle_cycles_directions() {
        let model = SortingModel::new();
        model.toggle("name", true);
        assert_eq!(model.direction_of("name"), Some(SortDirection::Ascending));
        model.toggle("name", true);
        assert_eq!(model.direction_of("name"), Some(SortDirection::Descending));
        model.toggle("score", true);
        assert_eq!(model.descriptors().len(), 2);
        model.toggle("name", true);
        assert_eq!(model.descriptors(), vec![SortDescriptor::ascending("score")]);

        model.toggle("team", false);
        assert_eq!(model.descriptors(), vec![SortDescriptor::ascending("team")]);
    }

    #[test]
    fn test_model_drives_view_sort() {
        let (view, model, adapter) = setup(Vec::new(), AdapterOptions::default());
        adapter.toggle("name");
        assert_eq!(names(&view), vec!["ada", "bob", "cy", "dee"]);

        model.replace_all(vec![SortDescriptor::ascending("team"), SortDescriptor::descending("score")]);
        assert_eq!(names(&view), vec!["bob", "ada", "dee", "cy"]);
        assert_eq!(view.sort_descriptions()[0].column_id(), Some("team"));

        model.clear();
        assert_eq!(names(&view), vec!["cy", "ada", "dee", "bob"]);
    }

    #[test]
    fn test_accessor_column() {
        let columns = vec![ColumnDefinition::new("rank")
            .with_accessor(FnAccessor::new(|row: &Row| Value::I64(-row.score)))];
        let (view, model, _adapter) = setup(columns, AdapterOptions::default());
        model.set(SortDescriptor::ascending("rank"));
        assert_eq!(names(&view), vec!["dee", "cy", "bob", "ada"]);
    }

    #[test]
    fn test_failed_sort_rolls_back() {
        let columns = vec![ColumnDefinition::new("broken")
            .with_comparer(|_: &Row, _: &Row| Err::<Ordering, _>("not comparable".to_string()))];
        let (view, model, _adapter) = setup(columns, AdapterOptions::default());
        model.set(SortDescriptor::ascending("score"));
        assert_eq!(names(&view), vec!["ada", "bob", "cy", "dee"]);

        model.replace_all(vec![SortDescriptor::ascending("broken")]);
        assert_eq!(model.descriptors(), vec![SortDescriptor::ascending("score")]);
        assert_eq!(view.sort_descriptions().len(), 1);
        assert_eq!(names(&view), vec!["ada", "bob", "cy", "dee"]);
    }

    #[test]
    fn test_observer_mode_mirrors_view() {
        let (view, model, _adapter) = setup(Vec::new(), AdapterOptions::default());
        let changes = Arc::new(Mutex::new(0));
        let recv = changes.clone();
        model.changed.connect(move |_| *recv.lock() += 1);

        view.set_sort_descriptions(vec![
            SortDescription::by_path("score", SortDirection::Descending).with_column_id("points"),
            SortDescription::by_path("name", SortDirection::Ascending),
        ])
        .unwrap();
        assert_eq!(
            model.descriptors(),
            vec![
                SortDescriptor::descending("points").with_property_path("score"),
                SortDescriptor::ascending("name"),
            ]
        );
        assert_eq!(*changes.lock(), 1);
        assert_eq!(names(&view), vec!["dee", "cy", "bob", "ada"]);
    }

    #[test]
    fn test_fast_path_skips_missing_accessor() {
        let (view, model, adapter) = setup(Vec::new(), AdapterOptions::default().with_fast_path(true));
        let missing = Arc::new(Mutex::new(Vec::new()));
        let recv = missing.clone();
        adapter.missing_accessor.connect(move |column| recv.lock().push(column.clone()));

        model.set(SortDescriptor::ascending("name"));
        assert_eq!(*missing.lock(), vec!["name".to_string()]);
        assert!(view.sort_descriptions().is_empty());
        assert_eq!(names(&view), vec!["cy", "ada", "dee", "bob"]);
    }

    #[test]
    fn test_failed_deferred_sort_rolls_back() {
        let columns = vec![ColumnDefinition::new("broken")
            .with_comparer(|_: &Row, _: &Row| Err::<Ordering, _>("not comparable".to_string()))];
        let (view, model, _adapter) = setup(columns, AdapterOptions::default());
        model.set(SortDescriptor::ascending("score"));

        {
            let _defer = view.defer_refresh().unwrap();
            model.replace_all(vec![SortDescriptor::ascending("name")]);
        }
        assert_eq!(names(&view), vec!["ada", "bob", "cy", "dee"]);

        {
            let _defer = view.defer_refresh().unwrap();
            model.replace_all(vec![SortDescriptor::ascending("broken")]);
            assert_eq!(view.sort_descriptions()[0].column_id(), Some("broken"));
        }
        assert_eq!(model.descriptors(), vec![SortDescriptor::ascending("name")]);
        assert_eq!(view.sort_descriptions()[0].column_id(), Some("name"));
        assert_eq!(names(&view), vec!["ada", "bob", "cy", "dee"]);
    }
}
