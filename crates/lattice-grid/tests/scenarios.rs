//! End-to-end behaviour of views, transactions and column adapters.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use lattice_grid::{
    AdapterOptions, CollectionView, ColumnDefinition, DataItem, EditableItem, FilterDescriptor, FilterOperator,
    FilteringAdapter, FilteringModel, FnAccessor, GroupDescription, ObservableList, SortDescription, SortDirection,
    Value, ViewOptions,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Default)]
struct Product {
    name: Mutex<String>,
    category: String,
    score: Mutex<i64>,
    snapshot: Mutex<Option<(String, i64)>>,
    reject_commit: AtomicBool,
}

impl Product {
    fn new(name: &str, category: &str, score: i64) -> Self {
        Self {
            name: Mutex::new(name.to_owned()),
            category: category.to_owned(),
            score: Mutex::new(score),
            snapshot: Mutex::new(None),
            reject_commit: AtomicBool::new(false),
        }
    }

    fn name(&self) -> String {
        self.name.lock().clone()
    }
}

impl DataItem for Product {
    fn property(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(self.name().into()),
            "category" => Some(self.category.as_str().into()),
            "score" => Some((*self.score.lock()).into()),
            _ => None,
        }
    }

    fn editable(&self) -> Option<&dyn EditableItem> {
        Some(self)
    }
}

impl EditableItem for Product {
    fn begin_edit(&self) {
        *self.snapshot.lock() = Some((self.name(), *self.score.lock()));
    }

    fn end_edit(&self) -> Result<(), String> {
        if self.reject_commit.load(Ordering::SeqCst) {
            return Err(format!("{} is locked", self.name()));
        }
        *self.snapshot.lock() = None;
        Ok(())
    }

    fn cancel_edit(&self) {
        if let Some((name, score)) = self.snapshot.lock().take() {
            *self.name.lock() = name;
            *self.score.lock() = score;
        }
    }
}

fn catalog(rows: &[(&str, &str, i64)]) -> Arc<ObservableList<Product>> {
    Arc::new(ObservableList::new(
        rows.iter()
            .map(|&(name, category, score)| Product::new(name, category, score))
            .collect(),
    ))
}

fn names(view: &CollectionView<Product>) -> Vec<String> {
    view.items().iter().map(|product| product.name()).collect()
}

fn record_changes(view: &CollectionView<Product>) -> Arc<Mutex<Vec<String>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let recv = log.clone();
    view.signals()
        .collection_changed
        .connect(move |change| recv.lock().push(format!("{change:?}")));
    log
}

#[test]
fn test_add_then_cancel_restores_view() {
    init_tracing();
    let list = catalog(&[("bolt", "hw", 3), ("nut", "hw", 1), ("saw", "tools", 7)]);
    let options = ViewOptions::default().with_item_factory(|| Arc::new(Product::new("new", "misc", 0)));
    let view = CollectionView::with_options(list.clone(), options);
    view.set_sort_descriptions(vec![SortDescription::by_path("score", SortDirection::Ascending)])
        .unwrap();
    view.move_current_to_position(1).unwrap();

    let count = view.count();
    let internal = view.internal_items();
    let current = view.current_item();

    let added = view.add_new().unwrap();
    assert_eq!(view.count(), count + 1);
    assert!(Arc::ptr_eq(&view.current_item().unwrap(), &added));

    view.cancel_new().unwrap();
    assert_eq!(view.count(), count);
    assert_eq!(list.len(), 3);
    let after = view.internal_items();
    assert_eq!(after.len(), internal.len());
    assert!(after.iter().zip(&internal).all(|(a, b)| Arc::ptr_eq(a, b)));
    assert!(Arc::ptr_eq(&view.current_item().unwrap(), current.as_ref().unwrap()));
}

#[test]
fn test_edit_without_relevant_change_keeps_index() {
    init_tracing();
    let list = catalog(&[("bolt", "hw", 3), ("nut", "hw", 1), ("saw", "tools", 7)]);
    let view = CollectionView::new(list);
    view.set_sort_descriptions(vec![SortDescription::by_path("score", SortDirection::Ascending)])
        .unwrap();
    let item = view.get_item_at(1).unwrap();
    let log = record_changes(&view);

    view.edit_item(&item).unwrap();
    *item.name.lock() = "hex bolt".into();
    view.commit_edit().unwrap();

    assert_eq!(view.index_of(&item), Some(1));
    assert!(log.lock().iter().all(|entry| !entry.starts_with("Remove") && !entry.starts_with("Add")));
    assert_eq!(names(&view), vec!["nut", "hex bolt", "saw"]);
}

#[test]
fn test_predicate_cache_reuse() {
    init_tracing();
    let list = catalog(&[("a", "x", 1)]);
    let view = CollectionView::new(list);
    let model = Arc::new(FilteringModel::new());
    let adapter = FilteringAdapter::new(view, model, Vec::new(), AdapterOptions::default());

    let first = FilterDescriptor::new("score", FilterOperator::Equals, vec![Value::I64(2)]);
    let second = FilterDescriptor::new("score", FilterOperator::Equals, vec![Value::I64(2)]);
    let a = adapter.predicate_for(&first).unwrap().unwrap();
    let b = adapter.predicate_for(&second).unwrap().unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let other = FilterDescriptor::new("score", FilterOperator::Equals, vec![Value::I64(3)]);
    let c = adapter.predicate_for(&other).unwrap().unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
}

#[test]
fn test_between_widens_int_bounds_over_long_values() {
    init_tracing();
    let list = catalog(&[("one", "x", 1), ("five", "x", 5), ("nine", "x", 9), ("twelve", "x", 12)]);
    let view = CollectionView::new(list);
    let model = Arc::new(FilteringModel::new());
    let columns = vec![ColumnDefinition::new("score")
        .with_accessor(FnAccessor::new(|product: &Product| Value::I64(*product.score.lock())))];
    let _adapter = FilteringAdapter::new(view.clone(), model.clone(), columns, AdapterOptions::default());

    model.set(FilterDescriptor::new(
        "score",
        FilterOperator::Between,
        vec![Value::I32(5), Value::I32(10)],
    ));
    assert_eq!(names(&view), vec!["five", "nine"]);
}

#[test]
fn test_equals_filter_reapplied_without_new_predicate() {
    init_tracing();
    let list = catalog(&[("A", "x", 1), ("B", "x", 2)]);
    let view = CollectionView::new(list);
    let model = Arc::new(FilteringModel::new());
    let _adapter = FilteringAdapter::new(view.clone(), model.clone(), Vec::new(), AdapterOptions::default());

    model.set(FilterDescriptor::new("score", FilterOperator::Equals, vec![Value::I32(2)]));
    assert_eq!(names(&view), vec!["B"]);
    let filter = view.filter().unwrap();

    let log = record_changes(&view);
    model.set(FilterDescriptor::new("score", FilterOperator::Equals, vec![Value::I32(2)]));
    assert!(Arc::ptr_eq(&view.filter().unwrap(), &filter));
    assert!(log.lock().is_empty());
    assert_eq!(names(&view), vec!["B"]);
}

#[test]
fn test_grouped_paged_add_evicts_before_showing() {
    init_tracing();
    let list = catalog(&[("a", "x", 1), ("b", "x", 2), ("c", "y", 3), ("d", "y", 4)]);
    let options = ViewOptions::default()
        .with_page_size(2)
        .with_item_factory(|| Arc::new(Product::new("new", "z", 0)));
    let view = CollectionView::with_options(list, options);
    view.set_group_descriptions(vec![GroupDescription::by_path("category")])
        .unwrap();
    assert!(view.move_to_last_page().unwrap());
    assert_eq!(names(&view), vec!["c", "d"]);

    let log = record_changes(&view);
    let added = view.add_new().unwrap();

    assert_eq!(*log.lock(), vec!["Remove(1)", "Add(1)"]);
    assert_eq!(view.count(), 2);
    assert_eq!(names(&view), vec!["c", "new"]);
    assert_eq!(view.index_of(&added), Some(1));
}

#[test]
fn test_filter_applies_after_blocked_commit_is_resolved() {
    init_tracing();
    let list = catalog(&[("A", "x", 1), ("B", "x", 2)]);
    let view = CollectionView::new(list);
    let model = Arc::new(FilteringModel::new());
    let adapter = FilteringAdapter::new(view.clone(), model.clone(), Vec::new(), AdapterOptions::default());

    let first = view.get_item_at(0).unwrap();
    first.reject_commit.store(true, Ordering::SeqCst);
    view.edit_item(&first).unwrap();

    // The open edit cannot be committed, so the view keeps its old filter.
    model.set(FilterDescriptor::new("score", FilterOperator::Equals, vec![Value::I64(2)]));
    assert!(view.filter().is_none());
    assert_eq!(view.count(), 2);
    assert!(adapter.apply().is_err());

    first.reject_commit.store(false, Ordering::SeqCst);
    view.commit_edit().unwrap();
    adapter.apply().unwrap();
    assert!(view.filter().is_some());
    assert_eq!(names(&view), vec!["B"]);
}
