//! Column-level sorting and filtering.
//!
//! A grid keeps its sort and filter state per column in a [`SortingModel`]
//! and a [`FilteringModel`]. The adapters translate that state into the
//! view's sort descriptions and filter predicate, using the
//! [`ColumnDefinition`]s to decide how each column reads its values.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use lattice_grid::{
//!     AdapterOptions, CollectionView, DataItem, FilterDescriptor, FilterOperator,
//!     FilteringAdapter, FilteringModel, ObservableList, Value,
//! };
//!
//! struct Order { total: i64 }
//!
//! impl DataItem for Order {
//!     fn property(&self, name: &str) -> Option<Value> {
//!         (name == "total").then(|| Value::I64(self.total))
//!     }
//! }
//!
//! let list = Arc::new(ObservableList::new(vec![Order { total: 5 }, Order { total: 50 }]));
//! let view = CollectionView::new(list);
//! let model = Arc::new(FilteringModel::new());
//! let _adapter = FilteringAdapter::new(view.clone(), model.clone(), Vec::new(), AdapterOptions::default());
//!
//! model.set(FilterDescriptor::new("total", FilterOperator::GreaterThan, vec!["10".into()]));
//! assert_eq!(view.count(), 1);
//! ```

mod column;
mod filtering;
mod predicate;
mod sorting;

pub use column::{ColumnDefinition, PredicateFactory};
pub use filtering::{FilterDescriptor, FilteringAdapter, FilteringModel};
pub use predicate::{evaluate, FilterOperator};
pub use sorting::{SortDescriptor, SortingAdapter, SortingModel};
