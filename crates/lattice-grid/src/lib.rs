//! Lattice Grid - collection views for data grids.
//!
//! A [`CollectionView`] presents a live, derived view over a source list:
//! filtered, sorted, grouped and paged, with a current-item cursor and
//! add/edit transactions. Source changes are translated into minimal,
//! ordered change notifications on the view's [`ViewSignals`].
//!
//! - **Sources**: [`ObservableList`], [`BindingList`] and polled collections
//!   ([`PolledList`], [`PolledCollection`])
//! - **Shaping**: [`SortDescription`], [`GroupDescription`], filter closures
//! - **Columns**: [`SortingModel`] and [`FilteringModel`] bound to a view
//!   through [`SortingAdapter`] and [`FilteringAdapter`]
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use lattice_grid::{CollectionView, DataItem, ObservableList, SortDescription, SortDirection, Value};
//!
//! struct Task { title: &'static str, priority: i32 }
//!
//! impl DataItem for Task {
//!     fn property(&self, name: &str) -> Option<Value> {
//!         match name {
//!             "title" => Some(self.title.into()),
//!             "priority" => Some(self.priority.into()),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! let tasks = Arc::new(ObservableList::new(vec![
//!     Task { title: "ship", priority: 2 },
//!     Task { title: "plan", priority: 1 },
//! ]));
//! let view = CollectionView::new(tasks.clone());
//! view.set_sort_descriptions(vec![SortDescription::by_path("priority", SortDirection::Ascending)])?;
//! assert_eq!(view.get_item_at(0).map(|task| task.title), Some("plan"));
//!
//! tasks.push(Task { title: "test", priority: 0 });
//! assert_eq!(view.get_item_at(0).map(|task| task.title), Some("test"));
//! # Ok::<(), lattice_grid::Error>(())
//! ```

pub mod accessor;
pub mod adapter;
pub mod culture;
pub mod error;
pub mod group;
pub mod options;
pub mod sort;
pub mod source;
pub mod value;
pub mod view;

pub use accessor::{DataItem, EditableItem, FnAccessor, PropertyPathAccessor, SharedAccessor, ValueAccessor};
pub use adapter::{
    ColumnDefinition, FilterDescriptor, FilterOperator, FilteringAdapter, FilteringModel, PredicateFactory,
    SortDescriptor, SortingAdapter, SortingModel,
};
pub use culture::{Culture, StringComparison};
pub use error::{Error, Result};
pub use group::{CollectionGroup, GroupDescription, GroupEntry, GroupKey, GroupRoot};
pub use options::{AdapterOptions, ItemFactory, ViewOptions};
pub use sort::{ItemComparer, SortDescription, SortDirection, SortKey};
pub use source::{
    BindingList, CollectionChange, CollectionSource, ListChanged, ObservableList, PolledCollection, PolledList,
    SourceDelta,
};
pub use value::{try_compare, values_equal, ObjectValue, Value};
pub use view::{CollectionView, CurrencyChange, DeferRefresh, FilterFn, PageChange, ViewChange, ViewSignals};

pub use lattice_grid_core::{ConnectionId, Signal};

static_assertions::assert_impl_all!(Value: Send, Sync);
static_assertions::assert_impl_all!(Culture: Send, Sync);
static_assertions::assert_impl_all!(Error: Send, Sync);
static_assertions::assert_impl_all!(SortingModel: Send, Sync);
