//! Reading values out of items.
//!
//! Columns, sort keys and filters resolve an item's value through a
//! [`ValueAccessor`]. Typed accessors ([`FnAccessor`]) are resolved once per
//! column; [`PropertyPathAccessor`] walks [`DataItem::property`] by name and is
//! the fallback when no typed accessor exists.

use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// Items that can be shown in a collection view.
///
/// Both methods are optional capabilities. Items are shared as `Arc<T>`, so
/// any mutation (including editing) goes through interior mutability.
pub trait DataItem: Send + Sync + 'static {
    /// Looks up a property by name. Used by property paths.
    fn property(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Returns the transactional-edit capability, if the item has one.
    fn editable(&self) -> Option<&dyn EditableItem> {
        None
    }
}

/// Transactional edit hooks.
///
/// An item that does not expose this capability can still be added and
/// edited, but its edits cannot be cancelled.
pub trait EditableItem: Send + Sync {
    /// Starts an edit scope; the item should snapshot its state.
    fn begin_edit(&self);

    /// Commits the edit. Returning `Err` rejects the commit and keeps the
    /// edit open.
    fn end_edit(&self) -> Result<(), String>;

    /// Restores the state captured by `begin_edit`.
    fn cancel_edit(&self);
}

/// Reads (and optionally writes) one value of an item.
pub trait ValueAccessor<T>: Send + Sync {
    /// Reads the value.
    fn get(&self, item: &T) -> Value;

    /// Writes the value, returning `false` when the accessor is read-only.
    fn set(&self, _item: &T, _value: Value) -> bool {
        false
    }
}

/// Shared handle to an accessor.
pub type SharedAccessor<T> = Arc<dyn ValueAccessor<T>>;

type Getter<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;
type Setter<T> = Arc<dyn Fn(&T, Value) -> bool + Send + Sync>;

/// Accessor backed by closures.
///
/// # Example
///
/// ```
/// use lattice_grid::{FnAccessor, Value, ValueAccessor};
///
/// struct Row { score: i64 }
///
/// let score = FnAccessor::new(|row: &Row| Value::I64(row.score));
/// assert_eq!(score.get(&Row { score: 3 }), Value::I64(3));
/// ```
pub struct FnAccessor<T> {
    getter: Getter<T>,
    setter: Option<Setter<T>>,
}

impl<T> FnAccessor<T> {
    /// Creates a read-only accessor.
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        Self {
            getter: Arc::new(getter),
            setter: None,
        }
    }

    /// Adds a setter.
    pub fn with_setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&T, Value) -> bool + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(setter));
        self
    }

    /// Wraps the accessor for sharing.
    pub fn shared(self) -> SharedAccessor<T>
    where
        T: 'static,
    {
        Arc::new(self)
    }
}

impl<T> ValueAccessor<T> for FnAccessor<T> {
    fn get(&self, item: &T) -> Value {
        (self.getter)(item)
    }

    fn set(&self, item: &T, value: Value) -> bool {
        self.setter.as_ref().is_some_and(|setter| setter(item, value))
    }
}

impl<T> fmt::Debug for FnAccessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAccessor")
            .field("writable", &self.setter.is_some())
            .finish()
    }
}

/// Accessor that resolves a dotted property path such as `"owner.name"`.
///
/// The first segment is looked up with [`DataItem::property`], the rest with
/// [`ObjectValue::property`](crate::ObjectValue::property). Missing segments
/// resolve to [`Value::None`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPathAccessor {
    path: String,
}

impl PropertyPathAccessor {
    /// Creates an accessor for `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// The dotted path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Resolves the path, returning `None` if any segment is missing.
    pub fn resolve<T: DataItem + ?Sized>(&self, item: &T) -> Option<Value> {
        resolve_path(item, &self.path)
    }
}

impl<T: DataItem> ValueAccessor<T> for PropertyPathAccessor {
    fn get(&self, item: &T) -> Value {
        self.resolve(item).unwrap_or_default()
    }
}

/// Resolves a dotted property path against an item.
pub fn resolve_path<T: DataItem + ?Sized>(item: &T, path: &str) -> Option<Value> {
    let mut segments = path.split('.').map(str::trim);
    let first = segments.next().filter(|segment| !segment.is_empty())?;
    let mut value = item.property(first)?;
    for segment in segments {
        value = match &value {
            Value::Object(object) => object.property(segment)?,
            _ => return None,
        };
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use parking_lot::Mutex;

    use super::*;
    use crate::value::ObjectValue;

    #[derive(Debug)]
    struct Owner {
        name: String,
    }

    impl fmt::Display for Owner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.name)
        }
    }

    impl ObjectValue for Owner {
        fn type_name(&self) -> &'static str {
            "Owner"
        }

        fn property(&self, name: &str) -> Option<Value> {
            (name == "name").then(|| Value::from(self.name.as_str()))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Task {
        title: Mutex<String>,
        owner: Arc<Owner>,
    }

    impl DataItem for Task {
        fn property(&self, name: &str) -> Option<Value> {
            match name {
                "title" => Some(self.title.lock().clone().into()),
                "owner" => Some(Value::Object(self.owner.clone())),
                _ => None,
            }
        }
    }

    fn task() -> Task {
        Task {
            title: Mutex::new("Write docs".into()),
            owner: Arc::new(Owner { name: "Kim".into() }),
        }
    }

    #[test]
    fn property_paths_walk_nested_objects() {
        let task = task();
        assert_eq!(resolve_path(&task, "title"), Some("Write docs".into()));
        assert_eq!(resolve_path(&task, "owner.name"), Some("Kim".into()));
        assert_eq!(resolve_path(&task, "owner.age"), None);
        assert_eq!(resolve_path(&task, "title.length"), None);
        assert_eq!(resolve_path(&task, ""), None);

        let accessor = PropertyPathAccessor::new("missing");
        assert_eq!(ValueAccessor::<Task>::get(&accessor, &task), Value::None);
    }

    #[test]
    fn fn_accessor_reads_and_writes() {
        let accessor = FnAccessor::new(|task: &Task| Value::from(task.title.lock().clone()))
            .with_setter(|task: &Task, value: Value| match value {
                Value::String(title) => {
                    *task.title.lock() = title;
                    true
                }
                _ => false,
            });

        let task = task();
        assert!(accessor.set(&task, "Review".into()));
        assert!(!accessor.set(&task, Value::I32(1)));
        assert_eq!(accessor.get(&task), Value::from("Review"));

        let read_only = FnAccessor::new(|_: &Task| Value::None);
        assert!(!read_only.set(&task, "x".into()));
    }
}
