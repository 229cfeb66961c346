//! Dynamically typed cell values and their comparison rules.
//!
//! Sorting, grouping and filtering all look at items through [`Value`]s. The
//! comparison helpers in this module never fail loudly: when two values cannot
//! be compared they report `None` and the caller decides what that means
//! (filters treat it as "no match", sorting falls back to a fixed type order).

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::culture::Culture;

/// Capability trait for user-defined values stored in [`Value::Object`].
///
/// Implement it for domain types that should take part in sorting and
/// filtering. Every method has a permissive default.
pub trait ObjectValue: fmt::Debug + fmt::Display + Send + Sync {
    /// Name used to detect "same type" pairs for the string fallback.
    fn type_name(&self) -> &'static str;

    /// Compares with another object value.
    ///
    /// Return `None` when the two values are not comparable with each other,
    /// or `Some(Err(..))` when the comparison itself failed.
    fn compare_to(&self, _other: &dyn ObjectValue) -> Option<Result<Ordering, String>> {
        None
    }

    /// Looks up a nested property, used by dotted property paths.
    fn property(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Returns `self` as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// A dynamically typed cell value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// No value (null).
    #[default]
    None,
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    I32(i32),
    /// 64-bit signed integer.
    I64(i64),
    /// 32-bit unsigned integer.
    U32(u32),
    /// 64-bit unsigned integer.
    U64(u64),
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
    /// Text.
    String(String),
    /// Date and time without a time zone.
    DateTime(NaiveDateTime),
    /// User-defined value.
    Object(Arc<dyn ObjectValue>),
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i128),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(f) => f,
        }
    }
}

impl Value {
    /// Creates an object value.
    pub fn object(value: impl ObjectValue + 'static) -> Self {
        Value::Object(Arc::new(value))
    }

    /// Returns `true` for [`Value::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Returns `true` for any integer or float variant.
    pub fn is_numeric(&self) -> bool {
        self.as_number().is_some()
    }

    /// Returns the text if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as `i64` if it is an integer that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self.as_number()? {
            Number::Int(n) => i64::try_from(n).ok(),
            Number::Float(_) => None,
        }
    }

    /// Returns the value as `f64` if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        self.as_number().map(Number::as_f64)
    }

    /// Returns the boolean if this is a bool value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the object if this is an object value.
    pub fn as_object(&self) -> Option<&Arc<dyn ObjectValue>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    fn as_number(&self) -> Option<Number> {
        Some(match self {
            Value::I32(n) => Number::Int(i128::from(*n)),
            Value::I64(n) => Number::Int(i128::from(*n)),
            Value::U32(n) => Number::Int(i128::from(*n)),
            Value::U64(n) => Number::Int(i128::from(*n)),
            Value::F32(f) => Number::Float(f64::from(*f)),
            Value::F64(f) => Number::Float(*f),
            _ => return None,
        })
    }

    /// Position of the variant family in the fallback sort order.
    fn type_rank(&self) -> u8 {
        match self {
            Value::None => 0,
            Value::Bool(_) => 1,
            Value::I32(_)
            | Value::I64(_)
            | Value::U32(_)
            | Value::U64(_)
            | Value::F32(_)
            | Value::F64(_) => 2,
            Value::DateTime(_) => 3,
            Value::String(_) => 4,
            Value::Object(_) => 5,
        }
    }

    /// Converts this value into the type family of `target`, if possible.
    ///
    /// Used by filter operators whose bounds arrive as text (for example a
    /// `"5"` typed into a filter box compared against integer cells).
    pub fn coerce_like(&self, target: &Value) -> Option<Value> {
        if self.type_rank() == target.type_rank() {
            return Some(self.clone());
        }
        let text = self.as_str()?.trim();
        match target {
            Value::I32(_) | Value::I64(_) | Value::U32(_) | Value::U64(_) => text
                .parse::<i64>()
                .map(Value::I64)
                .or_else(|_| text.parse::<f64>().map(Value::F64))
                .ok(),
            Value::F32(_) | Value::F64(_) => text.parse::<f64>().map(Value::F64).ok(),
            Value::Bool(_) => text.parse::<bool>().map(Value::Bool).ok(),
            Value::DateTime(_) => NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
                .map(Value::DateTime)
                .ok(),
            _ => None,
        }
    }
}

fn compare_numbers(a: Number, b: Number) -> Option<Ordering> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => Some(x.cmp(&y)),
        _ => a.as_f64().partial_cmp(&b.as_f64()),
    }
}

fn compare_objects(a: &Arc<dyn ObjectValue>, b: &Arc<dyn ObjectValue>) -> Option<Ordering> {
    if Arc::ptr_eq(a, b) {
        return Some(Ordering::Equal);
    }
    match a.compare_to(b.as_ref()) {
        Some(Ok(ordering)) => Some(ordering),
        Some(Err(message)) => {
            tracing::trace!(
                target: lattice_grid_core::logging::targets::VIEW,
                type_name = a.type_name(),
                %message,
                "object comparison failed"
            );
            None
        }
        None if a.type_name() == b.type_name() => Some(a.to_string().cmp(&b.to_string())),
        None => None,
    }
}

/// Compares two values, returning `None` when they cannot be compared.
///
/// - null equals null and sorts before everything else
/// - numeric values compare by value across widths (`I32(5) == I64(5)`)
/// - user objects compare through [`ObjectValue::compare_to`]; two
///   non-comparable objects of the same type fall back to their string form;
///   a failing comparison yields `None`
pub fn try_compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::None, Value::None) => Some(Ordering::Equal),
        (Value::None, _) => Some(Ordering::Less),
        (_, Value::None) => Some(Ordering::Greater),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
        (Value::Object(x), Value::Object(y)) => compare_objects(x, y),
        _ => compare_numbers(a.as_number()?, b.as_number()?),
    }
}

/// Value equality with numeric widening.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => {
            Arc::ptr_eq(x, y) || matches!(x.compare_to(y.as_ref()), Some(Ok(Ordering::Equal)))
        }
        (Value::F32(_) | Value::F64(_), _) | (_, Value::F32(_) | Value::F64(_)) => {
            matches!(try_compare(a, b), Some(Ordering::Equal)) && a.is_numeric() && b.is_numeric()
        }
        _ => a.type_rank() == b.type_rank() && try_compare(a, b) == Some(Ordering::Equal),
    }
}

/// Total order used for sorting.
///
/// Strings compare with `culture`. Pairs that [`try_compare`] cannot order
/// fall back to the type family order, then to their string form, so the
/// result is always usable by a sort.
pub fn compare_for_sort(a: &Value, b: &Value, culture: &Culture) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => culture.compare(x, y),
        _ => {
            if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
                return match (x, y) {
                    (Number::Int(x), Number::Int(y)) => x.cmp(&y),
                    _ => x.as_f64().total_cmp(&y.as_f64()),
                };
            }
            try_compare(a, b).unwrap_or_else(|| {
                a.type_rank()
                    .cmp(&b.type_rank())
                    .then_with(|| a.to_string().cmp(&b.to_string()))
            })
        }
    }
}

impl PartialEq for Value {
    /// Structural equality: same variant and same payload. Use
    /// [`values_equal`] for comparisons with numeric widening.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::I32(n) => write!(f, "{n}"),
            Value::I64(n) => write!(f, "{n}"),
            Value::U32(n) => write!(f, "{n}"),
            Value::U64(n) => write!(f, "{n}"),
            Value::F32(n) => write!(f, "{n}"),
            Value::F64(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::Object(o) => write!(f, "{o}"),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    NaiveDateTime => DateTime,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::String(value.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::None, Into::into)
    }
}
