//! Filter operators and the predicate cache.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use lattice_grid_core::logging::targets;

use crate::culture::{Culture, StringComparison};
use crate::value::{try_compare, values_equal, Value};
use crate::view::FilterFn;

/// Comparison applied by a filter descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterOperator {
    #[default]
    Equals,
    NotEquals,
    /// String containment; non-strings never match.
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    /// Inclusive range; takes exactly two operands.
    Between,
    /// Membership in the operand list.
    In,
    /// Evaluated by a descriptor or column predicate. Without one, every
    /// item matches.
    Custom,
}

/// Brings an operand into the value's type family, e.g. `"5"` for an integer
/// column.
fn convert_operand(value: &Value, operand: &Value) -> Option<Value> {
    if value.is_none() || operand.is_none() {
        return Some(operand.clone());
    }
    operand.coerce_like(value)
}

fn equals(value: &Value, operand: &Value, comparison: StringComparison, culture: &Culture) -> bool {
    if let (Some(a), Some(b)) = (value.as_str(), operand.as_str()) {
        return comparison.equals(a, b, culture);
    }
    convert_operand(value, operand).is_some_and(|operand| values_equal(value, &operand))
}

fn ordering(value: &Value, operand: &Value) -> Option<Ordering> {
    try_compare(value, &convert_operand(value, operand)?)
}

/// Evaluates `operator` for one cell value.
///
/// Values that cannot be compared or converted never match; nothing here
/// fails.
pub fn evaluate(
    operator: FilterOperator,
    value: &Value,
    operands: &[Value],
    comparison: StringComparison,
    culture: &Culture,
) -> bool {
    let first = operands.first().unwrap_or(&Value::None);
    let strings = || value.as_str().zip(first.as_str());
    match operator {
        FilterOperator::Equals => equals(value, first, comparison, culture),
        FilterOperator::NotEquals => !equals(value, first, comparison, culture),
        FilterOperator::Contains => strings().is_some_and(|(a, b)| comparison.contains(a, b)),
        FilterOperator::StartsWith => strings().is_some_and(|(a, b)| comparison.starts_with(a, b)),
        FilterOperator::EndsWith => strings().is_some_and(|(a, b)| comparison.ends_with(a, b)),
        FilterOperator::GreaterThan => ordering(value, first).is_some_and(Ordering::is_gt),
        FilterOperator::GreaterThanOrEqual => ordering(value, first).is_some_and(Ordering::is_ge),
        FilterOperator::LessThan => ordering(value, first).is_some_and(Ordering::is_lt),
        FilterOperator::LessThanOrEqual => ordering(value, first).is_some_and(Ordering::is_le),
        FilterOperator::Between => {
            let [low, high] = operands else {
                tracing::debug!(target: targets::ADAPTER, operands = operands.len(), "between needs exactly two bounds");
                return false;
            };
            match (ordering(value, low), ordering(value, high)) {
                (Some(from_low), Some(from_high)) => from_low.is_ge() && from_high.is_le(),
                _ => {
                    tracing::debug!(target: targets::ADAPTER, %value, %low, %high, "between bound does not compare with the value");
                    false
                }
            }
        }
        FilterOperator::In => operands.iter().any(|operand| {
            let hit = equals(value, operand, comparison, culture);
            if !hit && convert_operand(value, operand).is_none() && value.as_str().is_none() {
                tracing::debug!(target: targets::ADAPTER, %value, %operand, "in operand does not convert to the value's type");
            }
            hit
        }),
        FilterOperator::Custom => true,
    }
}

/// Identity of a built predicate: the descriptor's structure plus the
/// identity of whatever it was resolved through.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PredicateKey {
    pub(crate) column_id: String,
    pub(crate) operator: FilterOperator,
    pub(crate) operands: Vec<Value>,
    pub(crate) property_path: Option<String>,
    pub(crate) comparison: StringComparison,
    /// Address of the accessor, factory or descriptor predicate used.
    pub(crate) resolved: usize,
}

impl Eq for PredicateKey {}

impl Hash for PredicateKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.column_id.hash(state);
        self.operator.hash(state);
        for operand in &self.operands {
            operand.to_string().hash(state);
        }
        self.property_path.hash(state);
        self.comparison.hash(state);
        self.resolved.hash(state);
    }
}

/// Built predicates by key.
pub(crate) struct PredicateCache<T> {
    entries: HashMap<PredicateKey, FilterFn<T>>,
    max_size: usize,
}

impl<T> PredicateCache<T> {
    pub(crate) fn with_capacity(max_size: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(max_size),
            max_size,
        }
    }

    pub(crate) fn get(&self, key: &PredicateKey) -> Option<FilterFn<T>> {
        self.entries.get(key).cloned()
    }

    pub(crate) fn insert(&mut self, key: PredicateKey, predicate: FilterFn<T>) {
        // Simple eviction: clear half when full
        if self.entries.len() >= self.max_size {
            self.evict_half();
        }
        self.entries.insert(key, predicate);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn evict_half(&mut self) {
        let target = self.entries.len() / 2;
        let keys: Vec<_> = self.entries.keys().take(target).cloned().collect();
        for key in keys {
            self.entries.remove(&key);
        }
    }
}

impl<T> Default for PredicateCache<T> {
    fn default() -> Self {
        Self::with_capacity(256)
    }
}
