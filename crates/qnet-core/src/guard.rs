//! Guards gating transition enablement
//!
//! A guard is the conjunction of two optional predicates:
//! - an object guard over the bound objects
//! - a quantity guard over the binding and the connected quantity state
//!
//! A missing predicate always holds.

use crate::{BindingFunction, CollectionCounter, ItemCounter, ObjectStore};
use indexmap::IndexMap;
use std::fmt;

/// Predicate over the objects of a binding
///
/// Only input object types are bound when guards are evaluated, so an
/// object guard must not rely on objects created on binding.
pub trait ObjectGuard {
    fn evaluate(&self, binding: &BindingFunction, objects: &ObjectStore) -> bool;
}

impl<F> ObjectGuard for F
where
    F: Fn(&BindingFunction, &ObjectStore) -> bool,
{
    fn evaluate(&self, binding: &BindingFunction, objects: &ObjectStore) -> bool {
        self(binding, objects)
    }
}

/// Predicate over a binding and the quantity state of the connected collection points
pub trait QuantityGuard {
    fn evaluate(&self, binding: &BindingFunction, state: &CollectionCounter) -> bool;

    /// Collection points the guard reads
    fn collection_points(&self) -> Vec<String> {
        Vec::new()
    }
}

impl<F> QuantityGuard for F
where
    F: Fn(&BindingFunction, &CollectionCounter) -> bool,
{
    fn evaluate(&self, binding: &BindingFunction, state: &CollectionCounter) -> bool {
        self(binding, state)
    }
}

/// Enables a transition while stock is small
///
/// Each collection point is paired with a threshold counter. An item type is
/// *below* its threshold when its current quantity is less than or equal to
/// the threshold; item types absent from the current marking count as zero.
/// Per collection point either all threshold item types must be below
/// (`all_item_types = true`) or at least one (`false`, the default). Across
/// collection points either all pairs must hold (`all_counters = true`, the
/// default) or any one of them.
#[derive(Debug, Clone, PartialEq)]
pub struct SmallStockGuard {
    thresholds: IndexMap<String, ItemCounter>,
    all_item_types: IndexMap<String, bool>,
    all_counters: bool,
}

impl SmallStockGuard {
    pub fn new(thresholds: &CollectionCounter) -> Self {
        let thresholds: IndexMap<String, ItemCounter> =
            thresholds.iter().map(|(cp, c)| (cp.clone(), c.clone())).collect();
        let all_item_types = thresholds.keys().map(|cp| (cp.clone(), false)).collect();
        Self {
            thresholds,
            all_item_types,
            all_counters: true,
        }
    }

    /// Require all (true) or any (false) item type of one collection point to be below
    pub fn with_all_item_types(mut self, collection_point: impl Into<String>, all: bool) -> Self {
        self.all_item_types.insert(collection_point.into(), all);
        self
    }

    /// Require all (true) or any (false) collection point to satisfy its condition
    pub fn with_all_counters(mut self, all: bool) -> Self {
        self.all_counters = all;
        self
    }

    pub fn thresholds(&self) -> impl Iterator<Item = (&String, &ItemCounter)> {
        self.thresholds.iter()
    }

    /// Threshold item types whose level exceeds the threshold
    fn above_threshold(level: &ItemCounter, threshold: &ItemCounter) -> ItemCounter {
        let relevant: ItemCounter = threshold
            .item_types()
            .map(|item| (item.clone(), level.get(item)))
            .collect();
        (&relevant - threshold).positive_part()
    }

    /// True when no threshold item type is above its threshold
    pub fn item_types_all_below(level: &ItemCounter, threshold: &ItemCounter) -> bool {
        Self::above_threshold(level, threshold).is_empty()
    }

    /// True when at least one threshold item type is at or below its threshold
    pub fn item_types_any_below(level: &ItemCounter, threshold: &ItemCounter) -> bool {
        Self::above_threshold(level, threshold).len() < threshold.len()
    }

    fn counter_holds(&self, collection_point: &str, threshold: &ItemCounter, state: &CollectionCounter) -> bool {
        let empty = ItemCounter::new();
        let level = state.get(collection_point).unwrap_or(&empty);
        if self.all_item_types.get(collection_point).copied().unwrap_or(false) {
            Self::item_types_all_below(level, threshold)
        } else {
            Self::item_types_any_below(level, threshold)
        }
    }
}

impl QuantityGuard for SmallStockGuard {
    fn evaluate(&self, _binding: &BindingFunction, state: &CollectionCounter) -> bool {
        let mut pairs = self.thresholds.iter();
        if self.all_counters {
            pairs.all(|(cp, threshold)| self.counter_holds(cp, threshold, state))
        } else {
            pairs.any(|(cp, threshold)| self.counter_holds(cp, threshold, state))
        }
    }

    fn collection_points(&self) -> Vec<String> {
        self.thresholds.keys().cloned().collect()
    }
}

/// Composite guard of a transition
#[derive(Default)]
pub struct Guard {
    object_guard: Option<Box<dyn ObjectGuard>>,
    quantity_guard: Option<Box<dyn QuantityGuard>>,
}

impl Guard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_object_guard(&self) -> bool {
        self.object_guard.is_some()
    }

    pub fn has_quantity_guard(&self) -> bool {
        self.quantity_guard.is_some()
    }

    pub fn set_object_guard(&mut self, guard: Box<dyn ObjectGuard>) {
        self.object_guard = Some(guard);
    }

    pub fn set_quantity_guard(&mut self, guard: Box<dyn QuantityGuard>) {
        self.quantity_guard = Some(guard);
    }

    pub fn quantity_guard(&self) -> Option<&dyn QuantityGuard> {
        self.quantity_guard.as_deref()
    }

    pub fn check_objects(&self, binding: &BindingFunction, objects: &ObjectStore) -> bool {
        self.object_guard
            .as_ref()
            .map_or(true, |g| g.evaluate(binding, objects))
    }

    pub fn check_quantities(&self, binding: &BindingFunction, state: &CollectionCounter) -> bool {
        self.quantity_guard
            .as_ref()
            .map_or(true, |g| g.evaluate(binding, state))
    }

    /// Object guard AND quantity guard
    pub fn check(&self, binding: &BindingFunction, state: &CollectionCounter, objects: &ObjectStore) -> bool {
        self.check_objects(binding, objects) && self.check_quantities(binding, state)
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("object_guard", &self.has_object_guard())
            .field("quantity_guard", &self.has_quantity_guard())
            .finish()
    }
}
