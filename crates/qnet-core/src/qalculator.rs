//! Quantity calculators
//!
//! A qalculator turns a binding and the quantity state of a transition's
//! connected collection points into signed counter deltas. The deltas are
//! applied once, when the firing starts.

use crate::{BindingFunction, CollectionCounter, ItemCounter, ObjectStore};

/// Policy computing the quantity operations of a firing
pub trait Qalculator {
    /// Deltas per collection point; negative entries remove items
    fn determine_quantity_operations(
        &self,
        state: &CollectionCounter,
        binding: &BindingFunction,
        objects: &ObjectStore,
    ) -> CollectionCounter;
}

impl<F> Qalculator for F
where
    F: Fn(&CollectionCounter, &BindingFunction, &ObjectStore) -> CollectionCounter,
{
    fn determine_quantity_operations(
        &self,
        state: &CollectionCounter,
        binding: &BindingFunction,
        objects: &ObjectStore,
    ) -> CollectionCounter {
        self(state, binding, objects)
    }
}

/// No quantity effect
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultQalculator;

impl Qalculator for DefaultQalculator {
    fn determine_quantity_operations(
        &self,
        _state: &CollectionCounter,
        _binding: &BindingFunction,
        _objects: &ObjectStore,
    ) -> CollectionCounter {
        CollectionCounter::new()
    }
}

/// Restrict a counter to a subset of item types
pub fn counter_projection<'a>(counter: &ItemCounter, item_types: impl IntoIterator<Item = &'a str>) -> ItemCounter {
    counter.projection(item_types)
}

/// Quantity update removing as much of `demand` as is available
///
/// `demand` carries negative entries. If the whole demand is on hand it is
/// returned unchanged; otherwise each demanded item type is reduced by
/// exactly what `available` holds of it, so the helper never drives a
/// level below zero.
pub fn quantity_update_removing_available_items(demand: &ItemCounter, available: &ItemCounter) -> ItemCounter {
    let required = (-demand).positive_part();
    let on_hand = counter_projection(available, demand.item_types().map(String::as_str));
    if required.is_le(&on_hand) {
        return demand.clone();
    }
    required
        .iter()
        .filter_map(|(item, wanted)| {
            let removed = (*wanted).min(on_hand.get(item).max(0));
            (removed > 0).then(|| (item.clone(), -removed))
        })
        .collect()
}

/// Part of `full` not covered by `possible` (signed difference)
pub fn determine_remaining_demand(possible: &ItemCounter, full: &ItemCounter) -> ItemCounter {
    full - possible
}
