//! Signed item counters
//!
//! Quantities of fungible items are integer maps keyed by item type.
//! Sign convention: positive entries add stock, negative entries remove it
//! (a negative counter is a *demand*). Missing keys always read as zero.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Add, Neg, Sub};

/// Item type tag (e.g. "screws")
pub type ItemType = String;

/// Integer-valued map from item type to quantity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemCounter(IndexMap<ItemType, i64>);

impl ItemCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quantity of an item type, zero when absent
    pub fn get(&self, item_type: &str) -> i64 {
        self.0.get(item_type).copied().unwrap_or(0)
    }

    /// Overwrite the quantity of an item type
    pub fn set(&mut self, item_type: impl Into<ItemType>, quantity: i64) {
        self.0.insert(item_type.into(), quantity);
    }

    /// Add `delta` to a single item type
    pub fn add_item(&mut self, item_type: impl Into<ItemType>, delta: i64) {
        *self.0.entry(item_type.into()).or_insert(0) += delta;
    }

    /// Merge another counter into this one (element-wise addition)
    pub fn update(&mut self, other: &ItemCounter) {
        for (item_type, delta) in &other.0 {
            self.add_item(item_type.clone(), *delta);
        }
    }

    /// Subtract another counter element-wise, keeping signed results
    pub fn subtract(&mut self, other: &ItemCounter) {
        for (item_type, delta) in &other.0 {
            self.add_item(item_type.clone(), -*delta);
        }
    }

    /// Entries with a strictly positive quantity
    pub fn positive_part(&self) -> ItemCounter {
        self.0
            .iter()
            .filter(|(_, q)| **q > 0)
            .map(|(k, q)| (k.clone(), *q))
            .collect()
    }

    /// Entries with a strictly negative quantity
    pub fn negative_part(&self) -> ItemCounter {
        self.0
            .iter()
            .filter(|(_, q)| **q < 0)
            .map(|(k, q)| (k.clone(), *q))
            .collect()
    }

    /// Restrict to the item types present both here and in `item_types`
    pub fn projection<'a>(&self, item_types: impl IntoIterator<Item = &'a str>) -> ItemCounter {
        let wanted: BTreeSet<&str> = item_types.into_iter().collect();
        self.0
            .iter()
            .filter(|(k, _)| wanted.contains(k.as_str()))
            .map(|(k, q)| (k.clone(), *q))
            .collect()
    }

    /// Item types present in both counters
    pub fn intersection_keys(&self, other: &ItemCounter) -> BTreeSet<ItemType> {
        self.0
            .keys()
            .filter(|k| other.0.contains_key(*k))
            .cloned()
            .collect()
    }

    /// Element-wise `<=` over the union of keys, missing keys read as zero
    pub fn is_le(&self, other: &ItemCounter) -> bool {
        self.0.keys().chain(other.0.keys()).all(|k| self.get(k) <= other.get(k))
    }

    /// Sum of all quantities
    pub fn total(&self) -> i64 {
        self.0.values().sum()
    }

    /// True when every entry is zero (or there are none)
    pub fn is_zero(&self) -> bool {
        self.0.values().all(|q| *q == 0)
    }

    /// Item types with an entry, including zero entries
    pub fn item_types(&self) -> impl Iterator<Item = &ItemType> {
        self.0.keys()
    }

    pub fn contains(&self, item_type: &str) -> bool {
        self.0.contains_key(item_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemType, &i64)> {
        self.0.iter()
    }

    /// Number of entries, including zero entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for ItemCounter {
    fn eq(&self, other: &Self) -> bool {
        self.0.keys().chain(other.0.keys()).all(|k| self.get(k) == other.get(k))
    }
}

impl Eq for ItemCounter {}

impl<K: Into<ItemType>> FromIterator<(K, i64)> for ItemCounter {
    fn from_iter<I: IntoIterator<Item = (K, i64)>>(iter: I) -> Self {
        let mut counter = ItemCounter::new();
        for (k, q) in iter {
            counter.add_item(k, q);
        }
        counter
    }
}

impl<K: Into<ItemType>, const N: usize> From<[(K, i64); N]> for ItemCounter {
    fn from(pairs: [(K, i64); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl Add for &ItemCounter {
    type Output = ItemCounter;

    fn add(self, rhs: &ItemCounter) -> ItemCounter {
        let mut out = self.clone();
        out.update(rhs);
        out
    }
}

impl Sub for &ItemCounter {
    type Output = ItemCounter;

    fn sub(self, rhs: &ItemCounter) -> ItemCounter {
        let mut out = self.clone();
        out.subtract(rhs);
        out
    }
}

impl Neg for &ItemCounter {
    type Output = ItemCounter;

    fn neg(self) -> ItemCounter {
        self.0.iter().map(|(k, q)| (k.clone(), -*q)).collect()
    }
}

impl fmt::Display for ItemCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, q)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", k, q)?;
        }
        write!(f, "}}")
    }
}

/// Item counters keyed by collection point name
///
/// Used both as a quantity *state* (current stock per collection point)
/// and as a quantity *operation* (signed deltas to apply).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionCounter(IndexMap<String, ItemCounter>);

impl CollectionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter of a collection point, if present
    pub fn get(&self, collection_point: &str) -> Option<&ItemCounter> {
        self.0.get(collection_point)
    }

    /// Counter of a collection point, created empty on first access
    pub fn entry(&mut self, collection_point: impl Into<String>) -> &mut ItemCounter {
        self.0.entry(collection_point.into()).or_default()
    }

    pub fn insert(&mut self, collection_point: impl Into<String>, counter: ItemCounter) {
        self.0.insert(collection_point.into(), counter);
    }

    /// Merge another collection counter into this one
    pub fn update(&mut self, other: &CollectionCounter) {
        for (cp, counter) in &other.0 {
            self.entry(cp.clone()).update(counter);
        }
    }

    /// Restrict to the given collection points
    pub fn projection<'a>(&self, collection_points: impl IntoIterator<Item = &'a str>) -> CollectionCounter {
        let wanted: BTreeSet<&str> = collection_points.into_iter().collect();
        CollectionCounter(
            self.0
                .iter()
                .filter(|(k, _)| wanted.contains(k.as_str()))
                .map(|(k, c)| (k.clone(), c.clone()))
                .collect(),
        )
    }

    /// Collection point names with an entry
    pub fn collection_points(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ItemCounter)> {
        self.0.iter()
    }

    /// True when no collection point changes
    pub fn is_zero(&self) -> bool {
        self.0.values().all(ItemCounter::is_zero)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, ItemCounter)> for CollectionCounter {
    fn from_iter<I: IntoIterator<Item = (K, ItemCounter)>>(iter: I) -> Self {
        let mut counter = CollectionCounter::new();
        for (cp, c) in iter {
            counter.entry(cp).update(&c);
        }
        counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_reads_as_zero() {
        let c = ItemCounter::from([("A", 3)]);
        assert_eq!(c.get("A"), 3);
        assert_eq!(c.get("B"), 0);
        assert_eq!(ItemCounter::from([("A", 0)]), ItemCounter::new());
    }

    #[test]
    fn test_update_and_subtract_keep_sign() {
        let mut c = ItemCounter::from([("A", 5)]);
        c.update(&ItemCounter::from([("A", -7), ("B", 2)]));
        assert_eq!(c.get("A"), -2);
        assert_eq!(c.get("B"), 2);

        let diff = &ItemCounter::from([("A", 1)]) - &ItemCounter::from([("A", 4)]);
        assert_eq!(diff.get("A"), -3);
    }

    #[test]
    fn test_positive_and_negative_part() {
        let c = ItemCounter::from([("A", 2), ("B", -3), ("C", 0)]);
        assert_eq!(c.positive_part(), ItemCounter::from([("A", 2)]));
        assert_eq!(c.negative_part(), ItemCounter::from([("B", -3)]));
        assert_eq!(c.positive_part().len(), 1);
        assert_eq!(-&c, ItemCounter::from([("A", -2), ("B", 3)]));
    }

    #[test]
    fn test_projection_uses_intersection() {
        let c = ItemCounter::from([("A", 2), ("B", 3)]);
        let p = c.projection(["B", "Z"]);
        assert_eq!(p.len(), 1);
        assert_eq!(p.get("B"), 3);
        assert!(!p.contains("Z"));
    }

    #[test]
    fn test_is_le() {
        let small = ItemCounter::from([("A", 2)]);
        let big = ItemCounter::from([("A", 2), ("B", 1)]);
        assert!(small.is_le(&big));
        assert!(!big.is_le(&small));
        // negative entries are below a missing key
        assert!(ItemCounter::from([("C", -1)]).is_le(&ItemCounter::new()));
    }

    #[test]
    fn test_collection_counter_update() {
        let mut state = CollectionCounter::from_iter([("c1", ItemCounter::from([("A", 5)]))]);
        let ops = CollectionCounter::from_iter([
            ("c1", ItemCounter::from([("A", -2)])),
            ("c2", ItemCounter::from([("B", 4)])),
        ]);
        state.update(&ops);
        assert_eq!(state.get("c1").map(|c| c.get("A")), Some(3));
        assert_eq!(state.get("c2").map(|c| c.get("B")), Some(4));
        assert_eq!(state.projection(["c2"]).len(), 1);
    }
}
