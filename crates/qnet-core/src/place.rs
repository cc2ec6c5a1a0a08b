//! Places: object places holding typed tokens and collection points holding item counters

use crate::{ArcId, Error, ItemCounter, ObjectId, ObjectType, Result};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Multiset of object tokens
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMultiset(BTreeMap<ObjectId, usize>);

impl ObjectMultiset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: ObjectId) {
        *self.0.entry(id).or_insert(0) += 1;
    }

    /// Remove one copy; false if the token was absent
    pub fn remove(&mut self, id: ObjectId) -> bool {
        match self.0.get_mut(&id) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                self.0.remove(&id);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.0.contains_key(&id)
    }

    pub fn count(&self, id: ObjectId) -> usize {
        self.0.get(&id).copied().unwrap_or(0)
    }

    /// Distinct tokens in ascending id order
    pub fn distinct(&self) -> BTreeSet<ObjectId> {
        self.0.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.0.keys().copied()
    }

    /// Number of tokens, counting copies
    pub fn len(&self) -> usize {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ObjectId> for ObjectMultiset {
    fn from_iter<I: IntoIterator<Item = ObjectId>>(iter: I) -> Self {
        let mut set = ObjectMultiset::new();
        for id in iter {
            set.add(id);
        }
        set
    }
}

/// Place holding discrete object tokens of one type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectPlace {
    pub object_type: ObjectType,
    pub marking: ObjectMultiset,
}

impl ObjectPlace {
    pub fn new(object_type: impl Into<ObjectType>) -> Self {
        Self {
            object_type: object_type.into(),
            marking: ObjectMultiset::new(),
        }
    }
}

/// Place holding fungible item quantities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionPoint {
    /// Every item type ever observed at this point
    pub item_types: IndexSet<String>,
    pub marking: ItemCounter,
}

impl CollectionPoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a signed delta into the stock
    pub fn update_marking(&mut self, delta: &ItemCounter) {
        self.item_types.extend(delta.item_types().cloned());
        self.marking.update(delta);
    }
}

/// Place variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaceKind {
    Object(ObjectPlace),
    Collection(CollectionPoint),
}

/// A named place in a quantity net
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub label: Option<String>,
    pub kind: PlaceKind,
    pub input_arcs: Vec<ArcId>,
    pub output_arcs: Vec<ArcId>,
    /// Explicit initial/final flags; inferred from the arcs when unset
    pub initial: Option<bool>,
    pub is_final: Option<bool>,
}

impl Place {
    pub fn object_place(name: impl Into<String>, object_type: impl Into<ObjectType>) -> Self {
        Self::with_kind(name, PlaceKind::Object(ObjectPlace::new(object_type)))
    }

    pub fn collection_point(name: impl Into<String>) -> Self {
        Self::with_kind(name, PlaceKind::Collection(CollectionPoint::new()))
    }

    fn with_kind(name: impl Into<String>, kind: PlaceKind) -> Self {
        Self {
            name: name.into(),
            label: None,
            kind,
            input_arcs: Vec::new(),
            output_arcs: Vec::new(),
            initial: None,
            is_final: None,
        }
    }

    pub fn as_object_place(&self) -> Option<&ObjectPlace> {
        match &self.kind {
            PlaceKind::Object(p) => Some(p),
            PlaceKind::Collection(_) => None,
        }
    }

    pub fn as_object_place_mut(&mut self) -> Option<&mut ObjectPlace> {
        match &mut self.kind {
            PlaceKind::Object(p) => Some(p),
            PlaceKind::Collection(_) => None,
        }
    }

    pub fn as_collection_point(&self) -> Option<&CollectionPoint> {
        match &self.kind {
            PlaceKind::Collection(c) => Some(c),
            PlaceKind::Object(_) => None,
        }
    }

    pub fn as_collection_point_mut(&mut self) -> Option<&mut CollectionPoint> {
        match &mut self.kind {
            PlaceKind::Collection(c) => Some(c),
            PlaceKind::Object(_) => None,
        }
    }

    pub fn is_collection_point(&self) -> bool {
        matches!(self.kind, PlaceKind::Collection(_))
    }

    /// Object type of an object place
    pub fn object_type(&self) -> Option<&ObjectType> {
        self.as_object_place().map(|p| &p.object_type)
    }

    pub fn is_initial(&self) -> bool {
        self.initial.unwrap_or(self.input_arcs.is_empty())
    }

    pub fn is_final(&self) -> bool {
        self.is_final.unwrap_or(self.output_arcs.is_empty())
    }

    /// A collection point without a label is not logged
    pub fn is_silent(&self) -> bool {
        self.label.is_none()
    }

    /// Add tokens of `object_type`
    ///
    /// Fails on a type mismatch or when called on a collection point.
    pub fn add_tokens(
        &mut self,
        object_type: &ObjectType,
        tokens: impl IntoIterator<Item = ObjectId>,
    ) -> Result<()> {
        let name = &self.name;
        match &mut self.kind {
            PlaceKind::Collection(_) => Err(Error::DiscreteTokenOnCollectionPoint(name.clone())),
            PlaceKind::Object(place) => {
                if &place.object_type != object_type {
                    return Err(Error::TypeMismatch {
                        place: name.clone(),
                        expected: place.object_type.clone(),
                        got: object_type.clone(),
                    });
                }
                for token in tokens {
                    place.marking.add(token);
                }
                Ok(())
            }
        }
    }

    /// Remove one copy of each token; nothing is removed if any token is absent
    pub fn remove_tokens(&mut self, tokens: &BTreeSet<ObjectId>) -> Result<()> {
        let name = &self.name;
        match &mut self.kind {
            PlaceKind::Collection(_) => Err(Error::DiscreteTokenOnCollectionPoint(name.clone())),
            PlaceKind::Object(place) => {
                if let Some(missing) = tokens.iter().find(|t| !place.marking.contains(**t)) {
                    return Err(Error::TokenNotInPlace {
                        place: name.clone(),
                        object: *missing,
                    });
                }
                for token in tokens {
                    place.marking.remove(*token);
                }
                Ok(())
            }
        }
    }

    /// Apply a quantity delta; fails on object places
    pub fn update_marking(&mut self, delta: &ItemCounter) -> Result<()> {
        match &mut self.kind {
            PlaceKind::Collection(cp) => {
                cp.update_marking(delta);
                Ok(())
            }
            PlaceKind::Object(_) => Err(Error::NotACollectionPoint(self.name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> BTreeSet<ObjectId> {
        raw.iter().map(|r| ObjectId::new(*r)).collect()
    }

    #[test]
    fn test_multiset_counts_copies() {
        let mut set: ObjectMultiset = [ObjectId::new(1), ObjectId::new(1), ObjectId::new(2)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 3);
        assert_eq!(set.distinct().len(), 2);
        assert!(set.remove(ObjectId::new(1)));
        assert_eq!(set.count(ObjectId::new(1)), 1);
        assert!(!set.remove(ObjectId::new(7)));
    }

    #[test]
    fn test_add_tokens_checks_type() {
        let mut place = Place::object_place("p1", "order");
        place.add_tokens(&"order".into(), [ObjectId::new(1)]).unwrap();
        let err = place.add_tokens(&"product".into(), [ObjectId::new(2)]).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert_eq!(place.as_object_place().unwrap().marking.len(), 1);
    }

    #[test]
    fn test_remove_tokens_is_all_or_nothing() {
        let mut place = Place::object_place("p1", "order");
        place.add_tokens(&"order".into(), [ObjectId::new(1), ObjectId::new(2)]).unwrap();

        let err = place.remove_tokens(&ids(&[1, 3])).unwrap_err();
        assert_eq!(
            err,
            Error::TokenNotInPlace {
                place: "p1".into(),
                object: ObjectId::new(3)
            }
        );
        assert_eq!(place.as_object_place().unwrap().marking.len(), 2);

        place.remove_tokens(&ids(&[1])).unwrap();
        assert_eq!(place.as_object_place().unwrap().marking.distinct(), ids(&[2]));
    }

    #[test]
    fn test_collection_point_rejects_tokens() {
        let mut cp = Place::collection_point("c1");
        assert!(matches!(
            cp.add_tokens(&"order".into(), [ObjectId::new(1)]),
            Err(Error::DiscreteTokenOnCollectionPoint(_))
        ));
        assert!(cp.remove_tokens(&ids(&[1])).is_err());
    }

    #[test]
    fn test_update_marking_tracks_item_types() {
        let mut cp = Place::collection_point("c1");
        cp.update_marking(&ItemCounter::from([("A", 5)])).unwrap();
        cp.update_marking(&ItemCounter::from([("A", 1), ("B", 0)])).unwrap();
        let point = cp.as_collection_point().unwrap();
        assert_eq!(point.marking.get("A"), 6);
        assert_eq!(point.item_types.len(), 2);
        assert!(cp.is_silent());

        let mut p = Place::object_place("p1", "order");
        assert!(p.update_marking(&ItemCounter::from([("A", 1)])).is_err());
    }

    #[test]
    fn test_initial_final_inference() {
        let mut place = Place::object_place("p1", "order");
        assert!(place.is_initial() && place.is_final());
        place.output_arcs.push(ArcId::new(0));
        assert!(place.is_initial());
        assert!(!place.is_final());
        place.initial = Some(false);
        assert!(!place.is_initial());
    }
}
