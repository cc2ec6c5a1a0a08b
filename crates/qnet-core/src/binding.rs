//! Binding functions and their enumeration
//!
//! A binding function assigns concrete objects to the object types of a
//! transition for one firing. Enumeration works per input object type:
//!
//! 1. intersect the markings of all input places of that type
//! 2. keep only active objects
//! 3. build the candidate subsets allowed by the type's cardinality
//!
//! The cross product of the per-type candidates is then filtered by the
//! transition's guard.

use crate::{
    CollectionCounter, Connections, Error, Guard, ObjectId, ObjectStatus, ObjectStore, ObjectType,
    Place, Result,
};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::trace;

/// Objects chosen per object type for one firing
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindingFunction(BTreeMap<ObjectType, BTreeSet<ObjectId>>);

impl BindingFunction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the objects bound for a type
    pub fn insert(&mut self, object_type: impl Into<ObjectType>, objects: impl IntoIterator<Item = ObjectId>) {
        self.0.insert(object_type.into(), objects.into_iter().collect());
    }

    /// Add objects to a type, creating the entry if needed
    pub fn extend(&mut self, object_type: impl Into<ObjectType>, objects: impl IntoIterator<Item = ObjectId>) {
        self.0.entry(object_type.into()).or_default().extend(objects);
    }

    /// Builder form of `insert`
    pub fn with(mut self, object_type: impl Into<ObjectType>, objects: impl IntoIterator<Item = ObjectId>) -> Self {
        self.insert(object_type, objects);
        self
    }

    pub fn get(&self, object_type: &ObjectType) -> Option<&BTreeSet<ObjectId>> {
        self.0.get(object_type)
    }

    pub fn contains_type(&self, object_type: &ObjectType) -> bool {
        self.0.contains_key(object_type)
    }

    pub fn object_types(&self) -> impl Iterator<Item = &ObjectType> {
        self.0.keys()
    }

    /// Every bound object across all types
    pub fn objects(&self) -> BTreeSet<ObjectId> {
        self.0.values().flatten().copied().collect()
    }

    pub fn contains_object(&self, id: ObjectId) -> bool {
        self.0.values().any(|set| set.contains(&id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectType, &BTreeSet<ObjectId>)> {
        self.0.iter()
    }

    /// Number of object types with an entry
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(ObjectType, BTreeSet<ObjectId>)> for BindingFunction {
    fn from_iter<I: IntoIterator<Item = (ObjectType, BTreeSet<ObjectId>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for BindingFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (ot, ids)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: [{}]", ot, ids.iter().join(", "))?;
        }
        write!(f, "}}")
    }
}

/// Number of objects of one type a firing binds
///
/// `required > 0` fixes the count exactly. `required == 0` makes the count
/// variable between `minimum` and `maximum`, where a maximum of 0 means
/// unbounded. Unset bounds default to `required`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cardinality {
    pub required: usize,
    pub minimum: Option<usize>,
    pub maximum: Option<usize>,
}

impl Default for Cardinality {
    fn default() -> Self {
        Self::exactly(1)
    }
}

impl Cardinality {
    pub fn exactly(required: usize) -> Self {
        Self {
            required,
            minimum: None,
            maximum: None,
        }
    }

    /// Variable count in `minimum..=maximum` (maximum 0 = unbounded)
    pub fn between(minimum: usize, maximum: usize) -> Self {
        Self {
            required: 0,
            minimum: Some(minimum),
            maximum: Some(maximum),
        }
    }

    pub fn minimum(&self) -> usize {
        self.minimum.unwrap_or(self.required)
    }

    pub fn maximum(&self) -> usize {
        self.maximum.unwrap_or(self.required)
    }

    /// More than one object may be bound
    pub fn is_variable(&self) -> bool {
        self.required != 1
    }

    /// Fewest eligible objects for enumeration to proceed
    pub fn needed(&self) -> usize {
        if self.required > 0 {
            self.required
        } else {
            self.minimum()
        }
    }

    /// Whether a binding of `count` objects respects this cardinality
    pub fn admits(&self, count: usize) -> bool {
        if self.required > 0 {
            return count == self.required;
        }
        let max = self.maximum();
        count >= self.minimum() && (max == 0 || count <= max)
    }

    /// Candidate subsets of `eligible` (ascending size, then lexicographic)
    pub fn candidate_subsets(&self, eligible: &[ObjectId]) -> Vec<BTreeSet<ObjectId>> {
        if self.required > 0 {
            return eligible
                .iter()
                .copied()
                .combinations(self.required)
                .map(BTreeSet::from_iter)
                .collect();
        }
        let min = self.minimum();
        let upper = match self.maximum() {
            0 => eligible.len(),
            max => max.min(eligible.len()),
        };
        let mut subsets: Vec<BTreeSet<ObjectId>> = (min.max(1)..=upper)
            .flat_map(|size| eligible.iter().copied().combinations(size))
            .map(BTreeSet::from_iter)
            .collect();
        if min == 0 {
            subsets.push(BTreeSet::new());
        }
        subsets
    }
}

/// Per-object-type cardinalities of a transition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindingSpecification {
    cardinalities: IndexMap<ObjectType, Cardinality>,
}

impl BindingSpecification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cardinality of a type; exactly one when never configured
    pub fn cardinality(&self, object_type: &ObjectType) -> Cardinality {
        self.cardinalities.get(object_type).copied().unwrap_or_default()
    }

    fn check_keys<'a>(
        transition: &str,
        object_types: &BTreeSet<ObjectType>,
        keys: impl Iterator<Item = &'a ObjectType>,
    ) -> Result<()> {
        let keys: BTreeSet<&ObjectType> = keys.collect();
        let expected: BTreeSet<&ObjectType> = object_types.iter().collect();
        if keys != expected {
            return Err(Error::InvalidBindingSpecification {
                transition: transition.to_string(),
                reason: format!(
                    "object types [{}] do not match the transition's [{}]",
                    keys.iter().join(", "),
                    expected.iter().join(", ")
                ),
            });
        }
        Ok(())
    }

    fn invalid(transition: &str, reason: String) -> Error {
        Error::InvalidBindingSpecification {
            transition: transition.to_string(),
            reason,
        }
    }

    /// Set the required counts; keys must equal the transition's object types
    pub fn set_required(
        &mut self,
        transition: &str,
        object_types: &BTreeSet<ObjectType>,
        required: &IndexMap<ObjectType, usize>,
    ) -> Result<()> {
        Self::check_keys(transition, object_types, required.keys())?;
        for (ot, count) in required {
            let current = self.cardinality(ot);
            let max = current.maximum.unwrap_or(*count);
            if max != 0 && max < *count {
                return Err(Self::invalid(
                    transition,
                    format!("maximum {max} of {ot} is below the required {count}"),
                ));
            }
            self.cardinalities.insert(
                ot.clone(),
                Cardinality {
                    required: *count,
                    ..current
                },
            );
        }
        Ok(())
    }

    /// Set the minimum counts of variable types
    pub fn set_minimum(
        &mut self,
        transition: &str,
        object_types: &BTreeSet<ObjectType>,
        minimum: &IndexMap<ObjectType, usize>,
    ) -> Result<()> {
        Self::check_keys(transition, object_types, minimum.keys())?;
        for (ot, min) in minimum {
            let current = self.cardinality(ot);
            let max = current.maximum();
            if max != 0 && *min > max {
                return Err(Self::invalid(
                    transition,
                    format!("minimum {min} of {ot} exceeds the maximum {max}"),
                ));
            }
            self.cardinalities.insert(
                ot.clone(),
                Cardinality {
                    minimum: Some(*min),
                    ..current
                },
            );
        }
        Ok(())
    }

    /// Set the maximum counts of variable types (0 = unbounded)
    pub fn set_maximum(
        &mut self,
        transition: &str,
        object_types: &BTreeSet<ObjectType>,
        maximum: &IndexMap<ObjectType, usize>,
    ) -> Result<()> {
        Self::check_keys(transition, object_types, maximum.keys())?;
        for (ot, max) in maximum {
            let current = self.cardinality(ot);
            if *max != 0 && *max < current.required {
                return Err(Self::invalid(
                    transition,
                    format!("maximum {max} of {ot} is below the required {}", current.required),
                ));
            }
            if *max != 0 && current.minimum() > *max {
                return Err(Self::invalid(
                    transition,
                    format!("maximum {max} of {ot} is below the minimum {}", current.minimum()),
                ));
            }
            self.cardinalities.insert(
                ot.clone(),
                Cardinality {
                    maximum: Some(*max),
                    ..current
                },
            );
        }
        Ok(())
    }
}

/// Read-only view of everything needed to enumerate or validate bindings of one transition
pub struct BindingContext<'a> {
    pub transition: &'a str,
    pub connections: &'a Connections,
    pub specification: &'a BindingSpecification,
    pub guard: &'a Guard,
    pub places: &'a IndexMap<String, Place>,
    pub objects: &'a ObjectStore,
}

impl<'a> BindingContext<'a> {
    /// Objects present in every input place of the type
    pub fn marking_intersection(&self, object_type: &ObjectType) -> BTreeSet<ObjectId> {
        let mut markings = self
            .connections
            .input_places_of(object_type)
            .iter()
            .filter_map(|p| self.places.get(p).and_then(Place::as_object_place))
            .map(|p| p.marking.distinct());
        let first = markings.next().unwrap_or_default();
        markings.fold(first, |acc, m| acc.intersection(&m).copied().collect())
    }

    /// Objects of the type that may be bound right now
    pub fn eligible_objects(&self, object_type: &ObjectType) -> Vec<ObjectId> {
        self.marking_intersection(object_type)
            .into_iter()
            .filter(|id| self.objects.status(*id) == Some(ObjectStatus::Active))
            .collect()
    }

    /// Quantity state restricted to the connected collection points
    pub fn quantity_state(&self) -> CollectionCounter {
        self.connections.quantity_state(self.places)
    }

    pub fn guard_holds(&self, binding: &BindingFunction) -> bool {
        self.guard.check(binding, &self.quantity_state(), self.objects)
    }

    /// All guard-passing bindings over the input object types
    ///
    /// `None` when some input type lacks eligible objects or when no
    /// candidate passes the guard.
    pub fn enumerate(&self) -> Option<Vec<BindingFunction>> {
        let mut per_type: Vec<(&ObjectType, Vec<BTreeSet<ObjectId>>)> = Vec::new();
        for object_type in self.connections.input_object_types() {
            let eligible = self.eligible_objects(object_type);
            let cardinality = self.specification.cardinality(object_type);
            if eligible.len() < cardinality.needed() {
                trace!(
                    transition = self.transition,
                    object_type = %object_type,
                    eligible = eligible.len(),
                    "not enough eligible objects"
                );
                return None;
            }
            let candidates = cardinality.candidate_subsets(&eligible);
            if candidates.is_empty() {
                return None;
            }
            per_type.push((object_type, candidates));
        }

        let bindings: Vec<BindingFunction> = if per_type.is_empty() {
            vec![BindingFunction::new()]
        } else {
            per_type
                .iter()
                .map(|(_, candidates)| candidates.iter())
                .multi_cartesian_product()
                .map(|choice| {
                    per_type
                        .iter()
                        .zip(choice)
                        .map(|((ot, _), set)| ((*ot).clone(), set.clone()))
                        .collect()
                })
                .collect()
        };

        let state = self.quantity_state();
        let enabled: Vec<BindingFunction> = bindings
            .into_iter()
            .filter(|b| self.guard.check(b, &state, self.objects))
            .collect();
        if enabled.is_empty() {
            None
        } else {
            Some(enabled)
        }
    }

    /// Structural validity of a binding against the current markings
    ///
    /// With `only_input` the check is limited to input object types.
    /// Fails when the binding lacks an entry for a considered type.
    pub fn binding_valid(&self, binding: &BindingFunction, only_input: bool) -> Result<bool> {
        let types: Vec<ObjectType> = if only_input {
            self.connections.input_object_types().cloned().collect()
        } else {
            self.connections.object_types().into_iter().collect()
        };
        for object_type in &types {
            let chosen = binding.get(object_type).ok_or_else(|| Error::MissingObjectType {
                transition: self.transition.to_string(),
                object_type: object_type.clone(),
            })?;
            if !self.specification.cardinality(object_type).admits(chosen.len()) {
                return Ok(false);
            }
            if self.connections.has_input_type(object_type)
                && !chosen.is_subset(&self.marking_intersection(object_type))
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Binding valid over all object types and guard satisfied
    pub fn enabled(&self, binding: &BindingFunction) -> Result<bool> {
        Ok(self.binding_valid(binding, false)? && self.guard_holds(binding))
    }
}
