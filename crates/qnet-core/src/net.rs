//! The quantity net aggregate
//!
//! Owns places, transitions and arcs, and is the entry point for building
//! a net and driving its firings.
//!
//! Node names carry their kind as a prefix:
//! - `t...` transition
//! - `p...` object place
//! - `c...` collection point

use crate::selection::BindingSelection;
use crate::{
    Arc, ArcId, ArcKind, BindingFunction, CollectionCounter, Endpoint, Error, ExecutionId, IdGenerator,
    ItemCounter, ObjectGuard, ObjectId, ObjectMultiset, ObjectStore, ObjectType, Place, PlaceKind, Qalculator,
    QuantityGuard, Result, SmallStockGuard, Transition, TransitionExecution,
};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Kind of node, derived from its name prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Transition,
    ObjectPlace,
    CollectionPoint,
}

impl NodeKind {
    /// Classify a node name by its prefix
    pub fn from_name(name: &str) -> Result<Self> {
        match name.chars().next() {
            Some('t') => Ok(NodeKind::Transition),
            Some('p') => Ok(NodeKind::ObjectPlace),
            Some('c') => Ok(NodeKind::CollectionPoint),
            _ => Err(Error::InvalidNodeName(name.to_string())),
        }
    }
}

/// A node resolved by name or label
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Place(&'a Place),
    Transition(&'a Transition),
}

impl NodeRef<'_> {
    pub fn name(&self) -> &str {
        match self {
            NodeRef::Place(p) => &p.name,
            NodeRef::Transition(t) => &t.name,
        }
    }
}

/// Current content of a place
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Marking<'a> {
    Objects(&'a ObjectMultiset),
    Quantities(&'a ItemCounter),
}

/// Net-level record linking a transition execution to its transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub transition: String,
    pub transition_execution: TransitionExecution,
}

impl From<&Execution> for ExecutionId {
    fn from(execution: &Execution) -> Self {
        execution.id
    }
}

impl From<&TransitionExecution> for ExecutionId {
    fn from(execution: &TransitionExecution) -> Self {
        execution.id
    }
}

/// An object-centric quantity net
#[derive(Debug, Default)]
pub struct QuantityNet {
    places: IndexMap<String, Place>,
    transitions: IndexMap<String, Transition>,
    arcs: Vec<Arc>,
    executions: IndexMap<ExecutionId, String>,
    execution_ids: IdGenerator,
}

impl QuantityNet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a net from `(source, target)` pairs
    pub fn from_arcs<S: AsRef<str>>(arcs: &[(S, S)]) -> Result<Self> {
        let mut net = Self::new();
        net.set_net_structure(arcs)?;
        Ok(net)
    }

    // ---- structure ----

    /// Add nodes and arcs from `(source, target)` name pairs
    ///
    /// Unknown nodes are created from their name prefix; object places get
    /// the default object type until `set_place_types` is called. Pairs that
    /// already exist are skipped. All pairs are validated before the net is
    /// touched. Returns the ids of the new arcs.
    pub fn set_net_structure<S: AsRef<str>>(&mut self, arcs: &[(S, S)]) -> Result<Vec<ArcId>> {
        let mut classified = Vec::with_capacity(arcs.len());
        for (source, target) in arcs {
            let (source, target) = (source.as_ref(), target.as_ref());
            let kinds = (NodeKind::from_name(source)?, NodeKind::from_name(target)?);
            let transitions = [kinds.0, kinds.1]
                .iter()
                .filter(|k| **k == NodeKind::Transition)
                .count();
            if transitions != 1 {
                return Err(Error::InvalidArc(format!(
                    "{source} -> {target} must connect exactly one place and one transition"
                )));
            }
            for (name, kind) in [(source, kinds.0), (target, kinds.1)] {
                self.check_existing_kind(name, kind)?;
            }
            classified.push((source, target, kinds));
        }

        let mut added = Vec::new();
        for (source, target, kinds) in classified {
            for (name, kind) in [(source, kinds.0), (target, kinds.1)] {
                self.ensure_node(name, kind);
            }
            let exists = self
                .arcs
                .iter()
                .any(|a| a.source.name() == source && a.target.name() == target);
            if exists {
                continue;
            }
            added.push(self.push_arc(source, target, kinds)?);
        }
        self.rebuild_connections();
        debug!(
            places = self.places.len(),
            transitions = self.transitions.len(),
            arcs = self.arcs.len(),
            "net structure updated"
        );
        Ok(added)
    }

    fn check_existing_kind(&self, name: &str, kind: NodeKind) -> Result<()> {
        match (kind, self.places.get(name)) {
            (NodeKind::ObjectPlace, Some(p)) if p.is_collection_point() => Err(Error::NotAnObjectPlace(name.into())),
            (NodeKind::CollectionPoint, Some(p)) if !p.is_collection_point() => {
                Err(Error::NotACollectionPoint(name.into()))
            }
            _ => Ok(()),
        }
    }

    fn ensure_node(&mut self, name: &str, kind: NodeKind) {
        match kind {
            NodeKind::Transition => {
                self.transitions
                    .entry(name.to_string())
                    .or_insert_with(|| Transition::new(name));
            }
            NodeKind::ObjectPlace => {
                self.places
                    .entry(name.to_string())
                    .or_insert_with(|| Place::object_place(name, ObjectType::default()));
            }
            NodeKind::CollectionPoint => {
                self.places
                    .entry(name.to_string())
                    .or_insert_with(|| Place::collection_point(name));
            }
        }
    }

    fn push_arc(&mut self, source: &str, target: &str, kinds: (NodeKind, NodeKind)) -> Result<ArcId> {
        let endpoint = |name: &str, kind: NodeKind| match kind {
            NodeKind::Transition => Endpoint::Transition(name.to_string()),
            _ => Endpoint::Place(name.to_string()),
        };
        let (place_name, transition_name) = if kinds.0 == NodeKind::Transition {
            (target, source)
        } else {
            (source, target)
        };
        let place = self
            .places
            .get(place_name)
            .ok_or_else(|| Error::NodeNotFound(place_name.to_string()))?;
        let kind = if place.is_collection_point() {
            ArcKind::Quantity
        } else {
            ArcKind::Object
        };
        let id = ArcId::new(self.arcs.len());
        let arc = Arc::new(id, kind, endpoint(source, kinds.0), endpoint(target, kinds.1), place)?;
        let place_is_source = arc.is_input();

        if let Some(place) = self.places.get_mut(place_name) {
            if place_is_source {
                place.output_arcs.push(id);
            } else {
                place.input_arcs.push(id);
            }
        }
        if let Some(transition) = self.transitions.get_mut(transition_name) {
            if place_is_source {
                transition.input_arcs.push(id);
            } else {
                transition.output_arcs.push(id);
            }
        }
        self.arcs.push(arc);
        Ok(id)
    }

    /// Recompute which places and collection points each transition sees
    fn rebuild_connections(&mut self) {
        for transition in self.transitions.values_mut() {
            let mut connections = crate::Connections::default();
            for arc in self.arcs.iter().filter(|a| a.transition() == transition.name) {
                let Some(place) = self.places.get(arc.place()) else {
                    continue;
                };
                match place.object_type() {
                    None => {
                        connections.collection_points.insert(place.name.clone());
                    }
                    Some(object_type) => {
                        let side = if arc.is_input() {
                            &mut connections.input_places
                        } else {
                            &mut connections.output_places
                        };
                        side.entry(object_type.clone()).or_default().push(place.name.clone());
                    }
                }
            }
            transition.connections = connections;
            transition.reset_selection();
        }
    }

    /// Add a quantity arc from a transition to a collection point
    pub fn create_and_add_qarc(&mut self, transition: &str, collection_point: &str) -> Result<ArcId> {
        self.transition(transition)?;
        if !self.place(collection_point)?.is_collection_point() {
            return Err(Error::NotACollectionPoint(collection_point.to_string()));
        }
        let added = self.set_net_structure(&[(transition, collection_point)])?;
        added
            .first()
            .copied()
            .ok_or_else(|| Error::InvalidArc(format!("{transition} -> {collection_point} already exists")))
    }

    // ---- lookup ----

    pub fn place(&self, name: &str) -> Result<&Place> {
        self.places.get(name).ok_or_else(|| Error::NodeNotFound(name.to_string()))
    }

    fn place_mut(&mut self, name: &str) -> Result<&mut Place> {
        self.places.get_mut(name).ok_or_else(|| Error::NodeNotFound(name.to_string()))
    }

    fn object_place_mut(&mut self, name: &str) -> Result<&mut Place> {
        let place = self.place_mut(name)?;
        if place.is_collection_point() {
            return Err(Error::NotAnObjectPlace(name.to_string()));
        }
        Ok(place)
    }

    pub fn transition(&self, name: &str) -> Result<&Transition> {
        self.transitions
            .get(name)
            .ok_or_else(|| Error::NodeNotFound(name.to_string()))
    }

    pub fn transition_mut(&mut self, name: &str) -> Result<&mut Transition> {
        self.transitions
            .get_mut(name)
            .ok_or_else(|| Error::NodeNotFound(name.to_string()))
    }

    /// Resolve a node by name, falling back to its label
    pub fn identify_node(&self, identifier: &str) -> Result<NodeRef<'_>> {
        if let Some(place) = self.places.get(identifier) {
            return Ok(NodeRef::Place(place));
        }
        if let Some(transition) = self.transitions.get(identifier) {
            return Ok(NodeRef::Transition(transition));
        }
        let mut matches = self
            .places
            .values()
            .filter(|p| p.label.as_deref() == Some(identifier))
            .map(NodeRef::Place)
            .chain(
                self.transitions
                    .values()
                    .filter(|t| t.label.as_deref() == Some(identifier))
                    .map(NodeRef::Transition),
            );
        match (matches.next(), matches.next()) {
            (Some(node), None) => Ok(node),
            (Some(_), Some(_)) => Err(Error::AmbiguousNode(identifier.to_string())),
            _ => Err(Error::NodeNotFound(identifier.to_string())),
        }
    }

    /// Resolve a transition by name or label
    pub fn identify_transition(&self, identifier: &str) -> Result<&str> {
        match self.identify_node(identifier)? {
            NodeRef::Transition(t) => Ok(&t.name),
            NodeRef::Place(p) => Err(Error::NodeNotFound(format!("transition {}", p.name))),
        }
    }

    // ---- configuration ----

    pub fn set_initial_places<S: AsRef<str>>(&mut self, places: &[S]) -> Result<()> {
        for name in places {
            self.object_place_mut(name.as_ref())?.initial = Some(true);
        }
        Ok(())
    }

    pub fn set_final_places<S: AsRef<str>>(&mut self, places: &[S]) -> Result<()> {
        for name in places {
            self.object_place_mut(name.as_ref())?.is_final = Some(true);
        }
        Ok(())
    }

    /// Assign object types to object places
    pub fn set_place_types(&mut self, types: &IndexMap<String, ObjectType>) -> Result<()> {
        for name in types.keys() {
            self.object_place_mut(name)?;
        }
        for (name, object_type) in types {
            if let Some(place) = self.places.get_mut(name).and_then(Place::as_object_place_mut) {
                place.object_type = object_type.clone();
            }
        }
        self.rebuild_connections();
        Ok(())
    }

    pub fn set_transition_labels(&mut self, labels: &IndexMap<String, String>) -> Result<()> {
        for (name, label) in labels {
            self.transition_mut(name)?.label = Some(label.clone());
        }
        Ok(())
    }

    pub fn set_collection_point_labels(&mut self, labels: &IndexMap<String, String>) -> Result<()> {
        for (name, label) in labels {
            let place = self.place_mut(name)?;
            if !place.is_collection_point() {
                return Err(Error::NotACollectionPoint(name.clone()));
            }
            place.label = Some(label.clone());
        }
        Ok(())
    }

    pub fn set_silent_transitions<S: AsRef<str>>(&mut self, transitions: &[S]) -> Result<()> {
        for name in transitions {
            self.transition_mut(name.as_ref())?.silent = true;
        }
        Ok(())
    }

    pub fn set_manually_initiated_transitions<S: AsRef<str>>(&mut self, transitions: &[S]) -> Result<()> {
        for name in transitions {
            self.transition_mut(name.as_ref())?.manually_initiated = true;
        }
        Ok(())
    }

    pub fn set_object_guard(&mut self, transition: &str, guard: Box<dyn ObjectGuard>) -> Result<()> {
        let t = self.transition_mut(transition)?;
        if t.guard.has_object_guard() {
            warn!(transition, "object guard already set");
            return Err(Error::GuardAlreadySet {
                transition: transition.to_string(),
                kind: "object",
            });
        }
        t.guard.set_object_guard(guard);
        t.reset_selection();
        Ok(())
    }

    /// Set the quantity guard; it may only read connected collection points
    pub fn set_quantity_guard(&mut self, transition: &str, guard: Box<dyn QuantityGuard>) -> Result<()> {
        let t = self.transition_mut(transition)?;
        if t.guard.has_quantity_guard() {
            warn!(transition, "quantity guard already set");
            return Err(Error::GuardAlreadySet {
                transition: transition.to_string(),
                kind: "quantity",
            });
        }
        if let Some(cp) = guard
            .collection_points()
            .into_iter()
            .find(|cp| !t.connections.collection_points.contains(cp))
        {
            return Err(Error::InvalidGuard {
                transition: transition.to_string(),
                reason: format!("collection point {cp} is not connected"),
            });
        }
        t.guard.set_quantity_guard(guard);
        t.reset_selection();
        Ok(())
    }

    pub fn set_small_stock_guard(&mut self, transition: &str, guard: SmallStockGuard) -> Result<()> {
        self.set_quantity_guard(transition, Box::new(guard))
    }

    pub fn set_binding_function_specification(
        &mut self,
        transition: &str,
        required: &IndexMap<ObjectType, usize>,
    ) -> Result<()> {
        let t = self.transition_mut(transition)?;
        let types = t.object_types();
        t.specification.set_required(transition, &types, required)?;
        t.reset_selection();
        Ok(())
    }

    pub fn set_binding_function_specification_minimum(
        &mut self,
        transition: &str,
        minimum: &IndexMap<ObjectType, usize>,
    ) -> Result<()> {
        let t = self.transition_mut(transition)?;
        let types = t.object_types();
        t.specification.set_minimum(transition, &types, minimum)?;
        t.reset_selection();
        Ok(())
    }

    pub fn set_binding_function_specification_maximum(
        &mut self,
        transition: &str,
        maximum: &IndexMap<ObjectType, usize>,
    ) -> Result<()> {
        let t = self.transition_mut(transition)?;
        let types = t.object_types();
        t.specification.set_maximum(transition, &types, maximum)?;
        t.reset_selection();
        Ok(())
    }

    pub fn set_binding_selection(&mut self, transition: &str, selection: Box<dyn BindingSelection>) -> Result<()> {
        self.transition_mut(transition)?.set_selection(selection);
        Ok(())
    }

    pub fn set_qalculator(&mut self, transition: &str, qalculator: Box<dyn Qalculator>) -> Result<()> {
        self.transition_mut(transition)?.set_qalculator(qalculator);
        Ok(())
    }

    /// Mark object arcs, given as `(source, target)` pairs, as variable
    pub fn make_arcs_variable<S: AsRef<str>>(&mut self, arcs: &[(S, S)]) -> Result<()> {
        let mut ids = Vec::with_capacity(arcs.len());
        for (source, target) in arcs {
            let (source, target) = (source.as_ref(), target.as_ref());
            let arc = self
                .arcs
                .iter()
                .find(|a| a.source.name() == source && a.target.name() == target)
                .ok_or_else(|| Error::InvalidArc(format!("{source} -> {target} does not exist")))?;
            if arc.kind != ArcKind::Object {
                return Err(Error::InvalidArc(format!("{source} -> {target} is not an object arc")));
            }
            ids.push(arc.id);
        }
        for id in ids {
            self.arcs[id.index()].variable = true;
        }
        Ok(())
    }

    /// An object arc is variable when marked so or when its type binds other than exactly one object
    pub fn arc_is_variable(&self, id: ArcId) -> Result<bool> {
        let arc = self
            .arcs
            .get(id.index())
            .ok_or_else(|| Error::InvalidArc(id.to_string()))?;
        if arc.kind != ArcKind::Object {
            return Ok(false);
        }
        let transition = self.transition(arc.transition())?;
        let cardinality = self
            .place(arc.place())?
            .object_type()
            .map(|ot| transition.specification.cardinality(ot));
        Ok(arc.variable || cardinality.is_some_and(|c| c.is_variable()))
    }

    // ---- markings ----

    /// Put existing objects into places; object types come from the store
    pub fn add_objects_to_places(
        &mut self,
        objects: &ObjectStore,
        assignment: &IndexMap<String, Vec<ObjectId>>,
    ) -> Result<()> {
        for (place, ids) in assignment {
            for id in ids {
                let object_type = objects.require(*id)?.object_type.clone();
                self.object_place_mut(place)?.add_tokens(&object_type, [*id])?;
            }
        }
        Ok(())
    }

    /// Merge counters into collection points
    pub fn update_markings_collection_points(&mut self, deltas: &CollectionCounter) -> Result<()> {
        for cp in deltas.collection_points() {
            if !self.place(cp)?.is_collection_point() {
                return Err(Error::NotACollectionPoint(cp.clone()));
            }
        }
        for (cp, delta) in deltas.iter() {
            self.place_mut(cp)?.update_marking(delta)?;
        }
        Ok(())
    }

    // ---- firing ----

    pub fn transition_enabled(&self, transition: &str, binding: &BindingFunction, objects: &ObjectStore) -> Result<bool> {
        self.transition(transition)?.enabled(binding, &self.places, objects)
    }

    pub fn start_firing_transition(
        &mut self,
        transition: &str,
        binding: BindingFunction,
        objects: &ObjectStore,
    ) -> Result<Execution> {
        let t = self
            .transitions
            .get_mut(transition)
            .ok_or_else(|| Error::NodeNotFound(transition.to_string()))?;
        let id = ExecutionId::new(self.execution_ids.next_raw());
        let transition_execution = t.start_firing(id, binding, &mut self.places, objects)?;
        self.executions.insert(id, t.name.clone());
        Ok(Execution {
            id,
            transition: t.name.clone(),
            transition_execution,
        })
    }

    /// End an execution identified by id, wrapper or transition execution
    pub fn end_firing_transition(&mut self, execution: impl Into<ExecutionId>) -> Result<Execution> {
        let id = execution.into();
        let name = self.executions.get(&id).cloned().ok_or_else(|| Error::UnknownExecution {
            transition: String::new(),
            execution: id,
        })?;
        let t = self
            .transitions
            .get_mut(&name)
            .ok_or_else(|| Error::NodeNotFound(name.clone()))?;
        let transition_execution = t.end_firing(id, &mut self.places)?;
        self.executions.shift_remove(&id);
        Ok(Execution {
            id,
            transition: name,
            transition_execution,
        })
    }

    pub fn execute_complete_firing_transition(
        &mut self,
        transition: &str,
        binding: BindingFunction,
        objects: &ObjectStore,
    ) -> Result<Execution> {
        let execution = self.start_firing_transition(transition, binding, objects)?;
        self.end_firing_transition(&execution)
    }

    /// Enabled bindings of one transition (one binding when `single`)
    pub fn enabled_bindings(
        &mut self,
        transition: &str,
        objects: &ObjectStore,
        single: bool,
    ) -> Result<Option<Vec<BindingFunction>>> {
        let t = self
            .transitions
            .get_mut(transition)
            .ok_or_else(|| Error::NodeNotFound(transition.to_string()))?;
        Ok(t.enabled_bindings(&self.places, objects, single))
    }

    /// Enabled input-side bindings of every transition not manually initiated
    pub fn get_enabled_bindings_all_transitions_for_input_types(
        &mut self,
        objects: &ObjectStore,
    ) -> IndexMap<String, Vec<BindingFunction>> {
        let places = &self.places;
        self.transitions
            .values_mut()
            .filter(|t| !t.manually_initiated)
            .filter_map(|t| {
                t.enabled_bindings(places, objects, false)
                    .map(|bindings| (t.name.clone(), bindings))
            })
            .collect()
    }

    // ---- queries ----

    pub fn places(&self) -> impl Iterator<Item = &Place> {
        self.places.values()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.values()
    }

    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    pub fn object_arcs(&self) -> impl Iterator<Item = &Arc> {
        self.arcs.iter().filter(|a| a.kind == ArcKind::Object)
    }

    pub fn quantity_arcs(&self) -> impl Iterator<Item = &Arc> {
        self.arcs.iter().filter(|a| a.kind == ArcKind::Quantity)
    }

    pub fn object_places(&self) -> impl Iterator<Item = &Place> {
        self.places.values().filter(|p| !p.is_collection_point())
    }

    pub fn collection_points(&self) -> impl Iterator<Item = &Place> {
        self.places.values().filter(|p| p.is_collection_point())
    }

    pub fn initial_places(&self) -> impl Iterator<Item = &Place> {
        self.object_places().filter(|p| p.is_initial())
    }

    pub fn final_places(&self) -> impl Iterator<Item = &Place> {
        self.object_places().filter(|p| p.is_final())
    }

    pub fn get_initial_places_object_type(&self, object_type: &ObjectType) -> Vec<&str> {
        self.initial_places()
            .filter(|p| p.object_type() == Some(object_type))
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn get_final_places_object_type(&self, object_type: &ObjectType) -> Vec<&str> {
        self.final_places()
            .filter(|p| p.object_type() == Some(object_type))
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Object types used by object places
    pub fn object_types(&self) -> IndexSet<ObjectType> {
        self.object_places().filter_map(|p| p.object_type()).cloned().collect()
    }

    pub fn labelled_transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.values().filter(|t| !t.is_silent())
    }

    pub fn silent_transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.values().filter(|t| t.is_silent())
    }

    /// Current content of every place
    pub fn marking(&self) -> IndexMap<&str, Marking<'_>> {
        self.places
            .values()
            .map(|p| {
                let marking = match &p.kind {
                    PlaceKind::Object(op) => Marking::Objects(&op.marking),
                    PlaceKind::Collection(cp) => Marking::Quantities(&cp.marking),
                };
                (p.name.as_str(), marking)
            })
            .collect()
    }

    /// Stock of every collection point
    pub fn quantity_state(&self) -> CollectionCounter {
        self.collection_points()
            .filter_map(|p| p.as_collection_point().map(|cp| (p.name.clone(), cp.marking.clone())))
            .collect()
    }

    /// Places currently holding the object
    pub fn get_locations_of_object(&self, id: ObjectId) -> BTreeSet<String> {
        self.object_places()
            .filter(|p| p.as_object_place().is_some_and(|op| op.marking.contains(id)))
            .map(|p| p.name.clone())
            .collect()
    }

    /// Executions currently in flight across all transitions
    pub fn executions(&self) -> impl Iterator<Item = (ExecutionId, &str)> {
        self.executions.iter().map(|(id, t)| (*id, t.as_str()))
    }

    pub fn get_quantity_operations_of_execution(&self, id: ExecutionId) -> Result<&CollectionCounter> {
        let unknown = || Error::UnknownExecution {
            transition: String::new(),
            execution: id,
        };
        let name = self.executions.get(&id).ok_or_else(unknown)?;
        self.transition(name)?
            .execution(id)
            .map(|e| &e.quantity_operations)
            .ok_or_else(unknown)
    }

    /// Per transition, the output object types that have no input place
    pub fn transitions_output_types_not_input(&self) -> IndexMap<String, Vec<ObjectType>> {
        self.transitions
            .values()
            .map(|t| (t.name.clone(), t.connections.output_types_not_input()))
            .filter(|(_, types)| !types.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ObjectStatus, ObjectTypeDescriptor};
    use chrono::{NaiveDate, NaiveDateTime};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 10, 12)
            .and_then(|d| d.and_hms_opt(12, 21, 0))
            .unwrap()
    }

    fn active(objects: &mut ObjectStore, object_type: &str, n: usize) -> Vec<ObjectId> {
        let descriptor = ObjectTypeDescriptor::new(object_type);
        (0..n)
            .map(|_| {
                let object = objects.create(&descriptor, t0());
                object.status = ObjectStatus::Active;
                object.id
            })
            .collect()
    }

    fn types(pairs: &[(&str, &str)]) -> IndexMap<String, ObjectType> {
        pairs.iter().map(|(p, t)| (p.to_string(), ObjectType::from(*t))).collect()
    }

    fn counts(pairs: &[(&str, usize)]) -> IndexMap<ObjectType, usize> {
        pairs.iter().map(|(t, n)| (ObjectType::from(*t), *n)).collect()
    }

    /// p1 -> t1 -> {p2, p3}, all of type "order"
    fn order_net() -> QuantityNet {
        let mut net = QuantityNet::from_arcs(&[("p1", "t1"), ("t1", "p2"), ("t1", "p3")]).unwrap();
        net.set_place_types(&types(&[("p1", "order"), ("p2", "order"), ("p3", "order")]))
            .unwrap();
        net
    }

    fn fill(net: &mut QuantityNet, objects: &ObjectStore, place: &str, ids: &[ObjectId]) {
        let assignment: IndexMap<String, Vec<ObjectId>> = [(place.to_string(), ids.to_vec())].into_iter().collect();
        net.add_objects_to_places(objects, &assignment).unwrap();
    }

    fn order_count(net: &QuantityNet, place: &str) -> usize {
        net.place(place).unwrap().as_object_place().unwrap().marking.len()
    }

    #[test]
    fn test_one_binding_per_object() {
        let mut objects = ObjectStore::new();
        let ids = active(&mut objects, "order", 2);
        let mut net = order_net();
        fill(&mut net, &objects, "p1", &ids);

        let bindings = net.enabled_bindings("t1", &objects, false).unwrap().unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0], BindingFunction::new().with("order", [ids[0]]));
        assert_eq!(bindings[1], BindingFunction::new().with("order", [ids[1]]));
    }

    #[test]
    fn test_enumeration_completeness() {
        let mut objects = ObjectStore::new();
        let ids = active(&mut objects, "order", 5);
        let mut net = order_net();
        fill(&mut net, &objects, "p1", &ids);
        net.set_binding_function_specification("t1", &counts(&[("order", 2)]))
            .unwrap();

        let bindings = net.enabled_bindings("t1", &objects, false).unwrap().unwrap();
        assert_eq!(bindings.len(), 10);
        let distinct: std::collections::HashSet<_> = bindings.iter().collect();
        assert_eq!(distinct.len(), 10);
    }

    /// {p1: order, p2: item} -> t1 -> {p3: order, p4: item}
    fn order_item_net() -> QuantityNet {
        let mut net =
            QuantityNet::from_arcs(&[("p1", "t1"), ("p2", "t1"), ("t1", "p3"), ("t1", "p4")]).unwrap();
        net.set_place_types(&types(&[("p1", "order"), ("p2", "item"), ("p3", "order"), ("p4", "item")]))
            .unwrap();
        net.set_binding_function_specification("t1", &counts(&[("order", 1), ("item", 2)]))
            .unwrap();
        net
    }

    #[test]
    fn test_cross_product_over_input_types() {
        let mut objects = ObjectStore::new();
        let orders = active(&mut objects, "order", 2);
        let items = active(&mut objects, "item", 3);
        let mut net = order_item_net();
        fill(&mut net, &objects, "p1", &orders);
        fill(&mut net, &objects, "p2", &items);

        let bindings = net.enabled_bindings("t1", &objects, false).unwrap().unwrap();
        // 2 orders times C(3, 2) item pairs
        assert_eq!(bindings.len(), 6);
        for binding in &bindings {
            assert_eq!(binding.get(&"order".into()).map(|s| s.len()), Some(1));
            assert_eq!(binding.get(&"item".into()).map(|s| s.len()), Some(2));
        }
        for order in &orders {
            assert_eq!(bindings.iter().filter(|b| b.contains_object(*order)).count(), 3);
        }
        let distinct: std::collections::HashSet<_> = bindings.iter().collect();
        assert_eq!(distinct.len(), 6);
    }

    #[test]
    fn test_one_short_input_type_disables_transition() {
        let mut objects = ObjectStore::new();
        let orders = active(&mut objects, "order", 3);
        let items = active(&mut objects, "item", 1);
        let mut net = order_item_net();
        fill(&mut net, &objects, "p1", &orders);
        fill(&mut net, &objects, "p2", &items);

        assert_eq!(net.enabled_bindings("t1", &objects, false).unwrap(), None);
        let all = net.get_enabled_bindings_all_transitions_for_input_types(&objects);
        assert!(!all.contains_key("t1"));
    }

    #[test]
    fn test_object_guard_filters_candidates() {
        let mut objects = ObjectStore::new();
        let orders = active(&mut objects, "order", 2);
        let items = active(&mut objects, "item", 3);
        let mut net = order_item_net();
        fill(&mut net, &objects, "p1", &orders);
        fill(&mut net, &objects, "p2", &items);

        let blocked = orders[0];
        net.set_object_guard(
            "t1",
            Box::new(move |binding: &BindingFunction, _: &ObjectStore| !binding.contains_object(blocked)),
        )
        .unwrap();

        let bindings = net.enabled_bindings("t1", &objects, false).unwrap().unwrap();
        assert_eq!(bindings.len(), 3);
        assert!(bindings.iter().all(|b| b.contains_object(orders[1])));

        // a guard that rejects everything leaves nothing enabled
        let mut net = order_item_net();
        fill(&mut net, &objects, "p1", &orders);
        fill(&mut net, &objects, "p2", &items);
        net.set_object_guard("t1", Box::new(|_: &BindingFunction, _: &ObjectStore| false))
            .unwrap();
        assert_eq!(net.enabled_bindings("t1", &objects, false).unwrap(), None);
    }

    #[test]
    fn test_inactive_objects_are_not_bound() {
        let mut objects = ObjectStore::new();
        let ids = active(&mut objects, "order", 2);
        objects.set_status(ids[0], ObjectStatus::Inactive).unwrap();
        let mut net = order_net();
        fill(&mut net, &objects, "p1", &ids);

        let bindings = net.enabled_bindings("t1", &objects, false).unwrap().unwrap();
        assert_eq!(bindings, vec![BindingFunction::new().with("order", [ids[1]])]);

        objects.set_status(ids[1], ObjectStatus::Created).unwrap();
        assert_eq!(net.enabled_bindings("t1", &objects, false).unwrap(), None);
    }

    #[test]
    fn test_start_end_moves_objects() {
        let mut objects = ObjectStore::new();
        let ids = active(&mut objects, "order", 2);
        let mut net = order_net();
        fill(&mut net, &objects, "p1", &ids);

        let binding = BindingFunction::new().with("order", [ids[0]]);
        let execution = net.start_firing_transition("t1", binding, &objects).unwrap();
        assert!(net.get_locations_of_object(ids[0]).is_empty());

        // the consumed object is invisible while in flight
        let bindings = net.enabled_bindings("t1", &objects, false).unwrap().unwrap();
        assert!(bindings.iter().all(|b| !b.contains_object(ids[0])));
        assert_eq!(net.executions().count(), 1);

        net.end_firing_transition(&execution).unwrap();
        let locations: Vec<String> = net.get_locations_of_object(ids[0]).into_iter().collect();
        assert_eq!(locations, vec!["p2".to_string(), "p3".to_string()]);
        assert_eq!(order_count(&net, "p1"), 1);
        assert_eq!(net.executions().count(), 0);
    }

    #[test]
    fn test_rejected_firing_leaves_state_unchanged() {
        let mut objects = ObjectStore::new();
        let ids = active(&mut objects, "order", 2);
        let mut net = order_net();
        fill(&mut net, &objects, "p1", &ids[..1]);

        let binding = BindingFunction::new().with("order", [ids[1]]);
        let err = net.start_firing_transition("t1", binding, &objects).unwrap_err();
        assert_eq!(err, Error::NotEnabled("t1".into()));
        assert_eq!(order_count(&net, "p1"), 1);

        let err = net.end_firing_transition(ExecutionId::new(42)).unwrap_err();
        assert!(matches!(err, Error::UnknownExecution { .. }));
    }

    #[test]
    fn test_binding_must_cover_all_object_types() {
        let mut objects = ObjectStore::new();
        let orders = active(&mut objects, "order", 1);
        let mut net = QuantityNet::from_arcs(&[("p1", "t1"), ("t1", "p2"), ("t1", "p_item")]).unwrap();
        net.set_place_types(&types(&[("p1", "order"), ("p2", "order"), ("p_item", "item")]))
            .unwrap();
        fill(&mut net, &objects, "p1", &orders);

        let input_only = BindingFunction::new().with("order", orders.clone());
        let err = net.transition_enabled("t1", &input_only, &objects).unwrap_err();
        assert_eq!(
            err,
            Error::MissingObjectType {
                transition: "t1".into(),
                object_type: "item".into()
            }
        );

        // enumeration only covers input types
        let bindings = net.enabled_bindings("t1", &objects, false).unwrap().unwrap();
        assert_eq!(bindings, vec![input_only.clone()]);

        let items = active(&mut objects, "item", 1);
        let complete = input_only.with("item", items.clone());
        let execution = net.start_firing_transition("t1", complete, &objects).unwrap();
        net.end_firing_transition(execution.id).unwrap();
        assert_eq!(net.get_locations_of_object(items[0]).len(), 1);
        assert_eq!(
            net.transitions_output_types_not_input().get("t1"),
            Some(&vec![ObjectType::from("item")])
        );
    }

    #[test]
    fn test_joint_input_places_use_intersection() {
        let mut objects = ObjectStore::new();
        let ids = active(&mut objects, "order", 3);
        let mut net = QuantityNet::from_arcs(&[("p1", "t1"), ("p2", "t1"), ("t1", "p3")]).unwrap();
        net.set_place_types(&types(&[("p1", "order"), ("p2", "order"), ("p3", "order")]))
            .unwrap();
        fill(&mut net, &objects, "p1", &ids[..2]);
        fill(&mut net, &objects, "p2", &ids[1..]);

        let bindings = net.enabled_bindings("t1", &objects, false).unwrap().unwrap();
        assert_eq!(bindings, vec![BindingFunction::new().with("order", [ids[1]])]);

        let execution = net
            .start_firing_transition("t1", bindings[0].clone(), &objects)
            .unwrap();
        assert_eq!(order_count(&net, "p1"), 1);
        assert_eq!(order_count(&net, "p2"), 1);
        net.end_firing_transition(execution.id).unwrap();
        assert_eq!(order_count(&net, "p3"), 1);
    }

    #[test]
    fn test_quantity_operations_apply_once() {
        let mut objects = ObjectStore::new();
        let ids = active(&mut objects, "order", 1);
        let mut net = order_net();
        net.set_net_structure(&[("t1", "c1")]).unwrap();
        fill(&mut net, &objects, "p1", &ids);
        net.update_markings_collection_points(&CollectionCounter::from_iter([(
            "c1",
            ItemCounter::from([("A", 5)]),
        )]))
        .unwrap();
        net.set_qalculator(
            "t1",
            Box::new(|_: &CollectionCounter, _: &BindingFunction, _: &ObjectStore| {
                CollectionCounter::from_iter([("c1", ItemCounter::from([("A", -2)]))])
            }),
        )
        .unwrap();

        let binding = BindingFunction::new().with("order", ids.clone());
        let execution = net.start_firing_transition("t1", binding, &objects).unwrap();
        assert_eq!(net.quantity_state().get("c1").unwrap().get("A"), 3);
        assert_eq!(
            net.get_quantity_operations_of_execution(execution.id).unwrap(),
            &execution.transition_execution.quantity_operations
        );

        net.end_firing_transition(execution.id).unwrap();
        assert_eq!(net.quantity_state().get("c1").unwrap().get("A"), 3);
    }

    #[test]
    fn test_unconnected_quantity_operation_is_rejected() {
        let mut objects = ObjectStore::new();
        let ids = active(&mut objects, "order", 1);
        let mut net = order_net();
        net.set_net_structure(&[("t1", "c1"), ("t2", "c2")]).unwrap();
        fill(&mut net, &objects, "p1", &ids);
        net.set_qalculator(
            "t1",
            Box::new(|_: &CollectionCounter, _: &BindingFunction, _: &ObjectStore| {
                CollectionCounter::from_iter([("c2", ItemCounter::from([("A", 1)]))])
            }),
        )
        .unwrap();

        let binding = BindingFunction::new().with("order", ids.clone());
        let err = net.start_firing_transition("t1", binding, &objects).unwrap_err();
        assert!(matches!(err, Error::UnconnectedCollectionPoint { .. }));
        assert_eq!(order_count(&net, "p1"), 1);
        assert!(net.quantity_state().get("c2").unwrap().is_empty());
    }

    #[test]
    fn test_small_stock_guard_on_net() {
        let mut objects = ObjectStore::new();
        let ids = active(&mut objects, "order", 1);
        let mut net = order_net();
        net.set_net_structure(&[("c1", "t1")]).unwrap();
        fill(&mut net, &objects, "p1", &ids);
        let stock = |n: i64| CollectionCounter::from_iter([("c1", ItemCounter::from([("A", n)]))]);
        net.update_markings_collection_points(&stock(5)).unwrap();

        let guard = SmallStockGuard::new(&stock(5)).with_all_item_types("c1", true);
        net.set_small_stock_guard("t1", guard.clone()).unwrap();
        assert!(net.enabled_bindings("t1", &objects, false).unwrap().is_some());

        net.update_markings_collection_points(&stock(1)).unwrap();
        assert_eq!(net.quantity_state().get("c1").unwrap().get("A"), 6);
        assert_eq!(net.enabled_bindings("t1", &objects, false).unwrap(), None);

        assert!(matches!(
            net.set_small_stock_guard("t1", guard),
            Err(Error::GuardAlreadySet { kind: "quantity", .. })
        ));
    }

    #[test]
    fn test_guard_must_read_connected_points() {
        let mut net = order_net();
        net.set_net_structure(&[("t9", "c9")]).unwrap();
        let guard = SmallStockGuard::new(&CollectionCounter::from_iter([("c9", ItemCounter::from([("A", 1)]))]));
        assert!(matches!(
            net.set_small_stock_guard("t1", guard),
            Err(Error::InvalidGuard { .. })
        ));
    }

    #[test]
    fn test_net_structure_validation() {
        let mut net = order_net();
        let arcs = net.arcs().len();
        assert!(matches!(
            net.set_net_structure(&[("t1", "p9"), ("p1", "p2")]),
            Err(Error::InvalidArc(_))
        ));
        assert!(matches!(
            net.set_net_structure(&[("x1", "t1")]),
            Err(Error::InvalidNodeName(_))
        ));
        assert!(matches!(
            net.set_net_structure(&[("t1", "t2")]),
            Err(Error::InvalidArc(_))
        ));
        assert_eq!(net.arcs().len(), arcs);
        assert!(net.place("p9").is_err());

        // re-adding an existing arc is a no-op
        assert!(net.set_net_structure(&[("p1", "t1")]).unwrap().is_empty());
        assert_eq!(net.object_arcs().count(), 3);
        assert_eq!(net.quantity_arcs().count(), 0);
    }

    #[test]
    fn test_initial_and_final_places() {
        let mut net = order_net();
        let initial: Vec<&str> = net.initial_places().map(|p| p.name.as_str()).collect();
        assert_eq!(initial, vec!["p1"]);
        assert_eq!(net.get_final_places_object_type(&"order".into()), vec!["p2", "p3"]);

        net.set_final_places(&["p1"]).unwrap();
        assert_eq!(net.final_places().count(), 3);
        net.set_net_structure(&[("t1", "c1")]).unwrap();
        assert!(matches!(
            net.set_initial_places(&["c1"]),
            Err(Error::NotAnObjectPlace(_))
        ));
    }

    #[test]
    fn test_labels_and_identification() {
        let mut net = order_net();
        net.set_net_structure(&[("p3", "t2")]).unwrap();
        let labels: IndexMap<String, String> = [("t1".to_string(), "Place Order".to_string())]
            .into_iter()
            .collect();
        net.set_transition_labels(&labels).unwrap();

        assert_eq!(net.identify_node("Place Order").unwrap().name(), "t1");
        assert_eq!(net.identify_transition("t2").unwrap(), "t2");
        assert!(matches!(net.identify_node("nothing"), Err(Error::NodeNotFound(_))));

        let silent: Vec<&str> = net.silent_transitions().map(|t| t.name.as_str()).collect();
        assert_eq!(silent, vec!["t2"]);
        assert_eq!(net.labelled_transitions().count(), 1);

        let clash: IndexMap<String, String> = [("t2".to_string(), "Place Order".to_string())]
            .into_iter()
            .collect();
        net.set_transition_labels(&clash).unwrap();
        assert!(matches!(net.identify_node("Place Order"), Err(Error::AmbiguousNode(_))));

        net.set_silent_transitions(&["t1"]).unwrap();
        assert!(net.transition("t1").unwrap().is_silent());
    }

    #[test]
    fn test_variable_arcs() {
        let mut net = order_net();
        let input = net.arcs()[0].id;
        assert!(!net.arc_is_variable(input).unwrap());

        net.set_binding_function_specification("t1", &counts(&[("order", 3)]))
            .unwrap();
        assert!(net.arc_is_variable(input).unwrap());

        let mut plain = order_net();
        plain.make_arcs_variable(&[("t1", "p2")]).unwrap();
        assert!(plain.arc_is_variable(plain.arcs()[1].id).unwrap());
        assert!(plain.make_arcs_variable(&[("t1", "p7")]).is_err());
    }

    #[test]
    fn test_manually_initiated_transitions_are_skipped() {
        let mut objects = ObjectStore::new();
        let ids = active(&mut objects, "order", 1);
        let mut net = order_net();
        net.set_net_structure(&[("p1", "t2"), ("t2", "p4")]).unwrap();
        net.set_place_types(&types(&[("p4", "order")])).unwrap();
        fill(&mut net, &objects, "p1", &ids);
        net.set_manually_initiated_transitions(&["t2"]).unwrap();

        let enabled = net.get_enabled_bindings_all_transitions_for_input_types(&objects);
        assert_eq!(enabled.keys().collect::<Vec<_>>(), vec!["t1"]);
        assert!(net.enabled_bindings("t2", &objects, true).unwrap().is_some());
    }

    #[test]
    fn test_transition_without_inputs_has_empty_binding() {
        let objects = ObjectStore::new();
        let mut net = QuantityNet::from_arcs(&[("t1", "c1")]).unwrap();
        let bindings = net.enabled_bindings("t1", &objects, false).unwrap().unwrap();
        assert_eq!(bindings, vec![BindingFunction::new()]);
        let execution = net
            .execute_complete_firing_transition("t1", BindingFunction::new(), &objects)
            .unwrap();
        assert!(execution.transition_execution.quantity_operations.is_empty());
    }

    #[test]
    fn test_place_type_mismatch() {
        let mut objects = ObjectStore::new();
        let items = active(&mut objects, "item", 1);
        let mut net = order_net();
        let assignment: IndexMap<String, Vec<ObjectId>> = [("p1".to_string(), items)].into_iter().collect();
        assert!(matches!(
            net.add_objects_to_places(&objects, &assignment),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            net.update_markings_collection_points(&CollectionCounter::from_iter([(
                "p1",
                ItemCounter::from([("A", 1)])
            )])),
            Err(Error::NotACollectionPoint(_))
        ));
    }
}
