//! Transitions and the two-phase firing protocol
//!
//! A binding goes through `proposed -> enabled -> in flight -> terminated`.
//! `start_firing` consumes the bound objects from the input places and
//! applies the quantity operations; `end_firing` releases the objects into
//! every output place of their type. Quantity operations are never
//! re-applied at the end.

use crate::selection::{BindingSelection, Exhaustive};
use crate::{
    ArcId, BindingContext, BindingFunction, BindingSpecification, CollectionCounter, DefaultQalculator,
    Error, ExecutionId, Guard, ObjectStore, ObjectType, Place, Qalculator, Result,
};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, warn};

/// Places and collection points a transition is wired to, grouped by object type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Connections {
    pub input_places: IndexMap<ObjectType, Vec<String>>,
    pub output_places: IndexMap<ObjectType, Vec<String>>,
    pub collection_points: IndexSet<String>,
}

impl Connections {
    pub fn input_places_of(&self, object_type: &ObjectType) -> &[String] {
        self.input_places.get(object_type).map_or(&[], Vec::as_slice)
    }

    pub fn output_places_of(&self, object_type: &ObjectType) -> &[String] {
        self.output_places.get(object_type).map_or(&[], Vec::as_slice)
    }

    pub fn input_object_types(&self) -> impl Iterator<Item = &ObjectType> {
        self.input_places.keys()
    }

    pub fn output_object_types(&self) -> impl Iterator<Item = &ObjectType> {
        self.output_places.keys()
    }

    pub fn has_input_type(&self, object_type: &ObjectType) -> bool {
        self.input_places.contains_key(object_type)
    }

    /// Every object type the transition touches
    pub fn object_types(&self) -> BTreeSet<ObjectType> {
        self.input_object_types()
            .chain(self.output_object_types())
            .cloned()
            .collect()
    }

    /// Output object types without an input place; such objects are created on firing
    pub fn output_types_not_input(&self) -> Vec<ObjectType> {
        self.output_object_types()
            .filter(|ot| !self.has_input_type(ot))
            .cloned()
            .collect()
    }

    /// Current markings of the connected collection points
    pub fn quantity_state(&self, places: &IndexMap<String, Place>) -> CollectionCounter {
        self.collection_points
            .iter()
            .filter_map(|cp| {
                places
                    .get(cp)
                    .and_then(Place::as_collection_point)
                    .map(|point| (cp.clone(), point.marking.clone()))
            })
            .collect()
    }
}

/// Record of one in-flight firing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionExecution {
    pub id: ExecutionId,
    pub binding: BindingFunction,
    pub quantity_operations: CollectionCounter,
}

/// A transition of a quantity net
pub struct Transition {
    pub name: String,
    pub label: Option<String>,
    /// Forced silent even when labelled
    pub silent: bool,
    /// Never offered by automatic enabled-binding collection
    pub manually_initiated: bool,
    pub input_arcs: Vec<ArcId>,
    pub output_arcs: Vec<ArcId>,
    pub(crate) connections: Connections,
    pub(crate) specification: BindingSpecification,
    pub(crate) guard: Guard,
    qalculator: Box<dyn Qalculator>,
    selection: Box<dyn BindingSelection>,
    executions: IndexMap<ExecutionId, TransitionExecution>,
}

impl Transition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            silent: false,
            manually_initiated: false,
            input_arcs: Vec::new(),
            output_arcs: Vec::new(),
            connections: Connections::default(),
            specification: BindingSpecification::new(),
            guard: Guard::new(),
            qalculator: Box::new(DefaultQalculator),
            selection: Box::new(Exhaustive),
            executions: IndexMap::new(),
        }
    }

    /// Unlabelled or explicitly silent transitions are not logged
    pub fn is_silent(&self) -> bool {
        self.silent || self.label.is_none()
    }

    /// Label if present, else the name
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn connections(&self) -> &Connections {
        &self.connections
    }

    pub fn specification(&self) -> &BindingSpecification {
        &self.specification
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    pub fn object_types(&self) -> BTreeSet<ObjectType> {
        self.connections.object_types()
    }

    pub fn set_qalculator(&mut self, qalculator: Box<dyn Qalculator>) {
        self.qalculator = qalculator;
    }

    pub fn set_selection(&mut self, selection: Box<dyn BindingSelection>) {
        self.selection = selection;
    }

    /// In-flight executions in start order
    pub fn executions(&self) -> impl Iterator<Item = &TransitionExecution> {
        self.executions.values()
    }

    pub fn execution(&self, id: ExecutionId) -> Option<&TransitionExecution> {
        self.executions.get(&id)
    }

    pub(crate) fn context<'a>(&'a self, places: &'a IndexMap<String, Place>, objects: &'a ObjectStore) -> BindingContext<'a> {
        BindingContext {
            transition: &self.name,
            connections: &self.connections,
            specification: &self.specification,
            guard: &self.guard,
            places,
            objects,
        }
    }

    /// Whether the binding can fire now (all object types, current markings, guard)
    pub fn enabled(&self, binding: &BindingFunction, places: &IndexMap<String, Place>, objects: &ObjectStore) -> Result<bool> {
        self.context(places, objects).enabled(binding)
    }

    /// Enabled input-side bindings as chosen by the selection strategy
    pub fn enabled_bindings(
        &mut self,
        places: &IndexMap<String, Place>,
        objects: &ObjectStore,
        single: bool,
    ) -> Option<Vec<BindingFunction>> {
        let ctx = BindingContext {
            transition: &self.name,
            connections: &self.connections,
            specification: &self.specification,
            guard: &self.guard,
            places,
            objects,
        };
        self.selection.select(&ctx, single)
    }

    /// Start firing `binding`
    ///
    /// Everything that can fail is checked before the first mutation: the
    /// binding must be enabled and the qalculator may only touch connected
    /// collection points.
    pub fn start_firing(
        &mut self,
        id: ExecutionId,
        binding: BindingFunction,
        places: &mut IndexMap<String, Place>,
        objects: &ObjectStore,
    ) -> Result<TransitionExecution> {
        if !self.enabled(&binding, places, objects)? {
            return Err(Error::NotEnabled(self.name.clone()));
        }

        let state = self.connections.quantity_state(places);
        let operations = self
            .qalculator
            .determine_quantity_operations(&state, &binding, objects);
        if let Some(cp) = operations
            .collection_points()
            .find(|cp| !self.connections.collection_points.contains(cp.as_str()))
        {
            return Err(Error::UnconnectedCollectionPoint {
                transition: self.name.clone(),
                collection_point: cp.clone(),
            });
        }

        for (object_type, place_names) in &self.connections.input_places {
            let Some(bound) = binding.get(object_type) else {
                continue;
            };
            for place_name in place_names {
                let place = places
                    .get_mut(place_name)
                    .ok_or_else(|| Error::NodeNotFound(place_name.clone()))?;
                place.remove_tokens(bound)?;
            }
        }

        for (cp, delta) in operations.iter() {
            let place = places
                .get_mut(cp)
                .ok_or_else(|| Error::NodeNotFound(cp.clone()))?;
            place.update_marking(delta)?;
            if let Some(point) = place.as_collection_point() {
                if let Some((item, level)) = point.marking.iter().find(|(_, q)| **q < 0) {
                    warn!(transition = %self.name, collection_point = %cp, item = %item, level, "negative stock");
                }
            }
        }

        let execution = TransitionExecution {
            id,
            binding,
            quantity_operations: operations,
        };
        debug!(transition = %self.name, execution = %id, binding = %execution.binding, "started firing");
        self.executions.insert(id, execution.clone());
        Ok(execution)
    }

    /// Finish an in-flight execution, releasing its objects to the output places
    pub fn end_firing(&mut self, id: ExecutionId, places: &mut IndexMap<String, Place>) -> Result<TransitionExecution> {
        let execution = self
            .executions
            .get(&id)
            .ok_or_else(|| Error::UnknownExecution {
                transition: self.name.clone(),
                execution: id,
            })?;

        for (object_type, place_names) in &self.connections.output_places {
            let Some(bound) = execution.binding.get(object_type) else {
                continue;
            };
            for place_name in place_names {
                let place = places
                    .get_mut(place_name)
                    .ok_or_else(|| Error::NodeNotFound(place_name.clone()))?;
                place.add_tokens(object_type, bound.iter().copied())?;
            }
        }

        let execution = self
            .executions
            .shift_remove(&id)
            .ok_or_else(|| Error::UnknownExecution {
                transition: self.name.clone(),
                execution: id,
            })?;
        debug!(transition = %self.name, execution = %id, "ended firing");
        Ok(execution)
    }

    /// Fire and immediately end, for zero-duration firings
    pub fn execute_complete_firing(
        &mut self,
        id: ExecutionId,
        binding: BindingFunction,
        places: &mut IndexMap<String, Place>,
        objects: &ObjectStore,
    ) -> Result<TransitionExecution> {
        self.start_firing(id, binding, places, objects)?;
        self.end_firing(id, places)
    }

    pub(crate) fn reset_selection(&mut self) {
        self.selection.reset();
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("silent", &self.is_silent())
            .field("manually_initiated", &self.manually_initiated)
            .field("connections", &self.connections)
            .field("guard", &self.guard)
            .field("executions", &self.executions.len())
            .finish_non_exhaustive()
    }
}
