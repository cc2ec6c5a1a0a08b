//! Net structure schema

use crate::error::Result;
use indexmap::IndexMap;
use qnet_core::{CollectionCounter, ObjectType, QuantityNet, SmallStockGuard};
use serde::{Deserialize, Serialize};

/// Small-stock guard of one transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmallStockDef {
    /// Threshold counter per collection point
    pub thresholds: CollectionCounter,
    /// Collection points on which every threshold item type must be low
    #[serde(default)]
    pub all_item_types: Vec<String>,
    /// Every collection point must be low (otherwise one is enough)
    #[serde(default = "default_all_counters")]
    pub all_counters: bool,
}

fn default_all_counters() -> bool {
    true
}

impl SmallStockDef {
    pub fn to_guard(&self) -> SmallStockGuard {
        self.all_item_types
            .iter()
            .fold(SmallStockGuard::new(&self.thresholds), |guard, cp| {
                guard.with_all_item_types(cp.clone(), true)
            })
            .with_all_counters(self.all_counters)
    }
}

/// Declarative quantity net with its initial marking
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetDef {
    /// `(source, target)` pairs; node kinds follow the name prefixes p, c and t
    pub arcs: Vec<(String, String)>,
    pub place_types: IndexMap<String, ObjectType>,
    pub transition_labels: IndexMap<String, String>,
    pub collection_point_labels: IndexMap<String, String>,
    /// Explicit initial places, overriding inference
    pub initial_places: Vec<String>,
    /// Explicit final places, overriding inference
    pub final_places: Vec<String>,
    pub silent_transitions: Vec<String>,
    pub manual_transitions: Vec<String>,
    pub variable_arcs: Vec<(String, String)>,
    /// Required binding counts per transition and object type
    pub binding_required: IndexMap<String, IndexMap<ObjectType, usize>>,
    pub binding_minimum: IndexMap<String, IndexMap<ObjectType, usize>>,
    pub binding_maximum: IndexMap<String, IndexMap<ObjectType, usize>>,
    pub small_stock_guards: IndexMap<String, SmallStockDef>,
    /// Initial collection point markings
    pub initial_stock: CollectionCounter,
    /// Objects created in the initial places of their type
    pub initial_objects: IndexMap<ObjectType, usize>,
    /// Objects created directly in a place
    pub objects_in_places: IndexMap<String, usize>,
}

impl NetDef {
    /// Build the net structure; the initial marking is applied by the simulation
    pub fn build(&self) -> Result<QuantityNet> {
        let mut net = QuantityNet::from_arcs(&self.arcs)?;
        if !self.place_types.is_empty() {
            net.set_place_types(&self.place_types)?;
        }
        net.set_transition_labels(&self.transition_labels)?;
        net.set_collection_point_labels(&self.collection_point_labels)?;
        if !self.initial_places.is_empty() {
            net.set_initial_places(&self.initial_places)?;
        }
        if !self.final_places.is_empty() {
            net.set_final_places(&self.final_places)?;
        }
        net.set_silent_transitions(&self.silent_transitions)?;
        net.set_manually_initiated_transitions(&self.manual_transitions)?;
        net.make_arcs_variable(&self.variable_arcs)?;
        for (transition, required) in &self.binding_required {
            net.set_binding_function_specification(transition, required)?;
        }
        for (transition, maximum) in &self.binding_maximum {
            net.set_binding_function_specification_maximum(transition, maximum)?;
        }
        for (transition, minimum) in &self.binding_minimum {
            net.set_binding_function_specification_minimum(transition, minimum)?;
        }
        for (transition, guard) in &self.small_stock_guards {
            net.set_small_stock_guard(transition, guard.to_guard())?;
        }
        Ok(net)
    }
}
