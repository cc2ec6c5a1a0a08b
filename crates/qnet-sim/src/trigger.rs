//! Triggers for state-dependent object creation
//!
//! A trigger is a predicate over the current net state. Nodes are referenced
//! by name or label and resolved on every check.

use crate::{Error, Result};
use qnet_core::{ItemCounter, NodeRef, ObjectType, QuantityNet, SmallStockGuard};
use serde::{Deserialize, Serialize};

/// Condition on the state of a quantity net
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Trigger {
    /// At least `threshold` tokens in the place
    PlaceMarkingMin { place: String, threshold: usize },
    /// At most `threshold` tokens in the place
    PlaceMarkingMax { place: String, threshold: usize },
    /// At least `threshold` executions of the transition in flight
    TransitionExecutionsMin { transition: String, threshold: usize },
    /// At most `threshold` executions of the transition in flight
    TransitionExecutionsMax { transition: String, threshold: usize },
    /// Stock of the collection point at or below the threshold
    ///
    /// With `all_item_types` every threshold item type must be at or below
    /// its threshold, otherwise one is enough. Missing item types count as 0.
    QuantityBelow {
        collection_point: String,
        threshold: ItemCounter,
        #[serde(default = "default_all_item_types")]
        all_item_types: bool,
    },
    Any(Vec<Trigger>),
    All(Vec<Trigger>),
}

fn default_all_item_types() -> bool {
    true
}

impl Trigger {
    pub fn check(&self, net: &QuantityNet) -> Result<bool> {
        match self {
            Trigger::PlaceMarkingMin { place, threshold } => Ok(marking_len(net, place)? >= *threshold),
            Trigger::PlaceMarkingMax { place, threshold } => Ok(marking_len(net, place)? <= *threshold),
            Trigger::TransitionExecutionsMin { transition, threshold } => {
                Ok(executions(net, transition)? >= *threshold)
            }
            Trigger::TransitionExecutionsMax { transition, threshold } => {
                Ok(executions(net, transition)? <= *threshold)
            }
            Trigger::QuantityBelow {
                collection_point,
                threshold,
                all_item_types,
            } => {
                let place = match net.identify_node(collection_point)? {
                    NodeRef::Place(place) => place,
                    NodeRef::Transition(t) => return Err(qnet_core::Error::NotACollectionPoint(t.name.clone()).into()),
                };
                let level = &place
                    .as_collection_point()
                    .ok_or_else(|| qnet_core::Error::NotACollectionPoint(place.name.clone()))?
                    .marking;
                Ok(if *all_item_types {
                    SmallStockGuard::item_types_all_below(level, threshold)
                } else {
                    SmallStockGuard::item_types_any_below(level, threshold)
                })
            }
            Trigger::Any(triggers) => {
                for trigger in triggers {
                    if trigger.check(net)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Trigger::All(triggers) => {
                for trigger in triggers {
                    if !trigger.check(net)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}

fn marking_len(net: &QuantityNet, identifier: &str) -> Result<usize> {
    match net.identify_node(identifier)? {
        NodeRef::Place(place) => place
            .as_object_place()
            .map(|p| p.marking.len())
            .ok_or_else(|| Error::Core(qnet_core::Error::NotAnObjectPlace(place.name.clone()))),
        NodeRef::Transition(t) => Err(qnet_core::Error::NotAnObjectPlace(t.name.clone()).into()),
    }
}

fn executions(net: &QuantityNet, identifier: &str) -> Result<usize> {
    let name = net.identify_transition(identifier)?;
    Ok(net.transition(name)?.executions().count())
}

/// Create an object of `object_type` whenever `trigger` holds at the start of a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredCreation {
    pub trigger: Trigger,
    pub object_type: ObjectType,
}

impl TriggeredCreation {
    pub fn new(trigger: Trigger, object_type: impl Into<ObjectType>) -> Self {
        Self {
            trigger,
            object_type: object_type.into(),
        }
    }
}
