//! Activities: named, optionally logged behaviour attached to transitions
//!
//! Every transition maps to the activity named after its label (or its name
//! when unlabelled). Silent transitions map to activities that are not
//! logged. Custom behaviour is plugged in through [`ActivityBehavior`].

use crate::event::Event;
use crate::instruction::{Instruction, ObjectCreation};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use qnet_core::{BindingFunction, CollectionCounter, ObjectStore, QuantityNet, Value, ValueMap};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declarative description of an activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDescriptor {
    pub name: String,
    #[serde(default)]
    pub default_attributes: ValueMap,
    #[serde(default = "default_loggable")]
    pub loggable: bool,
}

fn default_loggable() -> bool {
    true
}

impl ActivityDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_attributes: ValueMap::new(),
            loggable: true,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.default_attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_loggable(mut self, loggable: bool) -> Self {
        self.loggable = loggable;
        self
    }
}

/// State visible to activity hooks
pub struct EventContext<'a> {
    pub event: &'a Event,
    pub binding: &'a BindingFunction,
    /// Stock as the hook runs: before the firing while completing the
    /// binding, after the firing's quantity operations on start, and at the
    /// end of the event on end
    pub quantity_state: &'a CollectionCounter,
    pub objects: &'a ObjectStore,
    pub time: NaiveDateTime,
}

/// Custom behaviour of an activity
///
/// Every hook returns work for the execution queue and defaults to nothing.
pub trait ActivityBehavior {
    /// Objects to create and add to the binding before firing
    ///
    /// Creations must have `add_to_binding` set; they are placed at once.
    fn create_objects_for_binding(&mut self, _ctx: &EventContext) -> Vec<ObjectCreation> {
        Vec::new()
    }

    fn on_start(&mut self, _ctx: &EventContext) -> Vec<Instruction> {
        Vec::new()
    }

    fn on_end(&mut self, _ctx: &EventContext) -> Vec<Instruction> {
        Vec::new()
    }
}

/// Behaviour of activities without custom hooks
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBehavior;

impl ActivityBehavior for DefaultBehavior {}

/// A registered activity
pub struct Activity {
    pub descriptor: ActivityDescriptor,
    behavior: Box<dyn ActivityBehavior>,
}

impl Activity {
    pub fn new(descriptor: ActivityDescriptor) -> Self {
        Self {
            descriptor,
            behavior: Box::new(DefaultBehavior),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn behavior_mut(&mut self) -> &mut dyn ActivityBehavior {
        self.behavior.as_mut()
    }
}

impl fmt::Debug for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activity").field("descriptor", &self.descriptor).finish()
    }
}

/// All activities of a simulation, by name
#[derive(Debug, Default)]
pub struct ActivityRegistry {
    activities: IndexMap<String, Activity>,
}

impl ActivityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the descriptor, keeping any attached behaviour
    pub fn register(&mut self, descriptor: ActivityDescriptor) {
        match self.activities.get_mut(&descriptor.name) {
            Some(activity) => activity.descriptor = descriptor,
            None => {
                self.activities.insert(descriptor.name.clone(), Activity::new(descriptor));
            }
        }
    }

    /// Register an activity for every transition of the net that lacks one
    pub fn register_for_net(&mut self, net: &QuantityNet) {
        for transition in net.transitions() {
            let name = transition.display_name();
            if !self.activities.contains_key(name) {
                let descriptor = ActivityDescriptor::new(name).with_loggable(!transition.is_silent());
                self.activities.insert(name.to_string(), Activity::new(descriptor));
            }
        }
    }

    pub fn set_behavior(&mut self, name: &str, behavior: Box<dyn ActivityBehavior>) -> bool {
        match self.activities.get_mut(name) {
            Some(activity) => {
                activity.behavior = behavior;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Activity> {
        self.activities.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Activity> {
        self.activities.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.activities.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Activity> {
        self.activities.values()
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }
}
