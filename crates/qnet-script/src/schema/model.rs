//! Complete model schema: net, object types, activities and run configuration

use super::net::NetDef;
use crate::error::{Error, Result};
use qnet_core::ObjectTypeDescriptor;
use qnet_sim::{ActivityDescriptor, Simulation, SimulationConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// A simulation model as written in a RON file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDef {
    pub net: NetDef,
    pub object_types: Vec<ObjectTypeDescriptor>,
    pub activities: Vec<ActivityDescriptor>,
    pub simulation: SimulationConfig,
}

impl ModelDef {
    /// Reject duplicate object type or activity names
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for descriptor in &self.object_types {
            if !seen.insert(descriptor.name.as_str()) {
                return Err(Error::DuplicateDefinition(format!("object type {}", descriptor.name)));
            }
        }
        let mut seen = HashSet::new();
        for descriptor in &self.activities {
            if !seen.insert(descriptor.name.as_str()) {
                return Err(Error::DuplicateDefinition(format!("activity {}", descriptor.name)));
            }
        }
        Ok(())
    }

    /// Build a simulation with its initial marking in place
    ///
    /// Qalculators, object guards and activity behaviours are code and are
    /// attached to the returned simulation afterwards.
    pub fn build(&self) -> Result<Simulation> {
        self.validate()?;
        let net = self.net.build()?;
        for descriptor in &self.object_types {
            if !net.object_types().contains(&descriptor.name) {
                return Err(Error::InvalidSchema(format!(
                    "object type {} does not occur in the net",
                    descriptor.name
                )));
            }
        }
        let mut sim = Simulation::new(net, self.simulation.clone())?;
        for descriptor in &self.object_types {
            sim.register_object_type(descriptor.clone());
        }
        for descriptor in &self.activities {
            sim.register_activity(descriptor.clone());
        }

        sim.set_initial_stock(&self.net.initial_stock)?;
        for (object_type, count) in &self.net.initial_objects {
            sim.add_initial_objects(object_type, *count)?;
        }
        for (place, count) in &self.net.objects_in_places {
            sim.add_objects_to_place(place, *count)?;
        }
        debug!(
            objects = sim.model().objects.len(),
            activities = sim.model().activities.len(),
            "model built"
        );
        Ok(sim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qnet_core::ObjectStatus;

    #[test]
    fn test_duplicate_object_type() {
        let def = ModelDef {
            object_types: vec![ObjectTypeDescriptor::new("order"), ObjectTypeDescriptor::new("order")],
            ..ModelDef::default()
        };
        assert!(matches!(def.validate(), Err(Error::DuplicateDefinition(_))));
    }

    #[test]
    fn test_object_type_must_be_in_net() {
        let def = ModelDef {
            net: NetDef {
                arcs: vec![("p1".into(), "t1".into())],
                ..NetDef::default()
            },
            object_types: vec![ObjectTypeDescriptor::new("pallet")],
            ..ModelDef::default()
        };
        assert!(matches!(def.build(), Err(Error::InvalidSchema(_))));
    }

    #[test]
    fn test_build_places_initial_objects() {
        let def = ModelDef {
            net: NetDef {
                arcs: vec![("p1".into(), "t1".into()), ("t1".into(), "p2".into())],
                place_types: [("p1".to_string(), "order".into()), ("p2".to_string(), "order".into())]
                    .into_iter()
                    .collect(),
                initial_objects: [("order".into(), 2)].into_iter().collect(),
                objects_in_places: [("p2".to_string(), 1)].into_iter().collect(),
                ..NetDef::default()
            },
            object_types: vec![ObjectTypeDescriptor::new("order").with_attribute("priority", "low")],
            ..ModelDef::default()
        };
        let sim = def.build().unwrap();
        let objects = &sim.model().objects;
        assert_eq!(objects.len(), 3);
        assert!(objects.iter().all(|o| o.status == ObjectStatus::Active));
        assert!(objects.iter().all(|o| o.get("priority").is_some()));
        let p1 = sim.net().place("p1").unwrap().as_object_place().unwrap();
        assert_eq!(p1.marking.len(), 2);
    }
}
