//! Simulation state and the handlers for due actions
//!
//! `SimulationModel` owns the net, the objects, the registries and the log.
//! It knows how to carry out every kind of queue item but not when; timing
//! and selection live in [`crate::Simulation`].

use crate::activity::{ActivityBehavior, ActivityDescriptor, ActivityRegistry, EventContext};
use crate::event::Event;
use crate::instruction::{Action, EventEnd, EventStart, Instruction, ObjectCreation};
use crate::log::{EventLog, ObjectChange, QuantityRecord};
use crate::{Error, Result};
use chrono::{Duration, NaiveDateTime};
use indexmap::IndexMap;
use qnet_core::{
    BindingFunction, CollectionCounter, EventId, Execution, IdGenerator, ItemCounter, ObjectId, ObjectStatus, ObjectStore,
    ObjectType, ObjectTypeDescriptor, ObjectTypeRegistry, QuantityNet, ValueMap,
};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Everything a running simulation knows about its world
#[derive(Debug)]
pub struct SimulationModel {
    pub net: QuantityNet,
    pub objects: ObjectStore,
    pub object_types: ObjectTypeRegistry,
    pub activities: ActivityRegistry,
    pub log: EventLog,
    running: IndexMap<EventId, Event>,
    event_ids: IdGenerator,
    final_markings: IndexMap<ObjectType, Vec<BTreeSet<String>>>,
    terminated: usize,
}

impl SimulationModel {
    /// Wrap a net, registering its object types and activities
    pub fn new(net: QuantityNet) -> Self {
        let mut object_types = ObjectTypeRegistry::new();
        for object_type in net.object_types() {
            object_types.get_or_register(&object_type);
        }
        let mut activities = ActivityRegistry::new();
        activities.register_for_net(&net);
        let mut model = Self {
            net,
            objects: ObjectStore::new(),
            object_types,
            activities,
            log: EventLog::new(),
            running: IndexMap::new(),
            event_ids: IdGenerator::new(),
            final_markings: IndexMap::new(),
            terminated: 0,
        };
        model.set_final_markings(&IndexMap::new());
        model
    }

    pub fn register_object_type(&mut self, descriptor: ObjectTypeDescriptor) {
        self.object_types.register(descriptor);
    }

    pub fn register_activity(&mut self, descriptor: ActivityDescriptor) {
        self.activities.register(descriptor);
    }

    pub fn set_activity_behavior(&mut self, activity: &str, behavior: Box<dyn ActivityBehavior>) -> Result<()> {
        if self.activities.set_behavior(activity, behavior) {
            Ok(())
        } else {
            Err(Error::UnknownActivity(activity.to_string()))
        }
    }

    /// Set final markings; types left out get one singleton per final place
    pub fn set_final_markings(&mut self, markings: &IndexMap<ObjectType, Vec<BTreeSet<String>>>) {
        self.final_markings = markings.clone();
        for object_type in self.net.object_types() {
            if !self.final_markings.contains_key(&object_type) {
                let defaults = self
                    .net
                    .get_final_places_object_type(&object_type)
                    .into_iter()
                    .map(|p| BTreeSet::from([p.to_string()]))
                    .collect();
                self.final_markings.insert(object_type, defaults);
            }
        }
    }

    pub fn final_markings(&self, object_type: &ObjectType) -> &[BTreeSet<String>] {
        self.final_markings.get(object_type).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether the object's current location set is a final marking of its type
    pub fn in_final_marking(&self, id: ObjectId) -> Result<bool> {
        let object = self.objects.require(id)?;
        let locations = self.net.get_locations_of_object(id);
        Ok(self.final_markings(&object.object_type).contains(&locations))
    }

    pub fn terminated_objects(&self) -> usize {
        self.terminated
    }

    /// Events started so far, logged or not
    pub fn started_events(&self) -> u64 {
        self.event_ids.issued()
    }

    pub fn running_events(&self) -> impl Iterator<Item = &Event> {
        self.running.values()
    }

    /// Activity of a transition given by name or label
    pub fn activity_of(&self, transition: &str) -> Result<&str> {
        let name = self.net.identify_transition(transition)?;
        Ok(self.net.transition(name)?.display_name())
    }

    // ---- objects ----

    /// Create an object without placing it
    pub fn create_object(&mut self, creation: &ObjectCreation, time: NaiveDateTime) -> Result<ObjectId> {
        let id = self.build_object(creation, time)?;
        self.log_object(id);
        Ok(id)
    }

    fn build_object(&mut self, creation: &ObjectCreation, time: NaiveDateTime) -> Result<ObjectId> {
        let descriptor = self
            .object_types
            .get(&creation.object_type)
            .ok_or_else(|| Error::UnknownObjectType(creation.object_type.clone()))?;
        let object = self.objects.create(descriptor, time);
        for (key, value) in &creation.attributes {
            object.attributes.insert(key.clone(), value.clone());
        }
        object.quantities = creation.quantities.clone();
        for (other, qualifier) in &creation.o2o {
            object.add_relation(*other, qualifier.clone());
        }
        let id = object.id;
        debug!(object = %id, object_type = %creation.object_type, "created object");
        Ok(id)
    }

    /// Put an object into places (its type's initial places when empty) and activate it
    pub fn place_object(&mut self, id: ObjectId, places: &[String]) -> Result<()> {
        let object_type = self.objects.require(id)?.object_type.clone();
        let targets: Vec<String> = if places.is_empty() {
            self.net
                .get_initial_places_object_type(&object_type)
                .into_iter()
                .map(String::from)
                .collect()
        } else {
            places.to_vec()
        };
        if targets.is_empty() {
            warn!(object = %id, object_type = %object_type, "no initial place for object type");
            return Ok(());
        }
        let assignment: IndexMap<String, Vec<ObjectId>> = targets.into_iter().map(|p| (p, vec![id])).collect();
        self.net.add_objects_to_places(&self.objects, &assignment)?;
        self.objects.set_status(id, ObjectStatus::Active)?;
        self.log_object(id);
        Ok(())
    }

    /// Create `count` objects of a type in its initial places
    pub fn add_initial_objects(
        &mut self,
        object_type: &ObjectType,
        count: usize,
        time: NaiveDateTime,
    ) -> Result<Vec<ObjectId>> {
        let creation = ObjectCreation::new(object_type.clone());
        (0..count)
            .map(|_| {
                let id = self.create_object(&creation, time)?;
                self.place_object(id, &[])?;
                Ok(id)
            })
            .collect()
    }

    /// Create `count` objects of the place's type directly in a place
    pub fn add_objects_to_place(&mut self, place: &str, count: usize, time: NaiveDateTime) -> Result<Vec<ObjectId>> {
        let object_type = self
            .net
            .place(place)?
            .object_type()
            .cloned()
            .ok_or_else(|| qnet_core::Error::NotAnObjectPlace(place.to_string()))?;
        let creation = ObjectCreation::new(object_type);
        let places = [place.to_string()];
        (0..count)
            .map(|_| {
                let id = self.create_object(&creation, time)?;
                self.place_object(id, &places)?;
                Ok(id)
            })
            .collect()
    }

    /// Add stock to collection points and record it as initial stock
    pub fn set_initial_stock(&mut self, stock: &CollectionCounter, time: NaiveDateTime) -> Result<()> {
        self.net.update_markings_collection_points(stock)?;
        for (cp, counter) in stock.iter() {
            let place = self.net.place(cp)?;
            if let Some(label) = place.label.as_ref() {
                self.log.record_quantity_operation(QuantityRecord {
                    event: None,
                    collection_point: label.clone(),
                    time,
                    operation: counter.clone(),
                });
            }
        }
        Ok(())
    }

    fn log_object(&mut self, id: ObjectId) {
        let Some(object) = self.objects.get(id) else {
            return;
        };
        let loggable = self.object_types.get(&object.object_type).map_or(true, |d| d.loggable);
        if loggable {
            self.log.record_object(object);
        }
    }

    fn record_change(&mut self, change: ObjectChange) {
        let id = change.object();
        let loggable = self
            .objects
            .get(id)
            .and_then(|o| self.object_types.get(&o.object_type))
            .map_or(true, |d| d.loggable);
        if loggable {
            self.log.record_change(change);
        }
        self.log_object(id);
    }

    // ---- enabled bindings ----

    /// Enabled bindings per transition, skipping manually initiated ones
    pub fn enabled_bindings(&mut self) -> IndexMap<String, Vec<BindingFunction>> {
        self.net.get_enabled_bindings_all_transitions_for_input_types(&self.objects)
    }

    /// Whether every bound input object still sits in the transition's input places
    ///
    /// Another event started at the same instant may have taken them.
    pub fn binding_available(&self, transition: &str, binding: &BindingFunction) -> Result<bool> {
        let name = self.net.identify_transition(transition)?;
        let connections = self.net.transition(name)?.connections();
        for (object_type, objects) in binding.iter() {
            for place in connections.input_places_of(object_type) {
                let Some(marking) = self.net.place(place)?.as_object_place().map(|p| &p.marking) else {
                    continue;
                };
                if !objects.iter().all(|id| marking.contains(*id)) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    // ---- actions ----

    /// Start an event
    ///
    /// Completes the binding (objects requested by the activity, then
    /// fresh objects for output-only types), starts the firing, activates
    /// the bound objects and returns the follow-up instructions including
    /// the termination after `duration`. A rejected firing drops the objects
    /// created for it and leaves the model as it was.
    pub fn start_event(&mut self, start: EventStart, time: NaiveDateTime, duration: Duration) -> Result<Vec<Instruction>> {
        let transition = self.net.identify_transition(&start.transition)?.to_string();
        let activity = self.activity_of(&transition)?.to_string();
        let descriptor = self
            .activities
            .get(&activity)
            .map(|a| a.descriptor.clone())
            .ok_or_else(|| Error::UnknownActivity(activity.clone()))?;

        let id = EventId::new(self.event_ids.peek_raw());
        let mut event = Event::new(id, &activity, &transition, time);
        event.attributes = descriptor.default_attributes.clone();
        event.loggable = descriptor.loggable;
        event.set_duration(duration);

        let mut binding = start.binding;
        let requested = {
            let state = self.net.quantity_state();
            let behavior = self
                .activities
                .get_mut(&activity)
                .ok_or_else(|| Error::UnknownActivity(activity.clone()))?
                .behavior_mut();
            behavior.create_objects_for_binding(&EventContext {
                event: &event,
                binding: &binding,
                quantity_state: &state,
                objects: &self.objects,
                time,
            })
        };
        if requested.iter().any(|creation| !creation.add_to_binding) {
            return Err(Error::InvalidCreation {
                activity,
                reason: "objects created for a binding must set add_to_binding".into(),
            });
        }

        let checkpoint = self.objects.checkpoint();
        let execution = match self.complete_and_fire(&transition, &mut binding, &requested, time) {
            Ok(execution) => execution,
            Err(e) => {
                let dropped = self.objects.rollback(checkpoint);
                warn!(transition = %transition, dropped = dropped.len(), error = %e, "event start rejected");
                return Err(e);
            }
        };
        self.event_ids.next_raw();

        for object in binding.objects() {
            self.objects.set_status(object, ObjectStatus::Active)?;
            self.log_object(object);
        }
        event.start(&binding, execution.transition_execution.quantity_operations.clone());
        info!(event = %id, activity = %activity, binding = %binding, "event started");

        let state = self.net.quantity_state();
        let mut instructions = self
            .activities
            .get_mut(&activity)
            .ok_or_else(|| Error::UnknownActivity(activity.clone()))?
            .behavior_mut()
            .on_start(&EventContext {
                event: &event,
                binding: &binding,
                quantity_state: &state,
                objects: &self.objects,
                time,
            });
        instructions.push(Instruction::new(
            duration,
            Action::TerminateEvent(EventEnd {
                event: id,
                execution: execution.id,
            }),
        ));
        self.running.insert(id, event);
        Ok(instructions)
    }

    /// Create the objects the binding still lacks and start the firing
    fn complete_and_fire(
        &mut self,
        transition: &str,
        binding: &mut BindingFunction,
        requested: &[ObjectCreation],
        time: NaiveDateTime,
    ) -> Result<Execution> {
        for creation in requested {
            let object = self.build_object(creation, time)?;
            binding.extend(creation.object_type.clone(), [object]);
        }
        self.add_missing_objects(transition, binding, time)?;
        Ok(self.net.start_firing_transition(transition, binding.clone(), &self.objects)?)
    }

    /// End a running event and release its objects
    pub fn end_event(&mut self, end: EventEnd, time: NaiveDateTime) -> Result<Vec<Instruction>> {
        let mut event = self.running.shift_remove(&end.event).ok_or(Error::UnknownEvent(end.event))?;
        let binding = self
            .net
            .transition(&event.transition)?
            .execution(end.execution)
            .map(|e| e.binding.clone())
            .ok_or_else(|| qnet_core::Error::UnknownExecution {
                transition: event.transition.clone(),
                execution: end.execution,
            })?;
        event.end(&binding, time)?;

        let state = self.net.quantity_state();
        let instructions = self
            .activities
            .get_mut(&event.activity)
            .ok_or_else(|| Error::UnknownActivity(event.activity.clone()))?
            .behavior_mut()
            .on_end(&EventContext {
                event: &event,
                binding: &binding,
                quantity_state: &state,
                objects: &self.objects,
                time,
            });

        self.net.end_firing_transition(end.execution)?;
        info!(event = %event.id, activity = %event.activity, "event ended");

        for object in binding.objects() {
            if self.in_final_marking(object)? {
                self.objects.set_status(object, ObjectStatus::Terminated)?;
                self.terminated += 1;
                debug!(object = %object, "object terminated");
                self.record_change(ObjectChange::Status {
                    object,
                    time,
                    status: ObjectStatus::Terminated,
                });
            }
        }

        if event.loggable {
            for (cp, operation) in event.quantity_operations.iter() {
                if let Some(label) = self.net.place(cp)?.label.as_ref() {
                    self.log.record_quantity_operation(QuantityRecord {
                        event: Some(event.id),
                        collection_point: label.clone(),
                        time: event.timestamp,
                        operation: operation.clone(),
                    });
                }
            }
        }
        self.log.record_event(event);
        Ok(instructions)
    }

    pub fn update_status(&mut self, object: ObjectId, status: ObjectStatus, time: NaiveDateTime) -> Result<()> {
        let previous = self.objects.require(object)?.status;
        self.objects.set_status(object, status)?;
        if previous != ObjectStatus::Terminated && status == ObjectStatus::Terminated {
            self.terminated += 1;
        } else if previous == ObjectStatus::Terminated && status != ObjectStatus::Terminated {
            self.terminated -= 1;
        }
        self.record_change(ObjectChange::Status { object, time, status });
        Ok(())
    }

    pub fn update_attributes(&mut self, object: ObjectId, attributes: &ValueMap, time: NaiveDateTime) -> Result<()> {
        let changed = self.objects.require_mut(object)?.change_attributes(attributes, time);
        if changed.is_empty() {
            return Ok(());
        }
        let attributes = changed
            .into_iter()
            .filter_map(|key| attributes.get(&key).map(|v| (key, v.clone())))
            .collect();
        self.record_change(ObjectChange::Attributes { object, time, attributes });
        Ok(())
    }

    pub fn update_quantities(&mut self, object: ObjectId, delta: &ItemCounter, time: NaiveDateTime) -> Result<()> {
        self.objects.require_mut(object)?.change_quantities(delta, time);
        self.record_change(ObjectChange::Quantities {
            object,
            time,
            delta: delta.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use qnet_core::Value;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 10, 12)
            .and_then(|d| d.and_hms_opt(12, 21, 0))
            .unwrap()
    }

    /// order: p1 -> t1 -> p2 -> t2 -> p3, invoice created by t1 into p4
    fn model() -> SimulationModel {
        let mut net = QuantityNet::from_arcs(&[
            ("p1", "t1"),
            ("t1", "p2"),
            ("t1", "p4"),
            ("p2", "t2"),
            ("t2", "p3"),
            ("t1", "c1"),
        ])
        .unwrap();
        let types: IndexMap<String, ObjectType> = [
            ("p1", "order"),
            ("p2", "order"),
            ("p3", "order"),
            ("p4", "invoice"),
        ]
        .into_iter()
        .map(|(p, t)| (p.to_string(), ObjectType::new(t)))
        .collect();
        net.set_place_types(&types).unwrap();
        let labels: IndexMap<String, String> = [("t1", "place order"), ("t2", "ship")]
            .into_iter()
            .map(|(t, l)| (t.to_string(), l.to_string()))
            .collect();
        net.set_transition_labels(&labels).unwrap();
        let cp_labels: IndexMap<String, String> = [("c1".to_string(), "stock".to_string())].into_iter().collect();
        net.set_collection_point_labels(&cp_labels).unwrap();
        SimulationModel::new(net)
    }

    fn start(model: &mut SimulationModel, transition: &str, binding: BindingFunction) -> Vec<Instruction> {
        model
            .start_event(
                EventStart {
                    transition: transition.into(),
                    binding,
                    duration: None,
                },
                t0(),
                Duration::minutes(10),
            )
            .unwrap()
    }

    fn end_of(instructions: &[Instruction]) -> EventEnd {
        instructions
            .iter()
            .find_map(|i| match i.action {
                Action::TerminateEvent(end) => Some(end),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_registries_from_net() {
        let model = model();
        assert!(model.object_types.get(&"order".into()).is_some());
        assert!(model.object_types.get(&"invoice".into()).is_some());
        assert!(model.activities.contains("place order"));
        assert!(model.activities.contains("ship"));
        assert_eq!(model.final_markings(&"order".into()), &[BTreeSet::from(["p3".to_string()])]);
    }

    #[test]
    fn test_initial_objects_are_active() {
        let mut model = model();
        let ids = model.add_initial_objects(&"order".into(), 3, t0()).unwrap();
        assert_eq!(ids.len(), 3);
        for id in &ids {
            assert_eq!(model.objects.status(*id), Some(ObjectStatus::Active));
            assert_eq!(model.net.get_locations_of_object(*id), BTreeSet::from(["p1".to_string()]));
        }
        assert_eq!(model.log.objects().count(), 3);
    }

    #[test]
    fn test_unknown_object_type() {
        let mut model = model();
        let result = model.create_object(&ObjectCreation::new("pallet"), t0());
        assert_eq!(result, Err(Error::UnknownObjectType("pallet".into())));
    }

    #[test]
    fn test_event_lifecycle_creates_output_objects_and_terminates() {
        let mut model = model();
        let order = model.add_initial_objects(&"order".into(), 1, t0()).unwrap()[0];

        let instructions = start(&mut model, "place order", BindingFunction::new().with("order", [order]));
        let end = end_of(&instructions);
        assert_eq!(instructions.last().map(|i| i.delay), Some(Duration::minutes(10)));
        assert_eq!(model.running_events().count(), 1);

        // the invoice was created for the output-only type and activated
        let invoices: Vec<_> = model.objects.by_type(&"invoice".into()).map(|o| o.id).collect();
        assert_eq!(invoices.len(), 1);
        assert_eq!(model.objects.status(invoices[0]), Some(ObjectStatus::Active));
        assert!(model.net.get_locations_of_object(order).is_empty());

        model.end_event(end, t0() + Duration::minutes(10)).unwrap();
        assert_eq!(model.net.get_locations_of_object(order), BTreeSet::from(["p2".to_string()]));
        // p4 is the only final place of invoices
        assert_eq!(model.objects.status(invoices[0]), Some(ObjectStatus::Terminated));
        assert_eq!(model.objects.status(order), Some(ObjectStatus::Active));
        assert_eq!(model.terminated_objects(), 1);

        let logged = &model.log.events()[0];
        assert_eq!(logged.activity, "place order");
        assert_eq!(logged.end_timestamp, Some(t0() + Duration::minutes(10)));
        assert_eq!(logged.objects.len(), 2);

        let end = end_of(&start(&mut model, "t2", BindingFunction::new().with("order", [order])));
        model.end_event(end, t0() + Duration::minutes(20)).unwrap();
        assert_eq!(model.objects.status(order), Some(ObjectStatus::Terminated));
        assert_eq!(model.terminated_objects(), 2);
        assert_eq!(model.started_events(), 2);
    }

    #[test]
    fn test_end_unknown_event() {
        let mut model = model();
        let end = EventEnd {
            event: EventId::new(9),
            execution: qnet_core::ExecutionId::new(0),
        };
        assert_eq!(model.end_event(end, t0()), Err(Error::UnknownEvent(EventId::new(9))));
    }

    #[test]
    fn test_behavior_objects_join_binding() {
        struct Invoice;
        impl ActivityBehavior for Invoice {
            fn create_objects_for_binding(&mut self, _ctx: &EventContext) -> Vec<ObjectCreation> {
                vec![
                    ObjectCreation::new("invoice").with_attribute("amount", 10i64).for_binding(),
                    ObjectCreation::new("invoice").for_binding(),
                ]
            }
        }

        let mut model = model();
        model
            .set_binding_cardinality_for_test("t1", "invoice", 0)
            .set_activity_behavior("place order", Box::new(Invoice))
            .unwrap();
        let order = model.add_initial_objects(&"order".into(), 1, t0()).unwrap()[0];
        let instructions = start(&mut model, "t1", BindingFunction::new().with("order", [order]));
        let event = model.running_events().next().unwrap();
        assert_eq!(event.objects.len(), 3);
        assert_eq!(instructions.len(), 1);
        let amounts: Vec<_> = model
            .objects
            .by_type(&"invoice".into())
            .filter_map(|o| o.get("amount").cloned())
            .collect();
        assert_eq!(amounts, vec![Value::Int(10)]);
    }

    #[test]
    fn test_behavior_creation_must_join_binding() {
        struct Wrong;
        impl ActivityBehavior for Wrong {
            fn create_objects_for_binding(&mut self, _ctx: &EventContext) -> Vec<ObjectCreation> {
                vec![ObjectCreation::new("invoice")]
            }
        }
        let mut model = model();
        model.set_activity_behavior("place order", Box::new(Wrong)).unwrap();
        let order = model.add_initial_objects(&"order".into(), 1, t0()).unwrap()[0];
        let result = model.start_event(
            EventStart {
                transition: "t1".into(),
                binding: BindingFunction::new().with("order", [order]),
                duration: None,
            },
            t0(),
            Duration::zero(),
        );
        assert!(matches!(result, Err(Error::InvalidCreation { .. })));
        assert_eq!(model.started_events(), 0);
        assert_eq!(model.net.get_locations_of_object(order), BTreeSet::from(["p1".to_string()]));
    }

    #[test]
    fn test_quantity_operations_are_logged_with_label() {
        let mut model = model();
        let stock: CollectionCounter = [("c1", ItemCounter::from([("A", 10)]))].into_iter().collect();
        model.set_initial_stock(&stock, t0()).unwrap();
        model
            .net
            .set_qalculator(
                "t1",
                Box::new(|_: &CollectionCounter, _: &BindingFunction, _: &ObjectStore| -> CollectionCounter {
                    [("c1", ItemCounter::from([("A", -3)]))].into_iter().collect()
                }),
            )
            .unwrap();
        let order = model.add_initial_objects(&"order".into(), 1, t0()).unwrap()[0];
        let end = end_of(&start(&mut model, "t1", BindingFunction::new().with("order", [order])));
        model.end_event(end, t0()).unwrap();

        let records = model.log.quantity_operations();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event, None);
        assert_eq!(records[1].collection_point, "stock");
        assert_eq!(records[1].operation, ItemCounter::from([("A", -3)]));
        assert_eq!(model.net.quantity_state().get("c1").map(|c| c.get("A")), Some(7));
    }

    #[test]
    fn test_on_start_sees_stock_after_quantity_operations() {
        struct RecordStock(std::rc::Rc<std::cell::Cell<Option<i64>>>);
        impl ActivityBehavior for RecordStock {
            fn on_start(&mut self, ctx: &EventContext) -> Vec<Instruction> {
                self.0.set(ctx.quantity_state.get("c1").map(|c| c.get("A")));
                Vec::new()
            }
        }

        let mut model = model();
        let stock: CollectionCounter = [("c1", ItemCounter::from([("A", 10)]))].into_iter().collect();
        model.set_initial_stock(&stock, t0()).unwrap();
        model
            .net
            .set_qalculator(
                "t1",
                Box::new(|_: &CollectionCounter, _: &BindingFunction, _: &ObjectStore| -> CollectionCounter {
                    [("c1", ItemCounter::from([("A", -3)]))].into_iter().collect()
                }),
            )
            .unwrap();
        let seen = std::rc::Rc::new(std::cell::Cell::new(None));
        model
            .set_activity_behavior("place order", Box::new(RecordStock(seen.clone())))
            .unwrap();
        let order = model.add_initial_objects(&"order".into(), 1, t0()).unwrap()[0];
        start(&mut model, "t1", BindingFunction::new().with("order", [order]));

        assert_eq!(seen.get(), Some(7));
    }

    #[test]
    fn test_rejected_start_leaves_model_unchanged() {
        let mut model = model();
        model
            .net
            .set_qalculator(
                "t1",
                Box::new(|_: &CollectionCounter, _: &BindingFunction, _: &ObjectStore| -> CollectionCounter {
                    [("c9", ItemCounter::from([("A", 1)]))].into_iter().collect()
                }),
            )
            .unwrap();
        let order = model.add_initial_objects(&"order".into(), 1, t0()).unwrap()[0];
        let objects_before = model.objects.len();
        let logged_before = model.log.objects().count();

        let result = model.start_event(
            EventStart {
                transition: "t1".into(),
                binding: BindingFunction::new().with("order", [order]),
                duration: None,
            },
            t0(),
            Duration::minutes(10),
        );

        assert!(matches!(
            result,
            Err(Error::Core(qnet_core::Error::UnconnectedCollectionPoint { .. }))
        ));
        assert_eq!(model.objects.len(), objects_before);
        assert_eq!(model.objects.by_type(&"invoice".into()).count(), 0);
        assert_eq!(model.log.objects().count(), logged_before);
        assert_eq!(model.started_events(), 0);
        assert_eq!(model.running_events().count(), 0);
        assert_eq!(model.net.get_locations_of_object(order), BTreeSet::from(["p1".to_string()]));
    }

    #[test]
    fn test_object_updates() {
        let mut model = model();
        let descriptor = ObjectTypeDescriptor::new("order").with_attribute("priority", "low");
        model.register_object_type(descriptor);
        let order = model.add_initial_objects(&"order".into(), 1, t0()).unwrap()[0];

        let changes: ValueMap = [
            ("priority".to_string(), Value::from("high")),
            ("unknown".to_string(), Value::from(1i64)),
        ]
        .into_iter()
        .collect();
        model.update_attributes(order, &changes, t0()).unwrap();
        model.update_quantities(order, &ItemCounter::from([("A", 2)]), t0()).unwrap();
        model.update_status(order, ObjectStatus::Inactive, t0()).unwrap();

        let object = model.objects.require(order).unwrap();
        assert_eq!(object.get("priority"), Some(&Value::from("high")));
        assert_eq!(object.get("unknown"), None);
        assert_eq!(object.quantities.get("A"), 2);
        assert_eq!(object.status, ObjectStatus::Inactive);
        assert_eq!(model.log.changes().len(), 3);
        match &model.log.changes()[0] {
            ObjectChange::Attributes { attributes, .. } => assert_eq!(attributes.len(), 1),
            other => panic!("unexpected change {other:?}"),
        }
    }

    impl SimulationModel {
        fn set_binding_cardinality_for_test(&mut self, transition: &str, object_type: &str, required: usize) -> &mut Self {
            let mut spec = IndexMap::new();
            for ot in self.net.transition(transition).unwrap().object_types() {
                let n = if ot.as_str() == object_type { required } else { 1 };
                spec.insert(ot, n);
            }
            self.net.set_binding_function_specification(transition, &spec).unwrap();
            self
        }
    }
}
