//! In-memory event log written by the simulation

use crate::event::Event;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use qnet_core::{EventId, ItemCounter, Object, ObjectId, ObjectStatus, ValueMap};
use serde::{Deserialize, Serialize};

/// A change applied to a logged object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectChange {
    Attributes {
        object: ObjectId,
        time: NaiveDateTime,
        attributes: ValueMap,
    },
    Quantities {
        object: ObjectId,
        time: NaiveDateTime,
        delta: ItemCounter,
    },
    Status {
        object: ObjectId,
        time: NaiveDateTime,
        status: ObjectStatus,
    },
}

impl ObjectChange {
    pub fn object(&self) -> ObjectId {
        match self {
            ObjectChange::Attributes { object, .. }
            | ObjectChange::Quantities { object, .. }
            | ObjectChange::Status { object, .. } => *object,
        }
    }

    pub fn time(&self) -> NaiveDateTime {
        match self {
            ObjectChange::Attributes { time, .. }
            | ObjectChange::Quantities { time, .. }
            | ObjectChange::Status { time, .. } => *time,
        }
    }
}

/// Quantity operation on one collection point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityRecord {
    /// `None` for the initial stock
    pub event: Option<EventId>,
    /// Collection point label
    pub collection_point: String,
    pub time: NaiveDateTime,
    pub operation: ItemCounter,
}

/// Everything recorded during a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<Event>,
    objects: IndexMap<ObjectId, Object>,
    changes: Vec<ObjectChange>,
    quantity_operations: Vec<QuantityRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished event; events that are not loggable are skipped
    pub fn record_event(&mut self, event: Event) -> bool {
        if !event.loggable {
            return false;
        }
        self.events.push(event);
        true
    }

    /// Insert or refresh the latest state of an object
    pub fn record_object(&mut self, object: &Object) {
        self.objects.insert(object.id, object.clone());
    }

    pub fn record_change(&mut self, change: ObjectChange) {
        self.changes.push(change);
    }

    pub fn record_quantity_operation(&mut self, record: QuantityRecord) {
        self.quantity_operations.push(record);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id)
    }

    pub fn changes(&self) -> &[ObjectChange] {
        &self.changes
    }

    pub fn quantity_operations(&self) -> &[QuantityRecord] {
        &self.quantity_operations
    }

    /// Initial stock entries, one per collection point
    pub fn initial_stock(&self) -> impl Iterator<Item = &QuantityRecord> {
        self.quantity_operations.iter().filter(|r| r.event.is_none())
    }

    pub fn events_of_activity<'a>(&'a self, activity: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.events.iter().filter(move |e| e.activity == activity)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use qnet_core::{ObjectStore, ObjectTypeDescriptor};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 10, 12)
            .and_then(|d| d.and_hms_opt(12, 21, 0))
            .unwrap()
    }

    #[test]
    fn test_silent_events_are_skipped() {
        let mut log = EventLog::new();
        let mut silent = Event::new(EventId::new(0), "t9", "t9", t0());
        silent.loggable = false;
        assert!(!log.record_event(silent));
        assert!(log.record_event(Event::new(EventId::new(1), "ship", "t1", t0())));
        assert_eq!(log.events().len(), 1);
        assert_eq!(log.events_of_activity("ship").count(), 1);
    }

    #[test]
    fn test_object_snapshot_is_refreshed() {
        let mut store = ObjectStore::new();
        let object = store.create(&ObjectTypeDescriptor::new("order"), t0());
        let id = object.id;

        let mut log = EventLog::new();
        log.record_object(store.require(id).unwrap());
        store.set_status(id, ObjectStatus::Terminated).unwrap();
        log.record_object(store.require(id).unwrap());

        assert_eq!(log.objects().count(), 1);
        assert_eq!(log.object(id).map(|o| o.status), Some(ObjectStatus::Terminated));
    }

    #[test]
    fn test_initial_stock_filter() {
        let mut log = EventLog::new();
        log.record_quantity_operation(QuantityRecord {
            event: None,
            collection_point: "stock".into(),
            time: t0(),
            operation: ItemCounter::from([("A", 5)]),
        });
        log.record_quantity_operation(QuantityRecord {
            event: Some(EventId::new(0)),
            collection_point: "stock".into(),
            time: t0(),
            operation: ItemCounter::from([("A", -2)]),
        });
        assert_eq!(log.initial_stock().count(), 1);
        assert_eq!(log.quantity_operations().len(), 2);
    }
}
