//! Events: logged executions of activities

use crate::{Error, Result};
use chrono::{Duration, NaiveDateTime};
use qnet_core::{BindingFunction, CollectionCounter, EventId, ObjectId, ValueMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One execution of an activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub activity: String,
    pub transition: String,
    pub timestamp: NaiveDateTime,
    pub end_timestamp: Option<NaiveDateTime>,
    /// Planned duration in milliseconds
    pub duration_ms: i64,
    /// Objects of the binding (event-to-object relations)
    pub objects: BTreeSet<ObjectId>,
    pub quantity_operations: CollectionCounter,
    pub attributes: ValueMap,
    pub loggable: bool,
}

impl Event {
    pub fn new(id: EventId, activity: impl Into<String>, transition: impl Into<String>, timestamp: NaiveDateTime) -> Self {
        Self {
            id,
            activity: activity.into(),
            transition: transition.into(),
            timestamp,
            end_timestamp: None,
            duration_ms: 0,
            objects: BTreeSet::new(),
            quantity_operations: CollectionCounter::new(),
            attributes: ValueMap::new(),
            loggable: true,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::milliseconds(self.duration_ms)
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_ms = duration.num_milliseconds();
    }

    pub fn is_finished(&self) -> bool {
        self.end_timestamp.is_some()
    }

    /// Record the objects of the starting binding
    pub fn start(&mut self, binding: &BindingFunction, quantity_operations: CollectionCounter) {
        self.objects = binding.objects();
        self.quantity_operations = quantity_operations;
    }

    /// Close the event; the binding must contain exactly the starting objects
    pub fn end(&mut self, binding: &BindingFunction, time: NaiveDateTime) -> Result<()> {
        if binding.objects() != self.objects {
            return Err(Error::EventObjectMismatch { event: self.id });
        }
        self.end_timestamp = Some(time);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 10, 12)
            .and_then(|d| d.and_hms_opt(12, 21, 0))
            .unwrap()
    }

    #[test]
    fn test_duration_round_trip() {
        let mut event = Event::new(EventId::new(0), "place order", "t1", t0());
        event.set_duration(Duration::minutes(12) + Duration::seconds(30));
        assert_eq!(event.duration(), Duration::milliseconds(750_000));
    }

    #[test]
    fn test_end_requires_same_objects() {
        let mut event = Event::new(EventId::new(3), "ship", "t2", t0());
        let binding = BindingFunction::new().with("order", [ObjectId::new(1), ObjectId::new(2)]);
        event.start(&binding, CollectionCounter::new());

        let other = BindingFunction::new().with("order", [ObjectId::new(1)]);
        assert_eq!(
            event.end(&other, t0()),
            Err(Error::EventObjectMismatch { event: EventId::new(3) })
        );
        assert!(!event.is_finished());

        event.end(&binding, t0() + Duration::minutes(5)).unwrap();
        assert_eq!(event.end_timestamp, Some(t0() + Duration::minutes(5)));
    }
}
