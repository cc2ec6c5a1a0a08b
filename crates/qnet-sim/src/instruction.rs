//! Instructions: relative, not yet scheduled work for the execution queue

use crate::config::minutes_to_duration;
use crate::rng::SimRng;
use chrono::Duration;
use indexmap::IndexMap;
use qnet_core::{BindingFunction, EventId, ExecutionId, ItemCounter, ObjectId, ObjectStatus, ObjectType, ValueMap};
use serde::{Deserialize, Serialize};

/// How a recurring object creation computes its next occurrence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Schedule {
    /// Fixed interval in hours
    Fixed { hours: f64 },
    /// Expected arrivals per day (Poisson distributed)
    ArrivalRate { per_day: f64 },
}

/// Variant of a [`Schedule`], without its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduleKind {
    Fixed,
    ArrivalRate,
}

impl Schedule {
    pub fn kind(&self) -> ScheduleKind {
        match self {
            Schedule::Fixed { .. } => ScheduleKind::Fixed,
            Schedule::ArrivalRate { .. } => ScheduleKind::ArrivalRate,
        }
    }

    /// Delay until the next occurrence, never shorter than one millisecond
    ///
    /// An arrival rate draws n ~ Poisson(per_day) and spreads the day over
    /// n arrivals; a draw of zero waits a whole day.
    pub fn next_delay(&self, rng: &mut SimRng) -> Duration {
        let delay = match *self {
            Schedule::Fixed { hours } => minutes_to_duration(hours * 60.0),
            Schedule::ArrivalRate { per_day } => match rng.poisson(per_day) {
                0 => Duration::days(1),
                n => Duration::milliseconds(86_400_000 / n as i64),
            },
        };
        delay.max(Duration::milliseconds(1))
    }
}

/// Request to create one object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectCreation {
    pub object_type: ObjectType,
    /// Overrides of the type's default attributes
    pub attributes: ValueMap,
    pub quantities: ItemCounter,
    /// Target places; empty means the initial places of the type
    pub places: Vec<String>,
    /// The object joins the binding of the event that requested it
    pub add_to_binding: bool,
    pub o2o: IndexMap<ObjectId, String>,
    /// Recurring source this creation belongs to
    pub schedule: Option<Schedule>,
}

impl ObjectCreation {
    pub fn new(object_type: impl Into<ObjectType>) -> Self {
        Self {
            object_type: object_type.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<qnet_core::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_quantities(mut self, quantities: ItemCounter) -> Self {
        self.quantities = quantities;
        self
    }

    pub fn with_places<S: Into<String>>(mut self, places: impl IntoIterator<Item = S>) -> Self {
        self.places = places.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_relation(mut self, other: ObjectId, qualifier: impl Into<String>) -> Self {
        self.o2o.insert(other, qualifier.into());
        self
    }

    pub fn for_binding(mut self) -> Self {
        self.add_to_binding = true;
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = Some(schedule);
        self
    }
}

/// Request to start an activity with an input binding
#[derive(Debug, Clone, PartialEq)]
pub struct EventStart {
    /// Transition name or label
    pub transition: String,
    pub binding: BindingFunction,
    /// Fixed duration; drawn from the configuration when absent
    pub duration: Option<Duration>,
}

/// Request to end a running event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventEnd {
    pub event: EventId,
    pub execution: ExecutionId,
}

/// What an instruction does when it becomes due
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    CreateObject(ObjectCreation),
    ExecuteEvent(EventStart),
    TerminateEvent(EventEnd),
    UpdateStatus { object: ObjectId, status: ObjectStatus },
    UpdateAttributes { object: ObjectId, attributes: ValueMap },
    UpdateQuantities { object: ObjectId, quantities: ItemCounter },
}

impl Action {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Action::CreateObject(_) => "create_object",
            Action::ExecuteEvent(_) => "execute_event",
            Action::TerminateEvent(_) => "terminate_event",
            Action::UpdateStatus { .. } => "update_status",
            Action::UpdateAttributes { .. } => "update_attributes",
            Action::UpdateQuantities { .. } => "update_quantities",
        }
    }
}

/// An action with a delay relative to the time it is scheduled at
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub delay: Duration,
    pub action: Action,
}

impl Instruction {
    pub fn new(delay: Duration, action: Action) -> Self {
        Self { delay, action }
    }

    /// Instruction due at the time it is scheduled
    pub fn now(action: Action) -> Self {
        Self::new(Duration::zero(), action)
    }

    pub fn create_object(delay: Duration, creation: ObjectCreation) -> Self {
        Self::new(delay, Action::CreateObject(creation))
    }

    pub fn execute_event(delay: Duration, transition: impl Into<String>, binding: BindingFunction) -> Self {
        Self::new(
            delay,
            Action::ExecuteEvent(EventStart {
                transition: transition.into(),
                binding,
                duration: None,
            }),
        )
    }

    pub fn update_status(delay: Duration, object: ObjectId, status: ObjectStatus) -> Self {
        Self::new(delay, Action::UpdateStatus { object, status })
    }

    pub fn update_attributes(delay: Duration, object: ObjectId, attributes: ValueMap) -> Self {
        Self::new(delay, Action::UpdateAttributes { object, attributes })
    }

    pub fn update_quantities(delay: Duration, object: ObjectId, quantities: ItemCounter) -> Self {
        Self::new(delay, Action::UpdateQuantities { object, quantities })
    }

    pub fn is_immediate(&self) -> bool {
        self.delay == Duration::zero()
    }
}
