//! Error types for qnet-sim

use qnet_core::{EventId, ObjectType};
use thiserror::Error;

/// Simulation error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] qnet_core::Error),

    #[error("Unknown activity: {0}")]
    UnknownActivity(String),

    #[error("Unknown object type: {0}")]
    UnknownObjectType(ObjectType),

    #[error("Unknown event: {0}")]
    UnknownEvent(EventId),

    #[error("Event {event} ended with a different set of objects than it started with")]
    EventObjectMismatch { event: EventId },

    #[error("No non-negative duration for activity {activity} after {tries} draws")]
    InvalidDuration { activity: String, tries: u32 },

    #[error("Object type {0} already has a pending recurring creation")]
    DuplicateRecurringSource(ObjectType),

    #[error("Instruction scheduled before the current time ({0})")]
    ScheduledInPast(chrono::NaiveDateTime),

    #[error("Invalid object creation for activity {activity}: {reason}")]
    InvalidCreation { activity: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
