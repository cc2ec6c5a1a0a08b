//! Error types for qnet-core

use crate::{ExecutionId, ObjectId, ObjectType};
use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Type error in place {place}: expected {expected}, got {got}")]
    TypeMismatch {
        place: String,
        expected: ObjectType,
        got: ObjectType,
    },

    #[error("Token {object} is not in place {place}")]
    TokenNotInPlace { place: String, object: ObjectId },

    #[error("Collection point {0} only accepts quantity updates")]
    DiscreteTokenOnCollectionPoint(String),

    #[error("Invalid arc: {0}")]
    InvalidArc(String),

    #[error("Invalid node name: {0} (expected a 't', 'p' or 'c' prefix)")]
    InvalidNodeName(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Ambiguous node identifier: {0}")]
    AmbiguousNode(String),

    #[error("{0} is not an object place")]
    NotAnObjectPlace(String),

    #[error("{0} is not a collection point")]
    NotACollectionPoint(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("Binding of transition {transition} has no entry for object type {object_type}")]
    MissingObjectType {
        transition: String,
        object_type: ObjectType,
    },

    #[error("Transition {0} is not enabled for the given binding")]
    NotEnabled(String),

    #[error("Execution {execution} is not in flight (transition {transition})")]
    UnknownExecution {
        transition: String,
        execution: ExecutionId,
    },

    #[error("Invalid binding specification for {transition}: {reason}")]
    InvalidBindingSpecification { transition: String, reason: String },

    #[error("Transition {transition} already has a {kind} guard")]
    GuardAlreadySet { transition: String, kind: &'static str },

    #[error("Invalid guard for {transition}: {reason}")]
    InvalidGuard { transition: String, reason: String },

    #[error("Transition {transition} is not connected to collection point {collection_point}")]
    UnconnectedCollectionPoint {
        transition: String,
        collection_point: String,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
