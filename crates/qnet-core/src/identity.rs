//! Identity types for objects, events, executions and object types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an object instance at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// Create a new object ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "o{}", self.0)
    }
}

/// Unique identifier for a logged event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl EventId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Identifier of an in-flight transition execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub u64);

impl ExecutionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Tag naming the type of an object (e.g. "order", "product")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectType(pub String);

impl ObjectType {
    /// Create a new object type tag
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the type name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ObjectType {
    fn default() -> Self {
        Self::new("default object")
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ObjectType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ObjectType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Monotonic id source owned by a store or net
///
/// Replaces process-wide counters: every simulation instance numbers its
/// own objects, events and executions from zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next raw id
    pub fn next_raw(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// The id `next_raw` would return, without taking it
    pub fn peek_raw(&self) -> u64 {
        self.next
    }

    /// Number of ids handed out so far
    pub fn issued(&self) -> u64 {
        self.next
    }

    /// Hand out ids from `next` again; ids at or above it must be unused
    pub fn rewind(&mut self, next: u64) {
        self.next = self.next.min(next);
    }
}
