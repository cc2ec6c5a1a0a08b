//! Arcs connecting places and transitions

use crate::{Error, Place, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of an arc within its net
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArcId(pub usize);

impl ArcId {
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ArcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "arc:{}", self.0)
    }
}

/// One end of an arc
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    Place(String),
    Transition(String),
}

impl Endpoint {
    pub fn name(&self) -> &str {
        match self {
            Endpoint::Place(n) | Endpoint::Transition(n) => n,
        }
    }
}

/// Object arcs move tokens; quantity arcs (qarcs) grant access to a collection point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArcKind {
    Object,
    Quantity,
}

/// A directed arc between exactly one place and one transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arc {
    pub id: ArcId,
    pub kind: ArcKind,
    pub source: Endpoint,
    pub target: Endpoint,
    /// Explicitly marked as variable; see `QuantityNet::arc_is_variable`
    pub variable: bool,
}

impl Arc {
    /// Build an arc, validating the endpoints against the connected place
    pub fn new(id: ArcId, kind: ArcKind, source: Endpoint, target: Endpoint, place: &Place) -> Result<Self> {
        let place_name = match (&source, &target) {
            (Endpoint::Place(p), Endpoint::Transition(_)) | (Endpoint::Transition(_), Endpoint::Place(p)) => p,
            (Endpoint::Place(a), Endpoint::Place(b)) => {
                return Err(Error::InvalidArc(format!("{a} -> {b} connects two places")))
            }
            (Endpoint::Transition(a), Endpoint::Transition(b)) => {
                return Err(Error::InvalidArc(format!("{a} -> {b} connects two transitions")))
            }
        };
        if place_name != &place.name {
            return Err(Error::InvalidArc(format!(
                "arc endpoint {} does not match place {}",
                place_name, place.name
            )));
        }
        match (kind, place.is_collection_point()) {
            (ArcKind::Object, true) => Err(Error::InvalidArc(format!(
                "object arc cannot connect collection point {place_name}"
            ))),
            (ArcKind::Quantity, false) => Err(Error::InvalidArc(format!(
                "quantity arc requires a collection point, {place_name} is an object place"
            ))),
            _ => Ok(Self {
                id,
                kind,
                source,
                target,
                variable: false,
            }),
        }
    }

    pub fn place(&self) -> &str {
        match (&self.source, &self.target) {
            (Endpoint::Place(p), _) | (_, Endpoint::Place(p)) => p,
            _ => "",
        }
    }

    pub fn transition(&self) -> &str {
        match (&self.source, &self.target) {
            (Endpoint::Transition(t), _) | (_, Endpoint::Transition(t)) => t,
            _ => "",
        }
    }

    /// True for place -> transition arcs
    pub fn is_input(&self) -> bool {
        matches!(self.source, Endpoint::Place(_))
    }
}

impl fmt::Display for Arc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source.name(), self.target.name())
    }
}
