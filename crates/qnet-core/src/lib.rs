//! Qnet Core - object-centric quantity nets
//!
//! This crate provides the execution semantics of quantity nets:
//! - Object places holding typed object tokens, collection points holding item counters
//! - Object arcs and quantity arcs (qarcs) between places and transitions
//! - Guards, including the built-in small-stock guard
//! - Binding enumeration under per-type cardinalities, with pluggable selection
//! - Quantity calculators (qalculators) turning firings into counter deltas
//! - The two-phase (start/end) firing protocol
//! - The `QuantityNet` aggregate used to build and drive a net
//!
//! ## Example
//!
//! ```rust
//! use qnet_core::{BindingFunction, ObjectStatus, ObjectStore, ObjectTypeDescriptor, QuantityNet};
//! use indexmap::IndexMap;
//!
//! let mut net = QuantityNet::from_arcs(&[("p1", "t1"), ("t1", "p2")]).unwrap();
//! let types: IndexMap<String, qnet_core::ObjectType> =
//!     [("p1".to_string(), "order".into()), ("p2".to_string(), "order".into())].into_iter().collect();
//! net.set_place_types(&types).unwrap();
//!
//! let mut objects = ObjectStore::new();
//! let now = chrono::NaiveDate::from_ymd_opt(2019, 10, 12).unwrap().and_hms_opt(12, 21, 0).unwrap();
//! let order = objects.create(&ObjectTypeDescriptor::new("order"), now);
//! order.status = ObjectStatus::Active;
//! let id = order.id;
//!
//! let assignment: IndexMap<String, Vec<_>> = [("p1".to_string(), vec![id])].into_iter().collect();
//! net.add_objects_to_places(&objects, &assignment).unwrap();
//!
//! let binding = BindingFunction::new().with("order", [id]);
//! let execution = net.start_firing_transition("t1", binding, &objects).unwrap();
//! net.end_firing_transition(&execution).unwrap();
//! assert!(net.get_locations_of_object(id).contains("p2"));
//! ```

mod arc;
mod binding;
mod counter;
mod error;
mod guard;
mod identity;
mod net;
mod object;
mod place;
pub mod qalculator;
pub mod selection;
mod transition;
mod value;

pub use arc::{Arc, ArcId, ArcKind, Endpoint};
pub use binding::{BindingContext, BindingFunction, BindingSpecification, Cardinality};
pub use counter::{CollectionCounter, ItemCounter, ItemType};
pub use error::{Error, Result};
pub use guard::{Guard, ObjectGuard, QuantityGuard, SmallStockGuard};
pub use identity::{EventId, ExecutionId, IdGenerator, ObjectId, ObjectType};
pub use net::{Execution, Marking, NodeKind, NodeRef, QuantityNet};
pub use object::{Object, ObjectStatus, ObjectStore, ObjectTypeDescriptor, ObjectTypeRegistry};
pub use place::{CollectionPoint, ObjectMultiset, ObjectPlace, Place, PlaceKind};
pub use qalculator::{DefaultQalculator, Qalculator};
pub use selection::BindingSelection;
pub use transition::{Connections, Transition, TransitionExecution};
pub use value::{Value, ValueMap};
