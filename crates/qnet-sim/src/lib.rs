//! Qnet Sim - discrete-event simulation of quantity nets
//!
//! This crate drives a [`qnet_core::QuantityNet`] through time:
//! - A time-ordered execution queue of instructions (`ExecutionQueue`)
//! - Activities with pluggable behaviour, and the events they produce
//! - Recurring and trigger-driven object creation
//! - Seeded randomness for durations, arrivals and binding selection
//! - An in-memory event log of events, objects and quantity operations
//!
//! ## Example
//!
//! ```rust
//! use qnet_sim::{DurationSpec, Simulation, SimulationConfig, StopReason};
//! use qnet_core::QuantityNet;
//!
//! let net = QuantityNet::from_arcs(&[("p1", "t1"), ("t1", "p2")]).unwrap();
//! let config = SimulationConfig::new().with_default_duration(DurationSpec::Fixed { minutes: 5.0 });
//! let mut sim = Simulation::new(net, config).unwrap();
//! sim.add_initial_objects(&Default::default(), 2).unwrap();
//!
//! assert_eq!(sim.run().unwrap(), StopReason::Idle);
//! assert_eq!(sim.model().terminated_objects(), 2);
//! ```

pub mod activity;
mod config;
mod error;
mod event;
mod instruction;
mod log;
mod model;
mod queue;
mod rng;
mod simulation;
pub mod trigger;

pub use activity::{Activity, ActivityBehavior, ActivityDescriptor, ActivityRegistry, DefaultBehavior, EventContext};
pub use config::{default_start_time, DurationSpec, Limits, SimulationConfig, DURATION_TRIES};
pub use error::{Error, Result};
pub use event::Event;
pub use instruction::{Action, EventEnd, EventStart, Instruction, ObjectCreation, Schedule, ScheduleKind};
pub use log::{EventLog, ObjectChange, QuantityRecord};
pub use model::SimulationModel;
pub use queue::{ExecutionQueue, QueueItem};
pub use rng::{SimRng, DEFAULT_SEED};
pub use simulation::{Simulation, StepResult, StopReason};
pub use trigger::{Trigger, TriggeredCreation};
