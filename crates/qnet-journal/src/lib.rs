//! Qnet Journal - Export and auditing of simulated event logs
//!
//! This crate works on the `EventLog` recorded by `qnet-sim`:
//!
//! - **Exporter**: Write events, objects and quantity operations as RON, JSON, CSV or text
//! - **Auditor**: Query events and summarise a run (activities, objects, stock movements)
//!
//! # Example
//!
//! ```rust
//! use qnet_core::QuantityNet;
//! use qnet_journal::{Auditor, ExportFormat, Exporter};
//! use qnet_sim::{Simulation, SimulationConfig};
//!
//! let net = QuantityNet::from_arcs(&[("p1", "t1"), ("t1", "p2")]).unwrap();
//! let mut sim = Simulation::new(net, SimulationConfig::new()).unwrap();
//! sim.add_initial_objects(&Default::default(), 3).unwrap();
//! sim.run().unwrap();
//!
//! let report = Auditor::new(sim.log()).generate_report();
//! println!("{}", report);
//!
//! let csv = Exporter::new(sim.log()).export(ExportFormat::Csv).unwrap();
//! assert!(csv.starts_with("event_id,"));
//! ```

mod auditor;
mod error;
mod exporter;

pub use auditor::{Auditor, LogQuery, LogReport, ObjectTrace};
pub use error::{Error, Result};
pub use exporter::{ExportFormat, Exporter};

// Re-export the log types for convenience
pub use qnet_sim::{Event, EventLog, ObjectChange, QuantityRecord};

#[cfg(test)]
mod tests_support;
