//! Qnet Script - RON loader and schema definitions
//!
//! Loads simulation models from RON files:
//! - Net structure, labels, binding specifications and small-stock guards
//! - Initial stock and initial objects
//! - Object type and activity descriptors
//! - The simulation configuration

mod error;
mod loader;
mod schema;

pub use error::{Error, Result};
pub use loader::Loader;
pub use schema::{ModelDef, NetDef, SmallStockDef};
