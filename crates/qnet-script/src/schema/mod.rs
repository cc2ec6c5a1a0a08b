//! Schema definitions for RON model files

pub mod model;
pub mod net;

pub use model::ModelDef;
pub use net::{NetDef, SmallStockDef};
