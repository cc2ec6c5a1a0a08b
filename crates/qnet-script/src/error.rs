//! Error types for qnet-script

use thiserror::Error;

/// Model loading error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Duplicate definition: {0}")]
    DuplicateDefinition(String),

    #[error(transparent)]
    Core(#[from] qnet_core::Error),

    #[error(transparent)]
    Sim(#[from] qnet_sim::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
