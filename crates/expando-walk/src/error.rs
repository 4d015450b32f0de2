//! Error types for the graph walkers
//!
//! Structural limits (depth, cycles) and absorbed conversion mismatches are
//! never errors; only a missing root or a broken graph surfaces here.

use expando_model::{ConfigError, GraphError};

/// Walker error type
#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    /// The operation requires a root object
    #[error("root object is absent")]
    MissingRoot,

    /// Graph access failed
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
