//! Host boundary errors

use expando_model::{ConfigError, GraphError};
use expando_walk::WalkError;

/// Errors raised at the host boundary
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The host refused a binding
    #[error("binding '{name}' rejected: {reason}")]
    Binding { name: String, reason: String },

    /// Script evaluation failed inside the host
    #[error("script failed: {0}")]
    Script(String),

    /// Nothing is bound under this name
    #[error("no value bound as '{0}'")]
    Unbound(String),

    /// The type has no parameterless constructor or is abstract
    #[error("type {0} cannot be instantiated")]
    NotInstantiable(String),

    /// A graph walk failed
    #[error("walk error: {0}")]
    Walk(#[from] WalkError),

    /// Graph access failed
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Session configuration was rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
