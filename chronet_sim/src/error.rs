//! Error types for networks, the magic network and run configuration.

use chronet_env::{EntityError, EntityKey, UnitError};
use thiserror::Error;

/// Errors from running or reinitialising a [`Network`](crate::Network).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// An entity failed during its update
    #[error(transparent)]
    Entity(#[from] EntityError),

    /// The entity is already borrowed, e.g. a network member touched by
    /// its own update
    #[error("Entity {key} is already borrowed")]
    EntityBusy { key: EntityKey },
}

/// Errors from the automatically tracked network and the global entry points.
#[derive(Debug, Error)]
pub enum MagicError {
    /// Direct membership edits on the magic network
    #[error("Cannot directly modify MagicNetwork")]
    Protected,

    /// The default context is in use further up the stack
    #[error("Default magic context is already in use (run/reinit called from inside a run?)")]
    Busy,

    /// A time argument failed validation
    #[error(transparent)]
    Unit(#[from] UnitError),

    /// The underlying network failed
    #[error(transparent)]
    Network(#[from] NetworkError),
}

impl MagicError {
    /// Returns true for the protected-container misuse error.
    pub fn is_protected(&self) -> bool {
        matches!(self, Self::Protected)
    }
}

/// Errors loading a [`RunConfig`](crate::RunConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}
