//! Error types for the Chronet environment abstraction.

use crate::units::Dimension;
use thiserror::Error;

/// Errors raised while validating physical quantities.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    /// The quantity does not carry the expected dimensions
    #[error("{name} must have dimensions of {expected}, got {found}")]
    DimensionMismatch {
        name: String,
        expected: Dimension,
        found: Dimension,
    },

    /// NaN or infinite value
    #[error("{name} must be finite, got {value}")]
    NonFinite { name: String, value: f64 },

    /// Negative value where only durations make sense
    #[error("{name} must not be negative, got {value}")]
    Negative { name: String, value: f64 },
}

impl UnitError {
    /// Returns the name of the offending parameter.
    pub fn parameter(&self) -> &str {
        match self {
            Self::DimensionMismatch { name, .. }
            | Self::NonFinite { name, .. }
            | Self::Negative { name, .. } => name,
        }
    }
}

/// Errors reported by an entity while it is being stepped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityError {
    /// The entity's update failed
    #[error("Entity '{entity}' failed to update: {reason}")]
    UpdateFailed { entity: String, reason: String },
}

impl EntityError {
    /// Creates an update failure for the named entity.
    pub fn update_failed(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UpdateFailed {
            entity: entity.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Clock step is zero, negative or not finite
    #[error("Invalid clock dt: {0} s")]
    InvalidDt(f64),

    /// Quantity validation failed
    #[error(transparent)]
    Unit(#[from] UnitError),

    /// Entity update failed
    #[error(transparent)]
    Entity(#[from] EntityError),
}
