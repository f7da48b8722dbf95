//! Error types for model construction and simulation.

use pm_core::CoreError;
use thiserror::Error;

/// Errors encountered while building, configuring or simulating a model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// Model key sets or parameter shape are unusable.
    #[error("Schema error: {what}")]
    Schema { what: String },

    /// Caller-supplied simulation arguments failed validation.
    #[error("Invalid input: {what}")]
    InvalidInput { what: String },

    /// Model factory arguments are inconsistent.
    #[error("Invalid model construction: {what}")]
    Construction { what: &'static str },

    /// Noise or other model configuration is unsupported.
    #[error("Configuration error: {what}")]
    Config { what: String },

    /// A value crossing the model contract broke a key-set or numeric invariant.
    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    pub(crate) fn schema(what: impl Into<String>) -> Self {
        SimError::Schema { what: what.into() }
    }

    pub(crate) fn input(what: impl Into<String>) -> Self {
        SimError::InvalidInput { what: what.into() }
    }

    pub(crate) fn config(what: impl Into<String>) -> Self {
        SimError::Config { what: what.into() }
    }
}
