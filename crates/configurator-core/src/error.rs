//! Error types for the configurator bindings.

use crate::failure::FailureResult;
use crate::guard::Uninitialized;
use thiserror::Error;

/// A shared error type for every configurator crate.
///
/// Lifecycle failures are not represented here: they are published as data
/// through the lifecycle status values and never cross the store boundary
/// as an `Err`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfiguratorError {
    /// A non-suspending accessor was read before the configuration was ready.
    #[error("Configuration is not initialized. Gate the call on readiness or suspend instead.")]
    NotInitialized,

    /// The configuration engine rejected or failed an operation.
    #[error("Configurator failure: {0}")]
    Failure(FailureResult),

    /// An explain answer shape discriminator that is not one of
    /// `decisions`, `constraints` or `full`.
    #[error("Unknown explain answer shape: '{0}'")]
    UnknownAnswerShape(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The store or lifecycle has been shut down.
    #[error("The configuration store has been shut down")]
    Shutdown,

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConfiguratorError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Creates an UnknownAnswerShape error
    pub fn unknown_answer_shape(shape: impl Into<String>) -> Self {
        Self::UnknownAnswerShape(shape.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotInitialized error
    pub fn is_not_initialized(&self) -> bool {
        matches!(self, Self::NotInitialized)
    }

    /// Check if this error was reported by the configuration engine
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Returns the engine failure, if any
    pub fn failure(&self) -> Option<&FailureResult> {
        match self {
            Self::Failure(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<FailureResult> for ConfiguratorError {
    fn from(failure: FailureResult) -> Self {
        Self::Failure(failure)
    }
}

impl From<Uninitialized> for ConfiguratorError {
    fn from(_: Uninitialized) -> Self {
        Self::NotInitialized
    }
}

impl From<toml::de::Error> for ConfiguratorError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for ConfiguratorError {
    fn from(err: std::io::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// A type alias for `Result<T, ConfiguratorError>`.
pub type Result<T> = std::result::Result<T, ConfiguratorError>;
