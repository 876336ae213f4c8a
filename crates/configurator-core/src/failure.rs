//! Failure values reported by the configuration engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};

/// Classification of a configuration engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum FailureType {
    ConfigurationModelNotFound,
    ConfigurationModelInvalid,
    ConfigurationUnauthenticated,
    ConfigurationConflict,
    ConfigurationRejectedDecisionsConflict,
    ConfigurationSolutionNotAvailable,
    SessionNotFound,
    ConnectionError,
    ServerError,
    TaskCancelled,
    Unknown,
}

/// The failure value every collaborator call rejects with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureResult {
    #[serde(rename = "type")]
    pub failure_type: FailureType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FailureResult {
    pub fn new(failure_type: FailureType, message: impl Into<String>) -> Self {
        Self {
            failure_type,
            message: Some(message.into()),
        }
    }

    pub fn of_type(failure_type: FailureType) -> Self {
        Self {
            failure_type,
            message: None,
        }
    }
}

impl fmt::Display for FailureResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.failure_type, message),
            None => write!(f, "{}", self.failure_type),
        }
    }
}

impl std::error::Error for FailureResult {}
