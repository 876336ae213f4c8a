//! Domain model and collaborator contracts for interactive configuration
//! sessions.

pub mod attribute;
pub mod config;
pub mod configuration;
pub mod context;
pub mod decision;
pub mod error;
pub mod explain;
pub mod failure;
pub mod guard;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export common types
pub use error::{ConfiguratorError, Result};
pub use failure::{FailureResult, FailureType};
pub use guard::{Guarded, Uninitialized};
