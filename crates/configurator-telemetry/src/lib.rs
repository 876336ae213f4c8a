//! Logging for the configurator crates.
//!
//! # Module Structure
//!
//! - `init`: global subscriber setup from [`LoggingSettings`]
//! - `layer`: a tracing layer that forwards events into a channel
//!
//! [`LoggingSettings`]: configurator_core::config::LoggingSettings

mod init;
mod layer;

pub use init::init_tracing;
pub use layer::{DiagnosticEvent, DiagnosticEventLayer, capture};
