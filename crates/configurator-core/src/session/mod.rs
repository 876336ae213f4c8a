//! Session collaborator contracts.
//!
//! # Module Structure
//!
//! - `contract`: `ConfiguratorClient` and `ConfigurationSession` capability traits
//! - `subscription`: listener subscriptions and the RAII `SubscriptionGuard`

mod contract;
mod subscription;

pub use contract::{
    ClientHandle, ConfigurationSession, ConfiguratorClient, EngineResult, Listener, SessionHandle,
    same_handle, same_optional_handle,
};
pub use subscription::{Subscription, SubscriptionGuard};
