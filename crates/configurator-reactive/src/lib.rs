//! Reactive projection of a configuration session.
//!
//! # Module Structure
//!
//! - `cell`, `derived`: primitive cells and guarded derived cells
//! - `graph`: the cells and selectors of one store
//! - `bridge`: session push notifications into cells
//! - `suspend`: suspending reads over guarded cells
//! - `attribute`, `family`, `registry`: per-attribute projection
//! - `commands`: command surfaces bound to a session
//! - `subscriptions`: watcher subscriptions on named cells
//! - `store`: the consumer-facing `ConfigurationStore`

pub mod attribute;
pub mod bridge;
pub mod cell;
pub mod commands;
pub mod derived;
pub mod family;
pub mod graph;
mod janitor;
pub mod readiness;
pub mod registry;
pub mod store;
pub mod subscriptions;
pub mod suspend;

pub use attribute::{
    AttributeFamilies, AttributeMember, AttributeVariant, AttributeView, BooleanAttributeView,
    ChoiceAttributeView, ComponentAttributeView, NumericAttributeView,
};
pub use cell::{Cell, Revision};
pub use commands::{
    DecisionQueries, ExplainCommands, MakeDecisionCommands, ReinitializationCommands, ResetCommands,
    Satisfaction, StoringCommands, TaskSchedulingCommands,
};
pub use derived::Derived;
pub use graph::{ConfigurationInitialization, GraphCells, ReactiveGraph, Selectors};
pub use store::{Accessor, AttributeList, AttributeSelection, ConfigurationStore};
pub use subscriptions::{SubscriptionRegistry, WatchSubscription};
pub use suspend::{MaybePending, Suspended};
