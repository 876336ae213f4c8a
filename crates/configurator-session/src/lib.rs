//! Session lifecycle for configuration sessions.
//!
//! # Module Structure
//!
//! - `deferred`: one-shot futures with stable identity and the readiness signal
//! - `machine`: the pure lifecycle state machine
//! - `lifecycle`: the tokio task driving the machine against real collaborators
//! - `status`: status values published after every transition

pub mod deferred;
mod lifecycle;
pub mod machine;
mod status;

pub use deferred::{Abandoned, Deferred, DeferredSignal, Pending};
pub use lifecycle::SessionLifecycle;
pub use machine::{
    LifecycleError, LifecycleEvent, LifecycleState, ProcessingKind, SessionLifecycleMachine,
};
pub use status::{
    ErrorWithRetry, LifecycleStatus, RetryHandle, SessionInitialization, SessionUpdating,
};
