//! Capability traits of the external configuration engine.
//!
//! The engine client and its sessions are collaborators: this crate only
//! consumes them through these traits.

use super::subscription::Subscription;
use crate::attribute::DecisionKind;
use crate::configuration::{Configuration, ConfigurationUpdate, StoredConfiguration};
use crate::context::SessionContext;
use crate::decision::{
    CollectedDecision, ExplicitDecision, MakeManyDecisionsMode, MakeManyDecisionsResult,
};
use crate::explain::{AnswerShape, ExplainAnswer, ExplainQuestion, ExplainSolution};
use crate::failure::FailureResult;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Result type of every collaborator call.
pub type EngineResult<T> = std::result::Result<T, FailureResult>;

/// A change listener registered on a session.
pub type Listener<T> = Box<dyn Fn(T) + Send + Sync>;

/// Shared handle to a live session. Compared by identity.
pub type SessionHandle = Arc<dyn ConfigurationSession>;

/// Shared handle to an engine client. Compared by identity.
pub type ClientHandle = Arc<dyn ConfiguratorClient>;

/// Identity comparison of two shared handles, ignoring vtables.
pub fn same_handle<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Identity comparison of two optional shared handles.
pub fn same_optional_handle<T: ?Sized>(a: Option<&Arc<T>>, b: Option<&Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => same_handle(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// An engine client able to open configuration sessions.
#[async_trait]
pub trait ConfiguratorClient: Send + Sync {
    /// Opens a new session for the given parameters.
    ///
    /// # Errors
    ///
    /// Returns the engine's `FailureResult` when the session cannot be created.
    async fn create_session(&self, context: SessionContext) -> EngineResult<SessionHandle>;
}

/// A live configuration session.
///
/// Only the session lifecycle may call [`ConfigurationSession::close`].
/// Every other component reads state and issues commands.
#[async_trait]
pub trait ConfigurationSession: Send + Sync {
    /// The parameters the session currently runs with.
    fn session_context(&self) -> SessionContext;

    /// Updates the session in place to new parameters.
    async fn set_session_context(&self, context: SessionContext) -> EngineResult<()>;

    /// Closes the session. Called exactly once per session.
    async fn close(&self) -> EngineResult<()>;

    /// The current configuration snapshot.
    fn configuration(&self) -> Arc<Configuration>;

    /// Whether the configuration currently holds anything to reset.
    fn can_reset_configuration(&self) -> bool;

    /// The decisions currently held, optionally filtered by kind.
    fn decisions(&self, kind: Option<DecisionKind>) -> Vec<CollectedDecision>;

    fn add_configuration_changed_listener(
        &self,
        listener: Listener<ConfigurationUpdate>,
    ) -> Box<dyn Subscription>;

    fn add_can_reset_configuration_changed_listener(
        &self,
        listener: Listener<bool>,
    ) -> Box<dyn Subscription>;

    fn add_stored_configuration_changed_listener(
        &self,
        listener: Listener<StoredConfiguration>,
    ) -> Box<dyn Subscription>;

    fn add_decisions_changed_listener(
        &self,
        kind: Option<DecisionKind>,
        listener: Listener<Vec<CollectedDecision>>,
    ) -> Box<dyn Subscription>;

    async fn make_decision(&self, decision: ExplicitDecision) -> EngineResult<()>;

    async fn make_many_decisions(
        &self,
        decisions: Vec<ExplicitDecision>,
        mode: MakeManyDecisionsMode,
    ) -> EngineResult<MakeManyDecisionsResult>;

    async fn explain(
        &self,
        question: ExplainQuestion,
        shape: AnswerShape,
    ) -> EngineResult<ExplainAnswer>;

    async fn apply_solution(
        &self,
        solution: ExplainSolution,
    ) -> EngineResult<MakeManyDecisionsResult>;

    async fn store_configuration(&self) -> EngineResult<StoredConfiguration>;

    async fn restore_configuration(
        &self,
        stored: StoredConfiguration,
        mode: MakeManyDecisionsMode,
    ) -> EngineResult<MakeManyDecisionsResult>;

    async fn reset_configuration(&self) -> EngineResult<()>;

    async fn reinitialize(&self) -> EngineResult<()>;

    /// Schedules a task on the session's queue; cancelling the token
    /// withdraws it while it has not started.
    async fn schedule_task(&self, cancel: Option<CancellationToken>) -> EngineResult<()>;

    /// Like [`ConfigurationSession::decisions`], but queued behind pending work.
    async fn decisions_queued(
        &self,
        kind: Option<DecisionKind>,
    ) -> EngineResult<Vec<CollectedDecision>>;
}
