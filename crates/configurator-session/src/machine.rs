//! The session lifecycle state machine.
//!
//! This is the pure half of the lifecycle: it records the desired client
//! and session context, decides what to do next and folds the outcome of
//! each collaborator call back into its context. It never awaits anything.
//! [`crate::SessionLifecycle`] drives it against the real collaborators.

use configurator_core::FailureResult;
use configurator_core::context::SessionContext;
use configurator_core::session::{ClientHandle, SessionHandle, same_handle, same_optional_handle};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingKind {
    Create,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Idle,
    Processing(ProcessingKind),
    DisposingSession,
    Shutdown,
}

/// A failed create or update, with the inputs that produced it.
#[derive(Clone)]
pub enum LifecycleError {
    SessionCreation {
        failure: FailureResult,
        client: ClientHandle,
        context: SessionContext,
    },
    SessionUpdate {
        failure: FailureResult,
        context: SessionContext,
    },
}

impl LifecycleError {
    pub fn failure(&self) -> &FailureResult {
        match self {
            Self::SessionCreation { failure, .. } | Self::SessionUpdate { failure, .. } => failure,
        }
    }

    pub fn context(&self) -> &SessionContext {
        match self {
            Self::SessionCreation { context, .. } | Self::SessionUpdate { context, .. } => context,
        }
    }
}

impl fmt::Debug for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionCreation { failure, context, .. } => f
                .debug_struct("SessionCreation")
                .field("failure", failure)
                .field("context", context)
                .finish_non_exhaustive(),
            Self::SessionUpdate { failure, context } => f
                .debug_struct("SessionUpdate")
                .field("failure", failure)
                .field("context", context)
                .finish(),
        }
    }
}

/// The live session together with the client that created it.
#[derive(Clone)]
pub struct ActiveSession {
    pub session: SessionHandle,
    pub client: ClientHandle,
}

/// What the driver has to do next.
pub enum LifecycleAction {
    /// Nothing to do until the next event.
    Wait,
    Create {
        client: ClientHandle,
        context: SessionContext,
    },
    Update {
        session: SessionHandle,
        context: SessionContext,
    },
    Dispose(SessionHandle),
}

impl fmt::Debug for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wait => f.write_str("Wait"),
            Self::Create { context, .. } => f
                .debug_struct("Create")
                .field("context", context)
                .finish_non_exhaustive(),
            Self::Update { context, .. } => f
                .debug_struct("Update")
                .field("context", context)
                .finish_non_exhaustive(),
            Self::Dispose(_) => f.write_str("Dispose"),
        }
    }
}

/// Inputs the machine reacts to.
pub enum LifecycleEvent {
    ClientChanged(Option<ClientHandle>),
    ParametersChanged(Option<SessionContext>),
    Retry,
    Shutdown,
}

impl fmt::Debug for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientChanged(client) => f
                .debug_tuple("ClientChanged")
                .field(&client.is_some())
                .finish(),
            Self::ParametersChanged(context) => {
                f.debug_tuple("ParametersChanged").field(context).finish()
            }
            Self::Retry => f.write_str("Retry"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

#[derive(Default)]
struct LifecycleContext {
    desired_client: Option<ClientHandle>,
    desired_context: Option<SessionContext>,
    active: Option<ActiveSession>,
    error: Option<LifecycleError>,
}

/// Pure state machine owning the decision of when to create, update or
/// dispose the single session.
pub struct SessionLifecycleMachine {
    state: LifecycleState,
    context: LifecycleContext,
}

impl Default for SessionLifecycleMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLifecycleMachine {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Idle,
            context: LifecycleContext::default(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn session(&self) -> Option<&SessionHandle> {
        self.context.active.as_ref().map(|a| &a.session)
    }

    pub fn error(&self) -> Option<&LifecycleError> {
        self.context.error.as_ref()
    }

    pub fn is_processing(&self) -> bool {
        matches!(self.state, LifecycleState::Processing(_))
    }

    pub fn is_shutdown(&self) -> bool {
        self.state == LifecycleState::Shutdown
    }

    // ============================================================================
    // Events
    // ============================================================================

    /// Records an input event. Returns the session to close when the event
    /// is `Shutdown`; every other event only updates the desired inputs and
    /// is re-evaluated by the next [`Self::next_action`].
    pub fn apply(&mut self, event: LifecycleEvent) -> Option<SessionHandle> {
        if self.is_shutdown() {
            return None;
        }
        match event {
            LifecycleEvent::ClientChanged(client) => {
                self.context.desired_client = client;
                None
            }
            LifecycleEvent::ParametersChanged(context) => {
                self.context.desired_context = context;
                None
            }
            LifecycleEvent::Retry => {
                self.context.error = None;
                None
            }
            LifecycleEvent::Shutdown => self.shutdown(),
        }
    }

    /// Tears the machine down permanently. The returned session, if any,
    /// must be closed by the caller. Later calls return `None`.
    pub fn shutdown(&mut self) -> Option<SessionHandle> {
        if self.is_shutdown() {
            return None;
        }
        self.state = LifecycleState::Shutdown;
        let context = std::mem::take(&mut self.context);
        context.active.map(|a| a.session)
    }

    // ============================================================================
    // Transitions
    // ============================================================================

    /// Decides the next step. Only acts while `Idle`; in any other state the
    /// answer is [`LifecycleAction::Wait`].
    pub fn next_action(&mut self) -> LifecycleAction {
        if self.state != LifecycleState::Idle {
            return LifecycleAction::Wait;
        }

        if let Some(session) = self.should_dispose() {
            self.state = LifecycleState::DisposingSession;
            return LifecycleAction::Dispose(session);
        }

        if !self.forgive_error() {
            return LifecycleAction::Wait;
        }

        let ctx = &self.context;
        match (&ctx.active, &ctx.desired_client, &ctx.desired_context) {
            (None, Some(client), Some(desired)) => {
                let action = LifecycleAction::Create {
                    client: client.clone(),
                    context: desired.clone(),
                };
                self.state = LifecycleState::Processing(ProcessingKind::Create);
                action
            }
            (Some(active), _, Some(desired)) if active.session.session_context() != *desired => {
                let action = LifecycleAction::Update {
                    session: active.session.clone(),
                    context: desired.clone(),
                };
                self.state = LifecycleState::Processing(ProcessingKind::Update);
                action
            }
            _ => LifecycleAction::Wait,
        }
    }

    fn should_dispose(&self) -> Option<SessionHandle> {
        let active = self.context.active.as_ref()?;
        let client_changed = !self
            .context
            .desired_client
            .as_ref()
            .is_some_and(|desired| same_handle(desired, &active.client));
        if self.context.desired_context.is_none() || client_changed {
            Some(active.session.clone())
        } else {
            None
        }
    }

    /// Clears the stored error when the inputs moved away from the ones
    /// that failed. Returns whether processing may continue.
    fn forgive_error(&mut self) -> bool {
        let ctx = &self.context;
        let forgiven = match &ctx.error {
            None => return true,
            Some(LifecycleError::SessionCreation { client, context, .. }) => {
                !same_optional_handle(ctx.desired_client.as_ref(), Some(client))
                    || ctx.desired_context.as_ref() != Some(context)
            }
            Some(LifecycleError::SessionUpdate { context, .. }) => {
                ctx.desired_context.as_ref() != Some(context)
            }
        };
        if forgiven {
            self.context.error = None;
        }
        forgiven
    }

    // ============================================================================
    // Outcomes
    // ============================================================================

    pub fn creation_succeeded(&mut self, session: SessionHandle, client: ClientHandle) {
        if self.is_shutdown() {
            return;
        }
        self.context.active = Some(ActiveSession { session, client });
        self.context.error = None;
        self.state = LifecycleState::Idle;
    }

    pub fn creation_failed(
        &mut self,
        failure: FailureResult,
        client: ClientHandle,
        context: SessionContext,
    ) {
        if self.is_shutdown() {
            return;
        }
        self.context.error = Some(LifecycleError::SessionCreation {
            failure,
            client,
            context,
        });
        self.state = LifecycleState::Idle;
    }

    pub fn update_succeeded(&mut self) {
        if self.is_shutdown() {
            return;
        }
        self.context.error = None;
        self.state = LifecycleState::Idle;
    }

    pub fn update_failed(&mut self, failure: FailureResult, context: SessionContext) {
        if self.is_shutdown() {
            return;
        }
        self.context.error = Some(LifecycleError::SessionUpdate { failure, context });
        self.state = LifecycleState::Idle;
    }

    /// The disposed session has been closed.
    pub fn session_disposed(&mut self) {
        if self.is_shutdown() {
            return;
        }
        self.context.active = None;
        self.context.error = None;
        self.state = LifecycleState::Idle;
    }
}

#[cfg(test)]
#[path = "machine_test.rs"]
mod tests;
