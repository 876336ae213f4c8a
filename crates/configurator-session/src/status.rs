//! Lifecycle status values published to consumers.
//!
//! Errors are data here. A failed create or update shows up as an
//! [`ErrorWithRetry`] on the matching status value and never as an `Err`.

use crate::machine::{LifecycleError, LifecycleEvent, LifecycleState, SessionLifecycleMachine};
use configurator_core::FailureResult;
use configurator_core::session::SessionHandle;
use std::fmt;
use tokio::sync::mpsc;

/// Sends `Retry` to the lifecycle that produced an error.
///
/// Holds a weak sender, so an outstanding handle never keeps a torn-down
/// lifecycle alive.
#[derive(Clone)]
pub struct RetryHandle {
    events: mpsc::WeakUnboundedSender<LifecycleEvent>,
}

impl RetryHandle {
    pub(crate) fn new(events: &mpsc::UnboundedSender<LifecycleEvent>) -> Self {
        Self {
            events: events.downgrade(),
        }
    }

    pub fn retry(&self) {
        if let Some(events) = self.events.upgrade() {
            let _ = events.send(LifecycleEvent::Retry);
        }
    }
}

/// A lifecycle error together with the means to retry it.
#[derive(Clone)]
pub struct ErrorWithRetry {
    error: LifecycleError,
    retry: RetryHandle,
}

impl ErrorWithRetry {
    pub fn error(&self) -> &LifecycleError {
        &self.error
    }

    pub fn failure(&self) -> &FailureResult {
        self.error.failure()
    }

    pub fn retry(&self) {
        self.retry.retry();
    }
}

impl PartialEq for ErrorWithRetry {
    fn eq(&self, other: &Self) -> bool {
        self.error.failure() == other.error.failure()
            && self.error.context() == other.error.context()
    }
}

impl fmt::Debug for ErrorWithRetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorWithRetry").field("error", &self.error).finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionInitialization {
    pub is_initializing: bool,
    pub error: Option<ErrorWithRetry>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionUpdating {
    pub is_updating: bool,
    pub error: Option<ErrorWithRetry>,
}

/// Snapshot of the lifecycle after every transition.
#[derive(Clone)]
pub struct LifecycleStatus {
    pub state: LifecycleState,
    pub session: Option<SessionHandle>,
    pub initialization: SessionInitialization,
    pub updating: SessionUpdating,
}

impl Default for LifecycleStatus {
    fn default() -> Self {
        Self {
            state: LifecycleState::Idle,
            session: None,
            initialization: SessionInitialization::default(),
            updating: SessionUpdating::default(),
        }
    }
}

impl LifecycleStatus {
    /// Initializing means processing without a session; updating means
    /// processing with one. An error is reported on whichever side the
    /// current session state belongs to. A session being disposed is no
    /// longer published.
    pub(crate) fn from_machine(machine: &SessionLifecycleMachine, retry: &RetryHandle) -> Self {
        let session = match machine.state() {
            LifecycleState::DisposingSession => None,
            _ => machine.session().cloned(),
        };
        let has_session = session.is_some();
        let processing = machine.is_processing();
        let error = machine.error().map(|error| ErrorWithRetry {
            error: error.clone(),
            retry: retry.clone(),
        });

        Self {
            state: machine.state(),
            initialization: SessionInitialization {
                is_initializing: !has_session && processing,
                error: if has_session { None } else { error.clone() },
            },
            updating: SessionUpdating {
                is_updating: has_session && processing,
                error: if has_session { error } else { None },
            },
            session,
        }
    }
}

impl fmt::Debug for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleStatus")
            .field("state", &self.state)
            .field("has_session", &self.session.is_some())
            .field("initialization", &self.initialization)
            .field("updating", &self.updating)
            .finish()
    }
}
