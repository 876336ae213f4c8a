//! Async driver of the session lifecycle.
//!
//! One tokio task owns the [`SessionLifecycleMachine`] and the only
//! references allowed to create, update or close a session. Events arrive
//! over an unbounded channel; status leaves over a watch channel.
//!
//! At most one create or update call is in flight. Events that arrive
//! while a call is outstanding are recorded on the machine and evaluated
//! once the call settles.

use crate::machine::{LifecycleAction, LifecycleEvent, SessionLifecycleMachine};
use crate::status::{LifecycleStatus, RetryHandle};
use configurator_core::context::SessionContext;
use configurator_core::session::{ClientHandle, SessionHandle};
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Handle to a running session lifecycle.
///
/// Dropping the handle closes the event channel, which shuts the
/// lifecycle down and closes its session.
pub struct SessionLifecycle {
    events: mpsc::UnboundedSender<LifecycleEvent>,
    status: watch::Receiver<LifecycleStatus>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionLifecycle {
    /// Starts the lifecycle task on the current tokio runtime.
    pub fn spawn() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(LifecycleStatus::default());
        let driver = LifecycleDriver {
            machine: SessionLifecycleMachine::new(),
            retry: RetryHandle::new(&events_tx),
            events: events_rx,
            status: status_tx,
        };
        let task = tokio::spawn(driver.run());

        Self {
            events: events_tx,
            status: status_rx,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn set_client(&self, client: Option<ClientHandle>) {
        self.send(LifecycleEvent::ClientChanged(client));
    }

    pub fn set_session_context(&self, context: Option<SessionContext>) {
        self.send(LifecycleEvent::ParametersChanged(context));
    }

    pub fn retry(&self) {
        self.send(LifecycleEvent::Retry);
    }

    /// The most recently published status.
    pub fn status(&self) -> LifecycleStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleStatus> {
        self.status.clone()
    }

    /// Shuts the lifecycle down and waits for the session to be closed.
    ///
    /// Only the first call does any work.
    pub async fn shutdown(&self) {
        self.send(LifecycleEvent::Shutdown);
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!("[SessionLifecycle] Lifecycle task ended abnormally: {}", e);
            }
        }
    }

    fn send(&self, event: LifecycleEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("[SessionLifecycle] Event ignored, lifecycle already shut down");
        }
    }
}

enum Settled<T> {
    Done(T),
    /// Shutdown arrived first; the call is handed back unfinished.
    Interrupted(BoxFuture<'static, T>),
}

struct LifecycleDriver {
    machine: SessionLifecycleMachine,
    retry: RetryHandle,
    events: mpsc::UnboundedReceiver<LifecycleEvent>,
    status: watch::Sender<LifecycleStatus>,
}

impl LifecycleDriver {
    async fn run(mut self) {
        tracing::debug!("[SessionLifecycle] Started");
        loop {
            let action = self.machine.next_action();
            self.publish();

            match action {
                LifecycleAction::Wait => {
                    let event = self.events.recv().await.unwrap_or(LifecycleEvent::Shutdown);
                    tracing::debug!("[SessionLifecycle] Event: {:?}", event);
                    if let Some(session) = self.machine.apply(event) {
                        close_quietly(&session).await;
                    }
                }
                LifecycleAction::Dispose(session) => {
                    tracing::debug!("[SessionLifecycle] Disposing session");
                    close_quietly(&session).await;
                    self.machine.session_disposed();
                }
                LifecycleAction::Create { client, context } => {
                    tracing::debug!("[SessionLifecycle] Creating session");
                    let call = {
                        let client = client.clone();
                        let context = context.clone();
                        async move { client.create_session(context).await }.boxed()
                    };
                    match self.settle(call).await {
                        Settled::Done(Ok(session)) => {
                            tracing::info!("[SessionLifecycle] Session created");
                            self.machine.creation_succeeded(session, client);
                        }
                        Settled::Done(Err(failure)) => {
                            tracing::warn!(
                                "[SessionLifecycle] Session creation failed: {}",
                                failure
                            );
                            self.machine.creation_failed(failure, client, context);
                        }
                        Settled::Interrupted(call) => {
                            // The session may still come into existence; nobody else will close it.
                            tokio::spawn(async move {
                                if let Ok(orphan) = call.await {
                                    tracing::debug!(
                                        "[SessionLifecycle] Closing session created during shutdown"
                                    );
                                    close_quietly(&orphan).await;
                                }
                            });
                        }
                    }
                }
                LifecycleAction::Update { session, context } => {
                    tracing::debug!("[SessionLifecycle] Updating session context");
                    let call = {
                        let context = context.clone();
                        async move { session.set_session_context(context).await }.boxed()
                    };
                    match self.settle(call).await {
                        Settled::Done(Ok(())) => {
                            tracing::debug!("[SessionLifecycle] Session context updated");
                            self.machine.update_succeeded();
                        }
                        Settled::Done(Err(failure)) => {
                            tracing::warn!("[SessionLifecycle] Session update failed: {}", failure);
                            self.machine.update_failed(failure, context);
                        }
                        Settled::Interrupted(_) => {}
                    }
                }
            }

            if self.machine.is_shutdown() {
                self.publish();
                tracing::debug!("[SessionLifecycle] Shut down");
                return;
            }
        }
    }

    /// Awaits an in-flight call while recording incoming events.
    async fn settle<T>(&mut self, mut call: BoxFuture<'static, T>) -> Settled<T> {
        loop {
            tokio::select! {
                biased;
                output = &mut call => return Settled::Done(output),
                event = self.events.recv() => {
                    let event = event.unwrap_or(LifecycleEvent::Shutdown);
                    tracing::debug!("[SessionLifecycle] Event while processing: {:?}", event);
                    let shutting_down = matches!(event, LifecycleEvent::Shutdown);
                    if let Some(session) = self.machine.apply(event) {
                        close_quietly(&session).await;
                    }
                    if shutting_down {
                        return Settled::Interrupted(call);
                    }
                }
            }
        }
    }

    fn publish(&self) {
        self.status
            .send_replace(LifecycleStatus::from_machine(&self.machine, &self.retry));
    }
}

/// Close failures have no recovery; they are logged and dropped.
async fn close_quietly(session: &SessionHandle) {
    if let Err(failure) = session.close().await {
        tracing::warn!("[SessionLifecycle] Closing session failed: {}", failure);
    }
}

#[cfg(test)]
#[path = "lifecycle_test.rs"]
mod tests;
