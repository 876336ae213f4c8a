//! Hand-written collaborator doubles for test suites.
//!
//! `MockClient` creates `MockSession`s. Both record every call so tests can
//! assert on exact call counts and payloads. Create and update calls share a
//! `CallGauge` that tracks how many of them are in flight at once.

use crate::attribute::DecisionKind;
use crate::configuration::{
    Configuration, ConfigurationChanges, ConfigurationUpdate, StoredConfiguration,
};
use crate::context::SessionContext;
use crate::decision::{
    CollectedDecision, ExplicitDecision, MakeManyDecisionsMode, MakeManyDecisionsResult,
};
use crate::explain::{AnswerShape, ExplainAnswer, ExplainQuestion, ExplainSolution};
use crate::failure::{FailureResult, FailureType};
use crate::session::{
    ConfigurationSession, ConfiguratorClient, EngineResult, Listener, SessionHandle, Subscription,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Tracks concurrent create/update calls.
#[derive(Debug, Default)]
pub struct CallGauge {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl CallGauge {
    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// A configurator client double.
pub struct MockClient {
    gauge: Arc<CallGauge>,
    delay: Mutex<Duration>,
    failures: Mutex<VecDeque<FailureResult>>,
    initial_configuration: Mutex<Configuration>,
    create_calls: Mutex<Vec<SessionContext>>,
    sessions: Mutex<Vec<Arc<MockSession>>>,
}

impl MockClient {
    pub fn new() -> Arc<Self> {
        Self::with_configuration(Configuration::default())
    }

    pub fn with_configuration(configuration: Configuration) -> Arc<Self> {
        Arc::new(Self {
            gauge: Arc::new(CallGauge::default()),
            delay: Mutex::new(Duration::ZERO),
            failures: Mutex::new(VecDeque::new()),
            initial_configuration: Mutex::new(configuration),
            create_calls: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
        })
    }

    /// Every create and update call sleeps this long before settling.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// The next create call fails with `failure`.
    pub fn fail_next(&self, failure: FailureResult) {
        self.failures.lock().push_back(failure);
    }

    pub fn set_initial_configuration(&self, configuration: Configuration) {
        *self.initial_configuration.lock() = configuration;
    }

    pub fn create_calls(&self) -> Vec<SessionContext> {
        self.create_calls.lock().clone()
    }

    pub fn create_call_count(&self) -> usize {
        self.create_calls.lock().len()
    }

    pub fn sessions(&self) -> Vec<Arc<MockSession>> {
        self.sessions.lock().clone()
    }

    pub fn last_session(&self) -> Option<Arc<MockSession>> {
        self.sessions.lock().last().cloned()
    }

    pub fn gauge(&self) -> &CallGauge {
        &self.gauge
    }
}

#[async_trait]
impl ConfiguratorClient for MockClient {
    async fn create_session(&self, context: SessionContext) -> EngineResult<SessionHandle> {
        self.create_calls.lock().push(context.clone());
        self.gauge.enter();
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.gauge.exit();

        if let Some(failure) = self.failures.lock().pop_front() {
            return Err(failure);
        }

        let session = Arc::new(MockSession::new(
            context,
            self.initial_configuration.lock().clone(),
            self.gauge.clone(),
            delay,
        ));
        self.sessions.lock().push(session.clone());
        Ok(session)
    }
}

type Shared<T> = Arc<Listener<T>>;

#[derive(Default)]
struct MockListeners {
    configuration: Vec<(u64, Shared<ConfigurationUpdate>)>,
    can_reset: Vec<(u64, Shared<bool>)>,
    stored: Vec<(u64, Shared<StoredConfiguration>)>,
    decisions: Vec<(u64, Option<DecisionKind>, Shared<Vec<CollectedDecision>>)>,
}

impl MockListeners {
    fn remove(&mut self, id: u64) {
        self.configuration.retain(|(i, _)| *i != id);
        self.can_reset.retain(|(i, _)| *i != id);
        self.stored.retain(|(i, _)| *i != id);
        self.decisions.retain(|(i, _, _)| *i != id);
    }

    fn len(&self) -> usize {
        self.configuration.len() + self.can_reset.len() + self.stored.len() + self.decisions.len()
    }
}

struct MockSubscription {
    id: u64,
    listeners: Weak<Mutex<MockListeners>>,
}

impl Subscription for MockSubscription {
    fn unsubscribe(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().remove(self.id);
        }
    }
}

/// A configuration session double.
pub struct MockSession {
    gauge: Arc<CallGauge>,
    delay: Duration,
    context: Mutex<SessionContext>,
    configuration: Mutex<Arc<Configuration>>,
    can_reset: AtomicBool,
    decisions: Mutex<Vec<CollectedDecision>>,
    update_failures: Mutex<VecDeque<FailureResult>>,
    listeners: Arc<Mutex<MockListeners>>,
    next_listener_id: AtomicU64,
    close_calls: AtomicUsize,
    set_context_calls: Mutex<Vec<SessionContext>>,
    made_decisions: Mutex<Vec<ExplicitDecision>>,
    many_decisions: Mutex<Vec<(Vec<ExplicitDecision>, MakeManyDecisionsMode)>>,
    explain_calls: Mutex<Vec<(ExplainQuestion, AnswerShape)>>,
    commands: Mutex<Vec<&'static str>>,
}

impl MockSession {
    pub fn new(
        context: SessionContext,
        configuration: Configuration,
        gauge: Arc<CallGauge>,
        delay: Duration,
    ) -> Self {
        Self {
            gauge,
            delay,
            context: Mutex::new(context),
            configuration: Mutex::new(Arc::new(configuration)),
            can_reset: AtomicBool::new(false),
            decisions: Mutex::new(Vec::new()),
            update_failures: Mutex::new(VecDeque::new()),
            listeners: Arc::new(Mutex::new(MockListeners::default())),
            next_listener_id: AtomicU64::new(1),
            close_calls: AtomicUsize::new(0),
            set_context_calls: Mutex::new(Vec::new()),
            made_decisions: Mutex::new(Vec::new()),
            many_decisions: Mutex::new(Vec::new()),
            explain_calls: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
        }
    }

    // ============================================================================
    // Pushes
    // ============================================================================

    /// Replaces the snapshot and notifies configuration listeners.
    pub fn push_configuration(&self, configuration: Configuration, changes: ConfigurationChanges) {
        let configuration = Arc::new(configuration);
        *self.configuration.lock() = configuration.clone();
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .configuration
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(ConfigurationUpdate {
                configuration: configuration.clone(),
                changes: changes.clone(),
            });
        }
    }

    pub fn push_can_reset(&self, can_reset: bool) {
        self.can_reset.store(can_reset, Ordering::SeqCst);
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .can_reset
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(can_reset);
        }
    }

    pub fn push_decisions(&self, decisions: Vec<CollectedDecision>) {
        *self.decisions.lock() = decisions.clone();
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .decisions
            .iter()
            .map(|(_, kind, l)| (*kind, l.clone()))
            .collect();
        for (kind, listener) in listeners {
            listener(filter_decisions(&decisions, kind));
        }
    }

    fn push_stored(&self, stored: StoredConfiguration) {
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .stored
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(stored.clone());
        }
    }

    /// The next update call fails with `failure`.
    pub fn fail_next_update(&self, failure: FailureResult) {
        self.update_failures.lock().push_back(failure);
    }

    // ============================================================================
    // Recorded calls
    // ============================================================================

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn set_context_calls(&self) -> Vec<SessionContext> {
        self.set_context_calls.lock().clone()
    }

    pub fn made_decisions(&self) -> Vec<ExplicitDecision> {
        self.made_decisions.lock().clone()
    }

    pub fn many_decisions(&self) -> Vec<(Vec<ExplicitDecision>, MakeManyDecisionsMode)> {
        self.many_decisions.lock().clone()
    }

    pub fn explain_calls(&self) -> Vec<(ExplainQuestion, AnswerShape)> {
        self.explain_calls.lock().clone()
    }

    /// Names of the remaining commands, in call order.
    pub fn commands(&self) -> Vec<&'static str> {
        self.commands.lock().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn subscribe(&self, register: impl FnOnce(&mut MockListeners, u64)) -> Box<dyn Subscription> {
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        register(&mut self.listeners.lock(), id);
        Box::new(MockSubscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        })
    }
}

fn filter_decisions(
    decisions: &[CollectedDecision],
    kind: Option<DecisionKind>,
) -> Vec<CollectedDecision> {
    decisions
        .iter()
        .filter(|d| kind.is_none_or(|k| k == d.kind))
        .cloned()
        .collect()
}

#[async_trait]
impl ConfigurationSession for MockSession {
    fn session_context(&self) -> SessionContext {
        self.context.lock().clone()
    }

    async fn set_session_context(&self, context: SessionContext) -> EngineResult<()> {
        self.set_context_calls.lock().push(context.clone());
        self.gauge.enter();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.gauge.exit();

        if let Some(failure) = self.update_failures.lock().pop_front() {
            return Err(failure);
        }
        *self.context.lock() = context;
        Ok(())
    }

    async fn close(&self) -> EngineResult<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn configuration(&self) -> Arc<Configuration> {
        self.configuration.lock().clone()
    }

    fn can_reset_configuration(&self) -> bool {
        self.can_reset.load(Ordering::SeqCst)
    }

    fn decisions(&self, kind: Option<DecisionKind>) -> Vec<CollectedDecision> {
        filter_decisions(&self.decisions.lock(), kind)
    }

    fn add_configuration_changed_listener(
        &self,
        listener: Listener<ConfigurationUpdate>,
    ) -> Box<dyn Subscription> {
        self.subscribe(|l, id| l.configuration.push((id, Arc::new(listener))))
    }

    fn add_can_reset_configuration_changed_listener(
        &self,
        listener: Listener<bool>,
    ) -> Box<dyn Subscription> {
        self.subscribe(|l, id| l.can_reset.push((id, Arc::new(listener))))
    }

    fn add_stored_configuration_changed_listener(
        &self,
        listener: Listener<StoredConfiguration>,
    ) -> Box<dyn Subscription> {
        self.subscribe(|l, id| l.stored.push((id, Arc::new(listener))))
    }

    fn add_decisions_changed_listener(
        &self,
        kind: Option<DecisionKind>,
        listener: Listener<Vec<CollectedDecision>>,
    ) -> Box<dyn Subscription> {
        self.subscribe(|l, id| l.decisions.push((id, kind, Arc::new(listener))))
    }

    async fn make_decision(&self, decision: ExplicitDecision) -> EngineResult<()> {
        self.made_decisions.lock().push(decision);
        Ok(())
    }

    async fn make_many_decisions(
        &self,
        decisions: Vec<ExplicitDecision>,
        mode: MakeManyDecisionsMode,
    ) -> EngineResult<MakeManyDecisionsResult> {
        self.many_decisions.lock().push((decisions, mode));
        Ok(MakeManyDecisionsResult::default())
    }

    async fn explain(
        &self,
        question: ExplainQuestion,
        shape: AnswerShape,
    ) -> EngineResult<ExplainAnswer> {
        self.explain_calls.lock().push((question, shape));
        Ok(match shape {
            AnswerShape::Decisions => ExplainAnswer::Decisions {
                decision_explanations: Vec::new(),
            },
            AnswerShape::Constraints => ExplainAnswer::Constraints {
                constraint_explanations: Vec::new(),
            },
            AnswerShape::Full => ExplainAnswer::Full {
                decision_explanations: Vec::new(),
                constraint_explanations: Vec::new(),
            },
        })
    }

    async fn apply_solution(
        &self,
        solution: ExplainSolution,
    ) -> EngineResult<MakeManyDecisionsResult> {
        self.many_decisions.lock().push((solution.decisions, solution.mode));
        Ok(MakeManyDecisionsResult::default())
    }

    async fn store_configuration(&self) -> EngineResult<StoredConfiguration> {
        self.commands.lock().push("store_configuration");
        let stored = StoredConfiguration {
            schema_version: 1,
            decisions: filter_decisions(&self.decisions.lock(), Some(DecisionKind::Explicit))
                .into_iter()
                .map(|d| d.decision)
                .collect(),
        };
        self.push_stored(stored.clone());
        Ok(stored)
    }

    async fn restore_configuration(
        &self,
        stored: StoredConfiguration,
        mode: MakeManyDecisionsMode,
    ) -> EngineResult<MakeManyDecisionsResult> {
        self.commands.lock().push("restore_configuration");
        self.many_decisions.lock().push((stored.decisions, mode));
        Ok(MakeManyDecisionsResult::default())
    }

    async fn reset_configuration(&self) -> EngineResult<()> {
        self.commands.lock().push("reset_configuration");
        Ok(())
    }

    async fn reinitialize(&self) -> EngineResult<()> {
        self.commands.lock().push("reinitialize");
        Ok(())
    }

    async fn schedule_task(&self, cancel: Option<CancellationToken>) -> EngineResult<()> {
        self.commands.lock().push("schedule_task");
        match cancel {
            Some(token) if token.is_cancelled() => {
                Err(FailureResult::of_type(FailureType::TaskCancelled))
            }
            _ => Ok(()),
        }
    }

    async fn decisions_queued(
        &self,
        kind: Option<DecisionKind>,
    ) -> EngineResult<Vec<CollectedDecision>> {
        self.commands.lock().push("decisions_queued");
        Ok(self.decisions(kind))
    }
}
