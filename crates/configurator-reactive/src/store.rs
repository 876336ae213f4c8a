//! The consumer-facing configuration store.
//!
//! A [`ConfigurationStore`] owns one session lifecycle, the reactive graph
//! fed from it, and the background tasks that keep both in step:
//!
//! - the pump, forwarding lifecycle status into the subscription bridge and
//!   the lifecycle cell
//! - the readiness tracker
//! - the attribute family janitor
//! - the watcher subscription sweeper
//!
//! Everything callers read goes through an [`Accessor`], which offers the
//! non-suspending, guarded and suspending flavors of one cell.

use crate::attribute::{
    AttributeFamilies, AttributeMember, AttributeVariant, AttributeView, BooleanAttributeView,
    ChoiceAttributeView, ComponentAttributeView, NumericAttributeView,
};
use crate::bridge::SubscriptionBridge;
use crate::commands::{
    DecisionQueries, ExplainCommands, MakeDecisionCommands, ReinitializationCommands, ResetCommands,
    Satisfaction, StoringCommands, TaskSchedulingCommands,
};
use crate::derived::Derived;
use crate::graph::{ConfigurationInitialization, DecisionList, ReactiveGraph};
use crate::janitor::spawn_family_janitor;
use crate::readiness::{ReadinessTracker, spawn_readiness};
use crate::subscriptions::{SubscriptionRegistry, WatchSubscription, spawn_sweeper};
use crate::suspend::{MaybePending, Suspended};
use configurator_core::attribute::{
    Attribute, AttributeKey, BooleanAttribute, ChoiceAttribute, ComponentAttribute,
    GlobalAttributeId, NumericAttribute,
};
use configurator_core::config::RuntimeConfig;
use configurator_core::configuration::{Configuration, StoredConfiguration};
use configurator_core::context::SessionContext;
use configurator_core::decision::DecisionFilter;
use configurator_core::session::{ClientHandle, same_optional_handle};
use configurator_core::{ConfiguratorError, Guarded, Result};
use configurator_session::{Pending, SessionInitialization, SessionLifecycle, SessionUpdating};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const NULL_CLIENT_WARNING: &str = "The configurator client is null. \
     This will dispose the session that may exist. \
     If this was not intended, make sure you pass a valid client.";

const NULL_CONTEXT_WARNING: &str = "The session context is null. \
     This will dispose the session that may exist. \
     If this was not intended, make sure you pass valid session context data.";

/// One readable cell of the store.
pub struct Accessor<T> {
    name: String,
    source: Derived<T>,
    suspended: Suspended<T>,
    subscriptions: Arc<SubscriptionRegistry>,
}

impl<T> Clone for Accessor<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            source: self.source.clone(),
            suspended: self.suspended.clone(),
            subscriptions: self.subscriptions.clone(),
        }
    }
}

impl<T> Accessor<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn new(
        name: impl Into<String>,
        source: Derived<T>,
        subscriptions: &Arc<SubscriptionRegistry>,
    ) -> Self {
        Self {
            name: name.into(),
            suspended: Suspended::new(source.clone()),
            source,
            subscriptions: subscriptions.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value, or `NotInitialized` before the configuration is ready.
    pub fn get(&self) -> Result<T> {
        Ok(self.source.get()?)
    }

    pub fn guarded(&self) -> Guarded<T> {
        self.source.read()
    }

    /// The value or the pending future to wait on. Reads while
    /// uninitialized all return the same future.
    pub fn suspend(&self) -> MaybePending<T> {
        self.suspended.read()
    }

    /// Waits until the value is available.
    pub async fn wait(&self) -> Result<T> {
        self.suspended.wait().await.map_err(|_| ConfiguratorError::Shutdown)
    }

    pub fn subscribe(&self) -> WatchSubscription<T> {
        self.subscriptions.watch(&self.name, &self.source)
    }

    pub fn derived(&self) -> &Derived<T> {
        &self.source
    }
}

/// Accessor over a family member, sharing the member's suspension state.
fn member_accessor<A: AttributeVariant>(
    id: &GlobalAttributeId,
    member: AttributeMember<A>,
    subscriptions: &Arc<SubscriptionRegistry>,
) -> Accessor<Option<AttributeView<A>>> {
    Accessor {
        name: format!("attribute:{}", id.key()),
        source: member.view().clone(),
        suspended: member.suspended().clone(),
        subscriptions: subscriptions.clone(),
    }
}

/// Which attributes [`ConfigurationStore::attributes`] returns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeSelection {
    /// Every attribute of the current snapshot, in key order.
    All,
    /// The given attributes, in request order.
    Keys(Vec<GlobalAttributeId>),
}

pub type AttributeList = Vec<Option<Arc<Attribute>>>;

#[derive(Default)]
struct Inputs {
    client: Option<Option<ClientHandle>>,
    context: Option<Option<SessionContext>>,
}

struct Accessors {
    configuration: Accessor<Arc<Configuration>>,
    decisions_all: Accessor<DecisionList>,
    decisions_explicit: Accessor<DecisionList>,
    decisions_implicit: Accessor<DecisionList>,
    stored_configuration: Accessor<StoredConfiguration>,
    satisfaction: Accessor<Satisfaction>,
    storing: Accessor<StoringCommands>,
    reset: Accessor<ResetCommands>,
    reinitialization: Accessor<ReinitializationCommands>,
    task_scheduling: Accessor<TaskSchedulingCommands>,
    make_decision: Accessor<MakeDecisionCommands>,
    decision_queries: Accessor<DecisionQueries>,
    explain: Accessor<ExplainCommands>,
}

impl Accessors {
    fn new(graph: &ReactiveGraph, subscriptions: &Arc<SubscriptionRegistry>) -> Self {
        let s = graph.selectors();
        Self {
            configuration: Accessor::new("configuration", s.configuration.clone(), subscriptions),
            decisions_all: Accessor::new("decisions", s.decisions.all.clone(), subscriptions),
            decisions_explicit: Accessor::new(
                "decisions:explicit",
                s.decisions.explicit.clone(),
                subscriptions,
            ),
            decisions_implicit: Accessor::new(
                "decisions:implicit",
                s.decisions.implicit.clone(),
                subscriptions,
            ),
            stored_configuration: Accessor::new(
                "stored_configuration",
                s.stored_configuration.clone(),
                subscriptions,
            ),
            satisfaction: Accessor::new("satisfaction", s.satisfaction.clone(), subscriptions),
            storing: Accessor::new("storing", s.storing.clone(), subscriptions),
            reset: Accessor::new("reset", s.reset.clone(), subscriptions),
            reinitialization: Accessor::new(
                "reinitialization",
                s.reinitialization.clone(),
                subscriptions,
            ),
            task_scheduling: Accessor::new(
                "task_scheduling",
                s.task_scheduling.clone(),
                subscriptions,
            ),
            make_decision: Accessor::new("make_decision", s.make_decision.clone(), subscriptions),
            decision_queries: Accessor::new(
                "decision_queries",
                s.decision_queries.clone(),
                subscriptions,
            ),
            explain: Accessor::new("explain", s.explain.clone(), subscriptions),
        }
    }
}

/// Binds one configuration session to the reactive graph.
///
/// Must be created inside a tokio runtime.
pub struct ConfigurationStore {
    lifecycle: SessionLifecycle,
    graph: ReactiveGraph,
    bridge: Arc<SubscriptionBridge>,
    families: Arc<AttributeFamilies>,
    subscriptions: Arc<SubscriptionRegistry>,
    readiness: Arc<ReadinessTracker>,
    accessors: Accessors,
    inputs: Mutex<Inputs>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl ConfigurationStore {
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        tokio::runtime::Handle::try_current()
            .map_err(|e| {
                ConfiguratorError::internal(format!(
                    "ConfigurationStore needs a tokio runtime: {}",
                    e
                ))
            })?;

        let lifecycle = SessionLifecycle::spawn();
        let graph = ReactiveGraph::new();
        let bridge = Arc::new(SubscriptionBridge::new(graph.cells().clone()));
        let families = Arc::new(AttributeFamilies::new());
        let subscriptions = SubscriptionRegistry::new();
        let readiness = Arc::new(ReadinessTracker::new());
        let accessors = Accessors::new(&graph, &subscriptions);

        let tasks = vec![
            spawn_pump(&lifecycle, &graph, bridge.clone()),
            spawn_readiness(readiness.clone(), graph.selectors().initialization.clone()),
            spawn_family_janitor(
                families.clone(),
                graph.cells().clone(),
                config.store.family_cleanup_delay(),
            ),
            spawn_sweeper(
                Arc::downgrade(&subscriptions),
                config.store.subscription_sweep_interval(),
            ),
        ];
        info!("[ConfigurationStore] Started");

        Ok(Self {
            lifecycle,
            graph,
            bridge,
            families,
            subscriptions,
            readiness,
            accessors,
            inputs: Mutex::new(Inputs::default()),
            tasks: Mutex::new(tasks),
            shut_down: AtomicBool::new(false),
        })
    }

    /// A store with default settings.
    pub fn with_defaults() -> Result<Self> {
        Self::new(RuntimeConfig::default())
    }

    // ============================================================================
    // Inputs
    // ============================================================================

    /// Sets the client sessions are created with. Clients compare by
    /// identity; passing the current client again does nothing.
    pub fn set_client(&self, client: Option<ClientHandle>) {
        {
            let mut inputs = self.inputs.lock();
            if let Some(current) = &inputs.client {
                if same_optional_handle(current.as_ref(), client.as_ref()) {
                    return;
                }
            }
            inputs.client = Some(client.clone());
        }
        if client.is_none() {
            warn!("[ConfigurationStore] {}", NULL_CLIENT_WARNING);
        }
        self.lifecycle.set_client(client);
    }

    /// Sets the desired session parameters. Parameters compare
    /// structurally; an equal value does nothing.
    pub fn set_session_context(&self, context: Option<SessionContext>) {
        {
            let mut inputs = self.inputs.lock();
            if inputs.context.as_ref() == Some(&context) {
                return;
            }
            inputs.context = Some(context.clone());
        }
        if context.is_none() {
            warn!("[ConfigurationStore] {}", NULL_CONTEXT_WARNING);
        }
        self.lifecycle.set_session_context(context);
    }

    /// Retries a failed session creation or update.
    pub fn retry(&self) {
        self.lifecycle.retry();
    }

    // ============================================================================
    // Status
    // ============================================================================

    pub fn session_initialization(&self) -> SessionInitialization {
        self.lifecycle.status().initialization
    }

    pub fn session_updating(&self) -> SessionUpdating {
        self.lifecycle.status().updating
    }

    /// Whether the configuration is usable yet.
    pub fn initialization(&self) -> ConfigurationInitialization {
        self.graph
            .selectors()
            .initialization
            .read()
            .into_option()
            .unwrap_or_default()
    }

    /// The ready capsule: the pending wait, or `None` when ready.
    pub fn ready_signal(&self) -> Option<Pending<()>> {
        self.readiness.pending()
    }

    /// Waits until the configuration is usable.
    pub async fn ready(&self) -> Result<()> {
        match self.readiness.pending() {
            Some(pending) => pending.await.map_err(|_| ConfiguratorError::Shutdown),
            None => Ok(()),
        }
    }

    // ============================================================================
    // Accessors
    // ============================================================================

    pub fn configuration(&self) -> Accessor<Arc<Configuration>> {
        self.accessors.configuration.clone()
    }

    pub fn decisions(&self, filter: DecisionFilter) -> Accessor<DecisionList> {
        match filter {
            DecisionFilter::All => self.accessors.decisions_all.clone(),
            DecisionFilter::Explicit => self.accessors.decisions_explicit.clone(),
            DecisionFilter::Implicit => self.accessors.decisions_implicit.clone(),
        }
    }

    /// The last stored configuration. Uninitialized until the session
    /// stores one.
    pub fn stored_configuration(&self) -> Accessor<StoredConfiguration> {
        self.accessors.stored_configuration.clone()
    }

    /// Attributes of the current snapshot. With `filter_missing`, requested
    /// keys that are absent are left out instead of showing up as `None`.
    ///
    /// Every call builds a fresh accessor; keep it around to reuse its memo.
    pub fn attributes(
        &self,
        selection: AttributeSelection,
        filter_missing: bool,
    ) -> Accessor<AttributeList> {
        let keys: Option<Vec<AttributeKey>> = match &selection {
            AttributeSelection::All => None,
            AttributeSelection::Keys(ids) => Some(ids.iter().map(GlobalAttributeId::key).collect()),
        };

        let registry = self.graph.selectors().attributes.clone();
        let revision = registry.revision().clone();
        let source = Derived::with_guard(&revision, move || {
            let registry = registry.get()?;
            let list: AttributeList = match &keys {
                None => registry.attributes().into_iter().map(Some).collect(),
                Some(keys) => keys
                    .iter()
                    .map(|key| registry.get(key).map(|entry| entry.attribute))
                    .filter(|entry| !filter_missing || entry.is_some())
                    .collect(),
            };
            Ok(Some(list))
        });
        Accessor::new("attributes", source, &self.subscriptions)
    }

    pub fn choice_attribute(
        &self,
        id: &GlobalAttributeId,
    ) -> Accessor<Option<ChoiceAttributeView>> {
        self.attribute::<ChoiceAttribute>(id)
    }

    pub fn numeric_attribute(
        &self,
        id: &GlobalAttributeId,
    ) -> Accessor<Option<NumericAttributeView>> {
        self.attribute::<NumericAttribute>(id)
    }

    pub fn boolean_attribute(
        &self,
        id: &GlobalAttributeId,
    ) -> Accessor<Option<BooleanAttributeView>> {
        self.attribute::<BooleanAttribute>(id)
    }

    pub fn component_attribute(
        &self,
        id: &GlobalAttributeId,
    ) -> Accessor<Option<ComponentAttributeView>> {
        self.attribute::<ComponentAttribute>(id)
    }

    fn attribute<A: AttributeVariant>(
        &self,
        id: &GlobalAttributeId,
    ) -> Accessor<Option<AttributeView<A>>> {
        let member = self.families.member::<A>(self.graph.selectors(), id);
        member_accessor(id, member, &self.subscriptions)
    }

    pub fn satisfaction(&self) -> Accessor<Satisfaction> {
        self.accessors.satisfaction.clone()
    }

    pub fn storing(&self) -> Accessor<StoringCommands> {
        self.accessors.storing.clone()
    }

    pub fn reset(&self) -> Accessor<ResetCommands> {
        self.accessors.reset.clone()
    }

    pub fn reinitialization(&self) -> Accessor<ReinitializationCommands> {
        self.accessors.reinitialization.clone()
    }

    pub fn task_scheduling(&self) -> Accessor<TaskSchedulingCommands> {
        self.accessors.task_scheduling.clone()
    }

    pub fn make_decision(&self) -> Accessor<MakeDecisionCommands> {
        self.accessors.make_decision.clone()
    }

    pub fn decision_queries(&self) -> Accessor<DecisionQueries> {
        self.accessors.decision_queries.clone()
    }

    pub fn explain(&self) -> Accessor<ExplainCommands> {
        self.accessors.explain.clone()
    }

    /// Raw handle to the underlying cells.
    pub fn graph(&self) -> &ReactiveGraph {
        &self.graph
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionRegistry> {
        &self.subscriptions
    }

    /// Cached attribute family members across all variants.
    pub fn attribute_member_count(&self) -> usize {
        self.families.len()
    }

    // ============================================================================
    // Teardown
    // ============================================================================

    /// Closes the session and stops background work. Only the first call
    /// does anything.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("[ConfigurationStore] Shutting down");

        self.lifecycle.shutdown().await;
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.bridge.session_changed(None);
        self.graph.cells().lifecycle.set(self.lifecycle.status());
        info!("[ConfigurationStore] Shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl Drop for ConfigurationStore {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

/// Forwards every lifecycle status to the bridge, then to the lifecycle
/// cell, so session cells are in place before the status says so.
fn spawn_pump(
    lifecycle: &SessionLifecycle,
    graph: &ReactiveGraph,
    bridge: Arc<SubscriptionBridge>,
) -> JoinHandle<()> {
    let mut status = lifecycle.subscribe();
    let cells = graph.cells().clone();
    tokio::spawn(async move {
        loop {
            let current = status.borrow_and_update().clone();
            bridge.session_changed(current.session.clone());
            cells.lifecycle.set(current);
            if status.changed().await.is_err() {
                debug!("[ConfigurationStore] Lifecycle status closed");
                return;
            }
        }
    })
}
