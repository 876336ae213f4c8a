//! Bridge from session push notifications into graph cells.
//!
//! On every session change the bridge drops the previous session's
//! listeners before anything else happens. Listeners additionally carry the
//! generation they were registered under and ignore pushes once it is
//! superseded, so a notification already in flight from an old session
//! never lands.

use crate::graph::GraphCells;
use crate::registry::AttributeRegistry;
use configurator_core::attribute::DecisionKind;
use configurator_core::configuration::ConfigurationUpdate;
use configurator_core::decision::{CollectedDecision, DecisionFilter};
use configurator_core::session::{SessionHandle, SubscriptionGuard, same_optional_handle};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

#[derive(Default)]
struct BridgeState {
    session: Option<SessionHandle>,
    subscriptions: Vec<SubscriptionGuard>,
}

pub struct SubscriptionBridge {
    cells: Arc<GraphCells>,
    state: Mutex<BridgeState>,
    generation: Arc<AtomicU64>,
}

/// Captured by every listener of one generation.
#[derive(Clone)]
struct ListenerScope {
    cells: Weak<GraphCells>,
    generation: Arc<AtomicU64>,
    registered: u64,
}

impl ListenerScope {
    fn cells(&self) -> Option<Arc<GraphCells>> {
        if self.generation.load(Ordering::SeqCst) != self.registered {
            debug!("[SubscriptionBridge] Dropped push from superseded session");
            return None;
        }
        self.cells.upgrade()
    }
}

impl SubscriptionBridge {
    pub fn new(cells: Arc<GraphCells>) -> Self {
        Self {
            cells,
            state: Mutex::new(BridgeState::default()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Rebinds the graph to `session`. Same session (by identity) is a no-op.
    pub fn session_changed(&self, session: Option<SessionHandle>) {
        let mut state = self.state.lock();
        if same_optional_handle(state.session.as_ref(), session.as_ref()) {
            return;
        }

        let released = state.subscriptions.len();
        state.subscriptions.clear();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        state.session = session.clone();

        match session {
            None => {
                debug!("[SubscriptionBridge] Session cleared, released {} listeners", released);
                self.cells.reset_session_state();
            }
            Some(session) => {
                debug!(
                    "[SubscriptionBridge] Binding session (generation {}), released {} listeners",
                    generation, released
                );
                self.populate(&session);
                state.subscriptions = self.subscribe(&session, generation);
                self.cells.session.set(Some(session));
            }
        }
    }

    /// Number of session listeners currently held.
    pub fn active_subscriptions(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    fn populate(&self, session: &SessionHandle) {
        let cells = &self.cells;
        let configuration = session.configuration();

        cells.attributes.set(Some(Arc::new(AttributeRegistry::from_configuration(
            &cells.revision,
            &configuration,
        ))));
        cells.is_satisfied.set(Some(configuration.is_satisfied));
        cells.configuration.set(Some(configuration));
        cells.can_reset.set(Some(session.can_reset_configuration()));
        for filter in [DecisionFilter::All, DecisionFilter::Explicit, DecisionFilter::Implicit] {
            cells.decisions.cell(filter).set(Some(Arc::new(session.decisions(filter.kind()))));
        }
        cells.stored_configuration.set(None);
    }

    fn subscribe(&self, session: &SessionHandle, registered: u64) -> Vec<SubscriptionGuard> {
        let scope = ListenerScope {
            cells: Arc::downgrade(&self.cells),
            generation: self.generation.clone(),
            registered,
        };
        let mut subscriptions = Vec::with_capacity(6);

        let on_configuration = scope.clone();
        subscriptions.push(SubscriptionGuard::new(
            session.add_configuration_changed_listener(Box::new(
                move |update: ConfigurationUpdate| {
                    if let Some(cells) = on_configuration.cells() {
                        apply_configuration_update(&cells, update);
                    }
                },
            )),
        ));

        let on_can_reset = scope.clone();
        subscriptions.push(SubscriptionGuard::new(
            session.add_can_reset_configuration_changed_listener(Box::new(move |can_reset| {
                if let Some(cells) = on_can_reset.cells() {
                    cells.can_reset.set_if_changed(Some(can_reset));
                }
            })),
        ));

        let on_stored = scope.clone();
        subscriptions.push(SubscriptionGuard::new(
            session.add_stored_configuration_changed_listener(Box::new(move |stored| {
                if let Some(cells) = on_stored.cells() {
                    cells.stored_configuration.set(Some(stored));
                }
            })),
        ));

        for kind in [None, Some(DecisionKind::Explicit), Some(DecisionKind::Implicit)] {
            let on_decisions = scope.clone();
            subscriptions.push(SubscriptionGuard::new(session.add_decisions_changed_listener(
                kind,
                Box::new(move |decisions: Vec<CollectedDecision>| {
                    if let Some(cells) = on_decisions.cells() {
                        cells.decisions.cell(filter_of(kind)).set(Some(Arc::new(decisions)));
                    }
                }),
            )));
        }

        subscriptions
    }
}

impl Drop for SubscriptionBridge {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state.get_mut().subscriptions.clear();
    }
}

fn filter_of(kind: Option<DecisionKind>) -> DecisionFilter {
    match kind {
        None => DecisionFilter::All,
        Some(DecisionKind::Explicit) => DecisionFilter::Explicit,
        Some(DecisionKind::Implicit) => DecisionFilter::Implicit,
    }
}

fn apply_configuration_update(cells: &GraphCells, update: ConfigurationUpdate) {
    if let Some(registry) = cells.attributes.get() {
        registry.apply(&update.changes.attributes);
    }
    cells.is_satisfied.set_if_changed(Some(update.configuration.is_satisfied));
    cells.configuration.set(Some(update.configuration));
}

#[cfg(test)]
mod tests {
    use super::*;
    use configurator_core::attribute::{Attribute, BooleanAttribute, GlobalAttributeId};
    use configurator_core::configuration::{AttributeChanges, Configuration, ConfigurationChanges};
    use configurator_core::context::SessionContext;
    use configurator_core::testing::{CallGauge, MockSession};
    use std::time::Duration;

    fn boolean(id: &str) -> Attribute {
        Attribute::Boolean(BooleanAttribute {
            id: GlobalAttributeId::new(id),
            is_satisfied: true,
            can_contribute_to_configuration_satisfaction: false,
            decision: None,
            possible_decision_states: vec![true, false],
        })
    }

    fn mock_session(configuration: Configuration) -> Arc<MockSession> {
        Arc::new(MockSession::new(
            SessionContext::channel("dep", "release"),
            configuration,
            Arc::new(CallGauge::default()),
            Duration::ZERO,
        ))
    }

    fn bridge() -> (Arc<GraphCells>, SubscriptionBridge) {
        let cells = Arc::new(GraphCells::new());
        (cells.clone(), SubscriptionBridge::new(cells))
    }

    #[test]
    fn test_binding_populates_cells() {
        let (cells, bridge) = bridge();
        let session = mock_session(Configuration::from_attributes(false, [boolean("A")]));

        bridge.session_changed(Some(session.clone()));

        assert!(cells.session.get().is_some());
        assert_eq!(cells.is_satisfied.get(), Some(false));
        assert_eq!(cells.can_reset.get(), Some(false));
        assert!(cells.attributes.get().unwrap().contains(&GlobalAttributeId::new("A").key()));
        assert_eq!(cells.decisions.all.get().map(|d| d.len()), Some(0));
        assert_eq!(cells.stored_configuration.get(), None);
        assert_eq!(session.listener_count(), 6);
    }

    #[test]
    fn test_pushes_update_cells() {
        let (cells, bridge) = bridge();
        let session = mock_session(Configuration::from_attributes(true, [boolean("A")]));
        bridge.session_changed(Some(session.clone()));

        session.push_configuration(
            Configuration::from_attributes(false, [boolean("B")]),
            ConfigurationChanges {
                is_satisfied: Some(false),
                attributes: AttributeChanges {
                    added: vec![boolean("B")],
                    changed: Vec::new(),
                    removed: vec![GlobalAttributeId::new("A")],
                },
            },
        );
        session.push_can_reset(true);

        let registry = cells.attributes.get().unwrap();
        assert!(!registry.contains(&GlobalAttributeId::new("A").key()));
        assert!(registry.contains(&GlobalAttributeId::new("B").key()));
        assert_eq!(cells.is_satisfied.get(), Some(false));
        assert_eq!(cells.can_reset.get(), Some(true));
    }

    #[test]
    fn test_session_change_unsubscribes_previous_listeners() {
        let (cells, bridge) = bridge();
        let first = mock_session(Configuration::default());
        let second = mock_session(Configuration::default());

        bridge.session_changed(Some(first.clone()));
        bridge.session_changed(Some(second.clone()));

        assert_eq!(first.listener_count(), 0);
        assert_eq!(second.listener_count(), 6);

        first.push_can_reset(true);
        assert_eq!(cells.can_reset.get(), Some(false));
    }

    #[test]
    fn test_same_session_is_noop() {
        let (_cells, bridge) = bridge();
        let session = mock_session(Configuration::default());

        bridge.session_changed(Some(session.clone()));
        bridge.session_changed(Some(session.clone()));

        assert_eq!(session.listener_count(), 6);
        assert_eq!(bridge.active_subscriptions(), 6);
    }

    #[test]
    fn test_clearing_session_resets_cells() {
        let (cells, bridge) = bridge();
        let session = mock_session(Configuration::default());
        bridge.session_changed(Some(session.clone()));

        bridge.session_changed(None);

        assert_eq!(session.listener_count(), 0);
        assert!(cells.session.get().is_none());
        assert!(cells.configuration.get().is_none());
        assert!(cells.can_reset.get().is_none());
        assert!(cells.attributes.get().is_none());
    }

    #[test]
    fn test_stale_listener_is_ignored() {
        let cells = Arc::new(GraphCells::new());
        let generation = Arc::new(AtomicU64::new(3));
        let scope = ListenerScope {
            cells: Arc::downgrade(&cells),
            generation: generation.clone(),
            registered: 3,
        };

        assert!(scope.cells().is_some());
        generation.fetch_add(1, Ordering::SeqCst);
        assert!(scope.cells().is_none());
    }

    #[test]
    fn test_drop_releases_listeners() {
        let (_cells, bridge) = bridge();
        let session = mock_session(Configuration::default());
        bridge.session_changed(Some(session.clone()));

        drop(bridge);
        assert_eq!(session.listener_count(), 0);
    }
}
