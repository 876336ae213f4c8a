//! The reactive value graph of one store.
//!
//! # Module Structure
//!
//! - [`GraphCells`]: primitive cells, written only by the subscription
//!   bridge and the lifecycle pump
//! - [`Selectors`]: guarded derived cells over those primitives, including
//!   the command surfaces bound to the current session
//!
//! Every cell shares one [`Revision`], so any write invalidates the memo of
//! every selector and wakes every suspended reader.

use crate::cell::{Cell, Revision};
use crate::commands::{
    DecisionQueries, ExplainCommands, MakeDecisionCommands, ReinitializationCommands, ResetCommands,
    Satisfaction, StoringCommands, TaskSchedulingCommands,
};
use crate::derived::Derived;
use crate::registry::AttributeRegistry;
use configurator_core::configuration::{Configuration, StoredConfiguration};
use configurator_core::decision::{CollectedDecision, DecisionFilter};
use configurator_core::session::SessionHandle;
use configurator_session::{ErrorWithRetry, LifecycleStatus};
use std::sync::Arc;

pub type DecisionList = Arc<Vec<CollectedDecision>>;

/// Collected decisions, one cell per filter.
pub struct DecisionCells {
    pub all: Cell<Option<DecisionList>>,
    pub explicit: Cell<Option<DecisionList>>,
    pub implicit: Cell<Option<DecisionList>>,
}

impl DecisionCells {
    fn new(revision: &Revision) -> Self {
        Self {
            all: Cell::new(revision, None),
            explicit: Cell::new(revision, None),
            implicit: Cell::new(revision, None),
        }
    }

    pub fn cell(&self, filter: DecisionFilter) -> &Cell<Option<DecisionList>> {
        match filter {
            DecisionFilter::All => &self.all,
            DecisionFilter::Explicit => &self.explicit,
            DecisionFilter::Implicit => &self.implicit,
        }
    }

    fn clear(&self) {
        self.all.set(None);
        self.explicit.set(None);
        self.implicit.set(None);
    }
}

/// Primitive cells. `None` means unset.
pub struct GraphCells {
    pub revision: Revision,
    pub lifecycle: Cell<LifecycleStatus>,
    pub session: Cell<Option<SessionHandle>>,
    pub configuration: Cell<Option<Arc<Configuration>>>,
    pub is_satisfied: Cell<Option<bool>>,
    pub can_reset: Cell<Option<bool>>,
    pub attributes: Cell<Option<Arc<AttributeRegistry>>>,
    pub stored_configuration: Cell<Option<StoredConfiguration>>,
    pub decisions: DecisionCells,
}

impl GraphCells {
    pub fn new() -> Self {
        let revision = Revision::new();
        Self {
            lifecycle: Cell::new(&revision, LifecycleStatus::default()),
            session: Cell::new(&revision, None),
            configuration: Cell::new(&revision, None),
            is_satisfied: Cell::new(&revision, None),
            can_reset: Cell::new(&revision, None),
            attributes: Cell::new(&revision, None),
            stored_configuration: Cell::new(&revision, None),
            decisions: DecisionCells::new(&revision),
            revision,
        }
    }

    /// Clears every session-derived cell. The lifecycle cell is left alone.
    pub(crate) fn reset_session_state(&self) {
        self.session.set(None);
        self.configuration.set(None);
        self.is_satisfied.set(None);
        self.can_reset.set(None);
        self.attributes.set(None);
        self.stored_configuration.set(None);
        self.decisions.clear();
    }
}

impl Default for GraphCells {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the configuration can be used yet.
///
/// Initializing until the lifecycle stopped initializing and every session
/// cell holds a value. A creation error is reported next to the flag and
/// does not end the initializing state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigurationInitialization {
    pub is_initializing: bool,
    pub error: Option<ErrorWithRetry>,
}

#[derive(Clone)]
pub struct DecisionSelectors {
    pub all: Derived<DecisionList>,
    pub explicit: Derived<DecisionList>,
    pub implicit: Derived<DecisionList>,
}

impl DecisionSelectors {
    pub fn get(&self, filter: DecisionFilter) -> &Derived<DecisionList> {
        match filter {
            DecisionFilter::All => &self.all,
            DecisionFilter::Explicit => &self.explicit,
            DecisionFilter::Implicit => &self.implicit,
        }
    }
}

/// Guarded views over [`GraphCells`].
#[derive(Clone)]
pub struct Selectors {
    pub session: Derived<SessionHandle>,
    pub configuration: Derived<Arc<Configuration>>,
    pub is_satisfied: Derived<bool>,
    pub can_reset: Derived<bool>,
    pub attributes: Derived<Arc<AttributeRegistry>>,
    pub stored_configuration: Derived<StoredConfiguration>,
    pub decisions: DecisionSelectors,
    pub initialization: Derived<ConfigurationInitialization>,
    pub make_decision: Derived<MakeDecisionCommands>,
    pub explain: Derived<ExplainCommands>,
    pub decision_queries: Derived<DecisionQueries>,
    pub storing: Derived<StoringCommands>,
    pub reset: Derived<ResetCommands>,
    pub reinitialization: Derived<ReinitializationCommands>,
    pub task_scheduling: Derived<TaskSchedulingCommands>,
    pub satisfaction: Derived<Satisfaction>,
}

impl Selectors {
    fn new(cells: &GraphCells) -> Self {
        let revision = &cells.revision;
        let session = Derived::from_cell(&cells.session);
        let configuration = Derived::from_cell(&cells.configuration);
        let is_satisfied = Derived::from_cell(&cells.is_satisfied);
        let can_reset = Derived::from_cell(&cells.can_reset);
        let attributes = Derived::from_cell(&cells.attributes);

        let initialization = {
            let lifecycle = cells.lifecycle.clone();
            let (session, configuration) = (session.clone(), configuration.clone());
            let (is_satisfied, can_reset, attributes) =
                (is_satisfied.clone(), can_reset.clone(), attributes.clone());
            Derived::with_guard(revision, move || {
                let status = lifecycle.get().initialization;
                let all_set = session.read().is_initialized()
                    && configuration.read().is_initialized()
                    && is_satisfied.read().is_initialized()
                    && can_reset.read().is_initialized()
                    && attributes.read().is_initialized();
                Ok(Some(ConfigurationInitialization {
                    is_initializing: status.is_initializing || !all_set,
                    error: status.error,
                }))
            })
        };

        let explain = session.map(|s| Some(ExplainCommands::new(s)));
        let reset = {
            let (session, can_reset) = (session.clone(), can_reset.clone());
            Derived::with_guard(revision, move || {
                Ok(Some(ResetCommands::new(can_reset.get()?, session.get()?)))
            })
        };
        let satisfaction = {
            let (explain, is_satisfied) = (explain.clone(), is_satisfied.clone());
            Derived::with_guard(revision, move || {
                Ok(Some(Satisfaction::new(is_satisfied.get()?, explain.get()?)))
            })
        };

        Self {
            make_decision: session.map(|s| Some(MakeDecisionCommands::new(s))),
            decision_queries: session.map(|s| Some(DecisionQueries::new(s))),
            storing: session.map(|s| Some(StoringCommands::new(s))),
            reinitialization: session.map(|s| Some(ReinitializationCommands::new(s))),
            task_scheduling: session.map(|s| Some(TaskSchedulingCommands::new(s))),
            stored_configuration: Derived::from_cell(&cells.stored_configuration),
            decisions: DecisionSelectors {
                all: Derived::from_cell(&cells.decisions.all),
                explicit: Derived::from_cell(&cells.decisions.explicit),
                implicit: Derived::from_cell(&cells.decisions.implicit),
            },
            explain,
            reset,
            satisfaction,
            initialization,
            session,
            configuration,
            is_satisfied,
            can_reset,
            attributes,
        }
    }
}

/// Raw handle to the cells and selectors of a store, for callers that
/// compose their own derived cells.
#[derive(Clone)]
pub struct ReactiveGraph {
    cells: Arc<GraphCells>,
    selectors: Selectors,
}

impl ReactiveGraph {
    pub fn new() -> Self {
        let cells = Arc::new(GraphCells::new());
        let selectors = Selectors::new(&cells);
        Self { cells, selectors }
    }

    pub fn cells(&self) -> &Arc<GraphCells> {
        &self.cells
    }

    pub fn selectors(&self) -> &Selectors {
        &self.selectors
    }

    pub fn revision(&self) -> &Revision {
        &self.cells.revision
    }
}

impl Default for ReactiveGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use configurator_core::Guarded;
    use configurator_core::context::SessionContext;
    use configurator_core::testing::{CallGauge, MockSession};
    use std::time::Duration;

    fn session() -> SessionHandle {
        Arc::new(MockSession::new(
            SessionContext::channel("dep", "release"),
            Configuration::default(),
            Arc::new(CallGauge::default()),
            Duration::ZERO,
        ))
    }

    fn populate(cells: &GraphCells) {
        let configuration = Arc::new(Configuration::default());
        cells.attributes.set(Some(Arc::new(AttributeRegistry::from_configuration(
            &cells.revision,
            &configuration,
        ))));
        cells.configuration.set(Some(configuration));
        cells.is_satisfied.set(Some(true));
        cells.can_reset.set(Some(false));
        cells.session.set(Some(session()));
    }

    #[test]
    fn test_commands_uninitialized_without_session() {
        let graph = ReactiveGraph::new();
        let selectors = graph.selectors();

        assert!(!selectors.make_decision.read().is_initialized());
        assert!(!selectors.reset.read().is_initialized());
        assert!(!selectors.satisfaction.read().is_initialized());
    }

    #[test]
    fn test_initialization_waits_for_every_session_cell() {
        let graph = ReactiveGraph::new();
        let cells = graph.cells();
        let initialization = &graph.selectors().initialization;

        assert!(initialization.read().get().unwrap().is_initializing);

        cells.session.set(Some(session()));
        assert!(initialization.read().get().unwrap().is_initializing);

        populate(cells);
        assert_eq!(
            initialization.read(),
            Guarded::Initialized(ConfigurationInitialization::default())
        );
    }

    #[test]
    fn test_reset_commands_carry_flag() {
        let graph = ReactiveGraph::new();
        populate(graph.cells());

        let reset = graph.selectors().reset.get().unwrap();
        assert!(!reset.can_reset());

        graph.cells().can_reset.set(Some(true));
        assert!(graph.selectors().reset.get().unwrap().can_reset());
    }

    #[test]
    fn test_reset_session_state_clears_cells() {
        let graph = ReactiveGraph::new();
        populate(graph.cells());
        graph.cells().reset_session_state();

        let selectors = graph.selectors();
        assert!(!selectors.session.read().is_initialized());
        assert!(!selectors.configuration.read().is_initialized());
        assert!(!selectors.attributes.read().is_initialized());
        assert!(!selectors.decisions.get(DecisionFilter::All).read().is_initialized());
    }
}
