//! End-to-end scenarios of the configuration store against mocked
//! collaborators.

use configurator_core::attribute::{
    Attribute, BooleanAttribute, Cardinality, ChoiceAttribute, ChoiceValue,
    ChoiceValueDecisionState, DecisionKind, GlobalAttributeId,
};
use configurator_core::config::RuntimeConfig;
use configurator_core::configuration::{AttributeChanges, Configuration, ConfigurationChanges};
use configurator_core::context::SessionContext;
use configurator_core::decision::{
    CollectedDecision, DecisionFilter, ExplicitBooleanDecision, ExplicitDecision,
};
use configurator_core::explain::{AnswerShape, ExplainQuestionSubject};
use configurator_core::testing::{MockClient, MockSession};
use configurator_core::{ConfiguratorError, FailureResult, FailureType};
use configurator_reactive::{AttributeSelection, ConfigurationStore, MaybePending};
use configurator_session::{LifecycleState, Pending};
use configurator_telemetry::DiagnosticEvent;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::layer::SubscriberExt;

fn params(model: &str) -> SessionContext {
    SessionContext::channel(model, "release")
}

/// Lets every background task run until all pending timers fired.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}

fn store() -> ConfigurationStore {
    ConfigurationStore::with_defaults().unwrap()
}

fn boolean(id: &str) -> Attribute {
    Attribute::Boolean(BooleanAttribute {
        id: GlobalAttributeId::new(id),
        is_satisfied: true,
        can_contribute_to_configuration_satisfaction: false,
        decision: None,
        possible_decision_states: vec![true, false],
    })
}

fn choice(id: &str) -> Attribute {
    Attribute::Choice(ChoiceAttribute {
        id: GlobalAttributeId::new(id),
        is_satisfied: false,
        can_contribute_to_configuration_satisfaction: true,
        cardinality: Cardinality {
            lower_bound: 1,
            upper_bound: 1,
        },
        values: vec![ChoiceValue {
            id: "V1".to_string(),
            decision: None,
            possible_decision_states: vec![
                ChoiceValueDecisionState::Included,
                ChoiceValueDecisionState::Excluded,
            ],
        }],
    })
}

fn sample_configuration() -> Configuration {
    Configuration::from_attributes(false, [choice("A1"), boolean("B1"), boolean("B2")])
}

async fn connected(client: &Arc<MockClient>) -> (ConfigurationStore, Arc<MockSession>) {
    let store = store();
    store.set_client(Some(client.clone()));
    store.set_session_context(Some(params("M1")));
    settle().await;
    store.ready().await.unwrap();
    let session = client.last_session().unwrap();
    (store, session)
}

fn pending<T>(read: MaybePending<T>) -> Pending<T> {
    match read {
        MaybePending::Pending(pending) => pending,
        MaybePending::Ready(_) => panic!("expected a pending read"),
    }
}

fn drain(events: &mut mpsc::UnboundedReceiver<DiagnosticEvent>) -> Vec<DiagnosticEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

fn warnings_containing(events: &[DiagnosticEvent], text: &str) -> usize {
    events
        .iter()
        .filter(|e| e.is_warning() && e.message.contains(text))
        .count()
}

#[tokio::test(start_paused = true)]
async fn scenario_null_client_stays_idle_until_client_arrives() {
    let (layer, mut events) = configurator_telemetry::capture();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(layer));

    let store = store();
    store.set_session_context(Some(params("M1")));
    store.set_client(None);
    store.set_client(None);
    settle().await;

    let captured = drain(&mut events);
    assert_eq!(warnings_containing(&captured, "The configurator client is null."), 1);
    assert_eq!(store.graph().cells().lifecycle.get().state, LifecycleState::Idle);
    assert!(store.configuration().get().is_err());

    let client = MockClient::new();
    store.set_client(Some(client.clone()));
    settle().await;

    assert_eq!(client.create_call_count(), 1);
    assert!(store.configuration().get().is_ok());
    store.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn scenario_params_change_updates_session_in_place() {
    let client = MockClient::new();
    let (store, session) = connected(&client).await;

    store.set_session_context(Some(params("M2")));
    settle().await;

    assert_eq!(session.set_context_calls(), vec![params("M2")]);
    assert_eq!(session.close_calls(), 0);
    assert_eq!(client.create_call_count(), 1);
    assert!(!store.session_updating().is_updating);
    store.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn scenario_equal_params_do_not_touch_session() {
    let client = MockClient::new();
    let (store, session) = connected(&client).await;

    store.set_session_context(Some(params("M1")));
    settle().await;

    assert!(session.set_context_calls().is_empty());
    store.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn scenario_null_params_dispose_then_recreate() {
    let (layer, mut events) = configurator_telemetry::capture();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(layer));
    let client = MockClient::new();
    let (store, first) = connected(&client).await;

    store.set_session_context(None);
    settle().await;

    assert_eq!(first.close_calls(), 1);
    assert_eq!(first.listener_count(), 0);
    assert!(matches!(store.configuration().get(), Err(ConfiguratorError::NotInitialized)));
    assert_eq!(
        warnings_containing(&drain(&mut events), "The session context is null."),
        1
    );

    store.set_session_context(Some(params("M1")));
    settle().await;

    assert_eq!(client.create_call_count(), 2);
    let second = client.last_session().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.close_calls(), 1);
    store.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn scenario_choice_decisions_reach_session_verbatim() {
    let client = MockClient::with_configuration(sample_configuration());
    let (store, session) = connected(&client).await;

    let view = store
        .choice_attribute(&GlobalAttributeId::new("A1"))
        .wait()
        .await
        .unwrap()
        .unwrap();
    view.make_decision("V1", Some(ChoiceValueDecisionState::Included))
        .await
        .unwrap();
    view.make_decision("V1", None).await.unwrap();

    let made: Vec<_> = session
        .made_decisions()
        .iter()
        .map(|d| serde_json::to_value(d).unwrap())
        .collect();
    assert_eq!(
        made,
        vec![
            json!({
                "type": "Choice",
                "attributeId": {"localId": "A1"},
                "choiceValueId": "V1",
                "state": "Included",
            }),
            json!({
                "type": "Choice",
                "attributeId": {"localId": "A1"},
                "choiceValueId": "V1",
                "state": null,
            }),
        ]
    );
    store.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_once() {
    let client = MockClient::new();
    let (store, session) = connected(&client).await;

    store.shutdown().await;
    store.shutdown().await;

    assert_eq!(session.close_calls(), 1);
    assert!(store.is_shut_down());
    assert!(store.configuration().get().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_readiness_signal_resolves_on_initialization() {
    let client = MockClient::new();
    let store = store();
    let signal = store.ready_signal().unwrap();
    assert!(store.initialization().is_initializing);
    assert!(matches!(store.make_decision().get(), Err(ConfiguratorError::NotInitialized)));

    store.set_client(Some(client.clone()));
    store.set_session_context(Some(params("M1")));
    settle().await;

    assert_eq!(signal.await, Ok(()));
    assert!(store.ready_signal().is_none());
    assert!(!store.initialization().is_initializing);
    store.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_creation_failure_is_reported_and_retryable() {
    let client = MockClient::new();
    client.fail_next(FailureResult::new(FailureType::ConnectionError, "offline"));
    let store = store();
    let waiting = store.ready_signal().unwrap();
    store.set_client(Some(client.clone()));
    store.set_session_context(Some(params("M1")));
    settle().await;

    let initialization = store.session_initialization();
    assert!(!initialization.is_initializing);
    let error = initialization.error.unwrap();
    assert_eq!(error.failure().failure_type, FailureType::ConnectionError);

    // Nothing is bound yet, so the store keeps initializing next to the error.
    let configuration_state = store.initialization();
    assert!(configuration_state.is_initializing);
    assert!(configuration_state.error.is_some());
    assert!(store.ready_signal().is_some());
    assert!(tokio::time::timeout(Duration::from_secs(5), store.ready()).await.is_err());

    error.retry();
    settle().await;

    assert_eq!(client.create_call_count(), 2);
    assert!(store.session_initialization().error.is_none());
    assert_eq!(waiting.await, Ok(()));
    assert!(!store.initialization().is_initializing);
    store.ready().await.unwrap();
    store.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_dispose_during_create_closes_orphan() {
    let client = MockClient::with_configuration(sample_configuration());
    client.set_delay(Duration::from_secs(1));
    let store = store();
    store.set_client(Some(client.clone()));
    store.set_session_context(Some(params("M1")));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.gauge().in_flight(), 1);

    store.set_session_context(None);
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(client.create_call_count(), 1);
    let orphan = client.last_session().unwrap();
    assert_eq!(orphan.close_calls(), 1);
    assert_eq!(orphan.listener_count(), 0);

    assert!(store.graph().cells().session.get().is_none());
    assert!(store.configuration().get().is_err());
    assert!(store.ready_signal().is_some());
    assert!(store.initialization().is_initializing);
    store.shutdown().await;
    assert_eq!(orphan.close_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_suspended_configuration_keeps_identity() {
    let client = MockClient::with_configuration(sample_configuration());
    let store = store();
    let accessor = store.configuration();

    let first = pending(accessor.suspend());
    let second = pending(store.configuration().suspend());
    assert!(first.ptr_eq(&second));

    store.set_client(Some(client.clone()));
    store.set_session_context(Some(params("M1")));
    settle().await;

    let last = pending(accessor.suspend());
    assert!(last.ptr_eq(&first));
    let configuration = first.await.unwrap();
    assert_eq!(configuration.attributes.len(), 3);
    assert!(accessor.suspend().is_ready());
    store.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_attribute_selection() {
    let client = MockClient::with_configuration(sample_configuration());
    let (store, _session) = connected(&client).await;

    let all = store.attributes(AttributeSelection::All, false).get().unwrap();
    let ids: Vec<_> = all.iter().flatten().map(|a| a.id().local_id.clone()).collect();
    assert_eq!(ids, vec!["A1", "B1", "B2"]);

    let requested = AttributeSelection::Keys(vec![
        GlobalAttributeId::new("B2"),
        GlobalAttributeId::new("missing"),
        GlobalAttributeId::new("A1"),
    ]);
    let with_holes = store.attributes(requested.clone(), false).get().unwrap();
    assert_eq!(with_holes.len(), 3);
    assert!(with_holes[1].is_none());
    assert_eq!(with_holes[2].as_ref().unwrap().id().local_id, "A1");

    let filtered = store.attributes(requested, true).get().unwrap();
    assert_eq!(filtered.len(), 2);
    store.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_attribute_selections_are_not_retained() {
    let client = MockClient::with_configuration(sample_configuration());
    let store = store();
    let selection = AttributeSelection::Keys(vec![GlobalAttributeId::new("B1")]);

    let first = pending(store.attributes(selection.clone(), false).suspend());
    let second = pending(store.attributes(selection.clone(), false).suspend());
    assert!(!first.ptr_eq(&second));

    let kept = store.attributes(selection, false);
    store.set_client(Some(client.clone()));
    store.set_session_context(Some(params("M1")));
    settle().await;
    store.ready().await.unwrap();
    assert!(first.await.is_ok());

    assert!(kept.get().unwrap()[0].as_ref().is_some_and(|a| a.is_satisfied()));

    let mut unsatisfied = boolean("B1");
    if let Attribute::Boolean(ref mut attribute) = unsatisfied {
        attribute.is_satisfied = false;
    }
    let session = client.last_session().unwrap();
    session.push_configuration(
        Configuration::from_attributes(false, [choice("A1"), unsatisfied.clone(), boolean("B2")]),
        ConfigurationChanges {
            is_satisfied: None,
            attributes: AttributeChanges {
                changed: vec![unsatisfied],
                ..Default::default()
            },
        },
    );
    assert!(kept.get().unwrap()[0].as_ref().is_some_and(|a| !a.is_satisfied()));
    store.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_missing_attribute_is_settled_none() {
    let client = MockClient::with_configuration(sample_configuration());
    let (store, _session) = connected(&client).await;

    let missing = store.boolean_attribute(&GlobalAttributeId::new("nope"));
    assert!(missing.get().unwrap().is_none());
    let mismatched = store.numeric_attribute(&GlobalAttributeId::new("B1"));
    assert!(mismatched.get().unwrap().is_none());
    store.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_satisfaction_explains_configuration() {
    let client = MockClient::with_configuration(sample_configuration());
    let (store, session) = connected(&client).await;

    let satisfaction = store.satisfaction().get().unwrap();
    assert!(!satisfaction.is_satisfied());
    satisfaction.explain(AnswerShape::Decisions).await.unwrap();
    assert!(matches!(
        satisfaction.explain_as("nonsense").await,
        Err(ConfiguratorError::UnknownAnswerShape(_))
    ));

    let calls = session.explain_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0.subject, ExplainQuestionSubject::Configuration);
    assert_eq!(calls[0].0.attribute_id, None);

    session.push_configuration(
        Configuration::from_attributes(true, [boolean("B1")]),
        ConfigurationChanges {
            is_satisfied: Some(true),
            attributes: AttributeChanges {
                removed: vec![GlobalAttributeId::new("A1"), GlobalAttributeId::new("B2")],
                ..Default::default()
            },
        },
    );
    assert!(store.satisfaction().get().unwrap().is_satisfied());
    store.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_decision_cells_follow_pushes() {
    let client = MockClient::new();
    let (store, session) = connected(&client).await;
    assert!(store.decisions(DecisionFilter::All).get().unwrap().is_empty());

    let decision = |kind, id: &str| CollectedDecision {
        kind,
        decision: ExplicitDecision::Boolean(ExplicitBooleanDecision {
            attribute_id: GlobalAttributeId::new(id),
            state: Some(true),
        }),
    };
    session.push_decisions(vec![
        decision(DecisionKind::Explicit, "B1"),
        decision(DecisionKind::Implicit, "B2"),
    ]);

    assert_eq!(store.decisions(DecisionFilter::All).get().unwrap().len(), 2);
    let explicit = store.decisions(DecisionFilter::Explicit).get().unwrap();
    assert_eq!(explicit.len(), 1);
    assert_eq!(explicit[0].decision.attribute_id(), &GlobalAttributeId::new("B1"));

    let queries = store.decision_queries().get().unwrap();
    assert_eq!(queries.decisions(DecisionFilter::Implicit).len(), 1);
    assert_eq!(queries.decisions_queued(DecisionFilter::All).await.unwrap().len(), 2);
    store.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_session_commands() {
    let client = MockClient::new();
    let (store, session) = connected(&client).await;

    assert!(matches!(
        store.stored_configuration().get(),
        Err(ConfiguratorError::NotInitialized)
    ));
    let stored = store.storing().get().unwrap().store_configuration().await.unwrap();
    assert_eq!(store.stored_configuration().get().unwrap(), stored);

    assert!(!store.reset().get().unwrap().can_reset());
    session.push_can_reset(true);
    let reset = store.reset().get().unwrap();
    assert!(reset.can_reset());
    reset.reset_configuration().await.unwrap();

    store.reinitialization().get().unwrap().reinitialize().await.unwrap();
    let cancel = tokio_util::sync::CancellationToken::new();
    cancel.cancel();
    let scheduled = store.task_scheduling().get().unwrap().schedule_task(Some(cancel)).await;
    assert!(matches!(
        scheduled,
        Err(ConfiguratorError::Failure(f)) if f.failure_type == FailureType::TaskCancelled
    ));

    assert_eq!(
        session.commands(),
        vec!["store_configuration", "reset_configuration", "reinitialize", "schedule_task"]
    );
    store.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_watch_subscription_sees_pushes() {
    let client = MockClient::new();
    let (store, session) = connected(&client).await;
    let mut watch = store.configuration().subscribe();
    assert_eq!(store.subscriptions().active_count("configuration"), 1);

    session.push_configuration(
        Configuration::from_attributes(true, [boolean("B9")]),
        ConfigurationChanges::default(),
    );
    let seen = watch.changed().await.unwrap().into_option().unwrap();
    assert_eq!(seen.attributes.len(), 1);

    watch.unsubscribe();
    assert_eq!(store.subscriptions().active_count("configuration"), 0);
    store.shutdown().await;
}

#[test]
fn test_store_requires_runtime() {
    let err = ConfigurationStore::new(RuntimeConfig::default()).err().unwrap();
    assert!(matches!(err, ConfiguratorError::Internal(_)));
}
