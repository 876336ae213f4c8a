use super::*;
use configurator_core::configuration::Configuration;
use configurator_core::testing::{CallGauge, MockClient, MockSession};
use configurator_core::FailureType;
use std::sync::Arc;
use std::time::Duration;

fn params(model: &str) -> SessionContext {
    SessionContext::channel(model, "release")
}

fn session(context: SessionContext) -> Arc<MockSession> {
    Arc::new(MockSession::new(
        context,
        Configuration::default(),
        Arc::new(CallGauge::default()),
        Duration::ZERO,
    ))
}

fn failure() -> FailureResult {
    FailureResult::new(FailureType::ServerError, "boom")
}

/// A machine that already owns a session created for `context`.
fn machine_with_session(
    client: &ClientHandle,
    context: SessionContext,
) -> (SessionLifecycleMachine, Arc<MockSession>) {
    let mut machine = SessionLifecycleMachine::new();
    machine.apply(LifecycleEvent::ClientChanged(Some(client.clone())));
    machine.apply(LifecycleEvent::ParametersChanged(Some(context.clone())));
    assert!(matches!(machine.next_action(), LifecycleAction::Create { .. }));

    let created = session(context);
    machine.creation_succeeded(created.clone(), client.clone());
    (machine, created)
}

#[test]
fn test_waits_without_client() {
    let mut machine = SessionLifecycleMachine::new();
    machine.apply(LifecycleEvent::ParametersChanged(Some(params("M1"))));

    assert!(matches!(machine.next_action(), LifecycleAction::Wait));
    assert_eq!(machine.state(), LifecycleState::Idle);
}

#[test]
fn test_creates_when_client_and_params_present() {
    let client: ClientHandle = MockClient::new();
    let mut machine = SessionLifecycleMachine::new();
    machine.apply(LifecycleEvent::ClientChanged(Some(client)));
    machine.apply(LifecycleEvent::ParametersChanged(Some(params("M1"))));

    match machine.next_action() {
        LifecycleAction::Create { context, .. } => assert_eq!(context, params("M1")),
        other => panic!("expected create, got {:?}", other),
    }
    assert_eq!(machine.state(), LifecycleState::Processing(ProcessingKind::Create));
    assert!(matches!(machine.next_action(), LifecycleAction::Wait));
}

#[test]
fn test_updates_when_params_differ() {
    let client: ClientHandle = MockClient::new();
    let (mut machine, _) = machine_with_session(&client, params("M1"));
    assert!(machine.session().is_some());

    machine.apply(LifecycleEvent::ParametersChanged(Some(params("M2"))));
    match machine.next_action() {
        LifecycleAction::Update { context, .. } => assert_eq!(context, params("M2")),
        other => panic!("expected update, got {:?}", other),
    }
}

#[test]
fn test_equivalent_params_do_not_update() {
    let client: ClientHandle = MockClient::new();
    let (mut machine, _) = machine_with_session(&client, params("M1"));

    let mut equivalent = params("M1");
    equivalent.attribute_relations = Some(Vec::new());
    machine.apply(LifecycleEvent::ParametersChanged(Some(equivalent)));

    assert!(matches!(machine.next_action(), LifecycleAction::Wait));
}

#[test]
fn test_disposes_on_null_params_and_clears_error() {
    let client: ClientHandle = MockClient::new();
    let (mut machine, _) = machine_with_session(&client, params("M1"));
    machine.apply(LifecycleEvent::ParametersChanged(Some(params("M2"))));
    assert!(matches!(machine.next_action(), LifecycleAction::Update { .. }));
    machine.update_failed(failure(), params("M2"));
    assert!(machine.error().is_some());

    machine.apply(LifecycleEvent::ParametersChanged(None));
    assert!(matches!(machine.next_action(), LifecycleAction::Dispose(_)));
    assert_eq!(machine.state(), LifecycleState::DisposingSession);

    machine.session_disposed();
    assert!(machine.session().is_none());
    assert!(machine.error().is_none());
    assert_eq!(machine.state(), LifecycleState::Idle);
}

#[test]
fn test_disposes_when_client_identity_changes() {
    let client: ClientHandle = MockClient::new();
    let (mut machine, _) = machine_with_session(&client, params("M1"));

    let other: ClientHandle = MockClient::new();
    machine.apply(LifecycleEvent::ClientChanged(Some(other)));
    assert!(matches!(machine.next_action(), LifecycleAction::Dispose(_)));

    machine.session_disposed();
    assert!(matches!(machine.next_action(), LifecycleAction::Create { .. }));
}

#[test]
fn test_same_client_handle_keeps_session() {
    let client: ClientHandle = MockClient::new();
    let (mut machine, _) = machine_with_session(&client, params("M1"));

    machine.apply(LifecycleEvent::ClientChanged(Some(client.clone())));
    assert!(matches!(machine.next_action(), LifecycleAction::Wait));
}

#[test]
fn test_failed_create_is_forgiven_only_on_change() {
    let client: ClientHandle = MockClient::new();
    let mut machine = SessionLifecycleMachine::new();
    machine.apply(LifecycleEvent::ClientChanged(Some(client.clone())));
    machine.apply(LifecycleEvent::ParametersChanged(Some(params("P1"))));
    assert!(matches!(machine.next_action(), LifecycleAction::Create { .. }));
    machine.creation_failed(failure(), client.clone(), params("P1"));

    // Same parameters again: still blocked.
    machine.apply(LifecycleEvent::ParametersChanged(Some(params("P1"))));
    assert!(matches!(machine.next_action(), LifecycleAction::Wait));
    assert!(machine.error().is_some());

    // Different parameters: forgiven without a retry.
    machine.apply(LifecycleEvent::ParametersChanged(Some(params("P2"))));
    match machine.next_action() {
        LifecycleAction::Create { context, .. } => assert_eq!(context, params("P2")),
        other => panic!("expected create, got {:?}", other),
    }
    assert!(machine.error().is_none());
}

#[test]
fn test_failed_create_is_forgiven_on_client_change() {
    let client: ClientHandle = MockClient::new();
    let mut machine = SessionLifecycleMachine::new();
    machine.apply(LifecycleEvent::ClientChanged(Some(client.clone())));
    machine.apply(LifecycleEvent::ParametersChanged(Some(params("P1"))));
    machine.next_action();
    machine.creation_failed(failure(), client, params("P1"));

    let replacement: ClientHandle = MockClient::new();
    machine.apply(LifecycleEvent::ClientChanged(Some(replacement)));
    assert!(matches!(machine.next_action(), LifecycleAction::Create { .. }));
}

#[test]
fn test_retry_clears_error() {
    let client: ClientHandle = MockClient::new();
    let mut machine = SessionLifecycleMachine::new();
    machine.apply(LifecycleEvent::ClientChanged(Some(client.clone())));
    machine.apply(LifecycleEvent::ParametersChanged(Some(params("P1"))));
    machine.next_action();
    machine.creation_failed(failure(), client, params("P1"));
    assert!(matches!(machine.next_action(), LifecycleAction::Wait));

    machine.apply(LifecycleEvent::Retry);
    assert!(matches!(machine.next_action(), LifecycleAction::Create { .. }));
}

#[test]
fn test_failed_update_keeps_session() {
    let client: ClientHandle = MockClient::new();
    let (mut machine, created) = machine_with_session(&client, params("M1"));
    machine.apply(LifecycleEvent::ParametersChanged(Some(params("M2"))));
    machine.next_action();
    machine.update_failed(failure(), params("M2"));

    let current = machine.session().cloned().unwrap();
    let expected: SessionHandle = created;
    assert!(same_handle(&current, &expected));
    assert!(matches!(machine.next_action(), LifecycleAction::Wait));

    machine.apply(LifecycleEvent::ParametersChanged(Some(params("M3"))));
    assert!(matches!(machine.next_action(), LifecycleAction::Update { .. }));
}

#[test]
fn test_shutdown_is_idempotent() {
    let client: ClientHandle = MockClient::new();
    let (mut machine, _) = machine_with_session(&client, params("M1"));

    assert!(machine.apply(LifecycleEvent::Shutdown).is_some());
    assert!(machine.shutdown().is_none());
    assert!(machine.apply(LifecycleEvent::Shutdown).is_none());
    assert_eq!(machine.state(), LifecycleState::Shutdown);

    machine.apply(LifecycleEvent::ParametersChanged(Some(params("M2"))));
    assert!(matches!(machine.next_action(), LifecycleAction::Wait));
}

#[test]
fn test_disposing_session_is_not_published() {
    let client: ClientHandle = MockClient::new();
    let (mut machine, _) = machine_with_session(&client, params("M1"));
    let (events, _receiver) = tokio::sync::mpsc::unbounded_channel();
    let retry = crate::status::RetryHandle::new(&events);
    assert!(crate::status::LifecycleStatus::from_machine(&machine, &retry).session.is_some());

    machine.apply(LifecycleEvent::ParametersChanged(None));
    assert!(matches!(machine.next_action(), LifecycleAction::Dispose(_)));

    let status = crate::status::LifecycleStatus::from_machine(&machine, &retry);
    assert_eq!(status.state, LifecycleState::DisposingSession);
    assert!(status.session.is_none());
    assert!(!status.initialization.is_initializing);
}
