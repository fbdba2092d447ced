//! End-to-end runs of the coordinator against a real SQLite store.

use std::sync::{Arc, Mutex};

use paperclip_action::Capabilities;
use paperclip_core::config::ActionsConfig;
use paperclip_core::{
    Clock, DeletionEvent, DomainEvent, ErrorEvent, EventKind, ManualClock, PaperclipConfig,
    Persistence, SignalKind, TaskCategory, TaskContext, Timestamp,
};
use paperclip_engine::{Coordinator, EventBus};
use paperclip_storage::SqliteStore;

const T0: i64 = 1_700_000_000_000;

fn setup() -> (Coordinator, Arc<SqliteStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Timestamp(T0)));
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let coordinator = Coordinator::from_config(
        &PaperclipConfig::default(),
        Capabilities::local(&ActionsConfig::default()),
        Some(store.clone()),
        clock.clone(),
    );
    coordinator.start();
    (coordinator, store, clock)
}

fn record_events(coordinator: &Coordinator) -> Arc<Mutex<Vec<DomainEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    for kind in EventKind::ALL {
        let events = events.clone();
        coordinator.subscribe(
            kind,
            Arc::new(move |event: &DomainEvent, _: &EventBus| {
                events.lock().unwrap().push(event.clone());
                Ok(())
            }),
        );
    }
    events
}

#[tokio::test]
async fn repeated_errors_flow_through_to_a_message() {
    let (coordinator, store, _clock) = setup();
    let events = record_events(&coordinator);

    let mut outcome = None;
    for i in 0..3 {
        let event = ErrorEvent::new("NullPointerException", "ide", Timestamp(T0 + i * 1_000));
        outcome = coordinator.record_error(event).await;
    }
    let intervention = outcome.expect("third error triggers the chain");
    assert_eq!(intervention.signal.kind, SignalKind::RepeatedError);
    assert!((intervention.signal.severity - 1.0).abs() < f64::EPSILON);
    assert_eq!(intervention.signal.application_context, "ide");

    let events = events.lock().unwrap();
    let names: Vec<&str> = events.iter().map(|e| e.event_name()).collect();
    assert_eq!(
        names,
        vec!["frustration_detected", "context_ready", "action_executed", "message_ready"]
    );

    let DomainEvent::ContextReady { context, .. } = &events[1] else {
        panic!("expected context_ready");
    };
    let DomainEvent::ActionExecuted { result, .. } = &events[2] else {
        panic!("expected action_executed");
    };
    assert_eq!(intervention.actions.len(), 1);
    assert_eq!(context.id, intervention.actions[0].context.id);
    assert!(!result.success, "file_read without a path fails");

    let signals = store.recent_frustration_signals(10).unwrap();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].signal, intervention.signal);
    assert!(store.get_context_snapshot(context.id).unwrap().is_some());
    assert!(store.recent_action_history(10).unwrap().is_empty());
}

#[tokio::test]
async fn rapid_deletion_raises_signal_with_editor_context() {
    let (coordinator, _store, _clock) = setup();

    let mut outcome = None;
    for i in 0..3 {
        outcome = coordinator
            .record_deletion(DeletionEvent::new(20, Timestamp(T0 + i * 1_000)))
            .await;
    }
    let intervention = outcome.expect("60 characters inside 5s triggers");
    assert_eq!(intervention.signal.kind, SignalKind::RapidDeletion);
    assert!(intervention.signal.severity >= 0.6);
    let context = &intervention.actions[0].context;
    assert_eq!(context.active_application, "text_editor");
    assert_eq!(context.inferred_intent, TaskCategory::Unknown);
    assert_eq!(context.confidence, 0.0);
}

#[tokio::test]
async fn below_threshold_events_stay_quiet() {
    let (coordinator, store, _clock) = setup();
    let events = record_events(&coordinator);

    for i in 0..2 {
        let event = ErrorEvent::new("E", "ide", Timestamp(T0 + i));
        assert!(coordinator.record_error(event).await.is_none());
    }
    assert!(coordinator
        .record_deletion(DeletionEvent::new(49, Timestamp(T0)))
        .await
        .is_none());

    assert!(events.lock().unwrap().is_empty());
    assert!(store.recent_frustration_signals(10).unwrap().is_empty());
}

#[tokio::test]
async fn broadcast_stream_sees_the_chain() {
    let (coordinator, _store, _clock) = setup();
    let mut stream = coordinator.bus().stream();

    for i in 0..3 {
        let event = ErrorEvent::new("boom", "terminal", Timestamp(T0 + i));
        coordinator.record_error(event).await;
    }

    let mut kinds = Vec::new();
    while let Ok(event) = stream.try_recv() {
        kinds.push(event.kind());
    }
    assert_eq!(kinds.first(), Some(&EventKind::FrustrationDetected));
    assert_eq!(kinds.last(), Some(&EventKind::MessageReady));
}

#[tokio::test]
async fn stop_and_shutdown_halt_the_chain() {
    let (coordinator, _store, _clock) = setup();
    coordinator.shutdown();
    assert!(!coordinator.is_running());
    for i in 0..3 {
        let event = ErrorEvent::new("E", "ide", Timestamp(T0 + i));
        assert!(coordinator.record_error(event).await.is_none());
    }
}

#[tokio::test]
async fn detector_signals_reach_the_bus_without_the_coordinator_feeders() {
    let (coordinator, store, _clock) = setup();
    let events = record_events(&coordinator);

    for i in 0..3 {
        let event = ErrorEvent::new("TypeError", "ide", Timestamp(T0 + i * 1_000));
        coordinator.detector().record_error(event);
    }
    let executed = coordinator.process_pending().await;
    assert_eq!(executed.len(), 1);

    let names: Vec<&str> = events.lock().unwrap().iter().map(|e| e.event_name()).collect();
    assert_eq!(
        names,
        vec!["frustration_detected", "context_ready", "action_executed", "message_ready"]
    );
    assert!(store
        .get_context_snapshot(executed[0].context.id)
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn nested_context_ready_is_picked_up_in_the_same_drain() {
    let (coordinator, _store, clock) = setup();
    let events = record_events(&coordinator);

    // Announces one extra context from inside the first action_executed.
    let replayed = Arc::new(Mutex::new(false));
    let flag = replayed.clone();
    let now = clock.clone();
    coordinator.subscribe(
        EventKind::ActionExecuted,
        Arc::new(move |_: &DomainEvent, bus: &EventBus| {
            let mut done = flag.lock().unwrap();
            if !*done {
                *done = true;
                bus.emit(DomainEvent::ContextReady {
                    context: TaskContext::empty(now.now()),
                    timestamp: now.now(),
                });
            }
            Ok(())
        }),
    );

    let mut outcome = None;
    for i in 0..3 {
        let event = ErrorEvent::new("E", "ide", Timestamp(T0 + i));
        outcome = coordinator.record_error(event).await;
    }
    let intervention = outcome.expect("third error triggers the chain");
    assert_eq!(intervention.actions.len(), 2);

    let executed = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.kind() == EventKind::ActionExecuted)
        .count();
    assert_eq!(executed, 2);
}
