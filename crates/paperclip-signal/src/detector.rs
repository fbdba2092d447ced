//! Sliding-window frustration detector.
//!
//! Two rules are evaluated on every recorded event:
//!
//! - **repeated_error**: at least `repeated_error_threshold` errors with an
//!   identical message within `repeated_error_window_ms` of the latest one.
//! - **rapid_deletion**: at least `rapid_deletion_threshold` characters
//!   deleted within `rapid_deletion_window_ms` of the latest deletion.
//!
//! Rules are edge-triggered on every call: each qualifying event inside the
//! window re-emits. Emitted signals are persisted first (best-effort), then
//! handed to listeners in registration order.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info, warn};

use paperclip_core::config::DetectorConfig;
use paperclip_core::error::ListenerError;
use paperclip_core::{
    Clock, DeletionEvent, ErrorEvent, FrustrationSignal, ListenerId, Persistence, SignalKind,
    Timestamp,
};

/// Application context attached to rapid-deletion signals.
pub const DELETION_CONTEXT: &str = "text_editor";

const ERROR_WEIGHT: f64 = 0.6;
const DELETION_WEIGHT: f64 = 0.4;

/// Callback invoked for every emitted signal.
pub type FrustrationListener =
    Arc<dyn Fn(&FrustrationSignal) -> Result<(), ListenerError> + Send + Sync>;

#[derive(Default)]
struct DetectorState {
    monitoring: bool,
    errors: Vec<ErrorEvent>,
    deletions: Vec<DeletionEvent>,
    /// Start of the current stretch of productive work, if any.
    flow_anchor: Option<Timestamp>,
}

/// Frustration detector over error and deletion histories.
pub struct SignalDetector {
    config: DetectorConfig,
    clock: Arc<dyn Clock>,
    persistence: Option<Arc<dyn Persistence>>,
    state: Mutex<DetectorState>,
    listeners: Mutex<Vec<(ListenerId, FrustrationListener)>>,
    next_listener: AtomicU64,
}

impl SignalDetector {
    pub fn new(config: DetectorConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            persistence: None,
            state: Mutex::new(DetectorState::default()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Record emitted signals through `persistence`.
    pub fn with_persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    fn state(&self) -> MutexGuard<'_, DetectorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub fn start_monitoring(&self) {
        self.state().monitoring = true;
        info!("Frustration monitoring started");
    }

    pub fn stop_monitoring(&self) {
        self.state().monitoring = false;
        info!("Frustration monitoring stopped");
    }

    pub fn is_monitoring(&self) -> bool {
        self.state().monitoring
    }

    /// Register a listener. Listeners run in registration order.
    pub fn on_frustration(&self, listener: FrustrationListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, listener));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn off_frustration(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Drop both histories and the flow anchor.
    pub fn clear_history(&self) {
        let mut state = self.state();
        state.errors.clear();
        state.deletions.clear();
        state.flow_anchor = None;
    }

    // =========================================================================
    // Recording
    // =========================================================================

    /// Record an error. Returns the signal if the repeated-error rule fired.
    ///
    /// Does nothing unless monitoring. An error always breaks flow state.
    pub fn record_error(&self, event: ErrorEvent) -> Option<FrustrationSignal> {
        let signal = {
            let mut state = self.state();
            if !state.monitoring {
                return None;
            }
            state.errors.push(event.clone());
            state.flow_anchor = None;
            self.prune(&mut state);
            self.check_repeated_errors(&state, &event)
        };

        if let Some(signal) = &signal {
            self.emit(signal);
        }
        signal
    }

    /// Record a deletion. Returns the signal if the rapid-deletion rule fired.
    pub fn record_deletion(&self, event: DeletionEvent) -> Option<FrustrationSignal> {
        let signal = {
            let mut state = self.state();
            if !state.monitoring {
                return None;
            }
            state.deletions.push(event);
            self.prune(&mut state);
            self.check_rapid_deletion(&state, &event)
        };

        if let Some(signal) = &signal {
            self.emit(signal);
        }
        signal
    }

    /// Mark the start of productive work if no stretch is in progress.
    pub fn record_productive_activity(&self) {
        let now = self.clock.now();
        let mut state = self.state();
        if !state.monitoring {
            return;
        }
        if state.flow_anchor.is_none() {
            state.flow_anchor = Some(now);
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn is_in_flow_state(&self) -> bool {
        let now = self.clock.now();
        match self.state().flow_anchor {
            Some(anchor) => now.millis_since(anchor) >= self.config.flow_state_threshold_ms,
            None => false,
        }
    }

    /// Critical notifications are never suppressed; others are while in flow.
    pub fn should_suppress_notification(&self, is_critical: bool) -> bool {
        if is_critical {
            return false;
        }
        self.is_in_flow_state()
    }

    /// Weighted blend of recent error count and deleted characters, in `[0, 1]`.
    ///
    /// Observational only, never emits.
    pub fn frustration_level(&self) -> f64 {
        let now = self.clock.now();
        let state = self.state();

        let recent_errors = state
            .errors
            .iter()
            .filter(|e| now.millis_since(e.timestamp) < self.config.repeated_error_window_ms)
            .count();
        let recent_deleted: u64 = state
            .deletions
            .iter()
            .filter(|d| now.millis_since(d.timestamp) < self.config.rapid_deletion_window_ms)
            .map(|d| u64::from(d.characters_deleted))
            .sum();

        let error_part = ratio(recent_errors as f64, self.config.repeated_error_threshold);
        let deletion_part = ratio(recent_deleted as f64, self.config.rapid_deletion_threshold);
        (error_part * ERROR_WEIGHT + deletion_part * DELETION_WEIGHT).min(1.0)
    }

    // =========================================================================
    // Rules
    // =========================================================================

    /// Drop events older than twice each rule's window, measured from now.
    fn prune(&self, state: &mut DetectorState) {
        let now = self.clock.now();
        let error_horizon = self.config.repeated_error_window_ms.saturating_mul(2);
        let deletion_horizon = self.config.rapid_deletion_window_ms.saturating_mul(2);
        state
            .errors
            .retain(|e| now.millis_since(e.timestamp) < error_horizon);
        state
            .deletions
            .retain(|d| now.millis_since(d.timestamp) < deletion_horizon);
    }

    fn check_repeated_errors(
        &self,
        state: &DetectorState,
        latest: &ErrorEvent,
    ) -> Option<FrustrationSignal> {
        let window_start = latest
            .timestamp
            .minus_millis(self.config.repeated_error_window_ms);
        let count = state
            .errors
            .iter()
            .filter(|e| e.timestamp >= window_start && e.message == latest.message)
            .count();

        if count < self.config.repeated_error_threshold as usize {
            return None;
        }
        Some(FrustrationSignal {
            kind: SignalKind::RepeatedError,
            timestamp: latest.timestamp,
            application_context: latest.application.clone(),
            severity: ratio(count as f64, self.config.repeated_error_threshold),
        })
    }

    fn check_rapid_deletion(
        &self,
        state: &DetectorState,
        latest: &DeletionEvent,
    ) -> Option<FrustrationSignal> {
        let window_start = latest
            .timestamp
            .minus_millis(self.config.rapid_deletion_window_ms);
        let total: u64 = state
            .deletions
            .iter()
            .filter(|d| d.timestamp >= window_start)
            .map(|d| u64::from(d.characters_deleted))
            .sum();

        if total < u64::from(self.config.rapid_deletion_threshold) {
            return None;
        }
        Some(FrustrationSignal {
            kind: SignalKind::RapidDeletion,
            timestamp: latest.timestamp,
            application_context: DELETION_CONTEXT.to_string(),
            severity: ratio(
                total as f64,
                self.config.rapid_deletion_threshold.saturating_mul(2),
            ),
        })
    }

    // =========================================================================
    // Emission
    // =========================================================================

    fn emit(&self, signal: &FrustrationSignal) {
        info!(
            kind = %signal.kind,
            application = %signal.application_context,
            severity = signal.severity,
            "Frustration signal detected"
        );

        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.save_frustration_signal(signal) {
                warn!(error = %e, "Failed to persist frustration signal");
            }
        }

        let listeners: Vec<(ListenerId, FrustrationListener)> = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(signal))) {
                Ok(Ok(())) => debug!(listener = %id, "Frustration listener completed"),
                Ok(Err(e)) => error!(listener = %id, error = %e, "Frustration listener failed"),
                Err(_) => error!(listener = %id, "Frustration listener panicked"),
            }
        }
    }
}

/// `value / threshold` clamped to `[0, 1]`. A zero threshold counts as met.
fn ratio(value: f64, threshold: u32) -> f64 {
    if threshold == 0 {
        return 1.0;
    }
    (value / f64::from(threshold)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperclip_core::ManualClock;
    use paperclip_storage::SqliteStore;

    const T0: i64 = 1_700_000_000_000;

    fn detector() -> (SignalDetector, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Timestamp(T0)));
        let detector = SignalDetector::new(DetectorConfig::default(), clock.clone());
        detector.start_monitoring();
        (detector, clock)
    }

    fn error_at(clock: &ManualClock, message: &str, at: i64) -> ErrorEvent {
        clock.set(Timestamp(at));
        ErrorEvent::new(message, "ide", Timestamp(at))
    }

    #[test]
    fn test_not_monitoring_is_noop() {
        let clock = Arc::new(ManualClock::new(Timestamp(T0)));
        let detector = SignalDetector::new(DetectorConfig::default(), clock.clone());
        for i in 0..5 {
            assert!(detector
                .record_error(ErrorEvent::new("boom", "ide", Timestamp(T0 + i)))
                .is_none());
        }
        assert_eq!(detector.frustration_level(), 0.0);
    }

    #[test]
    fn test_three_identical_errors_raise_repeated_error() {
        let (detector, clock) = detector();
        assert!(detector
            .record_error(error_at(&clock, "NullPointerException", T0))
            .is_none());
        assert!(detector
            .record_error(error_at(&clock, "NullPointerException", T0 + 1_000))
            .is_none());
        let signal = detector
            .record_error(error_at(&clock, "NullPointerException", T0 + 2_000))
            .expect("third error should fire");

        assert_eq!(signal.kind, SignalKind::RepeatedError);
        assert_eq!(signal.severity, 1.0);
        assert_eq!(signal.application_context, "ide");
        assert_eq!(signal.timestamp, Timestamp(T0 + 2_000));
    }

    #[test]
    fn test_repeated_error_rule_is_edge_triggered_every_call() {
        let (detector, clock) = detector();
        let mut fired = 0;
        for i in 0..6 {
            if detector
                .record_error(error_at(&clock, "E", T0 + i * 500))
                .is_some()
            {
                fired += 1;
            }
        }
        assert_eq!(fired, 4);
    }

    #[test]
    fn test_different_messages_do_not_combine() {
        let (detector, clock) = detector();
        assert!(detector.record_error(error_at(&clock, "A", T0)).is_none());
        assert!(detector.record_error(error_at(&clock, "B", T0 + 1)).is_none());
        assert!(detector.record_error(error_at(&clock, "a", T0 + 2)).is_none());
    }

    #[test]
    fn test_errors_outside_window_do_not_count() {
        let (detector, clock) = detector();
        detector.record_error(error_at(&clock, "E", T0));
        detector.record_error(error_at(&clock, "E", T0 + 1_000));
        assert!(detector
            .record_error(error_at(&clock, "E", T0 + 61_001))
            .is_none());
    }

    #[test]
    fn test_window_start_is_inclusive() {
        let (detector, clock) = detector();
        detector.record_error(error_at(&clock, "E", T0));
        detector.record_error(error_at(&clock, "E", T0 + 30_000));
        assert!(detector
            .record_error(error_at(&clock, "E", T0 + 60_000))
            .is_some());
    }

    #[test]
    fn test_rapid_deletion_in_three_chunks() {
        let (detector, clock) = detector();
        clock.set(Timestamp(T0));
        assert!(detector
            .record_deletion(DeletionEvent::new(20, Timestamp(T0)))
            .is_none());
        clock.set(Timestamp(T0 + 1_000));
        assert!(detector
            .record_deletion(DeletionEvent::new(20, Timestamp(T0 + 1_000)))
            .is_none());
        clock.set(Timestamp(T0 + 2_000));
        let signal = detector
            .record_deletion(DeletionEvent::new(20, Timestamp(T0 + 2_000)))
            .expect("60 characters should fire");

        assert_eq!(signal.kind, SignalKind::RapidDeletion);
        assert_eq!(signal.application_context, DELETION_CONTEXT);
        assert!(signal.severity >= 0.6);
    }

    #[test]
    fn test_deletions_below_threshold_do_not_fire() {
        let (detector, clock) = detector();
        for i in 0..7 {
            clock.set(Timestamp(T0 + i * 500));
            assert!(detector
                .record_deletion(DeletionEvent::new(7, Timestamp(T0 + i * 500)))
                .is_none());
        }
    }

    #[test]
    fn test_deletion_severity_saturates() {
        let (detector, clock) = detector();
        clock.set(Timestamp(T0));
        let signal = detector
            .record_deletion(DeletionEvent::new(250, Timestamp(T0)))
            .unwrap();
        assert_eq!(signal.severity, 1.0);
    }

    #[test]
    fn test_flow_state_after_five_minutes() {
        let (detector, clock) = detector();
        assert!(!detector.is_in_flow_state());
        detector.record_productive_activity();
        clock.advance(299_999);
        assert!(!detector.is_in_flow_state());
        clock.advance(1);
        assert!(detector.is_in_flow_state());
        assert!(detector.should_suppress_notification(false));
        assert!(!detector.should_suppress_notification(true));
    }

    #[test]
    fn test_productive_activity_keeps_existing_anchor() {
        let (detector, clock) = detector();
        detector.record_productive_activity();
        clock.advance(200_000);
        detector.record_productive_activity();
        clock.advance(100_000);
        assert!(detector.is_in_flow_state());
    }

    #[test]
    fn test_error_breaks_flow_state() {
        let (detector, clock) = detector();
        detector.record_productive_activity();
        clock.advance(400_000);
        assert!(detector.is_in_flow_state());

        let now = clock.now();
        detector.record_error(ErrorEvent::new("E", "ide", now));
        assert!(!detector.is_in_flow_state());
        assert!(!detector.should_suppress_notification(false));
    }

    #[test]
    fn test_critical_never_suppressed() {
        let (detector, _clock) = detector();
        assert!(!detector.should_suppress_notification(true));
        assert!(!detector.should_suppress_notification(false));
    }

    #[test]
    fn test_frustration_level_blend() {
        let (detector, clock) = detector();
        detector.record_error(error_at(&clock, "A", T0));
        detector.record_error(error_at(&clock, "B", T0));
        detector.record_deletion(DeletionEvent::new(25, Timestamp(T0)));

        let level = detector.frustration_level();
        let expected = 0.6 * (2.0 / 3.0) + 0.4 * 0.5;
        assert!((level - expected).abs() < 1e-9);
    }

    #[test]
    fn test_frustration_level_capped_at_one() {
        let (detector, clock) = detector();
        for i in 0..10 {
            detector.record_error(error_at(&clock, "E", T0 + i));
        }
        detector.record_deletion(DeletionEvent::new(500, Timestamp(T0 + 9)));
        assert_eq!(detector.frustration_level(), 1.0);
    }

    #[test]
    fn test_clear_history_resets_everything() {
        let (detector, clock) = detector();
        detector.record_error(error_at(&clock, "E", T0));
        detector.record_error(error_at(&clock, "E", T0 + 1));
        detector.record_productive_activity();
        detector.clear_history();

        assert_eq!(detector.frustration_level(), 0.0);
        clock.advance(600_000);
        assert!(!detector.is_in_flow_state());
        let now = clock.now();
        assert!(detector.record_error(ErrorEvent::new("E", "ide", now)).is_none());
    }

    #[test]
    fn test_listeners_run_in_order_and_failures_are_isolated() {
        let (detector, clock) = detector();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = seen.clone();
        detector.on_frustration(Arc::new(move |_: &FrustrationSignal| {
            first.lock().unwrap().push("first");
            Err(ListenerError::new("first listener failed"))
        }));
        detector.on_frustration(Arc::new(
            |_: &FrustrationSignal| -> Result<(), ListenerError> { panic!("listener blew up") },
        ));
        let third = seen.clone();
        detector.on_frustration(Arc::new(move |signal: &FrustrationSignal| {
            third.lock().unwrap().push("third");
            assert_eq!(signal.kind, SignalKind::RepeatedError);
            Ok(())
        }));

        for i in 0..3 {
            detector.record_error(error_at(&clock, "E", T0 + i));
        }
        assert_eq!(*seen.lock().unwrap(), vec!["first", "third"]);
    }

    #[test]
    fn test_off_frustration_removes_listener() {
        let (detector, clock) = detector();
        let count = Arc::new(AtomicU64::new(0));
        let counter = count.clone();
        let id = detector.on_frustration(Arc::new(move |_: &FrustrationSignal| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        assert!(detector.off_frustration(id));
        assert!(!detector.off_frustration(id));

        for i in 0..3 {
            detector.record_error(error_at(&clock, "E", T0 + i));
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_signals_are_persisted() {
        let clock = Arc::new(ManualClock::new(Timestamp(T0)));
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let detector = SignalDetector::new(DetectorConfig::default(), clock.clone())
            .with_persistence(store.clone());
        detector.start_monitoring();

        for i in 0..3 {
            detector.record_error(error_at(&clock, "E", T0 + i));
        }
        let recent = store.recent_frustration_signals(10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].signal.kind, SignalKind::RepeatedError);
    }

    #[test]
    fn test_stop_monitoring_ignores_events() {
        let (detector, clock) = detector();
        detector.record_error(error_at(&clock, "E", T0));
        detector.record_error(error_at(&clock, "E", T0 + 1));
        detector.stop_monitoring();
        assert!(!detector.is_monitoring());
        assert!(detector.record_error(error_at(&clock, "E", T0 + 2)).is_none());
    }
}
