//! Fixed wiring from frustration signal to assistant message.
//!
//! ```text
//! detector signal ─▶ frustration_detected ─▶ capture + store context
//!                 ─▶ context_ready ─▶ (queued) execute first available action
//!                 ─▶ action_executed ─▶ generate response ─▶ message_ready
//! ```
//!
//! Every step is a listener registered at construction: one on the
//! detector and three on the [`EventBus`]. The synchronous steps run inside
//! `emit`, so an event emitted by anyone (including a nested emit from
//! another listener) drives the rest of the chain. The action step is
//! asynchronous, so `context_ready` only queues the context;
//! [`Coordinator::process_pending`] executes queued contexts one at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use paperclip_action::{ActionOrchestrator, Capabilities};
use paperclip_context::ContextStore;
use paperclip_core::error::ListenerError;
use paperclip_core::{
    ActionRequest, ActionResult, AssistantMessage, BrowserContextInfo, Clock, DeletionEvent,
    DomainEvent, ErrorEvent, EventKind, FrustrationSignal, ListenerId, PaperclipConfig,
    Persistence, TaskContext,
};
use paperclip_response::ResponseGenerator;
use paperclip_signal::SignalDetector;

use crate::bus::{EventBus, EventListener};

/// Window title recorded for contexts captured in response to a signal.
pub const PLACEHOLDER_WINDOW_TITLE: &str = "Unknown Window";

/// An action run for one `context_ready` event.
#[derive(Debug, Clone)]
pub struct ExecutedAction {
    pub context: TaskContext,
    pub result: ActionResult,
}

/// Everything one signal set in motion.
#[derive(Debug, Clone)]
pub struct Intervention {
    pub signal: FrustrationSignal,
    pub actions: Vec<ExecutedAction>,
}

pub struct Coordinator {
    bus: Arc<EventBus>,
    detector: Arc<SignalDetector>,
    contexts: Arc<ContextStore>,
    orchestrator: Arc<ActionOrchestrator>,
    responses: Arc<ResponseGenerator>,
    clock: Arc<dyn Clock>,
    running: AtomicBool,
    detector_listener: ListenerId,
    /// Contexts waiting for the action step. Holding the lock serialises chains.
    pending: AsyncMutex<mpsc::UnboundedReceiver<TaskContext>>,
}

impl Coordinator {
    pub fn new(
        detector: Arc<SignalDetector>,
        contexts: Arc<ContextStore>,
        orchestrator: Arc<ActionOrchestrator>,
        responses: Arc<ResponseGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let bus = Arc::new(EventBus::new());
        let (pending_tx, pending_rx) = mpsc::unbounded_channel();

        let detector_listener = {
            let bus = bus.clone();
            let clock = clock.clone();
            detector.on_frustration(Arc::new(move |signal: &FrustrationSignal| {
                bus.emit(DomainEvent::FrustrationDetected {
                    signal: signal.clone(),
                    timestamp: clock.now(),
                });
                Ok(())
            }))
        };

        bus.subscribe(
            EventKind::FrustrationDetected,
            capture_step(contexts.clone(), clock.clone()),
        );
        bus.subscribe(
            EventKind::ContextReady,
            Arc::new(move |event: &DomainEvent, _: &EventBus| {
                let DomainEvent::ContextReady { context, .. } = event else {
                    return Ok(());
                };
                pending_tx
                    .send(context.clone())
                    .map_err(|_| ListenerError::new("Action queue closed"))
            }),
        );
        bus.subscribe(
            EventKind::ActionExecuted,
            response_step(contexts.clone(), responses.clone(), clock.clone()),
        );

        Self {
            bus,
            detector,
            contexts,
            orchestrator,
            responses,
            clock,
            running: AtomicBool::new(false),
            detector_listener,
            pending: AsyncMutex::new(pending_rx),
        }
    }

    /// Build every component from `config`, sharing one persistence backend
    /// when given.
    pub fn from_config(
        config: &PaperclipConfig,
        capabilities: Capabilities,
        persistence: Option<Arc<dyn Persistence>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut detector = SignalDetector::new(config.detector.clone(), clock.clone());
        let mut contexts = ContextStore::new(config.context.clone(), clock.clone());
        let mut orchestrator =
            ActionOrchestrator::new(capabilities, config.actions.clone(), clock.clone());
        if let Some(persistence) = persistence {
            detector = detector.with_persistence(persistence.clone());
            contexts = contexts.with_persistence(persistence.clone());
            orchestrator = orchestrator.with_persistence(persistence);
        }
        Self::new(
            Arc::new(detector),
            Arc::new(contexts),
            Arc::new(orchestrator),
            Arc::new(ResponseGenerator::new()),
            clock,
        )
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Turn on monitoring. The first start also emits the introduction.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.detector.start_monitoring();
        if !self.responses.has_shown_introduction() {
            let message = self.responses.generate_introduction();
            self.bus.emit(DomainEvent::MessageReady {
                message,
                timestamp: self.clock.now(),
            });
        }
        info!("Coordinator started");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.detector.stop_monitoring();
        info!("Coordinator stopped");
    }

    /// Stop and cancel any in-flight terminal command.
    pub fn shutdown(&self) {
        self.stop();
        self.orchestrator.shutdown();
        info!("Coordinator shut down");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Inputs
    // =========================================================================

    /// Feed an error event; runs the full chain if it raises a signal.
    pub async fn record_error(&self, event: ErrorEvent) -> Option<Intervention> {
        let signal = self.detector.record_error(event)?;
        Some(self.complete(signal).await)
    }

    /// Feed a deletion event; runs the full chain if it raises a signal.
    pub async fn record_deletion(&self, event: DeletionEvent) -> Option<Intervention> {
        let signal = self.detector.record_deletion(event)?;
        Some(self.complete(signal).await)
    }

    pub fn record_productive_activity(&self) {
        self.detector.record_productive_activity();
    }

    /// Easter-egg reply for free-form user input, if it triggers one.
    pub fn process_user_input(&self, input: &str) -> Option<AssistantMessage> {
        self.responses.handle_easter_egg(input)
    }

    /// Store the focused window's details and announce the change.
    pub fn update_browser_context(&self, context: BrowserContextInfo) {
        self.contexts.update_browser_context(context.clone());
        self.bus.emit(DomainEvent::UiUpdate {
            browser_context: context,
            timestamp: self.clock.now(),
        });
    }

    // =========================================================================
    // Chain
    // =========================================================================

    /// Run the chain for a signal raised outside the detector.
    pub async fn handle_signal(&self, signal: FrustrationSignal) -> Intervention {
        self.bus.emit(DomainEvent::FrustrationDetected {
            signal: signal.clone(),
            timestamp: self.clock.now(),
        });
        self.complete(signal).await
    }

    async fn complete(&self, signal: FrustrationSignal) -> Intervention {
        Intervention {
            signal,
            actions: self.process_pending().await,
        }
    }

    /// Execute every queued context, including any queued while running.
    pub async fn process_pending(&self) -> Vec<ExecutedAction> {
        let mut pending = self.pending.lock().await;
        let mut executed = Vec::new();
        while let Ok(context) = pending.try_recv() {
            if let Some(result) = self.act_on(&context).await {
                executed.push(ExecutedAction { context, result });
            }
        }
        executed
    }

    /// Execute the first action offered for `context`, with no parameters.
    async fn act_on(&self, context: &TaskContext) -> Option<ActionResult> {
        let action_type = *self.orchestrator.available_actions(context).first()?;
        let request = ActionRequest::new(action_type, context.id);
        debug!(action_type = %action_type, context_id = %context.id, "Executing action for context");

        let result = self.orchestrator.execute(request).await;
        self.bus.emit(DomainEvent::ActionExecuted {
            result: result.clone(),
            timestamp: self.clock.now(),
        });
        Some(result)
    }

    // =========================================================================
    // Subscriptions and components
    // =========================================================================

    pub fn subscribe(&self, kind: EventKind, listener: EventListener) -> ListenerId {
        self.bus.subscribe(kind, listener)
    }

    pub fn unsubscribe(&self, kind: EventKind, id: ListenerId) -> bool {
        self.bus.unsubscribe(kind, id)
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn detector(&self) -> &Arc<SignalDetector> {
        &self.detector
    }

    pub fn contexts(&self) -> &Arc<ContextStore> {
        &self.contexts
    }

    pub fn orchestrator(&self) -> &Arc<ActionOrchestrator> {
        &self.orchestrator
    }

    pub fn responses(&self) -> &Arc<ResponseGenerator> {
        &self.responses
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.detector.off_frustration(self.detector_listener);
    }
}

/// `frustration_detected`: capture and store a context, then announce it.
fn capture_step(contexts: Arc<ContextStore>, clock: Arc<dyn Clock>) -> EventListener {
    Arc::new(move |event: &DomainEvent, bus: &EventBus| {
        let DomainEvent::FrustrationDetected { signal, .. } = event else {
            return Ok(());
        };
        let context =
            contexts.capture_context(&signal.application_context, PLACEHOLDER_WINDOW_TITLE, "");
        contexts.store_context(context.clone());
        bus.emit(DomainEvent::ContextReady {
            context,
            timestamp: clock.now(),
        });
        Ok(())
    })
}

/// `action_executed`: generate the reply and announce it.
fn response_step(
    contexts: Arc<ContextStore>,
    responses: Arc<ResponseGenerator>,
    clock: Arc<dyn Clock>,
) -> EventListener {
    Arc::new(move |event: &DomainEvent, bus: &EventBus| {
        let DomainEvent::ActionExecuted { result, .. } = event else {
            return Ok(());
        };
        // Looked up by action id; contexts are keyed by their own id, so
        // this usually falls back to the empty context.
        let context = contexts
            .get_context_by_id(result.action_id)
            .unwrap_or_else(|| TaskContext::empty(clock.now()));
        let message = responses.generate_response(result, &context);
        bus.emit(DomainEvent::MessageReady {
            message,
            timestamp: clock.now(),
        });
        Ok(())
    })
}
