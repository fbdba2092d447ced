use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{
    ActionResult, AssistantMessage, BrowserContextInfo, FrustrationSignal, TaskContext, Timestamp,
};

/// All domain events that flow over the coordinator's bus.
///
/// Each variant carries its concrete payload. Listeners subscribe per
/// [`EventKind`] and receive the whole event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// The signal detector raised a frustration signal.
    FrustrationDetected {
        signal: FrustrationSignal,
        timestamp: Timestamp,
    },

    /// A task context was captured and stored.
    ContextReady {
        context: TaskContext,
        timestamp: Timestamp,
    },

    /// The orchestrator finished an action (successfully or not).
    ActionExecuted {
        result: ActionResult,
        timestamp: Timestamp,
    },

    /// A user-facing message is ready for display.
    MessageReady {
        message: AssistantMessage,
        timestamp: Timestamp,
    },

    /// The focused window changed.
    UiUpdate {
        browser_context: BrowserContextInfo,
        timestamp: Timestamp,
    },
}

impl DomainEvent {
    /// Returns the timestamp of the event.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            DomainEvent::FrustrationDetected { timestamp, .. }
            | DomainEvent::ContextReady { timestamp, .. }
            | DomainEvent::ActionExecuted { timestamp, .. }
            | DomainEvent::MessageReady { timestamp, .. }
            | DomainEvent::UiUpdate { timestamp, .. } => *timestamp,
        }
    }

    /// The subscription kind this event is dispatched under.
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::FrustrationDetected { .. } => EventKind::FrustrationDetected,
            DomainEvent::ContextReady { .. } => EventKind::ContextReady,
            DomainEvent::ActionExecuted { .. } => EventKind::ActionExecuted,
            DomainEvent::MessageReady { .. } => EventKind::MessageReady,
            DomainEvent::UiUpdate { .. } => EventKind::UiUpdate,
        }
    }

    /// Returns a human-readable event name for logging.
    pub fn event_name(&self) -> &'static str {
        self.kind().as_str()
    }
}

/// Payload-free discriminant of [`DomainEvent`], used as a subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    FrustrationDetected,
    ContextReady,
    ActionExecuted,
    MessageReady,
    UiUpdate,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::FrustrationDetected,
        EventKind::ContextReady,
        EventKind::ActionExecuted,
        EventKind::MessageReady,
        EventKind::UiUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::FrustrationDetected => "frustration_detected",
            EventKind::ContextReady => "context_ready",
            EventKind::ActionExecuted => "action_executed",
            EventKind::MessageReady => "message_ready",
            EventKind::UiUpdate => "ui_update",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown event kind: {}", s))
    }
}

/// Handle returned when registering a listener, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}
