//! Paperclip engine: the event bus and the coordinator that wires the
//! detector, context store, orchestrator, and response generator together.

pub mod bus;
pub mod coordinator;

pub use bus::{EventBus, EventListener};
pub use coordinator::{Coordinator, ExecutedAction, Intervention, PLACEHOLDER_WINDOW_TITLE};
