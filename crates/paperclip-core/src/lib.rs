pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod persistence;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::PaperclipConfig;
pub use error::{ListenerError, PaperclipError, Result};
pub use events::{DomainEvent, EventKind, ListenerId};
pub use persistence::Persistence;
pub use types::*;
