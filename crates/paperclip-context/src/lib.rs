//! Paperclip Context crate - what is the user doing right now.
//!
//! Classifies free text into a task category, keeps the ordered log of
//! captured contexts, parses browser window titles, and polls the platform
//! for the focused window.

pub mod classifier;
pub mod monitor;
pub mod store;
pub mod title_parser;

pub use classifier::{Classification, IntentClassifier};
pub use monitor::{platform_provider, ActiveWindowProvider, WindowInfo, WindowMonitor};
pub use store::ContextStore;
pub use title_parser::{ParsedTitle, TitleParser};
