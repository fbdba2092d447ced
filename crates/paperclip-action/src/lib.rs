//! Action execution for Paperclip.
//!
//! Routes file, terminal, and browser actions through pluggable
//! capabilities, snapshotting reversible actions so failures can be
//! rolled back.

pub mod capability;
pub mod error;
pub mod orchestrator;
pub mod rollback;

pub use capability::{
    BrowserCapability, BrowserOutput, Capabilities, CommandOutput, FileReadOutput,
    FileWriteOutput, FilesystemCapability, LocalFilesystem, LocalTerminal, SystemBrowser,
    TerminalCapability,
};
pub use error::{ActionError, CapabilityError};
pub use orchestrator::{ActionOrchestrator, CapabilityKind};
pub use rollback::{RollbackProcedure, RollbackSnapshot, RollbackTable, SnapshotData};
