use thiserror::Error;

/// Top-level error type for the paperclip engine.
///
/// Subsystem crates define their own error types and convert into this one
/// where they cross crate boundaries, so `?` works throughout.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PaperclipError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Capability error: {0}")]
    Capability(String),

    #[error("Window monitor error: {0}")]
    Monitor(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl From<toml::de::Error> for PaperclipError {
    fn from(err: toml::de::Error) -> Self {
        PaperclipError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for PaperclipError {
    fn from(err: toml::ser::Error) -> Self {
        PaperclipError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for PaperclipError {
    fn from(err: serde_json::Error) -> Self {
        PaperclipError::Serialization(err.to_string())
    }
}

/// Failure reported by an event listener.
///
/// Dispatchers log these and carry on with the remaining listeners.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ListenerError(pub String);

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<PaperclipError> for ListenerError {
    fn from(err: PaperclipError) -> Self {
        Self(err.to_string())
    }
}

/// A specialized `Result` type for paperclip operations.
pub type Result<T> = std::result::Result<T, PaperclipError>;
