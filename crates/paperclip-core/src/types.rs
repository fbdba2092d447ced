use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// Newtype Wrappers - Temporal
// =============================================================================

/// Unix timestamp in milliseconds since epoch.
///
/// Compared by value. Two Timestamps with the same inner value are equal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.0).unwrap_or_default()
    }

    /// Milliseconds elapsed from `earlier` to `self`. Negative if `earlier` is later.
    pub fn millis_since(&self, earlier: Timestamp) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    /// The timestamp `millis` before this one.
    pub fn minus_millis(&self, millis: i64) -> Timestamp {
        Timestamp(self.0.saturating_sub(millis))
    }

    pub fn plus_millis(&self, millis: i64) -> Timestamp {
        Timestamp(self.0.saturating_add(millis))
    }
}

// =============================================================================
// Behaviour Signals
// =============================================================================

/// Kind of frustration signal raised by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    RepeatedError,
    RapidDeletion,
    IdleAfterError,
    RageClick,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::RepeatedError => write!(f, "repeated_error"),
            SignalKind::RapidDeletion => write!(f, "rapid_deletion"),
            SignalKind::IdleAfterError => write!(f, "idle_after_error"),
            SignalKind::RageClick => write!(f, "rage_click"),
        }
    }
}

impl std::str::FromStr for SignalKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "repeated_error" => Ok(SignalKind::RepeatedError),
            "rapid_deletion" => Ok(SignalKind::RapidDeletion),
            "idle_after_error" => Ok(SignalKind::IdleAfterError),
            "rage_click" => Ok(SignalKind::RageClick),
            _ => Err(format!("Unknown signal kind: {}", s)),
        }
    }
}

/// An error observed in some application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub message: String,
    pub timestamp: Timestamp,
    pub application: String,
}

impl ErrorEvent {
    pub fn new(message: impl Into<String>, application: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            message: message.into(),
            timestamp,
            application: application.into(),
        }
    }
}

/// A burst of deleted characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionEvent {
    pub characters_deleted: u32,
    pub timestamp: Timestamp,
}

impl DeletionEvent {
    pub fn new(characters_deleted: u32, timestamp: Timestamp) -> Self {
        Self {
            characters_deleted,
            timestamp,
        }
    }
}

/// A detected behavioural signal of user difficulty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrustrationSignal {
    pub kind: SignalKind,
    pub timestamp: Timestamp,
    pub application_context: String,
    /// Range: 0.0 to 1.0.
    pub severity: f64,
}

// =============================================================================
// Task Context
// =============================================================================

/// What the user appears to be doing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    WritingEmail,
    DebuggingCode,
    FileManagement,
    WebBrowsing,
    DocumentEditing,
    #[default]
    Unknown,
}

impl TaskCategory {
    /// Classifiable categories in declaration order. Order decides score ties.
    pub const CLASSIFIABLE: [TaskCategory; 5] = [
        TaskCategory::WritingEmail,
        TaskCategory::DebuggingCode,
        TaskCategory::FileManagement,
        TaskCategory::WebBrowsing,
        TaskCategory::DocumentEditing,
    ];
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskCategory::WritingEmail => write!(f, "writing_email"),
            TaskCategory::DebuggingCode => write!(f, "debugging_code"),
            TaskCategory::FileManagement => write!(f, "file_management"),
            TaskCategory::WebBrowsing => write!(f, "web_browsing"),
            TaskCategory::DocumentEditing => write!(f, "document_editing"),
            TaskCategory::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for TaskCategory {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "writing_email" => Ok(TaskCategory::WritingEmail),
            "debugging_code" => Ok(TaskCategory::DebuggingCode),
            "file_management" => Ok(TaskCategory::FileManagement),
            "web_browsing" => Ok(TaskCategory::WebBrowsing),
            "document_editing" => Ok(TaskCategory::DocumentEditing),
            "unknown" => Ok(TaskCategory::Unknown),
            _ => Err(format!("Unknown task category: {}", s)),
        }
    }
}

/// Browser family recognised from a window title or process name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserType {
    Chrome,
    Firefox,
    Edge,
    #[default]
    Unknown,
}

impl BrowserType {
    /// Human-readable browser name.
    pub fn display_name(&self) -> &'static str {
        match self {
            BrowserType::Chrome => "Google Chrome",
            BrowserType::Firefox => "Mozilla Firefox",
            BrowserType::Edge => "Microsoft Edge",
            BrowserType::Unknown => "Unknown Browser",
        }
    }
}

impl fmt::Display for BrowserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserType::Chrome => write!(f, "chrome"),
            BrowserType::Firefox => write!(f, "firefox"),
            BrowserType::Edge => write!(f, "edge"),
            BrowserType::Unknown => write!(f, "unknown"),
        }
    }
}

/// The focused window as last reported by the window monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserContextInfo {
    pub page_title: String,
    pub browser_type: BrowserType,
    pub application_name: String,
    pub process_name: String,
    pub timestamp: Timestamp,
}

/// A captured snapshot of what the user is doing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskContext {
    pub id: Uuid,
    pub timestamp: Timestamp,
    pub active_application: String,
    pub window_title: String,
    pub visible_content: String,
    pub inferred_intent: TaskCategory,
    /// Range: 0.0 to 1.0. Always 0.0 when `inferred_intent` is `Unknown`.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_context: Option<BrowserContextInfo>,
}

impl TaskContext {
    /// An empty context with a nil id, used when a lookup misses.
    pub fn empty(timestamp: Timestamp) -> Self {
        Self {
            id: Uuid::nil(),
            timestamp,
            active_application: String::new(),
            window_title: String::new(),
            visible_content: String::new(),
            inferred_intent: TaskCategory::Unknown,
            confidence: 0.0,
            browser_context: None,
        }
    }
}

// =============================================================================
// Actions
// =============================================================================

/// Action types routed to a backing capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    FileRead,
    FileWrite,
    TerminalExecute,
    BrowserOpen,
    GenerateText,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::FileRead => write!(f, "file_read"),
            ActionType::FileWrite => write!(f, "file_write"),
            ActionType::TerminalExecute => write!(f, "terminal_execute"),
            ActionType::BrowserOpen => write!(f, "browser_open"),
            ActionType::GenerateText => write!(f, "generate_text"),
        }
    }
}

impl std::str::FromStr for ActionType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file_read" => Ok(ActionType::FileRead),
            "file_write" => Ok(ActionType::FileWrite),
            "terminal_execute" => Ok(ActionType::TerminalExecute),
            "browser_open" => Ok(ActionType::BrowserOpen),
            "generate_text" => Ok(ActionType::GenerateText),
            _ => Err(format!("Unknown action type: {}", s)),
        }
    }
}

/// Parameters passed with an action request.
pub type ActionParameters = serde_json::Map<String, serde_json::Value>;

/// A request to perform one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub id: Uuid,
    pub action_type: ActionType,
    #[serde(default)]
    pub parameters: ActionParameters,
    pub context_id: Uuid,
}

impl ActionRequest {
    /// A request with a fresh id and no parameters.
    pub fn new(action_type: ActionType, context_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            action_type,
            parameters: ActionParameters::new(),
            context_id,
        }
    }

    pub fn with_parameter(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    /// String parameter lookup.
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(|v| v.as_str())
    }
}

/// Outcome of one action request. Produced exactly once per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub action_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub rollback_available: bool,
}

impl ActionResult {
    pub fn succeeded(action_id: Uuid, output: serde_json::Value, rollback_available: bool) -> Self {
        Self {
            success: true,
            action_id,
            output: Some(output),
            error: None,
            rollback_available,
        }
    }

    pub fn failed(action_id: Uuid, error: String, rollback_available: bool) -> Self {
        Self {
            success: false,
            action_id,
            output: None,
            error: Some(error),
            rollback_available,
        }
    }
}

// =============================================================================
// Assistant Messages
// =============================================================================

/// Animation the overlay plays alongside a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Animation {
    Idle,
    Thinking,
    Excited,
    Apologetic,
    Proud,
    Wave,
}

/// A user-facing message produced by the response generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub id: Uuid,
    pub text: String,
    pub animation: Animation,
    pub duration_ms: u64,
}

// =============================================================================
// Tests
// =============================================================================
