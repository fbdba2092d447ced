//! In-memory context snapshot store.
//!
//! Contexts are appended in call order and kept for the lifetime of the
//! store (or until `clear_history`). A single browser-context slot, written
//! by the window monitor, is copied into every newly captured context.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};
use uuid::Uuid;

use paperclip_core::config::ContextConfig;
use paperclip_core::{BrowserContextInfo, Clock, Persistence, TaskCategory, TaskContext, Timestamp};

use crate::classifier::IntentClassifier;

const MILLIS_PER_HOUR: i64 = 3_600_000;

pub struct ContextStore {
    config: ContextConfig,
    classifier: IntentClassifier,
    clock: Arc<dyn Clock>,
    persistence: Option<Arc<dyn Persistence>>,
    history: Mutex<Vec<TaskContext>>,
    browser_context: Mutex<Option<BrowserContextInfo>>,
}

impl ContextStore {
    pub fn new(config: ContextConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            classifier: IntentClassifier::new(),
            clock,
            persistence: None,
            history: Mutex::new(Vec::new()),
            browser_context: Mutex::new(None),
        }
    }

    /// Forward stored contexts to `persistence`.
    pub fn with_persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    fn history(&self) -> MutexGuard<'_, Vec<TaskContext>> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn slot(&self) -> MutexGuard<'_, Option<BrowserContextInfo>> {
        self.browser_context.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Default horizon for recurring-pattern queries.
    pub fn recurring_hours(&self) -> u32 {
        self.config.recurring_hours
    }

    // =========================================================================
    // Capture
    // =========================================================================

    /// Build a classified context with a fresh id. Does not store it.
    pub fn capture_context(&self, app: &str, title: &str, content: &str) -> TaskContext {
        let classification = self.classifier.classify(app, title, content);
        let context = TaskContext {
            id: Uuid::new_v4(),
            timestamp: self.clock.now(),
            active_application: app.to_string(),
            window_title: title.to_string(),
            visible_content: content.to_string(),
            inferred_intent: classification.intent,
            confidence: classification.confidence,
            browser_context: self.slot().clone(),
        };
        debug!(
            id = %context.id,
            intent = %context.inferred_intent,
            confidence = context.confidence,
            "Context captured"
        );
        context
    }

    /// Re-run classification over an existing context's text.
    pub fn infer_intent(&self, context: &TaskContext) -> TaskCategory {
        self.classifier
            .classify(
                &context.active_application,
                &context.window_title,
                &context.visible_content,
            )
            .intent
    }

    /// Append to the history and forward to persistence (best-effort).
    pub fn store_context(&self, context: TaskContext) {
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.save_context_snapshot(&context) {
                warn!(error = %e, id = %context.id, "Failed to persist context snapshot");
            }
        }
        self.history().push(context);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn cutoff(&self, hours: u32) -> Timestamp {
        self.clock
            .now()
            .minus_millis(i64::from(hours).saturating_mul(MILLIS_PER_HOUR))
    }

    /// Whether at least `recurring_threshold` stored contexts with `intent`
    /// fall inside the last `hours` hours. `unknown` is counted like any
    /// other category here.
    pub fn is_recurring_pattern(&self, intent: TaskCategory, hours: u32) -> bool {
        let cutoff = self.cutoff(hours);
        let count = self
            .history()
            .iter()
            .filter(|c| c.inferred_intent == intent && c.timestamp >= cutoff)
            .count();
        count >= self.config.recurring_threshold
    }

    /// Every in-window context belonging to a recurring intent group,
    /// excluding `unknown`. Groups appear in order of first occurrence.
    pub fn recurring_patterns(&self, hours: u32) -> Vec<TaskContext> {
        let cutoff = self.cutoff(hours);
        let history = self.history();

        let mut groups: Vec<(TaskCategory, Vec<&TaskContext>)> = Vec::new();
        for context in history.iter().filter(|c| c.timestamp >= cutoff) {
            match groups.iter_mut().find(|(intent, _)| *intent == context.inferred_intent) {
                Some((_, members)) => members.push(context),
                None => groups.push((context.inferred_intent, vec![context])),
            }
        }

        groups
            .into_iter()
            .filter(|(intent, members)| {
                *intent != TaskCategory::Unknown && members.len() >= self.config.recurring_threshold
            })
            .flat_map(|(_, members)| members.into_iter().cloned())
            .collect()
    }

    pub fn get_context_by_id(&self, id: Uuid) -> Option<TaskContext> {
        self.history().iter().find(|c| c.id == id).cloned()
    }

    /// Ids of every stored context, in insertion order.
    pub fn all_context_ids(&self) -> Vec<Uuid> {
        self.history().iter().map(|c| c.id).collect()
    }

    pub fn len(&self) -> usize {
        self.history().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history().is_empty()
    }

    /// Empty the history. The browser-context slot is left alone.
    pub fn clear_history(&self) {
        self.history().clear();
    }

    // =========================================================================
    // Browser context slot
    // =========================================================================

    pub fn update_browser_context(&self, context: BrowserContextInfo) {
        *self.slot() = Some(context);
    }

    pub fn browser_context(&self) -> Option<BrowserContextInfo> {
        self.slot().clone()
    }

    pub fn clear_browser_context(&self) {
        *self.slot() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use paperclip_core::{BrowserType, ManualClock};
    use paperclip_storage::SqliteStore;

    const T0: i64 = 1_700_000_000_000;

    fn store() -> (ContextStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Timestamp(T0)));
        (ContextStore::new(ContextConfig::default(), clock.clone()), clock)
    }

    fn chrome_context() -> BrowserContextInfo {
        BrowserContextInfo {
            page_title: "Example Domain".to_string(),
            browser_type: BrowserType::Chrome,
            application_name: "Google Chrome".to_string(),
            process_name: "chrome.exe".to_string(),
            timestamp: Timestamp(T0),
        }
    }

    fn capture_and_store(store: &ContextStore, app: &str, title: &str) -> TaskContext {
        let context = store.capture_context(app, title, "");
        store.store_context(context.clone());
        context
    }

    #[test]
    fn test_capture_classifies_and_stamps() {
        let (store, _clock) = store();
        let context = store.capture_context("chrome", "Example Domain - Google Chrome", "");
        assert_eq!(context.inferred_intent, TaskCategory::WebBrowsing);
        assert_eq!(context.timestamp, Timestamp(T0));
        assert!(context.browser_context.is_none());
        assert!(store.is_empty(), "capture must not store");
    }

    #[test]
    fn test_capture_copies_browser_context() {
        let (store, _clock) = store();
        store.update_browser_context(chrome_context());
        let context = store.capture_context("chrome", "x", "");
        assert_eq!(context.browser_context, Some(chrome_context()));
    }

    #[test]
    fn test_ids_are_unique() {
        let (store, _clock) = store();
        for i in 0..50 {
            capture_and_store(&store, "app", &format!("window {}", i));
        }
        let ids = store.all_context_ids();
        assert_eq!(ids.len(), 50);
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 50);
    }

    #[test]
    fn test_get_context_by_id() {
        let (store, _clock) = store();
        let context = capture_and_store(&store, "Outlook", "Reply");
        assert_eq!(store.get_context_by_id(context.id), Some(context));
        assert!(store.get_context_by_id(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_infer_intent_matches_capture() {
        let (store, _clock) = store();
        let context = store.capture_context("vscode", "debug session", "");
        assert_eq!(store.infer_intent(&context), context.inferred_intent);
    }

    #[test]
    fn test_is_recurring_pattern_threshold() {
        let (store, _clock) = store();
        capture_and_store(&store, "Outlook", "Compose");
        capture_and_store(&store, "Gmail", "Reply");
        assert!(!store.is_recurring_pattern(TaskCategory::WritingEmail, 24));
        capture_and_store(&store, "Mail", "Reply all");
        assert!(store.is_recurring_pattern(TaskCategory::WritingEmail, 24));
        assert!(!store.is_recurring_pattern(TaskCategory::WebBrowsing, 24));
    }

    #[test]
    fn test_is_recurring_pattern_counts_unknown() {
        let (store, _clock) = store();
        for _ in 0..3 {
            capture_and_store(&store, "calculator", "");
        }
        assert!(store.is_recurring_pattern(TaskCategory::Unknown, 24));
        assert!(store.recurring_patterns(24).is_empty());
    }

    #[test]
    fn test_recurring_pattern_respects_horizon() {
        let (store, clock) = store();
        for _ in 0..3 {
            capture_and_store(&store, "Outlook", "Compose");
        }
        clock.advance(2 * MILLIS_PER_HOUR + 1);
        assert!(store.is_recurring_pattern(TaskCategory::WritingEmail, 3));
        assert!(!store.is_recurring_pattern(TaskCategory::WritingEmail, 2));
    }

    #[test]
    fn test_recurring_patterns_groups_in_first_occurrence_order() {
        let (store, _clock) = store();
        let a = capture_and_store(&store, "chrome", "https://a");
        let b = capture_and_store(&store, "Outlook", "Compose");
        let c = capture_and_store(&store, "chrome", "https://b");
        let d = capture_and_store(&store, "Outlook", "Reply");
        let e = capture_and_store(&store, "chrome", "https://c");
        let f = capture_and_store(&store, "Outlook", "Reply");
        capture_and_store(&store, "Finder", "Copy");

        let ids: Vec<Uuid> = store.recurring_patterns(24).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![a.id, c.id, e.id, b.id, d.id, f.id]);
    }

    #[test]
    fn test_clear_history_keeps_browser_slot() {
        let (store, _clock) = store();
        store.update_browser_context(chrome_context());
        capture_and_store(&store, "a", "b");
        store.clear_history();
        assert!(store.is_empty());
        assert_eq!(store.browser_context(), Some(chrome_context()));

        store.clear_browser_context();
        assert!(store.browser_context().is_none());
    }

    #[test]
    fn test_browser_slot_last_write_wins() {
        let (store, _clock) = store();
        store.update_browser_context(chrome_context());
        let mut other = chrome_context();
        other.page_title = "Second".to_string();
        store.update_browser_context(other.clone());
        assert_eq!(store.browser_context(), Some(other));
    }

    #[test]
    fn test_store_forwards_to_persistence() {
        let clock = Arc::new(ManualClock::new(Timestamp::now()));
        let persistence = Arc::new(SqliteStore::in_memory().unwrap());
        let store = ContextStore::new(ContextConfig::default(), clock)
            .with_persistence(persistence.clone());

        let context = capture_and_store(&store, "Notion", "spec.md");
        let stored = persistence.get_context_snapshot(context.id).unwrap().unwrap();
        assert_eq!(stored.context, context);
    }
}
