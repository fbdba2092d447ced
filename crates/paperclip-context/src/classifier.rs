//! Regex-based task intent classification.
//!
//! Each classifiable category owns a short ordered list of patterns. The
//! text blob `"{app} {title} {content}"` scores one point per matching
//! pattern; the highest score wins, earlier categories win ties, and a best
//! score of zero means `unknown`.

use regex::Regex;

use paperclip_core::TaskCategory;

/// Result of classifying one piece of context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub intent: TaskCategory,
    /// matches / patterns for the winning category, 0.0 for `unknown`.
    pub confidence: f64,
}

impl Classification {
    pub const UNKNOWN: Classification = Classification {
        intent: TaskCategory::Unknown,
        confidence: 0.0,
    };
}

/// Compiled pattern sets for every classifiable category, built once.
pub struct IntentClassifier {
    categories: Vec<(TaskCategory, Vec<Regex>)>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    pub fn new() -> Self {
        let categories = TaskCategory::CLASSIFIABLE
            .iter()
            .map(|&category| {
                let regexes = patterns_for(category)
                    .iter()
                    .map(|pat| Regex::new(pat).expect("Invalid intent regex"))
                    .collect();
                (category, regexes)
            })
            .collect();
        Self { categories }
    }

    /// Classify application name, window title and visible content together.
    pub fn classify(&self, app: &str, title: &str, content: &str) -> Classification {
        let text = format!("{} {} {}", app, title, content);

        let mut best = Classification::UNKNOWN;
        let mut best_score = 0;
        for (category, patterns) in &self.categories {
            let score = patterns.iter().filter(|re| re.is_match(&text)).count();
            // Strictly greater: the first declared category keeps a tie.
            if score > best_score {
                best_score = score;
                best = Classification {
                    intent: *category,
                    confidence: (score as f64 / patterns.len() as f64).min(1.0),
                };
            }
        }
        best
    }

    /// Number of patterns behind `category`. Zero for `unknown`.
    pub fn pattern_count(&self, category: TaskCategory) -> usize {
        self.categories
            .iter()
            .find(|(c, _)| *c == category)
            .map_or(0, |(_, patterns)| patterns.len())
    }
}

fn patterns_for(category: TaskCategory) -> &'static [&'static str] {
    match category {
        // Mail client or keyword, then a compose/reply action.
        TaskCategory::WritingEmail => &[r"(?i)outlook|gmail|mail", r"(?i)compose|reply"],
        // Error vocabulary, then an IDE.
        TaskCategory::DebuggingCode => &[r"(?i)debug|error|exception", r"(?i)vscode|intellij"],
        // File manager, then a file operation verb.
        TaskCategory::FileManagement => &[r"(?i)explorer|finder|files", r"(?i)copy|move|delete"],
        // Browser name, then a URL scheme.
        TaskCategory::WebBrowsing => &[r"(?i)chrome|firefox|safari", r"(?i)http:|https:"],
        // Document app, then a document extension.
        TaskCategory::DocumentEditing => &[r"(?i)word|docs|notion", r"(?i)\.docx|\.md"],
        TaskCategory::Unknown => &[],
    }
}
