//! Window title parsing for browser detection.
//!
//! Browsers append their own name to the page title ("Example Domain -
//! Google Chrome"). The parser recognises Chrome, Firefox and Edge by
//! process name first and title suffix second, strips the suffix, and
//! derives an application name for everything else.

use regex::Regex;

use paperclip_core::BrowserType;

/// Structured view of a window title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTitle {
    pub page_title: String,
    pub browser_type: BrowserType,
    pub application_name: String,
}

/// Title-suffix patterns, matched in order.
const SUFFIX_PATTERNS: &[(&str, BrowserType)] = &[
    (r"(?i)\s*-\s*Google Chrome$", BrowserType::Chrome),
    (r"(?i)\s*—\s*Mozilla Firefox$", BrowserType::Firefox),
    (r"(?i)\s*-\s*Mozilla Firefox$", BrowserType::Firefox),
    (r"(?i)\s*-\s*Microsoft Edge$", BrowserType::Edge),
];

const BROWSER_PROCESSES: &[(&str, BrowserType)] = &[
    ("chrome", BrowserType::Chrome),
    ("chrome.exe", BrowserType::Chrome),
    ("firefox", BrowserType::Firefox),
    ("firefox.exe", BrowserType::Firefox),
    ("msedge", BrowserType::Edge),
    ("msedge.exe", BrowserType::Edge),
];

pub struct TitleParser {
    suffixes: Vec<(Regex, BrowserType)>,
}

impl Default for TitleParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TitleParser {
    pub fn new() -> Self {
        let suffixes = SUFFIX_PATTERNS
            .iter()
            .map(|(pat, browser)| (Regex::new(pat).expect("Invalid title regex"), *browser))
            .collect();
        Self { suffixes }
    }

    /// Browser family from the process name, falling back to the title suffix.
    pub fn detect_browser(&self, window_title: &str, process_name: &str) -> BrowserType {
        let process = process_name.to_lowercase();
        if let Some((_, browser)) = BROWSER_PROCESSES.iter().find(|(name, _)| *name == process) {
            return *browser;
        }

        self.suffixes
            .iter()
            .find(|(re, _)| re.is_match(window_title))
            .map_or(BrowserType::Unknown, |(_, browser)| *browser)
    }

    /// The title without the browser's own suffix.
    pub fn extract_page_title(&self, window_title: &str, browser_type: BrowserType) -> String {
        if browser_type == BrowserType::Unknown || window_title.is_empty() {
            return window_title.to_string();
        }

        self.suffixes
            .iter()
            .filter(|(_, browser)| *browser == browser_type)
            .find(|(re, _)| re.is_match(window_title))
            .map_or_else(
                || window_title.to_string(),
                |(re, _)| re.replace(window_title, "").trim().to_string(),
            )
    }

    /// Application name for non-browser windows.
    ///
    /// Process name without `.exe`, else the text after the last `" - "`,
    /// else the title itself, else `"Unknown"`.
    pub fn extract_application_name(&self, window_title: &str, process_name: &str) -> String {
        if !process_name.is_empty() {
            return strip_exe(process_name).to_string();
        }

        match window_title.rfind(" - ") {
            Some(index) if index > 0 => window_title[index + 3..].trim().to_string(),
            _ if !window_title.is_empty() => window_title.to_string(),
            _ => "Unknown".to_string(),
        }
    }

    pub fn parse(&self, window_title: &str, process_name: &str) -> ParsedTitle {
        let browser_type = self.detect_browser(window_title, process_name);
        let page_title = self.extract_page_title(window_title, browser_type);
        let application_name = if browser_type == BrowserType::Unknown {
            self.extract_application_name(window_title, process_name)
        } else {
            browser_type.display_name().to_string()
        };

        ParsedTitle {
            page_title,
            browser_type,
            application_name,
        }
    }
}

fn strip_exe(process_name: &str) -> &str {
    let len = process_name.len();
    if len >= 4 && process_name.is_char_boundary(len - 4)
        && process_name[len - 4..].eq_ignore_ascii_case(".exe")
    {
        &process_name[..len - 4]
    } else {
        process_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> TitleParser {
        TitleParser::new()
    }

    #[test]
    fn test_chrome_title() {
        let parsed = parser().parse("Example Domain - Google Chrome", "");
        assert_eq!(parsed.browser_type, BrowserType::Chrome);
        assert_eq!(parsed.page_title, "Example Domain");
        assert_eq!(parsed.application_name, "Google Chrome");
    }

    #[test]
    fn test_firefox_em_dash_and_hyphen() {
        let p = parser();
        let em = p.parse("Rust Docs — Mozilla Firefox", "");
        assert_eq!(em.browser_type, BrowserType::Firefox);
        assert_eq!(em.page_title, "Rust Docs");

        let hyphen = p.parse("Rust Docs - Mozilla Firefox", "");
        assert_eq!(hyphen.browser_type, BrowserType::Firefox);
        assert_eq!(hyphen.page_title, "Rust Docs");
    }

    #[test]
    fn test_edge_title() {
        let parsed = parser().parse("New tab - Microsoft Edge", "");
        assert_eq!(parsed.browser_type, BrowserType::Edge);
        assert_eq!(parsed.page_title, "New tab");
        assert_eq!(parsed.application_name, "Microsoft Edge");
    }

    #[test]
    fn test_process_name_wins_over_title() {
        let p = parser();
        assert_eq!(p.detect_browser("Some Page", "MSEDGE.EXE"), BrowserType::Edge);
        assert_eq!(
            p.detect_browser("Example - Google Chrome", "firefox"),
            BrowserType::Firefox
        );
    }

    #[test]
    fn test_page_title_kept_when_suffix_belongs_to_other_browser() {
        let title = "Example - Google Chrome";
        assert_eq!(parser().extract_page_title(title, BrowserType::Firefox), title);
    }

    #[test]
    fn test_unknown_browser_keeps_title() {
        let parsed = parser().parse("main.rs - paperclip - Visual Studio Code", "Code.exe");
        assert_eq!(parsed.browser_type, BrowserType::Unknown);
        assert_eq!(parsed.page_title, "main.rs - paperclip - Visual Studio Code");
        assert_eq!(parsed.application_name, "Code");
    }

    #[test]
    fn test_application_name_from_title() {
        let p = parser();
        assert_eq!(
            p.extract_application_name("report.docx - Word", ""),
            "Word"
        );
        assert_eq!(p.extract_application_name("Calculator", ""), "Calculator");
        assert_eq!(p.extract_application_name("", ""), "Unknown");
        assert_eq!(p.extract_application_name(" - leading", ""), " - leading");
    }

    #[test]
    fn test_strip_exe_case_insensitive() {
        assert_eq!(strip_exe("notepad.EXE"), "notepad");
        assert_eq!(strip_exe("bash"), "bash");
        assert_eq!(strip_exe("exe"), "exe");
    }
}
