//! Active-window polling.
//!
//! A [`WindowMonitor`] asks an [`ActiveWindowProvider`] for the focused
//! window on a fixed interval and reports title changes as
//! [`BrowserContextInfo`]. The loop is independent of the event bus: a
//! failed poll is logged and the next tick runs regardless.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use paperclip_core::config::MonitorConfig;
use paperclip_core::{BrowserContextInfo, PaperclipError, Result, Timestamp};

use crate::title_parser::TitleParser;

/// The focused window as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub title: String,
    pub process_name: String,
    pub timestamp: Timestamp,
}

/// Platform hook for reading the focused window.
#[async_trait]
pub trait ActiveWindowProvider: Send + Sync {
    /// Human-readable provider name for logging.
    fn platform_name(&self) -> &'static str;

    /// Whether the provider can work on this machine.
    fn is_supported(&self) -> bool;

    /// The focused window, or `None` if nothing is focused.
    async fn active_window(&self) -> Result<Option<WindowInfo>>;
}

/// The provider for the current platform, if there is one.
pub fn platform_provider(timeout: Duration) -> Option<Arc<dyn ActiveWindowProvider>> {
    if cfg!(target_os = "windows") {
        Some(Arc::new(PowerShellProvider::new(timeout)))
    } else if cfg!(target_os = "linux") {
        Some(Arc::new(XdotoolProvider::new(timeout)))
    } else {
        warn!("Window monitoring is not supported on {}", std::env::consts::OS);
        None
    }
}

async fn run_with_timeout(command: &mut Command, timeout: Duration) -> Result<String> {
    let output = tokio::time::timeout(timeout, command.kill_on_drop(true).output())
        .await
        .map_err(|_| PaperclipError::Monitor(format!("window query timed out after {:?}", timeout)))?
        .map_err(|e| PaperclipError::Monitor(format!("failed to run window query: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PaperclipError::Monitor(format!(
            "window query exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

// =============================================================================
// Windows
// =============================================================================

const POWERSHELL_SCRIPT: &str = r#"
[Console]::OutputEncoding = [System.Text.Encoding]::UTF8

Add-Type @"
using System;
using System.Runtime.InteropServices;
using System.Text;

public class WindowHelper {
    [DllImport("user32.dll", CharSet = CharSet.Unicode)]
    public static extern IntPtr GetForegroundWindow();

    [DllImport("user32.dll", CharSet = CharSet.Unicode)]
    public static extern int GetWindowText(IntPtr hWnd, StringBuilder text, int count);

    [DllImport("user32.dll")]
    public static extern uint GetWindowThreadProcessId(IntPtr hWnd, out uint processId);
}
"@

$hwnd = [WindowHelper]::GetForegroundWindow()
$title = New-Object System.Text.StringBuilder 512
[WindowHelper]::GetWindowText($hwnd, $title, 512) | Out-Null

$processId = 0
[WindowHelper]::GetWindowThreadProcessId($hwnd, [ref]$processId) | Out-Null

$process = Get-Process -Id $processId -ErrorAction SilentlyContinue
$processName = if ($process) { $process.ProcessName } else { "" }

Write-Output "$($title.ToString())|$processName"
"#;

/// Foreground-window lookup through a PowerShell script calling user32.
pub struct PowerShellProvider {
    timeout: Duration,
}

impl PowerShellProvider {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Split `"title|process"` on the last `|`. Empty output means no window.
pub fn parse_powershell_output(output: &str, timestamp: Timestamp) -> Option<WindowInfo> {
    let output = output.trim();
    if output.is_empty() {
        return None;
    }
    let (title, process_name) = match output.rfind('|') {
        Some(index) => (&output[..index], &output[index + 1..]),
        None => (output, ""),
    };
    Some(WindowInfo {
        title: title.to_string(),
        process_name: process_name.to_string(),
        timestamp,
    })
}

#[async_trait]
impl ActiveWindowProvider for PowerShellProvider {
    fn platform_name(&self) -> &'static str {
        "Windows (PowerShell)"
    }

    fn is_supported(&self) -> bool {
        cfg!(target_os = "windows")
    }

    async fn active_window(&self) -> Result<Option<WindowInfo>> {
        if !self.is_supported() {
            return Ok(None);
        }

        // Rewritten every poll so a stale script from an older build never runs.
        let script_path = std::env::temp_dir().join("paperclip-window-detect.ps1");
        tokio::fs::write(&script_path, POWERSHELL_SCRIPT.trim()).await?;

        let mut command = Command::new("powershell");
        command
            .arg("-NoProfile")
            .arg("-NonInteractive")
            .arg("-ExecutionPolicy")
            .arg("Bypass")
            .arg("-File")
            .arg(&script_path);
        let stdout = run_with_timeout(&mut command, self.timeout).await?;
        Ok(parse_powershell_output(&stdout, Timestamp::now()))
    }
}

// =============================================================================
// Linux (X11)
// =============================================================================

/// Foreground-window lookup through `xdotool` and `/proc/<pid>/comm`.
pub struct XdotoolProvider {
    timeout: Duration,
}

impl XdotoolProvider {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Parse `xdotool getactivewindow getwindowname getwindowpid` output:
/// the title on the first line, the pid on the second.
pub fn parse_xdotool_output(output: &str) -> Option<(String, Option<u32>)> {
    let mut lines = output.lines();
    let title = lines.next()?.trim_end().to_string();
    let pid = lines.next().and_then(|line| line.trim().parse().ok());
    Some((title, pid))
}

#[async_trait]
impl ActiveWindowProvider for XdotoolProvider {
    fn platform_name(&self) -> &'static str {
        "Linux (xdotool)"
    }

    fn is_supported(&self) -> bool {
        cfg!(target_os = "linux") && std::env::var_os("DISPLAY").is_some()
    }

    async fn active_window(&self) -> Result<Option<WindowInfo>> {
        if !self.is_supported() {
            return Ok(None);
        }

        let mut command = Command::new("xdotool");
        command
            .arg("getactivewindow")
            .arg("getwindowname")
            .arg("getwindowpid");
        let stdout = run_with_timeout(&mut command, self.timeout).await?;

        let Some((title, pid)) = parse_xdotool_output(&stdout) else {
            return Ok(None);
        };
        let process_name = match pid {
            Some(pid) => tokio::fs::read_to_string(format!("/proc/{}/comm", pid))
                .await
                .map(|name| name.trim().to_string())
                .unwrap_or_default(),
            None => String::new(),
        };

        Ok(Some(WindowInfo {
            title,
            process_name,
            timestamp: Timestamp::now(),
        }))
    }
}

// =============================================================================
// Monitor
// =============================================================================

/// Polls a provider and reports focused-window changes.
pub struct WindowMonitor {
    config: MonitorConfig,
    provider: Arc<dyn ActiveWindowProvider>,
    parser: TitleParser,
    last_title: Option<String>,
    last_valid: Option<BrowserContextInfo>,
}

impl WindowMonitor {
    pub fn new(config: MonitorConfig, provider: Arc<dyn ActiveWindowProvider>) -> Self {
        Self {
            config,
            provider,
            parser: TitleParser::new(),
            last_title: None,
            last_valid: None,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.provider.is_supported()
    }

    /// The assistant's own windows (and anything else configured) are skipped.
    pub fn should_ignore(&self, title: &str, process_name: &str) -> bool {
        let title = title.to_lowercase();
        let process = process_name.to_lowercase();
        self.config.ignored_windows.iter().any(|ignored| {
            let ignored = ignored.to_lowercase();
            title.contains(&ignored) || process.contains(&ignored)
        })
    }

    /// Most recent non-ignored window context.
    pub fn last_valid_context(&self) -> Option<&BrowserContextInfo> {
        self.last_valid.as_ref()
    }

    fn to_context(&self, window: &WindowInfo) -> BrowserContextInfo {
        let parsed = self.parser.parse(&window.title, &window.process_name);
        BrowserContextInfo {
            page_title: parsed.page_title,
            browser_type: parsed.browser_type,
            application_name: parsed.application_name,
            process_name: window.process_name.clone(),
            timestamp: window.timestamp,
        }
    }

    /// One-off lookup of the focused window, without change tracking.
    pub async fn current_window(&self) -> Option<BrowserContextInfo> {
        match self.provider.active_window().await {
            Ok(Some(window)) => Some(self.to_context(&window)),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read current window");
                None
            }
        }
    }

    /// Poll once. Returns the new context when the focused title changed.
    ///
    /// Ignored windows leave the remembered title untouched, so returning to
    /// the previous window does not report it again.
    pub async fn poll_once(&mut self) -> Result<Option<BrowserContextInfo>> {
        let Some(window) = self.provider.active_window().await? else {
            return Ok(None);
        };

        if self.should_ignore(&window.title, &window.process_name) {
            debug!(title = %window.title, "Ignoring window");
            return Ok(None);
        }
        if self.last_title.as_deref() == Some(window.title.as_str()) {
            return Ok(None);
        }

        let context = self.to_context(&window);
        self.last_title = Some(window.title);
        self.last_valid = Some(context.clone());
        Ok(Some(context))
    }

    /// Poll until cancelled or until the receiver goes away.
    pub async fn run(
        mut self,
        changes: mpsc::Sender<BrowserContextInfo>,
        cancel_token: CancellationToken,
    ) {
        if !self.config.enabled {
            info!("Window monitor disabled");
            return;
        }
        if !self.is_supported() {
            warn!(
                provider = self.provider.platform_name(),
                "Window monitoring not supported on this platform"
            );
            return;
        }

        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            provider = self.provider.platform_name(),
            interval_ms = self.config.poll_interval_ms,
            "Window monitor started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(Some(context)) => {
                            if changes.send(context).await.is_err() {
                                info!("Window change receiver dropped, stopping monitor");
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => warn!(error = %e, "Window poll failed"),
                    }
                }
                _ = cancel_token.cancelled() => {
                    info!("Window monitor shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use paperclip_core::BrowserType;

    /// Replays scripted poll results, then reports no window.
    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<Option<WindowInfo>>>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<Option<WindowInfo>>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
            })
        }
    }

    #[async_trait]
    impl ActiveWindowProvider for ScriptedProvider {
        fn platform_name(&self) -> &'static str {
            "scripted"
        }

        fn is_supported(&self) -> bool {
            true
        }

        async fn active_window(&self) -> Result<Option<WindowInfo>> {
            self.script.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }
    }

    fn window(title: &str, process: &str) -> Result<Option<WindowInfo>> {
        Ok(Some(WindowInfo {
            title: title.to_string(),
            process_name: process.to_string(),
            timestamp: Timestamp(1),
        }))
    }

    fn fast_config() -> MonitorConfig {
        MonitorConfig {
            poll_interval_ms: 5,
            ..MonitorConfig::default()
        }
    }

    #[tokio::test]
    async fn test_poll_reports_changes_only() {
        let provider = ScriptedProvider::new(vec![
            window("Example Domain - Google Chrome", "chrome.exe"),
            window("Example Domain - Google Chrome", "chrome.exe"),
            window("notes.md - Notion", "Notion.exe"),
        ]);
        let mut monitor = WindowMonitor::new(fast_config(), provider);

        let first = monitor.poll_once().await.unwrap().unwrap();
        assert_eq!(first.browser_type, BrowserType::Chrome);
        assert_eq!(first.page_title, "Example Domain");
        assert_eq!(first.application_name, "Google Chrome");

        assert!(monitor.poll_once().await.unwrap().is_none());

        let third = monitor.poll_once().await.unwrap().unwrap();
        assert_eq!(third.application_name, "Notion");
        assert_eq!(monitor.last_valid_context(), Some(&third));
    }

    #[tokio::test]
    async fn test_own_windows_are_ignored_and_do_not_reset_dedup() {
        let provider = ScriptedProvider::new(vec![
            window("Inbox - Outlook", "OUTLOOK.EXE"),
            window("Clippy 2.0", "electron.exe"),
            window("Inbox - Outlook", "OUTLOOK.EXE"),
        ]);
        let mut monitor = WindowMonitor::new(fast_config(), provider);

        assert!(monitor.poll_once().await.unwrap().is_some());
        assert!(monitor.poll_once().await.unwrap().is_none());
        assert!(monitor.poll_once().await.unwrap().is_none());
        assert_eq!(
            monitor.last_valid_context().map(|c| c.process_name.as_str()),
            Some("OUTLOOK.EXE")
        );
    }

    #[test]
    fn test_should_ignore_is_case_insensitive() {
        let provider = ScriptedProvider::new(vec![]);
        let monitor = WindowMonitor::new(MonitorConfig::default(), provider);
        assert!(monitor.should_ignore("PAPERCLIP assistant", ""));
        assert!(monitor.should_ignore("whatever", "Electron"));
        assert!(!monitor.should_ignore("Inbox - Outlook", "outlook.exe"));
    }

    #[tokio::test]
    async fn test_run_survives_poll_errors_and_stops_on_cancel() {
        let provider = ScriptedProvider::new(vec![
            Err(PaperclipError::Monitor("transient".to_string())),
            window("First", "app"),
            Err(PaperclipError::Monitor("transient".to_string())),
            window("Second", "app"),
        ]);
        let monitor = WindowMonitor::new(fast_config(), provider);
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(monitor.run(tx, cancel.clone()));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.page_title, "First");
        assert_eq!(second.page_title, "Second");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_disabled_monitor_returns_immediately() {
        let provider = ScriptedProvider::new(vec![window("First", "app")]);
        let config = MonitorConfig {
            enabled: false,
            ..fast_config()
        };
        let (tx, mut rx) = mpsc::channel(1);
        WindowMonitor::new(config, provider)
            .run(tx, CancellationToken::new())
            .await;
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_parse_powershell_output_splits_on_last_pipe() {
        let info = parse_powershell_output("a|b - Google Chrome|chrome\r\n", Timestamp(3)).unwrap();
        assert_eq!(info.title, "a|b - Google Chrome");
        assert_eq!(info.process_name, "chrome");

        let bare = parse_powershell_output("Untitled", Timestamp(3)).unwrap();
        assert_eq!(bare.process_name, "");
        assert!(parse_powershell_output("   ", Timestamp(3)).is_none());
    }

    #[test]
    fn test_parse_xdotool_output() {
        let (title, pid) = parse_xdotool_output("Terminal - bash\n4242\n").unwrap();
        assert_eq!(title, "Terminal - bash");
        assert_eq!(pid, Some(4242));

        let (_, pid) = parse_xdotool_output("Only title").unwrap();
        assert_eq!(pid, None);
        assert!(parse_xdotool_output("").is_none());
    }
}
