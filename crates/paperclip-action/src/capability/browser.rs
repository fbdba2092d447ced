//! Default-browser launcher restricted to http(s) URLs.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};
use url::Url;

use super::{BrowserCapability, BrowserOutput};

const ALLOWED_SCHEMES: [&str; 2] = ["http", "https"];

pub struct SystemBrowser {
    launch: bool,
}

impl SystemBrowser {
    pub fn new() -> Self {
        Self { launch: true }
    }

    /// Validate URLs without starting a browser process.
    pub fn validate_only() -> Self {
        Self { launch: false }
    }

    fn launcher(url: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", ""]).arg(url);
            cmd
        }
        #[cfg(target_os = "macos")]
        {
            let mut cmd = Command::new("open");
            cmd.arg(url);
            cmd
        }
        #[cfg(not(any(windows, target_os = "macos")))]
        {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(url);
            cmd
        }
    }
}

impl Default for SystemBrowser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `raw` and reject anything that is not http(s).
pub fn validate_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if !ALLOWED_SCHEMES.contains(&url.scheme()) {
        return Err(format!(
            "Invalid protocol: {}:. Only http and https are allowed.",
            url.scheme()
        ));
    }
    Ok(url)
}

#[async_trait]
impl BrowserCapability for SystemBrowser {
    async fn open(&self, url: &str) -> BrowserOutput {
        let failure = |error: String| BrowserOutput {
            success: false,
            url: url.to_string(),
            error: Some(error),
        };

        let parsed = match validate_url(url) {
            Ok(parsed) => parsed,
            Err(e) => return failure(e),
        };

        if self.launch {
            let status = Self::launcher(parsed.as_str())
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            match status {
                Ok(status) if status.success() => {}
                Ok(status) => return failure(format!("Browser launcher exited with {}", status)),
                Err(e) => {
                    warn!(error = %e, url, "Failed to launch browser");
                    return failure(e.to_string());
                }
            }
        }

        debug!(url, "Opened URL");
        BrowserOutput {
            success: true,
            url: url.to_string(),
            error: None,
        }
    }
}
