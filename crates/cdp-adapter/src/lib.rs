//! Chromium DevTools session layer for swapbot.
//!
//! The crate owns everything that touches the browser process: launching it,
//! navigating the primary page, enumerating secondary windows (wallet
//! popups) and tearing it all down again. Higher layers only see the
//! [`page::PageHandle`] and [`session::BrowserSession`] surfaces, which keeps
//! them testable against the in-memory backend behind the `fake` feature.

use std::{env, path::PathBuf};

use which::which;

mod chromium;
pub mod network;
pub mod page;
mod script;
pub mod session;

#[cfg(any(test, feature = "fake"))]
pub mod fake;

pub use chromium::ChromiumBackend;
pub use error::{AdapterError, AdapterErrorKind};
pub use page::{ElementRef, PageHandle};
pub use session::{BackendFactory, BrowserSession, SessionBackend};

pub mod ids {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    /// Identifier of an element handle handed out by a page.
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
    pub struct ElementId(pub Uuid);

    impl ElementId {
        pub fn new() -> Self {
            Self(Uuid::new_v4())
        }
    }

    impl Default for ElementId {
        fn default() -> Self {
            Self::new()
        }
    }
}

pub mod error {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use thiserror::Error;

    /// High-level error categories surfaced by the adapter.
    #[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
    pub enum AdapterErrorKind {
        #[error("browser launch failed")]
        LaunchFailed,
        #[error("navigation timed out")]
        NavTimeout,
        #[error("cdp i/o failure")]
        CdpIo,
        #[error("target element not found")]
        TargetNotFound,
        #[error("session is not open")]
        SessionClosed,
        #[error("invalid input")]
        InvalidInput,
        #[error("internal error")]
        Internal,
    }

    /// Enriched error metadata passed back to higher layers.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct AdapterError {
        pub kind: AdapterErrorKind,
        pub hint: Option<String>,
        pub retriable: bool,
    }

    impl fmt::Display for AdapterError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.kind)?;
            if let Some(hint) = &self.hint {
                write!(f, ": {}", hint)?;
            }
            Ok(())
        }
    }

    impl std::error::Error for AdapterError {}

    impl AdapterError {
        pub fn new(kind: AdapterErrorKind) -> Self {
            Self {
                kind,
                hint: None,
                retriable: false,
            }
        }

        pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
            self.hint = Some(hint.into());
            self
        }

        pub fn retriable(mut self, flag: bool) -> Self {
            self.retriable = flag;
            self
        }

        pub fn session_closed() -> Self {
            Self::new(AdapterErrorKind::SessionClosed)
        }

        pub fn cdp(err: impl fmt::Display) -> Self {
            Self::new(AdapterErrorKind::CdpIo)
                .with_hint(err.to_string())
                .retriable(true)
        }

        /// Errors that mean the whole session is gone, not just one lookup.
        pub fn is_fatal(&self) -> bool {
            matches!(
                self.kind,
                AdapterErrorKind::SessionClosed | AdapterErrorKind::LaunchFailed
            )
        }
    }
}

pub mod config {
    use crate::detect_chrome_executable;
    use serde::{Deserialize, Serialize};
    use std::path::PathBuf;

    /// Desktop Chrome identification presented to the target site.
    pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";

    /// Where token pages live: `https://<host>/<locale>/token/<chain>/<address>`.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TargetSite {
        pub host: String,
        pub locale: String,
        pub chain: String,
    }

    impl Default for TargetSite {
        fn default() -> Self {
            Self {
                host: "web3.okx.com".to_string(),
                locale: "id".to_string(),
                chain: "arbitrum-one".to_string(),
            }
        }
    }

    impl TargetSite {
        pub fn token_url(&self, token_address: &str) -> String {
            format!(
                "https://{}/{}/token/{}/{}",
                self.host.trim_end_matches('/'),
                self.locale,
                self.chain,
                token_address
            )
        }
    }

    /// Configuration for launching and driving the browser.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct CdpConfig {
        pub executable: Option<PathBuf>,
        pub user_data_dir: Option<PathBuf>,
        /// Unpacked wallet extensions to load into the profile.
        pub extensions: Vec<PathBuf>,
        pub headless: bool,
        /// Upper bound for navigation, in milliseconds.
        pub timeout_ms: u64,
        pub window_width: u32,
        pub window_height: u32,
        pub user_agent: String,
        pub no_sandbox: bool,
        /// Grace period after load for client-side rendering. The target is a
        /// single-page app with no reliable ready signal.
        pub settle_delay_ms: u64,
        /// How long the page must stay under the in-flight request limit
        /// before a load counts as finished.
        pub network_quiet_ms: u64,
        /// Interval between element lookups while waiting for a match.
        pub poll_interval_ms: u64,
        pub target: TargetSite,
    }

    impl Default for CdpConfig {
        fn default() -> Self {
            Self {
                executable: detect_chrome_executable(),
                user_data_dir: None,
                extensions: Vec::new(),
                headless: false,
                timeout_ms: 30_000,
                window_width: 1920,
                window_height: 1080,
                user_agent: DEFAULT_USER_AGENT.to_string(),
                no_sandbox: true,
                settle_delay_ms: 3_000,
                network_quiet_ms: 500,
                poll_interval_ms: 100,
                target: TargetSite::default(),
            }
        }
    }

    impl CdpConfig {
        pub fn with_headless(mut self, headless: bool) -> Self {
            self.headless = headless;
            self
        }

        pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
            self.timeout_ms = timeout_ms;
            self
        }

        pub fn with_user_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
            self.user_data_dir = Some(dir.into());
            self
        }

        pub fn with_extension(mut self, dir: impl Into<PathBuf>) -> Self {
            self.extensions.push(dir.into());
            self
        }

        pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
            self.executable = Some(path.into());
            self
        }
    }
}

/// Locate a Chrome/Chromium binary: `SWAPBOT_CHROME`, then `PATH`, then the
/// usual install locations.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("SWAPBOT_CHROME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    os_specific_chrome_paths()
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "freebsd")))]
    {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::config::{CdpConfig, TargetSite};
    use super::detect_chrome_executable;
    use super::error::{AdapterError, AdapterErrorKind};
    use serial_test::serial;
    use std::{env, fs};
    use tempfile::tempdir;

    #[test]
    #[serial]
    fn detects_from_env_var() {
        let dir = tempdir().unwrap();
        let exe_path = dir.path().join("my-chrome");
        fs::write(&exe_path, b"").unwrap();
        let original = env::var("SWAPBOT_CHROME").ok();
        env::set_var("SWAPBOT_CHROME", exe_path.to_string_lossy().to_string());
        let detected = detect_chrome_executable();
        match original {
            Some(value) => env::set_var("SWAPBOT_CHROME", value),
            None => env::remove_var("SWAPBOT_CHROME"),
        }
        assert_eq!(detected, Some(exe_path));
    }

    #[test]
    fn token_url_follows_template() {
        let site = TargetSite::default();
        assert_eq!(
            site.token_url("0xabc"),
            "https://web3.okx.com/id/token/arbitrum-one/0xabc"
        );

        let custom = TargetSite {
            host: "example.org/".into(),
            locale: "en".into(),
            chain: "base".into(),
        };
        assert_eq!(
            custom.token_url("0x1"),
            "https://example.org/en/token/base/0x1"
        );
    }

    #[test]
    fn default_config_matches_launch_profile() {
        let cfg = CdpConfig::default();
        assert_eq!((cfg.window_width, cfg.window_height), (1920, 1080));
        assert!(cfg.no_sandbox);
        assert_eq!(cfg.timeout_ms, 30_000);
        assert_eq!(cfg.settle_delay_ms, 3_000);
        assert!(cfg.user_agent.contains("Chrome/"));
    }

    #[test]
    fn error_display_includes_hint() {
        let err = AdapterError::new(AdapterErrorKind::NavTimeout).with_hint("30000ms elapsed");
        assert_eq!(err.to_string(), "navigation timed out: 30000ms elapsed");
        assert!(!err.is_fatal());
        assert!(AdapterError::session_closed().is_fatal());
    }
}
