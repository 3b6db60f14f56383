//! Session lifecycle: one browser process, one primary page, observed popups.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::chromium::ChromiumBackend;
use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::page::PageHandle;

/// The process-owning half of a session.
///
/// [`BrowserSession`] drives the lifecycle; implementations only have to
/// perform the raw operations.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// The page the automation drives.
    fn primary(&self) -> Arc<dyn PageHandle>;

    /// Navigate the primary page and wait for the document to commit.
    async fn goto(&self, url: &str) -> Result<(), AdapterError>;

    /// Wait until the primary page has loaded and its network has stayed
    /// quiet for `network_quiet`.
    async fn wait_for_load(&self, network_quiet: Duration) -> Result<(), AdapterError>;

    /// Every window currently open, primary included.
    async fn windows(&self) -> Result<Vec<Arc<dyn PageHandle>>, AdapterError>;

    /// Release the process. Called at most once per backend.
    async fn shutdown(&mut self) -> Result<(), AdapterError>;
}

pub type BackendFactory = Arc<
    dyn Fn(CdpConfig) -> BoxFuture<'static, Result<Box<dyn SessionBackend>, AdapterError>>
        + Send
        + Sync,
>;

enum SessionState {
    Unopened,
    Open(Box<dyn SessionBackend>),
    Closed,
}

/// Front-end handle over the automated browser.
///
/// Construct with [`BrowserSession::new`], open with [`init`](Self::init) and
/// always finish with [`close`](Self::close); closing is idempotent.
pub struct BrowserSession {
    cfg: CdpConfig,
    factory: BackendFactory,
    state: SessionState,
}

impl BrowserSession {
    /// Session backed by a locally launched Chromium.
    pub fn new(cfg: CdpConfig) -> Self {
        let factory: BackendFactory = Arc::new(|cfg: CdpConfig| {
            Box::pin(async move {
                let backend = ChromiumBackend::launch(&cfg).await?;
                Ok(Box::new(backend) as Box<dyn SessionBackend>)
            })
        });
        Self::with_factory(cfg, factory)
    }

    pub fn with_factory(cfg: CdpConfig, factory: BackendFactory) -> Self {
        Self {
            cfg,
            factory,
            state: SessionState::Unopened,
        }
    }

    pub fn config(&self) -> &CdpConfig {
        &self.cfg
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, SessionState::Open(_))
    }

    /// Launch the browser and open the primary page.
    pub async fn init(&mut self) -> Result<(), AdapterError> {
        match self.state {
            SessionState::Open(_) => {
                debug!("init called on an open session; ignoring");
                return Ok(());
            }
            SessionState::Closed => {
                return Err(AdapterError::session_closed()
                    .with_hint("session was already closed and cannot be reopened"));
            }
            SessionState::Unopened => {}
        }

        info!(headless = self.cfg.headless, "Initializing browser");
        let backend = (self.factory)(self.cfg.clone()).await.map_err(|err| {
            if err.kind == AdapterErrorKind::LaunchFailed {
                err
            } else {
                AdapterError::new(AdapterErrorKind::LaunchFailed).with_hint(err.to_string())
            }
        })?;
        self.state = SessionState::Open(backend);
        info!("Browser initialized");
        Ok(())
    }

    fn backend(&self) -> Result<&dyn SessionBackend, AdapterError> {
        match &self.state {
            SessionState::Open(backend) => Ok(backend.as_ref()),
            SessionState::Unopened => {
                Err(AdapterError::session_closed().with_hint("session has not been initialized"))
            }
            SessionState::Closed => {
                Err(AdapterError::session_closed().with_hint("session has been closed"))
            }
        }
    }

    pub fn primary(&self) -> Result<Arc<dyn PageHandle>, AdapterError> {
        Ok(self.backend()?.primary())
    }

    /// Open the token page for `token_address` and give the app time to render.
    ///
    /// Returns the URL that was loaded.
    pub async fn navigate_to_token(&self, token_address: &str) -> Result<String, AdapterError> {
        let token_address = token_address.trim();
        if token_address.is_empty() {
            return Err(AdapterError::new(AdapterErrorKind::InvalidInput)
                .with_hint("token address must not be empty"));
        }

        let backend = self.backend()?;
        let url = self.cfg.target.token_url(token_address);
        let limit = Duration::from_millis(self.cfg.timeout_ms);
        let network_quiet = Duration::from_millis(self.cfg.network_quiet_ms);

        info!(%url, "Navigating to token page");
        let load = async {
            backend.goto(&url).await?;
            backend.wait_for_load(network_quiet).await
        };
        match timeout(limit, load).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(%url, error = %err, "Navigation failed");
                return Err(err);
            }
            Err(_) => {
                warn!(%url, timeout_ms = self.cfg.timeout_ms, "Navigation timed out");
                return Err(AdapterError::new(AdapterErrorKind::NavTimeout).with_hint(format!(
                    "{} did not finish loading within {}ms",
                    url, self.cfg.timeout_ms
                )));
            }
        }

        sleep(Duration::from_millis(self.cfg.settle_delay_ms)).await;
        info!(%url, "Token page loaded");
        Ok(url)
    }

    /// Snapshot of all open windows, taken now.
    pub async fn windows(&self) -> Result<Vec<Arc<dyn PageHandle>>, AdapterError> {
        self.backend()?.windows().await
    }

    /// Release the browser. Safe to call on an unopened or closed session.
    pub async fn close(&mut self) {
        let state = std::mem::replace(&mut self.state, SessionState::Closed);
        match state {
            SessionState::Open(mut backend) => {
                if let Err(err) = backend.shutdown().await {
                    warn!(error = %err, "Browser shutdown reported an error");
                }
                info!("Browser closed");
            }
            SessionState::Unopened | SessionState::Closed => {
                debug!("close called without an open browser; nothing to release");
            }
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if self.is_open() {
            warn!("BrowserSession dropped without close(); relying on process teardown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeBackend, FakePage};
    use swapbot_core_types::Anchor;
    use tokio::time::Instant;

    fn fake_session(backend: &FakeBackend) -> BrowserSession {
        BrowserSession::with_factory(CdpConfig::default(), backend.factory())
    }

    #[tokio::test(start_paused = true)]
    async fn close_twice_releases_once() {
        let backend = FakeBackend::new(FakePage::new("about:blank"));
        let mut session = fake_session(&backend);
        session.init().await.unwrap();
        assert!(session.is_open());

        session.close().await;
        session.close().await;

        assert_eq!(backend.shutdown_count(), 1);
        assert!(!session.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn close_without_init_is_noop() {
        let backend = FakeBackend::new(FakePage::new("about:blank"));
        let mut session = fake_session(&backend);
        session.close().await;
        assert_eq!(backend.shutdown_count(), 0);
        assert_eq!(backend.launch_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_session_cannot_be_reopened() {
        let backend = FakeBackend::new(FakePage::new("about:blank"));
        let mut session = fake_session(&backend);
        session.init().await.unwrap();
        session.close().await;

        let err = session.init().await.unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::SessionClosed);
        assert_eq!(backend.launch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_builds_url_and_settles() {
        let backend = FakeBackend::new(FakePage::new("about:blank"));
        let mut session = fake_session(&backend);
        session.init().await.unwrap();

        let started = Instant::now();
        let url = session.navigate_to_token(" 0xdeadbeef ").await.unwrap();

        assert_eq!(url, "https://web3.okx.com/id/token/arbitrum-one/0xdeadbeef");
        assert_eq!(backend.navigations(), vec![url.clone()]);
        assert_eq!(backend.primary_page().current_url(), url);
        assert!(started.elapsed() >= Duration::from_millis(3_000));
        session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_waits_for_network_quiet() {
        let backend = FakeBackend::new(FakePage::new("about:blank"));
        let mut session = fake_session(&backend);
        session.init().await.unwrap();
        for id in ["quote", "pool", "ws-upgrade"] {
            backend.request_started(id);
        }
        let network = backend.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(8)).await;
            network.request_finished("quote");
        });

        let started = Instant::now();
        session.navigate_to_token("0x1").await.unwrap();

        // 8s until the third request ends, 500ms quiet window, 3s settle.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(11_500), "settled after {elapsed:?}");
        assert!(elapsed < Duration::from_millis(11_700), "settled after {elapsed:?}");
        session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn busy_network_times_out_navigation() {
        let backend = FakeBackend::new(FakePage::new("about:blank"));
        let mut session = BrowserSession::with_factory(
            CdpConfig::default().with_timeout_ms(5_000),
            backend.factory(),
        );
        session.init().await.unwrap();
        for id in ["a", "b", "c"] {
            backend.request_started(id);
        }

        let err = session.navigate_to_token("0x1").await.unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::NavTimeout);
        session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_navigation_times_out() {
        let backend = FakeBackend::new(FakePage::new("about:blank"))
            .with_goto_delay(Duration::from_secs(120));
        let mut session = BrowserSession::with_factory(
            CdpConfig::default().with_timeout_ms(5_000),
            backend.factory(),
        );
        session.init().await.unwrap();

        let err = session.navigate_to_token("0x1").await.unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::NavTimeout);
        session.close().await;
        assert_eq!(backend.shutdown_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_requires_open_session_and_address() {
        let backend = FakeBackend::new(FakePage::new("about:blank"));
        let mut session = fake_session(&backend);

        let err = session.navigate_to_token("0x1").await.unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::SessionClosed);

        session.init().await.unwrap();
        let err = session.navigate_to_token("   ").await.unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::InvalidInput);
        assert!(backend.navigations().is_empty());
        session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn windows_are_a_fresh_snapshot() {
        let backend = FakeBackend::new(FakePage::new("https://web3.okx.com/"));
        let mut session = fake_session(&backend);
        session.init().await.unwrap();
        assert_eq!(session.windows().await.unwrap().len(), 1);

        let popup = FakePage::new("chrome-extension://abc/notification.html");
        popup.add_match(Anchor::css(".btn-primary"));
        backend.add_window(popup);
        assert_eq!(session.windows().await.unwrap().len(), 2);

        backend.remove_window("chrome-extension://abc/notification.html");
        assert_eq!(session.windows().await.unwrap().len(), 1);
        session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn launch_failure_is_reported() {
        let backend = FakeBackend::new(FakePage::new("about:blank"));
        backend.fail_launch("no chrome binary");
        let mut session = fake_session(&backend);

        let err = session.init().await.unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::LaunchFailed);
        assert!(!session.is_open());
        session.close().await;
        assert_eq!(backend.shutdown_count(), 0);
    }
}
