//! In-memory session backend with scripted pages.
//!
//! Pages answer lookups from a set of anchors that are currently "present"
//! and record every lookup, click, selection and keystroke, so tests can
//! assert on the exact interaction sequence. Waits use `tokio::time`, which
//! makes them instant under a paused test clock.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use swapbot_core_types::Anchor;
use tokio::time::{sleep, Instant};

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::network::NetworkTracker;
use crate::page::{ElementRef, PageHandle};
use crate::session::{BackendFactory, BrowserSession, SessionBackend};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One interaction observed by a [`FakePage`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageEvent {
    Lookup(Anchor),
    Click(Anchor),
    SelectAll(Anchor),
    Type(Anchor, String),
}

#[derive(Default)]
struct PageState {
    url: String,
    present: HashSet<Anchor>,
    broken: HashSet<Anchor>,
    detached: bool,
    events: Vec<PageEvent>,
}

/// Scripted window.
pub struct FakePage {
    state: Mutex<PageState>,
}

impl FakePage {
    pub fn new(url: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PageState {
                url: url.into(),
                ..PageState::default()
            }),
        })
    }

    /// Page on which every given anchor is present.
    pub fn with_matches(url: impl Into<String>, anchors: impl IntoIterator<Item = Anchor>) -> Arc<Self> {
        let page = Self::new(url);
        for anchor in anchors {
            page.add_match(anchor);
        }
        page
    }

    pub fn add_match(&self, anchor: Anchor) {
        self.state.lock().present.insert(anchor);
    }

    pub fn remove_match(&self, anchor: &Anchor) {
        self.state.lock().present.remove(anchor);
    }

    /// Make clicks on `anchor` fail as if the node went stale.
    pub fn break_clicks_on(&self, anchor: Anchor) {
        self.state.lock().broken.insert(anchor);
    }

    /// Every later operation fails as if the browser went away.
    pub fn detach(&self) {
        self.state.lock().detached = true;
    }

    pub fn set_url(&self, url: impl Into<String>) {
        self.state.lock().url = url.into();
    }

    pub fn current_url(&self) -> String {
        self.state.lock().url.clone()
    }

    pub fn events(&self) -> Vec<PageEvent> {
        self.state.lock().events.clone()
    }

    pub fn lookups(&self) -> Vec<Anchor> {
        self.collect(|event| match event {
            PageEvent::Lookup(anchor) => Some(anchor.clone()),
            _ => None,
        })
    }

    pub fn clicks(&self) -> Vec<Anchor> {
        self.collect(|event| match event {
            PageEvent::Click(anchor) => Some(anchor.clone()),
            _ => None,
        })
    }

    pub fn typed(&self) -> Vec<(Anchor, String)> {
        self.collect(|event| match event {
            PageEvent::Type(anchor, text) => Some((anchor.clone(), text.clone())),
            _ => None,
        })
    }

    pub fn was_looked_up(&self, anchor: &Anchor) -> bool {
        self.lookups().iter().any(|seen| seen == anchor)
    }

    fn collect<T>(&self, pick: impl Fn(&PageEvent) -> Option<T>) -> Vec<T> {
        self.state.lock().events.iter().filter_map(pick).collect()
    }

    fn record(&self, event: PageEvent) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        if state.detached {
            return Err(AdapterError::session_closed().with_hint("page detached"));
        }
        state.events.push(event);
        Ok(())
    }

    fn is_present(&self, anchor: &Anchor) -> bool {
        self.state.lock().present.contains(anchor)
    }
}

#[async_trait]
impl PageHandle for FakePage {
    async fn url(&self) -> Result<Option<String>, AdapterError> {
        let state = self.state.lock();
        if state.detached {
            return Err(AdapterError::session_closed().with_hint("page detached"));
        }
        Ok(Some(state.url.clone()))
    }

    async fn wait_for(
        &self,
        anchor: &Anchor,
        timeout: Duration,
    ) -> Result<Option<ElementRef>, AdapterError> {
        self.record(PageEvent::Lookup(anchor.clone()))?;
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_present(anchor) {
                return Ok(Some(ElementRef::new(anchor.clone())));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn click(&self, element: &ElementRef) -> Result<(), AdapterError> {
        self.record(PageEvent::Click(element.anchor.clone()))?;
        if self.state.lock().broken.contains(&element.anchor) {
            return Err(AdapterError::cdp("node is detached from document"));
        }
        Ok(())
    }

    async fn select_all(&self, element: &ElementRef) -> Result<(), AdapterError> {
        self.record(PageEvent::SelectAll(element.anchor.clone()))
    }

    async fn type_text(&self, element: &ElementRef, text: &str) -> Result<(), AdapterError> {
        self.record(PageEvent::Type(element.anchor.clone(), text.to_string()))
    }
}

#[derive(Default)]
struct BackendState {
    popups: Vec<Arc<FakePage>>,
    navigations: Vec<String>,
    launch_error: Option<String>,
    windows_error: Option<String>,
}

/// Cheaply clonable backend; clones share all state so a test can keep one
/// copy for inspection while the session owns another.
#[derive(Clone)]
pub struct FakeBackend {
    primary: Arc<FakePage>,
    state: Arc<Mutex<BackendState>>,
    launches: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
    network: Arc<NetworkTracker>,
    goto_delay: Option<Duration>,
}

impl FakeBackend {
    pub fn new(primary: Arc<FakePage>) -> Self {
        Self {
            primary,
            state: Arc::new(Mutex::new(BackendState::default())),
            launches: Arc::new(AtomicUsize::new(0)),
            shutdowns: Arc::new(AtomicUsize::new(0)),
            network: Arc::new(NetworkTracker::new()),
            goto_delay: None,
        }
    }

    pub fn with_goto_delay(mut self, delay: Duration) -> Self {
        self.goto_delay = Some(delay);
        self
    }

    pub fn primary_page(&self) -> Arc<FakePage> {
        self.primary.clone()
    }

    pub fn add_window(&self, page: Arc<FakePage>) {
        self.state.lock().popups.push(page);
    }

    pub fn remove_window(&self, url: &str) {
        self.state
            .lock()
            .popups
            .retain(|page| page.current_url() != url);
    }

    /// Open a request on the primary page; loads wait for it.
    pub fn request_started(&self, request_id: &str) {
        self.network.request_started(request_id);
    }

    pub fn request_finished(&self, request_id: &str) {
        self.network.request_finished(request_id);
    }

    pub fn fail_launch(&self, reason: impl Into<String>) {
        self.state.lock().launch_error = Some(reason.into());
    }

    pub fn fail_window_listing(&self, reason: impl Into<String>) {
        self.state.lock().windows_error = Some(reason.into());
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().navigations.clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn factory(&self) -> BackendFactory {
        let template = self.clone();
        Arc::new(move |_cfg: CdpConfig| {
            let backend = template.clone();
            Box::pin(async move {
                backend.launches.fetch_add(1, Ordering::SeqCst);
                let launch_error = backend.state.lock().launch_error.clone();
                match launch_error {
                    Some(reason) => {
                        Err(AdapterError::new(AdapterErrorKind::LaunchFailed).with_hint(reason))
                    }
                    None => Ok(Box::new(backend) as Box<dyn SessionBackend>),
                }
            })
        })
    }

    /// Build and initialize a session over this backend.
    pub async fn open_session(&self, cfg: CdpConfig) -> Result<BrowserSession, AdapterError> {
        let mut session = BrowserSession::with_factory(cfg, self.factory());
        session.init().await?;
        Ok(session)
    }
}

#[async_trait]
impl SessionBackend for FakeBackend {
    fn primary(&self) -> Arc<dyn PageHandle> {
        self.primary.clone()
    }

    async fn goto(&self, url: &str) -> Result<(), AdapterError> {
        if let Some(delay) = self.goto_delay {
            sleep(delay).await;
        }
        self.state.lock().navigations.push(url.to_string());
        self.primary.set_url(url);
        Ok(())
    }

    async fn wait_for_load(&self, network_quiet: Duration) -> Result<(), AdapterError> {
        self.network
            .wait_until_quiet(network_quiet, POLL_INTERVAL)
            .await;
        Ok(())
    }

    async fn windows(&self) -> Result<Vec<Arc<dyn PageHandle>>, AdapterError> {
        let state = self.state.lock();
        if let Some(reason) = &state.windows_error {
            return Err(AdapterError::cdp(reason));
        }
        let mut windows: Vec<Arc<dyn PageHandle>> = vec![self.primary.clone()];
        windows.extend(
            state
                .popups
                .iter()
                .map(|page| page.clone() as Arc<dyn PageHandle>),
        );
        Ok(windows)
    }

    async fn shutdown(&mut self) -> Result<(), AdapterError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
