use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use swapbot_core_types::Anchor;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::ids::ElementId;
use crate::network::NetworkTracker;
use crate::page::{ElementRef, PageHandle};
use crate::script;
use crate::session::SessionBackend;

const LAUNCH_TIMEOUT: Duration = Duration::from_secs(20);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that mean the connection to the browser is gone.
fn map_cdp_error(err: CdpError) -> AdapterError {
    match err {
        CdpError::ChannelSendError(_) | CdpError::NoResponse => {
            AdapterError::session_closed().with_hint(err.to_string())
        }
        CdpError::Timeout => AdapterError::new(AdapterErrorKind::CdpIo)
            .with_hint(err.to_string())
            .retriable(true),
        other => AdapterError::cdp(other),
    }
}

fn browser_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
    let mut builder = BrowserConfig::builder()
        .request_timeout(Duration::from_millis(cfg.timeout_ms))
        .launch_timeout(LAUNCH_TIMEOUT)
        .window_size(cfg.window_width, cfg.window_height)
        .viewport(Viewport {
            width: cfg.window_width,
            height: cfg.window_height,
            device_scale_factor: Some(1.0),
            ..Default::default()
        })
        // Headless is passed explicitly so the new headless mode is used.
        .with_head();

    if cfg.no_sandbox {
        builder = builder.no_sandbox();
    }

    let mut args = vec![
        "--disable-dev-shm-usage".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-popup-blocking".to_string(),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        format!("--user-agent={}", cfg.user_agent),
    ];
    if cfg.headless {
        args.push("--headless=new".to_string());
    }
    builder = builder.args(args);

    for extension in &cfg.extensions {
        builder = builder.extension(extension.to_string_lossy().to_string());
    }
    if let Some(executable) = &cfg.executable {
        builder = builder.chrome_executable(executable.clone());
    }
    if let Some(dir) = &cfg.user_data_dir {
        builder = builder.user_data_dir(dir.clone());
    }

    builder.build().map_err(|err| {
        AdapterError::new(AdapterErrorKind::LaunchFailed)
            .with_hint(format!("browser config error: {err}"))
    })
}

/// Feed request lifecycle events of `page` into `tracker`.
async fn watch_network(
    page: &Page,
    tracker: Arc<NetworkTracker>,
) -> Result<JoinHandle<()>, AdapterError> {
    page.execute(EnableParams::default())
        .await
        .map_err(map_cdp_error)?;
    let mut sent = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(map_cdp_error)?;
    let mut finished = page
        .event_listener::<EventLoadingFinished>()
        .await
        .map_err(map_cdp_error)?;
    let mut failed = page
        .event_listener::<EventLoadingFailed>()
        .await
        .map_err(map_cdp_error)?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(event) = sent.next() => tracker.request_started(event.request_id.inner()),
                Some(event) = finished.next() => tracker.request_finished(event.request_id.inner()),
                Some(event) = failed.next() => tracker.request_finished(event.request_id.inner()),
                else => break,
            }
        }
        debug!(target: "cdp-adapter", "network event streams closed");
    }))
}

/// A locally launched Chromium process and its background tasks.
pub struct ChromiumBackend {
    browser: Browser,
    tasks: Vec<JoinHandle<()>>,
    primary: Arc<ChromiumPage>,
    network: Arc<NetworkTracker>,
    poll_interval: Duration,
}

impl ChromiumBackend {
    pub async fn launch(cfg: &CdpConfig) -> Result<Self, AdapterError> {
        let config = browser_config(cfg)?;
        let (mut browser, mut handler) = Browser::launch(config).await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::LaunchFailed)
                .with_hint(format!("failed to launch chromium: {err}"))
        })?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(target: "cdp-adapter", error = %err, "handler event error");
                }
            }
            debug!(target: "cdp-adapter", "browser handler finished");
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                let _ = browser.close().await;
                handler_task.abort();
                return Err(AdapterError::new(AdapterErrorKind::LaunchFailed)
                    .with_hint(format!("failed to open primary page: {err}")));
            }
        };
        let network = Arc::new(NetworkTracker::new());
        let network_task = match watch_network(&page, network.clone()).await {
            Ok(task) => task,
            Err(err) => {
                let _ = browser.close().await;
                handler_task.abort();
                return Err(AdapterError::new(AdapterErrorKind::LaunchFailed)
                    .with_hint(format!("failed to watch network events: {err}")));
            }
        };
        if let Err(err) = page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(
                script::WEBDRIVER_OVERRIDE,
            ))
            .await
        {
            warn!(target: "cdp-adapter", error = %err, "failed to install webdriver override");
        }

        let poll_interval = Duration::from_millis(cfg.poll_interval_ms.max(10));
        Ok(Self {
            browser,
            tasks: vec![handler_task, network_task],
            primary: Arc::new(ChromiumPage::new(page, poll_interval)),
            network,
            poll_interval,
        })
    }
}

#[async_trait]
impl SessionBackend for ChromiumBackend {
    fn primary(&self) -> Arc<dyn PageHandle> {
        self.primary.clone()
    }

    async fn goto(&self, url: &str) -> Result<(), AdapterError> {
        self.network.reset();
        self.primary
            .page
            .goto(url)
            .await
            .map(|_| ())
            .map_err(map_cdp_error)
    }

    async fn wait_for_load(&self, network_quiet: Duration) -> Result<(), AdapterError> {
        loop {
            let state = self
                .primary
                .page
                .evaluate(script::READY_STATE)
                .await
                .map_err(map_cdp_error)?
                .into_value::<String>()
                .unwrap_or_default();
            if state == "complete" {
                break;
            }
            trace!(target: "cdp-adapter", %state, "waiting for document load");
            sleep(self.poll_interval).await;
        }

        self.network
            .wait_until_quiet(network_quiet, self.poll_interval)
            .await;
        debug!(target: "cdp-adapter", inflight = self.network.inflight(), "network quiet");
        Ok(())
    }

    async fn windows(&self) -> Result<Vec<Arc<dyn PageHandle>>, AdapterError> {
        let pages = self.browser.pages().await.map_err(map_cdp_error)?;
        let primary_target = self.primary.page.target_id().clone();
        let mut windows: Vec<Arc<dyn PageHandle>> = vec![self.primary.clone()];
        for page in pages {
            if *page.target_id() == primary_target {
                continue;
            }
            windows.push(Arc::new(ChromiumPage::new(page, self.poll_interval)));
        }
        Ok(windows)
    }

    async fn shutdown(&mut self) -> Result<(), AdapterError> {
        let closed = self.browser.close().await.map(|_| ()).map_err(map_cdp_error);
        if timeout(SHUTDOWN_TIMEOUT, self.browser.wait()).await.is_err() {
            warn!(target: "cdp-adapter", "browser process did not exit in time");
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        closed
    }
}

impl Drop for ChromiumBackend {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// Live element handles of one page, at most one per anchor.
struct HandleTable<H> {
    entries: HashMap<ElementId, (Anchor, H)>,
}

impl<H> HandleTable<H> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Store a fresh handle, dropping older ones found for the same anchor.
    fn insert(&mut self, element: &ElementRef, handle: H) {
        self.entries
            .retain(|id, (anchor, _)| *id == element.id || *anchor != element.anchor);
        self.restore(element, handle);
    }

    /// Return a handle taken for an operation.
    fn restore(&mut self, element: &ElementRef, handle: H) {
        self.entries
            .insert(element.id, (element.anchor.clone(), handle));
    }

    fn take(&mut self, element: &ElementRef) -> Option<H> {
        self.entries.remove(&element.id).map(|(_, handle)| handle)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// One Chromium target seen as a [`PageHandle`].
pub struct ChromiumPage {
    page: Page,
    poll_interval: Duration,
    elements: Mutex<HandleTable<Element>>,
}

impl ChromiumPage {
    fn new(page: Page, poll_interval: Duration) -> Self {
        Self {
            page,
            poll_interval,
            elements: Mutex::new(HandleTable::new()),
        }
    }

    /// One immediate attempt at `anchor`.
    async fn lookup(&self, anchor: &Anchor) -> Result<Option<Element>, AdapterError> {
        let selector = match anchor {
            Anchor::Css { selector } => selector.clone(),
            Anchor::Text { tag, content } => {
                let marker = Uuid::new_v4().to_string();
                if !self.stamp(script::tag_by_text(tag, content, &marker)).await? {
                    return Ok(None);
                }
                script::marker_selector(&marker)
            }
            Anchor::Aria { role, name } => {
                let marker = Uuid::new_v4().to_string();
                if !self.stamp(script::tag_by_role(role, name, &marker)).await? {
                    return Ok(None);
                }
                script::marker_selector(&marker)
            }
        };

        match self.page.find_element(selector).await {
            Ok(element) => Ok(Some(element)),
            Err(err) => {
                let err = map_cdp_error(err);
                if err.is_fatal() {
                    Err(err)
                } else {
                    trace!(target: "cdp-adapter", %anchor, error = %err, "lookup missed");
                    Ok(None)
                }
            }
        }
    }

    async fn stamp(&self, js: String) -> Result<bool, AdapterError> {
        match self.page.evaluate(js).await {
            Ok(result) => Ok(result.into_value::<bool>().unwrap_or(false)),
            Err(err) => {
                let err = map_cdp_error(err);
                if err.is_fatal() {
                    Err(err)
                } else {
                    Ok(false)
                }
            }
        }
    }

    async fn element(&self, element: &ElementRef) -> Result<Element, AdapterError> {
        self.elements
            .lock()
            .await
            .take(element)
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::TargetNotFound)
                    .with_hint(format!("no live handle for {}", element.anchor))
            })
    }

    async fn put_back(&self, element: &ElementRef, handle: Element) {
        self.elements.lock().await.restore(element, handle);
    }
}

#[async_trait]
impl PageHandle for ChromiumPage {
    async fn url(&self) -> Result<Option<String>, AdapterError> {
        self.page.url().await.map_err(map_cdp_error)
    }

    async fn wait_for(
        &self,
        anchor: &Anchor,
        limit: Duration,
    ) -> Result<Option<ElementRef>, AdapterError> {
        let deadline = Instant::now() + limit;
        loop {
            if let Some(handle) = self.lookup(anchor).await? {
                let element = ElementRef::new(anchor.clone());
                let mut elements = self.elements.lock().await;
                elements.insert(&element, handle);
                trace!(target: "cdp-adapter", %anchor, live = elements.len(), "element handle stored");
                return Ok(Some(element));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn click(&self, element: &ElementRef) -> Result<(), AdapterError> {
        let handle = self.element(element).await?;
        let result = handle.click().await.map(|_| ()).map_err(map_cdp_error);
        self.put_back(element, handle).await;
        result
    }

    async fn select_all(&self, element: &ElementRef) -> Result<(), AdapterError> {
        let handle = self.element(element).await?;
        let result = handle
            .call_js_fn(script::SELECT_ALL_FN, false)
            .await
            .map(|_| ())
            .map_err(map_cdp_error);
        self.put_back(element, handle).await;
        result
    }

    async fn type_text(&self, element: &ElementRef, text: &str) -> Result<(), AdapterError> {
        let handle = self.element(element).await?;
        let result = handle.type_str(text).await.map(|_| ()).map_err(map_cdp_error);
        self.put_back(element, handle).await;
        result
    }
}
