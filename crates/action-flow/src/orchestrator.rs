//! Swap orchestrator implementation

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use action_locator::{
    ElementResolver, LocatorError, Resolution, ResolveMode, SelectorCatalogue, SelectorResolver,
};
use cdp_adapter::{BrowserSession, ElementRef, PageHandle};
use chrono::Utc;
use swapbot_core_types::{
    RunId, Settlement, SwapDirection, SwapRequest, SwapResult, UiRole, DEFAULT_SLIPPAGE_PERCENT,
};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use wallet_popup::{PopupCoordinator, PopupOutcome};

use crate::errors::FlowError;
use crate::types::{FlowTimings, StateTransition, SwapRun, SwapState};

/// Drives the swap widget through a buy or a sell.
///
/// A run borrows the session mutably, so a session can only ever host one
/// run at a time.
pub struct SwapOrchestrator {
    catalogue: SelectorCatalogue,
    resolver: Arc<dyn ElementResolver>,
    popups: PopupCoordinator,
    timings: FlowTimings,
    cancel: CancellationToken,
}

impl SwapOrchestrator {
    pub fn new(catalogue: SelectorCatalogue) -> Result<Self, FlowError> {
        let popups = PopupCoordinator::new(&catalogue)?;
        Ok(Self::with_parts(
            catalogue,
            Arc::new(SelectorResolver::new()),
            popups,
        ))
    }

    pub fn with_parts(
        catalogue: SelectorCatalogue,
        resolver: Arc<dyn ElementResolver>,
        popups: PopupCoordinator,
    ) -> Self {
        Self {
            catalogue,
            resolver,
            popups,
            timings: FlowTimings::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timings(mut self, timings: FlowTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Token that aborts pending waits of any run on this orchestrator.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn timings(&self) -> &FlowTimings {
        &self.timings
    }

    /// Click connect-wallet and approve the wallet popup if one shows up.
    ///
    /// A missing connect button is taken to mean the wallet is already
    /// connected. Only exceptional failures yield `false`.
    pub async fn connect_wallet(&self, session: &mut BrowserSession) -> bool {
        info!("Connecting wallet");
        match self.try_connect_wallet(session).await {
            Ok(true) => {
                info!("Wallet connected");
                true
            }
            Ok(false) => {
                info!("Connect button not shown; wallet may already be connected");
                true
            }
            Err(err) => {
                error!(error = %err, "Wallet connection failed");
                false
            }
        }
    }

    async fn try_connect_wallet(&self, session: &BrowserSession) -> Result<bool, FlowError> {
        let page = session.primary()?;
        let set = self.catalogue.get(UiRole::ConnectWallet)?;
        let resolution = self
            .until_cancelled(self.resolver.resolve(page.as_ref(), set, ResolveMode::Click))
            .await??;
        if !resolution.is_found() {
            return Ok(false);
        }

        self.pause(self.timings.after_connect_click).await?;
        match self.popups.connect_wallet(session, &self.cancel).await {
            PopupOutcome::Cancelled => Err(FlowError::Cancelled),
            outcome => {
                debug!(?outcome, "Wallet connect popup checkpoint");
                Ok(true)
            }
        }
    }

    pub async fn buy_token(
        &self,
        session: &mut BrowserSession,
        token_symbol: &str,
        amount: f64,
        slippage_percent: f64,
    ) -> SwapResult {
        self.run_checked(session, SwapDirection::Buy, token_symbol, amount, slippage_percent)
            .await
    }

    pub async fn sell_token(
        &self,
        session: &mut BrowserSession,
        token_symbol: &str,
        amount: f64,
        slippage_percent: f64,
    ) -> SwapResult {
        self.run_checked(session, SwapDirection::Sell, token_symbol, amount, slippage_percent)
            .await
    }

    async fn run_checked(
        &self,
        session: &mut BrowserSession,
        direction: SwapDirection,
        token_symbol: &str,
        amount: f64,
        slippage_percent: f64,
    ) -> SwapResult {
        match SwapRequest::new(direction, token_symbol, amount, slippage_percent) {
            Ok(request) => self.execute(session, &request).await,
            Err(err) => {
                let err = FlowError::from(err);
                error!(%direction, token = token_symbol, amount, error = %err, "Rejected swap request");
                SwapResult::rejected(direction, token_symbol, amount, err.to_string())
            }
        }
    }

    /// Run one swap. Hard failures are folded into the result.
    pub async fn execute(&self, session: &mut BrowserSession, request: &SwapRequest) -> SwapResult {
        self.execute_traced(session, request).await.result
    }

    /// Like [`execute`](Self::execute), also returning the state trace.
    pub async fn execute_traced(
        &self,
        session: &mut BrowserSession,
        request: &SwapRequest,
    ) -> SwapRun {
        let run_id = RunId::new();
        let span = info_span!(
            "swap",
            run_id = %run_id,
            direction = %request.direction(),
            token = %request.token_symbol()
        );

        async {
            info!(
                amount = request.amount(),
                slippage = request.slippage_percent(),
                "Starting swap"
            );
            let mut trace = Trace::new();
            let result = match self.run(session, request, &mut trace).await {
                Ok(settlement) => {
                    trace.enter(SwapState::Done);
                    match &settlement {
                        Settlement::Confirmed { indicator } => {
                            info!(%indicator, "Swap completed")
                        }
                        Settlement::Likely => {
                            warn!("Swap likely completed; no success indicator was seen")
                        }
                    }
                    SwapResult::done(request, settlement)
                }
                Err(err) => {
                    error!(error = %err, last_state = ?trace.current(), "Swap failed");
                    trace.enter(SwapState::Failed);
                    SwapResult::failed(request, err.to_string())
                }
            };
            SwapRun {
                run_id: run_id.clone(),
                result,
                trace: trace.entries,
            }
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        session: &BrowserSession,
        request: &SwapRequest,
        trace: &mut Trace,
    ) -> Result<Settlement, FlowError> {
        let page = session.primary()?;
        let page = page.as_ref();

        self.select_token(page, request).await?;
        trace.enter(SwapState::TokenSelected);

        self.enter_amount(page, request).await?;
        trace.enter(SwapState::AmountEntered);

        if request.needs_custom_slippage() {
            if self.set_slippage(page, request).await? {
                trace.enter(SwapState::SlippageSet);
            } else {
                info!(
                    requested = request.slippage_percent(),
                    "Slippage left at the site default"
                );
            }
        } else {
            debug!(default = DEFAULT_SLIPPAGE_PERCENT, "Keeping default slippage");
        }

        self.submit(page).await?;
        trace.enter(SwapState::Submitted);

        match self.popups.confirm_transaction(session, &self.cancel).await {
            PopupOutcome::Cancelled => return Err(FlowError::Cancelled),
            PopupOutcome::Handled { url, .. } => info!(%url, "Transaction confirmed in wallet"),
            PopupOutcome::Absent => info!("No signing popup appeared"),
            PopupOutcome::Unresponsive { url } => {
                warn!(%url, "Signing popup could not be confirmed")
            }
        }
        trace.enter(SwapState::PopupHandled);

        let settlement = self.await_settlement(page).await?;
        trace.enter(SwapState::Settled);
        Ok(settlement)
    }

    async fn select_token(
        &self,
        page: &dyn PageHandle,
        request: &SwapRequest,
    ) -> Result<(), FlowError> {
        let direction = request.direction();
        info!(position = direction.position(), token = request.token_symbol(), "Selecting token");

        let selector = self
            .lookup(page, direction.token_role(), ResolveMode::Click)
            .await?;
        if !selector.is_found() {
            return Err(FlowError::NotFound(format!(
                "{} token selector not found",
                direction.position()
            )));
        }
        self.pause(self.timings.after_token_selector).await?;

        let search = self
            .lookup(page, UiRole::SearchInput, ResolveMode::Locate)
            .await?;
        match search.element() {
            Some(input) => {
                let typed = async {
                    page.click(input).await?;
                    page.type_text(input, request.token_symbol()).await
                }
                .await;
                soft(typed.map_err(LocatorError::from), "token search")?;
                self.pause(self.timings.after_search).await?;
            }
            None => warn!("Token search input not found; relying on the default list"),
        }

        match self.lookup(page, UiRole::ResultItem, ResolveMode::Click).await? {
            Resolution::Found {
                strategy, anchor, ..
            } => {
                // The first result is taken on trust; log enough to audit it.
                info!(
                    token = request.token_symbol(),
                    strategy,
                    %anchor,
                    "Picked first search result"
                );
            }
            Resolution::NotFound { .. } => warn!("No token search result to pick"),
        }
        Ok(())
    }

    async fn enter_amount(
        &self,
        page: &dyn PageHandle,
        request: &SwapRequest,
    ) -> Result<(), FlowError> {
        let amount = request.amount_text();
        info!(%amount, "Entering amount");

        let input = self
            .lookup(page, UiRole::AmountInput, ResolveMode::Locate)
            .await?
            .into_element()
            .ok_or_else(|| FlowError::NotFound("Amount input field not found".to_string()))?;

        overwrite(page, &input, &amount).await?;
        self.pause(self.timings.after_amount).await
    }

    /// Returns whether the percentage was actually typed.
    async fn set_slippage(
        &self,
        page: &dyn PageHandle,
        request: &SwapRequest,
    ) -> Result<bool, FlowError> {
        let percent = request.slippage_text();
        info!(%percent, "Setting slippage");

        let toggle = soft(
            self.until_cancelled(self.resolve(page, UiRole::SlippageToggle, ResolveMode::Click))
                .await?,
            "slippage toggle",
        )?;
        if !toggle.map(|r| r.is_found()).unwrap_or(false) {
            warn!("Slippage settings not found; keeping the site default");
            return Ok(false);
        }
        self.pause(self.timings.after_slippage_toggle).await?;

        let set = self.catalogue.get(UiRole::SlippageInput)?;
        let located = soft(
            self.until_cancelled(self.resolver.resolve_with_timeout(
                page,
                set,
                ResolveMode::Locate,
                self.timings.slippage_input_timeout,
            ))
            .await?,
            "slippage input",
        )?;
        let Some(input) = located.and_then(Resolution::into_element) else {
            warn!("Slippage input not found; keeping the site default");
            return Ok(false);
        };

        let typed = overwrite(page, &input, &percent).await;
        Ok(soft(typed.map_err(LocatorError::from), "slippage input")?.is_some())
    }

    async fn submit(&self, page: &dyn PageHandle) -> Result<(), FlowError> {
        info!("Submitting swap");
        let swap = self
            .lookup(page, UiRole::SwapButton, ResolveMode::Click)
            .await?;
        if !swap.is_found() {
            return Err(FlowError::NotFound("Swap button not found".to_string()));
        }
        self.pause(self.timings.after_swap_click).await?;

        let confirm = soft(
            self.until_cancelled(self.resolve(page, UiRole::ConfirmButton, ResolveMode::Click))
                .await?,
            "confirm button",
        )?;
        match confirm {
            Some(resolution) if resolution.is_found() => info!("Confirmed swap in page"),
            _ => debug!("No in-page confirmation step"),
        }
        Ok(())
    }

    async fn await_settlement(&self, page: &dyn PageHandle) -> Result<Settlement, FlowError> {
        info!("Waiting for transaction to complete");
        let set = self.catalogue.get(UiRole::SuccessIndicator)?;
        let found = soft(
            self.until_cancelled(self.resolver.resolve_with_timeout(
                page,
                set,
                ResolveMode::Locate,
                self.timings.success_timeout,
            ))
            .await?,
            "success indicator",
        )?;

        if let Some(Resolution::Found { anchor, .. }) = found {
            return Ok(Settlement::Confirmed {
                indicator: anchor.to_string(),
            });
        }

        self.pause(self.timings.settle_grace).await?;
        Ok(Settlement::Likely)
    }

    async fn resolve(
        &self,
        page: &dyn PageHandle,
        role: UiRole,
        mode: ResolveMode,
    ) -> Result<Resolution, LocatorError> {
        let set = self.catalogue.get(role)?;
        self.resolver.resolve(page, set, mode).await
    }

    async fn lookup(
        &self,
        page: &dyn PageHandle,
        role: UiRole,
        mode: ResolveMode,
    ) -> Result<Resolution, FlowError> {
        Ok(self.until_cancelled(self.resolve(page, role, mode)).await??)
    }

    async fn pause(&self, duration: Duration) -> Result<(), FlowError> {
        if duration.is_zero() {
            return Ok(());
        }
        self.until_cancelled(sleep(duration)).await
    }

    /// Drive `work` unless the run is cancelled first.
    async fn until_cancelled<F: Future>(&self, work: F) -> Result<F::Output, FlowError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FlowError::Cancelled),
            output = work => Ok(output),
        }
    }
}

async fn overwrite(
    page: &dyn PageHandle,
    input: &ElementRef,
    text: &str,
) -> Result<(), cdp_adapter::AdapterError> {
    page.click(input).await?;
    page.select_all(input).await?;
    page.type_text(input, text).await
}

/// Swallow non-fatal locator failures of optional steps.
fn soft<T>(result: Result<T, LocatorError>, step: &str) -> Result<Option<T>, FlowError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_fatal() => Err(err.into()),
        Err(err) => {
            warn!(step, error = %err, "Optional step failed");
            Ok(None)
        }
    }
}

struct Trace {
    entries: Vec<StateTransition>,
}

impl Trace {
    fn new() -> Self {
        let mut trace = Self {
            entries: Vec::new(),
        };
        trace.enter(SwapState::Idle);
        trace
    }

    fn enter(&mut self, state: SwapState) {
        info!(state = ?state, "Swap state");
        self.entries.push(StateTransition {
            state,
            at: Utc::now(),
        });
    }

    fn current(&self) -> Option<SwapState> {
        self.entries.last().map(|entry| entry.state)
    }
}
