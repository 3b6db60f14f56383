use std::sync::Arc;
use std::time::Duration;

use action_locator::{
    ElementResolver, Resolution, ResolveMode, SelectorCatalogue, SelectorResolver, SelectorSet,
};
use cdp_adapter::{BrowserSession, PageHandle};
use swapbot_core_types::UiRole;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::predicate::UrlPredicate;
use crate::PopupError;

/// How a popup checkpoint ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PopupOutcome {
    /// A matching window was found and one of its actions was clicked.
    Handled { url: String, strategy: usize },
    /// No open window matched.
    Absent,
    /// A window matched but none of its actions could be clicked.
    Unresponsive { url: String },
    /// The caller cancelled while waiting for the popup.
    Cancelled,
}

impl PopupOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, PopupOutcome::Handled { .. })
    }
}

/// Delays for the two wallet checkpoints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PopupTimings {
    pub connect_grace: Duration,
    pub connect_strategy_timeout: Duration,
    pub connect_post_action: Duration,
    pub confirm_grace: Duration,
    pub confirm_strategy_timeout: Duration,
    pub confirm_post_action: Duration,
}

impl Default for PopupTimings {
    fn default() -> Self {
        Self {
            connect_grace: Duration::from_secs(2),
            connect_strategy_timeout: Duration::from_secs(3),
            connect_post_action: Duration::from_secs(1),
            confirm_grace: Duration::from_secs(3),
            // Signing prompts render slower than the connect dialog.
            confirm_strategy_timeout: Duration::from_secs(5),
            confirm_post_action: Duration::ZERO,
        }
    }
}

/// Everything needed to handle one kind of popup.
#[derive(Clone, Debug)]
pub struct PopupPlan {
    pub predicate: UrlPredicate,
    pub actions: SelectorSet,
    /// Time given to the popup to spawn before windows are enumerated.
    pub grace: Duration,
    pub strategy_timeout: Duration,
    pub post_action: Duration,
}

pub struct PopupCoordinator {
    resolver: Arc<dyn ElementResolver>,
    connect: PopupPlan,
    confirm: PopupPlan,
}

impl PopupCoordinator {
    pub fn new(catalogue: &SelectorCatalogue) -> Result<Self, PopupError> {
        Self::with_parts(
            catalogue,
            Arc::new(SelectorResolver::new()),
            PopupTimings::default(),
        )
    }

    pub fn with_parts(
        catalogue: &SelectorCatalogue,
        resolver: Arc<dyn ElementResolver>,
        timings: PopupTimings,
    ) -> Result<Self, PopupError> {
        let connect = PopupPlan {
            predicate: UrlPredicate::WalletConnect,
            actions: catalogue.get(UiRole::WalletConnectAction)?.clone(),
            grace: timings.connect_grace,
            strategy_timeout: timings.connect_strategy_timeout,
            post_action: timings.connect_post_action,
        };
        let confirm = PopupPlan {
            predicate: UrlPredicate::TxConfirmation,
            actions: catalogue.get(UiRole::WalletConfirmAction)?.clone(),
            grace: timings.confirm_grace,
            strategy_timeout: timings.confirm_strategy_timeout,
            post_action: timings.confirm_post_action,
        };
        Ok(Self {
            resolver,
            connect,
            confirm,
        })
    }

    pub fn connect_plan(&self) -> &PopupPlan {
        &self.connect
    }

    pub fn confirm_plan(&self) -> &PopupPlan {
        &self.confirm
    }

    /// Approve a wallet connection request, if the wallet asks for one.
    pub async fn connect_wallet(
        &self,
        session: &BrowserSession,
        cancel: &CancellationToken,
    ) -> PopupOutcome {
        self.handle(session, &self.connect, cancel).await
    }

    /// Sign the pending transaction in the wallet, if it prompts.
    pub async fn confirm_transaction(
        &self,
        session: &BrowserSession,
        cancel: &CancellationToken,
    ) -> PopupOutcome {
        self.handle(session, &self.confirm, cancel).await
    }

    pub async fn handle(
        &self,
        session: &BrowserSession,
        plan: &PopupPlan,
        cancel: &CancellationToken,
    ) -> PopupOutcome {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(popup = %plan.predicate, "Popup wait cancelled");
                return PopupOutcome::Cancelled;
            }
            _ = sleep(plan.grace) => {}
        }

        let Some((window, url)) = self.find_window(session, &plan.predicate).await else {
            info!(popup = %plan.predicate, "No wallet popup open");
            return PopupOutcome::Absent;
        };

        info!(popup = %plan.predicate, %url, "Handling wallet popup");
        let resolve = self.resolver.resolve_with_timeout(
            window.as_ref(),
            &plan.actions,
            ResolveMode::Click,
            plan.strategy_timeout,
        );
        let resolution = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(popup = %plan.predicate, %url, "Popup handling cancelled");
                return PopupOutcome::Cancelled;
            }
            resolution = resolve => resolution,
        };

        match resolution {
            Ok(Resolution::Found { strategy, .. }) => {
                if !plan.post_action.is_zero() {
                    tokio::select! {
                        _ = cancel.cancelled() => return PopupOutcome::Cancelled,
                        _ = sleep(plan.post_action) => {}
                    }
                }
                info!(popup = %plan.predicate, %url, strategy, "Wallet popup handled");
                PopupOutcome::Handled { url, strategy }
            }
            Ok(Resolution::NotFound { attempted, .. }) => {
                warn!(popup = %plan.predicate, %url, attempted, "Wallet popup had no usable action");
                PopupOutcome::Unresponsive { url }
            }
            Err(err) => {
                warn!(popup = %plan.predicate, %url, error = %err, "Wallet popup handling failed");
                PopupOutcome::Unresponsive { url }
            }
        }
    }

    async fn find_window(
        &self,
        session: &BrowserSession,
        predicate: &UrlPredicate,
    ) -> Option<(Arc<dyn PageHandle>, String)> {
        let windows = match session.windows().await {
            Ok(windows) => windows,
            Err(err) => {
                warn!(error = %err, "Could not enumerate browser windows");
                return None;
            }
        };

        for window in windows {
            match window.url().await {
                Ok(Some(url)) if predicate.matches(&url) => return Some((window, url)),
                Ok(_) => {}
                Err(err) => debug!(error = %err, "Skipping window without a readable address"),
            }
        }
        None
    }
}
