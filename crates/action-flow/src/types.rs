//! Core types for swap orchestration

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swapbot_core_types::{RunId, SwapResult};

/// Stage of a swap run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapState {
    Idle,
    TokenSelected,
    AmountEntered,
    SlippageSet,
    Submitted,
    PopupHandled,
    Settled,
    Done,
    Failed,
}

impl SwapState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SwapState::Done | SwapState::Failed)
    }
}

/// One entry of a run's state trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub state: SwapState,
    pub at: DateTime<Utc>,
}

/// Fixed waits between swap steps.
///
/// The widget gives no reliable "ready" signal after most interactions, so
/// these are sleeps rather than conditions. They are the main source of
/// flakiness when the site is slow; raise them before touching selectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowTimings {
    /// After clicking connect-wallet, before looking for the wallet popup.
    pub after_connect_click: Duration,
    /// After opening the token selector.
    pub after_token_selector: Duration,
    /// After typing the symbol into the token search.
    pub after_search: Duration,
    /// After typing the amount, for quotes to refresh.
    pub after_amount: Duration,
    /// After opening the slippage settings.
    pub after_slippage_toggle: Duration,
    /// Per-strategy wait for the slippage input.
    pub slippage_input_timeout: Duration,
    /// After clicking swap, before the in-page confirm.
    pub after_swap_click: Duration,
    /// Per-strategy wait for each success indicator.
    pub success_timeout: Duration,
    /// Extra wait when no success indicator appeared.
    pub settle_grace: Duration,
}

impl Default for FlowTimings {
    fn default() -> Self {
        Self {
            after_connect_click: Duration::from_secs(2),
            after_token_selector: Duration::from_secs(1),
            after_search: Duration::from_secs(2),
            after_amount: Duration::from_secs(2),
            after_slippage_toggle: Duration::from_secs(1),
            slippage_input_timeout: Duration::from_secs(2),
            after_swap_click: Duration::from_secs(3),
            success_timeout: Duration::from_secs(30),
            settle_grace: Duration::from_secs(10),
        }
    }
}

/// Result of one run together with how it got there.
#[derive(Debug, Clone)]
pub struct SwapRun {
    pub run_id: RunId,
    pub result: SwapResult,
    pub trace: Vec<StateTransition>,
}

impl SwapRun {
    pub fn states(&self) -> Vec<SwapState> {
        self.trace.iter().map(|entry| entry.state).collect()
    }
}
