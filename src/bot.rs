//! One complete bot run over a single browser session.

use action_flow::SwapOrchestrator;
use cdp_adapter::{AdapterError, BrowserSession};
use swapbot_core_types::{SwapDirection, SwapResult};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::RunPlan;

/// Failures that stop a run before any swap step.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("Browser launch failed: {0}")]
    Launch(#[source] AdapterError),

    #[error("Could not open token page: {0}")]
    Navigation(#[source] AdapterError),
}

/// Launch, open the token page, connect the wallet and swap once.
pub struct SwapBot {
    session: BrowserSession,
    orchestrator: SwapOrchestrator,
}

impl SwapBot {
    pub fn new(session: BrowserSession, orchestrator: SwapOrchestrator) -> Self {
        Self {
            session,
            orchestrator,
        }
    }

    /// Perform the run. The browser is closed on every path.
    pub async fn run(mut self, token_address: &str, plan: &RunPlan) -> Result<SwapResult, BotError> {
        let outcome = self.drive(token_address, plan).await;
        self.session.close().await;
        outcome
    }

    async fn drive(&mut self, token_address: &str, plan: &RunPlan) -> Result<SwapResult, BotError> {
        self.session.init().await.map_err(BotError::Launch)?;
        self.session
            .navigate_to_token(token_address)
            .await
            .map_err(BotError::Navigation)?;

        if !self.orchestrator.connect_wallet(&mut self.session).await {
            warn!("Continuing without a confirmed wallet connection");
        }

        let result = match plan.direction {
            SwapDirection::Buy => {
                self.orchestrator
                    .buy_token(
                        &mut self.session,
                        &plan.token_symbol,
                        plan.amount,
                        plan.slippage_percent,
                    )
                    .await
            }
            SwapDirection::Sell => {
                self.orchestrator
                    .sell_token(
                        &mut self.session,
                        &plan.token_symbol,
                        plan.amount,
                        plan.slippage_percent,
                    )
                    .await
            }
        };
        info!(success = result.success, "Run finished");
        Ok(result)
    }
}
