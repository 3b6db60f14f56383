//! Wallet popup handling.
//!
//! Browser wallets open their own windows to approve a connection or sign a
//! transaction. [`PopupCoordinator`] waits for such a window, finds it by
//! URL and clicks through it. Nothing here fails hard: a popup that never
//! shows up is a normal outcome (the wallet may already be connected), so
//! every path ends in a [`PopupOutcome`].

mod coordinator;
mod predicate;

pub use coordinator::{PopupCoordinator, PopupOutcome, PopupPlan, PopupTimings};
pub use predicate::UrlPredicate;

use action_locator::LocatorError;
use thiserror::Error;

/// Configuration problems detected while building a coordinator.
#[derive(Debug, Error)]
pub enum PopupError {
    #[error("wallet popup selectors unavailable: {0}")]
    Catalogue(#[from] LocatorError),
}
