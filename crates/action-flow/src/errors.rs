//! Flow execution error types

use thiserror::Error;

/// Hard failures that end a swap run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FlowError {
    /// A swap-critical control is missing; the message is operator-facing
    #[error("{0}")]
    NotFound(String),

    /// Request failed validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Locator failure other than a plain miss
    #[error("Locator error: {0}")]
    Locator(String),

    /// Browser session or transport failure
    #[error("Browser error: {0}")]
    Browser(String),

    /// Orchestrator was built from an unusable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The run was cancelled by its owner
    #[error("Swap cancelled")]
    Cancelled,
}

impl From<action_locator::LocatorError> for FlowError {
    fn from(err: action_locator::LocatorError) -> Self {
        match err {
            action_locator::LocatorError::Adapter(inner) => FlowError::Browser(inner.to_string()),
            other => FlowError::Locator(other.to_string()),
        }
    }
}

impl From<cdp_adapter::AdapterError> for FlowError {
    fn from(err: cdp_adapter::AdapterError) -> Self {
        FlowError::Browser(err.to_string())
    }
}

impl From<swapbot_core_types::RequestError> for FlowError {
    fn from(err: swapbot_core_types::RequestError) -> Self {
        FlowError::InvalidRequest(err.to_string())
    }
}

impl From<wallet_popup::PopupError> for FlowError {
    fn from(err: wallet_popup::PopupError) -> Self {
        FlowError::Config(err.to_string())
    }
}
