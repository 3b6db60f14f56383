//! Error types for the locator

use cdp_adapter::AdapterError;
use swapbot_core_types::UiRole;
use thiserror::Error;

/// Exceptional locator failures. A role that simply is not on the page is
/// reported through [`crate::Resolution::NotFound`] instead.
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// Selector set has no strategies to try
    #[error("selector set for {0} is empty")]
    EmptySet(UiRole),

    /// Catalogue has no entry for the role
    #[error("no selectors configured for {0}")]
    MissingRole(UiRole),

    /// Catalogue file could not be read or is malformed
    #[error("invalid selector catalogue: {0}")]
    Catalogue(String),

    /// Browser transport or session failure
    #[error("browser error: {0}")]
    Adapter(#[from] AdapterError),
}

impl LocatorError {
    /// Whether the browser session itself is gone.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LocatorError::Adapter(err) if err.is_fatal())
    }
}
