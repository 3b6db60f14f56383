//! Page-level operations the automation layers are allowed to perform.

use std::time::Duration;

use async_trait::async_trait;
use swapbot_core_types::Anchor;

use crate::error::AdapterError;
use crate::ids::ElementId;

/// Handle to an element that matched an anchor on a specific page.
///
/// Handles are only meaningful on the page that produced them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementRef {
    pub id: ElementId,
    pub anchor: Anchor,
}

impl ElementRef {
    pub fn new(anchor: Anchor) -> Self {
        Self {
            id: ElementId::new(),
            anchor,
        }
    }
}

/// A browser window (primary page or secondary popup).
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Current address of the window, if it has committed one.
    async fn url(&self) -> Result<Option<String>, AdapterError>;

    /// Wait up to `timeout` for an element matching `anchor`.
    ///
    /// `Ok(None)` means the wait elapsed without a match. Errors are reserved
    /// for transport or session failures.
    async fn wait_for(
        &self,
        anchor: &Anchor,
        timeout: Duration,
    ) -> Result<Option<ElementRef>, AdapterError>;

    async fn click(&self, element: &ElementRef) -> Result<(), AdapterError>;

    /// Select the element's current content so the next keystrokes replace it.
    async fn select_all(&self, element: &ElementRef) -> Result<(), AdapterError>;

    async fn type_text(&self, element: &ElementRef, text: &str) -> Result<(), AdapterError>;
}
