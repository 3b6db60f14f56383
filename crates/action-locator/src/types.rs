//! Core types for the locator

use cdp_adapter::ElementRef;
use serde::{Deserialize, Serialize};
use swapbot_core_types::{Anchor, UiRole};

/// What to do with the first element that matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Click it; a failed click counts as that strategy failing.
    Click,
    /// Hand it back untouched.
    Locate,
}

impl ResolveMode {
    pub fn name(&self) -> &'static str {
        match self {
            ResolveMode::Click => "click",
            ResolveMode::Locate => "locate",
        }
    }
}

/// Ordered strategies for one role. Index 0 is tried first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorSet {
    pub role: UiRole,
    pub strategies: Vec<Anchor>,
}

impl SelectorSet {
    pub fn new(role: UiRole, strategies: impl IntoIterator<Item = Anchor>) -> Self {
        Self {
            role,
            strategies: strategies.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// Outcome of resolving one selector set.
#[derive(Debug, Clone)]
pub enum Resolution {
    Found {
        element: ElementRef,
        /// Index of the strategy that matched
        strategy: usize,
        anchor: Anchor,
    },
    NotFound {
        role: UiRole,
        /// Number of strategies that were tried and timed out
        attempted: usize,
    },
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found { .. })
    }

    pub fn element(&self) -> Option<&ElementRef> {
        match self {
            Resolution::Found { element, .. } => Some(element),
            Resolution::NotFound { .. } => None,
        }
    }

    pub fn into_element(self) -> Option<ElementRef> {
        match self {
            Resolution::Found { element, .. } => Some(element),
            Resolution::NotFound { .. } => None,
        }
    }

    pub fn strategy(&self) -> Option<usize> {
        match self {
            Resolution::Found { strategy, .. } => Some(*strategy),
            Resolution::NotFound { .. } => None,
        }
    }
}
