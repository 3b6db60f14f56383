//! Selector catalogue: which anchors to try for each UI role.
//!
//! The built-in catalogue mirrors the markup observed on OKX Web3 and its
//! MetaMask-style wallet popups. A YAML file keyed by role name can override
//! individual roles:
//!
//! ```yaml
//! swap-button:
//!   - kind: css
//!     selector: '[data-testid="swap-button"]'
//!   - kind: text
//!     tag: button
//!     content: Swap
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use swapbot_core_types::{Anchor, UiRole};
use tracing::{debug, info};

use crate::errors::LocatorError;
use crate::types::SelectorSet;

/// Mapping from every [`UiRole`] to its [`SelectorSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorCatalogue {
    sets: BTreeMap<UiRole, SelectorSet>,
}

fn css(selector: &str) -> Anchor {
    Anchor::css(selector)
}

fn button(content: &str) -> Anchor {
    Anchor::text("button", content)
}

impl SelectorCatalogue {
    pub fn empty() -> Self {
        Self {
            sets: BTreeMap::new(),
        }
    }

    /// Selectors for the OKX Web3 swap widget.
    pub fn okx_default() -> Self {
        let mut catalogue = Self::empty();
        let entries = [
            (
                UiRole::ConnectWallet,
                vec![
                    css(r#"[data-testid="connect-wallet"]"#),
                    button("Connect"),
                    css(".connect-wallet-btn"),
                    css(r#"[class*="connect"]"#),
                ],
            ),
            (
                UiRole::FromToken,
                vec![
                    css(r#"[data-testid="from-token-select"]"#),
                    css(".from-token-selector"),
                    css(".token-select:first-child"),
                ],
            ),
            (
                UiRole::ToToken,
                vec![
                    css(r#"[data-testid="to-token-select"]"#),
                    css(".to-token-selector"),
                    css(".token-select:last-child"),
                ],
            ),
            (
                UiRole::AmountInput,
                vec![
                    css(r#"[data-testid="amount-input"]"#),
                    css(".amount-input input"),
                    css(r#"input[placeholder*="amount"]"#),
                    css(r#"input[type="number"]"#),
                ],
            ),
            (
                UiRole::SwapButton,
                vec![
                    css(r#"[data-testid="swap-button"]"#),
                    button("Swap"),
                    css(".swap-btn"),
                ],
            ),
            (
                UiRole::ConfirmButton,
                vec![
                    css(r#"[data-testid="confirm"]"#),
                    button("Confirm"),
                    css(".confirm-btn"),
                ],
            ),
            (
                UiRole::SearchInput,
                vec![
                    css(r#"[data-testid="token-search"]"#),
                    css(".token-search input"),
                    css(r#"input[placeholder*="search"]"#),
                ],
            ),
            (
                UiRole::ResultItem,
                vec![
                    css(".token-list-item:first-child"),
                    css(r#"[data-testid="token-item"]:first-child"#),
                    css(".token-option:first-child"),
                ],
            ),
            (
                UiRole::SlippageToggle,
                vec![
                    css(r#"[data-testid="slippage-setting"]"#),
                    css(".slippage-setting"),
                    css(".settings-btn"),
                ],
            ),
            (
                UiRole::SlippageInput,
                vec![
                    css(".slippage-input"),
                    css(r#"[data-testid="slippage-input"]"#),
                    css(r#"input[placeholder*="slippage"]"#),
                ],
            ),
            (
                UiRole::SuccessIndicator,
                vec![
                    css(r#"[data-testid="transaction-success"]"#),
                    css(".success-message"),
                    css(".transaction-complete"),
                ],
            ),
            (
                UiRole::WalletConnectAction,
                vec![
                    css(r#"button[data-testid="page-container-footer-next"]"#),
                    button("Connect"),
                    css(".btn-primary"),
                ],
            ),
            (
                UiRole::WalletConfirmAction,
                vec![
                    css(r#"[data-testid="page-container-footer-next"]"#),
                    button("Confirm"),
                    css(".confirm-button"),
                ],
            ),
        ];
        for (role, strategies) in entries {
            catalogue.insert(SelectorSet::new(role, strategies));
        }
        catalogue
    }

    /// Add or replace the set for `set.role`.
    pub fn insert(&mut self, set: SelectorSet) {
        self.sets.insert(set.role, set);
    }

    pub fn get(&self, role: UiRole) -> Result<&SelectorSet, LocatorError> {
        self.sets.get(&role).ok_or(LocatorError::MissingRole(role))
    }

    pub fn roles(&self) -> impl Iterator<Item = UiRole> + '_ {
        self.sets.keys().copied()
    }

    /// Parse YAML overrides. Each listed role must carry at least one
    /// non-blank anchor.
    pub fn overrides_from_yaml(raw: &str) -> Result<Vec<SelectorSet>, LocatorError> {
        let parsed: BTreeMap<UiRole, Vec<Anchor>> =
            serde_yaml::from_str(raw).map_err(|err| LocatorError::Catalogue(err.to_string()))?;

        let mut sets = Vec::with_capacity(parsed.len());
        for (role, strategies) in parsed {
            if strategies.is_empty() {
                return Err(LocatorError::Catalogue(format!(
                    "role {} lists no strategies",
                    role
                )));
            }
            if let Some(blank) = strategies.iter().find(|anchor| anchor.is_blank()) {
                return Err(LocatorError::Catalogue(format!(
                    "role {} has a blank {} anchor",
                    role,
                    blank.kind()
                )));
            }
            sets.push(SelectorSet::new(role, strategies));
        }
        Ok(sets)
    }

    /// Built-in catalogue with the roles from `raw` replaced.
    pub fn from_yaml_str(raw: &str) -> Result<Self, LocatorError> {
        let mut catalogue = Self::okx_default();
        for set in Self::overrides_from_yaml(raw)? {
            debug!(role = %set.role, strategies = set.len(), "Overriding selector set");
            catalogue.insert(set);
        }
        Ok(catalogue)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LocatorError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| {
            LocatorError::Catalogue(format!("failed to read {}: {}", path.display(), err))
        })?;
        let catalogue = Self::from_yaml_str(&raw)?;
        info!(path = %path.display(), "Loaded selector catalogue");
        Ok(catalogue)
    }
}

impl Default for SelectorCatalogue {
    fn default() -> Self {
        Self::okx_default()
    }
}
