//! Shared primitives for the swapbot automation crates.
//!
//! Everything here is plain data: the swap request an operator hands in, the
//! result a run hands back, the abstract UI roles the automation knows about
//! and the concrete anchors used to locate them on a page.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Default slippage tolerance in percent. Values above it trigger the
/// slippage configuration step.
pub const DEFAULT_SLIPPAGE_PERCENT: f64 = 1.0;

/// Validation failures raised while building a [`SwapRequest`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RequestError {
    #[error("token symbol must not be empty")]
    EmptySymbol,

    #[error("amount must be a finite number greater than zero, got {0}")]
    InvalidAmount(f64),

    #[error("slippage must be a finite, non-negative percentage, got {0}")]
    InvalidSlippage(f64),

    #[error("unknown swap direction '{0}'")]
    UnknownDirection(String),
}

/// Correlation id attached to every orchestration run.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which side of the pair the operator wants to end up holding.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapDirection {
    /// Spend the native asset to acquire the token.
    Buy,
    /// Spend the token to acquire the native asset.
    Sell,
}

impl SwapDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapDirection::Buy => "buy",
            SwapDirection::Sell => "sell",
        }
    }

    /// The token-selector role that receives the traded token.
    pub fn token_role(&self) -> UiRole {
        match self {
            SwapDirection::Buy => UiRole::ToToken,
            SwapDirection::Sell => UiRole::FromToken,
        }
    }

    /// Position label used in operator-facing messages ("to" / "from").
    pub fn position(&self) -> &'static str {
        match self {
            SwapDirection::Buy => "to",
            SwapDirection::Sell => "from",
        }
    }
}

impl fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SwapDirection {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(SwapDirection::Buy),
            "sell" => Ok(SwapDirection::Sell),
            other => Err(RequestError::UnknownDirection(other.to_string())),
        }
    }
}

/// One swap the orchestrator should perform. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SwapRequest {
    direction: SwapDirection,
    token_symbol: String,
    amount: f64,
    slippage_percent: f64,
}

impl SwapRequest {
    pub fn new(
        direction: SwapDirection,
        token_symbol: impl Into<String>,
        amount: f64,
        slippage_percent: f64,
    ) -> Result<Self, RequestError> {
        let token_symbol = token_symbol.into().trim().to_string();
        if token_symbol.is_empty() {
            return Err(RequestError::EmptySymbol);
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(RequestError::InvalidAmount(amount));
        }
        if !slippage_percent.is_finite() || slippage_percent < 0.0 {
            return Err(RequestError::InvalidSlippage(slippage_percent));
        }
        Ok(Self {
            direction,
            token_symbol,
            amount,
            slippage_percent,
        })
    }

    pub fn buy(token_symbol: impl Into<String>, amount: f64) -> Result<Self, RequestError> {
        Self::new(
            SwapDirection::Buy,
            token_symbol,
            amount,
            DEFAULT_SLIPPAGE_PERCENT,
        )
    }

    pub fn sell(token_symbol: impl Into<String>, amount: f64) -> Result<Self, RequestError> {
        Self::new(
            SwapDirection::Sell,
            token_symbol,
            amount,
            DEFAULT_SLIPPAGE_PERCENT,
        )
    }

    pub fn with_slippage(mut self, slippage_percent: f64) -> Result<Self, RequestError> {
        if !slippage_percent.is_finite() || slippage_percent < 0.0 {
            return Err(RequestError::InvalidSlippage(slippage_percent));
        }
        self.slippage_percent = slippage_percent;
        Ok(self)
    }

    pub fn direction(&self) -> SwapDirection {
        self.direction
    }

    pub fn token_symbol(&self) -> &str {
        &self.token_symbol
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn slippage_percent(&self) -> f64 {
        self.slippage_percent
    }

    /// Whether the run has to touch the slippage settings at all.
    pub fn needs_custom_slippage(&self) -> bool {
        self.slippage_percent > DEFAULT_SLIPPAGE_PERCENT
    }

    /// Amount rendered the way it is typed into the amount field.
    pub fn amount_text(&self) -> String {
        format_decimal(self.amount)
    }

    pub fn slippage_text(&self) -> String {
        format_decimal(self.slippage_percent)
    }
}

/// Shortest decimal rendering of a value (`0.01`, `1000`, `2.5`).
pub fn format_decimal(value: f64) -> String {
    format!("{}", value)
}

/// How sure the run is that the swap went through.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Settlement {
    /// A success indicator appeared on the page.
    Confirmed { indicator: String },
    /// No indicator appeared before the grace period ran out.
    Likely,
}

impl Settlement {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Settlement::Confirmed { .. })
    }
}

/// Outcome of exactly one orchestration run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SwapResult {
    pub success: bool,
    #[serde(rename = "type")]
    pub direction: SwapDirection,
    pub amount: f64,
    #[serde(rename = "token")]
    pub token_symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement: Option<Settlement>,
}

impl SwapResult {
    pub fn done(request: &SwapRequest, settlement: Settlement) -> Self {
        Self {
            success: true,
            direction: request.direction(),
            amount: request.amount(),
            token_symbol: request.token_symbol().to_string(),
            error: None,
            settlement: Some(settlement),
        }
    }

    pub fn failed(request: &SwapRequest, reason: impl Into<String>) -> Self {
        Self::rejected(
            request.direction(),
            request.token_symbol(),
            request.amount(),
            reason,
        )
    }

    /// Failure for input that never became a valid [`SwapRequest`].
    pub fn rejected(
        direction: SwapDirection,
        token_symbol: impl Into<String>,
        amount: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            direction,
            amount,
            token_symbol: token_symbol.into(),
            error: Some(reason.into()),
            settlement: None,
        }
    }

    /// True only for runs that succeeded on a visible success indicator.
    pub fn is_confirmed(&self) -> bool {
        self.success
            && self
                .settlement
                .as_ref()
                .map(Settlement::is_confirmed)
                .unwrap_or(false)
    }
}

/// Abstract UI purpose, independent of how the page currently renders it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UiRole {
    ConnectWallet,
    FromToken,
    ToToken,
    AmountInput,
    SwapButton,
    ConfirmButton,
    SearchInput,
    ResultItem,
    SlippageToggle,
    SlippageInput,
    SuccessIndicator,
    /// Approve button inside the wallet extension's connect popup.
    WalletConnectAction,
    /// Confirm button inside the wallet extension's signing popup.
    WalletConfirmAction,
}

impl UiRole {
    pub const ALL: [UiRole; 13] = [
        UiRole::ConnectWallet,
        UiRole::FromToken,
        UiRole::ToToken,
        UiRole::AmountInput,
        UiRole::SwapButton,
        UiRole::ConfirmButton,
        UiRole::SearchInput,
        UiRole::ResultItem,
        UiRole::SlippageToggle,
        UiRole::SlippageInput,
        UiRole::SuccessIndicator,
        UiRole::WalletConnectAction,
        UiRole::WalletConfirmAction,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            UiRole::ConnectWallet => "connect-wallet",
            UiRole::FromToken => "from-token",
            UiRole::ToToken => "to-token",
            UiRole::AmountInput => "amount-input",
            UiRole::SwapButton => "swap-button",
            UiRole::ConfirmButton => "confirm-button",
            UiRole::SearchInput => "search-input",
            UiRole::ResultItem => "result-item",
            UiRole::SlippageToggle => "slippage-toggle",
            UiRole::SlippageInput => "slippage-input",
            UiRole::SuccessIndicator => "success-indicator",
            UiRole::WalletConnectAction => "wallet-connect-action",
            UiRole::WalletConfirmAction => "wallet-confirm-action",
        }
    }
}

impl fmt::Display for UiRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One concrete way to find an element for a role.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anchor {
    /// Standard CSS selector.
    Css { selector: String },

    /// Element with the given tag whose normalized text contains `content`.
    Text { tag: String, content: String },

    /// Element with an ARIA role (or the tag implying it) whose accessible
    /// label contains `name`.
    Aria { role: String, name: String },
}

impl Anchor {
    pub fn css(selector: impl Into<String>) -> Self {
        Anchor::Css {
            selector: selector.into(),
        }
    }

    pub fn text(tag: impl Into<String>, content: impl Into<String>) -> Self {
        Anchor::Text {
            tag: tag.into(),
            content: content.into(),
        }
    }

    pub fn aria(role: impl Into<String>, name: impl Into<String>) -> Self {
        Anchor::Aria {
            role: role.into(),
            name: name.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Anchor::Css { .. } => "css",
            Anchor::Text { .. } => "text",
            Anchor::Aria { .. } => "aria",
        }
    }

    /// An anchor with nothing to match on can never resolve.
    pub fn is_blank(&self) -> bool {
        match self {
            Anchor::Css { selector } => selector.trim().is_empty(),
            Anchor::Text { tag, content } => tag.trim().is_empty() || content.trim().is_empty(),
            Anchor::Aria { role, name } => role.trim().is_empty() || name.trim().is_empty(),
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::Css { selector } => write!(f, "css({})", selector),
            Anchor::Text { tag, content } => write!(f, "text({} ~ \"{}\")", tag, content),
            Anchor::Aria { role, name } => write!(f, "aria({} ~ \"{}\")", role, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_rejects_non_positive_amount() {
        assert_eq!(
            SwapRequest::buy("RCADE", 0.0),
            Err(RequestError::InvalidAmount(0.0))
        );
        assert!(SwapRequest::sell("RCADE", -3.0).is_err());
        assert!(SwapRequest::buy("RCADE", f64::NAN).is_err());
    }

    #[test]
    fn request_trims_and_requires_symbol() {
        assert_eq!(SwapRequest::buy("   ", 1.0), Err(RequestError::EmptySymbol));
        let request = SwapRequest::buy(" RCADE ", 0.01).unwrap();
        assert_eq!(request.token_symbol(), "RCADE");
        assert_eq!(request.slippage_percent(), DEFAULT_SLIPPAGE_PERCENT);
        assert!(!request.needs_custom_slippage());
    }

    #[test]
    fn slippage_above_default_needs_configuration() {
        let request = SwapRequest::buy("RCADE", 0.01)
            .unwrap()
            .with_slippage(5.0)
            .unwrap();
        assert!(request.needs_custom_slippage());
        assert_eq!(request.slippage_text(), "5");
    }

    #[test]
    fn amounts_render_like_typed_text() {
        assert_eq!(format_decimal(0.01), "0.01");
        assert_eq!(format_decimal(1000.0), "1000");
        assert_eq!(format_decimal(2.5), "2.5");
    }

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("BUY".parse::<SwapDirection>(), Ok(SwapDirection::Buy));
        assert_eq!(" sell ".parse::<SwapDirection>(), Ok(SwapDirection::Sell));
        assert!("hold".parse::<SwapDirection>().is_err());
        assert_eq!(SwapDirection::Buy.token_role(), UiRole::ToToken);
        assert_eq!(SwapDirection::Sell.token_role(), UiRole::FromToken);
    }

    #[test]
    fn result_serializes_with_operator_field_names() {
        let request = SwapRequest::buy("RCADE", 0.01).unwrap();
        let result = SwapResult::done(&request, Settlement::Likely);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["type"], "buy");
        assert_eq!(value["token"], "RCADE");
        assert_eq!(value["amount"], 0.01);
        assert_eq!(value["settlement"]["status"], "likely");
        assert!(value.get("error").is_none());
        assert!(!result.is_confirmed());

        let failed = SwapResult::failed(&request, "Swap button not found");
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "Swap button not found");
    }

    #[test]
    fn anchors_round_trip_through_tagged_form() {
        let anchor: Anchor =
            serde_json::from_str(r#"{"kind":"text","tag":"button","content":"Swap"}"#).unwrap();
        assert_eq!(anchor, Anchor::text("button", "Swap"));
        assert_eq!(anchor.to_string(), "text(button ~ \"Swap\")");
        assert!(Anchor::css("  ").is_blank());
        assert!(!Anchor::aria("button", "Confirm").is_blank());
    }

    #[test]
    fn role_names_match_serde_names() {
        for role in UiRole::ALL {
            let encoded = serde_json::to_value(role).unwrap();
            assert_eq!(encoded, role.name());
        }
    }
}
