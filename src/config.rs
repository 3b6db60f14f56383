//! Environment-driven run configuration.

use std::env;
use std::path::PathBuf;

use cdp_adapter::config::CdpConfig;
use swapbot_core_types::{SwapDirection, DEFAULT_SLIPPAGE_PERCENT};
use thiserror::Error;

pub const DEFAULT_TOKEN_SYMBOL: &str = "RCADE";
pub const DEFAULT_AMOUNT: f64 = 0.01;
pub const DEFAULT_ETH_AMOUNT: f64 = 0.01;
pub const DEFAULT_TOKEN_AMOUNT: f64 = 1000.0;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("TOKEN_ADDRESS is not set")]
    MissingTokenAddress,

    #[error("Invalid action. Use: buy or sell")]
    InvalidAction(String),
}

/// How the amount, direction and headless flag are chosen for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Direction from the argument, else `ACTION`; amount from `AMOUNT`.
    Generic { action: Option<String> },
    /// Buy `ETH_AMOUNT` worth, headful unless forced.
    QuickBuy,
    /// Sell `TOKEN_AMOUNT` tokens, headful unless forced.
    QuickSell,
}

/// Everything the bot needs to perform one swap.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub direction: SwapDirection,
    pub token_symbol: String,
    pub amount: f64,
    pub slippage_percent: f64,
    pub headless: bool,
}

/// Values read from the process environment (or `.env`).
#[derive(Debug, Clone, PartialEq)]
pub struct SwapbotConfig {
    pub token_address: Option<String>,
    pub token_symbol: String,
    pub amount: f64,
    pub eth_amount: f64,
    pub token_amount: f64,
    pub slippage_percent: f64,
    pub action: Option<String>,
    pub headless: bool,
    /// Browser profile holding the wallet state.
    pub user_data_dir: Option<PathBuf>,
    /// Unpacked wallet extensions to load.
    pub extensions: Vec<PathBuf>,
}

impl Default for SwapbotConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl SwapbotConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            token_address: text("TOKEN_ADDRESS"),
            token_symbol: text("TOKEN_SYMBOL").unwrap_or_else(|| DEFAULT_TOKEN_SYMBOL.to_string()),
            amount: number_or(text("AMOUNT"), DEFAULT_AMOUNT),
            eth_amount: number_or(text("ETH_AMOUNT"), DEFAULT_ETH_AMOUNT),
            token_amount: number_or(text("TOKEN_AMOUNT"), DEFAULT_TOKEN_AMOUNT),
            slippage_percent: number_or(text("SLIPPAGE"), DEFAULT_SLIPPAGE_PERCENT),
            action: text("ACTION"),
            headless: text("HEADLESS").as_deref() == Some("true"),
            user_data_dir: text("SWAPBOT_PROFILE_DIR").map(PathBuf::from),
            extensions: text("SWAPBOT_EXTENSIONS")
                .map(|raw| path_list(&raw))
                .unwrap_or_default(),
        }
    }

    pub fn token_address(&self) -> Result<&str, ConfigError> {
        self.token_address
            .as_deref()
            .ok_or(ConfigError::MissingTokenAddress)
    }

    /// Pick direction, amount and window mode for `mode`.
    ///
    /// `force_headless` overrides both `HEADLESS` and the headful default of
    /// the quick modes.
    pub fn plan(&self, mode: &RunMode, force_headless: bool) -> Result<RunPlan, ConfigError> {
        let (direction, amount, headless) = match mode {
            RunMode::Generic { action } => {
                let raw = action
                    .as_deref()
                    .or(self.action.as_deref())
                    .unwrap_or("buy");
                let direction = raw
                    .parse::<SwapDirection>()
                    .map_err(|_| ConfigError::InvalidAction(raw.to_string()))?;
                (direction, self.amount, self.headless)
            }
            RunMode::QuickBuy => (SwapDirection::Buy, self.eth_amount, false),
            RunMode::QuickSell => (SwapDirection::Sell, self.token_amount, false),
        };

        Ok(RunPlan {
            direction,
            token_symbol: self.token_symbol.clone(),
            amount,
            slippage_percent: self.slippage_percent,
            headless: headless || force_headless,
        })
    }

    /// Browser settings for `plan`, with an explicit executable when given.
    pub fn cdp_config(&self, plan: &RunPlan, chrome: Option<PathBuf>) -> CdpConfig {
        let mut cfg = CdpConfig::default().with_headless(plan.headless);
        if let Some(path) = chrome {
            cfg = cfg.with_executable(path);
        }
        if let Some(dir) = &self.user_data_dir {
            cfg = cfg.with_user_data_dir(dir.clone());
        }
        for extension in &self.extensions {
            cfg = cfg.with_extension(extension.clone());
        }
        cfg
    }
}

/// Comma-separated paths; blank entries are skipped.
fn path_list(raw: &str) -> Vec<PathBuf> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Unparsable, zero and NaN values fall back to `default`.
fn number_or(raw: Option<String>, default: f64) -> f64 {
    raw.and_then(|value| value.parse::<f64>().ok())
        .filter(|value| *value != 0.0 && !value.is_nan())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> SwapbotConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SwapbotConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = lookup(&[]);
        assert_eq!(cfg.token_address, None);
        assert_eq!(cfg.token_symbol, "RCADE");
        assert_eq!(cfg.amount, 0.01);
        assert_eq!(cfg.eth_amount, 0.01);
        assert_eq!(cfg.token_amount, 1000.0);
        assert_eq!(cfg.slippage_percent, 1.0);
        assert!(!cfg.headless);
        assert_eq!(cfg.token_address(), Err(ConfigError::MissingTokenAddress));
    }

    #[test]
    fn unparsable_or_zero_numbers_fall_back() {
        let cfg = lookup(&[("AMOUNT", "abc"), ("SLIPPAGE", "0"), ("TOKEN_AMOUNT", "NaN")]);
        assert_eq!(cfg.amount, DEFAULT_AMOUNT);
        assert_eq!(cfg.slippage_percent, DEFAULT_SLIPPAGE_PERCENT);
        assert_eq!(cfg.token_amount, DEFAULT_TOKEN_AMOUNT);
    }

    #[test]
    fn explicit_values_are_kept() {
        let cfg = lookup(&[
            ("TOKEN_ADDRESS", " 0xabc "),
            ("TOKEN_SYMBOL", "PEPE"),
            ("AMOUNT", "0.5"),
            ("SLIPPAGE", "2.5"),
            ("HEADLESS", "true"),
        ]);
        assert_eq!(cfg.token_address(), Ok("0xabc"));
        assert_eq!(cfg.token_symbol, "PEPE");
        assert_eq!(cfg.amount, 0.5);
        assert_eq!(cfg.slippage_percent, 2.5);
        assert!(cfg.headless);
    }

    #[test]
    fn headless_requires_exact_true() {
        assert!(!lookup(&[("HEADLESS", "1")]).headless);
        assert!(!lookup(&[("HEADLESS", "TRUE")]).headless);
    }

    #[test]
    fn generic_mode_prefers_argument_over_env() {
        let cfg = lookup(&[("ACTION", "buy"), ("AMOUNT", "3")]);
        let plan = cfg
            .plan(&RunMode::Generic { action: Some("sell".into()) }, false)
            .unwrap();
        assert_eq!(plan.direction, SwapDirection::Sell);
        assert_eq!(plan.amount, 3.0);

        let plan = cfg.plan(&RunMode::Generic { action: None }, false).unwrap();
        assert_eq!(plan.direction, SwapDirection::Buy);
    }

    #[test]
    fn generic_mode_rejects_unknown_action() {
        let cfg = lookup(&[("ACTION", "hold")]);
        let err = cfg.plan(&RunMode::Generic { action: None }, false).unwrap_err();
        assert_eq!(err, ConfigError::InvalidAction("hold".into()));
        assert_eq!(err.to_string(), "Invalid action. Use: buy or sell");
    }

    #[test]
    fn quick_modes_use_their_own_amounts_and_stay_headful() {
        let cfg = lookup(&[("HEADLESS", "true"), ("ETH_AMOUNT", "0.2"), ("TOKEN_AMOUNT", "50")]);

        let buy = cfg.plan(&RunMode::QuickBuy, false).unwrap();
        assert_eq!((buy.direction, buy.amount, buy.headless), (SwapDirection::Buy, 0.2, false));

        let sell = cfg.plan(&RunMode::QuickSell, true).unwrap();
        assert_eq!((sell.direction, sell.amount, sell.headless), (SwapDirection::Sell, 50.0, true));
    }

    #[test]
    fn cdp_config_follows_plan() {
        let cfg = lookup(&[("HEADLESS", "true")]);
        let plan = cfg.plan(&RunMode::Generic { action: None }, false).unwrap();
        let cdp = cfg.cdp_config(&plan, Some(PathBuf::from("/opt/chrome")));
        assert!(cdp.headless);
        assert_eq!(cdp.executable, Some(PathBuf::from("/opt/chrome")));
        assert_eq!(cdp.user_data_dir, None);
        assert!(cdp.extensions.is_empty());
    }

    #[test]
    fn wallet_profile_and_extensions_reach_the_browser() {
        let mut cfg = lookup(&[
            ("SWAPBOT_PROFILE_DIR", "/home/op/.swapbot/profile"),
            ("SWAPBOT_EXTENSIONS", "/ext/metamask, ,/ext/okx-wallet"),
        ]);
        cfg.extensions.push(PathBuf::from("/ext/rabby"));
        let plan = cfg.plan(&RunMode::QuickBuy, false).unwrap();

        let cdp = cfg.cdp_config(&plan, None);

        assert_eq!(
            cdp.user_data_dir,
            Some(PathBuf::from("/home/op/.swapbot/profile"))
        );
        assert_eq!(
            cdp.extensions,
            vec![
                PathBuf::from("/ext/metamask"),
                PathBuf::from("/ext/okx-wallet"),
                PathBuf::from("/ext/rabby"),
            ]
        );
    }
}
