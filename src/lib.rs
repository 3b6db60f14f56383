//! Swapbot - browser-driven token swaps on the OKX Web3 DEX widget
//!
//! The binary wires environment configuration, a Chromium session and the
//! swap orchestrator together; this library exposes those pieces so they
//! can be driven against a simulated browser.

pub mod bot;
pub mod cli;
pub mod config;

pub use bot::{BotError, SwapBot};
pub use config::{ConfigError, RunMode, RunPlan, SwapbotConfig};

/// Version string with build metadata.
pub const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("SWAPBOT_GIT_HASH"),
    " ",
    env!("SWAPBOT_BUILD_DATE"),
    ")"
);
