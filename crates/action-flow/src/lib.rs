//! Swap orchestration layer
//!
//! Drives a DEX swap widget through token selection, amount entry, optional
//! slippage configuration, submission, wallet signing and settlement. Each
//! run produces exactly one [`swapbot_core_types::SwapResult`]; hard
//! failures are folded into it instead of being returned as errors.

pub mod errors;
pub mod orchestrator;
pub mod types;

pub use errors::FlowError;
pub use orchestrator::SwapOrchestrator;
pub use types::{FlowTimings, StateTransition, SwapRun, SwapState};
