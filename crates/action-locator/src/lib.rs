//! Element location for swapbot.
//!
//! Every UI role is backed by a [`SelectorSet`]: an ordered list of anchors
//! tried one after another until one matches. The sets come from an injected
//! [`SelectorCatalogue`], so markup drift on the target site is handled by
//! editing data rather than code.

pub mod catalogue;
pub mod errors;
pub mod resolver;
pub mod types;

pub use catalogue::*;
pub use errors::*;
pub use resolver::*;
pub use types::*;
