//! Element resolver with fallback chain orchestration

use std::time::Duration;

use async_trait::async_trait;
use cdp_adapter::PageHandle;
use tracing::{debug, warn};

use crate::errors::LocatorError;
use crate::types::{Resolution, ResolveMode, SelectorSet};

/// Per-strategy wait used unless a caller overrides it.
pub const DEFAULT_STRATEGY_TIMEOUT: Duration = Duration::from_millis(3_000);

/// Element resolver trait
#[async_trait]
pub trait ElementResolver: Send + Sync {
    /// How long each strategy may wait for a match.
    fn strategy_timeout(&self) -> Duration;

    /// Resolve `set` on `page` with an explicit per-strategy wait.
    async fn resolve_with_timeout(
        &self,
        page: &dyn PageHandle,
        set: &SelectorSet,
        mode: ResolveMode,
        per_strategy: Duration,
    ) -> Result<Resolution, LocatorError>;

    /// Resolve `set` on `page` with the default per-strategy wait.
    async fn resolve(
        &self,
        page: &dyn PageHandle,
        set: &SelectorSet,
        mode: ResolveMode,
    ) -> Result<Resolution, LocatorError> {
        self.resolve_with_timeout(page, set, mode, self.strategy_timeout())
            .await
    }
}

/// Tries the strategies of a set strictly in order and stops at the first
/// one that yields an element (and, in click mode, a successful click).
#[derive(Debug, Clone)]
pub struct SelectorResolver {
    strategy_timeout: Duration,
}

impl SelectorResolver {
    pub fn new() -> Self {
        Self {
            strategy_timeout: DEFAULT_STRATEGY_TIMEOUT,
        }
    }

    pub fn with_strategy_timeout(mut self, timeout: Duration) -> Self {
        self.strategy_timeout = timeout;
        self
    }
}

impl Default for SelectorResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ElementResolver for SelectorResolver {
    fn strategy_timeout(&self) -> Duration {
        self.strategy_timeout
    }

    async fn resolve_with_timeout(
        &self,
        page: &dyn PageHandle,
        set: &SelectorSet,
        mode: ResolveMode,
        per_strategy: Duration,
    ) -> Result<Resolution, LocatorError> {
        if set.is_empty() {
            return Err(LocatorError::EmptySet(set.role));
        }

        for (index, anchor) in set.strategies.iter().enumerate() {
            debug!(role = %set.role, strategy = index, %anchor, mode = mode.name(), "Trying strategy");

            let Some(element) = page.wait_for(anchor, per_strategy).await? else {
                debug!(role = %set.role, strategy = index, "No match within timeout");
                continue;
            };

            if mode == ResolveMode::Click {
                if let Err(err) = page.click(&element).await {
                    if err.is_fatal() {
                        return Err(err.into());
                    }
                    warn!(
                        role = %set.role,
                        strategy = index,
                        error = %err,
                        "Matched element could not be clicked; trying next strategy"
                    );
                    continue;
                }
            }

            debug!(role = %set.role, strategy = index, %anchor, "Resolved");
            return Ok(Resolution::Found {
                element,
                strategy: index,
                anchor: anchor.clone(),
            });
        }

        warn!(
            role = %set.role,
            attempted = set.len(),
            "No strategy matched"
        );
        Ok(Resolution::NotFound {
            role: set.role,
            attempted: set.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::fake::{FakePage, PageEvent};
    use cdp_adapter::AdapterErrorKind;
    use swapbot_core_types::{Anchor, UiRole};
    use tokio::time::Instant;

    fn swap_set() -> SelectorSet {
        SelectorSet::new(
            UiRole::SwapButton,
            [
                Anchor::css(r#"[data-testid="swap-button"]"#),
                Anchor::text("button", "Swap"),
                Anchor::css(".swap-btn"),
            ],
        )
    }

    #[tokio::test(start_paused = true)]
    async fn only_kth_strategy_matches() {
        let set = swap_set();
        for k in 0..set.len() {
            let page = FakePage::with_matches("https://web3.okx.com/", [set.strategies[k].clone()]);
            let started = Instant::now();

            let resolution = SelectorResolver::new()
                .resolve(page.as_ref(), &set, ResolveMode::Click)
                .await
                .unwrap();

            assert_eq!(resolution.strategy(), Some(k));
            assert_eq!(page.lookups(), set.strategies[..=k].to_vec());
            assert_eq!(page.clicks(), vec![set.strategies[k].clone()]);
            let waited = started.elapsed();
            assert!(waited >= DEFAULT_STRATEGY_TIMEOUT * k as u32);
            assert!(waited < DEFAULT_STRATEGY_TIMEOUT * (k as u32 + 1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_all_strategies_takes_their_summed_timeouts() {
        let set = swap_set();
        let page = FakePage::new("https://web3.okx.com/");
        let started = Instant::now();

        let resolution = SelectorResolver::new()
            .resolve(page.as_ref(), &set, ResolveMode::Click)
            .await
            .unwrap();

        match resolution {
            Resolution::NotFound { role, attempted } => {
                assert_eq!(role, UiRole::SwapButton);
                assert_eq!(attempted, 3);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert_eq!(started.elapsed(), DEFAULT_STRATEGY_TIMEOUT * 3);
        assert_eq!(page.lookups(), set.strategies);
        assert!(page.clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn locate_mode_never_clicks() {
        let set = swap_set();
        let page = FakePage::with_matches("https://web3.okx.com/", set.strategies.clone());

        let resolution = SelectorResolver::new()
            .resolve(page.as_ref(), &set, ResolveMode::Locate)
            .await
            .unwrap();

        assert_eq!(resolution.strategy(), Some(0));
        assert_eq!(page.lookups().len(), 1);
        assert!(page.clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_click_falls_through_to_next_strategy() {
        let set = swap_set();
        let page = FakePage::with_matches("https://web3.okx.com/", set.strategies.clone());
        page.break_clicks_on(set.strategies[0].clone());

        let resolution = SelectorResolver::new()
            .resolve(page.as_ref(), &set, ResolveMode::Click)
            .await
            .unwrap();

        assert_eq!(resolution.strategy(), Some(1));
        assert_eq!(
            page.events(),
            vec![
                PageEvent::Lookup(set.strategies[0].clone()),
                PageEvent::Click(set.strategies[0].clone()),
                PageEvent::Lookup(set.strategies[1].clone()),
                PageEvent::Click(set.strategies[1].clone()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_override_applies_per_strategy() {
        let set = swap_set();
        let page = FakePage::new("https://web3.okx.com/");
        let started = Instant::now();

        let resolution = SelectorResolver::new()
            .resolve_with_timeout(
                page.as_ref(),
                &set,
                ResolveMode::Locate,
                Duration::from_secs(30),
            )
            .await
            .unwrap();

        assert!(!resolution.is_found());
        assert_eq!(started.elapsed(), Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn closed_session_is_an_error() {
        let set = swap_set();
        let page = FakePage::new("https://web3.okx.com/");
        page.detach();

        let err = SelectorResolver::new()
            .resolve(page.as_ref(), &set, ResolveMode::Click)
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        match err {
            LocatorError::Adapter(inner) => assert_eq!(inner.kind, AdapterErrorKind::SessionClosed),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_set_is_rejected() {
        let page = FakePage::new("about:blank");
        let set = SelectorSet::new(UiRole::ResultItem, Vec::<Anchor>::new());
        let err = SelectorResolver::new()
            .resolve(page.as_ref(), &set, ResolveMode::Click)
            .await
            .unwrap_err();
        assert!(matches!(err, LocatorError::EmptySet(UiRole::ResultItem)));
        assert!(page.lookups().is_empty());
    }
}
