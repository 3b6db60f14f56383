use std::time::Duration;

use action_locator::{SelectorCatalogue, SelectorSet};
use cdp_adapter::config::CdpConfig;
use cdp_adapter::fake::{FakeBackend, FakePage};
use swapbot_core_types::{Anchor, UiRole};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use wallet_popup::{PopupCoordinator, PopupError, PopupOutcome};

const OKX_PAGE: &str = "https://web3.okx.com/id/token/arbitrum-one/0xabc";
const CONNECT_POPUP: &str = "chrome-extension://nkbihfbeogaeaoehlefnkodbefgpgknn/popup.html";
const SIGN_POPUP: &str = "chrome-extension://nkbihfbeogaeaoehlefnkodbefgpgknn/notification.html";

fn coordinator() -> PopupCoordinator {
    PopupCoordinator::new(&SelectorCatalogue::okx_default()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn connect_popup_is_clicked_through() {
    let backend = FakeBackend::new(FakePage::new(OKX_PAGE));
    let popup = FakePage::with_matches(CONNECT_POPUP, [Anchor::text("button", "Connect")]);
    backend.add_window(popup.clone());
    let mut session = backend.open_session(CdpConfig::default()).await.unwrap();

    let started = Instant::now();
    let outcome = coordinator()
        .connect_wallet(&session, &CancellationToken::new())
        .await;

    assert_eq!(
        outcome,
        PopupOutcome::Handled {
            url: CONNECT_POPUP.to_string(),
            strategy: 1
        }
    );
    assert_eq!(popup.clicks(), vec![Anchor::text("button", "Connect")]);
    assert!(backend.primary_page().clicks().is_empty());
    // grace + one missed strategy + post-action delay
    assert_eq!(started.elapsed(), Duration::from_secs(2 + 3 + 1));
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn missing_popup_is_absent_after_grace() {
    let backend = FakeBackend::new(FakePage::new(OKX_PAGE));
    let mut session = backend.open_session(CdpConfig::default()).await.unwrap();

    let started = Instant::now();
    let outcome = coordinator()
        .confirm_transaction(&session, &CancellationToken::new())
        .await;

    assert_eq!(outcome, PopupOutcome::Absent);
    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert!(backend.primary_page().lookups().is_empty());
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn confirmation_ignores_non_notification_windows() {
    let backend = FakeBackend::new(FakePage::new(OKX_PAGE));
    let popup = FakePage::with_matches(CONNECT_POPUP, [Anchor::text("button", "Confirm")]);
    backend.add_window(popup.clone());
    let mut session = backend.open_session(CdpConfig::default()).await.unwrap();

    let outcome = coordinator()
        .confirm_transaction(&session, &CancellationToken::new())
        .await;

    assert_eq!(outcome, PopupOutcome::Absent);
    assert!(popup.lookups().is_empty());
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn popup_without_actions_is_unresponsive() {
    let backend = FakeBackend::new(FakePage::new(OKX_PAGE));
    let popup = FakePage::new(SIGN_POPUP);
    backend.add_window(popup.clone());
    let mut session = backend.open_session(CdpConfig::default()).await.unwrap();

    let started = Instant::now();
    let outcome = coordinator()
        .confirm_transaction(&session, &CancellationToken::new())
        .await;

    assert_eq!(
        outcome,
        PopupOutcome::Unresponsive {
            url: SIGN_POPUP.to_string()
        }
    );
    assert_eq!(popup.lookups().len(), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(3 + 3 * 5));
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn popup_closing_mid_handling_is_soft() {
    let backend = FakeBackend::new(FakePage::new(OKX_PAGE));
    let popup = FakePage::new(SIGN_POPUP);
    popup.detach();
    backend.add_window(popup);
    let mut session = backend.open_session(CdpConfig::default()).await.unwrap();

    let outcome = coordinator()
        .confirm_transaction(&session, &CancellationToken::new())
        .await;

    // A detached window cannot report its address, so it never matches.
    assert_eq!(outcome, PopupOutcome::Absent);
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_the_grace_wait() {
    let backend = FakeBackend::new(FakePage::new(OKX_PAGE));
    let popup = FakePage::with_matches(SIGN_POPUP, [Anchor::text("button", "Confirm")]);
    backend.add_window(popup.clone());
    let mut session = backend.open_session(CdpConfig::default()).await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = coordinator().confirm_transaction(&session, &cancel).await;

    assert_eq!(outcome, PopupOutcome::Cancelled);
    assert!(popup.events().is_empty());
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_action_lookup() {
    let backend = FakeBackend::new(FakePage::new(OKX_PAGE));
    let popup = FakePage::new(SIGN_POPUP);
    backend.add_window(popup.clone());
    let mut session = backend.open_session(CdpConfig::default()).await.unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(9)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let outcome = coordinator().confirm_transaction(&session, &cancel).await;

    assert_eq!(outcome, PopupOutcome::Cancelled);
    // grace 3s, first strategy 5s, then one second into the second one
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(9) && elapsed < Duration::from_millis(9_100));
    assert_eq!(popup.lookups().len(), 2);
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn window_listing_failure_reads_as_absent() {
    let backend = FakeBackend::new(FakePage::new(OKX_PAGE));
    backend.fail_window_listing("target crashed");
    let mut session = backend.open_session(CdpConfig::default()).await.unwrap();

    let outcome = coordinator()
        .connect_wallet(&session, &CancellationToken::new())
        .await;

    assert_eq!(outcome, PopupOutcome::Absent);
    session.close().await;
}

#[test]
fn catalogue_without_wallet_sets_is_rejected() {
    let mut catalogue = SelectorCatalogue::empty();
    catalogue.insert(SelectorSet::new(
        UiRole::WalletConnectAction,
        [Anchor::css(".btn-primary")],
    ));
    let err = PopupCoordinator::new(&catalogue).err().unwrap();
    assert!(matches!(err, PopupError::Catalogue(_)));
    assert!(err.to_string().contains("wallet-confirm-action"));
}
