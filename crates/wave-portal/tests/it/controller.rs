use std::sync::Arc;

use wave_portal::{
    ConnectionPhase, SessionController, TxState, UserIntent, WaveError, WaveRecord, WalletSession,
};

use crate::mock::{ALICE, BOB, MockChain, MockWallet, limits, settle, wait_until};

fn session(wallet: MockWallet, chain: &Arc<MockChain>) -> SessionController {
    SessionController::new(WalletSession::new(Arc::new(wallet)), chain.binder(), limits())
}

fn count(session: &SessionController, sender: alloy_primitives::Address, message: &str) -> usize {
    let ledger = session.ledger();
    let ledger = ledger.read();
    ledger.all().iter().filter(|w| w.sender() == sender && w.message() == message).count()
}

#[tokio::test]
async fn no_wallet_reports_unavailable() {
    let chain = MockChain::new();
    let mut session = session(MockWallet::absent(), &chain);

    session.startup().await;
    assert_eq!(session.state().connection_phase, ConnectionPhase::Unavailable);

    assert_eq!(session.connect().await, Err(WaveError::ProviderUnavailable));
    assert_eq!(session.state().connection_phase, ConnectionPhase::Unavailable);
    assert_eq!(session.last_error(), Some(&WaveError::ProviderUnavailable));
    assert!(chain.bound.lock().is_empty());
}

#[tokio::test]
async fn startup_restores_prior_connection() {
    let chain = MockChain::new();
    chain.preload(BOB, "one");
    chain.preload(BOB, "two");
    let mut session = session(MockWallet::authorized(&[ALICE]), &chain);

    session.startup().await;

    let state = session.state();
    assert!(state.is_connected());
    assert_eq!(state.account.map(|a| a.address()), Some(ALICE));
    assert_eq!(state.total_wave_count, Some(2));
    assert!(session.is_subscribed());

    let ledger = session.ledger();
    let messages: Vec<_> = ledger.read().all().iter().map(|w| w.message().to_string()).collect();
    assert_eq!(messages, ["one", "two"]);
}

#[tokio::test]
async fn startup_without_authorization_waits_for_user() {
    let chain = MockChain::new();
    let mut session = session(MockWallet::new(&[ALICE]), &chain);

    session.startup().await;
    assert_eq!(session.state().connection_phase, ConnectionPhase::Idle);
    assert!(session.gateway().is_none());

    let account = session.connect().await.unwrap();
    assert_eq!(account.address(), ALICE);
    assert!(session.state().is_connected());
    assert_eq!(*chain.bound.lock(), [ALICE]);
}

#[tokio::test]
async fn confirmed_wave_lands_in_ledger_once() {
    let chain = MockChain::new();
    chain.preload(BOB, "hello");
    let mut session = session(MockWallet::authorized(&[ALICE]), &chain);
    session.startup().await;
    assert_eq!(session.state().total_wave_count, Some(1));

    let handle = session.submit_wave("gm").await.unwrap();
    assert_eq!(handle.state(), TxState::Confirmed);
    assert_eq!(handle.related_wave().map(WaveRecord::sender), Some(ALICE));

    // the live event for the same wave must not add a second copy
    settle().await;
    assert_eq!(count(&session, ALICE, "gm"), 1);
    assert_eq!(session.ledger().read().len(), 2);

    assert_eq!(session.state().total_wave_count, Some(2));
    assert_eq!(session.tracker().count_before(), Some(1));
    assert_eq!(session.tracker().count_delta(), Some(1));
    assert!(session.tracker().pending().is_none());
    assert_eq!(session.last_error(), None);
}

#[tokio::test]
async fn wave_mined_while_history_loads_appears_once() {
    let chain = MockChain::new();
    chain.preload(BOB, "old");
    chain.behave(|b| b.mine_during_fetch = Some((BOB, "racing".to_string())));
    let mut session = session(MockWallet::new(&[ALICE]), &chain);

    session.connect().await.unwrap();
    settle().await;

    assert_eq!(count(&session, BOB, "racing"), 1);
    let ledger = session.ledger();
    let messages: Vec<_> = ledger.read().all().iter().map(|w| w.message().to_string()).collect();
    assert_eq!(messages, ["old", "racing"]);
}

#[tokio::test]
async fn live_waves_are_appended() {
    let chain = MockChain::new();
    let mut session = session(MockWallet::authorized(&[ALICE]), &chain);
    session.startup().await;
    let mut updates = session.updates();
    updates.mark_unchanged();

    chain.mine(BOB, "hey");
    let ledger = session.ledger();
    wait_until(|| ledger.read().len() == 1).await;
    assert!(updates.has_changed().unwrap());
}

#[tokio::test]
async fn disconnect_stops_live_updates() {
    let chain = MockChain::new();
    let mut session = session(MockWallet::authorized(&[ALICE]), &chain);
    session.startup().await;
    let ledger = session.ledger();

    session.handle_intent(UserIntent::DisconnectRequested).await;
    assert!(!session.is_subscribed());
    assert!(session.gateway().is_none());
    assert_eq!(session.state().account, None);
    assert_eq!(session.state().connection_phase, ConnectionPhase::Idle);

    chain.mine(BOB, "too late");
    settle().await;
    assert!(ledger.read().is_empty());
    assert_eq!(chain.listeners(), 0);

    assert_eq!(session.submit_wave("gm").await, Err(WaveError::NotConnected));
}

#[tokio::test]
async fn account_switch_rebinds_contract() {
    let chain = MockChain::new();
    chain.preload(BOB, "hello");
    let mut session = session(MockWallet::authorized(&[ALICE]), &chain);
    session.startup().await;
    let old_ledger = session.ledger();

    session.accounts_changed(&[BOB]).await;
    assert_eq!(*chain.bound.lock(), [ALICE, BOB]);
    assert_eq!(session.gateway().map(|g| g.account().address()), Some(BOB));
    assert_eq!(session.ledger().read().len(), 1);
    wait_until(|| chain.listeners() == 1).await;

    chain.mine(ALICE, "after switch");
    let ledger = session.ledger();
    wait_until(|| ledger.read().len() == 2).await;
    assert_eq!(old_ledger.read().len(), 1);

    // same account again is a no-op
    session.accounts_changed(&[BOB]).await;
    assert_eq!(chain.bound.lock().len(), 2);

    session.accounts_changed(&[]).await;
    assert!(!session.state().is_connected());
    assert!(!session.is_subscribed());
}

#[tokio::test]
async fn confirmation_timeout_keeps_transaction_pending() {
    let chain = MockChain::new();
    chain.behave(|b| b.hang_receipt = true);
    let mut session = session(MockWallet::authorized(&[ALICE]), &chain);
    session.startup().await;

    let err = session.submit_wave("gm").await.unwrap_err();
    assert!(matches!(err, WaveError::ConfirmationTimeout { .. }));
    let pending = session.tracker().pending().unwrap();
    assert_eq!(pending.state(), TxState::Mining);
    assert_eq!(session.snapshot().pending.as_ref().map(|h| h.id()), Some(pending.id()));
    assert!(session.state().is_connected());

    chain.behave(|b| b.hang_receipt = false);
    let handle = session.await_pending().await.unwrap().unwrap();
    assert_eq!(handle.state(), TxState::Confirmed);
    assert!(session.tracker().pending().is_none());
    assert_eq!(session.await_pending().await, Ok(None));
}

#[tokio::test]
async fn rejected_submission_keeps_session() {
    let chain = MockChain::new();
    chain.preload(BOB, "hello");
    chain.behave(|b| b.reject_send = true);
    let mut session = session(MockWallet::authorized(&[ALICE]), &chain);
    session.startup().await;

    session.handle_intent(UserIntent::SubmitRequested("gm".to_string())).await;
    assert!(matches!(session.last_error(), Some(WaveError::SubmissionRejected(_))));
    assert!(session.state().is_connected());
    assert!(session.tracker().pending().is_none());
    assert_eq!(session.ledger().read().len(), 1);

    // the user can try again right away
    chain.behave(|b| b.reject_send = false);
    session.submit_wave("gm").await.unwrap();
    assert_eq!(session.last_error(), None);
    assert_eq!(count(&session, ALICE, "gm"), 1);
}

#[tokio::test]
async fn reverted_submission_is_reported() {
    let chain = MockChain::new();
    chain.behave(|b| b.revert = true);
    let mut session = session(MockWallet::authorized(&[ALICE]), &chain);
    session.startup().await;

    assert!(matches!(session.submit_wave("gm").await, Err(WaveError::SubmissionFailed(_))));
    assert_eq!(session.tracker().failed(), 1);
    assert!(session.tracker().pending().is_none());
    assert!(session.ledger().read().is_empty());
}

#[tokio::test]
async fn history_loads_without_live_feed() {
    let chain = MockChain::new();
    chain.preload(BOB, "hello");
    chain.behave(|b| b.fail_subscribe = true);
    let mut session = session(MockWallet::authorized(&[ALICE]), &chain);
    session.startup().await;

    assert!(session.state().is_connected());
    assert!(!session.is_subscribed());
    assert_eq!(session.ledger().read().len(), 1);
    assert!(matches!(session.last_error(), Some(WaveError::ReadError(_))));
}

#[tokio::test]
async fn snapshot_serializes_for_renderers() {
    let chain = MockChain::new();
    chain.preload(BOB, "hello");
    let mut session = session(MockWallet::new(&[ALICE]), &chain);
    session.handle_intent(UserIntent::ConnectRequested).await;

    let snapshot = serde_json::to_value(session.snapshot()).unwrap();
    assert_eq!(snapshot["state"]["connectionPhase"], "Connected");
    assert_eq!(snapshot["state"]["totalWaveCount"], 1);
    assert_eq!(snapshot["waves"][0]["message"], "hello");
    assert!(snapshot["pending"].is_null());

    let intent: UserIntent =
        serde_json::from_str(r#"{"type":"submitRequested","message":"gm"}"#).unwrap();
    assert_eq!(intent, UserIntent::SubmitRequested("gm".to_string()));
}

#[tokio::test]
async fn own_wave_without_event_log_appears_once() {
    let chain = MockChain::new();
    chain.behave(|b| b.omit_receipt_log = true);
    let mut session = session(MockWallet::authorized(&[ALICE]), &chain);
    session.startup().await;

    let handle = session.submit_wave("gm").await.unwrap();
    assert!(handle.related_wave().is_some());

    settle().await;
    assert_eq!(count(&session, ALICE, "gm"), 1);
    assert_eq!(session.ledger().read().len(), 1);
}

#[tokio::test]
async fn own_wave_without_timestamp_arrives_through_feed() {
    let chain = MockChain::new();
    chain.behave(|b| {
        b.omit_receipt_log = true;
        b.omit_block_timestamp = true;
    });
    let mut session = session(MockWallet::authorized(&[ALICE]), &chain);
    session.startup().await;

    let handle = session.submit_wave("gm").await.unwrap();
    assert_eq!(handle.related_wave(), None);

    let ledger = session.ledger();
    wait_until(|| ledger.read().len() == 1).await;
    settle().await;
    assert_eq!(count(&session, ALICE, "gm"), 1);
}

#[tokio::test]
async fn own_wave_without_timestamp_or_feed_comes_from_history() {
    let chain = MockChain::new();
    chain.behave(|b| {
        b.omit_receipt_log = true;
        b.omit_block_timestamp = true;
        b.fail_subscribe = true;
    });
    let mut session = session(MockWallet::authorized(&[ALICE]), &chain);
    session.startup().await;
    assert!(!session.is_subscribed());

    session.submit_wave("gm").await.unwrap();
    assert_eq!(count(&session, ALICE, "gm"), 1);
    assert_eq!(session.state().total_wave_count, Some(1));
}

#[tokio::test]
async fn failed_history_is_reloaded_on_connect() {
    let chain = MockChain::new();
    chain.preload(BOB, "hello");
    chain.behave(|b| b.fail_reads = true);
    let mut session = session(MockWallet::authorized(&[ALICE]), &chain);

    session.startup().await;
    assert!(session.state().is_connected());
    assert!(session.ledger().read().is_empty());
    assert_eq!(session.state().total_wave_count, None);
    assert!(matches!(session.last_error(), Some(WaveError::ReadError(_))));

    chain.behave(|b| b.fail_reads = false);
    session.connect().await.unwrap();

    assert_eq!(session.ledger().read().len(), 1);
    assert_eq!(session.state().total_wave_count, Some(1));
    assert_eq!(session.last_error(), None);
    // the existing binding is reused
    assert_eq!(*chain.bound.lock(), [ALICE]);
    assert_eq!(chain.listeners(), 1);
}

#[tokio::test]
async fn reload_recovers_from_read_errors() {
    let chain = MockChain::new();
    chain.preload(BOB, "hello");
    chain.behave(|b| b.fail_reads = true);
    let mut session = session(MockWallet::authorized(&[ALICE]), &chain);
    session.startup().await;

    assert!(matches!(session.reload().await, Err(WaveError::ReadError(_))));
    assert!(session.ledger().read().is_empty());

    chain.behave(|b| b.fail_reads = false);
    session.handle_intent(UserIntent::RefreshRequested).await;
    assert_eq!(session.last_error(), None);
    assert_eq!(session.ledger().read().len(), 1);
    assert_eq!(session.state().total_wave_count, Some(1));

    session.disconnect();
    assert_eq!(session.reload().await, Err(WaveError::NotConnected));
}
