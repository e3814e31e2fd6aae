use std::{sync::Arc, time::Duration};

use wave_portal::{AccountsRequest, ConnectionPhase, ProviderError, WaveError, WalletSession};

use crate::mock::{ALICE, BOB, MockWallet};

#[tokio::test]
async fn missing_provider_is_unavailable() {
    let mut session = WalletSession::new(Arc::new(MockWallet::absent()));

    assert_eq!(session.check_existing_authorization().await, None);
    assert_eq!(session.phase(), ConnectionPhase::Unavailable);

    assert_eq!(session.request_connection().await, Err(WaveError::ProviderUnavailable));
    assert_eq!(session.phase(), ConnectionPhase::Unavailable);
    assert!(!session.is_connected());
}

#[tokio::test]
async fn picks_up_prior_authorization_silently() {
    let wallet = Arc::new(MockWallet::authorized(&[ALICE, BOB]));
    let mut session = WalletSession::new(wallet.clone());

    let account = session.check_existing_authorization().await.unwrap();
    assert_eq!(account.address(), ALICE);
    assert!(session.is_connected());
    assert_eq!(*wallet.requests.lock(), [AccountsRequest::Silent]);
}

#[tokio::test]
async fn no_prior_authorization_stays_idle() {
    let wallet = Arc::new(MockWallet::new(&[BOB]));
    let mut session = WalletSession::new(wallet.clone());

    assert_eq!(session.check_existing_authorization().await, None);
    assert_eq!(session.phase(), ConnectionPhase::Idle);

    let account = session.request_connection().await.unwrap();
    assert_eq!(account.address(), BOB);
    assert_eq!(session.phase(), ConnectionPhase::Connected);
    assert_eq!(*wallet.requests.lock(), [AccountsRequest::Silent, AccountsRequest::Interactive]);
}

#[tokio::test]
async fn declined_prompt_is_user_rejected() {
    let mut session = WalletSession::new(Arc::new(MockWallet::rejecting()));

    let err = session.request_connection().await.unwrap_err();
    assert_eq!(err, WaveError::UserRejected("User rejected the request.".into()));
    assert_eq!(session.phase(), ConnectionPhase::Error);
    assert_eq!(session.account(), None);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn unanswered_prompt_times_out() {
    let mut session = WalletSession::new(Arc::new(MockWallet::hanging()))
        .with_prompt_timeout(Duration::from_millis(50));

    assert!(matches!(session.request_connection().await, Err(WaveError::UserRejected(_))));
    assert_eq!(session.phase(), ConnectionPhase::Error);
}

#[tokio::test]
async fn failed_reprompt_keeps_connection() {
    let wallet = Arc::new(MockWallet::new(&[ALICE]));
    let mut session = WalletSession::new(wallet.clone());
    session.request_connection().await.unwrap();

    wallet.set_prompt(Err(ProviderError::Rejected("no".into())));
    assert!(session.request_connection().await.is_err());
    assert_eq!(session.phase(), ConnectionPhase::Connected);
    assert_eq!(session.account().map(|a| a.address()), Some(ALICE));
}

#[tokio::test]
async fn empty_account_list_is_rejected() {
    let mut session = WalletSession::new(Arc::new(MockWallet::new(&[])));
    assert!(matches!(session.request_connection().await, Err(WaveError::UserRejected(_))));
    assert!(!session.is_connected());
}

#[tokio::test]
async fn accounts_changed_switches_or_disconnects() {
    let mut session = WalletSession::new(Arc::new(MockWallet::authorized(&[ALICE])));
    session.check_existing_authorization().await.unwrap();

    let account = session.accounts_changed(&[BOB]).unwrap();
    assert_eq!(account.address(), BOB);
    assert_eq!(session.account(), Some(account));

    assert_eq!(session.accounts_changed(&[]), None);
    assert_eq!(session.account(), None);
    assert_eq!(session.phase(), ConnectionPhase::Idle);
}

#[tokio::test]
async fn transport_fault_during_prompt_is_read_error() {
    let wallet = Arc::new(MockWallet::new(&[ALICE]));
    wallet.set_prompt(Err(ProviderError::transport("connection reset")));
    let mut session = WalletSession::new(wallet);

    let err = session.request_connection().await.unwrap_err();
    assert_eq!(err, WaveError::ReadError("connection reset".into()));
    assert_eq!(session.phase(), ConnectionPhase::Error);
    assert!(err.is_retryable());
}
