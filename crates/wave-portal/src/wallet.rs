use std::{sync::Arc, time::Duration};

use alloy_primitives::Address;

use crate::{
    error::{ProviderError, WaveError},
    provider::{AccountsRequest, WalletProvider},
    types::{Account, ConnectionPhase},
};

/// Connection state towards the user's wallet.
///
/// Holds at most one active [`Account`]; no account means disconnected.
#[derive(Debug)]
pub struct WalletSession {
    provider: Arc<dyn WalletProvider>,
    account: Option<Account>,
    phase: ConnectionPhase,
    request_timeout: Duration,
    prompt_timeout: Duration,
}

impl WalletSession {
    pub fn new(provider: Arc<dyn WalletProvider>) -> Self {
        Self {
            provider,
            account: None,
            phase: ConnectionPhase::Idle,
            request_timeout: Duration::from_secs(30),
            prompt_timeout: Duration::from_secs(300),
        }
    }

    /// Bounds the silent account check.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Bounds how long the user may take to answer the connection prompt.
    pub fn with_prompt_timeout(mut self, timeout: Duration) -> Self {
        self.prompt_timeout = timeout;
        self
    }

    pub fn account(&self) -> Option<Account> {
        self.account
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn is_connected(&self) -> bool {
        self.phase == ConnectionPhase::Connected && self.account.is_some()
    }

    /// Looks for an account the user already authorized, without prompting.
    ///
    /// A missing wallet is an expected condition here, so every failure is logged and reported as
    /// "no account".
    pub async fn check_existing_authorization(&mut self) -> Option<Account> {
        if !self.provider.is_present() {
            warn!("no wallet provider found, make sure a wallet is installed");
            self.phase = ConnectionPhase::Unavailable;
            return None;
        }
        debug!("wallet provider present, checking for authorized accounts");

        let accounts = match tokio::time::timeout(
            self.request_timeout,
            self.provider.request_accounts(AccountsRequest::Silent),
        )
        .await
        {
            Ok(Ok(accounts)) => accounts,
            Ok(Err(err)) => {
                warn!(%err, "failed to query authorized accounts");
                return None;
            }
            Err(_) => {
                warn!(timeout = ?self.request_timeout, "timed out querying authorized accounts");
                return None;
            }
        };

        match accounts.first() {
            Some(&address) => {
                let account = Account::new(address);
                info!(%account, "found an authorized account");
                self.set_connected(account);
                Some(account)
            }
            None => {
                debug!("no authorized account found");
                None
            }
        }
    }

    /// Prompts the user to connect an account.
    pub async fn request_connection(&mut self) -> Result<Account, WaveError> {
        if !self.provider.is_present() {
            self.phase = ConnectionPhase::Unavailable;
            return Err(WaveError::ProviderUnavailable);
        }

        let previous = self.phase;
        self.phase = ConnectionPhase::Connecting;

        let result = match tokio::time::timeout(
            self.prompt_timeout,
            self.provider.request_accounts(AccountsRequest::Interactive),
        )
        .await
        {
            Ok(Ok(accounts)) => accounts.first().copied().map(Account::new).ok_or_else(|| {
                WaveError::UserRejected("the wallet did not expose any account".to_string())
            }),
            Ok(Err(ProviderError::Unavailable)) => Err(WaveError::ProviderUnavailable),
            Ok(Err(ProviderError::Rejected(reason))) => Err(WaveError::UserRejected(reason)),
            Ok(Err(err @ ProviderError::Transport(_))) => Err(WaveError::read(err)),
            Err(_) => Err(WaveError::UserRejected(format!(
                "no answer from the wallet within {:?}",
                self.prompt_timeout
            ))),
        };

        match result {
            Ok(account) => {
                info!(%account, "connected");
                self.set_connected(account);
                Ok(account)
            }
            Err(err) => {
                warn!(%err, "wallet connection failed");
                self.phase = match err {
                    WaveError::ProviderUnavailable => ConnectionPhase::Unavailable,
                    // a failed re-prompt does not drop an existing connection
                    _ if previous == ConnectionPhase::Connected && self.account.is_some() => {
                        ConnectionPhase::Connected
                    }
                    _ => ConnectionPhase::Error,
                };
                Err(err)
            }
        }
    }

    /// Applies an `accountsChanged` notification from the wallet.
    ///
    /// Returns the new active account, or `None` if the wallet revoked every account.
    pub fn accounts_changed(&mut self, accounts: &[Address]) -> Option<Account> {
        match accounts.first() {
            Some(&address) => {
                let account = Account::new(address);
                if self.account != Some(account) {
                    info!(%account, "active account changed");
                }
                self.set_connected(account);
                Some(account)
            }
            None => {
                info!("wallet revoked all accounts");
                self.disconnect();
                None
            }
        }
    }

    pub fn disconnect(&mut self) {
        self.account = None;
        self.phase = ConnectionPhase::Idle;
    }

    fn set_connected(&mut self, account: Account) {
        self.account = Some(account);
        self.phase = ConnectionPhase::Connected;
    }
}
