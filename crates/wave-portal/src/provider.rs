//! The wallet provider capability set.

use std::fmt;

use alloy_primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// How an account request should behave towards the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountsRequest {
    /// Only report accounts the user already authorized, never prompt.
    Silent,
    /// Prompt the user to authorize an account if needed.
    Interactive,
}

impl AccountsRequest {
    /// The EIP-1193 method backing this request.
    pub const fn method(self) -> &'static str {
        match self {
            Self::Silent => "eth_accounts",
            Self::Interactive => "eth_requestAccounts",
        }
    }
}

/// An agent holding the user's keys, e.g. an injected browser wallet.
#[async_trait]
pub trait WalletProvider: fmt::Debug + Send + Sync {
    /// Whether a wallet exists at all.
    fn is_present(&self) -> bool;

    /// Returns the accounts the wallet exposes, the first one being the active account.
    async fn request_accounts(&self, mode: AccountsRequest) -> Result<Vec<Address>, ProviderError>;
}

#[async_trait]
impl<T: WalletProvider + ?Sized> WalletProvider for std::sync::Arc<T> {
    fn is_present(&self) -> bool {
        (**self).is_present()
    }

    async fn request_accounts(&self, mode: AccountsRequest) -> Result<Vec<Address>, ProviderError> {
        (**self).request_accounts(mode).await
    }
}

/// Stands in for a wallet when none is installed.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoWallet;

#[async_trait]
impl WalletProvider for NoWallet {
    fn is_present(&self) -> bool {
        false
    }

    async fn request_accounts(&self, _mode: AccountsRequest) -> Result<Vec<Address>, ProviderError> {
        Err(ProviderError::Unavailable)
    }
}
