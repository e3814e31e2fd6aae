use std::time::Duration;

use alloy_primitives::TxHash;

use crate::types::TxState;

/// EIP-1193 error code reported when the user declines a wallet prompt.
pub const USER_REJECTED_CODE: i64 = 4001;

/// Failures reported by a wallet provider or a contract binding.
///
/// These are provider-level and carry no notion of which operation was being performed; the
/// [`ContractGateway`](crate::ContractGateway) and [`WalletSession`](crate::WalletSession) turn
/// them into a [`WaveError`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("no wallet provider is present")]
    Unavailable,
    #[error("request rejected by the user: {0}")]
    Rejected(String),
    #[error("{0}")]
    Transport(String),
}

impl ProviderError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Everything that can go wrong in a wave session.
///
/// None of these are fatal: the session always lands back in a state the user can retry from.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum WaveError {
    #[error("no wallet found, install a wallet extension to continue")]
    ProviderUnavailable,
    #[error("wallet connection rejected: {0}")]
    UserRejected(String),
    #[error("wallet is not connected")]
    NotConnected,
    #[error("provider request failed: {0}")]
    ReadError(String),
    #[error("invalid wave message: {0}")]
    InvalidMessage(String),
    #[error("wave submission rejected: {0}")]
    SubmissionRejected(String),
    #[error("wave submission failed: {0}")]
    SubmissionFailed(String),
    #[error("transaction {tx_hash} was not confirmed within {timeout:?}, it may still be pending")]
    ConfirmationTimeout { tx_hash: TxHash, timeout: Duration },
    #[error("transaction cannot move from {from:?} to {to:?}")]
    InvalidTransition { from: TxState, to: TxState },
}

impl WaveError {
    /// Whether the user can fix this themselves, e.g. by installing a wallet or fixing input.
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable | Self::NotConnected | Self::InvalidMessage(_))
    }

    /// Whether simply retrying the same action may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UserRejected(_)
                | Self::ReadError(_)
                | Self::SubmissionRejected(_)
                | Self::SubmissionFailed(_)
                | Self::ConfirmationTimeout { .. }
        )
    }

    pub(crate) fn read(err: ProviderError) -> Self {
        Self::ReadError(err.to_string())
    }

    pub(crate) fn submission(err: ProviderError) -> Self {
        match err {
            ProviderError::Rejected(reason) => Self::SubmissionRejected(reason),
            ProviderError::Unavailable => Self::ProviderUnavailable,
            ProviderError::Transport(reason) => Self::SubmissionFailed(reason),
        }
    }
}
