use std::{fmt, str::FromStr};

use alloy_primitives::{Address, TxHash, hex::FromHexError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WaveError;

/// The identity a wallet provider hands out for the connected user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Account(Address);

impl Account {
    pub const fn new(address: Address) -> Self {
        Self(address)
    }

    pub const fn address(&self) -> Address {
        self.0
    }
}

impl From<Address> for Account {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl FromStr for Account {
    type Err = FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A single wave as shown to the user.
///
/// Records are immutable. Two records are equal exactly when sender, timestamp and message all
/// match, which is the identity used to collapse the same wave arriving from both the history
/// fetch and the live feed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveRecord {
    sender: Address,
    message: String,
    /// Milliseconds since the unix epoch.
    submitted_at: u64,
}

impl WaveRecord {
    /// Builds a record from the contract's native representation, where the timestamp is in
    /// seconds.
    pub fn from_raw(sender: Address, timestamp_secs: u64, message: impl Into<String>) -> Self {
        Self { sender, message: message.into(), submitted_at: timestamp_secs.saturating_mul(1000) }
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Milliseconds since the unix epoch.
    pub fn submitted_at(&self) -> u64 {
        self.submitted_at
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(i64::try_from(self.submitted_at).ok()?)
    }
}

impl fmt::Display for WaveRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.timestamp() {
            Some(ts) => {
                write!(f, "[{}] {}: {}", ts.format("%Y-%m-%d %H:%M:%S"), self.sender, self.message)
            }
            None => write!(f, "{}: {}", self.sender, self.message),
        }
    }
}

/// Lifecycle of a submitted wave transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxState {
    Submitted,
    Mining,
    Confirmed,
    Failed,
}

impl TxState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Submitted, Self::Mining)
                | (Self::Submitted, Self::Failed)
                | (Self::Mining, Self::Confirmed)
                | (Self::Mining, Self::Failed)
        )
    }
}

/// A wave transaction the wallet has accepted and the network has not yet finalized, or has
/// just finalized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionHandle {
    id: TxHash,
    state: TxState,
    message: String,
    related_wave: Option<WaveRecord>,
    failure: Option<String>,
}

impl TransactionHandle {
    pub fn submitted(id: TxHash, message: impl Into<String>) -> Self {
        Self {
            id,
            state: TxState::Submitted,
            message: message.into(),
            related_wave: None,
            failure: None,
        }
    }

    pub fn id(&self) -> TxHash {
        self.id
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// The message this transaction carries.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The wave recorded by this transaction.
    ///
    /// Only set once confirmed, and only when its block timestamp is known.
    pub fn related_wave(&self) -> Option<&WaveRecord> {
        self.related_wave.as_ref()
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn mark_mining(&mut self) -> Result<(), WaveError> {
        self.advance(TxState::Mining)
    }

    pub fn confirm(&mut self, wave: Option<WaveRecord>) -> Result<(), WaveError> {
        self.advance(TxState::Confirmed)?;
        self.related_wave = wave;
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), WaveError> {
        self.advance(TxState::Failed)?;
        self.failure = Some(reason.into());
        Ok(())
    }

    fn advance(&mut self, next: TxState) -> Result<(), WaveError> {
        if !self.state.can_advance_to(next) {
            return Err(WaveError::InvalidTransition { from: self.state, to: next });
        }
        trace!(tx = %self.id, from = ?self.state, to = ?next, "transaction state change");
        self.state = next;
        Ok(())
    }
}

/// Where the wallet connection currently stands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionPhase {
    #[default]
    Idle,
    Connecting,
    Connected,
    /// No wallet provider exists at all.
    Unavailable,
    Error,
}

/// Everything the renderer needs to know about the session, apart from the waves themselves.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub account: Option<Account>,
    pub connection_phase: ConnectionPhase,
    /// `None` until the contract has been asked.
    pub total_wave_count: Option<u64>,
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        self.connection_phase == ConnectionPhase::Connected && self.account.is_some()
    }
}
