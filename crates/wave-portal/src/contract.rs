//! The WavePortal contract capability set.

use std::{fmt, sync::Arc};

use alloy_primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{error::ProviderError, types::WaveRecord};

/// A wave in the contract's own representation, timestamp in seconds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawWave {
    pub waver: Address,
    pub timestamp: u64,
    pub message: String,
}

impl RawWave {
    pub fn new(waver: Address, timestamp: u64, message: impl Into<String>) -> Self {
        Self { waver, timestamp, message: message.into() }
    }
}

impl From<RawWave> for WaveRecord {
    fn from(raw: RawWave) -> Self {
        Self::from_raw(raw.waver, raw.timestamp, raw.message)
    }
}

/// Outcome of a mined wave transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WaveReceipt {
    pub tx_hash: TxHash,
    /// `false` if the transaction reverted.
    pub success: bool,
    /// The `NewWave` event emitted by this transaction, if any.
    pub wave: Option<RawWave>,
    /// Timestamp of the block the transaction was mined in, in seconds, if known.
    pub block_timestamp: Option<u64>,
}

/// Live `NewWave` events, in emission order.
pub type WaveStream = BoxStream<'static, RawWave>;

/// Reads and writes against a WavePortal deployment, bound to one sending account.
#[async_trait]
pub trait WaveContract: fmt::Debug + Send + Sync {
    /// `getTotalWaves()`
    async fn total_waves(&self) -> Result<U256, ProviderError>;

    /// `getAllWaves()`, in the order the contract stores them.
    async fn all_waves(&self) -> Result<Vec<RawWave>, ProviderError>;

    /// Sends `wave(message)` with the given gas ceiling and returns as soon as the wallet has
    /// handed the transaction to the network.
    async fn wave(&self, message: &str, gas_limit: u64) -> Result<TxHash, ProviderError>;

    /// Waits until `tx_hash` is mined.
    async fn receipt(&self, tx_hash: TxHash) -> Result<WaveReceipt, ProviderError>;

    /// Starts delivering `NewWave` events emitted from now on.
    async fn new_waves(&self) -> Result<WaveStream, ProviderError>;
}

/// Builds a [`WaveContract`] bound to a specific account.
///
/// A binding must never outlive a change of account, so one is built per connection.
pub trait ContractBinder: fmt::Debug + Send + Sync {
    fn bind(&self, account: Address) -> Arc<dyn WaveContract>;
}
