use std::{future::Future, sync::Arc, time::Duration};

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::{
    config::WavePortalConfig,
    contract::{RawWave, WaveContract},
    error::{ProviderError, WaveError},
    types::{Account, TransactionHandle, TxState, WaveRecord},
};

/// Limits applied by the gateway to every contract interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GatewayLimits {
    pub gas_limit: u64,
    pub request_timeout: Duration,
    pub confirmation_timeout: Duration,
    pub max_message_len: usize,
}

impl Default for GatewayLimits {
    fn default() -> Self {
        Self::from(&WavePortalConfig::default())
    }
}

impl From<&WavePortalConfig> for GatewayLimits {
    fn from(config: &WavePortalConfig) -> Self {
        Self {
            gas_limit: config.gas_limit,
            request_timeout: config.request_timeout(),
            confirmation_timeout: config.confirmation_timeout(),
            max_message_len: config.max_message_len,
        }
    }
}

/// Stateless operation surface over a [`WaveContract`] bound to one account.
///
/// Converts contract-native values into [`WaveRecord`]s and provider failures into
/// [`WaveError`]s, and bounds every wait.
#[derive(Clone, Debug)]
pub struct ContractGateway {
    contract: Arc<dyn WaveContract>,
    account: Account,
    limits: GatewayLimits,
}

impl ContractGateway {
    pub fn new(contract: Arc<dyn WaveContract>, account: Account, limits: GatewayLimits) -> Self {
        Self { contract, account, limits }
    }

    /// The account this gateway sends from.
    pub fn account(&self) -> Account {
        self.account
    }

    pub fn limits(&self) -> &GatewayLimits {
        &self.limits
    }

    pub async fn get_total_count(&self) -> Result<u64, WaveError> {
        let count = self.read(self.contract.total_waves()).await?;
        Ok(count.saturating_to())
    }

    /// All historical waves, in contract order.
    pub async fn fetch_history(&self) -> Result<Vec<WaveRecord>, WaveError> {
        let waves = self.read(self.contract.all_waves()).await?;
        debug!(count = waves.len(), "fetched wave history");
        Ok(waves.into_iter().map(WaveRecord::from).collect())
    }

    /// Hands `wave(message)` to the wallet and returns without waiting for it to be mined.
    pub async fn submit_wave(&self, message: &str) -> Result<TransactionHandle, WaveError> {
        self.validate_message(message)?;

        let tx_hash = self
            .contract
            .wave(message, self.limits.gas_limit)
            .await
            .map_err(WaveError::submission)?;
        info!(tx = %tx_hash, gas_limit = self.limits.gas_limit, "mining");
        Ok(TransactionHandle::submitted(tx_hash, message))
    }

    /// Waits for `handle` to be mined and returns it in its final state.
    ///
    /// A reverted transaction comes back as `Failed`. Running out of time yields
    /// [`WaveError::ConfirmationTimeout`] and says nothing about the transaction's fate.
    pub async fn await_confirmation(
        &self,
        mut handle: TransactionHandle,
    ) -> Result<TransactionHandle, WaveError> {
        let tx_hash = handle.id();
        let timeout = self.limits.confirmation_timeout;
        let receipt = tokio::time::timeout(timeout, self.contract.receipt(tx_hash))
            .await
            .map_err(|_| WaveError::ConfirmationTimeout { tx_hash, timeout })?
            .map_err(WaveError::submission)?;

        if handle.state() == TxState::Submitted {
            handle.mark_mining()?;
        }

        if !receipt.success {
            warn!(tx = %tx_hash, "wave transaction reverted");
            handle.fail("transaction reverted")?;
            return Ok(handle);
        }

        // the contract stamps waves with the block timestamp
        let wave = match (receipt.wave, receipt.block_timestamp) {
            (Some(raw), _) => Some(WaveRecord::from(raw)),
            (None, Some(timestamp)) => Some(WaveRecord::from(RawWave::new(
                self.account.address(),
                timestamp,
                handle.message(),
            ))),
            (None, None) => {
                debug!(tx = %tx_hash, "mined wave has no known timestamp");
                None
            }
        };
        info!(tx = %tx_hash, "mined");
        handle.confirm(wave)?;
        Ok(handle)
    }

    /// Delivers every `NewWave` event emitted from now on to `on_event`, until the returned
    /// [`Subscription`] is cancelled or dropped.
    pub async fn subscribe_to_new_waves<F>(&self, mut on_event: F) -> Result<Subscription, WaveError>
    where
        F: FnMut(WaveRecord) + Send + 'static,
    {
        let mut events = self.read(self.contract.new_waves()).await?;

        let active = Arc::new(Mutex::new(true));
        let task = tokio::spawn({
            let active = Arc::clone(&active);
            async move {
                while let Some(raw) = events.next().await {
                    // the flag stays locked while the callback runs, so `cancel` waits for an
                    // in-flight delivery and nothing is delivered after it returns
                    let delivering = active.lock();
                    if !*delivering {
                        break;
                    }
                    trace!(waver = %raw.waver, "new wave event");
                    on_event(WaveRecord::from(raw));
                }
                debug!("wave event stream ended");
            }
        });

        Ok(Subscription { active, task: Some(task) })
    }

    fn validate_message(&self, message: &str) -> Result<(), WaveError> {
        if message.trim().is_empty() {
            return Err(WaveError::InvalidMessage("message is empty".to_string()));
        }
        let len = message.chars().count();
        if len > self.limits.max_message_len {
            return Err(WaveError::InvalidMessage(format!(
                "message is {len} characters long, the limit is {}",
                self.limits.max_message_len
            )));
        }
        Ok(())
    }

    async fn read<T>(
        &self,
        fut: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, WaveError> {
        let timeout = self.limits.request_timeout;
        tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| WaveError::ReadError(format!("no response within {timeout:?}")))?
            .map_err(WaveError::read)
    }
}

/// Registration of a live event listener.
///
/// Cancelling is idempotent and also happens on drop, so the listener is released on every exit
/// path of its owner.
#[derive(Debug)]
#[must_use = "dropping a Subscription cancels it"]
pub struct Subscription {
    active: Arc<Mutex<bool>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Stops delivery. No callback runs after this returns.
    pub fn cancel(&mut self) {
        *self.active.lock() = false;
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("cancelled wave subscription");
        }
    }

    pub fn is_active(&self) -> bool {
        *self.active.lock() && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
